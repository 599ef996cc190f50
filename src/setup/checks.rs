//! Prerequisite checks run before the setup wizard starts asking questions.

use super::ansi;

pub fn run_checks() -> bool {
    let mut ok = true;

    match std::env::var("HOME") {
        Ok(_) => println!("  {} HOME is set", ansi::green("\u{2713}")),
        Err(_) => {
            println!("  {} HOME is not set, config directory cannot be resolved", ansi::red("\u{2717}"));
            ok = false;
        }
    }

    ok
}
