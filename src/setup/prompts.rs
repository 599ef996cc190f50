//! Interactive prompt helpers backing the setup wizard.

use std::io::Write;

/// Ask a free-text question, returning `default` unchanged if the user
/// presses enter on an empty line.
pub fn ask(question: &str, default: Option<&str>) -> String {
    loop {
        match default {
            Some(d) => print!("  {question} [{d}]: "),
            None => print!("  {question}: "),
        }
        std::io::stdout().flush().ok();

        let mut line = String::new();
        if std::io::stdin().read_line(&mut line).is_err() {
            continue;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if let Some(d) = default {
                return d.to_string();
            }
            continue;
        }
        return trimmed.to_string();
    }
}

/// Ask for a secret value without echoing it to the terminal.
pub fn ask_secret(question: &str) -> String {
    loop {
        match rpassword::prompt_password(format!("  {question}: ")) {
            Ok(value) if !value.trim().is_empty() => return value.trim().to_string(),
            Ok(_) => println!("  value cannot be empty"),
            Err(e) => println!("  failed to read input: {e}"),
        }
    }
}

/// Ask a yes/no question, defaulting to "no" on an empty line.
pub fn confirm(question: &str) -> bool {
    print!("  {question} [y/N]: ");
    std::io::stdout().flush().ok();

    let mut line = String::new();
    if std::io::stdin().read_line(&mut line).is_err() {
        return false;
    }
    matches!(line.trim().to_lowercase().as_str(), "y" | "yes")
}
