mod ansi;
mod checks;
mod prompts;
mod writer;

use std::io::IsTerminal;

use rand::Rng;

use writer::SetupValues;

/// Entry point for `voice-gateway --setup`.
pub fn run() {
    if !std::io::stdin().is_terminal() {
        eprintln!("Error: --setup requires an interactive terminal");
        std::process::exit(1);
    }

    println!();
    println!("  {}", ansi::bold("voice-gateway setup"));
    println!("  {}", ansi::dim("Interactive configuration wizard"));

    if !checks::run_checks() {
        std::process::exit(1);
    }

    println!("\n  {} Default providers", ansi::bold(">>"));
    let default_dialer = loop {
        let choice = prompts::ask("Default dialer (twilio/room)", Some("twilio"));
        if choice == "twilio" || choice == "room" {
            break choice;
        }
        println!("  {} must be 'twilio' or 'room'", ansi::red("!"));
    };
    let default_agent = loop {
        let choice = prompts::ask("Default agent (elevenlabs/room)", Some("elevenlabs"));
        if choice == "elevenlabs" || choice == "room" {
            break choice;
        }
        println!("  {} must be 'elevenlabs' or 'room'", ansi::red("!"));
    };

    println!("\n  {} Twilio Dialer", ansi::bold(">>"));
    let twilio_account_sid = prompts::ask_secret("Account SID");
    let twilio_auth_token = prompts::ask_secret("Auth Token");
    let twilio_phone_number = loop {
        let num = prompts::ask("Phone Number (E.164)", None);
        if validate_e164(&num) {
            break num;
        }
        println!("  {} Invalid E.164 format (expected: +<digits>)", ansi::red("!"));
    };

    println!("\n  {} Room Dialer", ansi::bold(">>"));
    let room_dialer_api_key = prompts::ask_secret("API Key");
    let room_dialer_api_base_url = prompts::ask("API Base URL", Some("https://rooms.example.com"));

    println!("\n  {} ElevenLabs Agent", ansi::bold(">>"));
    let elevenlabs_api_key = prompts::ask_secret("API Key");

    println!("\n  {} Room Agent", ansi::bold(">>"));
    let room_agent_api_key = prompts::ask_secret("API Key");
    let room_agent_dispatch_url =
        prompts::ask("Job-dispatch URL", Some("https://rooms.example.com/dispatch"));

    println!("\n  {} Server", ansi::bold(">>"));
    let external_url = prompts::ask("External URL", None);

    let api_key = generate_hex_token(32);
    println!("\n  {} Generated outbound-call API key", ansi::green("\u{2713}"));

    let values = SetupValues {
        twilio_account_sid,
        twilio_auth_token,
        twilio_phone_number,
        room_dialer_api_key,
        room_dialer_api_base_url,
        elevenlabs_api_key,
        room_agent_api_key,
        room_agent_dispatch_url,
        default_dialer,
        default_agent,
        external_url: external_url.clone(),
        api_key,
    };

    writer::write_config(&values);

    println!("\n  {} System installation (optional)", ansi::bold(">>"));

    if prompts::confirm("Copy binary to /usr/local/bin/?") {
        writer::install_binary();
    }

    if prompts::confirm("Install systemd service?") {
        writer::install_systemd();
    }

    println!("\n  {} Setup complete!", ansi::green("\u{2713}"));
    println!();
    println!("  Next steps:");
    println!("    1. Review ~/.voice-gateway/config.toml");
    println!("    2. Run: voice-gateway");
    println!(
        "    3. Point your dialer's webhook at {}/<dialer>/incoming-call",
        external_url
    );
    println!();
}

/// Basic E.164 validation: starts with +, followed by digits only, 8-15 total chars.
fn validate_e164(s: &str) -> bool {
    if !s.starts_with('+') || s.len() < 8 || s.len() > 16 {
        return false;
    }
    s[1..].chars().all(|c| c.is_ascii_digit())
}

/// Generate a hex token of `byte_len` random bytes (output is 2x byte_len chars).
fn generate_hex_token(byte_len: usize) -> String {
    let mut rng = rand::thread_rng();
    let bytes: Vec<u8> = (0..byte_len).map(|_| rng.gen()).collect();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
