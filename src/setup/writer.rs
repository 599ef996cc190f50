use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use super::ansi;
use super::prompts::confirm;

/// All values collected from the wizard prompts.
pub struct SetupValues {
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_phone_number: String,
    pub room_dialer_api_key: String,
    pub room_dialer_api_base_url: String,
    pub elevenlabs_api_key: String,
    pub room_agent_api_key: String,
    pub room_agent_dispatch_url: String,
    pub default_dialer: String,
    pub default_agent: String,
    pub external_url: String,
    pub api_key: String,
}

/// Write config.toml and .env to ~/.voice-gateway/. Returns the config
/// directory path.
pub fn write_config(values: &SetupValues) -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let config_dir = PathBuf::from(home).join(".voice-gateway");

    println!("\n  {} Writing configuration", ansi::bold(">>"));

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir).expect("Failed to create ~/.voice-gateway");
    }

    let config_path = config_dir.join("config.toml");
    if config_path.exists() {
        println!("  {} config.toml already exists", ansi::yellow("!"));
        if !confirm("Overwrite?") {
            println!("  Skipping config.toml");
        } else {
            write_config_toml(&config_path, values);
        }
    } else {
        write_config_toml(&config_path, values);
    }

    let env_path = config_dir.join(".env");
    if env_path.exists() {
        println!("  {} .env already exists", ansi::yellow("!"));
        if !confirm("Overwrite?") {
            println!("  Skipping .env");
        } else {
            write_env_file(&env_path, values);
        }
    } else {
        write_env_file(&env_path, values);
    }

    config_dir
}

fn write_config_toml(path: &Path, values: &SetupValues) {
    let content = format!(
        r#"[server]
host = "0.0.0.0"
port = 8443
environment = "production"
# Secret loaded from .env (SERVER_EXTERNAL_URL)
external_url = ""

[dialers.twilio]
# Secrets loaded from .env (TWILIO_ACCOUNT_SID, TWILIO_AUTH_TOKEN)
account_sid = ""
auth_token = ""
phone_number = "{twilio_phone_number}"

[dialers.room]
# Secret loaded from .env (ROOM_DIALER_API_KEY)
api_key = ""
api_base_url = "{room_dialer_api_base_url}"
room_identity = "voice-gateway"

[agents.elevenlabs]
# Secret loaded from .env (ELEVENLABS_API_KEY)
api_key = ""

[agents.room]
# Secret loaded from .env (ROOM_AGENT_API_KEY)
api_key = ""
dispatch_url = "{room_agent_dispatch_url}"

[gateway]
default_dialer = "{default_dialer}"
default_agent = "{default_agent}"

[api]
# Secret loaded from .env (VOICE_GATEWAY_API_KEYS)
allowed_keys = ""
"#,
        twilio_phone_number = values.twilio_phone_number,
        room_dialer_api_base_url = values.room_dialer_api_base_url,
        room_agent_dispatch_url = values.room_agent_dispatch_url,
        default_dialer = values.default_dialer,
        default_agent = values.default_agent,
    );

    fs::write(path, content).expect("Failed to write config.toml");
    println!("  {} {}", ansi::green("\u{2713}"), path.display());
}

fn write_env_file(path: &Path, values: &SetupValues) {
    let content = format!(
        r#"# Twilio
TWILIO_ACCOUNT_SID={twilio_sid}
TWILIO_AUTH_TOKEN={twilio_token}

# Room dialer
ROOM_DIALER_API_KEY={room_dialer_key}

# ElevenLabs agent
ELEVENLABS_API_KEY={elevenlabs_key}

# Room agent
ROOM_AGENT_API_KEY={room_agent_key}

# API keys accepted on X-API-Key for outbound calls (comma-separated)
VOICE_GATEWAY_API_KEYS={api_key}

# Public URL dialers can reach this gateway at
SERVER_EXTERNAL_URL={external_url}
"#,
        twilio_sid = values.twilio_account_sid,
        twilio_token = values.twilio_auth_token,
        room_dialer_key = values.room_dialer_api_key,
        elevenlabs_key = values.elevenlabs_api_key,
        room_agent_key = values.room_agent_api_key,
        api_key = values.api_key,
        external_url = values.external_url,
    );

    fs::write(path, &content).expect("Failed to write .env");

    let perms = fs::Permissions::from_mode(0o600);
    fs::set_permissions(path, perms).expect("Failed to set .env permissions");

    println!(
        "  {} {} {}",
        ansi::green("\u{2713}"),
        path.display(),
        ansi::dim("(mode 0600)")
    );
}

/// Write a systemd service unit to /etc/systemd/system/.
pub fn install_systemd() {
    let unit = r#"[Unit]
Description=voice-gateway — real-time voice bridge
After=network.target

[Service]
Type=simple
User=root
ExecStart=/usr/local/bin/voice-gateway
Environment=RUST_LOG=voice_gateway=info,tower_http=info
Restart=on-failure
RestartSec=5

[Install]
WantedBy=multi-user.target
"#;

    let path = Path::new("/etc/systemd/system/voice-gateway.service");
    match fs::write(path, unit) {
        Ok(_) => {
            println!("  {} {}", ansi::green("\u{2713}"), path.display());
            println!(
                "  {}",
                ansi::dim("Run: systemctl daemon-reload && systemctl enable --now voice-gateway")
            );
        }
        Err(e) => {
            println!(
                "  {} Failed to write service: {} (try running with sudo)",
                ansi::red("\u{2717}"),
                e
            );
        }
    }
}

/// Copy the current binary to /usr/local/bin/voice-gateway.
pub fn install_binary() {
    let current_exe = std::env::current_exe().expect("Failed to get current executable path");
    let target = Path::new("/usr/local/bin/voice-gateway");

    match fs::copy(&current_exe, target) {
        Ok(_) => {
            let perms = fs::Permissions::from_mode(0o755);
            fs::set_permissions(target, perms).ok();
            println!("  {} Copied to {}", ansi::green("\u{2713}"), target.display());
        }
        Err(e) => {
            println!(
                "  {} Failed to copy binary: {} (try running with sudo)",
                ansi::red("\u{2717}"),
                e
            );
        }
    }
}
