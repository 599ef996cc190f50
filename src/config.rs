use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub dialers: DialersConfig,
    pub agents: AgentsConfig,
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub external_url: String,
    #[serde(default = "default_environment")]
    pub environment: String,
}

fn default_environment() -> String {
    "development".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct DialersConfig {
    pub twilio: TwilioDialerConfig,
    pub room: RoomDialerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TwilioDialerConfig {
    #[serde(default)]
    pub account_sid: String,
    #[serde(default)]
    pub auth_token: String,
    #[serde(default)]
    pub phone_number: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RoomDialerConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_base_url: String,
    #[serde(default = "default_room_identity")]
    pub room_identity: String,
}

fn default_room_identity() -> String {
    "voice-gateway".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentsConfig {
    pub elevenlabs: ElevenLabsAgentConfig,
    pub room: RoomAgentConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ElevenLabsAgentConfig {
    #[serde(default)]
    pub api_key: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RoomAgentConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub dispatch_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    #[serde(default = "default_dialer")]
    pub default_dialer: String,
    #[serde(default = "default_agent")]
    pub default_agent: String,
    /// Fallback agent_id used when neither stored context nor custom
    /// parameters carry one. Unset means a missing agent_id is an error
    /// rather than silently defaulting to a literal agent ID.
    #[serde(default)]
    pub default_agent_id: Option<String>,
}

fn default_dialer() -> String {
    "twilio".to_string()
}

fn default_agent() -> String {
    "elevenlabs".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ApiConfig {
    /// Comma-separated API keys accepted on the `X-API-Key` header for
    /// outbound-call requests.
    #[serde(default)]
    pub allowed_keys: String,
}

impl ApiConfig {
    pub fn is_allowed(&self, candidate: &str) -> bool {
        !candidate.is_empty()
            && self
                .allowed_keys
                .split(',')
                .map(str::trim)
                .any(|k| !k.is_empty() && k == candidate)
    }
}

impl Config {
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let env_path = config_dir().join(".env");
        match dotenvy::from_path(&env_path) {
            Ok(()) => tracing::info!("Loaded .env from {}", env_path.display()),
            Err(dotenvy::Error::Io(_)) => {
                tracing::debug!(
                    "No .env file at {}, using environment only",
                    env_path.display()
                );
            }
            Err(e) => tracing::warn!("Failed to parse .env: {e}"),
        }

        let path = config_path();
        tracing::info!("Loading config from {}", path.display());

        let contents = std::fs::read_to_string(&path).map_err(|e| {
            format!(
                "Failed to read config at {}: {}. Copy config.example.toml to {}",
                path.display(),
                e,
                path.display()
            )
        })?;

        let mut config: Config = toml::from_str(&contents)?;

        if let Ok(v) = std::env::var("TWILIO_ACCOUNT_SID") {
            config.dialers.twilio.account_sid = v;
        }
        if let Ok(v) = std::env::var("TWILIO_AUTH_TOKEN") {
            config.dialers.twilio.auth_token = v;
        }
        if let Ok(v) = std::env::var("TWILIO_PHONE_NUMBER") {
            config.dialers.twilio.phone_number = v;
        }
        if let Ok(v) = std::env::var("ROOM_DIALER_API_KEY") {
            config.dialers.room.api_key = v;
        }
        if let Ok(v) = std::env::var("ELEVENLABS_API_KEY") {
            config.agents.elevenlabs.api_key = v;
        }
        if let Ok(v) = std::env::var("ROOM_AGENT_API_KEY") {
            config.agents.room.api_key = v;
        }
        if let Ok(v) = std::env::var("VOICE_GATEWAY_API_KEYS") {
            config.api.allowed_keys = v;
        }
        if let Ok(v) = std::env::var("SERVER_EXTERNAL_URL") {
            config.server.external_url = v;
        }

        Ok(config)
    }
}

fn config_dir() -> PathBuf {
    if let Ok(p) = std::env::var("VOICE_GATEWAY_CONFIG") {
        let path = PathBuf::from(p);
        return path.parent().map(|p| p.to_path_buf()).unwrap_or(path);
    }

    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".voice-gateway")
}

fn config_path() -> PathBuf {
    if let Ok(p) = std::env::var("VOICE_GATEWAY_CONFIG") {
        return PathBuf::from(p);
    }

    config_dir().join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_allowlist_is_comma_separated() {
        let api = ApiConfig {
            allowed_keys: "key1, key2,key3".to_string(),
        };
        assert!(api.is_allowed("key1"));
        assert!(api.is_allowed("key2"));
        assert!(api.is_allowed("key3"));
        assert!(!api.is_allowed("key4"));
        assert!(!api.is_allowed(""));
    }
}
