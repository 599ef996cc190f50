pub mod inbound;
pub mod outbound;

use crate::config::ServerConfig;

/// Build the WebSocket URL the dialer's connection directive should point
/// its media stream at. Mirrors `original_source/app/routers/dialer.py`'s
/// `build_websocket_url`: the configured host is used as-is, falling back to
/// `localhost` for a wildcard bind address, and the port is dropped only in
/// production on the default TLS ports.
pub fn build_websocket_url(server: &ServerConfig, dialer_name: &str) -> String {
    let host = if server.host == "0.0.0.0" {
        "localhost"
    } else {
        &server.host
    };

    let drop_port = server.environment == "production" && matches!(server.port, 80 | 443);
    if drop_port {
        format!("wss://{host}/{dialer_name}/media-stream")
    } else {
        format!("wss://{host}:{}/{dialer_name}/media-stream", server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(host: &str, port: u16, environment: &str) -> ServerConfig {
        ServerConfig {
            host: host.to_string(),
            port,
            external_url: String::new(),
            environment: environment.to_string(),
        }
    }

    #[test]
    fn wildcard_host_becomes_localhost() {
        let url = build_websocket_url(&server("0.0.0.0", 8443, "development"), "twilio");
        assert_eq!(url, "wss://localhost:8443/twilio/media-stream");
    }

    #[test]
    fn production_on_443_drops_port() {
        let url = build_websocket_url(&server("gateway.example.com", 443, "production"), "twilio");
        assert_eq!(url, "wss://gateway.example.com/twilio/media-stream");
    }

    #[test]
    fn development_keeps_port_even_on_443() {
        let url = build_websocket_url(&server("gateway.example.com", 443, "development"), "room");
        assert_eq!(url, "wss://gateway.example.com:443/room/media-stream");
    }
}
