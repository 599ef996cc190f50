//! Reference JSON/WebSocket agent: ElevenLabs Conversational AI.
//!
//! Connecting exchanges an API key for a signed WebSocket URL (first-use
//! window ~15 minutes), then speaks a small JSON protocol over that socket.
//! Ping/pong keep-alive is handled entirely inside the stream and never
//! surfaces as a canonical event.

use std::collections::HashMap;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::config::ElevenLabsAgentConfig;
use crate::context::DynValue;
use crate::error::AgentError;

use super::{AgentPlugin, AgentStream, CanonicalAgentEvent};

const API_BASE: &str = "https://api.elevenlabs.io/v1";

type WsSocket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

pub struct ElevenLabsAgentStream {
    sink: SplitSink<WsSocket, WsMessage>,
    source: SplitStream<WsSocket>,
    dynamic_variables: HashMap<String, DynValue>,
}

fn build_initialization_message(dynamic_variables: &HashMap<String, DynValue>) -> String {
    let vars: HashMap<String, serde_json::Value> = dynamic_variables
        .iter()
        .map(|(k, v)| (k.clone(), v.clone().into()))
        .collect();
    serde_json::json!({
        "type": "conversation_initiation_client_data",
        "dynamic_variables": vars,
    })
    .to_string()
}

fn build_audio_message(pcm: &[u8]) -> String {
    serde_json::json!({ "user_audio_chunk": BASE64.encode(pcm) }).to_string()
}

/// Parse one raw text message into a canonical event, or `None` if it was
/// a ping the stream already answered internally.
async fn parse_and_maybe_pong(
    raw: &str,
    sink: &mut SplitSink<WsSocket, WsMessage>,
) -> Option<CanonicalAgentEvent> {
    let data: serde_json::Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(_) => return Some(CanonicalAgentEvent::Error("failed to decode JSON".to_string())),
    };

    let msg_type = data.get("type").and_then(|v| v.as_str()).unwrap_or("");
    match msg_type {
        "audio" => {
            let b64 = data
                .get("audio_event")
                .and_then(|a| a.get("audio_base_64"))
                .and_then(|v| v.as_str());
            match b64.and_then(|s| BASE64.decode(s).ok()) {
                Some(bytes) => Some(CanonicalAgentEvent::Audio(bytes)),
                None => None,
            }
        }
        "agent_response_event" => {
            let text = data
                .get("agent_response_event")
                .and_then(|e| e.get("response"))
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            Some(CanonicalAgentEvent::Text(text))
        }
        "user_transcription_event" => {
            let text = data
                .get("user_transcription_event")
                .and_then(|e| e.get("user_transcription"))
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            Some(CanonicalAgentEvent::Transcription {
                text,
                source: "user".to_string(),
            })
        }
        "interruption_event" => Some(CanonicalAgentEvent::Interruption),
        "ping_event" | "ping" => {
            let event_id = data.get("event_id").cloned().unwrap_or(serde_json::Value::Null);
            let pong = serde_json::json!({ "type": "pong_event", "event_id": event_id }).to_string();
            if let Err(e) = sink.send(WsMessage::Text(pong.into())).await {
                tracing::warn!(error = %e, "failed to answer ElevenLabs ping");
            }
            None
        }
        "error" => {
            let message = data
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error")
                .to_string();
            Some(CanonicalAgentEvent::Error(message))
        }
        _ => Some(CanonicalAgentEvent::Metadata(data)),
    }
}

#[async_trait]
impl AgentStream for ElevenLabsAgentStream {
    async fn initialize(&mut self) -> Result<(), AgentError> {
        let msg = build_initialization_message(&self.dynamic_variables);
        self.sink
            .send(WsMessage::Text(msg.into()))
            .await
            .map_err(|e| AgentError::Io(e.to_string()))
    }

    async fn send_audio(&mut self, pcm: &[u8]) -> Result<(), AgentError> {
        let msg = build_audio_message(pcm);
        self.sink
            .send(WsMessage::Text(msg.into()))
            .await
            .map_err(|e| AgentError::Io(e.to_string()))
    }

    async fn receive(&mut self) -> Option<CanonicalAgentEvent> {
        loop {
            let next = self.source.next().await?;
            match next {
                Ok(WsMessage::Text(text)) => {
                    if let Some(event) = parse_and_maybe_pong(&text, &mut self.sink).await {
                        return Some(event);
                    }
                    // a ping was answered internally; keep waiting for the
                    // next frame without surfacing anything
                }
                Ok(WsMessage::Close(_)) => return None,
                Ok(_) => continue,
                Err(e) => return Some(CanonicalAgentEvent::Error(e.to_string())),
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.sink.send(WsMessage::Close(None)).await;
        let _ = self.sink.close().await;
    }
}

pub struct ElevenLabsAgentPlugin {
    config: ElevenLabsAgentConfig,
    http: reqwest::Client,
}

impl ElevenLabsAgentPlugin {
    pub fn new(config: ElevenLabsAgentConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    async fn signed_url(&self, agent_id: &str) -> Result<String, AgentError> {
        let url = format!("{API_BASE}/convai/conversation/get-signed-url");
        let resp = self
            .http
            .get(&url)
            .header("xi-api-key", &self.config.api_key)
            .query(&[("agent_id", agent_id)])
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| AgentError::Handshake(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(AgentError::Handshake(format!("{status}: {body}")));
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| AgentError::Handshake(e.to_string()))?;

        body.get("signed_url")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| AgentError::Handshake("no signed_url in response".to_string()))
    }
}

#[async_trait]
impl AgentPlugin for ElevenLabsAgentPlugin {
    async fn connect(
        &self,
        agent_id: &str,
        dynamic_variables: &HashMap<String, DynValue>,
    ) -> Result<Box<dyn AgentStream>, AgentError> {
        if !self.validate_config() {
            return Err(AgentError::ConfigInvalid(
                "ElevenLabs API key not configured".to_string(),
            ));
        }

        let signed_url = self.signed_url(agent_id).await?;
        tracing::info!(agent_id, "connecting to ElevenLabs agent");

        let (ws, _) = tokio_tungstenite::connect_async(signed_url)
            .await
            .map_err(|e| AgentError::Handshake(e.to_string()))?;

        let (sink, source) = ws.split();
        Ok(Box::new(ElevenLabsAgentStream {
            sink,
            source,
            dynamic_variables: dynamic_variables.clone(),
        }))
    }

    fn name(&self) -> &str {
        "elevenlabs"
    }

    fn validate_config(&self) -> bool {
        if self.config.api_key.is_empty() {
            tracing::error!("ElevenLabs API key is missing");
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialization_message_carries_dynamic_variables() {
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), DynValue::Str("Test Customer".to_string()));
        vars.insert("emi_eligible".to_string(), DynValue::Bool(true));
        let msg = build_initialization_message(&vars);
        let parsed: serde_json::Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(parsed["type"], "conversation_initiation_client_data");
        assert_eq!(parsed["dynamic_variables"]["name"], "Test Customer");
        assert_eq!(parsed["dynamic_variables"]["emi_eligible"], true);
    }

    #[test]
    fn audio_message_wraps_base64_under_user_audio_chunk() {
        let msg = build_audio_message(&[1, 2, 3, 4]);
        let parsed: serde_json::Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(parsed["user_audio_chunk"], BASE64.encode([1, 2, 3, 4]));
    }
}
