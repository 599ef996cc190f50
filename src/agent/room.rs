//! Reference room-based agent. An out-of-band job-dispatch HTTP call
//! returns `{room_token, websocket_url, room_name}`; the stream then opens
//! that URL and speaks a minimal binary/JSON track protocol: `send_audio`
//! publishes a local track frame, `receive()` drains a bounded queue fed
//! by a background task reading the subscribed remote track.

use std::collections::HashMap;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::config::RoomAgentConfig;
use crate::context::DynValue;
use crate::error::AgentError;

use super::{AgentPlugin, AgentStream, CanonicalAgentEvent};

type WsSocket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

const RECEIVE_QUEUE_CAPACITY: usize = 64;

pub struct RoomAgentStream {
    sink: SplitSink<WsSocket, WsMessage>,
    events_rx: mpsc::Receiver<CanonicalAgentEvent>,
    _reader: tokio::task::JoinHandle<()>,
    room_name: String,
}

fn build_init_message(room_name: &str, dynamic_variables: &HashMap<String, DynValue>) -> String {
    let vars: HashMap<String, serde_json::Value> = dynamic_variables
        .iter()
        .map(|(k, v)| (k.clone(), v.clone().into()))
        .collect();
    serde_json::json!({
        "type": "join",
        "room": room_name,
        "dynamic_variables": vars,
    })
    .to_string()
}

fn build_track_audio_message(pcm: &[u8]) -> String {
    serde_json::json!({ "type": "track_audio", "pcm": BASE64.encode(pcm) }).to_string()
}

fn parse_room_agent_message(raw: &str) -> Option<CanonicalAgentEvent> {
    let data: serde_json::Value = serde_json::from_str(raw).ok()?;
    let msg_type = data.get("type").and_then(|v| v.as_str()).unwrap_or("");
    match msg_type {
        "track_audio" => {
            let pcm = data
                .get("pcm")
                .and_then(|v| v.as_str())
                .and_then(|s| BASE64.decode(s).ok())?;
            Some(CanonicalAgentEvent::Audio(pcm))
        }
        "text" => Some(CanonicalAgentEvent::Text(
            data.get("text").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
        )),
        "transcription" => Some(CanonicalAgentEvent::Transcription {
            text: data.get("text").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
            source: data
                .get("source")
                .and_then(|v| v.as_str())
                .unwrap_or("user")
                .to_string(),
        }),
        "interruption" => Some(CanonicalAgentEvent::Interruption),
        "error" => Some(CanonicalAgentEvent::Error(
            data.get("message").and_then(|v| v.as_str()).unwrap_or("unknown error").to_string(),
        )),
        _ => Some(CanonicalAgentEvent::Metadata(data)),
    }
}

#[async_trait]
impl AgentStream for RoomAgentStream {
    async fn initialize(&mut self) -> Result<(), AgentError> {
        // Joining the room is implicit in the websocket connect for this
        // reference transport; nothing further is required before audio.
        tracing::debug!(room = %self.room_name, "room agent stream initialized");
        Ok(())
    }

    async fn send_audio(&mut self, pcm: &[u8]) -> Result<(), AgentError> {
        let msg = build_track_audio_message(pcm);
        self.sink
            .send(WsMessage::Text(msg.into()))
            .await
            .map_err(|e| AgentError::Io(e.to_string()))
    }

    async fn receive(&mut self) -> Option<CanonicalAgentEvent> {
        self.events_rx.recv().await
    }

    async fn close(&mut self) {
        self._reader.abort();
        let _ = self.sink.send(WsMessage::Close(None)).await;
        let _ = self.sink.close().await;
    }
}

#[derive(serde::Deserialize)]
struct JobDispatchResponse {
    room_token: String,
    websocket_url: String,
    room_name: String,
}

pub struct RoomAgentPlugin {
    config: RoomAgentConfig,
    http: reqwest::Client,
}

impl RoomAgentPlugin {
    pub fn new(config: RoomAgentConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    async fn dispatch_job(&self, agent_id: &str) -> Result<JobDispatchResponse, AgentError> {
        let resp = self
            .http
            .post(&self.config.dispatch_url)
            .bearer_auth(&self.config.api_key)
            .json(&serde_json::json!({ "agent_id": agent_id }))
            .timeout(std::time::Duration::from_secs(15))
            .send()
            .await
            .map_err(|e| AgentError::Handshake(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(AgentError::Handshake(format!("{status}: {body}")));
        }

        resp.json::<JobDispatchResponse>()
            .await
            .map_err(|e| AgentError::Handshake(e.to_string()))
    }
}

#[async_trait]
impl AgentPlugin for RoomAgentPlugin {
    async fn connect(
        &self,
        agent_id: &str,
        dynamic_variables: &HashMap<String, DynValue>,
    ) -> Result<Box<dyn AgentStream>, AgentError> {
        if !self.validate_config() {
            return Err(AgentError::ConfigInvalid(
                "room agent dispatch URL/API key not configured".to_string(),
            ));
        }

        let job = self.dispatch_job(agent_id).await?;
        tracing::info!(room = %job.room_name, agent_id, "connecting to room agent");

        let url_with_token = format!("{}?token={}", job.websocket_url, job.room_token);
        let (ws, _) = tokio_tungstenite::connect_async(url_with_token)
            .await
            .map_err(|e| AgentError::Handshake(e.to_string()))?;
        let (mut sink, mut source) = ws.split();

        let init = build_init_message(&job.room_name, dynamic_variables);
        sink.send(WsMessage::Text(init.into()))
            .await
            .map_err(|e| AgentError::Handshake(e.to_string()))?;

        let (events_tx, events_rx) = mpsc::channel(RECEIVE_QUEUE_CAPACITY);
        let reader = tokio::spawn(async move {
            while let Some(next) = source.next().await {
                let event = match next {
                    Ok(WsMessage::Text(text)) => parse_room_agent_message(&text),
                    Ok(WsMessage::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => Some(CanonicalAgentEvent::Error(e.to_string())),
                };
                if let Some(event) = event {
                    if events_tx.send(event).await.is_err() {
                        break;
                    }
                }
            }
        });

        Ok(Box::new(RoomAgentStream {
            sink,
            events_rx,
            _reader: reader,
            room_name: job.room_name,
        }))
    }

    fn name(&self) -> &str {
        "room"
    }

    fn validate_config(&self) -> bool {
        if self.config.api_key.is_empty() || self.config.dispatch_url.is_empty() {
            tracing::error!("room agent dispatch URL or API key not configured");
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_message_carries_room_and_variables() {
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), DynValue::Str("Test".to_string()));
        let msg = build_init_message("room-123", &vars);
        let parsed: serde_json::Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(parsed["room"], "room-123");
        assert_eq!(parsed["dynamic_variables"]["name"], "Test");
    }

    #[test]
    fn parses_track_audio_into_canonical_audio() {
        let raw = serde_json::json!({
            "type": "track_audio",
            "pcm": BASE64.encode([9, 9, 9, 9]),
        })
        .to_string();
        match parse_room_agent_message(&raw).unwrap() {
            CanonicalAgentEvent::Audio(bytes) => assert_eq!(bytes, vec![9, 9, 9, 9]),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
