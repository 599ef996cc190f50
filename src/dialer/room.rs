//! Reference PCM/room-session dialer. No LiveKit (or other WebRTC SDK)
//! crate is available here, so this models a room session as a minimal
//! JSON wire protocol over the same WebSocket transport the Twilio dialer
//! uses, carrying canonical PCM directly (16kHz mono) rather than mu-law —
//! the room-session counterpart of Twilio's JSON/mu-law envelope.

use std::collections::HashMap;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::codec::Resampler;
use crate::config::RoomDialerConfig;
use crate::context::DynValue;
use crate::error::DialerError;

use super::{AudioConverter, CanonicalDialerEvent, DialerPlugin, MessageBuilder, OutboundCallResult};

const DIALER_SAMPLE_RATE: u32 = 16_000;

pub struct RoomAudioConverter;

impl AudioConverter for RoomAudioConverter {
    fn dialer_to_pcm(&self, payload: &str, upstream: &mut Resampler) -> Result<Vec<u8>, DialerError> {
        let raw = BASE64
            .decode(payload)
            .map_err(|e| DialerError::Decode(e.to_string()))?;
        // Already canonical rate; resampler is a no-op pass-through but is
        // still advanced so its state stays consistent if config ever
        // changes the room's track rate.
        let pcm = crate::codec::bytes_to_pcm(&raw);
        let pcm = upstream.process(&pcm);
        Ok(crate::codec::pcm_to_bytes(&pcm))
    }

    fn pcm_to_dialer(&self, pcm: &[u8], downstream: &mut Resampler) -> String {
        let samples = crate::codec::bytes_to_pcm(pcm);
        let samples = downstream.process(&samples);
        BASE64.encode(crate::codec::pcm_to_bytes(&samples))
    }

    fn dialer_sample_rate(&self) -> u32 {
        DIALER_SAMPLE_RATE
    }
}

pub struct RoomMessageBuilder;

impl MessageBuilder for RoomMessageBuilder {
    fn build_audio_message(&self, stream_id: &str, audio_payload: &str) -> String {
        serde_json::json!({
            "type": "track_audio",
            "track_id": stream_id,
            "pcm": audio_payload
        })
        .to_string()
    }

    fn build_connection_response(
        &self,
        websocket_url: &str,
        custom_params: Option<&HashMap<String, DynValue>>,
    ) -> String {
        let params: HashMap<String, serde_json::Value> = custom_params
            .map(|m| {
                m.iter()
                    .map(|(k, v)| (k.clone(), v.clone().into()))
                    .collect()
            })
            .unwrap_or_default();

        serde_json::json!({
            "room_url": websocket_url,
            "parameters": params
        })
        .to_string()
    }

    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn unavailable_response(&self) -> String {
        serde_json::json!({ "error": "service_unavailable", "message": "Service temporarily unavailable" })
            .to_string()
    }
}

fn parse_room_event(raw: &str) -> Result<CanonicalDialerEvent, DialerError> {
    let msg: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| DialerError::Decode(e.to_string()))?;

    let event_type = msg.get("type").and_then(|v| v.as_str()).unwrap_or("");
    match event_type {
        "room_joined" => {
            let call_id = msg
                .get("call_id")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let stream_id = msg
                .get("track_id")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let mut custom_parameters = HashMap::new();
            if let Some(obj) = msg.get("parameters").and_then(|v| v.as_object()) {
                for (k, v) in obj {
                    let s = match v {
                        serde_json::Value::String(s) => s.clone(),
                        serde_json::Value::Bool(b) => b.to_string(),
                        other => other.to_string(),
                    };
                    custom_parameters.insert(k.clone(), s);
                }
            }
            Ok(CanonicalDialerEvent::Start {
                call_id,
                stream_id,
                custom_parameters,
            })
        }
        "track_audio" => {
            let payload = msg
                .get("pcm")
                .and_then(|v| v.as_str())
                .ok_or_else(|| DialerError::Decode("track_audio event missing pcm".into()))?
                .to_string();
            Ok(CanonicalDialerEvent::Media { payload })
        }
        "room_left" => Ok(CanonicalDialerEvent::Stop),
        "sync_mark" => {
            let name = msg
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            Ok(CanonicalDialerEvent::Mark { name })
        }
        "dtmf" => {
            let digit = msg
                .get("digit")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            Ok(CanonicalDialerEvent::Dtmf { digit })
        }
        _ => Ok(CanonicalDialerEvent::Unknown),
    }
}

pub struct RoomDialerPlugin {
    config: RoomDialerConfig,
    http: reqwest::Client,
    audio_converter: RoomAudioConverter,
    message_builder: RoomMessageBuilder,
}

impl RoomDialerPlugin {
    pub fn new(config: RoomDialerConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            audio_converter: RoomAudioConverter,
            message_builder: RoomMessageBuilder,
        }
    }
}

#[async_trait]
impl DialerPlugin for RoomDialerPlugin {
    fn name(&self) -> &str {
        "room"
    }

    fn audio_converter(&self) -> &dyn AudioConverter {
        &self.audio_converter
    }

    fn message_builder(&self) -> &dyn MessageBuilder {
        &self.message_builder
    }

    fn parse_event(&self, raw: &str) -> Result<CanonicalDialerEvent, DialerError> {
        parse_room_event(raw)
    }

    async fn initiate_outbound(
        &self,
        to_number: &str,
        agent_id: &str,
        dynamic_variables: &HashMap<String, DynValue>,
        websocket_url: &str,
    ) -> Result<OutboundCallResult, DialerError> {
        let mut params = dynamic_variables.clone();
        params.insert("agent_id".to_string(), DynValue::Str(agent_id.to_string()));
        params.insert(
            "to_number".to_string(),
            DynValue::Str(to_number.to_string()),
        );

        let directive = self
            .message_builder
            .build_connection_response(websocket_url, Some(&params));

        let url = format!("{}/rooms/dispatch", self.config.api_base_url);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .header("content-type", "application/json")
            .body(directive)
            .timeout(std::time::Duration::from_secs(15))
            .send()
            .await
            .map_err(|e| DialerError::Request(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(DialerError::Api(format!("{status}: {body}")));
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| DialerError::Request(e.to_string()))?;

        let call_id = body["call_id"]
            .as_str()
            .unwrap_or("unknown")
            .to_string();

        Ok(OutboundCallResult {
            success: true,
            call_id,
            to: to_number.to_string(),
            from: self.config.room_identity.clone(),
            status: "dispatched".to_string(),
            message: Some("Room dispatch initiated successfully".to_string()),
        })
    }

    fn validate_config(&self) -> bool {
        if self.config.api_key.is_empty() {
            tracing::error!("room dialer API key not configured");
            return false;
        }
        if self.config.api_base_url.is_empty() {
            tracing::error!("room dialer API base URL not configured");
            return false;
        }
        true
    }

    fn call_id_field(&self) -> &'static str {
        "call_id"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_room_joined_with_parameters() {
        let raw = r#"{"type":"room_joined","call_id":"RM1","track_id":"tr_1","parameters":{"agent_id":"agent_x"}}"#;
        match parse_room_event(raw).unwrap() {
            CanonicalDialerEvent::Start {
                call_id,
                stream_id,
                custom_parameters,
            } => {
                assert_eq!(call_id, "RM1");
                assert_eq!(stream_id, "tr_1");
                assert_eq!(custom_parameters.get("agent_id").unwrap(), "agent_x");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn pcm_passthrough_preserves_sample_count() {
        let converter = RoomAudioConverter;
        let mut upstream = Resampler::new(16_000, 16_000);
        let samples = vec![42i16; 320];
        let payload = BASE64.encode(crate::codec::pcm_to_bytes(&samples));
        let pcm = converter.dialer_to_pcm(&payload, &mut upstream).unwrap();
        assert_eq!(pcm.len(), samples.len() * 2);
    }

    #[test]
    fn unknown_event_type_is_unknown() {
        assert!(matches!(
            parse_room_event(r#"{"type":"frobnicate"}"#).unwrap(),
            CanonicalDialerEvent::Unknown
        ));
    }

    #[test]
    fn call_id_field_is_call_id() {
        let plugin = RoomDialerPlugin::new(RoomDialerConfig {
            api_key: String::new(),
            api_base_url: String::new(),
            room_identity: "voice-gateway".to_string(),
        });
        assert_eq!(plugin.call_id_field(), "call_id");
    }
}
