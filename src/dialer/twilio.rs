//! Reference mu-law/JSON dialer: Twilio Media Streams.
//!
//! Audio arrives base64-encoded mu-law at 8kHz inside a JSON event
//! envelope; TwiML is the connection-directive wire format.

use std::collections::HashMap;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::codec::mulaw;
use crate::codec::Resampler;
use crate::config::TwilioDialerConfig;
use crate::context::DynValue;
use crate::error::DialerError;

use super::{AudioConverter, CanonicalDialerEvent, DialerPlugin, MessageBuilder, OutboundCallResult};

const DIALER_SAMPLE_RATE: u32 = 8_000;

pub struct TwilioAudioConverter;

impl AudioConverter for TwilioAudioConverter {
    fn dialer_to_pcm(&self, payload: &str, upstream: &mut Resampler) -> Result<Vec<u8>, DialerError> {
        let mulaw_bytes = BASE64
            .decode(payload)
            .map_err(|e| DialerError::Decode(e.to_string()))?;
        let pcm_8khz = mulaw::decode_mulaw(&mulaw_bytes);
        let pcm_16khz = upstream.process(&pcm_8khz);
        Ok(crate::codec::pcm_to_bytes(&pcm_16khz))
    }

    fn pcm_to_dialer(&self, pcm: &[u8], downstream: &mut Resampler) -> String {
        let pcm_16khz = crate::codec::bytes_to_pcm(pcm);
        let pcm_8khz = downstream.process(&pcm_16khz);
        let mulaw_bytes = mulaw::encode_mulaw(&pcm_8khz);
        BASE64.encode(mulaw_bytes)
    }

    fn dialer_sample_rate(&self) -> u32 {
        DIALER_SAMPLE_RATE
    }
}

pub struct TwilioMessageBuilder;

impl MessageBuilder for TwilioMessageBuilder {
    fn build_audio_message(&self, stream_id: &str, audio_payload: &str) -> String {
        serde_json::json!({
            "event": "media",
            "streamSid": stream_id,
            "media": { "payload": audio_payload }
        })
        .to_string()
    }

    fn build_connection_response(
        &self,
        websocket_url: &str,
        custom_params: Option<&HashMap<String, DynValue>>,
    ) -> String {
        let mut parameters_xml = String::new();
        if let Some(params) = custom_params {
            for (key, value) in params {
                let value_str = match value {
                    DynValue::Bool(b) => if *b { "true".to_string() } else { "false".to_string() },
                    DynValue::Str(s) => s.clone(),
                    DynValue::Num(n) => n.to_string(),
                };
                parameters_xml.push_str(&format!(
                    "\n            <Parameter name=\"{key}\" value=\"{value_str}\" />"
                ));
            }
        }

        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
<Response>\n    <Connect>\n        <Stream url=\"{websocket_url}\">{parameters_xml}\n        </Stream>\n    </Connect>\n</Response>"
        )
    }

    fn content_type(&self) -> &'static str {
        "application/xml"
    }

    fn unavailable_response(&self) -> String {
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
<Response><Say>Service temporarily unavailable</Say><Hangup/></Response>"
            .to_string()
    }
}

/// Parse a Twilio Media Streams JSON event into a canonical event.
fn parse_twilio_event(raw: &str) -> Result<CanonicalDialerEvent, DialerError> {
    let msg: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| DialerError::Decode(e.to_string()))?;

    let event = msg.get("event").and_then(|v| v.as_str()).unwrap_or("");
    match event {
        "start" => {
            let start = msg.get("start").cloned().unwrap_or_default();
            let call_id = start
                .get("callSid")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let stream_id = start
                .get("streamSid")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let mut custom_parameters = HashMap::new();
            if let Some(obj) = start.get("customParameters").and_then(|v| v.as_object()) {
                for (k, v) in obj {
                    if let Some(s) = v.as_str() {
                        custom_parameters.insert(k.clone(), s.to_string());
                    }
                }
            }
            Ok(CanonicalDialerEvent::Start {
                call_id,
                stream_id,
                custom_parameters,
            })
        }
        "media" => {
            let payload = msg
                .get("media")
                .and_then(|m| m.get("payload"))
                .and_then(|v| v.as_str())
                .ok_or_else(|| DialerError::Decode("media event missing payload".into()))?
                .to_string();
            Ok(CanonicalDialerEvent::Media { payload })
        }
        "stop" => Ok(CanonicalDialerEvent::Stop),
        "mark" => {
            let name = msg
                .get("mark")
                .and_then(|m| m.get("name"))
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            Ok(CanonicalDialerEvent::Mark { name })
        }
        "dtmf" => {
            let digit = msg
                .get("dtmf")
                .and_then(|m| m.get("digit"))
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            Ok(CanonicalDialerEvent::Dtmf { digit })
        }
        _ => Ok(CanonicalDialerEvent::Unknown),
    }
}

pub struct TwilioDialerPlugin {
    config: TwilioDialerConfig,
    http: reqwest::Client,
    audio_converter: TwilioAudioConverter,
    message_builder: TwilioMessageBuilder,
}

impl TwilioDialerPlugin {
    pub fn new(config: TwilioDialerConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            audio_converter: TwilioAudioConverter,
            message_builder: TwilioMessageBuilder,
        }
    }
}

#[async_trait]
impl DialerPlugin for TwilioDialerPlugin {
    fn name(&self) -> &str {
        "twilio"
    }

    fn audio_converter(&self) -> &dyn AudioConverter {
        &self.audio_converter
    }

    fn message_builder(&self) -> &dyn MessageBuilder {
        &self.message_builder
    }

    fn parse_event(&self, raw: &str) -> Result<CanonicalDialerEvent, DialerError> {
        parse_twilio_event(raw)
    }

    async fn initiate_outbound(
        &self,
        to_number: &str,
        agent_id: &str,
        dynamic_variables: &HashMap<String, DynValue>,
        websocket_url: &str,
    ) -> Result<OutboundCallResult, DialerError> {
        let mut custom_params: HashMap<String, DynValue> = dynamic_variables.clone();
        custom_params.insert("agent_id".to_string(), DynValue::Str(agent_id.to_string()));
        custom_params.insert(
            "to_number".to_string(),
            DynValue::Str(to_number.to_string()),
        );

        let twiml = self
            .message_builder
            .build_connection_response(websocket_url, Some(&custom_params));

        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Calls.json",
            self.config.account_sid
        );
        let params = [
            ("To", to_number),
            ("From", &self.config.phone_number),
            ("Twiml", &twiml),
        ];

        let resp = self
            .http
            .post(&url)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&params)
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

        let call_id = body["sid"].as_str().unwrap_or("unknown").to_string();
        let status = body["status"].as_str().unwrap_or("queued").to_string();

        tracing::info!(to = to_number, call_id = %call_id, "outbound Twilio call initiated");

        Ok(OutboundCallResult {
            success: true,
            call_id,
            to: to_number.to_string(),
            from: self.config.phone_number.clone(),
            status,
            message: Some("Outbound call initiated successfully".to_string()),
        })
    }

    fn validate_config(&self) -> bool {
        if self.config.account_sid.is_empty() || !self.config.account_sid.starts_with("AC") {
            tracing::error!("Twilio Account SID missing or malformed");
            return false;
        }
        if self.config.auth_token.is_empty() {
            tracing::error!("Twilio Auth Token not configured");
            return false;
        }
        if !self.config.phone_number.starts_with('+') {
            tracing::error!("Twilio phone number must be in E.164 format");
            return false;
        }
        true
    }

    fn call_id_field(&self) -> &'static str {
        "CallSid"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_start_event_with_custom_parameters() {
        let raw = r#"{"event":"start","start":{"callSid":"CA1","streamSid":"MZ1","customParameters":{"agent_id":"agent_x"}}}"#;
        match parse_twilio_event(raw).unwrap() {
            CanonicalDialerEvent::Start {
                call_id,
                stream_id,
                custom_parameters,
            } => {
                assert_eq!(call_id, "CA1");
                assert_eq!(stream_id, "MZ1");
                assert_eq!(custom_parameters.get("agent_id").unwrap(), "agent_x");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn parses_media_event() {
        let raw = r#"{"event":"media","media":{"payload":"abc123"}}"#;
        match parse_twilio_event(raw).unwrap() {
            CanonicalDialerEvent::Media { payload } => assert_eq!(payload, "abc123"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn parses_stop_and_unknown() {
        assert!(matches!(
            parse_twilio_event(r#"{"event":"stop"}"#).unwrap(),
            CanonicalDialerEvent::Stop
        ));
        assert!(matches!(
            parse_twilio_event(r#"{"event":"frobnicate"}"#).unwrap(),
            CanonicalDialerEvent::Unknown
        ));
    }

    #[test]
    fn media_frame_roundtrip_sample_count() {
        let converter = TwilioAudioConverter;
        let mut upstream = Resampler::new(8_000, 16_000);
        // 160 mu-law bytes == 20ms @ 8kHz, Twilio's standard frame size.
        let mulaw_bytes = vec![0x7Fu8; 160];
        let payload = BASE64.encode(&mulaw_bytes);
        let pcm = converter.dialer_to_pcm(&payload, &mut upstream).unwrap();
        assert_eq!(pcm.len(), 320);
    }

    #[test]
    fn connection_response_embeds_parameters_as_strings() {
        let builder = TwilioMessageBuilder;
        let mut params = HashMap::new();
        params.insert("emi_eligible".to_string(), DynValue::Bool(true));
        let xml = builder.build_connection_response("wss://host/twilio/media-stream", Some(&params));
        assert!(xml.contains("value=\"true\""));
        assert!(xml.contains("<Stream url=\"wss://host/twilio/media-stream\">"));
    }

    #[test]
    fn call_id_field_is_call_sid() {
        let plugin = TwilioDialerPlugin::new(TwilioDialerConfig {
            account_sid: String::new(),
            auth_token: String::new(),
            phone_number: String::new(),
        });
        assert_eq!(plugin.call_id_field(), "CallSid");
    }
}
