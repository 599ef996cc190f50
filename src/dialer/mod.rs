pub mod room;
pub mod twilio;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::codec::Resampler;
use crate::context::DynValue;
use crate::error::DialerError;

/// Canonical event parsed from a dialer's wire frame.
#[derive(Debug, Clone)]
pub enum CanonicalDialerEvent {
    Start {
        call_id: String,
        stream_id: String,
        custom_parameters: HashMap<String, String>,
    },
    Media {
        /// Opaque, dialer-encoded audio payload (e.g. base64 µ-law).
        payload: String,
    },
    Stop,
    Mark {
        name: String,
    },
    Dtmf {
        digit: String,
    },
    Unknown,
}

/// Result of a successful outbound-call initiation.
#[derive(Debug, Clone, serde::Serialize)]
pub struct OutboundCallResult {
    pub success: bool,
    pub call_id: String,
    pub to: String,
    pub from: String,
    pub status: String,
    pub message: Option<String>,
}

/// A dialer's codec bridge to/from canonical PCM 16kHz mono. Each stream
/// owns one resampler per direction, constructed fresh at stream start and
/// discarded at stream end so fractional phase carries across frames (I3,
/// §4.1).
pub trait AudioConverter: Send + Sync {
    /// Decode a dialer-encoded payload into canonical PCM bytes, using and
    /// advancing `upstream` resampler state.
    fn dialer_to_pcm(&self, payload: &str, upstream: &mut Resampler) -> Result<Vec<u8>, DialerError>;

    /// Encode canonical PCM bytes into the dialer's wire payload, using and
    /// advancing `downstream` resampler state.
    fn pcm_to_dialer(&self, pcm: &[u8], downstream: &mut Resampler) -> String;

    /// Sample rate this dialer's wire format carries audio at.
    fn dialer_sample_rate(&self) -> u32;
}

/// A dialer's outbound-audio/connection-directive message builder.
pub trait MessageBuilder: Send + Sync {
    /// Build the outbound audio frame(s) to send to the dialer socket for
    /// one PCM chunk already encoded to the dialer's wire payload.
    fn build_audio_message(&self, stream_id: &str, audio_payload: &str) -> String;

    /// Build the inbound-call connection directive (TwiML/XML, JSON, ...)
    /// pointing the dialer at `websocket_url`, optionally carrying
    /// `custom_params` as connection parameters.
    fn build_connection_response(
        &self,
        websocket_url: &str,
        custom_params: Option<&HashMap<String, DynValue>>,
    ) -> String;

    /// Content-Type header the inbound-call handler should send this
    /// directive with.
    fn content_type(&self) -> &'static str;

    /// In-band "service unavailable" directive sent in place of the normal
    /// connection response when inbound-call setup fails — a 200 the dialer
    /// can still act on (e.g. play an apology and hang up), not a 500.
    fn unavailable_response(&self) -> String;
}

/// A registered dialer plugin: codec + parser + builder + outbound-call
/// initiator, matched one-to-one with a provider name in the dialer
/// registry.
#[async_trait]
pub trait DialerPlugin: Send + Sync {
    fn name(&self) -> &str;

    fn audio_converter(&self) -> &dyn AudioConverter;

    fn message_builder(&self) -> &dyn MessageBuilder;

    /// Parse one raw wire message (already deserialized to JSON, or the raw
    /// text/binary frame, depending on the dialer) into a canonical event.
    fn parse_event(&self, raw: &str) -> Result<CanonicalDialerEvent, DialerError>;

    /// Ask the dialer provider to place an outbound call and hand its
    /// media off to `websocket_url`.
    async fn initiate_outbound(
        &self,
        to_number: &str,
        agent_id: &str,
        dynamic_variables: &HashMap<String, DynValue>,
        websocket_url: &str,
    ) -> Result<OutboundCallResult, DialerError>;

    /// Whether this plugin's required configuration (account id, auth
    /// token, phone number) is present and well-formed.
    fn validate_config(&self) -> bool;

    /// Name of the form field this dialer's incoming-call webhook carries
    /// the call identifier under (e.g. Twilio's `CallSid`).
    fn call_id_field(&self) -> &'static str;
}
