pub mod elevenlabs;
pub mod room;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::context::DynValue;
use crate::error::AgentError;

/// Canonical event emitted by an agent stream, lazily consumed by the
/// bridge's downstream pump until end-of-stream.
#[derive(Debug, Clone)]
pub enum CanonicalAgentEvent {
    /// PCM 16kHz mono audio from the agent, to be transcoded to the
    /// dialer's wire format by the bridge.
    Audio(Vec<u8>),
    /// Free-form text response from the agent (no audio attached).
    Text(String),
    /// Transcription of speech, tagged with its source (e.g. "user").
    Transcription { text: String, source: String },
    /// The agent detected the caller interrupting playback.
    Interruption,
    /// An error surfaced by the agent transport.
    Error(String),
    /// Provider-specific metadata not otherwise modeled.
    Metadata(serde_json::Value),
}

/// An open connection to a conversational agent. Implementations own the
/// underlying transport (WebSocket, room session) and encapsulate any
/// provider-specific ping/keep-alive handling inside `receive()` — a ping
/// observed there is answered internally and never surfaced as an event.
#[async_trait]
pub trait AgentStream: Send + Sync {
    /// Send the provider's initialization frame carrying the call's
    /// dynamic variables. Must complete before any audio is sent.
    async fn initialize(&mut self) -> Result<(), AgentError>;

    /// Send one chunk of canonical PCM 16kHz audio. Back-pressure from a
    /// slow transport is permitted; silent drops are not.
    async fn send_audio(&mut self, pcm: &[u8]) -> Result<(), AgentError>;

    /// Receive the next canonical event, or `None` at end-of-stream.
    async fn receive(&mut self) -> Option<CanonicalAgentEvent>;

    /// Idempotent close of the underlying transport.
    async fn close(&mut self);
}

/// Factory for agent connections, registered under a provider name
/// ("elevenlabs", "room", ...) in the agent `PluginRegistry`.
#[async_trait]
pub trait AgentPlugin: Send + Sync {
    /// Establish a connection to the agent. Performs any out-of-band
    /// handshake (signed-URL exchange, job dispatch) before returning the
    /// open stream.
    async fn connect(
        &self,
        agent_id: &str,
        dynamic_variables: &HashMap<String, DynValue>,
    ) -> Result<Box<dyn AgentStream>, AgentError>;

    /// Provider name this plugin registers under.
    fn name(&self) -> &str;

    /// Whether this plugin's required configuration (API keys, base URLs)
    /// is present and well-formed.
    fn validate_config(&self) -> bool;
}
