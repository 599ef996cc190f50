//! Per-call bridge state machine: relays media between one dialer
//! WebSocket connection and one agent stream.
//!
//! `IDLE -> ACCEPTED -> STARTING -> RUNNING -> CLOSING -> TERMINAL`. Directly
//! modeled on `original_source/app/routers/dialer.py`'s `media_stream`
//! handler and its `receive_from_agent` background task: a `start` event
//! resolves the call's personalization context and opens the agent
//! connection (STARTING); from then on audio is relayed in both directions
//! (RUNNING) until `stop`, disconnect, or I/O failure drive an ordered,
//! fault-tolerant teardown (CLOSING) — stop the downstream pump, close the
//! agent stream, close the dialer socket, delete the call context.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use tokio::sync::mpsc;

use crate::agent::{AgentPlugin, AgentStream, CanonicalAgentEvent};
use crate::codec::Resampler;
use crate::config::GatewayConfig;
use crate::context::{CallContext, CallContextStore, DynValue};
use crate::dialer::{CanonicalDialerEvent, DialerPlugin};
use crate::registry::PluginRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BridgeState {
    Idle,
    Accepted,
    Starting,
    Running,
    Closing,
    Terminal,
}

const AUDIO_CHANNEL_CAPACITY: usize = 64;
const AGENT_EVENT_CHANNEL_CAPACITY: usize = 64;

/// Drive a single call's media stream from upgrade to teardown.
pub async fn run_media_stream(
    mut socket: WebSocket,
    dialer: Arc<dyn DialerPlugin>,
    agents: PluginRegistry<Arc<dyn AgentPlugin>>,
    contexts: CallContextStore,
    gateway: GatewayConfig,
) {
    let mut state = BridgeState::Idle;
    let mut call_id = String::new();
    let mut stream_id = String::new();

    // A fresh resampler per direction, carried for the stream's lifetime and
    // discarded with it (I3, spec §4.1).
    let mut upstream = Resampler::new(dialer.audio_converter().dialer_sample_rate(), crate::codec::CANONICAL_SAMPLE_RATE);
    let mut downstream = Resampler::new(crate::codec::CANONICAL_SAMPLE_RATE, dialer.audio_converter().dialer_sample_rate());

    let mut agent_handle: Option<AgentHandle> = None;

    loop {
        tokio::select! {
            ws_msg = socket.recv() => {
                let raw = match ws_msg {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::info!(call_id = %call_id, "dialer socket closed");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(call_id = %call_id, error = %e, "dialer socket read failed");
                        break;
                    }
                    _ => continue,
                };

                let event = match dialer.parse_event(&raw) {
                    Ok(e) => e,
                    Err(e) => {
                        tracing::warn!(call_id = %call_id, error = %e, "dropping undecodable dialer frame");
                        continue;
                    }
                };

                match event {
                    CanonicalDialerEvent::Start { call_id: cid, stream_id: sid, custom_parameters } => {
                        state = BridgeState::Accepted;
                        call_id = cid;
                        stream_id = sid;
                        tracing::info!(call_id = %call_id, stream_id = %stream_id, "stream started");

                        let context = resolve_context(&contexts, &call_id, &custom_parameters, &gateway).await;
                        let context = match context {
                            Some(c) => c,
                            None => {
                                tracing::error!(call_id = %call_id, "no call context and no usable custom parameters");
                                let _ = socket.close().await;
                                return;
                            }
                        };

                        state = BridgeState::Starting;
                        match start_agent(&agents, &gateway, &context).await {
                            Ok(handle) => {
                                state = BridgeState::Running;
                                agent_handle = Some(handle);
                            }
                            Err(e) => {
                                tracing::error!(call_id = %call_id, error = %e, "failed to start agent, closing dialer socket");
                                let _ = socket.close().await;
                                return;
                            }
                        }
                    }
                    CanonicalDialerEvent::Media { payload } => {
                        let Some(handle) = agent_handle.as_ref() else {
                            tracing::warn!(call_id = %call_id, "media before stream start, dropping");
                            continue;
                        };
                        match dialer.audio_converter().dialer_to_pcm(&payload, &mut upstream) {
                            Ok(pcm) => {
                                if handle.audio_tx.send(pcm).await.is_err() {
                                    tracing::warn!(call_id = %call_id, "agent driver no longer accepting audio");
                                }
                            }
                            Err(e) => tracing::warn!(call_id = %call_id, error = %e, "dropping undecodable media frame"),
                        }
                    }
                    CanonicalDialerEvent::Stop => {
                        tracing::info!(call_id = %call_id, "stream stopped");
                        break;
                    }
                    CanonicalDialerEvent::Mark { name } => {
                        tracing::debug!(call_id = %call_id, mark = %name, "mark received");
                    }
                    CanonicalDialerEvent::Dtmf { digit } => {
                        // Matches the reference implementation: DTMF is
                        // logged, never forwarded to the agent.
                        tracing::debug!(call_id = %call_id, digit = %digit, "dtmf received");
                    }
                    CanonicalDialerEvent::Unknown => {
                        tracing::warn!(call_id = %call_id, "unknown dialer event");
                    }
                }
            }

            Some(event) = async {
                match agent_handle.as_mut() {
                    Some(handle) => handle.events_rx.recv().await,
                    None => std::future::pending().await,
                }
            } => {
                match event {
                    CanonicalAgentEvent::Audio(pcm) => {
                        let payload = dialer.audio_converter().pcm_to_dialer(&pcm, &mut downstream);
                        let msg = dialer.message_builder().build_audio_message(&stream_id, &payload);
                        if let Err(e) = socket.send(Message::Text(msg.into())).await {
                            tracing::warn!(call_id = %call_id, error = %e, "dialer socket write failed");
                            break;
                        }
                    }
                    CanonicalAgentEvent::Text(text) => {
                        tracing::debug!(call_id = %call_id, text = %text, "agent text response");
                    }
                    CanonicalAgentEvent::Transcription { text, source } => {
                        tracing::debug!(call_id = %call_id, source = %source, text = %text, "agent transcription");
                    }
                    CanonicalAgentEvent::Interruption => {
                        tracing::debug!(call_id = %call_id, "agent reported interruption");
                    }
                    CanonicalAgentEvent::Error(message) => {
                        tracing::warn!(call_id = %call_id, error = %message, "agent stream error");
                        break;
                    }
                    CanonicalAgentEvent::Metadata(value) => {
                        tracing::trace!(call_id = %call_id, metadata = %value, "agent metadata");
                    }
                }
            }
        }
    }

    state = BridgeState::Closing;
    tracing::debug!(call_id = %call_id, ?state, "entering cleanup");

    if let Some(handle) = agent_handle.take() {
        drop(handle.audio_tx);
        let _ = handle.driver.await;
    }
    let _ = socket.close().await;
    if !call_id.is_empty() {
        contexts.delete(&call_id).await;
    }

    state = BridgeState::Terminal;
    tracing::info!(call_id = %call_id, ?state, "call cleaned up");
}

struct AgentHandle {
    audio_tx: mpsc::Sender<Vec<u8>>,
    events_rx: mpsc::Receiver<CanonicalAgentEvent>,
    driver: tokio::task::JoinHandle<()>,
}

/// Resolve the call's personalization context: prefer one seeded ahead of
/// time (outbound calls), else build one from the `start` event's custom
/// parameters (inbound calls), matching
/// `original_source/app/routers/dialer.py`'s fallback order.
async fn resolve_context(
    contexts: &CallContextStore,
    call_id: &str,
    custom_parameters: &std::collections::HashMap<String, String>,
    gateway: &GatewayConfig,
) -> Option<CallContext> {
    if let Ok(context) = contexts.consume(call_id).await {
        return Some(context);
    }

    let agent_id = custom_parameters
        .get("agent_id")
        .cloned()
        .or_else(|| gateway.default_agent_id.clone())?;

    let mut context = CallContext::new(agent_id);
    for (key, value) in custom_parameters {
        if key == "agent_id" {
            continue;
        }
        context = context.with_variable(key.clone(), DynValue::coerce(value));
    }
    Some(context)
}

async fn start_agent(
    agents: &PluginRegistry<Arc<dyn AgentPlugin>>,
    gateway: &GatewayConfig,
    context: &CallContext,
) -> Result<AgentHandle, crate::error::AgentError> {
    let agent = agents
        .get(&gateway.default_agent)
        .map_err(|e| crate::error::AgentError::ConfigInvalid(e.to_string()))?;

    let mut stream = agent.connect(&context.agent_id, &context.dynamic_variables).await?;
    stream.initialize().await?;

    let (audio_tx, audio_rx) = mpsc::channel(AUDIO_CHANNEL_CAPACITY);
    let (events_tx, events_rx) = mpsc::channel(AGENT_EVENT_CHANNEL_CAPACITY);
    let driver = tokio::spawn(drive_agent(stream, audio_rx, events_tx));

    Ok(AgentHandle { audio_tx, events_rx, driver })
}

/// Owns the agent stream exclusively for its lifetime, multiplexing
/// outbound audio chunks and inbound canonical events so the bridge's main
/// loop never needs mutable access to the stream directly.
async fn drive_agent(
    mut stream: Box<dyn AgentStream>,
    mut audio_rx: mpsc::Receiver<Vec<u8>>,
    events_tx: mpsc::Sender<CanonicalAgentEvent>,
) {
    loop {
        tokio::select! {
            chunk = audio_rx.recv() => {
                match chunk {
                    Some(pcm) => {
                        if let Err(e) = stream.send_audio(&pcm).await {
                            tracing::warn!(error = %e, "agent send_audio failed");
                            break;
                        }
                    }
                    None => break,
                }
            }
            event = stream.receive() => {
                match event {
                    Some(event) => {
                        if events_tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }
    stream.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn resolve_context_prefers_stored_context() {
        let contexts = CallContextStore::new();
        contexts
            .store("CA1", CallContext::new("agent_stored"))
            .await;
        let gateway = GatewayConfig {
            default_dialer: "twilio".to_string(),
            default_agent: "elevenlabs".to_string(),
            default_agent_id: None,
        };
        let resolved = resolve_context(&contexts, "CA1", &HashMap::new(), &gateway)
            .await
            .unwrap();
        assert_eq!(resolved.agent_id, "agent_stored");
    }

    #[tokio::test]
    async fn resolve_context_builds_from_custom_parameters() {
        let contexts = CallContextStore::new();
        let gateway = GatewayConfig {
            default_dialer: "twilio".to_string(),
            default_agent: "elevenlabs".to_string(),
            default_agent_id: None,
        };
        let mut params = HashMap::new();
        params.insert("agent_id".to_string(), "agent_x".to_string());
        params.insert("to_number".to_string(), "+15550100".to_string());
        params.insert("emi_eligible".to_string(), "true".to_string());

        let resolved = resolve_context(&contexts, "CA2", &params, &gateway)
            .await
            .unwrap();
        assert_eq!(resolved.agent_id, "agent_x");
        assert_eq!(
            resolved.dynamic_variables.get("to_number"),
            Some(&DynValue::Str("+15550100".to_string()))
        );
        assert_eq!(
            resolved.dynamic_variables.get("emi_eligible"),
            Some(&DynValue::Bool(true))
        );
        assert!(!resolved.dynamic_variables.contains_key("agent_id"));
    }

    #[tokio::test]
    async fn resolve_context_none_without_context_or_agent_id() {
        let contexts = CallContextStore::new();
        let gateway = GatewayConfig {
            default_dialer: "twilio".to_string(),
            default_agent: "elevenlabs".to_string(),
            default_agent_id: None,
        };
        assert!(resolve_context(&contexts, "CA3", &HashMap::new(), &gateway)
            .await
            .is_none());
    }
}
