use std::collections::HashMap;

use async_trait::async_trait;
use axum::extract::{Form, Path, State};
use axum::response::{IntoResponse, Response};

use crate::context::{CallContext, DynValue};
use crate::AppState;

use super::build_websocket_url;

/// Resolves the personalization context an inbound call should carry,
/// decoupling `handle_incoming_call` from any particular backing store.
/// Grounded on `original_source/app/routers/dialer.py::handle_incoming_call`,
/// whose hardcoded `agent_id` + demo customer payload is reproduced here as
/// the default implementation; a real deployment swaps in one backed by a
/// CRM or database lookup.
#[async_trait]
pub trait InboundContextResolver: Send + Sync {
    async fn resolve(&self, dialer_name: &str) -> CallContext;
}

/// Static demo resolver matching the reference implementation's hardcoded
/// fallback: a fixed agent and a fixed customer-context payload.
pub struct StaticDemoResolver {
    pub default_agent_id: String,
}

#[async_trait]
impl InboundContextResolver for StaticDemoResolver {
    async fn resolve(&self, _dialer_name: &str) -> CallContext {
        CallContext::new(self.default_agent_id.clone())
            .with_variable("name", DynValue::Str("Demo Customer".to_string()))
            .with_variable("due_date", DynValue::Str("2026-08-01".to_string()))
            .with_variable("total_enr_amount", DynValue::Str("1200".to_string()))
            .with_variable("emi_eligibility", DynValue::Bool(true))
            .with_variable("waiver_eligible", DynValue::Bool(false))
            .with_variable("emi_eligible", DynValue::Bool(true))
    }
}

/// `POST /{dialer}/incoming-call` — respond with the dialer's connection
/// directive pointing at this gateway's media-stream endpoint. On any
/// failure, returns 200 with the dialer's own in-band "service unavailable"
/// directive rather than a 500, matching spec §7.
pub async fn handle_incoming_call(
    State(state): State<AppState>,
    Path(dialer_name): Path<String>,
    form: Option<Form<HashMap<String, String>>>,
) -> Response {
    let dialer = match state.dialers.get(&dialer_name) {
        Ok(d) => d,
        Err(e) => {
            tracing::warn!(dialer = %dialer_name, error = %e, "unknown dialer on incoming call");
            return axum::http::StatusCode::NOT_FOUND.into_response();
        }
    };

    if !dialer.validate_config() {
        tracing::error!(dialer = %dialer_name, "dialer misconfigured, sending in-band unavailable directive");
        return (
            [("content-type", dialer.message_builder().content_type())],
            dialer.message_builder().unavailable_response(),
        )
            .into_response();
    }

    let call_id = form
        .as_ref()
        .and_then(|Form(fields)| fields.get(dialer.call_id_field()).cloned());

    let websocket_url = build_websocket_url(&state.config.server, &dialer_name);
    let context = state.inbound_resolver.resolve(&dialer_name).await;

    if let Some(call_id) = call_id {
        state.contexts.store(call_id, context.clone()).await;
    } else {
        tracing::warn!(
            dialer = %dialer_name,
            field = dialer.call_id_field(),
            "incoming-call webhook carried no call id, context will not be stored"
        );
    }

    let mut params: HashMap<String, DynValue> = context.dynamic_variables.clone();
    params.insert("agent_id".to_string(), DynValue::Str(context.agent_id));

    let body = dialer
        .message_builder()
        .build_connection_response(&websocket_url, Some(&params));

    (
        [("content-type", dialer.message_builder().content_type())],
        body,
    )
        .into_response()
}
