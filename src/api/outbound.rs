use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::context::DynValue;
use crate::error::GatewayError;
use crate::AppState;

use super::build_websocket_url;

#[derive(Debug, Deserialize)]
pub struct OutboundCallRequest {
    pub agent_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub metadata: OutboundCallMetadata,
}

#[derive(Debug, Default, Deserialize)]
pub struct OutboundCallMetadata {
    pub to_number: Option<String>,
    #[serde(default)]
    pub dynamic_variables: HashMap<String, serde_json::Value>,
}

/// `POST /{dialer}/outbound-call` — place an outbound call and point its
/// media stream back at this gateway. Modeled on
/// `original_source/app/routers/dialer.py::initiate_outbound_call`.
pub async fn handle_outbound_call(
    State(state): State<AppState>,
    Path(dialer_name): Path<String>,
    headers: HeaderMap,
    Json(req): Json<OutboundCallRequest>,
) -> impl IntoResponse {
    match run(state, dialer_name, headers, req).await {
        Ok(result) => (axum::http::StatusCode::OK, Json(result)).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn run(
    state: AppState,
    dialer_name: String,
    headers: HeaderMap,
    req: OutboundCallRequest,
) -> Result<crate::dialer::OutboundCallResult, GatewayError> {
    let provided_key = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !state.config.api.is_allowed(provided_key) {
        return Err(GatewayError::Unauthorized);
    }

    let dialer = state.dialers.get(&dialer_name)?;
    if !dialer.validate_config() {
        return Err(GatewayError::ConfigInvalid(format!(
            "dialer '{dialer_name}' is misconfigured"
        )));
    }

    let to_number = req
        .metadata
        .to_number
        .filter(|n| !n.is_empty())
        .ok_or_else(|| GatewayError::BadRequest("missing to_number".to_string()))?;

    let agent_id = req
        .agent_id
        .or_else(|| state.config.gateway.default_agent_id.clone())
        .unwrap_or_default();

    let dynamic_variables: HashMap<String, DynValue> = req
        .metadata
        .dynamic_variables
        .into_iter()
        .map(|(k, v)| {
            let value = match v {
                serde_json::Value::Bool(b) => DynValue::Bool(b),
                serde_json::Value::Number(n) => DynValue::Num(n.as_f64().unwrap_or_default()),
                serde_json::Value::String(s) => DynValue::Str(s),
                other => DynValue::Str(other.to_string()),
            };
            (k, value)
        })
        .collect();

    let websocket_url = build_websocket_url(&state.config.server, &dialer_name);

    tracing::info!(
        dialer = %dialer_name,
        to = %to_number,
        session_id = %req.session_id.as_deref().unwrap_or("none"),
        "initiating outbound call"
    );

    let result = dialer
        .initiate_outbound(&to_number, &agent_id, &dynamic_variables, &websocket_url)
        .await?;

    Ok(result)
}
