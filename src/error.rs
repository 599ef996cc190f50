//! Per-subsystem error enums. Each maps to one of the gateway's error kinds
//! (auth, not-found, config-invalid, bad-request, context-missing,
//! upstream-io, downstream-io, agent-handshake, decode) and to the HTTP
//! status the ingress layer returns for it.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::registry::NotRegistered;

#[derive(Debug, thiserror::Error)]
pub enum DialerError {
    #[error("HTTP request to dialer provider failed: {0}")]
    Request(String),
    #[error("dialer provider API error: {0}")]
    Api(String),
    #[error("dialer plugin misconfigured: {0}")]
    ConfigInvalid(String),
    #[error("malformed dialer wire frame: {0}")]
    Decode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("agent handshake failed: {0}")]
    Handshake(String),
    #[error("agent plugin misconfigured: {0}")]
    ConfigInvalid(String),
    #[error("agent transport I/O failed: {0}")]
    Io(String),
    #[error("malformed agent wire frame: {0}")]
    Decode(String),
}

/// Errors surfaced at the HTTP ingress layer (outbound-call, incoming-call),
/// mapped directly to the status codes in the interface table.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("missing or invalid API key")]
    Unauthorized,
    #[error("unknown dialer or agent: {0}")]
    NotFound(#[from] NotRegistered),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("plugin misconfigured: {0}")]
    ConfigInvalid(String),
    #[error("no call context for call_id '{0}'")]
    ContextMissing(String),
    #[error(transparent)]
    Dialer(#[from] DialerError),
    #[error(transparent)]
    Agent(#[from] AgentError),
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            GatewayError::Unauthorized => StatusCode::UNAUTHORIZED,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::ContextMissing(_) => StatusCode::BAD_REQUEST,
            GatewayError::ConfigInvalid(_)
            | GatewayError::Dialer(DialerError::ConfigInvalid(_))
            | GatewayError::Agent(AgentError::ConfigInvalid(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            GatewayError::Dialer(_) | GatewayError::Agent(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        tracing::warn!(status = %status, error = %self, "request failed");

        let body = ErrorBody {
            success: false,
            message: self.to_string(),
        };
        let mut response = (status, axum::Json(body)).into_response();
        if matches!(self, GatewayError::Unauthorized) {
            response.headers_mut().insert(
                axum::http::header::WWW_AUTHENTICATE,
                axum::http::HeaderValue::from_static("ApiKey"),
            );
        }
        response
    }
}
