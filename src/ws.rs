//! `GET /{dialer}/media-stream` — upgrades to the bridge's WebSocket loop.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::response::IntoResponse;

use crate::AppState;

pub async fn handle_media_stream_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(dialer_name): Path<String>,
) -> impl IntoResponse {
    let dialer = match state.dialers.get(&dialer_name) {
        Ok(d) => d,
        Err(e) => {
            tracing::warn!(dialer = %dialer_name, error = %e, "unknown dialer on media-stream upgrade");
            return axum::http::StatusCode::NOT_FOUND.into_response();
        }
    };

    ws.on_upgrade(move |socket| {
        crate::bridge::run_media_stream(
            socket,
            dialer,
            state.agents,
            state.contexts,
            state.config.gateway,
        )
    })
    .into_response()
}
