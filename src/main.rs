mod agent;
mod api;
mod bridge;
mod codec;
mod config;
mod context;
mod dialer;
mod error;
pub mod registry;
mod setup;
mod ws;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use agent::elevenlabs::ElevenLabsAgentPlugin;
use agent::room::RoomAgentPlugin;
use agent::AgentPlugin;
use api::inbound::{InboundContextResolver, StaticDemoResolver};
use config::Config;
use context::CallContextStore;
use dialer::room::RoomDialerPlugin;
use dialer::twilio::TwilioDialerPlugin;
use dialer::DialerPlugin;
use registry::PluginRegistry;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shared application state accessible from every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub dialers: PluginRegistry<Arc<dyn DialerPlugin>>,
    pub agents: PluginRegistry<Arc<dyn AgentPlugin>>,
    pub contexts: CallContextStore,
    pub inbound_resolver: Arc<dyn InboundContextResolver>,
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("--setup") => setup::run(),
        Some("--version") => println!("voice-gateway {VERSION}"),
        Some("--help") | Some("-h") => print_usage(),
        Some(other) => {
            eprintln!("Unknown option: {other}");
            print_usage();
            std::process::exit(1);
        }
        None => {
            let rt = tokio::runtime::Runtime::new().expect("Failed to create tokio runtime");
            rt.block_on(server());
        }
    }
}

fn print_usage() {
    println!("voice-gateway {VERSION}");
    println!("Real-time voice bridge between telephony dialers and conversational AI agents");
    println!();
    println!("Usage: voice-gateway [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --setup     Run interactive configuration wizard");
    println!("  --version   Print version");
    println!("  --help, -h  Print this help message");
    println!();
    println!("Without options, starts the gateway server.");
}

async fn server() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voice_gateway=info,tower_http=info".into()),
        )
        .init();

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        "Starting voice-gateway"
    );

    let dialers: PluginRegistry<Arc<dyn DialerPlugin>> = PluginRegistry::new();
    dialers.register(
        "twilio",
        Arc::new(TwilioDialerPlugin::new(config.dialers.twilio.clone())),
    );
    dialers.register(
        "room",
        Arc::new(RoomDialerPlugin::new(config.dialers.room.clone())),
    );

    let agents: PluginRegistry<Arc<dyn AgentPlugin>> = PluginRegistry::new();
    agents.register(
        "elevenlabs",
        Arc::new(ElevenLabsAgentPlugin::new(config.agents.elevenlabs.clone())),
    );
    agents.register(
        "room",
        Arc::new(RoomAgentPlugin::new(config.agents.room.clone())),
    );

    let inbound_resolver: Arc<dyn InboundContextResolver> = Arc::new(StaticDemoResolver {
        default_agent_id: config
            .gateway
            .default_agent_id
            .clone()
            .unwrap_or_else(|| "agent_7201keyx3brmfk68gdwytc6a4tna".to_string()),
    });

    let state = AppState {
        config: config.clone(),
        dialers,
        agents,
        contexts: CallContextStore::new(),
        inbound_resolver,
    };

    // CORS is only needed for browser-based clients talking to the non-production
    // deployments the setup wizard targets; production sits behind dialer/agent
    // webhooks only, never a browser origin.
    let cors = (config.server.environment != "production").then(CorsLayer::permissive);

    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/{dialer}/outbound-call", post(api::outbound::handle_outbound_call))
        .route("/{dialer}/incoming-call", post(api::inbound::handle_incoming_call))
        .route("/{dialer}/media-stream", get(ws::handle_media_stream_upgrade))
        .layer(TraceLayer::new_for_http())
        .layer(tower::util::option_layer(cors))
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .expect("Invalid server address");

    tracing::info!(%addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind");

    axum::serve(listener, app).await.expect("Server error");
}

#[derive(Serialize)]
struct RootResponse {
    service: &'static str,
    version: &'static str,
    status: &'static str,
}

async fn root() -> axum::Json<RootResponse> {
    axum::Json(RootResponse {
        service: "voice-gateway",
        version: VERSION,
        status: "running",
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
}

async fn health() -> axum::Json<HealthResponse> {
    axum::Json(HealthResponse {
        status: "healthy",
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
