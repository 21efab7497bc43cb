use axum::{Router, routing};
use push_deployer::AppState;
use push_deployer::config::DeployerConfig;
use push_deployer::handlers::{handle_webhook, root};
use std::sync::Arc;
use tracing::info;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_CONFIG_PATH: &str = "webhook_config.toml";

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let config_path =
        std::env::var("WEBHOOK_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let port: u16 = match std::env::var("WEBHOOK_PORT") {
        Ok(value) => match value.parse() {
            Ok(port) => port,
            Err(_) => {
                eprintln!("Invalid WEBHOOK_PORT value '{}'", value);
                std::process::exit(1);
            }
        },
        Err(_) => DEFAULT_PORT,
    };

    let config = match DeployerConfig::load(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let state = Arc::new(AppState::new(config));

    tracing_subscriber::fmt::init();
    let app = Router::new()
        .route("/", routing::get(root))
        .route("/webhook", routing::post(handle_webhook))
        .with_state(state.clone());

    // Loopback only; TLS and external exposure are a reverse proxy's job.
    let bind_address = format!("127.0.0.1:{}", port);
    info!("Listening on {}", bind_address);
    info!("Using config at {:?}", config_path);
    info!("{} webhook(s) registered", state.registry.len());
    let listener = tokio::net::TcpListener::bind(bind_address).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
