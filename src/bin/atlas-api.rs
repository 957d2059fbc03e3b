use std::net::SocketAddr;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use atlas_directory::chain::ChainReader;
use atlas_directory::{web_api, ServiceState};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr: SocketAddr = std::env::var("ATLAS_API_ADDR")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| "127.0.0.1:8080".parse().expect("default addr"));

    let state = web_api::AppState::new(ServiceState::default(), ChainReader::from_env());

    info!(addr = %addr, "Atlas Directory API listening");
    web_api::run_http_server(addr, state).await;
}
