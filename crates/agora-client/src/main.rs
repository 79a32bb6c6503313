//! # agora
//!
//! Terminal client for a community room. Plain lines are sent as messages;
//! `/delete <id>`, `/profile <name>` and `/quit` are commands. The room is
//! re-rendered every time its state changes.

use agora_client::config::ClientConfig;
use agora_shared::constants::APP_NAME;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    agora_client::init_tracing();

    info!("Starting {APP_NAME} client v{}", env!("CARGO_PKG_VERSION"));

    let config = ClientConfig::from_env();
    info!(?config, "Loaded configuration");

    agora_client::run(config).await
}
