pub mod agent;
pub mod cli;
pub mod error;
pub mod llm;
pub mod models;
pub mod render;
pub mod server;
pub mod session;

use agent::ChatAgent;
use cli::Args;
use llm::chat::factory::ClientFactory;
use log::info;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("WebSocket Address: {}", args.server_addr);
    info!("HTTP Port: {}", args.http_port);
    info!("Public WebSocket URL: {}", args.public_ws_url.as_deref().unwrap_or("derived from page host"));
    info!("Anthropic Base URL: {}", args.anthropic_base_url);
    info!("Default Model: {}", args.default_model);
    info!("Client Cache Capacity: {}", args.client_cache_capacity);
    info!("TLS Enabled: {}", args.tls_configured());
    info!("-------------------------");

    if args.tls_configured() {
        // both ring and aws-lc-rs are compiled in; rustls needs one picked
        let _ = rustls::crypto::ring::default_provider().install_default();
    }

    let clients = Arc::new(
        ClientFactory::anthropic(Some(args.anthropic_base_url.clone()), args.client_cache_capacity)
    );
    let agent = Arc::new(ChatAgent::new(clients));
    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, agent, args.clone());
    server.run().await?;

    Ok(())
}
