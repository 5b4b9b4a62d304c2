use clap::Parser;
use std::net::SocketAddr;

use crate::llm::ModelId;
use crate::llm::chat::anthropic::DEFAULT_BASE_URL;
use crate::llm::chat::factory::DEFAULT_CACHE_CAPACITY;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Server Args ---
    /// Host address and port for the WebSocket chat server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    /// Port for the HTTP server that serves the chat page and JSON API.
    #[arg(long, env = "HTTP_PORT", default_value = "8501")]
    pub http_port: u16,

    /// WebSocket URL the chat page should connect to (e.g., wss://chat.example.com/ws).
    /// When unset the page connects to the server port on its own host.
    #[arg(long, env = "PUBLIC_WS_URL")]
    pub public_ws_url: Option<String>,

    // --- Anthropic Args ---
    /// Base URL of the Anthropic Messages API (or a compatible endpoint).
    #[arg(long, env = "ANTHROPIC_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub anthropic_base_url: String,

    /// Model preselected in the sidebar for new sessions.
    #[arg(long, env = "DEFAULT_MODEL", default_value = "claude-3-7-sonnet-20250219")]
    pub default_model: ModelId,

    /// Maximum number of distinct API keys whose clients are kept cached.
    #[arg(long, env = "CLIENT_CACHE_CAPACITY", default_value_t = DEFAULT_CACHE_CAPACITY)]
    pub client_cache_capacity: usize,

    // --- General App Args ---
    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,

    /// Optional path to the TLS certificate file (PEM format) for enabling HTTPS/WSS. Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format) for enabling HTTPS/WSS. Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}

impl Args {
    pub fn ws_port(&self) -> Option<u16> {
        self.server_addr
            .parse::<SocketAddr>()
            .ok()
            .map(|addr| addr.port())
    }

    pub fn tls_configured(&self) -> bool {
        self.enable_tls && self.tls_cert_path.is_some() && self.tls_key_path.is_some()
    }
}
