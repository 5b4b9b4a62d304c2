use crate::cli::Args;
use crate::llm::ModelId;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use axum::{
    routing::get,
    Router,
    extract::State,
    response::{ Html, IntoResponse },
    Json,
};
use chrono::Local;
use serde::Serialize;
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, error };

const PAGE_TEMPLATE: &str = include_str!("../../static/index.html");

#[derive(Serialize)]
struct ModelsResponse {
    models: Vec<&'static str>,
    default: &'static str,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// What the chat page needs to know about the running server.
#[derive(Clone, Debug)]
pub struct PageSettings {
    pub ws_url: Option<String>,
    pub ws_port: Option<u16>,
    pub default_model: ModelId,
}

impl PageSettings {
    pub fn from_args(args: &Args) -> Self {
        Self {
            ws_url: args.public_ws_url.clone().filter(|url| !url.trim().is_empty()),
            ws_port: args.ws_port(),
            default_model: args.default_model,
        }
    }
}

#[derive(Clone)]
struct AppState {
    page: Arc<PageSettings>,
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn model_options(default_model: ModelId) -> String {
    ModelId::ALL
        .iter()
        .map(|model| {
            let selected = if *model == default_model { " selected" } else { "" };
            format!("<option value=\"{0}\"{1}>{0}</option>", model.as_str(), selected)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fills the page template. `current_date` is shown in the sidebar.
pub fn render_page(settings: &PageSettings, current_date: &str) -> String {
    let ws_port = settings.ws_port.map(|p| p.to_string()).unwrap_or_default();
    PAGE_TEMPLATE.replace("{{WS_URL}}", &escape_html(settings.ws_url.as_deref().unwrap_or("")))
        .replace("{{WS_PORT}}", &ws_port)
        .replace("{{MODEL_OPTIONS}}", &model_options(settings.default_model))
        .replace("{{CURRENT_DATE}}", &escape_html(current_date))
}

pub fn router(page: PageSettings) -> Router {
    let app_state = AppState {
        page: Arc::new(page),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(page_handler))
        .route("/api/models", get(models_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(app_state)
}

pub async fn start_http_server(
    http_port: u16,
    args: Args,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = format!("0.0.0.0:{}", http_port).parse::<SocketAddr>()?;
    info!("Starting HTTP server on: http://{}", addr);

    let app = router(PageSettings::from_args(&args));

    match (args.tls_configured(), &args.tls_cert_path, &args.tls_key_path) {
        (true, Some(cert_path), Some(key_path)) => {
            let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
                cert_path,
                key_path
            ).await?;

            tokio::spawn(async move {
                let result = axum_server::bind_rustls(addr, tls_config)
                    .serve(app.into_make_service())
                    .await;

                if let Err(e) = result {
                    error!("HTTPS server error: {}", e);
                }
            });

            info!("HTTPS server started with TLS enabled");
        }
        _ => {
            tokio::spawn(async move {
                match tokio::net::TcpListener::bind(addr).await {
                    Ok(listener) => {
                        if let Err(e) = axum::serve(listener, app.into_make_service()).await {
                            error!("HTTP server error: {}", e);
                        }
                    },
                    Err(e) => {
                        error!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e);
                    }
                }
            });

            info!("HTTP server started");
        }
    }

    Ok(())
}

async fn page_handler(State(state): State<AppState>) -> impl IntoResponse {
    let current_date = Local::now().format("%B %d, %Y").to_string();
    Html(render_page(&state.page, &current_date))
}

async fn models_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(ModelsResponse {
        models: ModelId::ALL.iter().map(|m| m.as_str()).collect(),
        default: state.page.default_model.as_str(),
    })
}

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}
