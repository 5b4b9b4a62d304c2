use crate::agent::ChatAgent;
use crate::cli::Args;
use crate::error::ProtocolError;
use crate::llm::ModelId;
use crate::models::chat::Conversation;
use crate::models::websocket::{ ClientMessage, RenderedTurn, ServerMessage };
use crate::render::Renderer;
use crate::session::{ ChatSession, SessionConfig };
use async_trait::async_trait;
use futures::{ Sink, SinkExt, StreamExt };
use log::{ debug, info, warn, error };
use rustls::ServerConfig;
use rustls::pki_types::{ CertificateDer, PrivateKeyDer };
use rustls_pemfile::{ certs, pkcs8_private_keys };
use std::error::Error;
use std::fmt::Display;
use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{ AsyncRead, AsyncWrite };
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tokio_tungstenite::{ accept_async, tungstenite::protocol::Message, WebSocketStream };

const MAX_MESSAGE_SIZE: usize = 1 * 1024 * 1024;

/// Pushes the transcript and the busy indicator to the browser.
pub struct TranscriptRenderer<'a, T> {
    peer: SocketAddr,
    tx: &'a mut T,
}

impl<'a, T> TranscriptRenderer<'a, T> where T: Sink<Message> + Unpin + Send, T::Error: Display {
    pub fn new(peer: SocketAddr, tx: &'a mut T) -> Self {
        Self { peer, tx }
    }
}

#[async_trait]
impl<'a, T> Renderer
    for TranscriptRenderer<'a, T>
    where T: Sink<Message> + Unpin + Send, T::Error: Display
{
    async fn render(&mut self, conversation: &Conversation) {
        let turns = conversation.turns().iter().map(RenderedTurn::from).collect();
        let msg = ServerMessage::Transcript { turns };
        send_message(&mut *self.tx, self.peer, &msg).await;
    }

    async fn set_busy(&mut self, busy: bool) {
        let msg = if busy { ServerMessage::Processing } else { ServerMessage::Idle };
        send_message(&mut *self.tx, self.peer, &msg).await;
    }
}

/// Returns false when the frame could not be delivered.
async fn send_message<T>(tx: &mut T, peer: SocketAddr, msg: &ServerMessage) -> bool
    where T: Sink<Message> + Unpin, T::Error: Display
{
    let json = match serde_json::to_string(msg) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize message for {}: {}", peer, e);
            return false;
        }
    };
    match tx.send(Message::Text(json)).await {
        Ok(()) => true,
        Err(e) => {
            error!("Error sending message to {}: {}", peer, e);
            false
        }
    }
}

async fn handle_client_message<T>(
    peer: SocketAddr,
    text: &str,
    session: &mut ChatSession,
    agent: &ChatAgent,
    tx: &mut T
) -> Result<(), ProtocolError>
    where T: Sink<Message> + Unpin + Send, T::Error: Display
{
    match serde_json::from_str::<ClientMessage>(text)? {
        ClientMessage::Configure { api_key, model } => {
            let model = match model {
                Some(name) => name.parse::<ModelId>()?,
                None => session.config().model(),
            };
            let config = session.config_mut();
            config.set_credential(api_key);
            config.set_model(model);
            info!(
                "Session {} configured: model={}, api key set={}",
                session.id(),
                model,
                session.config().has_credential()
            );
            let msg = ServerMessage::Configured {
                model: model.to_string(),
                has_credential: session.config().has_credential(),
            };
            send_message(tx, peer, &msg).await;
        }
        ClientMessage::Chat { content } => {
            if content.trim().is_empty() {
                debug!("Ignoring empty chat input from {}", peer);
                return Ok(());
            }
            let mut renderer = TranscriptRenderer::new(peer, tx);
            let outcome = agent.process_turn(session, &content, &mut renderer).await;
            info!("Session {} turn finished: {:?}", session.id(), outcome);
        }
        ClientMessage::Reset => {
            let mut renderer = TranscriptRenderer::new(peer, tx);
            agent.reset(session, &mut renderer).await;
        }
    }
    Ok(())
}

/// Serves one browser session until the socket closes. The session state lives
/// and dies with this call.
pub async fn handle_connection<S>(
    peer: SocketAddr,
    websocket: WebSocketStream<S>,
    agent: Arc<ChatAgent>,
    default_model: ModelId
)
    where S: AsyncRead + AsyncWrite + Unpin + Send
{
    let (mut tx, mut rx) = websocket.split();
    let mut session = ChatSession::new(SessionConfig::new("", default_model));
    info!("New chat session {} for {}", session.id(), peer);

    {
        let mut renderer = TranscriptRenderer::new(peer, &mut tx);
        renderer.render(session.conversation()).await;
    }

    while let Some(msg) = rx.next().await {
        match msg {
            Ok(message) => {
                if message.len() > MAX_MESSAGE_SIZE {
                    warn!(
                        "Message from {} exceeds size limit ({} > {})",
                        peer,
                        message.len(),
                        MAX_MESSAGE_SIZE
                    );
                    let error_msg = ServerMessage::Error {
                        message: ProtocolError::TooLarge.to_string(),
                    };
                    send_message(&mut tx, peer, &error_msg).await;
                    break;
                }

                match message {
                    Message::Text(text) => {
                        if
                            let Err(e) = handle_client_message(
                                peer,
                                &text,
                                &mut session,
                                &agent,
                                &mut tx
                            ).await
                        {
                            warn!("Rejected message from {}: {}", peer, e);
                            let error_msg = ServerMessage::Error { message: e.to_string() };
                            if !send_message(&mut tx, peer, &error_msg).await {
                                break;
                            }
                        }
                    }
                    Message::Close(_) => {
                        info!("Received close frame from {}", peer);
                        break;
                    }
                    // tungstenite queues the pong itself
                    Message::Ping(_) | Message::Pong(_) => {}
                    Message::Binary(_) => {
                        warn!("Ignoring binary message from {}", peer);
                    }
                    Message::Frame(_) => {}
                }
            }
            Err(e) => {
                match e {
                    | tokio_tungstenite::tungstenite::Error::ConnectionClosed
                    | tokio_tungstenite::tungstenite::Error::Protocol(_)
                    | tokio_tungstenite::tungstenite::Error::Utf8 => {
                        info!("WebSocket connection closed or protocol error for {}: {}", peer, e);
                    }
                    tokio_tungstenite::tungstenite::Error::Io(ref io_err) if
                        io_err.kind() == std::io::ErrorKind::ConnectionReset
                    => {
                        info!("WebSocket connection reset by peer {}", peer);
                    }
                    _ => {
                        error!("Error receiving message from {}: {}", peer, e);
                    }
                }
                break;
            }
        }
    }
    info!("Chat session {} closed for {}", session.id(), peer);
}

fn load_tls_config(
    cert_path: &str,
    key_path: &str
) -> Result<Arc<ServerConfig>, Box<dyn Error + Send + Sync>> {
    let cert_file = File::open(cert_path).map_err(|e|
        format!("Failed to open TLS certificate file '{}': {}", cert_path, e)
    )?;
    let key_file = File::open(key_path).map_err(|e|
        format!("Failed to open TLS key file '{}': {}", key_path, e)
    )?;

    let mut cert_reader = BufReader::new(cert_file);
    let mut key_reader = BufReader::new(key_file);
    let cert_chain: Vec<CertificateDer<'static>> = certs(&mut cert_reader)
        .collect::<Result<_, _>>()
        .map_err(|e| format!("Failed to read certificate(s): {}", e))?;

    let mut keys = pkcs8_private_keys(&mut key_reader);
    let key = match keys.next() {
        Some(Ok(k)) => PrivateKeyDer::Pkcs8(k),
        Some(Err(e)) => {
            return Err(format!("Error reading private key: {}", e).into());
        }
        None => {
            return Err("No PKCS8 private key found in key file".into());
        }
    };

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(cert_chain, key)?;

    Ok(Arc::new(config))
}

fn tls_acceptor(args: &Args) -> Result<Option<TlsAcceptor>, Box<dyn Error + Send + Sync>> {
    if !args.enable_tls {
        info!("TLS not enabled. Running plain WebSocket (WS) server.");
        return Ok(None);
    }
    match (&args.tls_cert_path, &args.tls_key_path) {
        (Some(cert_path), Some(key_path)) => {
            info!(
                "TLS enabled. Loading certificate from '{}' and key from '{}'",
                cert_path,
                key_path
            );
            let config = load_tls_config(cert_path, key_path)?;
            Ok(Some(TlsAcceptor::from(config)))
        }
        (Some(_), None) | (None, Some(_)) => {
            error!("Both --tls-cert-path and --tls-key-path must be provided to enable TLS.");
            Err("Missing TLS certificate or key path".into())
        }
        (None, None) => {
            error!("--enable-tls was set but no certificate/key paths provided.");
            Err("TLS enabled without cert/key".into())
        }
    }
}

pub async fn start_ws_server(
    addr: &str,
    agent: Arc<ChatAgent>,
    args: Args
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let tls_acceptor = tls_acceptor(&args)?;
    let listener = TcpListener::bind(addr).await?;
    let protocol = if tls_acceptor.is_some() { "wss" } else { "ws" };
    info!("{} server listening on: {}", protocol.to_uppercase(), addr);

    loop {
        let (stream, peer) = listener.accept().await?;
        info!("Incoming connection from: {}", peer);

        let agent_clone = Arc::clone(&agent);
        let tls_acceptor_clone = tls_acceptor.clone();
        let default_model = args.default_model;

        tokio::spawn(async move {
            let process_result = if let Some(acceptor) = tls_acceptor_clone {
                match acceptor.accept(stream).await {
                    Ok(tls_stream) => {
                        info!("TLS handshake successful for {}", peer);
                        process_connection(peer, tls_stream, agent_clone, default_model).await
                    }
                    Err(e) => {
                        error!("TLS handshake error for {}: {}", peer, e);
                        Err(Box::new(e) as Box<dyn Error + Send + Sync>)
                    }
                }
            } else {
                process_connection(peer, stream, agent_clone, default_model).await
            };

            if let Err(e) = process_result {
                error!("Failed to process connection for {}: {}", peer, e);
            }
        });
    }
}

async fn process_connection<S>(
    peer: SocketAddr,
    stream: S,
    agent: Arc<ChatAgent>,
    default_model: ModelId
) -> Result<(), Box<dyn Error + Send + Sync>>
    where S: AsyncRead + AsyncWrite + Unpin + Send + 'static
{
    match accept_async(stream).await {
        Ok(ws) => {
            handle_connection(peer, ws, agent, default_model).await;
            Ok(())
        }
        Err(e) => {
            error!("Handshake failed for {}: {}", peer, e);
            Err(Box::new(e) as _)
        }
    }
}
