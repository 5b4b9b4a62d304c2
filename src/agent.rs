use crate::error::{ ChatError, ERROR_PREFIX };
use crate::llm::chat::factory::ClientFactory;
use crate::llm::chat::{ CompletionRequest, MAX_OUTPUT_TOKENS, SYSTEM_PROMPT };
use crate::models::chat::Turn;
use crate::render::{ render_text, Renderer };
use crate::session::ChatSession;

use log::{ debug, info, warn };
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Replied,
    MissingCredential,
    Failed(String),
}

/// Runs turn cycles for sessions. Stateless apart from the shared client
/// cache, so one agent serves every connection.
#[derive(Clone)]
pub struct ChatAgent {
    clients: Arc<ClientFactory>,
    system_prompt: String,
    max_tokens: u32,
}

impl ChatAgent {
    pub fn new(clients: Arc<ClientFactory>) -> Self {
        Self {
            clients,
            system_prompt: SYSTEM_PROMPT.to_string(),
            max_tokens: MAX_OUTPUT_TOKENS,
        }
    }

    pub fn clients(&self) -> &Arc<ClientFactory> {
        &self.clients
    }

    /// One full cycle: record the user turn, ask the model, record whatever
    /// came back. Always leaves exactly one assistant turn after the user turn
    /// and returns the session to idle.
    pub async fn process_turn(
        &self,
        session: &mut ChatSession,
        text: &str,
        renderer: &mut dyn Renderer
    ) -> TurnOutcome {
        session.begin_turn();
        session.append(Turn::user(text));
        renderer.render(session.conversation()).await;

        let outcome = if !session.config().has_credential() {
            info!("Session {}: no API key configured, skipping request", session.id());
            session.append(Turn::assistant(ChatError::MissingCredential.to_string()));
            TurnOutcome::MissingCredential
        } else {
            renderer.set_busy(true).await;
            let result = self.request_reply(session).await;
            renderer.set_busy(false).await;

            match result {
                Ok(reply) => {
                    session.append(Turn::assistant(reply));
                    TurnOutcome::Replied
                }
                Err(e) => {
                    warn!("Session {}: completion failed: {}", session.id(), e);
                    session.append(Turn::assistant(format!("{}{}", ERROR_PREFIX, e)));
                    TurnOutcome::Failed(e.to_string())
                }
            }
        };

        renderer.render(session.conversation()).await;
        session.finish_turn();
        let transcript = render_text(session.conversation());
        debug!("Session {} transcript:\n{}", session.id(), transcript);
        outcome
    }

    async fn request_reply(&self, session: &mut ChatSession) -> Result<String, ChatError> {
        let model = session.config().model();
        let client = self.clients.get_client(session.config().credential())?;
        let request = CompletionRequest::new(
            model,
            &self.system_prompt,
            self.max_tokens,
            session.conversation()
        );
        info!(
            "Session {}: requesting completion from {} at {} ({} turns)",
            session.id(),
            model,
            client.get_base_url(),
            request.messages.len()
        );
        let response = client.complete(&request).await?;
        Ok(response.response)
    }

    pub async fn reset(&self, session: &mut ChatSession, renderer: &mut dyn Renderer) {
        session.reset();
        info!("Session {}: conversation cleared", session.id());
        renderer.render(session.conversation()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MISSING_CREDENTIAL_NOTICE;
    use crate::llm::chat::fake::{ factory_for, FakeChatClient };
    use crate::llm::chat::factory::ClientBuilder;
    use crate::llm::chat::ChatClient;
    use crate::llm::ModelId;
    use crate::models::chat::{ Conversation, Role, SEED_GREETING };
    use crate::session::{ Phase, SessionConfig };
    use async_trait::async_trait;

    #[derive(Default)]
    struct RecordingRenderer {
        frames: Vec<Vec<Turn>>,
        busy: Vec<bool>,
    }

    #[async_trait]
    impl Renderer for RecordingRenderer {
        async fn render(&mut self, conversation: &Conversation) {
            self.frames.push(conversation.turns().to_vec());
        }

        async fn set_busy(&mut self, busy: bool) {
            self.busy.push(busy);
        }
    }

    fn agent_with(client: Arc<FakeChatClient>) -> ChatAgent {
        ChatAgent::new(factory_for(client))
    }

    fn keyed_session() -> ChatSession {
        ChatSession::new(SessionConfig::new("sk-ant-test", ModelId::Claude35Sonnet))
    }

    #[tokio::test]
    async fn hello_with_credential_appends_reply() {
        let client = Arc::new(FakeChatClient::replying("Hi! How can I help?"));
        let agent = agent_with(Arc::clone(&client));
        let mut session = keyed_session();
        let mut renderer = RecordingRenderer::default();

        let outcome = agent.process_turn(&mut session, "Hello", &mut renderer).await;

        assert_eq!(outcome, TurnOutcome::Replied);
        assert_eq!(session.conversation().turns(), &[
            Turn::assistant(SEED_GREETING),
            Turn::user("Hello"),
            Turn::assistant("Hi! How can I help?"),
        ]);
        assert_eq!(session.phase(), Phase::Idle);

        let requests = client.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, ModelId::Claude35Sonnet);
        assert_eq!(requests[0].max_tokens, 4000);
        assert_eq!(requests[0].system, SYSTEM_PROMPT);
        assert_eq!(requests[0].messages.len(), 2);
        assert_eq!(requests[0].messages[1].role, Role::User);
        assert_eq!(requests[0].messages[1].content, "Hello");
    }

    #[tokio::test]
    async fn renders_after_each_mutation() {
        let agent = agent_with(Arc::new(FakeChatClient::replying("pong")));
        let mut session = keyed_session();
        let mut renderer = RecordingRenderer::default();

        agent.process_turn(&mut session, "ping", &mut renderer).await;

        assert_eq!(renderer.frames.len(), 2);
        assert_eq!(renderer.frames[0].len(), 2);
        assert_eq!(renderer.frames[0][1], Turn::user("ping"));
        assert_eq!(renderer.frames[1].len(), 3);
        assert_eq!(renderer.busy, vec![true, false]);
    }

    #[tokio::test]
    async fn hi_without_credential_makes_no_request() {
        let client = Arc::new(FakeChatClient::replying("unused"));
        let agent = agent_with(Arc::clone(&client));
        let mut session = ChatSession::new(SessionConfig::new("", ModelId::default()));
        let mut renderer = RecordingRenderer::default();

        let outcome = agent.process_turn(&mut session, "Hi", &mut renderer).await;

        assert_eq!(outcome, TurnOutcome::MissingCredential);
        assert_eq!(session.conversation().turns(), &[
            Turn::assistant(SEED_GREETING),
            Turn::user("Hi"),
            Turn::assistant("Please enter your Anthropic API key in the sidebar."),
        ]);
        assert!(client.requests().is_empty());
        assert!(renderer.busy.is_empty());
        assert_eq!(agent.clients().cached_clients(), 0);
        assert_eq!(session.conversation().turns()[2].content(), MISSING_CREDENTIAL_NOTICE);
    }

    #[tokio::test]
    async fn remote_failure_is_recorded_with_prefix() {
        let agent = agent_with(
            Arc::new(
                FakeChatClient::failing(
                    ChatError::RemoteCall(
                        "Error code: 529 - overloaded_error: Overloaded".to_string()
                    )
                )
            )
        );
        let mut session = keyed_session();
        let mut renderer = RecordingRenderer::default();

        let outcome = agent.process_turn(&mut session, "Hello", &mut renderer).await;

        assert_eq!(
            outcome,
            TurnOutcome::Failed("Error code: 529 - overloaded_error: Overloaded".to_string())
        );
        let last = session.conversation().last().cloned().unwrap();
        assert_eq!(last.role(), Role::Assistant);
        assert_eq!(
            last.content(),
            "An error occurred: Error code: 529 - overloaded_error: Overloaded"
        );
        assert_eq!(session.phase(), Phase::Idle);
        assert_eq!(session.conversation().len(), 3);
    }

    #[tokio::test]
    async fn client_construction_failure_is_recorded_like_a_remote_failure() {
        let builder: ClientBuilder = Arc::new(|_api_key: &str| -> Result<Arc<dyn ChatClient>, ChatError> {
            Err(ChatError::Configuration("Invalid API key format".to_string()))
        });
        let agent = ChatAgent::new(Arc::new(ClientFactory::new(builder, 4)));
        let mut session = keyed_session();
        let mut renderer = RecordingRenderer::default();

        let outcome = agent.process_turn(&mut session, "Hello", &mut renderer).await;

        assert_eq!(outcome, TurnOutcome::Failed("Invalid API key format".to_string()));
        assert_eq!(session.conversation().len(), 3);
        assert_eq!(
            session.conversation().last(),
            Some(&Turn::assistant("An error occurred: Invalid API key format"))
        );
        assert_eq!(session.phase(), Phase::Idle);
        assert_eq!(renderer.busy, vec![true, false]);
        assert_eq!(agent.clients().cached_clients(), 0);
    }

    #[tokio::test]
    async fn unusable_key_fails_the_turn_without_a_request() {
        let agent = ChatAgent::new(Arc::new(ClientFactory::anthropic(None, 4)));
        let mut session = ChatSession::new(SessionConfig::new("bad\u{7f}key", ModelId::default()));
        let mut renderer = RecordingRenderer::default();

        let outcome = agent.process_turn(&mut session, "Hello", &mut renderer).await;

        assert!(matches!(outcome, TurnOutcome::Failed(_)));
        let last = session.conversation().last().cloned().unwrap();
        assert!(last.content().starts_with("An error occurred: Invalid API key format"));
        assert_eq!(session.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn conversation_grows_by_two_per_cycle() {
        let client = Arc::new(FakeChatClient::replying("ack"));
        let agent = agent_with(Arc::clone(&client));
        let mut session = keyed_session();
        let mut renderer = RecordingRenderer::default();

        for n in 1..=6 {
            agent.process_turn(&mut session, &format!("message {}", n), &mut renderer).await;
            assert_eq!(session.conversation().len(), 1 + 2 * n);
        }

        let turns = session.conversation().turns();
        for (i, pair) in turns[1..].chunks(2).enumerate() {
            assert_eq!(pair[0], Turn::user(format!("message {}", i + 1)));
            assert_eq!(pair[1], Turn::assistant("ack"));
        }

        // each request carries everything said before it
        let requests = client.requests();
        for (i, request) in requests.iter().enumerate() {
            assert_eq!(request.messages.len(), 2 + 2 * i);
        }
    }

    #[tokio::test]
    async fn mixed_outcomes_still_alternate_roles() {
        let agent = agent_with(Arc::new(FakeChatClient::replying("fine")));
        let mut session = ChatSession::new(SessionConfig::default());
        let mut renderer = RecordingRenderer::default();

        agent.process_turn(&mut session, "first", &mut renderer).await;
        session.config_mut().set_credential("sk-ant-later");
        agent.process_turn(&mut session, "second", &mut renderer).await;

        let roles: Vec<Role> = session
            .conversation()
            .turns()
            .iter()
            .map(|t| t.role())
            .collect();
        assert_eq!(roles, vec![
            Role::Assistant,
            Role::User,
            Role::Assistant,
            Role::User,
            Role::Assistant,
        ]);
        assert_eq!(session.conversation().turns()[2].content(), MISSING_CREDENTIAL_NOTICE);
        assert_eq!(session.conversation().turns()[4].content(), "fine");
    }

    #[tokio::test]
    async fn reset_renders_the_seed() {
        let agent = agent_with(Arc::new(FakeChatClient::replying("ok")));
        let mut session = keyed_session();
        let mut renderer = RecordingRenderer::default();

        agent.process_turn(&mut session, "one", &mut renderer).await;
        agent.process_turn(&mut session, "two", &mut renderer).await;
        agent.reset(&mut session, &mut renderer).await;

        assert_eq!(session.conversation(), &Conversation::new());
        assert_eq!(renderer.frames.last().cloned(), Some(vec![Turn::assistant(SEED_GREETING)]));
    }

    #[tokio::test]
    async fn same_credential_reuses_one_client_across_sessions() {
        let agent = agent_with(Arc::new(FakeChatClient::replying("ok")));
        let mut renderer = RecordingRenderer::default();

        let mut first = keyed_session();
        let mut second = keyed_session();
        agent.process_turn(&mut first, "a", &mut renderer).await;
        agent.process_turn(&mut second, "b", &mut renderer).await;

        assert_eq!(agent.clients().cached_clients(), 1);
    }
}
