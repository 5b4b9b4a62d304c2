use std::fmt;
use uuid::Uuid;

use crate::llm::ModelId;
use crate::models::chat::{ Conversation, Turn };

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    AwaitingReply,
}

/// Sidebar settings of one session. Never persisted.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SessionConfig {
    credential: String,
    model: ModelId,
}

impl SessionConfig {
    pub fn new(credential: impl Into<String>, model: ModelId) -> Self {
        let mut config = Self { credential: String::new(), model };
        config.set_credential(credential);
        config
    }

    pub fn set_credential(&mut self, credential: impl Into<String>) {
        self.credential = credential.into().trim().to_string();
    }

    pub fn set_model(&mut self, model: ModelId) {
        self.model = model;
    }

    pub fn credential(&self) -> &str {
        &self.credential
    }

    pub fn model(&self) -> ModelId {
        self.model
    }

    pub fn has_credential(&self) -> bool {
        !self.credential.is_empty()
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("credential", &(if self.has_credential() { "<redacted>" } else { "<empty>" }))
            .field("model", &self.model)
            .finish()
    }
}

/// State of one browser session: its conversation, its sidebar settings and
/// where it is in the turn cycle. Owned by the connection task and dropped
/// with it.
#[derive(Debug)]
pub struct ChatSession {
    id: String,
    conversation: Option<Conversation>,
    config: SessionConfig,
    phase: Phase,
}

impl ChatSession {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            conversation: None,
            config,
            phase: Phase::Idle,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Seeds the conversation on first use; later calls leave it untouched.
    pub fn initialize(&mut self) -> &mut Conversation {
        self.conversation.get_or_insert_with(Conversation::new)
    }

    pub fn conversation(&mut self) -> &Conversation {
        self.initialize()
    }

    pub fn append(&mut self, turn: Turn) {
        self.initialize().push(turn);
    }

    pub fn reset(&mut self) {
        self.conversation = Some(Conversation::new());
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut SessionConfig {
        &mut self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn begin_turn(&mut self) {
        self.phase = Phase::AwaitingReply;
    }

    pub(crate) fn finish_turn(&mut self) {
        self.phase = Phase::Idle;
    }
}
