use serde::{ Serialize, Deserialize };
use super::chat::{ Role, Turn };
use crate::error::{ ERROR_PREFIX, MISSING_CREDENTIAL_NOTICE };
use crate::render::render_markdown;

/// A turn as the page shows it: the raw text, its markdown rendering and
/// whether it reports a failure.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RenderedTurn {
    pub role: Role,
    pub content: String,
    pub html: String,
    #[serde(default)]
    pub error: bool,
}

impl From<&Turn> for RenderedTurn {
    fn from(turn: &Turn) -> Self {
        let error =
            turn.role() == Role::Assistant &&
            (turn.content().starts_with(ERROR_PREFIX) || turn.content() == MISSING_CREDENTIAL_NOTICE);
        Self {
            role: turn.role(),
            content: turn.content().to_string(),
            html: render_markdown(turn.content()),
            error,
        }
    }
}

impl RenderedTurn {
    pub fn to_turn(&self) -> Turn {
        Turn::new(self.role, self.content.clone())
    }
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "configure")] Configure {
        #[serde(default)]
        api_key: String,
        #[serde(default)]
        model: Option<String>,
    },
    #[serde(rename = "chat")] Chat {
        content: String,
    },
    #[serde(rename = "reset")]
    Reset,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "transcript")] Transcript {
        turns: Vec<RenderedTurn>,
    },
    #[serde(rename = "configured")] Configured {
        model: String,
        has_credential: bool,
    },
    #[serde(rename = "error")] Error {
        message: String,
    },
    #[serde(rename = "processing")]
    Processing,
    #[serde(rename = "idle")]
    Idle,
}
