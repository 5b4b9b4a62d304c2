pub mod chat;
use serde::{ Deserialize, Serialize };
use std::str::FromStr;
use std::fmt;

/// Model identifiers the chat page offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
pub enum ModelId {
    #[default]
    #[serde(rename = "claude-3-7-sonnet-20250219")]
    Claude37Sonnet,
    #[serde(rename = "claude-3-5-sonnet-20240620")]
    Claude35Sonnet,
    #[serde(rename = "claude-3-opus-20240229")]
    Claude3Opus,
    #[serde(rename = "claude-3-5-haiku-20240307")]
    Claude35Haiku,
}

impl ModelId {
    pub const ALL: [ModelId; 4] = [
        ModelId::Claude37Sonnet,
        ModelId::Claude35Sonnet,
        ModelId::Claude3Opus,
        ModelId::Claude35Haiku,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelId::Claude37Sonnet => "claude-3-7-sonnet-20250219",
            ModelId::Claude35Sonnet => "claude-3-5-sonnet-20240620",
            ModelId::Claude3Opus => "claude-3-opus-20240229",
            ModelId::Claude35Haiku => "claude-3-5-haiku-20240307",
        }
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseModelIdError {
    message: String,
}

impl fmt::Display for ParseModelIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseModelIdError {}

impl FromStr for ModelId {
    type Err = ParseModelIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        ModelId::ALL
            .iter()
            .copied()
            .find(|model| model.as_str() == wanted)
            .ok_or_else(|| ParseModelIdError {
                message: format!("Unsupported model: '{}'", s),
            })
    }
}
