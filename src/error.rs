use thiserror::Error;

use crate::llm::ParseModelIdError;

pub const MISSING_CREDENTIAL_NOTICE: &str = "Please enter your Anthropic API key in the sidebar.";

/// Prefix of the assistant turn recorded when a turn cycle fails.
pub const ERROR_PREFIX: &str = "An error occurred: ";

/// Failures of a single turn cycle. All of them end the cycle; none of them
/// end the session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChatError {
    #[error("{}", MISSING_CREDENTIAL_NOTICE)]
    MissingCredential,
    #[error("{0}")]
    Configuration(String),
    #[error("{0}")]
    RemoteCall(String),
}

/// Problems with a frame received from the browser. Reported back on the
/// socket and never written into the conversation.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Failed to parse message: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{0}")]
    UnknownModel(#[from] ParseModelIdError),
    #[error("Message too large")]
    TooLarge,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_raw_text() {
        assert_eq!(ChatError::MissingCredential.to_string(), MISSING_CREDENTIAL_NOTICE);
        assert_eq!(
            ChatError::RemoteCall("connection refused".into()).to_string(),
            "connection refused"
        );
        assert_eq!(ChatError::Configuration("bad key".into()).to_string(), "bad key");
    }
}
