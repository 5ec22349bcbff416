use thiserror::Error;

/// Failures reported by a chat collaborator. The payload is upstream detail
/// for the logs; callers only ever see the mapped public message.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("quota exceeded: {0}")]
    Quota(String),
    #[error("upstream error: {0}")]
    Upstream(String),
}

impl ChatError {
    /// Classifies an unstructured upstream message.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.contains("API_KEY") {
            ChatError::Auth(message)
        } else if message.contains("quota") {
            ChatError::Quota(message)
        } else {
            ChatError::Upstream(message)
        }
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        ChatError::Upstream(err.to_string())
    }
}
