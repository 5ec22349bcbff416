use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::web::error::ApiError;

/// Incoming chat body. Fields are loose so validation can answer with the
/// proper error instead of a deserializer message.
#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Value,
    #[serde(default)]
    pub history: Value,
}

impl ChatRequest {
    /// Parses a raw body. Anything that is not a JSON object yields an empty
    /// request, which then fails the message check.
    pub fn from_bytes(body: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(body) {
            Ok(value @ Value::Object(_)) => serde_json::from_value(value).unwrap_or_default(),
            _ => Self::default(),
        }
    }

    pub fn message(&self) -> Result<&str, ApiError> {
        match self.message.as_str() {
            Some(message) if !message.is_empty() => Ok(message),
            _ => Err(ApiError::MissingMessage),
        }
    }

    pub fn history(&self) -> Result<Vec<Value>, ApiError> {
        match &self.history {
            Value::Null => Ok(Vec::new()),
            Value::Array(turns) => Ok(turns.clone()),
            _ => Err(ApiError::InvalidHistory),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
