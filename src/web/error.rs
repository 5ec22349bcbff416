use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

use crate::model::ChatError;
use crate::web::models::ErrorResponse;

/// Everything the chat endpoint can answer with besides success. The display
/// text is the public `error` message.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Message is required")]
    MissingMessage,
    #[error("History must be an array")]
    InvalidHistory,
    #[error("Request body too large")]
    PayloadTooLarge,
    #[error("{}", public_message(.0))]
    Chat(#[from] ChatError),
}

pub fn public_message(err: &ChatError) -> &'static str {
    match err {
        ChatError::Auth(_) => "Invalid or missing API key",
        ChatError::Quota(_) => "API quota exceeded. Please try again later.",
        ChatError::Upstream(_) => "Internal server error. Please try again.",
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::MissingMessage | ApiError::InvalidHistory => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            // TODO: decide whether a rejected credential should be 401/403 for callers.
            ApiError::Chat(ChatError::Auth(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Chat(ChatError::Quota(_)) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Chat(ChatError::Upstream(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}
