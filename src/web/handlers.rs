use actix_web::{
    http::{header, Method},
    web, HttpRequest, HttpResponse,
};
use futures::{stream, StreamExt};
use log::{debug, error, info};
use std::convert::Infallible;

use crate::model::{ChatError, ChatModel, ChatSession, GenerationConfig};
use crate::web::error::{public_message, ApiError};
use crate::web::models::{ChatRequest, ChatResponse};
use crate::web::sse;

pub const EVENT_STREAM: &str = "text/event-stream";

/// Largest request body the endpoint reads, 4.5 MiB.
pub const MAX_BODY_BYTES: usize = 4_718_592;

/// How the reply is delivered, picked once from the `Accept` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    Buffered,
    Streaming,
}

impl RequestMode {
    pub fn from_request(req: &HttpRequest) -> Self {
        let accept = req
            .headers()
            .get(header::ACCEPT)
            .and_then(|value| value.to_str().ok());

        if accept == Some(EVENT_STREAM) {
            RequestMode::Streaming
        } else {
            RequestMode::Buffered
        }
    }
}

// Chat API endpoint. Routed for every method so preflight and 405 are answered here.
pub async fn chat(
    req: HttpRequest,
    payload: web::Payload,
    model: web::Data<dyn ChatModel>,
) -> Result<HttpResponse, ApiError> {
    if *req.method() == Method::OPTIONS {
        return Ok(HttpResponse::Ok().finish());
    }
    if *req.method() != Method::POST {
        return Err(ApiError::MethodNotAllowed);
    }

    let body = read_body(payload).await?;
    let chat_request = ChatRequest::from_bytes(&body);
    let message = chat_request.message()?;
    let session = ChatSession::new(chat_request.history()?, GenerationConfig::default());
    let mode = RequestMode::from_request(&req);

    info!(
        "Chat request in {:?} mode with {} prior turns",
        mode,
        session.history.len()
    );
    debug!("Message: {}", message);

    let result = match mode {
        RequestMode::Streaming => streaming_reply(model.get_ref(), &session, message).await,
        RequestMode::Buffered => buffered_reply(model.get_ref(), &session, message).await,
    };

    result.map_err(|e| {
        error!("Error calling Gemini API: {}", e);
        ApiError::from(e)
    })
}

// The body is read by hand, after the method checks, so size and transport
// failures are answered with the endpoint's JSON errors.
async fn read_body(mut payload: web::Payload) -> Result<web::BytesMut, ApiError> {
    let mut body = web::BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(|e| {
            debug!("Failed to read request body: {}", e);
            ApiError::MissingMessage
        })?;
        if body.len() + chunk.len() > MAX_BODY_BYTES {
            return Err(ApiError::PayloadTooLarge);
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

async fn buffered_reply(
    model: &dyn ChatModel,
    session: &ChatSession,
    message: &str,
) -> Result<HttpResponse, ChatError> {
    let response = model.send_message(session, message).await?;
    Ok(HttpResponse::Ok().json(ChatResponse { response }))
}

// Headers are only committed once the model has accepted the request, so
// failures up to that point still get a JSON error response.
async fn streaming_reply(
    model: &dyn ChatModel,
    session: &ChatSession,
    message: &str,
) -> Result<HttpResponse, ChatError> {
    let fragments = model.send_message_stream(session, message).await?;

    let body = stream::unfold(Some(fragments), |state| async move {
        let mut fragments = state?;
        let (record, next) = match fragments.next().await {
            Some(Ok(text)) => (sse::text_record(&text), Some(fragments)),
            Some(Err(e)) => {
                error!("Gemini stream failed after headers were sent: {}", e);
                (sse::error_record(public_message(&e)), None)
            }
            None => (sse::done_record(), None),
        };
        Some((Ok::<_, Infallible>(record), next))
    });

    Ok(HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, EVENT_STREAM))
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .insert_header((header::CONNECTION, "keep-alive"))
        .streaming(body))
}
