use async_trait::async_trait;
use futures::{stream, StreamExt};
use log::{debug, info};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ChatError, ChatModel, ChatSession, TextStream};
use crate::config::Config;

// A wrapper for the Gemini generative-language REST API
pub struct GeminiModel {
    client: Client,
    api_key: Option<String>,
    api_base: String,
    model: String,
}

impl GeminiModel {
    pub fn new(config: &Config) -> Self {
        info!("Using Gemini model {} at {}", config.model, config.api_base);

        Self {
            client: Client::new(),
            api_key: config.api_key.clone(),
            api_base: config.api_base.clone(),
            model: config.model.clone(),
        }
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/v1beta/models/{}:{}", self.api_base, self.model, method)
    }

    async fn post(&self, url: &str, payload: &Value) -> Result<Response, ChatError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ChatError::Auth("GEMINI_API_KEY is not set".to_string()))?;

        debug!("Payload: {}", payload);

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", api_key)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response.text().await.unwrap_or_default();
        Err(status_error(status, &error_text))
    }
}

#[async_trait]
impl ChatModel for GeminiModel {
    async fn send_message(&self, session: &ChatSession, message: &str) -> Result<String, ChatError> {
        info!(
            "Sending message to {} ({} prior turns, max_output_tokens: {})",
            self.model,
            session.history.len(),
            session.generation_config.max_output_tokens
        );

        let url = self.endpoint("generateContent");
        let response = self.post(&url, &request_body(session, message)).await?;
        let reply: GenerateContentResponse = response.json().await?;
        let text = reply.into_text()?;

        info!("Response length: {} characters", text.len());
        Ok(text)
    }

    async fn send_message_stream(
        &self,
        session: &ChatSession,
        message: &str,
    ) -> Result<TextStream, ChatError> {
        info!(
            "Streaming message to {} ({} prior turns, max_output_tokens: {})",
            self.model,
            session.history.len(),
            session.generation_config.max_output_tokens
        );

        let url = format!("{}?alt=sse", self.endpoint("streamGenerateContent"));
        let response = self.post(&url, &request_body(session, message)).await?;

        // `None` marks the end of the body so a final unterminated line still gets decoded.
        let chunks = response
            .bytes_stream()
            .map(Some)
            .chain(stream::once(async { None }));

        let mut decoder = SseDecoder::default();
        let fragments = chunks.flat_map(move |chunk| {
            let payloads = match chunk {
                Some(Ok(bytes)) => decoder.push(&bytes),
                Some(Err(e)) => return stream::iter(vec![Err(ChatError::from(e))]),
                None => decoder.finish().into_iter().collect(),
            };
            let items: Vec<Result<String, ChatError>> = payloads
                .iter()
                .filter_map(|payload| fragment(payload).transpose())
                .collect();
            stream::iter(items)
        });

        Ok(fragments.boxed())
    }
}

/// History turns go first, untouched, followed by the new user turn.
fn request_body(session: &ChatSession, message: &str) -> Value {
    let mut contents = session.history.clone();
    contents.push(json!({
        "role": "user",
        "parts": [{ "text": message }],
    }));

    json!({
        "contents": contents,
        "generationConfig": session.generation_config,
    })
}

fn status_error(status: StatusCode, body: &str) -> ChatError {
    let detail = format!("{}: {}", status, body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ChatError::Auth(detail),
        StatusCode::TOO_MANY_REQUESTS => ChatError::Quota(detail),
        _ => ChatError::classify(detail),
    }
}

/// Text carried by one streamed payload, if any.
fn fragment(payload: &str) -> Result<Option<String>, ChatError> {
    let chunk: GenerateContentResponse = serde_json::from_str(payload)
        .map_err(|e| ChatError::Upstream(format!("malformed stream payload: {}", e)))?;

    if chunk.error.is_some() {
        return Err(ChatError::classify(payload));
    }
    if let Some(reason) = chunk.block_reason() {
        return Err(ChatError::Upstream(format!("response was blocked: {}", reason)));
    }

    Ok(chunk.text().filter(|text| !text.is_empty()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    fn block_reason(&self) -> Option<&str> {
        self.prompt_feedback.as_ref()?.block_reason.as_deref()
    }

    /// Concatenated text parts of the first candidate.
    fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let mut texts = parts.iter().filter_map(|part| part.text.as_deref()).peekable();
        texts.peek()?;
        Some(texts.collect())
    }

    fn into_text(self) -> Result<String, ChatError> {
        if let Some(reason) = self.block_reason() {
            return Err(ChatError::Upstream(format!("response was blocked: {}", reason)));
        }

        self.text().ok_or_else(|| {
            let reason = self
                .candidates
                .first()
                .and_then(|candidate| candidate.finish_reason.as_deref())
                .unwrap_or("no candidates");
            ChatError::Upstream(format!("response contained no text ({})", reason))
        })
    }
}

/// Splits an event-stream body into `data:` payloads, one per line.
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut payloads = Vec::new();
        while let Some(end) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=end).collect();
            payloads.extend(data_payload(&line));
        }
        payloads
    }

    /// Decodes whatever is left once the body has ended.
    fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        if rest.is_empty() {
            return None;
        }
        debug!("Decoding {} trailing bytes without a line terminator", rest.len());
        data_payload(&rest)
    }
}

fn data_payload(line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim_end_matches(&['\r', '\n'][..]);
    let data = line.strip_prefix("data:")?;
    let data = data.strip_prefix(' ').unwrap_or(data);
    if data.is_empty() {
        None
    } else {
        Some(data.to_string())
    }
}
