use actix_web::web::Bytes;
use serde_json::json;

/// Marks the end of a successful stream.
pub const DONE: &str = "[DONE]";

fn record(payload: &str) -> Bytes {
    Bytes::from(format!("data: {}\n\n", payload))
}

pub fn text_record(text: &str) -> Bytes {
    record(&json!({ "text": text }).to_string())
}

pub fn error_record(message: &str) -> Bytes {
    record(&json!({ "error": message }).to_string())
}

pub fn done_record() -> Bytes {
    record(DONE)
}
