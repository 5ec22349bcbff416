pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod sse;

use actix_web::middleware::DefaultHeaders;

/// Permissive CORS headers stamped on every response.
pub fn cors_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add(("Access-Control-Allow-Origin", "*"))
        .add(("Access-Control-Allow-Methods", "POST, OPTIONS"))
        .add(("Access-Control-Allow-Headers", "Content-Type"))
}
