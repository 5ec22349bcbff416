mod config;
mod model;
mod web;

use actix_web::{App, HttpServer, web::Data};
use dotenv::dotenv;
use log::{info, warn, error};
use std::sync::Arc;

use config::Config;
use model::{ChatModel, GeminiModel};
use web::routes;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize environment
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    info!("Starting Gemini chat proxy");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    if config.api_key.is_none() {
        warn!("GEMINI_API_KEY is not set; chat requests will fail with an API key error");
    }

    // One client for the whole process, shared read-only by every worker
    let model: Arc<dyn ChatModel> = Arc::new(GeminiModel::new(&config));
    let model = Data::from(model);

    info!("Listening on {}:{}", config.host, config.port);

    HttpServer::new(move || {
        App::new()
            .wrap(web::cors_headers())
            .app_data(model.clone())
            .configure(routes::configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
