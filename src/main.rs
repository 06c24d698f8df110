// src/main.rs
use actix_web::{App, HttpServer, middleware, web};
use anyhow::Context;
use log::{info, warn};
use std::sync::Arc;

mod config;
mod errors;
mod handlers;
mod models;
mod services;

use crate::config::AppConfig;
use crate::services::{
    ComparisonOrchestrator, FeatureService, HttpTransport, ImageProcessor, ProviderClient,
    RandomSwap, ReqwestTransport, SessionHistory, SwapStrategy,
};

#[derive(Clone)]
pub struct AppState {
    config: Arc<AppConfig>,
    comparison: Arc<ComparisonOrchestrator>,
    features: Arc<FeatureService>,
    history: Arc<SessionHistory>,
}

impl AppState {
    pub fn new(
        config: Arc<AppConfig>,
        transport: Arc<dyn HttpTransport>,
        swap: Arc<dyn SwapStrategy>,
    ) -> Self {
        let client = Arc::new(ProviderClient::new(transport));
        Self {
            comparison: Arc::new(ComparisonOrchestrator::new(
                config.clone(),
                client.clone(),
                ImageProcessor::new(),
                swap,
            )),
            features: Arc::new(FeatureService::new(config.clone(), client)),
            history: Arc::new(SessionHistory::new(config.history_limit)),
            config,
        }
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    info!("Starting TubeMaster service...");

    let config = Arc::new(AppConfig::from_env());
    if config.groq_api_key.is_empty() {
        warn!("GROQ_API_KEY is not set; text features will fail until it is configured");
    }
    if config.openrouter_api_key.is_empty() {
        warn!("OPENROUTER_API_KEY is not set; OpenRouter comparisons need a caller-supplied key");
    }

    let app_state = AppState::new(
        config.clone(),
        Arc::new(ReqwestTransport::new()),
        Arc::new(RandomSwap::new()),
    );

    info!("Starting HTTP server on {}", config.bind_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(middleware::Logger::default())
            .configure(handlers::configure)
    })
    .bind(config.bind_addr.as_str())
    .with_context(|| format!("failed to bind {}", config.bind_addr))?
    .run()
    .await
    .context("HTTP server terminated with an error")?;

    Ok(())
}
