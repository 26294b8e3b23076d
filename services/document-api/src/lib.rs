use anyhow::{Context, Result};
use axum::{routing::get, Router};
use cloudant_client::{CloudantClient, CloudantError, IamTokenProvider, TokenProvider};
use shared::telemetry;
use std::sync::Arc;
use tower::ServiceBuilder;

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;

use config::Config;

const USER_AGENT: &str = concat!("document-api/", env!("CARGO_PKG_VERSION"));

/// Read-only state shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub http_client: reqwest::Client,
    pub token_provider: Arc<dyn TokenProvider>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;

        let token_provider = IamTokenProvider::with_token_url(
            http_client.clone(),
            config.cloudant.api_key.clone(),
            config.cloudant.iam_token_url.clone(),
        );

        Ok(Self::with_token_provider(
            config,
            http_client,
            Arc::new(token_provider),
        ))
    }

    pub fn with_token_provider(
        config: Config,
        http_client: reqwest::Client,
        token_provider: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            http_client,
            token_provider,
        }
    }

    pub fn db_name(&self) -> &str {
        &self.config.cloudant.db_name
    }

    /// Exchanges the API key for a fresh token and returns a client bound to it.
    pub async fn document_store(&self) -> Result<CloudantClient, CloudantError> {
        let token = self.token_provider.fetch_token().await?;
        Ok(CloudantClient::new(
            self.http_client.clone(),
            self.config.cloudant.service_url.clone(),
            token,
        ))
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route(
            "/documents",
            get(handlers::documents::list_documents).post(handlers::documents::create_document),
        )
        .route(
            "/documents/:id",
            get(handlers::documents::get_document)
                .put(handlers::documents::update_document)
                .delete(handlers::documents::delete_document),
        )
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(telemetry::middleware::trace_layer))
                .layer(middleware::cors_layer()),
        )
        .with_state(state)
}
