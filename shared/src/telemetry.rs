use anyhow::{anyhow, Result};
use std::env;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub log_filter: String,
    pub log_format: LogFormat,
}

impl TelemetryConfig {
    pub fn from_env(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            log_filter: env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string()),
            log_format: env::var("LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or(LogFormat::Pretty),
        }
    }
}

/// Installs the global tracing subscriber. Fails if one is already set.
pub fn init_telemetry(config: TelemetryConfig) -> Result<()> {
    let env_filter = EnvFilter::try_new(&config.log_filter)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = match config.log_format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(true),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init(),
    };

    result.map_err(|e| anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!(
        service = %config.service_name,
        format = ?config.log_format,
        "Telemetry initialized"
    );

    Ok(())
}

pub mod middleware {
    use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
    use std::time::Instant;
    use tracing::{info, warn, Instrument};

    use crate::utils::generate_request_id;

    pub const REQUEST_ID_HEADER: &str = "x-request-id";

    /// Wraps each request in a span and logs its outcome.
    ///
    /// An incoming `x-request-id` header is reused, otherwise one is
    /// generated. The id is echoed back on the response.
    pub async fn trace_layer(request: Request, next: Next) -> Response {
        let request_id = request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(generate_request_id);

        let method = request.method().clone();
        let path = request.uri().path().to_string();
        let span = tracing::info_span!(
            "http_request",
            request_id = %request_id,
            method = %method,
            path = %path,
        );

        let started = Instant::now();
        let mut response = next.run(request).instrument(span.clone()).await;
        let latency_ms = started.elapsed().as_millis() as u64;
        let status = response.status();

        span.in_scope(|| {
            if status.is_server_error() {
                warn!(status = status.as_u16(), latency_ms, "Request failed");
            } else {
                info!(status = status.as_u16(), latency_ms, "Request completed");
            }
        });

        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }

        response
    }
}
