use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use api_rest::{AppState, router};
use emr_core::config::{ExtractionConfig, language_from_env_value};
use emr_core::{CoreConfig, EmrError, ExtractionClient};
use emr_extraction::ChatCompletionsClient;

/// Main entry point for the EMR drafting service
///
/// Resolves configuration once, builds the extraction client and serves the REST API with
/// OpenAPI/Swagger documentation.
///
/// # Environment Variables
/// - `EMR_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `LLM_API_KEY`: extraction service key; without it only the draft route is unavailable
/// - `LLM_API_URL`, `LLM_MODEL`: extraction endpoint and model
/// - `EMR_LLM_TIMEOUT_SECS`: extraction timeout in seconds (default: 60)
/// - `EMR_LANGUAGE`: label language, `zh` or `en` (default: "zh")
/// - `EMR_API_KEY`: when set, REST requests must carry a matching `x-api-key` header
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - a configuration value is invalid,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(log_filter()?)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let extraction = ExtractionConfig::from_env_values(
        std::env::var("LLM_API_URL").ok(),
        std::env::var("LLM_MODEL").ok(),
        std::env::var("LLM_API_KEY").ok(),
        std::env::var("EMR_LLM_TIMEOUT_SECS").ok(),
    )?;
    let language = language_from_env_value(std::env::var("EMR_LANGUAGE").ok())?;
    let cfg = CoreConfig::new(extraction, language);

    let client: Option<Arc<dyn ExtractionClient>> =
        match ChatCompletionsClient::from_config(cfg.extraction()) {
            Ok(client) => Some(Arc::new(client)),
            Err(EmrError::MissingCredentials) => {
                tracing::warn!("LLM_API_KEY not set; /emr-draft will answer 500");
                None
            }
            Err(e) => return Err(e.into()),
        };

    let addr = std::env::var("EMR_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    tracing::info!("++ Starting EMR REST on {}", addr);

    let app = router(AppState::new(cfg, client, std::env::var("EMR_API_KEY").ok()));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// `RUST_LOG` plus info-level output from the service crates, including REST handlers.
fn log_filter() -> anyhow::Result<EnvFilter> {
    Ok(EnvFilter::from_default_env()
        .add_directive("emr=info".parse()?)
        .add_directive("api_rest=info".parse()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_filter_enables_service_and_rest_targets() {
        let filter = log_filter().unwrap().to_string();
        assert!(filter.contains("emr=info"));
        assert!(filter.contains("api_rest=info"));
    }
}
