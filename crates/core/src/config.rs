//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into services. Request
//! handling never reads process-wide environment variables, which keeps behaviour consistent
//! across multi-threaded runtimes and test harnesses.

use crate::constants::{DEFAULT_LLM_API_URL, DEFAULT_LLM_MODEL, DEFAULT_LLM_TIMEOUT_SECS};
use crate::{EmrError, EmrResult};
use emr_types::Language;
use std::time::Duration;

/// Settings for the external extraction collaborator.
#[derive(Clone)]
pub struct ExtractionConfig {
    api_url: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl ExtractionConfig {
    /// Create a new `ExtractionConfig`.
    ///
    /// A missing API key is accepted here; it only fails the extraction path when used, so the
    /// deterministic rewrite path keeps working on a half-configured deployment.
    pub fn new(
        api_url: String,
        model: String,
        api_key: Option<String>,
        timeout: Duration,
    ) -> EmrResult<Self> {
        if api_url.trim().is_empty() {
            return Err(EmrError::InvalidConfig("api_url cannot be empty".into()));
        }
        if model.trim().is_empty() {
            return Err(EmrError::InvalidConfig("model cannot be empty".into()));
        }
        if timeout.is_zero() {
            return Err(EmrError::InvalidConfig("timeout must be positive".into()));
        }

        Ok(Self {
            api_url: api_url.trim().to_string(),
            model: model.trim().to_string(),
            api_key: api_key
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
            timeout,
        })
    }

    /// Build from raw (optional) environment values, applying defaults for absent or blank ones.
    pub fn from_env_values(
        api_url: Option<String>,
        model: Option<String>,
        api_key: Option<String>,
        timeout_secs: Option<String>,
    ) -> EmrResult<Self> {
        let api_url = non_blank(api_url).unwrap_or_else(|| DEFAULT_LLM_API_URL.to_string());
        let model = non_blank(model).unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string());
        let timeout = timeout_from_env_value(timeout_secs)?;

        Self::new(api_url, model, api_key, timeout)
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl std::fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    extraction: ExtractionConfig,
    language: Language,
}

impl CoreConfig {
    pub fn new(extraction: ExtractionConfig, language: Language) -> Self {
        Self {
            extraction,
            language,
        }
    }

    pub fn extraction(&self) -> &ExtractionConfig {
        &self.extraction
    }

    pub fn language(&self) -> Language {
        self.language
    }
}

/// Parse the display language from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns the default language.
pub fn language_from_env_value(value: Option<String>) -> EmrResult<Language> {
    let parsed = non_blank(value).map(|v| v.parse::<Language>()).transpose()?;
    Ok(parsed.unwrap_or_default())
}

/// Parse the extraction timeout (whole seconds) from an optional string value.
pub fn timeout_from_env_value(value: Option<String>) -> EmrResult<Duration> {
    match non_blank(value) {
        None => Ok(Duration::from_secs(DEFAULT_LLM_TIMEOUT_SECS)),
        Some(v) => {
            let secs = v.parse::<u64>().map_err(|_| {
                EmrError::InvalidConfig(format!("timeout must be whole seconds, got {v:?}"))
            })?;
            Ok(Duration::from_secs(secs))
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
