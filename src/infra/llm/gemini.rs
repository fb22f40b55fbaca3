use std::time::{Duration, Instant};

use log::debug;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::domain::{FetchError, Quote, QuoteMetadata, QuoteRequest};

use super::QuoteProvider;
use super::env::{read_env_var, read_first_env_var, read_timeout_from_env};
use super::response_parsing::{decode_generate_content, summarize_error_body};

const PROVIDER_ID: &str = "gemini";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-05-20";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
const ENV_API_KEY: &str = "WORKOUT_MOTIVATION_GEMINI_API_KEY";
const ENV_API_KEY_FALLBACK: &str = "GEMINI_API_KEY";
const ENV_BASE_URL: &str = "WORKOUT_MOTIVATION_GEMINI_BASE_URL";
const ENV_MODEL: &str = "WORKOUT_MOTIVATION_GEMINI_MODEL";
const ENV_TIMEOUT_SECS: &str = "WORKOUT_MOTIVATION_TIMEOUT_SECS";

/// Connection settings for [`GeminiProvider`], usually read from the environment.
#[derive(Clone, PartialEq, Eq)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl GeminiConfig {
    pub fn from_env() -> Result<Self, FetchError> {
        let defaults = Self::default();
        Ok(Self {
            api_key: read_first_env_var(&[ENV_API_KEY, ENV_API_KEY_FALLBACK])?,
            base_url: read_env_var(ENV_BASE_URL)?.unwrap_or(defaults.base_url),
            model: read_env_var(ENV_MODEL)?.unwrap_or(defaults.model),
            timeout: read_timeout_from_env(ENV_TIMEOUT_SECS)?.unwrap_or(defaults.timeout),
        })
    }
}

pub struct GeminiProvider {
    api_key: String,
    api_base_url: String,
    model: String,
    client: Client,
}

impl GeminiProvider {
    pub fn from_api_key(api_key: impl Into<String>) -> Result<Self, FetchError> {
        Self::with_config(api_key, DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_TIMEOUT)
    }

    pub fn from_env() -> Result<Self, FetchError> {
        Self::from_config(GeminiConfig::from_env()?)
    }

    pub fn from_config(config: GeminiConfig) -> Result<Self, FetchError> {
        let api_key = config.api_key.ok_or_else(FetchError::missing_api_key)?;
        Self::with_config(api_key, config.base_url, config.model, config.timeout)
    }

    pub fn with_config(
        api_key: impl Into<String>,
        api_base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(FetchError::missing_api_key());
        }

        let api_base_url = api_base_url.into();
        if api_base_url.trim().is_empty() {
            return Err(FetchError::config("Gemini API base URL must not be empty"));
        }

        let model = model.into();
        if model.trim().is_empty() {
            return Err(FetchError::config("Gemini model must not be empty"));
        }

        let client = Client::builder().timeout(timeout).build().map_err(|err| {
            FetchError::internal(format!("failed to create Gemini HTTP client: {err}"))
        })?;

        Ok(Self {
            api_key: api_key.trim().to_string(),
            api_base_url,
            model: model.trim().to_string(),
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base_url.trim_end_matches('/'),
            self.model
        )
    }

    fn build_request_payload(&self, request: &QuoteRequest) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![RequestContent {
                role: "user".to_string(),
                parts: vec![RequestPart {
                    text: request.prompt.clone(),
                }],
            }],
        }
    }

    fn map_success_response(
        &self,
        response_body: &str,
        latency_ms: u64,
    ) -> Result<Quote, FetchError> {
        let response = decode_generate_content(response_body)?;
        let text = response.first_text().ok_or_else(|| {
            FetchError::parse("Gemini response did not include candidates[0].content.parts[0].text")
        })?;

        Ok(Quote {
            text: text.to_string(),
            metadata: QuoteMetadata {
                latency_ms: Some(latency_ms),
                model_version: response.model_version.clone(),
                finish_reason: response.first_finish_reason().map(str::to_owned),
                attempts: 1,
            },
        })
    }
}

impl QuoteProvider for GeminiProvider {
    fn provider_id(&self) -> &str {
        PROVIDER_ID
    }

    fn fetch(&self, request: &QuoteRequest) -> Result<Quote, FetchError> {
        let payload = self.build_request_payload(request);
        let started = Instant::now();

        debug!("POST {} (model {})", self.endpoint_url(), self.model);
        let response = self
            .client
            .post(self.endpoint_url())
            .query(&[("key", self.api_key.as_str())])
            .header("content-type", "application/json")
            .json(&payload)
            .send()
            .map_err(map_transport_error)?;

        let status = response.status();
        let response_body = response.text().map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_http_error(status.as_u16(), &response_body));
        }

        let elapsed_ms = started.elapsed().as_millis();
        let latency_ms = u64::try_from(elapsed_ms).unwrap_or(u64::MAX);
        self.map_success_response(&response_body, latency_ms)
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<RequestContent>,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    role: String,
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
struct RequestPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorEnvelope {
    #[serde(default)]
    error: Option<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    #[serde(default)]
    message: String,
}

fn map_http_error(status: u16, body: &str) -> FetchError {
    let message = serde_json::from_str::<GeminiErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error)
        .map(|detail| detail.message)
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| summarize_error_body(body));
    FetchError::http(status, message)
}

fn map_transport_error(error: reqwest::Error) -> FetchError {
    // reqwest includes the full URL in its error text, which carries the API key.
    let error = error.without_url();
    if error.is_timeout() {
        return FetchError::transport(format!("Gemini request timed out: {error}"));
    }
    FetchError::transport(format!("Gemini transport error: {error}"))
}
