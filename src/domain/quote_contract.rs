use serde::{Deserialize, Serialize};

use super::FetchError;

pub const DEFAULT_MOTIVATION_PROMPT: &str = "Give me a short, inspiring motivational quote or message (1-2 sentences) for an agile, athletic workout. Focus on discipline, consistency, and a lean, powerful physique like Tom Cruise in action movies. Use an encouraging and confident tone.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub prompt: String,
}

impl QuoteRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }

    pub fn validate(&self) -> Result<(), FetchError> {
        if self.prompt.trim().is_empty() {
            return Err(FetchError::config("prompt must not be empty"));
        }
        Ok(())
    }
}

impl Default for QuoteRequest {
    fn default() -> Self {
        Self::new(DEFAULT_MOTIVATION_PROMPT)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteMetadata {
    #[serde(default)]
    pub latency_ms: Option<u64>,
    #[serde(default)]
    pub model_version: Option<String>,
    #[serde(default)]
    pub finish_reason: Option<String>,
    /// Number of HTTP requests issued, rate-limited retries included.
    #[serde(default)]
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub text: String,
    #[serde(default)]
    pub metadata: QuoteMetadata,
}

impl Quote {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: QuoteMetadata::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_MOTIVATION_PROMPT, QuoteRequest};
    use crate::domain::FetchError;

    #[test]
    fn default_request_uses_motivation_prompt() {
        let request = QuoteRequest::default();

        assert_eq!(request.prompt, DEFAULT_MOTIVATION_PROMPT);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn validate_rejects_blank_prompt() {
        let error = QuoteRequest::new("   ")
            .validate()
            .expect_err("blank prompt should fail validation");

        assert!(matches!(
            error,
            FetchError::Config { message } if message == "prompt must not be empty"
        ));
    }
}
