use thiserror::Error;

const RATE_LIMITED_STATUS: u16 = 429;
const MISSING_API_KEY_MESSAGE: &str =
    "API key is not configured. Please set up your API key in the environment variables.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorCategory {
    UserActionRequired,
    TemporaryFailure,
    InternalFailure,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("configuration error: {message}")]
    Config { message: String },
    #[error("API call failed with status: {status}")]
    Http { status: u16, message: String },
    #[error("provider returned an unexpected response: {message}")]
    Parse { message: String },
    #[error("provider transport failed: {message}")]
    Transport { message: String },
    #[error("quote fetch cancelled")]
    Cancelled,
    #[error("a quote fetch is already in progress")]
    Busy,
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl FetchError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn missing_api_key() -> Self {
        Self::config(MISSING_API_KEY_MESSAGE)
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn category(&self) -> FetchErrorCategory {
        match self {
            Self::Config { .. } | Self::Busy => FetchErrorCategory::UserActionRequired,
            Self::Http { status, .. } if *status == RATE_LIMITED_STATUS || *status >= 500 => {
                FetchErrorCategory::TemporaryFailure
            }
            Self::Transport { .. } | Self::Cancelled => FetchErrorCategory::TemporaryFailure,
            Self::Http { status, .. } if *status == 401 || *status == 403 => {
                FetchErrorCategory::UserActionRequired
            }
            Self::Http { .. } | Self::Parse { .. } | Self::Internal { .. } => {
                FetchErrorCategory::InternalFailure
            }
        }
    }

    /// Only rate limiting is retried; every other failure aborts the fetch.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Http { status, .. } if *status == RATE_LIMITED_STATUS)
    }

    pub fn user_message(&self) -> String {
        match self {
            Self::Config { message } => message.clone(),
            Self::Http { status, .. } => format!("API call failed with status: {status}"),
            Self::Parse { .. } => {
                "Couldn't generate a motivational message. Please try again.".to_string()
            }
            Self::Transport { message } => {
                format!("Could not reach the quote service: {message}")
            }
            Self::Cancelled => "The motivational message request was cancelled.".to_string(),
            Self::Busy => "A motivational message is already being generated.".to_string(),
            Self::Internal { message } => {
                format!("An internal error occurred while fetching a quote: {message}")
            }
        }
    }
}
