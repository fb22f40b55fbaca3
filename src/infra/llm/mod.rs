mod env;
mod gemini;
mod provider;
mod response_parsing;

pub use gemini::{GeminiConfig, GeminiProvider};
pub use provider::QuoteProvider;
