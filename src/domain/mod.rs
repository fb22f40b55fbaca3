mod errors;
mod greeting;
mod quote_contract;

pub use errors::{FetchError, FetchErrorCategory};
pub use greeting::Greeting;
pub use quote_contract::{DEFAULT_MOTIVATION_PROMPT, Quote, QuoteMetadata, QuoteRequest};
