use crate::domain::{FetchError, Quote, QuoteRequest};

/// A single-attempt quote source. Retries belong to the caller.
pub trait QuoteProvider: Send + Sync {
    fn provider_id(&self) -> &str;

    fn fetch(&self, request: &QuoteRequest) -> Result<Quote, FetchError>;
}
