mod quote_job_manager;
mod quote_service;

pub use quote_job_manager::{QuoteJobManager, QuoteJobState, QuoteJobUpdate};
pub use quote_service::{QuoteService, RetryConfig, fetch_quote};
