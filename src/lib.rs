//! Fetches a short motivational workout quote from a text-generation API.
//!
//! [`fetch_quote`] is the one-call entry point. [`app::QuoteService`] exposes the
//! retry policy and cancellation, and [`app::QuoteJobManager`] runs fetches off
//! the caller's thread.

pub mod app;
pub mod domain;
pub mod infra;

pub use app::fetch_quote;
pub use domain::{FetchError, Quote, QuoteRequest};
