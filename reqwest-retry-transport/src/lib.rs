//! A [`Transport`](reqwest_transport::Transport) decorator that transparently retries requests
//! failing in a transient manner.
//!
//! [`RetryTransport`] sits between the caller and the transport that actually sends requests.
//! Each outcome is handed to a [`RetryableStrategy`], and a [`Backoff`] decides how long to wait
//! before the next attempt. The request's [`RequestContext`](reqwest_transport::RequestContext)
//! cuts both short.
//!
//! ```rust
//! use reqwest_retry_transport::RetryTransport;
//! use reqwest_transport::Client;
//!
//! async fn run() {
//!     // Up to 3 retries, waiting between 0 and 1s, 2s, 4s with full jitter.
//!     let client = Client::new(RetryTransport::new(reqwest::Client::new()));
//!     let resp = client.get("https://example.com").send().await.unwrap();
//!     println!("{}", resp.status());
//! }
//! ```
mod backoff;
mod retryable;
mod retryable_strategy;
mod transport;

pub use backoff::{
    Backoff, ExponentialBackoff, RetryAfterBackoff, DEFAULT_MAX_BACKOFF, DEFAULT_MIN_BACKOFF,
};
pub use retryable::{Retryable, RETRYABLE_STATUS_CODES};
pub use retryable_strategy::{
    default_on_request_error, default_on_request_failure, default_on_request_success,
    DefaultRetryableStrategy, RetryableStrategy, TransientErrorStrategy,
};
pub use transport::{RetryTransport, RetryTransportBuilder, DEFAULT_MAX_RETRIES};
