//! This crate provides [`Transport`], the seam between code that issues HTTP requests and the
//! component that actually puts them on the wire, plus [`Client`], a wrapper around
//! [`reqwest::Client`] that sends every request through a transport of your choosing.
//!
//! Transports compose as decorators: a transport can wrap another transport and change how
//! requests are sent (retrying them, logging them, ...) without the caller noticing. Each
//! request may carry a [`RequestContext`] whose cancellation and deadline every layer honours.
//!
//! ```
//! use http::Extensions;
//! use reqwest::{Request, Response};
//! use reqwest_transport::{Client, RequestContext, Result, Transport};
//! use std::time::Duration;
//!
//! struct LoggingTransport(reqwest::Client);
//!
//! #[async_trait::async_trait]
//! impl Transport for LoggingTransport {
//!     async fn send(&self, req: Request, extensions: &mut Extensions) -> Result<Response> {
//!         println!("Request started {:?}", req);
//!         let res = self.0.send(req, extensions).await;
//!         println!("Result: {:?}", res);
//!         res
//!     }
//! }
//!
//! async fn run() {
//!     let client = Client::new(LoggingTransport(reqwest::Client::new()));
//!     let resp = client
//!         .get("https://example.com")
//!         .context(RequestContext::new().with_timeout(Duration::from_secs(10)))
//!         .send()
//!         .await
//!         .unwrap();
//!     println!("Page HTML: {}", resp.text().await.unwrap());
//! }
//! ```
mod client;
mod context;
mod error;
mod transport;

pub use client::{Client, ClientBuilder, RequestBuilder};
pub use context::RequestContext;
pub use error::{Error, Result};
pub use transport::{BoxFuture, Transport};
