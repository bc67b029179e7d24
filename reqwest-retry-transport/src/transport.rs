//! `RetryTransport` retries requests that fail in a transient manner.

use crate::backoff::{Backoff, ExponentialBackoff};
use crate::retryable_strategy::{DefaultRetryableStrategy, RetryableStrategy};
use anyhow::anyhow;
use http::Extensions;
use http_body_util::BodyExt;
use reqwest::{Body, Request, Response};
use reqwest_transport::{Error, RequestContext, Result, Transport};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default number of retries, on top of the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Bytes read from a discarded response before it is dropped.
const MAX_DRAIN_BYTES: usize = 64 * 1024;

/// `RetryTransport` decorates another [`Transport`] and transparently sends a
/// request again when its outcome is classified as transient.
///
/// Every call makes at most `max_retries + 1` attempts. Between attempts it
/// waits as long as the [`Backoff`] says, and the [`RetryableStrategy`]
/// decides whether an outcome is worth another attempt. The outcome of the
/// last attempt is returned untouched, whatever it is.
///
/// The policy is fixed at construction, so a single `RetryTransport` can be
/// shared by any number of concurrent callers.
///
/// ```rust
/// use reqwest_retry_transport::{ExponentialBackoff, RetryTransport};
/// use reqwest_transport::Client;
/// use std::time::Duration;
///
/// let transport = RetryTransport::builder()
///     .transport(reqwest::Client::new())
///     .max_retries(5)
///     .backoff(ExponentialBackoff::new(
///         Duration::from_millis(100),
///         Duration::from_secs(10),
///     ))
///     .build();
///
/// let client = Client::new(transport);
/// ```
///
/// # Request bodies
///
/// Each attempt is sent with its own copy of the request. A streaming body
/// can only be read once, so it is buffered in memory in full before the
/// first attempt.
#[derive(Clone)]
pub struct RetryTransport {
    base: Arc<dyn Transport>,
    max_retries: u32,
    backoff: Arc<dyn Backoff>,
    strategy: Arc<dyn RetryableStrategy>,
}

impl RetryTransport {
    /// Retries requests sent through `base` using the default policy.
    pub fn new<T: Transport>(base: T) -> Self {
        Self::builder().transport(base).build()
    }

    pub fn builder() -> RetryTransportBuilder {
        RetryTransportBuilder::new()
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

/// Wraps a plain [`reqwest::Client`] with the default policy.
impl Default for RetryTransport {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl fmt::Debug for RetryTransport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RetryTransport")
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Transport for RetryTransport {
    async fn send(&self, req: Request, extensions: &mut Extensions) -> Result<Response> {
        let ctx = extensions
            .get::<RequestContext>()
            .cloned()
            .unwrap_or_default();
        let template = replayable(req).await?;

        let mut attempt = 0;
        loop {
            let req = template.try_clone().ok_or_else(|| {
                Error::Transport(anyhow!("Request object is not clonable"))
            })?;

            let result = self.base.send(req, extensions).await;

            // the strategy sees every outcome, the bound only skips the wait
            let retry = self.strategy.should_retry(&template, &ctx, &result);
            if !retry || attempt >= self.max_retries {
                return result;
            }

            let wait = self.backoff.compute_wait(attempt, result.as_ref().ok());
            #[cfg(feature = "tracing")]
            match &result {
                Ok(resp) => tracing::warn!(
                    "Retry attempt #{}. Got status {}, sleeping {:?} before the next attempt",
                    attempt,
                    resp.status(),
                    wait
                ),
                Err(err) => tracing::warn!(
                    "Retry attempt #{}. Got error {}, sleeping {:?} before the next attempt",
                    attempt,
                    err,
                    wait
                ),
            }

            if let Ok(resp) = result {
                discard(resp, &ctx).await;
            }

            if let Err(err) = ctx.run(tokio::time::sleep(wait)).await {
                #[cfg(feature = "tracing")]
                tracing::debug!("Abandoning retries after attempt #{}: {}", attempt, err);
                return Err(err);
            }

            attempt += 1;
        }
    }
}

/// Makes sure `req` can be cloned once per attempt, buffering a streaming
/// body if needed.
async fn replayable(mut req: Request) -> Result<Request> {
    if req.try_clone().is_some() {
        return Ok(req);
    }
    if let Some(body) = req.body_mut().take() {
        let bytes = body
            .collect()
            .await
            .map_err(|e| Error::Transport(anyhow!("failed to buffer request body: {}", e)))?
            .to_bytes();
        *req.body_mut() = Some(Body::from(bytes));
    }
    Ok(req)
}

/// Releases a response the caller will never see.
///
/// Reading a small body to the end lets the connection go back to the pool.
/// Larger bodies are cut short and the connection is closed on drop.
async fn discard(mut resp: Response, ctx: &RequestContext) {
    let drained = ctx
        .run(async {
            let mut read = 0;
            while let Some(chunk) = resp.chunk().await? {
                read += chunk.len();
                if read > MAX_DRAIN_BYTES {
                    break;
                }
            }
            Ok::<_, reqwest::Error>(())
        })
        .await;

    #[cfg(feature = "tracing")]
    match drained {
        Ok(Err(err)) => tracing::debug!("Failed to drain discarded response body: {}", err),
        Err(err) => tracing::debug!("Stopped draining discarded response body: {}", err),
        Ok(Ok(())) => {}
    }
    #[cfg(not(feature = "tracing"))]
    let _ = drained;
}

/// Builds a [`RetryTransport`]. Every option starts out at its default and can
/// be set in any order.
///
/// | option | default |
/// |---|---|
/// | [`transport`](Self::transport) | `reqwest::Client::new()` |
/// | [`max_retries`](Self::max_retries) | [`DEFAULT_MAX_RETRIES`] |
/// | [`backoff`](Self::backoff) | [`ExponentialBackoff::default()`] |
/// | [`retryable_strategy`](Self::retryable_strategy) | [`DefaultRetryableStrategy`] |
#[must_use = "RetryTransportBuilder does nothing until you 'build' it"]
pub struct RetryTransportBuilder {
    base: Option<Arc<dyn Transport>>,
    max_retries: u32,
    backoff: Arc<dyn Backoff>,
    strategy: Arc<dyn RetryableStrategy>,
}

impl RetryTransportBuilder {
    pub fn new() -> Self {
        Self {
            base: None,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: Arc::new(ExponentialBackoff::default()),
            strategy: Arc::new(DefaultRetryableStrategy),
        }
    }

    /// The transport each attempt is delegated to.
    pub fn transport<T: Transport>(self, base: T) -> Self {
        self.transport_arc(Arc::new(base))
    }

    /// Like [`transport`](Self::transport), for a transport that is shared already.
    pub fn transport_arc(mut self, base: Arc<dyn Transport>) -> Self {
        self.base = Some(base);
        self
    }

    /// How many times a request is sent again after the first attempt.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn backoff<B: Backoff>(mut self, backoff: B) -> Self {
        self.backoff = Arc::new(backoff);
        self
    }

    /// Shorthand for an [`ExponentialBackoff`] between `min` and `max`.
    pub fn exponential_backoff(self, min: Duration, max: Duration) -> Self {
        self.backoff(ExponentialBackoff::new(min, max))
    }

    pub fn retryable_strategy<S: RetryableStrategy>(mut self, strategy: S) -> Self {
        self.strategy = Arc::new(strategy);
        self
    }

    pub fn build(self) -> RetryTransport {
        RetryTransport {
            base: self.base.unwrap_or_else(|| Arc::new(reqwest::Client::new())),
            max_retries: self.max_retries,
            backoff: self.backoff,
            strategy: self.strategy,
        }
    }
}

impl Default for RetryTransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}
