use crate::retryable::Retryable;
use reqwest::{Request, Response};
use reqwest_transport::{Error, RequestContext, Result};

/// Decides whether the outcome of an attempt warrants another attempt.
///
/// The outcome of calling the transport could be:
/// - [`reqwest::Response`] In case the request has been sent and received correctly.
///   This could however still mean that the server responded with a erroneous response,
///   for example a HTTP status code of 503.
/// - [`reqwest_transport::Error`] In this case no response was obtained.
///   This could, for example, be caused by a refused connection.
///
/// A strategy must be pure: it is consulted once per attempt and must not
/// perform I/O. Closures with the matching signature are strategies too, and
/// can defer to [`DefaultRetryableStrategy`] for the cases they don't care about.
///
/// Example:
///
/// ```
/// use reqwest::{Request, Response, StatusCode};
/// use reqwest_retry_transport::{DefaultRetryableStrategy, RetryTransport, RetryableStrategy};
/// use reqwest_transport::{RequestContext, Result};
///
/// // Just a toy example, also retry when the server answered 500.
/// struct Retry500;
///
/// impl RetryableStrategy for Retry500 {
///     fn should_retry(&self, req: &Request, ctx: &RequestContext, res: &Result<Response>) -> bool {
///         match res {
///             Ok(resp) if resp.status() == StatusCode::INTERNAL_SERVER_ERROR => !ctx.is_done(),
///             _ => DefaultRetryableStrategy.should_retry(req, ctx, res),
///         }
///     }
/// }
///
/// let transport = RetryTransport::builder()
///     .max_retries(2)
///     .retryable_strategy(Retry500)
///     .build();
/// ```
pub trait RetryableStrategy: Send + Sync + 'static {
    fn should_retry(&self, req: &Request, ctx: &RequestContext, res: &Result<Response>) -> bool;
}

impl<F> RetryableStrategy for F
where
    F: Fn(&Request, &RequestContext, &Result<Response>) -> bool + Send + Sync + 'static,
{
    fn should_retry(&self, req: &Request, ctx: &RequestContext, res: &Result<Response>) -> bool {
        (self)(req, ctx, res)
    }
}

/// The default [`RetryableStrategy`] for [`RetryTransport`](crate::RetryTransport).
///
/// Never retries once the request context is cancelled or expired. Otherwise
/// retries every transport failure and the statuses in
/// [`RETRYABLE_STATUS_CODES`](crate::RETRYABLE_STATUS_CODES).
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRetryableStrategy;

impl RetryableStrategy for DefaultRetryableStrategy {
    fn should_retry(&self, _req: &Request, ctx: &RequestContext, res: &Result<Response>) -> bool {
        if ctx.is_done() {
            return false;
        }
        let retryable = match res {
            Ok(success) => default_on_request_success(success),
            Err(error) => default_on_request_failure(error),
        };
        retryable == Some(Retryable::Transient)
    }
}

/// Default request success retry strategy.
///
/// Will only retry if the status is one of
/// [`RETRYABLE_STATUS_CODES`](crate::RETRYABLE_STATUS_CODES).
///
/// Note that success here means that a response was obtained, not that it was logically OK.
pub fn default_on_request_success(success: &Response) -> Option<Retryable> {
    Retryable::from_status(success.status())
}

/// Default request failure retry strategy.
///
/// Any failure to obtain a response is retried, except for the request's own
/// cancellation or deadline.
pub fn default_on_request_failure(error: &Error) -> Option<Retryable> {
    match error {
        Error::Cancelled | Error::DeadlineExceeded => Some(Retryable::Fatal),
        Error::Reqwest(_) | Error::Transport(_) => Some(Retryable::Transient),
    }
}

/// A stricter [`RetryableStrategy`] which only retries errors that look like
/// network hiccups: timeouts, refused or reset connections and responses cut
/// off halfway. Statuses and cancellation are handled like
/// [`DefaultRetryableStrategy`] does.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransientErrorStrategy;

impl RetryableStrategy for TransientErrorStrategy {
    fn should_retry(&self, _req: &Request, ctx: &RequestContext, res: &Result<Response>) -> bool {
        if ctx.is_done() {
            return false;
        }
        let retryable = match res {
            Ok(success) => default_on_request_success(success),
            Err(Error::Reqwest(error)) => default_on_request_error(error),
            Err(_) => Some(Retryable::Fatal),
        };
        retryable == Some(Retryable::Transient)
    }
}

/// Classifies a [`reqwest::Error`] for [`TransientErrorStrategy`].
pub fn default_on_request_error(error: &reqwest::Error) -> Option<Retryable> {
    if error.is_timeout() || error.is_connect() {
        Some(Retryable::Transient)
    } else if error.is_body() || error.is_decode() || error.is_builder() || error.is_redirect() {
        Some(Retryable::Fatal)
    } else if error.is_request() {
        // reqwest reports a response cut off mid-way as a generic request
        // error, the hyper error underneath tells what actually happened.
        if let Some(hyper_error) = get_source_error_type::<hyper::Error>(error) {
            if hyper_error.is_incomplete_message() || hyper_error.is_canceled() {
                Some(Retryable::Transient)
            } else if let Some(io_error) = get_source_error_type::<std::io::Error>(hyper_error) {
                Some(classify_io_error(io_error))
            } else {
                Some(Retryable::Fatal)
            }
        } else {
            Some(Retryable::Fatal)
        }
    } else {
        None
    }
}

fn classify_io_error(error: &std::io::Error) -> Retryable {
    match error.kind() {
        std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::ConnectionAborted => {
            Retryable::Transient
        }
        _ => Retryable::Fatal,
    }
}

/// Downcasts the given err source into T.
fn get_source_error_type<T: std::error::Error + 'static>(
    err: &dyn std::error::Error,
) -> Option<&T> {
    let mut source = err.source();

    while let Some(err) = source {
        if let Some(err) = err.downcast_ref::<T>() {
            return Some(err);
        }

        source = err.source();
    }
    None
}
