use reqwest::StatusCode;

/// Status codes retried by default.
///
/// `500 Internal Server Error` is not part of the set.
pub const RETRYABLE_STATUS_CODES: [StatusCode; 4] = [
    StatusCode::TOO_MANY_REQUESTS,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

/// Classification of an error/status returned by request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retryable {
    /// The failure was due to something that might resolve in the future.
    Transient,
    /// Unresolvable error.
    Fatal,
}

impl Retryable {
    /// Classifies a response status. Returns `None` for successful statuses.
    pub fn from_status(status: StatusCode) -> Option<Self> {
        if RETRYABLE_STATUS_CODES.contains(&status) {
            Some(Retryable::Transient)
        } else if status.is_success() {
            None
        } else {
            Some(Retryable::Fatal)
        }
    }
}
