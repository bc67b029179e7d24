use reqwest::{StatusCode, Url};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A transport layer failed on its own, without the request reaching the network
    #[error("Transport error: {0}")]
    Transport(#[from] anyhow::Error),
    /// Error from the underlying reqwest client
    #[error("Request error: {0}")]
    Reqwest(#[from] reqwest::Error),
    /// The [`RequestContext`](crate::RequestContext) of the request was cancelled
    #[error("request cancelled")]
    Cancelled,
    /// The deadline of the [`RequestContext`](crate::RequestContext) passed
    #[error("request deadline exceeded")]
    DeadlineExceeded,
}

impl Error {
    /// Returns a possible URL related to this error.
    pub fn url(&self) -> Option<&Url> {
        match self {
            Error::Reqwest(e) => e.url(),
            _ => None,
        }
    }

    /// Strip the related url from this error (if, for example, it contains
    /// sensitive information)
    pub fn without_url(self) -> Self {
        match self {
            Error::Reqwest(e) => e.without_url().into(),
            _ => self,
        }
    }

    /// Returns true if the request was cancelled through its context.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Returns true if the error is related to a timeout, including an
    /// exceeded context deadline.
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::DeadlineExceeded => true,
            Error::Reqwest(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// Returns true if the error is related to the request
    pub fn is_request(&self) -> bool {
        match self {
            Error::Reqwest(e) => e.is_request(),
            _ => false,
        }
    }

    /// Returns true if the error is related to connect
    pub fn is_connect(&self) -> bool {
        match self {
            Error::Reqwest(e) => e.is_connect(),
            _ => false,
        }
    }

    /// Returns true if the error is related to the request or response body
    pub fn is_body(&self) -> bool {
        match self {
            Error::Reqwest(e) => e.is_body(),
            _ => false,
        }
    }

    /// Returns the status code, if the error was generated from a response.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Reqwest(e) => e.status(),
            _ => None,
        }
    }
}
