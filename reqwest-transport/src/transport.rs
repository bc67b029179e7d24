use http::Extensions;
use reqwest::{Client, Request, Response};
use std::sync::Arc;

use crate::context::RequestContext;
use crate::error::{Error, Result};

/// Sends a single request and yields its response, the way a plain
/// [`reqwest::Client`] does.
///
/// A transport returns `Ok` whenever the server produced a response, whatever
/// its status, and `Err` only when no response could be obtained. It must be
/// safe to call repeatedly and concurrently with equivalent requests, which
/// lets decorators such as a retrying transport wrap any other transport.
///
/// # Example
///
/// ```
/// use http::Extensions;
/// use reqwest::{Request, Response};
/// use reqwest_transport::{Result, Transport};
///
/// struct LoggingTransport<T>(T);
///
/// #[async_trait::async_trait]
/// impl<T: Transport> Transport for LoggingTransport<T> {
///     async fn send(&self, req: Request, extensions: &mut Extensions) -> Result<Response> {
///         println!("Request started {}", req.url());
///         let res = self.0.send(req, extensions).await;
///         println!("Result: {:?}", res);
///         res
///     }
/// }
/// ```
#[async_trait::async_trait]
pub trait Transport: 'static + Send + Sync {
    /// Sends `req`. The `extensions` are shared by every layer handling this
    /// request and carry its [`RequestContext`], if any.
    async fn send(&self, req: Request, extensions: &mut Extensions) -> Result<Response>;
}

/// The system transport. Honours the [`RequestContext`] found in the
/// extensions by abandoning the in-flight call once it is done.
#[async_trait::async_trait]
impl Transport for Client {
    async fn send(&self, req: Request, extensions: &mut Extensions) -> Result<Response> {
        match extensions.get::<RequestContext>().cloned() {
            Some(ctx) => ctx.run(self.execute(req)).await?.map_err(Error::from),
            None => self.execute(req).await.map_err(Error::from),
        }
    }
}

#[async_trait::async_trait]
impl<T> Transport for Arc<T>
where
    T: Transport + ?Sized,
{
    async fn send(&self, req: Request, extensions: &mut Extensions) -> Result<Response> {
        (**self).send(req, extensions).await
    }
}

#[async_trait::async_trait]
impl<T> Transport for Box<T>
where
    T: Transport + ?Sized,
{
    async fn send(&self, req: Request, extensions: &mut Extensions) -> Result<Response> {
        (**self).send(req, extensions).await
    }
}

pub type BoxFuture<'a, T> = std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;
