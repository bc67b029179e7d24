use http::Extensions;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Body, IntoUrl, Method, Request, Response};
use std::convert::TryFrom;
use std::fmt::{self, Display};
use std::sync::Arc;

#[cfg(any(feature = "query", feature = "form", feature = "json"))]
use serde::Serialize;

use crate::context::RequestContext;
use crate::error::Result;
use crate::transport::Transport;

/// A `ClientBuilder` is used to build a [`Client`].
pub struct ClientBuilder {
    client: reqwest::Client,
    transport: Option<Arc<dyn Transport>>,
}

impl ClientBuilder {
    /// `client` is used to assemble requests. Unless another transport is
    /// attached it also sends them.
    pub fn new(client: reqwest::Client) -> Self {
        ClientBuilder {
            client,
            transport: None,
        }
    }

    /// This method allows creating a ClientBuilder
    /// from an existing Client instance
    pub fn from_client(client: Client) -> Self {
        Self {
            client: client.inner,
            transport: Some(client.transport),
        }
    }

    /// Convenience method to attach a transport.
    ///
    /// If you need to keep a reference to the transport after attaching, use [`transport_arc`].
    ///
    /// [`transport_arc`]: Self::transport_arc
    pub fn transport<T>(self, transport: T) -> Self
    where
        T: Transport,
    {
        self.transport_arc(Arc::new(transport))
    }

    /// Replace the transport requests are sent through.
    pub fn transport_arc(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Returns a `Client` using this builder configuration.
    pub fn build(self) -> Client {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(self.client.clone()),
        };
        Client {
            inner: self.client,
            transport,
        }
    }
}

/// `Client` is a wrapper around [`reqwest::Client`] which sends every request
/// through a [`Transport`].
#[derive(Clone)]
pub struct Client {
    inner: reqwest::Client,
    transport: Arc<dyn Transport>,
}

impl Client {
    /// Sends requests through `transport`, assembling them with a default
    /// [`reqwest::Client`]. See [`ClientBuilder`] to supply your own.
    pub fn new<T>(transport: T) -> Self
    where
        T: Transport,
    {
        ClientBuilder::new(reqwest::Client::new())
            .transport(transport)
            .build()
    }

    /// Convenience method to make a `GET` request to a URL.
    ///
    /// # Errors
    ///
    /// This method fails whenever the supplied `Url` cannot be parsed.
    pub fn get<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    /// Convenience method to make a `POST` request to a URL.
    ///
    /// # Errors
    ///
    /// This method fails whenever the supplied `Url` cannot be parsed.
    pub fn post<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    /// Convenience method to make a `PUT` request to a URL.
    pub fn put<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.request(Method::PUT, url)
    }

    /// Convenience method to make a `PATCH` request to a URL.
    pub fn patch<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.request(Method::PATCH, url)
    }

    /// Convenience method to make a `DELETE` request to a URL.
    pub fn delete<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.request(Method::DELETE, url)
    }

    /// Convenience method to make a `HEAD` request to a URL.
    pub fn head<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.request(Method::HEAD, url)
    }

    /// Start building a `Request` with the `Method` and `Url`.
    ///
    /// Returns a `RequestBuilder`, which will allow setting headers and
    /// the request body before sending.
    ///
    /// # Errors
    ///
    /// This method fails whenever the supplied `Url` cannot be parsed.
    pub fn request<U: IntoUrl>(&self, method: Method, url: U) -> RequestBuilder {
        RequestBuilder {
            inner: self.inner.request(method, url),
            extensions: Extensions::new(),
            transport: self.transport.clone(),
        }
    }

    /// Executes a `Request` through the transport.
    ///
    /// You should prefer to use the `RequestBuilder` and
    /// `RequestBuilder::send()`.
    ///
    /// The request starts out without extensions, so no [`RequestContext`]
    /// applies to it. Use [`execute_with_extensions`](Self::execute_with_extensions)
    /// to pass one.
    ///
    /// # Errors
    ///
    /// This method fails if the transport could not obtain a response.
    pub async fn execute(&self, req: Request) -> Result<Response> {
        let mut ext = Extensions::new();
        self.execute_with_extensions(req, &mut ext).await
    }

    /// Executes a `Request` with initial [`Extensions`].
    ///
    /// # Errors
    ///
    /// This method fails if the transport could not obtain a response.
    pub async fn execute_with_extensions(
        &self,
        req: Request,
        ext: &mut Extensions,
    ) -> Result<Response> {
        self.transport.send(req, ext).await
    }
}

/// Create a `Client` which sends requests with the given [`reqwest::Client`].
impl From<reqwest::Client> for Client {
    fn from(client: reqwest::Client) -> Self {
        ClientBuilder::new(client).build()
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // the transport is a trait object without a Debug bound
        f.debug_struct("Client")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

mod service {
    use std::{
        future::Future,
        pin::Pin,
        task::{Context, Poll},
    };

    use crate::Result;
    use http::Extensions;
    use reqwest::{Request, Response};

    use crate::{transport::BoxFuture, Client};

    // this is meant to be semi-private, same as reqwest's pending
    pub struct Pending {
        inner: BoxFuture<'static, Result<Response>>,
    }

    impl Unpin for Pending {}

    impl Future for Pending {
        type Output = Result<Response>;

        fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
            self.inner.as_mut().poll(cx)
        }
    }

    /// Each call starts out without extensions, like [`Client::execute`].
    impl tower_service::Service<Request> for Client {
        type Response = Response;
        type Error = crate::Error;
        type Future = Pending;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: Request) -> Self::Future {
            let transport = self.transport.clone();
            Pending {
                inner: Box::pin(async move {
                    let mut extensions = Extensions::new();
                    transport.send(req, &mut extensions).await
                }),
            }
        }
    }
}

/// This is a wrapper around [`reqwest::RequestBuilder`] exposing the same API.
#[must_use = "RequestBuilder does nothing until you 'send' it"]
pub struct RequestBuilder {
    inner: reqwest::RequestBuilder,
    transport: Arc<dyn Transport>,
    extensions: Extensions,
}

impl RequestBuilder {
    /// Add a `Header` to this Request.
    pub fn header<K, V>(self, key: K, value: V) -> Self
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        RequestBuilder {
            inner: self.inner.header(key, value),
            ..self
        }
    }

    /// Add a set of Headers to the existing ones on this Request.
    ///
    /// The headers will be merged in to any already set.
    pub fn headers(self, headers: HeaderMap) -> Self {
        RequestBuilder {
            inner: self.inner.headers(headers),
            ..self
        }
    }

    /// Enable HTTP basic authentication.
    pub fn basic_auth<U, P>(self, username: U, password: Option<P>) -> Self
    where
        U: Display,
        P: Display,
    {
        RequestBuilder {
            inner: self.inner.basic_auth(username, password),
            ..self
        }
    }

    /// Enable HTTP bearer authentication.
    pub fn bearer_auth<T>(self, token: T) -> Self
    where
        T: Display,
    {
        RequestBuilder {
            inner: self.inner.bearer_auth(token),
            ..self
        }
    }

    /// Set the request body.
    pub fn body<T: Into<Body>>(self, body: T) -> Self {
        RequestBuilder {
            inner: self.inner.body(body),
            ..self
        }
    }

    /// Enables a request timeout.
    ///
    /// The timeout applies to every single send of the request. To bound the
    /// whole call, retries included, attach a [`RequestContext`] with a
    /// deadline instead.
    pub fn timeout(self, timeout: std::time::Duration) -> Self {
        RequestBuilder {
            inner: self.inner.timeout(timeout),
            ..self
        }
    }

    /// Modify the query string of the URL.
    ///
    /// # Errors
    /// This method will fail if the object you provide cannot be serialized
    /// into a query string.
    #[cfg(feature = "query")]
    pub fn query<T: Serialize + ?Sized>(self, query: &T) -> Self {
        RequestBuilder {
            inner: self.inner.query(query),
            ..self
        }
    }

    /// Send a form body.
    ///
    /// # Errors
    ///
    /// This method fails if the passed value cannot be serialized into
    /// url encoded format
    #[cfg(feature = "form")]
    pub fn form<T: Serialize + ?Sized>(self, form: &T) -> Self {
        RequestBuilder {
            inner: self.inner.form(form),
            ..self
        }
    }

    /// Send a JSON body.
    ///
    /// # Errors
    ///
    /// Serialization can fail if `T`'s implementation of `Serialize` decides to
    /// fail, or if `T` contains a map with non-string keys.
    #[cfg(feature = "json")]
    pub fn json<T: Serialize + ?Sized>(self, json: &T) -> Self {
        RequestBuilder {
            inner: self.inner.json(json),
            ..self
        }
    }

    /// Attach the cancellation and deadline context this request is bound to.
    ///
    /// ```no_run
    /// # async fn run() -> reqwest_transport::Result<()> {
    /// use std::time::Duration;
    /// use reqwest_transport::{Client, RequestContext};
    ///
    /// let client = Client::from(reqwest::Client::new());
    /// let ctx = RequestContext::new().with_timeout(Duration::from_secs(5));
    /// let resp = client.get("https://example.com").context(ctx).send().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn context(mut self, ctx: RequestContext) -> Self {
        self.extensions.insert(ctx);
        self
    }

    /// Build a `Request`, which can be inspected, modified and executed with
    /// `Client::execute()`.
    pub fn build(self) -> reqwest::Result<Request> {
        self.inner.build()
    }

    /// Build a `Request`, also handing back the transport it would have been
    /// sent through.
    pub fn build_split(self) -> (Arc<dyn Transport>, reqwest::Result<Request>) {
        (self.transport, self.inner.build())
    }

    /// Inserts the extension into this request builder
    pub fn with_extension<T: Send + Sync + Clone + 'static>(mut self, extension: T) -> Self {
        self.extensions.insert(extension);
        self
    }

    /// Returns a mutable reference to the internal set of extensions for this request
    pub fn extensions(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// Constructs the Request and sends it through the transport, returning a
    /// future Response.
    ///
    /// # Errors
    ///
    /// This method fails if the request could not be built or the transport
    /// could not obtain a response.
    pub async fn send(mut self) -> Result<Response> {
        let mut extensions = std::mem::take(self.extensions());
        let (transport, req) = self.build_split();
        transport.send(req?, &mut extensions).await
    }

    /// Attempt to clone the RequestBuilder.
    ///
    /// `None` is returned if the RequestBuilder can not be cloned,
    /// i.e. if the request body is a stream.
    pub fn try_clone(&self) -> Option<Self> {
        self.inner.try_clone().map(|inner| RequestBuilder {
            inner,
            transport: self.transport.clone(),
            extensions: self.extensions.clone(),
        })
    }
}

impl fmt::Debug for RequestBuilder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RequestBuilder")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}
