use http::Extensions;
use paste::paste;
use reqwest::{Body, Request, Response, StatusCode};
use reqwest_retry_transport::{RetryTransport, TransientErrorStrategy};
use reqwest_transport::{Client, Error, RequestContext, Result, Transport};
use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};
use std::time::Duration;
use wiremock::{
    matchers::{body_string, method, path},
    Mock, MockServer, Respond, ResponseTemplate,
};

use crate::helpers::SimpleServer;

/// Answers `status` for the first `failures` requests, `200` afterwards.
pub struct FailingResponder {
    calls: Arc<AtomicU32>,
    failures: u32,
    status: u16,
}

impl FailingResponder {
    fn new(failures: u32, status: u16) -> Self {
        Self {
            calls: Arc::new(AtomicU32::new(0)),
            failures,
            status,
        }
    }
}

impl Respond for FailingResponder {
    fn respond(&self, _request: &wiremock::Request) -> ResponseTemplate {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call > self.failures {
            ResponseTemplate::new(200)
        } else {
            ResponseTemplate::new(self.status)
        }
    }
}

/// Counts the attempts reaching the network.
struct CountingTransport {
    inner: reqwest::Client,
    calls: Arc<AtomicU32>,
}

impl CountingTransport {
    fn new() -> (Self, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let transport = Self {
            inner: reqwest::Client::new(),
            calls: calls.clone(),
        };
        (transport, calls)
    }
}

#[async_trait::async_trait]
impl Transport for CountingTransport {
    async fn send(&self, req: Request, extensions: &mut Extensions) -> Result<Response> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.send(req, extensions).await
    }
}

fn client(max_retries: u32) -> Client {
    Client::new(
        RetryTransport::builder()
            .max_retries(max_retries)
            .exponential_backoff(Duration::ZERO, Duration::ZERO)
            .build(),
    )
}

macro_rules! assert_retry_succeeds_inner {
    ($x:tt, $name:ident, $status:expr, $retry:tt, $exact:tt, $responder:expr) => {
        #[tokio::test]
        async fn $name() {
            let server = MockServer::start().await;
            let retry_amount: u32 = $retry;
            Mock::given(method("GET"))
                .and(path("/foo"))
                .respond_with($responder)
                .expect($exact)
                .mount(&server)
                .await;

            let resp = client(retry_amount)
                .get(&format!("{}/foo", server.uri()))
                .send()
                .await
                .expect("call failed");

            assert_eq!(resp.status(), $status);
        }
    };
}

macro_rules! assert_retry_succeeds {
    ($x:tt, $status:expr) => {
        paste! {
            assert_retry_succeeds_inner!($x, [<assert_retry_succeeds_on_ $x>], $status, 3, 3, FailingResponder::new(2, $x));
        }
    };
}

macro_rules! assert_no_retry {
    ($x:tt, $status:expr) => {
        paste! {
            assert_retry_succeeds_inner!($x, [<assert_no_retry_on_ $x>], $status, 3, 1, ResponseTemplate::new($x));
        }
    };
}

// 2xx.
assert_no_retry!(200, StatusCode::OK);
assert_no_retry!(201, StatusCode::CREATED);
assert_no_retry!(204, StatusCode::NO_CONTENT);

// 3xx.
assert_no_retry!(301, StatusCode::MOVED_PERMANENTLY);
assert_no_retry!(304, StatusCode::NOT_MODIFIED);

// 4xx.
assert_no_retry!(400, StatusCode::BAD_REQUEST);
assert_no_retry!(401, StatusCode::UNAUTHORIZED);
assert_no_retry!(403, StatusCode::FORBIDDEN);
assert_no_retry!(404, StatusCode::NOT_FOUND);
assert_no_retry!(408, StatusCode::REQUEST_TIMEOUT);
assert_no_retry!(409, StatusCode::CONFLICT);
assert_retry_succeeds!(429, StatusCode::OK);

// 5xx.
assert_no_retry!(500, StatusCode::INTERNAL_SERVER_ERROR);
assert_no_retry!(501, StatusCode::NOT_IMPLEMENTED);
assert_retry_succeeds!(502, StatusCode::OK);
assert_retry_succeeds!(503, StatusCode::OK);
assert_retry_succeeds!(504, StatusCode::OK);
assert_no_retry!(505, StatusCode::HTTP_VERSION_NOT_SUPPORTED);

// Two 503s are absorbed by two retries.
assert_retry_succeeds_inner!(
    503,
    assert_succeeds_within_retry_limit,
    StatusCode::OK,
    2,
    3,
    FailingResponder::new(2, 503)
);

// One retry is not enough for two 503s, the last one reaches the caller.
assert_retry_succeeds_inner!(
    503,
    assert_last_failure_returned_once_retries_are_exhausted,
    StatusCode::SERVICE_UNAVAILABLE,
    1,
    2,
    FailingResponder::new(2, 503)
);

// No retries at all means a single attempt.
assert_retry_succeeds_inner!(
    503,
    assert_zero_retries_sends_once,
    StatusCode::SERVICE_UNAVAILABLE,
    0,
    1,
    FailingResponder::new(5, 503)
);

#[tokio::test]
async fn assert_streaming_body_is_intact_on_every_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(body_string("hello streaming world"))
        .respond_with(FailingResponder::new(2, 503))
        .expect(3)
        .mount(&server)
        .await;

    let chunks: Vec<std::result::Result<&'static str, std::io::Error>> =
        vec![Ok("hello "), Ok("streaming "), Ok("world")];
    let body = Body::wrap_stream(futures::stream::iter(chunks));

    let resp = client(3)
        .post(format!("{}/upload", server.uri()))
        .body(body)
        .send()
        .await
        .expect("call failed");

    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn assert_connection_failures_are_retried() {
    // Grab a free port and release it, so nothing listens there.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let uri = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let (counting, calls) = CountingTransport::new();
    let client = Client::new(
        RetryTransport::builder()
            .transport(counting)
            .max_retries(2)
            .exponential_backoff(Duration::ZERO, Duration::ZERO)
            .build(),
    );

    let err = client
        .get(uri)
        .send()
        .await
        .expect_err("nothing is listening");

    assert!(err.is_connect());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn assert_retry_on_incomplete_message() {
    // "HTTP/1.1" is well formed up to that point but misses mandatory parts,
    // which hyper reports as an incomplete message.
    let incomplete_message = "HTTP/1.1";
    let complete_message = "HTTP/1.1 200 OK\r\ncontent-length: 0\r\n\r\n";

    let simple_server = SimpleServer::new(
        "127.0.0.1",
        vec![
            incomplete_message.to_string(),
            incomplete_message.to_string(),
            incomplete_message.to_string(),
            complete_message.to_string(),
        ],
    )
    .await
    .expect("Error when creating a simple server");

    let uri = simple_server.uri();
    let calls = simple_server.calls();
    tokio::spawn(simple_server.start());

    let client = Client::new(
        RetryTransport::builder()
            .max_retries(3)
            .exponential_backoff(Duration::from_millis(1), Duration::from_millis(30))
            .retryable_strategy(TransientErrorStrategy)
            .build(),
    );

    let resp = client
        .get(format!("{}/foo", uri))
        .send()
        .await
        .expect("call failed");

    assert_eq!(resp.status(), 200);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn assert_cancellation_interrupts_backoff() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::new(
        RetryTransport::builder()
            .backoff(|_: u32, _: Option<&Response>| Duration::from_secs(600))
            .build(),
    );

    let ctx = RequestContext::new();
    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let outcome = tokio::time::timeout(
        Duration::from_secs(10),
        client.get(server.uri()).context(ctx).send(),
    )
    .await
    .expect("cancellation did not interrupt the backoff");

    assert!(matches!(outcome, Err(Error::Cancelled)));
}

#[tokio::test]
async fn assert_concurrent_calls_share_one_transport() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(8)
        .mount(&server)
        .await;

    let client = client(3);
    let calls = (0..8).map(|_| {
        let client = client.clone();
        let uri = server.uri();
        tokio::spawn(async move { client.get(uri).send().await })
    });

    for call in calls.collect::<Vec<_>>() {
        let resp = call.await.unwrap().expect("call failed");
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
