use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// A toy HTTP server answering the n-th connection with the n-th raw response,
/// repeating the last one once the list runs out. Lets tests send bytes that
/// are not valid HTTP.
pub struct SimpleServer {
    listener: TcpListener,
    host: String,
    port: u16,
    raw_http_responses: Vec<String>,
    calls: Arc<AtomicUsize>,
}

impl SimpleServer {
    pub async fn new(host: &str, raw_http_responses: Vec<String>) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(format!("{}:0", host)).await?;
        let port = listener.local_addr()?.port();

        Ok(Self {
            listener,
            host: host.to_string(),
            port,
            raw_http_responses,
            calls: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn uri(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Number of requests answered so far.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    pub async fn start(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, _)) => {
                    let call = self.calls.fetch_add(1, Ordering::SeqCst);
                    let last = self.raw_http_responses.len() - 1;
                    let response = self.raw_http_responses[call.min(last)].clone();
                    if let Err(e) = Self::handle_connection(stream, response).await {
                        println!("Error handling connection: {}", e);
                    }
                }
                Err(e) => println!("Connection failed: {}", e),
            }
        }
    }

    async fn handle_connection(
        mut stream: TcpStream,
        raw_http_response: String,
    ) -> anyhow::Result<()> {
        // 1024 bytes is enough for the request line and headers of a test request
        let mut buffer = [0; 1024];
        let read = stream.read(&mut buffer).await?;

        let request = String::from_utf8_lossy(&buffer[..read]);
        if let Some(request_line) = request.lines().next() {
            println!("Request: {}", request_line);
        }

        stream.write_all(raw_http_response.as_bytes()).await?;
        stream.flush().await?;
        stream.shutdown().await?;
        Ok(())
    }
}
