use std::{
    io,
    pin::Pin,
    sync::atomic::{AtomicBool, Ordering},
    task::{Context, Poll},
    time::Duration,
};

use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt},
    time::timeout,
};
use tracing::{debug, warn};

use crate::{
    config::ServerConfig,
    http::{
        request::{HttpError, Request, request_from_reader},
        response::{Response, StatusCode, write_response},
    },
    runtime::handler::Handler,
};

/// Per-connection knobs taken from the server configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Upper bound of bytes read from the stream at once.
    pub read_size: usize,
    /// Upper bound of bytes the request line and headers may take together.
    pub max_head_size: usize,
    /// How long the client may take to deliver its request. `None` waits forever.
    pub read_timeout: Option<Duration>,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for ConnectionSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            read_size: config.read_buffer_size,
            max_head_size: config.max_head_size,
            read_timeout: config.read_timeout_secs.map(Duration::from_secs),
        }
    }
}

/// Wraps the connection's stream and counts what a handler writes through it.
#[derive(Debug)]
pub struct ResponseWriter<'a, S> {
    inner: &'a mut S,
    written: usize,
}

impl<'a, S: AsyncWrite + Unpin> ResponseWriter<'a, S> {
    /// Wraps `inner` with a count of 0.
    pub fn new(inner: &'a mut S) -> Self {
        Self { inner, written: 0 }
    }

    /// Amount of bytes written so far.
    #[must_use]
    pub const fn bytes_written(&self) -> usize {
        self.written
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for ResponseWriter<'_, S> {
    fn poll_write(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let poll = Pin::new(&mut *self.inner).poll_write(cx, buf);
        if let Poll::Ready(Ok(written)) = poll {
            self.written += written;
        }
        poll
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut *self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut *self.inner).poll_shutdown(cx)
    }
}

/// Owns one connection for the lifetime of a single request / response exchange.
///
/// The stream is shut down exactly once before returning, whatever the outcome.
///
/// # Errors
///
/// Returns the `HttpError` that ended the exchange early. Syntax errors have already been answered with
/// `400 Bad Request` at that point; a stream that ended before the request was complete got no answer.
pub async fn handle_connection<S, H>(
    mut stream: S,
    handler: &H,
    closed: &AtomicBool,
    settings: ConnectionSettings,
) -> Result<(), HttpError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
    H: Handler,
{
    let result = process_request(&mut stream, handler, closed, settings).await;

    if let Err(error) = stream.shutdown().await {
        debug!(%error, "failed to shut down connection");
    }
    result
}

async fn process_request<S, H>(
    stream: &mut S,
    handler: &H,
    closed: &AtomicBool,
    settings: ConnectionSettings,
) -> Result<(), HttpError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
    H: Handler,
{
    if closed.load(Ordering::SeqCst) {
        debug!("server is closed, dropping connection");
        return Ok(());
    }

    let request = match read_request(stream, settings).await {
        Ok(request) => request,
        Err(error) if error.is_bad_request() => {
            if !closed.load(Ordering::SeqCst) {
                write_response(stream, &Response::text(StatusCode::BadRequest, "")).await?;
            }
            return Err(error);
        }
        Err(error) => return Err(error),
    };

    debug!(
        method = %request.request_line.method,
        target = %request.request_line.request_target,
        body_len = request.body.len(),
        "parsed request"
    );

    if closed.load(Ordering::SeqCst) {
        debug!("server closed while reading, dropping connection");
        return Ok(());
    }

    let mut writer = ResponseWriter::new(stream);
    match handler.call(&request, &mut writer).await {
        Ok(Some(_)) if closed.load(Ordering::SeqCst) => {
            debug!("server closed while handling, dropping response");
            Ok(())
        }
        Ok(Some(response)) => write_response(&mut writer, &response).await,
        Ok(None) => {
            writer.flush().await?;
            Ok(())
        }
        Err(error) => {
            warn!(%error, written = writer.bytes_written(), "handler failed");
            if writer.bytes_written() == 0 && !closed.load(Ordering::SeqCst) {
                write_response(&mut writer, &Response::text(StatusCode::InternalServerError, "")).await?;
            }
            Err(error)
        }
    }
}

async fn read_request<S: AsyncRead + Unpin>(stream: &mut S, settings: ConnectionSettings) -> Result<Request, HttpError> {
    let reading = request_from_reader(stream, settings.read_size, settings.max_head_size);
    match settings.read_timeout {
        Some(limit) => timeout(limit, reading).await.map_err(|_| HttpError::Timeout)?,
        None => reading.await,
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io,
        sync::atomic::{AtomicBool, Ordering},
        time::Duration,
    };

    use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt, duplex};

    use crate::{
        http::{
            headers::Headers,
            request::{HttpError, Request},
            response::{Response, StatusCode, write_chunked, write_headers, write_status_line},
        },
        runtime::{
            connection::{ConnectionSettings, handle_connection},
            handler::Handler,
        },
    };

    struct TestHandler;

    /// Closes the server while the request is being handled.
    struct ClosingHandler<'a>(&'a AtomicBool);

    impl Handler for ClosingHandler<'_> {
        async fn call<W: AsyncWrite + Unpin + Send>(
            &self,
            _request: &Request,
            _stream: W,
        ) -> Result<Option<Response>, HttpError> {
            self.0.store(true, Ordering::SeqCst);
            Ok(Some(Response::text(StatusCode::Ok, "too late")))
        }
    }

    impl Handler for TestHandler {
        async fn call<W: AsyncWrite + Unpin + Send>(
            &self,
            request: &Request,
            mut stream: W,
        ) -> Result<Option<Response>, HttpError> {
            match request.request_line.request_target.as_str() {
                "/yourproblem" => Ok(Some(Response::text(StatusCode::BadRequest, "Your problem is not my problem\n"))),
                "/stream" => {
                    write_status_line(&mut stream, StatusCode::Ok).await?;
                    let mut headers = Headers::new();
                    headers.set("Transfer-Encoding", "chunked");
                    write_headers(&mut stream, &headers).await?;
                    write_chunked(&mut stream, &mut &b"hello world"[..], None, 5).await?;
                    Ok(None)
                }
                "/fail" => Err(HttpError::Io(io::Error::other("backend unavailable"))),
                _ => Ok(Some(Response::text(StatusCode::Ok, String::from_utf8_lossy(&request.body)))),
            }
        }
    }

    /// Sends `request` over an in-memory stream and returns everything the server answered.
    async fn exchange(request: &[u8]) -> (Result<(), HttpError>, String) {
        let (mut client, server) = duplex(4096);
        let closed = AtomicBool::new(false);

        client.write_all(request).await.unwrap();
        client.shutdown().await.unwrap();

        let result = handle_connection(server, &TestHandler, &closed, ConnectionSettings::default()).await;

        let mut response = String::new();
        client.read_to_string(&mut response).await.unwrap();
        (result, response)
    }

    #[tokio::test]
    async fn handler_response_is_written() {
        let (result, response) = exchange(b"POST /echo HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello").await;

        assert!(result.is_ok());
        assert!(response.starts_with("HTTP/1.1 200 ok\r\n"));
        assert!(response.contains("content-length: 5\r\n"));
        assert!(response.contains("connection: close\r\n"));
        assert!(response.ends_with("\r\n\r\nhello"));
    }

    #[tokio::test]
    async fn handler_status_is_used() {
        let (result, response) = exchange(b"GET /yourproblem HTTP/1.1\r\nHost: x\r\n\r\n").await;

        assert!(result.is_ok());
        assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(response.ends_with("Your problem is not my problem\n"));
    }

    #[tokio::test]
    async fn bytes_written_by_handler_are_the_response() {
        let (result, response) = exchange(b"GET /stream HTTP/1.1\r\n\r\n").await;

        assert!(result.is_ok());
        assert_eq!(
            response,
            "HTTP/1.1 200 ok\r\ntransfer-encoding: chunked\r\n\r\n5\r\nhello\r\n5\r\n worl\r\n1\r\nd\r\n0\r\n\r\n"
        );
    }

    #[tokio::test]
    async fn malformed_request_is_answered_with_bad_request() {
        let (result, response) = exchange(b"GET / HTTP/1.1\r\nHost localhost\r\n\r\n").await;

        assert!(matches!(result, Err(HttpError::MalformedHeader)));
        assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(response.contains("content-length: 0\r\n"));
        assert!(response.ends_with("\r\n\r\n"));
    }

    #[tokio::test]
    async fn unsupported_version_is_answered_with_bad_request() {
        let (result, response) = exchange(b"GET / HTTP/1.0\r\n\r\n").await;

        assert!(matches!(result, Err(HttpError::UnsupportedVersion(_))));
        assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    }

    #[tokio::test]
    async fn failing_handler_that_wrote_nothing_gets_internal_server_error() {
        let (result, response) = exchange(b"GET /fail HTTP/1.1\r\n\r\n").await;

        assert!(matches!(result, Err(HttpError::Io(_))));
        assert!(response.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
    }

    #[tokio::test]
    async fn premature_end_of_stream_gets_no_response() {
        // The mock panics on any write.
        let stream = tokio_test::io::Builder::new()
            .read(b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\n")
            .read(b"abc")
            .build();
        let closed = AtomicBool::new(false);

        let result = handle_connection(stream, &TestHandler, &closed, ConnectionSettings::default()).await;

        assert!(matches!(result, Err(HttpError::UnexpectedEndOfStream)));
    }

    #[tokio::test]
    async fn closed_server_drops_connection_without_reading() {
        let stream = tokio_test::io::Builder::new().build();
        let closed = AtomicBool::new(true);

        let result = handle_connection(stream, &TestHandler, &closed, ConnectionSettings::default()).await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn response_is_dropped_when_server_closes_during_handler() {
        let (mut client, server) = duplex(4096);
        let closed = AtomicBool::new(false);
        client.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
        client.shutdown().await.unwrap();

        let result = handle_connection(server, &ClosingHandler(&closed), &closed, ConnectionSettings::default()).await;

        let mut response = String::new();
        client.read_to_string(&mut response).await.unwrap();
        assert!(result.is_ok());
        assert!(response.is_empty());
    }

    #[tokio::test]
    async fn oversized_head_is_answered_with_bad_request() {
        let (mut client, server) = duplex(4096);
        let closed = AtomicBool::new(false);
        let settings = ConnectionSettings {
            max_head_size: 64,
            ..ConnectionSettings::default()
        };
        let target = "a".repeat(200);
        client.write_all(format!("GET /{target}").as_bytes()).await.unwrap();

        let result = handle_connection(server, &TestHandler, &closed, settings).await;

        let mut response = String::new();
        client.read_to_string(&mut response).await.unwrap();
        assert!(matches!(result, Err(HttpError::HeadTooLarge(64))));
        assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_client_times_out_when_limit_is_set() {
        let (_client, server) = duplex(64);
        let closed = AtomicBool::new(false);
        let settings = ConnectionSettings {
            read_timeout: Some(Duration::from_secs(15)),
            ..ConnectionSettings::default()
        };

        let result = handle_connection(server, &TestHandler, &closed, settings).await;

        assert!(matches!(result, Err(HttpError::Timeout)));
    }
}
