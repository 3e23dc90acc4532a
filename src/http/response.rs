use std::fmt;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::http::{headers::Headers, request::HttpError};

/// Representation of a HTTP response with status code, headers and body
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    /// The status code sent in the status line.
    pub status: StatusCode,
    /// The headers sent after the status line.
    pub headers: Headers,
    /// The response body (can be empty).
    pub body: Vec<u8>,
}

impl Response {
    /// Builds a plain text response carrying the default headers for its body length.
    #[must_use]
    pub fn text(status: StatusCode, message: impl Into<String>) -> Self {
        let body = message.into().into_bytes();
        Self {
            status,
            headers: default_headers(body.len()),
            body,
        }
    }
}

/// Enum containing the status codes this server can send.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusCode {
    /// 200
    Ok = 200,
    /// 400
    BadRequest = 400,
    /// 500
    InternalServerError = 500,
}

/// Implements Display for the Status Code to enable formatting the Codes as integer values.
impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", *self as u16)
    }
}

impl TryFrom<u16> for StatusCode {
    type Error = HttpError;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        match code {
            200 => Ok(Self::Ok),
            400 => Ok(Self::BadRequest),
            500 => Ok(Self::InternalServerError),
            other => Err(HttpError::UnrecognizedStatus(other)),
        }
    }
}

impl StatusCode {
    /// Creates the string representation of the passed status code.
    #[must_use]
    pub const fn reason_phrase(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::BadRequest => "Bad Request",
            Self::InternalServerError => "Internal Server Error",
        }
    }

    /// The complete status line, including the CRLF.
    #[must_use]
    pub const fn status_line(&self) -> &'static str {
        match self {
            Self::Ok => "HTTP/1.1 200 ok\r\n",
            Self::BadRequest => "HTTP/1.1 400 Bad Request\r\n",
            Self::InternalServerError => "HTTP/1.1 500 Internal Server Error\r\n",
        }
    }
}

/// Write the status line to the passed writer.
///
/// Hardcodes HTTP/1.1 due to the limit of the Server to that version.
///
/// # Errors
///
/// Throws an `HttpError` if writing fails.
pub async fn write_status_line<W: AsyncWrite + Unpin>(writer: &mut W, status_code: StatusCode) -> Result<(), HttpError> {
    writer.write_all(status_code.status_line().as_bytes()).await?;
    Ok(())
}

/// Writes the headers to the passed writer.
///
/// Prints every entry in HTTP valid format, followed by the blank line separating headers from the body.
///
/// # Errors
///
/// Throws an `HttpError` if writing fails.
pub async fn write_headers<W: AsyncWrite + Unpin>(writer: &mut W, headers: &Headers) -> Result<(), HttpError> {
    writer.write_all(&field_block(headers)).await?;
    Ok(())
}

fn field_block(headers: &Headers) -> Vec<u8> {
    let mut block = Vec::new();
    for (name, value) in headers.iter() {
        block.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
    }
    block.extend_from_slice(b"\r\n");
    block
}

/// Writes raw body bytes and returns how many were written.
///
/// # Errors
///
/// Throws an `HttpError` if writing fails.
pub async fn write_body<W: AsyncWrite + Unpin>(writer: &mut W, body: &[u8]) -> Result<usize, HttpError> {
    writer.write_all(body).await?;
    Ok(body.len())
}

/// Writes a single chunk of a chunked body
///
/// Empty data is skipped, as a chunk of size 0 would end the body.
///
/// # Output
/// [Length in Hex]\r\n
///
/// [Data]\r\n
///
/// # Errors
///
/// Throws an `HttpError` if writing fails.
pub async fn write_chunk<W: AsyncWrite + Unpin>(writer: &mut W, data: &[u8]) -> Result<(), HttpError> {
    if data.is_empty() {
        return Ok(());
    }

    let mut frame = Vec::with_capacity(data.len() + 12);
    frame.extend_from_slice(format!("{:x}\r\n", data.len()).as_bytes());
    frame.extend_from_slice(data);
    frame.extend_from_slice(b"\r\n");
    writer.write_all(&frame).await?;
    Ok(())
}

/// Writes the terminating chunk of a chunked body, optionally followed by trailers.
///
/// # Example
/// ...
///
/// 0\r\n
///
/// x-content-length: 42\r\n
///
/// \r\n
///
/// # Errors
///
/// Throws an `HttpError` if writing fails.
pub async fn write_final_chunk<W: AsyncWrite + Unpin>(writer: &mut W, trailers: Option<&Headers>) -> Result<(), HttpError> {
    writer.write_all(b"0\r\n").await?;
    match trailers {
        Some(trailers) => writer.write_all(&field_block(trailers)).await?,
        None => writer.write_all(b"\r\n").await?,
    }
    Ok(())
}

/// Streams `source` as a chunked body, reading at most `chunk_size` bytes per chunk.
///
/// Returns the amount of payload bytes sent, excluding framing.
///
/// # Errors
///
/// Throws an `HttpError` if reading the source or writing fails.
pub async fn write_chunked<W, R>(
    writer: &mut W,
    source: &mut R,
    trailers: Option<&Headers>,
    chunk_size: usize,
) -> Result<usize, HttpError>
where
    W: AsyncWrite + Unpin,
    R: AsyncRead + Unpin,
{
    let mut buffer = vec![0u8; chunk_size.max(1)];
    let mut total = 0;

    loop {
        let read = source.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        write_chunk(writer, &buffer[..read]).await?;
        total += read;
    }

    write_final_chunk(writer, trailers).await?;
    tracing::debug!(total, "finished chunked body");
    Ok(total)
}

/// Builds the headers every response starts out with.
///
/// Callers replace entries with [`Headers::insert`] before sending.
#[must_use]
pub fn default_headers(content_length: usize) -> Headers {
    let mut headers = Headers::new();
    headers.set("Content-Length", content_length.to_string());
    headers.set("Connection", "close");
    headers.set("Content-Type", "text/plain");
    headers
}

/// Helper function to remove boilerplate for creating html responses with associated headers.
#[must_use]
pub fn html_response(status_code: StatusCode, html: &str) -> Response {
    let mut headers = default_headers(html.len());
    headers.insert("content-type", "text/html");
    Response {
        status: status_code,
        headers,
        body: html.as_bytes().to_vec(),
    }
}

/// Writes a complete fixed-length response and flushes the writer.
///
/// # Errors
///
/// Throws an `HttpError` if writing fails.
pub async fn write_response<W: AsyncWrite + Unpin>(writer: &mut W, response: &Response) -> Result<(), HttpError> {
    write_status_line(writer, response.status).await?;
    write_headers(writer, &response.headers).await?;
    write_body(writer, &response.body).await?;
    writer.flush().await?;
    Ok(())
}
