use bytes::{Buf, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::http::{
    body::parse_body,
    headers::Headers,
    request_line::{RequestLine, parse_request_line},
};

/// Representation of a HTTP request with request line, headers and body
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    /// A custom struct representing the request line.
    pub request_line: RequestLine,
    /// A custom struct representing a list of headers.
    pub headers: Headers,
    /// The request body (can be empty).
    pub body: Vec<u8>,
}

/// Represents the different stages of the parser.
///
/// Stages only ever move forward, see [`ParseState::next`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseState {
    /// Waiting for a complete request line.
    AwaitingRequestLine,
    /// The parser is parsing headers.
    AwaitingHeaders,
    /// Waiting for the declared body to be buffered.
    AwaitingBody,
    /// The parser finished parsing.
    Done,
}

impl ParseState {
    /// Returns the stage following this one. `Done` is terminal.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::AwaitingRequestLine => Self::AwaitingHeaders,
            Self::AwaitingHeaders => Self::AwaitingBody,
            Self::AwaitingBody | Self::Done => Self::Done,
        }
    }
}

/// Represents the kind of error that can occur while parsing requests or writing responses
#[derive(Error, Debug)]
pub enum HttpError {
    /// The request line does not have exactly three parts or contains invalid syntax.
    #[error("request line is malformed")]
    MalformedRequestLine,

    /// The request line is well formed but names a version other than HTTP/1.1.
    #[error("unsupported HTTP version: {0}")]
    UnsupportedVersion(String),

    /// The header does not follow the RFC standard.
    #[error("header is malformed")]
    MalformedHeader,

    /// The `Content-Length` header is not a valid non-negative integer.
    #[error("invalid Content-Length value: {0}")]
    InvalidContentLength(String),

    /// The request line and headers grew past the configured limit without completing.
    #[error("request head exceeds {0} bytes")]
    HeadTooLarge(usize),

    /// The stream ended before a complete request was received.
    #[error("unexpected end of stream")]
    UnexpectedEndOfStream,

    /// A numeric status code outside of the supported set was used.
    #[error("unrecognized status code: {0}")]
    UnrecognizedStatus(u16),

    /// The parser is in an invalid state.
    #[error("parser is in an invalid state")]
    InvalidParserState,

    /// Reading the request took longer than the configured limit.
    #[error("timed out reading request")]
    Timeout,

    /// There was a generic IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HttpError {
    /// Whether the client sent something we can answer with `400 Bad Request`.
    #[must_use]
    pub const fn is_bad_request(&self) -> bool {
        matches!(
            self,
            Self::MalformedRequestLine
                | Self::UnsupportedVersion(_)
                | Self::MalformedHeader
                | Self::InvalidContentLength(_)
                | Self::HeadTooLarge(_)
        )
    }
}

/// Incrementally assembles a [`Request`] from however many bytes are available.
#[derive(Debug)]
pub struct RequestParser {
    state: ParseState,
    request_line: Option<RequestLine>,
    headers: Headers,
    body: Vec<u8>,
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestParser {
    /// Returns a parser waiting for a request line.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ParseState::AwaitingRequestLine,
            request_line: None,
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    /// Returns the current stage of the parser.
    #[must_use]
    pub const fn state(&self) -> ParseState {
        self.state
    }

    /// Returns whether a complete request has been assembled.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state == ParseState::Done
    }

    /// Parses as much of `data` as possible.
    ///
    /// `data` must hold every byte not consumed by previous calls. Returns the amount of bytes consumed,
    /// which the caller has to drop from the front of its buffer. 0 means more data is needed.
    ///
    /// # Errors
    ///
    /// Throws an `HttpError` if the parsing fails.
    ///
    /// This is related to the parsed data from the buffer containing RFC-incompatible formatting.
    pub fn feed(&mut self, data: &[u8]) -> Result<usize, HttpError> {
        let mut consumed = 0;

        loop {
            let remaining = &data[consumed..];
            match self.state {
                ParseState::AwaitingRequestLine => {
                    let (request_line, size) = parse_request_line(remaining)?;
                    let Some(request_line) = request_line else {
                        return Ok(consumed);
                    };
                    self.request_line = Some(request_line);
                    consumed += size;
                    self.advance();
                }
                ParseState::AwaitingHeaders => {
                    let (size, done) = self.headers.parse_header(remaining)?;
                    consumed += size;
                    if !done {
                        return Ok(consumed);
                    }
                    self.advance();
                }
                ParseState::AwaitingBody => {
                    let Some(body) = parse_body(&self.headers, remaining)? else {
                        return Ok(consumed);
                    };
                    self.body = body.to_vec();
                    consumed += body.len();
                    self.advance();
                }
                ParseState::Done => return Ok(consumed),
            }
        }
    }

    /// Hands out the assembled request.
    ///
    /// # Errors
    ///
    /// Returns `HttpError::InvalidParserState` if parsing has not reached `Done`.
    pub fn into_request(self) -> Result<Request, HttpError> {
        match (self.state, self.request_line) {
            (ParseState::Done, Some(request_line)) => Ok(Request {
                request_line,
                headers: self.headers,
                body: self.body,
            }),
            _ => Err(HttpError::InvalidParserState),
        }
    }

    fn advance(&mut self) {
        let next = self.state.next();
        tracing::trace!("{:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

/// Parses the contents of a reader to a Request
///
/// Reads at most `read_size` bytes at a time and keeps whatever the parser did not consume yet.
/// The request line and headers together may not exceed `max_head_size` bytes.
///
/// # Errors
///
/// Throws a `HttpError` if the request was not valid, `HttpError::HeadTooLarge` if the head outgrew
/// `max_head_size`, or `HttpError::UnexpectedEndOfStream` if the reader ran dry before the request was complete.
pub async fn request_from_reader<R: AsyncRead + Unpin>(
    reader: &mut R,
    read_size: usize,
    max_head_size: usize,
) -> Result<Request, HttpError> {
    let mut parser = RequestParser::new();
    let mut buffer = BytesMut::with_capacity(read_size);
    let mut temp = vec![0u8; read_size.max(1)];
    let mut head_consumed = 0;

    loop {
        let parsed = parser.feed(&buffer)?;
        buffer.advance(parsed);

        if parser.is_done() {
            return parser.into_request();
        }

        if matches!(parser.state(), ParseState::AwaitingRequestLine | ParseState::AwaitingHeaders) {
            head_consumed += parsed;
            if head_consumed + buffer.len() > max_head_size {
                return Err(HttpError::HeadTooLarge(max_head_size));
            }
        }

        let read = reader.read(&mut temp).await?;
        if read == 0 {
            return Err(HttpError::UnexpectedEndOfStream);
        }

        buffer.extend_from_slice(&temp[..read]);
    }
}
