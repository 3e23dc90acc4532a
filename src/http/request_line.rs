use crate::http::{
    headers::{CRLF, find_crlf, is_valid_token},
    request::HttpError,
};

/// The only protocol version this server speaks.
pub const HTTP_VERSION: &str = "HTTP/1.1";

/// A Http Request Line representation with method, target and http version
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestLine {
    /// The method of the parsed request
    pub method: String,
    /// The target endpoint of the request, kept exactly as received
    pub request_target: String,
    /// The HTTP version used in the request, always `HTTP/1.1`
    pub http_version: String,
}

/// Parses the first line of a request from the front of `data`.
///
/// Returns `None` with a size of 0 if the buffer does not hold a complete line yet.
/// Otherwise returns the request line and the amount of bytes it occupied including the CRLF.
///
/// # Errors
///
/// Throws `HttpError::MalformedRequestLine` if the line does not have exactly three space separated parts,
/// and `HttpError::UnsupportedVersion` if the version is anything other than `HTTP/1.1`.
pub fn parse_request_line(data: &[u8]) -> Result<(Option<RequestLine>, usize), HttpError> {
    let Some(line_end) = find_crlf(data) else {
        return Ok((None, 0));
    };

    let line = std::str::from_utf8(&data[..line_end]).map_err(|_| HttpError::MalformedRequestLine)?;
    let parts: Vec<&str> = line.split(' ').collect();

    let &[method, request_target, http_version] = parts.as_slice() else {
        return Err(HttpError::MalformedRequestLine);
    };

    if !is_valid_token(method) || request_target.is_empty() {
        return Err(HttpError::MalformedRequestLine);
    }

    if http_version != HTTP_VERSION {
        return Err(HttpError::UnsupportedVersion(http_version.to_string()));
    }

    let request_line = RequestLine {
        method: method.to_string(),
        request_target: request_target.to_string(),
        http_version: http_version.to_string(),
    };

    Ok((Some(request_line), line_end + CRLF.len()))
}
