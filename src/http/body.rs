use crate::http::{headers::Headers, request::HttpError};

/// Reads the declared body length from the `Content-Length` header.
///
/// A missing or empty header counts as a length of 0.
///
/// # Errors
///
/// Returns `HttpError::InvalidContentLength` if the value is not a plain non-negative integer.
pub fn content_length(headers: &Headers) -> Result<usize, HttpError> {
    let Some(value) = headers.get("content-length") else {
        return Ok(0);
    };
    let value = value.trim();

    if !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(HttpError::InvalidContentLength(value.to_string()));
    }
    value
        .parse()
        .map_err(|_| HttpError::InvalidContentLength(value.to_string()))
}

/// Extracts a fixed-length body from the front of `data`.
///
/// Returns `None` if fewer bytes than declared are buffered yet.
/// Otherwise the returned slice holds exactly `Content-Length` bytes and anything after it is left untouched.
///
/// # Errors
///
/// Returns `HttpError::InvalidContentLength` if the header cannot be read as a length.
pub fn parse_body<'a>(headers: &Headers, data: &'a [u8]) -> Result<Option<&'a [u8]>, HttpError> {
    let length = content_length(headers)?;
    Ok(data.get(..length))
}

#[cfg(test)]
mod tests {
    use crate::http::{
        body::{content_length, parse_body},
        headers::Headers,
        request::HttpError,
    };

    fn headers_with_length(value: &str) -> Headers {
        let mut headers = Headers::new();
        headers.set("Content-Length", value);
        headers
    }

    #[test]
    fn missing_content_length_is_empty_body() {
        let headers = Headers::new();
        assert_eq!(parse_body(&headers, b"stray bytes").unwrap(), Some(&b""[..]));
    }

    #[test]
    fn zero_content_length_is_empty_body() {
        let headers = headers_with_length("0");
        assert_eq!(parse_body(&headers, b"").unwrap(), Some(&b""[..]));
    }

    #[test]
    fn blank_content_length_is_empty_body() {
        let headers = headers_with_length("  ");
        assert_eq!(content_length(&headers).unwrap(), 0);
    }

    #[test]
    fn partial_body_needs_more_data() {
        let headers = headers_with_length("5");
        assert_eq!(parse_body(&headers, b"abc").unwrap(), None);
    }

    #[test]
    fn complete_body_takes_exactly_the_declared_length() {
        let headers = headers_with_length("5");
        assert_eq!(parse_body(&headers, b"abcdefg").unwrap(), Some(&b"abcde"[..]));
    }

    #[test]
    fn non_numeric_content_length_should_throw_invalidcontentlength() {
        let headers = headers_with_length("twelve");
        let result = parse_body(&headers, b"hello world!");
        assert!(
            matches!(&result, Err(HttpError::InvalidContentLength(v)) if v == "twelve"),
            "Expected Err(HttpError::InvalidContentLength), got {result:?}"
        );
    }

    #[test]
    fn negative_or_signed_content_length_is_invalid() {
        for value in ["-1", "+5"] {
            let headers = headers_with_length(value);
            assert!(matches!(
                content_length(&headers),
                Err(HttpError::InvalidContentLength(_))
            ));
        }
    }

    #[test]
    fn repeated_content_length_is_invalid() {
        let mut headers = headers_with_length("5");
        headers.set("content-length", "5");
        assert!(matches!(
            content_length(&headers),
            Err(HttpError::InvalidContentLength(_))
        ));
    }
}
