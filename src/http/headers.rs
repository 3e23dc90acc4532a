use std::collections::HashMap;

use crate::http::request::HttpError;

/// Line terminator used throughout HTTP/1.1 framing.
pub const CRLF: &[u8] = b"\r\n";

/// A `HashMap` of lower-cased field names to their values.
///
/// Hash Maps do not guarantee ordering in Rust. SHOULD be fine as Http Headers / Trailers do not need to be ordered
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Headers(HashMap<String, String>);

impl Headers {
    /// Returns an empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    /// Adds a value to the collection, merging with any existing value of the same name.
    ///
    /// Names are case-insensitive. A repeated name is stored as `old, new`.
    ///
    /// # Examples
    /// ```
    /// let mut headers = tcphttp::http::headers::Headers::new();
    /// headers.set("Drink", "milk");
    /// headers.set("drink", "water");
    /// assert_eq!(headers.get("DRINK"), Some("milk, water"));
    /// ```
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        let name = name.to_ascii_lowercase();

        if let Some(existing) = self.0.get_mut(&name) {
            existing.push_str(", ");
            existing.push_str(&value);
        } else {
            self.0.insert(name, value);
        }
    }

    /// Stores a value under the given name, replacing whatever was there.
    ///
    /// # Examples
    /// ```
    /// let mut headers = tcphttp::http::headers::Headers::new();
    /// headers.set("content-type", "text/plain");
    /// headers.insert("Content-Type", "text/html");
    /// assert_eq!(headers.get("content-type"), Some("text/html"));
    /// ```
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.0.insert(name.to_ascii_lowercase(), value.into());
    }

    /// Retrieves the value of a specified name.
    ///
    /// Returns None if the name was not found or only whitespace is stored for it.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    /// Removes an entry, returning its value if it was present.
    pub fn delete(&mut self, name: &str) -> Option<String> {
        self.0.remove(&name.to_ascii_lowercase())
    }

    /// Implements an iterator for the Header
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.0
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Returns the raw amount of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether the collection holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Parses field lines from the front of `data` into the collection.
    ///
    /// Returns the amount of bytes consumed and whether the blank line ending the header section was found.
    /// Only complete lines are consumed, so an incomplete tail is left for the caller to retry once more data arrived.
    ///
    /// # Errors
    ///
    /// Returns `HttpError::MalformedHeader` if a line has no colon or its name is not a valid token.
    pub fn parse_header(&mut self, data: &[u8]) -> Result<(usize, bool), HttpError> {
        let mut consumed = 0;

        while let Some(line_end) = find_crlf(&data[consumed..]) {
            let line = &data[consumed..consumed + line_end];
            consumed += line_end + CRLF.len();

            if line.is_empty() {
                return Ok((consumed, true));
            }
            self.parse_field_line(line)?;
        }

        Ok((consumed, false))
    }

    fn parse_field_line(&mut self, line: &[u8]) -> Result<(), HttpError> {
        let colon = line
            .iter()
            .position(|&b| b == b':')
            .ok_or(HttpError::MalformedHeader)?;

        // Whitespace around the name, including a folded continuation line, fails the token check.
        let name = std::str::from_utf8(&line[..colon])
            .map_err(|_| HttpError::MalformedHeader)?;
        if !is_valid_token(name) {
            return Err(HttpError::MalformedHeader);
        }

        let value = String::from_utf8_lossy(&line[colon + 1..]);
        self.set(name, value.trim());
        Ok(())
    }
}

/// Returns the offset of the first CRLF in `data`.
pub(crate) fn find_crlf(data: &[u8]) -> Option<usize> {
    data.windows(CRLF.len()).position(|window| window == CRLF)
}

/// Checks whether `s` is a non-empty token as defined by <https://www.rfc-editor.org/rfc/rfc9110#section-5.6.2>
#[must_use]
pub fn is_valid_token(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(is_token_char)
}

const fn is_token_char(b: u8) -> bool {
    if b.is_ascii_alphanumeric() {
        return true;
    }

    matches!(
        b,
        b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' | b'^' | b'_' | b'`' | b'|' | b'~'
    )
}
