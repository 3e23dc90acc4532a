/// Module containing the fixed-length body reader
pub mod body;
/// Module containing logic to parse HTTP headers
pub mod headers;
/// Module containing the request parser state machine
pub mod request;
/// Module containing logic to parse HTTP request lines
pub mod request_line;
/// Module formatting the response.
pub mod response;
