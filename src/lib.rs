//! # tcphttp
//!
//! An HTTP/1.1 message layer built directly on top of TCP byte streams.
//!
//! This crate provides an incremental request parser that copes with arbitrary fragmentation of its input,
//! a header collection with HTTP merge semantics, and a response encoder for fixed-length and chunked bodies.
//! The `runtime` module wires them into a task-per-connection tokio server.
//!
//! Refer to the included binary for a complete server implementation.
/// Module containing the server configuration
pub mod config;
/// Module containing the HTTP message layer
pub mod http;
/// Module containing the server runtime
pub mod runtime;
