//! # tcphttp server
//!
//! This binary crate serves a handful of demo endpoints on top of the library in this crate.
//!
//! Refer to the library documentation of reusable components.
use std::{error::Error, io, sync::Arc};

use sha2::{Digest, Sha256};
use tcphttp::{
    config::ServerConfig,
    http::{
        headers::Headers,
        request::{HttpError, Request},
        response::{
            Response, StatusCode, html_response, write_chunk, write_chunked, write_final_chunk, write_headers,
            write_status_line,
        },
    },
    runtime::{handler::Handler, server::serve_with_config},
};
use tokio::io::AsyncWrite;
use tracing::{error, info};

const BAD_REQUEST_HTML: &str = "<html>
  <head><title>400 Bad Request</title></head>
  <body>
    <h1>Bad Request</h1>
    <p>Your request honestly kinda sucked.</p>
  </body>
</html>";

const INTERNAL_ERROR_HTML: &str = "<html>
  <head><title>500 Internal Server Error</title></head>
  <body>
    <h1>Internal Server Error</h1>
    <p>Okay, you know what? This one is on me.</p>
  </body>
</html>";

const SUCCESS_HTML: &str = "<html>
  <head><title>200 OK</title></head>
  <body>
    <h1>Success!</h1>
    <p>Your request was an absolute banger.</p>
  </body>
</html>";

const CHUNKED_BODY: &str = "Each line of this body travels in its own small chunk.\n\
    The receiver only learns the total length from the trailers.\n";

#[derive(Debug)]
struct DemoHandler {
    chunk_size: usize,
    client: reqwest::Client,
}

impl Handler for DemoHandler {
    async fn call<W: AsyncWrite + Unpin + Send>(
        &self,
        request: &Request,
        mut stream: W,
    ) -> Result<Option<Response>, HttpError> {
        let target = request.request_line.request_target.as_str();
        if let Some(count) = target.strip_prefix("/httpbin/stream/") {
            return self.proxy_httpbin(&mut stream, count).await;
        }

        match target {
            "/yourproblem" => Ok(Some(html_response(StatusCode::BadRequest, BAD_REQUEST_HTML))),
            "/myproblem" => Ok(Some(html_response(StatusCode::InternalServerError, INTERNAL_ERROR_HTML))),
            "/chunked" => {
                let body = CHUNKED_BODY.as_bytes();
                write_chunked_head(&mut stream).await?;
                let trailers = content_trailers(&Sha256::digest(body), body.len());
                write_chunked(&mut stream, &mut &body[..], Some(&trailers), self.chunk_size).await?;
                Ok(None)
            }
            _ => Ok(Some(html_response(StatusCode::Ok, SUCCESS_HTML))),
        }
    }
}

impl DemoHandler {
    /// Relays `https://httpbin.org/stream/{count}` chunk by chunk, hashing the payload for the trailers.
    async fn proxy_httpbin<W: AsyncWrite + Unpin + Send>(
        &self,
        stream: &mut W,
        count: &str,
    ) -> Result<Option<Response>, HttpError> {
        let Ok(count) = count.parse::<u32>() else {
            return Ok(Some(Response::text(StatusCode::BadRequest, "stream count must be a number")));
        };

        let url = format!("https://httpbin.org/stream/{count}");
        let mut upstream = match self.client.get(&url).send().await {
            Ok(upstream) => upstream,
            Err(e) => {
                error!(%url, error = %e, "failed to reach upstream");
                return Ok(Some(Response::text(
                    StatusCode::InternalServerError,
                    "Failed to proxy httpbin stream",
                )));
            }
        };

        write_chunked_head(stream).await?;
        let mut hasher = Sha256::new();
        let mut total = 0;
        while let Some(chunk) = upstream.chunk().await.map_err(io::Error::other)? {
            hasher.update(&chunk);
            total += chunk.len();
            write_chunk(stream, &chunk).await?;
        }

        write_final_chunk(stream, Some(&content_trailers(&hasher.finalize(), total))).await?;
        Ok(None)
    }
}

async fn write_chunked_head<W: AsyncWrite + Unpin>(stream: &mut W) -> Result<(), HttpError> {
    let mut headers = Headers::new();
    headers.set("Content-Type", "text/plain");
    headers.set("Transfer-Encoding", "chunked");
    headers.set("Trailer", "X-Content-SHA256, X-Content-Length");
    write_status_line(stream, StatusCode::Ok).await?;
    write_headers(stream, &headers).await
}

fn content_trailers(digest: &[u8], length: usize) -> Headers {
    let mut trailers = Headers::new();
    trailers.set("X-Content-SHA256", hex::encode(digest));
    trailers.set("X-Content-Length", length.to_string());
    trailers
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = ServerConfig::load()?;
    tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(config.tracing_level()?)
        .init();

    let handler = DemoHandler {
        chunk_size: config.chunk_size,
        client: reqwest::Client::new(),
    };
    let server = serve_with_config(&config, Arc::new(handler)).await?;
    info!(addr = %server.local_addr(), "server started");

    tokio::signal::ctrl_c().await?;
    server.close();
    info!("server gracefully stopped");
    Ok(())
}
