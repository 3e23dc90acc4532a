use std::{
    io::Error,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tokio::{
    net::TcpListener,
    sync::Notify,
    time::sleep,
};
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::runtime::{
    connection::{ConnectionSettings, handle_connection},
    handler::Handler,
};

/// A struct representing an instance of a `HttpServer`, containing the state of the server.
#[derive(Debug)]
pub struct Server<H: Handler> {
    server_state: Arc<ServerState<H>>,
    local_addr: SocketAddr,
}

/// A struct representing the state shared between the accept loop and every connection task.
#[derive(Debug)]
struct ServerState<H: Handler> {
    closed: AtomicBool,
    shutdown: Notify,
    handler: Arc<H>,
    settings: ConnectionSettings,
}

impl<H: Handler> Server<H> {
    /// Sets the closed state of the server it's called on.
    ///
    /// The accept loop stops and releases the listener. Connections still being read drop without a response.
    pub fn close(&self) {
        self.server_state.closed.store(true, Ordering::SeqCst);
        self.server_state.shutdown.notify_one();
    }

    /// Returns whether [`Server::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.server_state.closed.load(Ordering::SeqCst)
    }

    /// The address the listener is bound to.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl<H: Handler + 'static> ServerState<H> {
    /// Accepts connections until the server is closed, spawning one task per connection.
    async fn listen(self: Arc<Self>, listener: TcpListener) {
        loop {
            let accepted = tokio::select! {
                () = self.shutdown.notified() => break,
                accepted = listener.accept() => accepted,
            };

            if self.closed.load(Ordering::SeqCst) {
                break;
            }

            match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "accepted a new connection");
                    let state = Arc::clone(&self);
                    tokio::spawn(async move {
                        if let Err(error) =
                            handle_connection(stream, state.handler.as_ref(), &state.closed, state.settings).await
                        {
                            warn!(%peer, %error, "encountered error handling the stream");
                        }
                    });
                }
                Err(error) => {
                    warn!(%error, "encountered error accepting connection");
                    sleep(Duration::from_millis(50)).await;
                }
            }
        }
        info!("server stopped accepting connections");
    }
}

/// Serves an instance of the Http Server based on the passed handler on the specified port
///
/// Binds to the default host, see [`ServerConfig`].
///
/// # Errors
///
/// Throws an Error if binding the tcp listener fails.
pub async fn serve<H: Handler + 'static>(port: u16, handler: Arc<H>) -> Result<Server<H>, Error> {
    let config = ServerConfig {
        port,
        ..ServerConfig::default()
    };
    serve_with_config(&config, handler).await
}

/// Serves the handler on the host and port of `config`, applying its connection settings.
///
/// # Errors
///
/// Throws an Error if binding the tcp listener fails.
pub async fn serve_with_config<H: Handler + 'static>(config: &ServerConfig, handler: Arc<H>) -> Result<Server<H>, Error> {
    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    let local_addr = listener.local_addr()?;
    let state = ServerState {
        closed: AtomicBool::new(false),
        shutdown: Notify::new(),
        handler,
        settings: ConnectionSettings::from(config),
    };
    let state_for_main = Arc::new(state);
    let state_for_task = Arc::clone(&state_for_main);
    tokio::spawn(async move {
        state_for_task.listen(listener).await;
    });

    info!(%local_addr, "server listening");
    Ok(Server {
        server_state: state_for_main,
        local_addr,
    })
}
