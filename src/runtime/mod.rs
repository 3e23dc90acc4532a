/// Module containing the per-connection request / response cycle
pub mod connection;
/// Module containing the handler
pub mod handler;
/// Module containing the logic for the server
pub mod server;
