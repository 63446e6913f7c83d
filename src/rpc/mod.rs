//! JSON-RPC interface: the HTTP server and a client for remote services.

pub mod client;
pub mod server;
pub mod types;

pub use client::RpcClient;
pub use server::{router, serve, AppState};
