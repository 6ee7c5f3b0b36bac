// WebSocket module - Persistent channel to the host process
pub mod client;

pub use client::WsConnector;
