// HTTP module - One-shot calls to the host REST API
pub mod client;

pub use client::HostApiClient;
