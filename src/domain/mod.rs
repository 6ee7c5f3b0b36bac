// Domain module - Error and configuration types
pub mod config;
pub mod error;
