// Logging module - Logging infrastructure
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use std::io;

/// Filter used when `RUST_LOG` is not set
pub fn default_filter(level: &str) -> String {
    format!("linkterm={},warn", level)
}

/// Initialize logging system.
///
/// Diagnostics go to stderr; the operator-facing terminal is separate.
pub fn init_logging(level: &str) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter(level)))?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
        )
        .try_init()?;

    tracing::debug!("LinkTerm logging system initialized");
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        assert_eq!(default_filter("debug"), "linkterm=debug,warn");
    }

    #[test]
    fn test_logging_init_twice_fails_cleanly() {
        // the first call may race other tests for the global subscriber
        let _ = init_logging("info");
        assert!(init_logging("info").is_err());
    }
}
