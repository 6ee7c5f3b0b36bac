use thiserror::Error;

/// LinkTerm unified error type
#[derive(Error, Debug)]
pub enum LinkTermError {
    #[error("Failed to open link to '{endpoint}': {message}")]
    TransportOpen { endpoint: String, message: String },

    #[error("Connection lost (code {}): {reason}", close_code(.code))]
    UnexpectedClose { code: Option<u16>, reason: String },

    #[error("Identification failed for '{endpoint}': {message}")]
    Identification { endpoint: String, message: String },

    #[error("Command send failed: {message}")]
    Send { message: String },

    #[error("Reconnect failed after {attempts} attempts; reconnect manually")]
    ReconnectBudgetExhausted { attempts: u32 },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Session error: {message}")]
    Session { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Host request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Invalid frame: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Timed out opening link to '{endpoint}' after {after_ms}ms")]
    Timeout { endpoint: String, after_ms: u128 },

    #[error("Output error: {0}")]
    Output(String),
}

pub type LinkTermResult<T> = Result<T, LinkTermError>;

fn close_code(code: &Option<u16>) -> String {
    code.map(|c| c.to_string()).unwrap_or_else(|| "none".to_string())
}
