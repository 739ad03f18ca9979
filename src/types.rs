use serde_json::{Map, Value};
use std::time::Duration;

/// Arguments object of an RPC request or response.
pub type RpcArguments = Map<String, Value>;

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    pub max_feed_size_mb: usize,
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "showtransmission/0.1".to_string(),
            timeout_seconds: 30,
            max_retries: 3,
            retry_delay_seconds: 5,
            max_feed_size_mb: 10,
            max_redirects: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RpcConfig {
    pub user_agent: String,
    /// Deadline for a single POST to the endpoint.
    pub call_timeout: Duration,
    /// Sends allowed per logical call, counting session renewals.
    pub max_attempts: u32,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            user_agent: "showtransmission/0.1".to_string(),
            call_timeout: Duration::from_secs(30),
            max_attempts: 3,
            username: None,
            password: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ShowTransmissionError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("{operation} timed out after {timeout:?}")]
    Timeout { operation: String, timeout: Duration },

    #[error("session renewal failed for {method} after {attempts} attempts")]
    SessionRenewalFailed { method: String, attempts: u32 },

    #[error("RPC version not supported: server minimum is {actual}, expected {expected}")]
    UnsupportedRpcVersion { expected: i64, actual: i64 },

    #[error("RPC failure in {method}: {result}")]
    Rpc {
        method: String,
        result: String,
        arguments: RpcArguments,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error(transparent)]
    InvalidUrl(#[from] url::ParseError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ShowTransmissionError>;
