/// Errors raised while loading the webhook configuration file.
/// All of these are fatal at startup; the server never starts serving
/// with a broken registry.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration file '{0}' not found")]
    MissingFile(String),

    #[error("invalid configuration format: {0}")]
    InvalidFormat(String),

    #[error("webhook entry {index} is missing required field '{field}'")]
    MissingField { index: usize, field: &'static str },

    #[error("no webhook entries configured")]
    Empty,
}

/// Errors raised by the deploy executor. In sync mode these surface as a
/// 500 response; in async mode they are only logged.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("git pull failed: {message}")]
    UpdateFailed {
        exit_code: Option<i32>,
        message: String,
    },

    #[error("restart command failed: {message}")]
    RestartFailed {
        exit_code: Option<i32>,
        message: String,
    },

    #[error("{step} timed out after {seconds} seconds")]
    TimedOut { step: &'static str, seconds: u64 },
}
