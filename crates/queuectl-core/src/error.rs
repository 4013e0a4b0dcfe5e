use thiserror::Error;

/// Errors surfaced while mutating the `Config` singleton in-memory, before
/// it ever reaches the store.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown configuration key '{0}'")]
    UnknownKey(String),

    #[error("invalid value '{value}' for key '{key}'")]
    InvalidValue { key: String, value: String },

    #[error("worker-poll-interval must not be negative, got {0}")]
    NegativePollInterval(f64),
}
