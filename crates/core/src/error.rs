use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Validation(String),
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("not connected: {0}")]
    NotConnected(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SendError {
    /// Throttled reconnects are routine; everything else is worth a warning.
    pub fn is_throttled(&self) -> bool {
        matches!(self, SendError::NotConnected(_))
    }
}
