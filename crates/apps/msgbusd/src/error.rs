use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("failed to read config file: {0}")]
    ConfigRead(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    ConfigParse(#[from] toml::de::Error),
}
