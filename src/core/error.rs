use thiserror::Error;

#[derive(Error, Debug)]
pub enum IgniteError {
    #[error("Unable to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to send request: {0}")]
    Send(String),

    #[error("Connection closed")]
    Closed,

    #[error("Unable to decode server response: {0}")]
    Decode(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, IgniteError>;
