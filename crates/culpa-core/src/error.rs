use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{} exists already; rename it before creating a new example config", .0.display())]
    AlreadyExists(PathBuf),

    #[error("Secrets error: {0}")]
    Secrets(String),

    #[error("Connection error: {0}")]
    Connection(#[source] anyhow::Error),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Collection '{collection}' failed: {source}")]
    Collection {
        collection: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Controller returned HTTP {status}: {message}")]
    Controller { status: u16, message: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ConnectorError {
    pub fn collection(collection: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::Collection {
            collection: collection.into(),
            source: source.into(),
        }
    }

    /// True for credential problems on either side of the connector.
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }
}

pub type ConnectorResult<T> = Result<T, ConnectorError>;
