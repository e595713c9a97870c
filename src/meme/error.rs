//! Error taxonomy for the signal store and dynamics engine

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum MemeError {
    /// Persisted store or configuration content is present but malformed
    #[error("Failed to deserialize {}: {source}", path.display())]
    Deserialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize meme state: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Required configuration key missing or out of range
    #[error("Invalid dynamics configuration: {0}")]
    Config(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Another writer held the store lock for longer than the timeout
    #[error("Store is locked: {} (waited {waited:?})", path.display())]
    Locked { path: PathBuf, waited: Duration },
}

impl MemeError {
    pub fn config(msg: impl Into<String>) -> Self {
        MemeError::Config(msg.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MemeError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn deserialization(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        MemeError::Deserialization {
            path: path.into(),
            source,
        }
    }
}

pub type MemeResult<T> = std::result::Result<T, MemeError>;
