use thiserror::Error;

#[derive(Debug, Error)]
pub enum FileShareError {
    // IO
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Config
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration file not found at {0}")]
    ConfigNotFound(String),

    #[error("TOML deserialization error: {0}")]
    TomlDe(String),

    #[error("TOML serialization error: {0}")]
    TomlSer(String),

    #[error("Invalid connection string: {0}")]
    ConnectionString(String),

    #[error("Invalid backend type: {0}")]
    InvalidBackendType(String),

    // Naming
    #[error("Invalid share name: {0}")]
    InvalidShareName(String),

    #[error("Invalid directory path: {0}")]
    InvalidPath(String),

    #[error("Invalid file name: {0}")]
    InvalidFileName(String),

    // Remote
    #[error("{operation} failed with HTTP {status} ({code})")]
    Service {
        operation: String,
        status: u16,
        code: String,
    },

    // Upload
    #[error("Content ended early: declared {expected} bytes, read {actual}")]
    LengthMismatch { expected: u64, actual: u64 },
}

pub type Result<T> = std::result::Result<T, FileShareError>;
