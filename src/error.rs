//! Error types for Yotrace

use std::path::PathBuf;
use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Parser error
    #[error("Parser error: {0}")]
    Parser(String),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Source file passed to the parser does not exist
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Source file extension maps to no known transcript format
    #[error("Unknown transcript format: {}", .0.display())]
    UnknownFormat(PathBuf),

    /// No conversation with the given identifier
    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),
}

/// Result type alias for Core operations
pub type Result<T> = std::result::Result<T, CoreError>;
