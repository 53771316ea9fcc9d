use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid argument, setting or input file.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{what} not found: {key}")]
    NotFound { what: &'static str, key: String },

    /// Malformed dump or a category name that violates the naming rules.
    #[error("parse error in {context}: {message}")]
    Parse { context: String, message: String },

    /// Model, tokenizer and max length do not belong together.
    #[error("artifact mismatch: {0}")]
    ArtifactMismatch(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Xml(#[from] quick_xml::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn not_found(what: &'static str, key: impl Into<String>) -> Self {
        Error::NotFound {
            what,
            key: key.into(),
        }
    }

    pub fn parse(context: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Parse {
            context: context.into(),
            message: message.into(),
        }
    }
}
