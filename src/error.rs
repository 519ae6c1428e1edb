use std::path::PathBuf;

use thiserror::Error;

/// Raised while turning one Zotero annotation into a Readwise highlight.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("MissingField: {0}")]
    MissingField(&'static str),
    #[error("MalformedReference: {0:?}")]
    MalformedReference(String),
}

#[derive(Debug, Error)]
pub enum ReadwiseError {
    #[error(
        "uploading to Readwise failed with status {status} ({reason}); error log saved to {}",
        .error_log.display()
    )]
    Upload {
        status: u16,
        reason: String,
        error_log: PathBuf,
    },
    #[error("request to Readwise failed")]
    Transport(#[from] reqwest::Error),
    #[error("failed to write error log")]
    Io(#[from] std::io::Error),
    #[error("failed to encode highlights")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ZoteroError {
    #[error("Zotero request to {url} returned status {status}")]
    Request { status: u16, url: String },
    #[error("request to Zotero failed")]
    Transport(#[from] reqwest::Error),
    #[error("InvalidResponse: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io failure")]
    Io(#[from] std::io::Error),
    #[error("store contents are not valid json")]
    Json(#[from] serde_json::Error),
    #[error("InvalidVersion: {0:?}")]
    InvalidVersion(String),
}
