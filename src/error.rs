use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("No parser found for file: {0}")]
    Unclassified(PathBuf),
    #[error("File {path} is {size} bytes, limit is {limit}")]
    TooLarge { path: PathBuf, size: u64, limit: u64 },
    #[error("Failed to read {0}")]
    Io(PathBuf, #[source] std::io::Error),
    #[error("Malformed delimited text: {0}")]
    Csv(#[from] csv::Error),
    #[error("Malformed structured text: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum ArchiveError {
    #[error("Archive storage failure: {0}")]
    Storage(#[from] sled::Error),
    #[error("Failed to encode report: {0}")]
    Encode(String),
    #[error("Failed to decode archived report: {0}")]
    Decode(#[from] minicbor::decode::Error),
    #[error("Archived report {0} failed its digest check")]
    DigestMismatch(String),
    #[error("Failed to derive document id: {0}")]
    DocumentId(String),
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {name}")]
    InvalidValue { name: String, value: String },
    #[error("Cannot create folder {0}")]
    Folder(PathBuf, #[source] std::io::Error),
}
