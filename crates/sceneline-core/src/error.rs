use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("unknown format id: {0}")]
    UnknownFormat(String),

    #[error("unsupported document version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("malformed markup at line {line}: {detail}")]
    Markup { line: usize, detail: String },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
