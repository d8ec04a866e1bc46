// Detection Errors
// Only corpus-load and linguistic-capability failures reach the caller;
// the rest recover locally (zero vectors, empty matches, retraining).

use std::path::PathBuf;
use thiserror::Error;

use super::linguistic::AnalyzerError;

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("corpus unavailable at {path}: {reason}")]
    CorpusUnavailable { path: PathBuf, reason: String },
    #[error("embedding model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("preprocessing failed: {0}")]
    PreprocessingFailure(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<AnalyzerError> for DetectionError {
    fn from(err: AnalyzerError) -> Self {
        Self::PreprocessingFailure(err.to_string())
    }
}

pub type DetectionResult<T> = Result<T, DetectionError>;
