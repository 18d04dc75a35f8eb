use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("failed to load Go grammar: {0}")]
    Language(String),

    #[error("invalid analysis root: {0}")]
    InvalidRoot(PathBuf),

    #[error("failed to start worker pool: {0}")]
    WorkerPool(String),

    #[error("analysis cancelled")]
    Cancelled,

    #[error("analysis deadline exceeded")]
    DeadlineExceeded,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AnalysisError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AnalysisError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        AnalysisError::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// True for both explicit cancellation and an expired deadline.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, AnalysisError::Cancelled | AnalysisError::DeadlineExceeded)
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_distinguishable_from_extraction_failures() {
        assert!(AnalysisError::Cancelled.is_cancellation());
        assert!(AnalysisError::DeadlineExceeded.is_cancellation());
        assert!(!AnalysisError::parse("a.go", "syntax error").is_cancellation());
        let io = AnalysisError::io("pkg", std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(!io.is_cancellation());
        assert!(io.to_string().contains("pkg"));
    }
}
