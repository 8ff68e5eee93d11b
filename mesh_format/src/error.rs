use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("unknown mesh format")]
    UnknownFormat,
    #[error("malformed {format} file: {reason}")]
    Malformed {
        format: &'static str,
        reason: String,
    },
    #[error("failed to read mesh: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportErrorKind {
    UnknownFormat,
    Malformed,
    Io,
}

impl ImportError {
    pub fn malformed(format: &'static str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            format,
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ImportErrorKind {
        match self {
            Self::UnknownFormat => ImportErrorKind::UnknownFormat,
            Self::Malformed { .. } => ImportErrorKind::Malformed,
            Self::Io(_) => ImportErrorKind::Io,
        }
    }
}
