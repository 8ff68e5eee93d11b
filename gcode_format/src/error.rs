use thiserror::Error;

#[derive(Debug, Error)]
pub enum PostprocessError {
    #[error("event {index} is an unknown `{name}` extension")]
    UnknownEvent { index: usize, name: String },
    #[error("event {index} has a non-finite {field}")]
    FiniteNumberCheckFailed { index: usize, field: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostprocessErrorKind {
    UnknownEvent,
    FiniteNumberCheckFailed,
}

impl PostprocessError {
    pub fn kind(&self) -> PostprocessErrorKind {
        match self {
            Self::UnknownEvent { .. } => PostprocessErrorKind::UnknownEvent,
            Self::FiniteNumberCheckFailed { .. } => PostprocessErrorKind::FiniteNumberCheckFailed,
        }
    }
}

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("line {line}: invalid word `{word}`")]
    InvalidWord { line: usize, word: String },
}
