use std::fmt::{self, Display};

use parking_lot::Mutex;
use tracing::warn;

/// Problem that was worked around while slicing. Diagnostics never change
/// the outcome of a job.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    OpenMesh { open_edges: usize },
    SuspiciousMesh { faces: usize, total: usize },
    OpenChains { layer: usize, count: usize },
    DiscardedLoops { layer: usize, count: usize },
    EmptyInset { layer: usize },
    CoolingSaturated { layer: usize },
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenMesh { open_edges } => {
                write!(f, "mesh is not closed, {open_edges} edges are not shared by two faces")
            }
            Self::SuspiciousMesh { faces, total } => write!(
                f,
                "{faces} of {total} faces span some height without meeting a layer plane"
            ),
            Self::OpenChains { layer, count } => {
                write!(f, "layer {layer}: dropped {count} segment chains that do not close")
            }
            Self::DiscardedLoops { layer, count } => {
                write!(f, "layer {layer}: discarded {count} degenerate loops")
            }
            Self::EmptyInset { layer } => {
                write!(f, "layer {layer}: an island is too thin for a perimeter")
            }
            Self::CoolingSaturated { layer } => write!(
                f,
                "layer {layer}: minimum feed rate reached before the minimum layer time"
            ),
        }
    }
}

/// Per job diagnostic log, shared by the parallel stages.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Mutex<Vec<Diagnostic>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, diagnostic: Diagnostic) {
        warn!("{diagnostic}");
        self.entries.lock().push(diagnostic);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries.lock().clone()
    }

    pub fn into_entries(self) -> Vec<Diagnostic> {
        self.entries.into_inner()
    }
}
