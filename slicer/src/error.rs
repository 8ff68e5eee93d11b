use std::{io, path::PathBuf};

use common::config::ConfigError;
use gcode_format::PostprocessError;
use mesh_format::ImportError;
use thiserror::Error;

use crate::scene::SceneError;

#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("the mesh produced no closed loops")]
    NoClosedLoops,
    #[error("layer {layer} has an outline but no room for a perimeter")]
    EmptyOffset { layer: usize },
}

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("no usable feed rate for {0}")]
    NoFeedRate(&'static str),
    #[error("there are no layers to print")]
    EmptyLayers,
    #[error("layer {layer} has {components} outer loops, spiral mode needs exactly one")]
    MultipleJorisComponents { layer: usize, components: usize },
}

/// Error returned at the boundary of a slice job.
#[derive(Debug, Error)]
pub enum SliceError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Postprocess(#[from] PostprocessError),
    #[error("failed to write `{}`: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("job pool failed: {0}")]
    Pool(String),
    #[error("slicing was cancelled")]
    Cancelled,
}

impl SliceError {
    /// Process exit code for the error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Scene(SceneError::Io(_)) => 2,
            Self::Config(_) | Self::Scene(_) => 1,
            Self::Import(_) | Self::Write { .. } => 2,
            Self::Geometry(_) | Self::Plan(_) | Self::Postprocess(_) | Self::Pool(_) => 3,
            Self::Cancelled => 130,
        }
    }
}
