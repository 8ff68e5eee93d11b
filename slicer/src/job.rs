//! A slice job drives one mesh through every stage of the pipeline.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};

use common::{
    config::SliceConfig,
    math::Pos,
    motion::{Motion, MotionEvent},
    progress::{CancelToken, Progress},
};
use gcode_format::PostProcessor;
use tracing::info;

use crate::{
    cache::MeshCache,
    carve::{CarveSettings, Carver, LoopLayer},
    diagnostics::{Diagnostic, Diagnostics},
    error::{GeometryError, SliceError},
    layer::{build_layers, multiply, LayerStack},
    mesh::{load_mesh, Mesh},
    planner::{layer_time, plan},
    scene::Scene,
};

pub enum JobInput {
    MeshFile(PathBuf),
    Mesh(Mesh),
    Scene(Scene),
}

pub struct SliceJob {
    pub config: SliceConfig,
    pub input: JobInput,

    cancel: CancelToken,
    progress: Progress,
    cache: Option<Arc<MeshCache>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SliceStats {
    pub layers: usize,
    pub raft_layers: usize,
    pub events: usize,
    /// Sum of the filament amounts of every extrusion.
    pub extruded: f64,
    /// Estimated print time in seconds, ignoring acceleration.
    pub print_time: f64,
}

pub struct SliceOutput {
    pub events: Vec<MotionEvent>,
    pub layers: LayerStack,
    pub diagnostics: Vec<Diagnostic>,
    pub stats: SliceStats,
}

impl SliceJob {
    pub fn new(config: SliceConfig, input: JobInput) -> Self {
        Self {
            config,
            input,
            cancel: CancelToken::new(),
            progress: Progress::new(),
            cache: None,
        }
    }

    /// Decodes mesh files through a shared cache.
    pub fn with_cache(mut self, cache: Arc<MeshCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Token that cancels the job when set. It is checked between layers.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Counts processed layers, once for carving and once for layer
    /// construction.
    pub fn progress(&self) -> Progress {
        self.progress.clone()
    }

    pub fn run(&self) -> Result<SliceOutput, SliceError> {
        let start = Instant::now();
        let config = &self.config;
        config.validate()?;

        let diagnostics = Diagnostics::new();
        let (mut carved, top) = self.carve(&diagnostics)?;
        self.check_cancelled()?;

        multiply(&mut carved, config.copies, config.copy_spacing);
        if carved.iter().all(|x| x.loops.is_empty()) {
            return Err(GeometryError::NoClosedLoops.into());
        }

        let layers = build_layers(&carved, config, top, &diagnostics, &self.progress, &self.cancel)?;
        self.check_cancelled()?;

        let events = plan(&layers, config, &diagnostics, &self.cancel)?;
        self.progress.set_finished();

        let stats = SliceStats {
            layers: layers.layers.len(),
            raft_layers: layers.raft.len(),
            events: events.len(),
            extruded: (events.iter())
                .map(|x| match x.motion {
                    Motion::Extrude { e, .. } => e,
                    _ => 0.0,
                })
                .sum(),
            print_time: layer_time(&events, Pos::zeros()),
        };

        info!(
            layers = stats.layers,
            events = stats.events,
            diagnostics = diagnostics.len(),
            elapsed = ?start.elapsed(),
            "Sliced model"
        );
        Ok(SliceOutput {
            events,
            layers,
            diagnostics: diagnostics.into_entries(),
            stats,
        })
    }

    /// Runs the job and post-processes the events into G-code.
    pub fn run_to_gcode(&self) -> Result<(SliceOutput, String), SliceError> {
        let output = self.run()?;
        let gcode = PostProcessor::new(&self.config).process(&output.events)?;
        Ok((output, gcode))
    }

    /// Runs the job and writes the G-code to a file.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<SliceOutput, SliceError> {
        let path = path.as_ref();
        let (output, gcode) = self.run_to_gcode()?;
        self.check_cancelled()?;

        fs::write(path, gcode).map_err(|source| SliceError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "Wrote G-code");
        Ok(output)
    }

    fn carve(&self, diagnostics: &Diagnostics) -> Result<(Vec<LoopLayer>, f64), SliceError> {
        let mesh = match &self.input {
            JobInput::Scene(scene) => {
                return scene.carve(&self.config, diagnostics, &self.progress, &self.cancel);
            }
            JobInput::MeshFile(path) => match &self.cache {
                Some(cache) => cache.load(path)?,
                None => load_mesh(path)?,
            },
            JobInput::Mesh(mesh) => mesh.clone(),
        };

        let mut mesh = mesh;
        mesh.apply_config(&self.config);

        let carver = Carver::new(&mesh, CarveSettings::from_config(&self.config));
        let heights = carver.heights();
        self.progress.set_total(heights.len() as u64 * 2);

        let layers = carver.carve_at(&heights, diagnostics, &self.progress, &self.cancel)?;
        Ok((layers, carver.top()))
    }

    fn check_cancelled(&self) -> Result<(), SliceError> {
        match self.cancel.is_cancelled() {
            true => Err(SliceError::Cancelled),
            false => Ok(()),
        }
    }
}
