//! Carving turns a mesh into closed, oriented loops on equally spaced
//! horizontal planes.

use std::sync::atomic::{AtomicBool, Ordering};

use common::{
    config::SliceConfig,
    progress::{CancelToken, Progress},
};
use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};
use tracing::{debug, info};

use crate::{
    diagnostics::{Diagnostic, Diagnostics},
    error::SliceError,
    geometry::{polygon::orient_by_nesting, Polygon},
    mesh::Mesh,
    segments::FaceIndex,
};

mod intersect;
mod stitch;

pub use intersect::{intersect_face, Segment};
pub use stitch::{stitch, Stitched};

const INDEX_BUCKETS: usize = 100;

/// Planes touching a vertex are moved up by this much.
const PERTURBATION: f64 = 1e-9;

/// Share of faces with some height allowed to miss every plane before the
/// mesh is reported as suspicious.
const SUSPICIOUS_SHARE: f64 = 0.1;

/// Faces flatter than this are not expected to be cut.
const FLAT_FACE: f64 = 1e-6;

/// Loops of one slicing plane. Outer boundaries are counter-clockwise and
/// holes clockwise.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoopLayer {
    pub index: usize,
    pub z: f64,
    pub loops: Vec<Polygon>,
    pub open_chains: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct CarveSettings {
    pub layer_height: f64,
    pub first_layer_z: f64,
    pub import_radius: f64,
}

impl CarveSettings {
    pub fn from_config(config: &SliceConfig) -> Self {
        Self {
            layer_height: config.layer_height,
            first_layer_z: config.first_layer_z(),
            import_radius: config.import_radius(),
        }
    }

    /// Plane heights `z0 + k * h` below the given top.
    pub fn heights(&self, top: f64) -> Vec<f64> {
        (0..)
            .map(|k| self.first_layer_z + k as f64 * self.layer_height)
            .take_while(|&z| z < top)
            .collect()
    }
}

pub struct Carver {
    index: FaceIndex,
    settings: CarveSettings,
    top: f64,
    open_edges: usize,
    cut: Vec<AtomicBool>,
}

impl Carver {
    pub fn new(mesh: &Mesh, settings: CarveSettings) -> Self {
        let index = FaceIndex::from_mesh(mesh, INDEX_BUCKETS);
        let bounds = mesh.bounds();
        let faces = mesh.face_count();

        Self {
            index,
            settings,
            top: if bounds.is_empty() { 0.0 } else { bounds.max.z },
            open_edges: mesh.open_edges(),
            cut: (0..faces).map(|_| AtomicBool::new(false)).collect(),
        }
    }

    /// Highest point of the mesh.
    pub fn top(&self) -> f64 {
        self.top
    }

    pub fn heights(&self) -> Vec<f64> {
        self.settings.heights(self.top)
    }

    /// Carves every layer plane of the mesh.
    pub fn carve(
        &self,
        diagnostics: &Diagnostics,
        progress: &Progress,
        cancel: &CancelToken,
    ) -> Result<Vec<LoopLayer>, SliceError> {
        self.carve_at(&self.heights(), diagnostics, progress, cancel)
    }

    /// Carves the mesh at the given heights, in parallel. Cancellation is
    /// checked before every layer.
    pub fn carve_at(
        &self,
        heights: &[f64],
        diagnostics: &Diagnostics,
        progress: &Progress,
        cancel: &CancelToken,
    ) -> Result<Vec<LoopLayer>, SliceError> {
        if self.open_edges > 0 {
            diagnostics.push(Diagnostic::OpenMesh {
                open_edges: self.open_edges,
            });
        }

        let layers = (heights.par_iter().enumerate())
            .map(|(index, &z)| {
                if cancel.is_cancelled() {
                    return Err(SliceError::Cancelled);
                }

                let layer = self.carve_layer(index, z, diagnostics);
                progress.add_complete(1);
                Ok(layer)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let faces = (self.cut.iter().enumerate())
            .filter(|(face, cut)| {
                !cut.load(Ordering::Relaxed) && self.index.extent(*face) > FLAT_FACE
            })
            .count();
        let total = self.index.face_count();
        if faces > 0 && faces as f64 > total as f64 * SUSPICIOUS_SHARE {
            diagnostics.push(Diagnostic::SuspiciousMesh { faces, total });
        }

        let loops = layers.iter().map(|x| x.loops.len()).sum::<usize>();
        info!(layers = layers.len(), loops, "Carved mesh");
        Ok(layers)
    }

    /// Carves one plane. The plane is nudged up while it passes exactly
    /// through a vertex; the layer keeps its nominal height.
    pub fn carve_layer(&self, index: usize, z: f64, diagnostics: &Diagnostics) -> LoopLayer {
        let mut plane = z;
        while self.index.touches_vertex(plane) {
            plane += PERTURBATION;
        }

        let mut iter = self.index.segments(plane);
        let segments = iter.by_ref().collect::<Vec<_>>();
        for &face in iter.cut() {
            self.cut[face].store(true, Ordering::Relaxed);
        }

        let Stitched {
            mut loops,
            open_chains,
            discarded,
        } = stitch(segments, self.settings.import_radius);
        orient_by_nesting(&mut loops);

        if open_chains > 0 {
            diagnostics.push(Diagnostic::OpenChains {
                layer: index,
                count: open_chains,
            });
        }
        if discarded > 0 {
            diagnostics.push(Diagnostic::DiscardedLoops {
                layer: index,
                count: discarded,
            });
        }

        debug!(layer = index, z, loops = loops.len(), "Carved layer");
        LoopLayer {
            index,
            z,
            loops,
            open_chains,
        }
    }
}

#[cfg(test)]
mod tests {
    use common::math::Pos;

    use super::*;
    use crate::{
        builder::{MeshBuilder, PrimitiveSolid, SolidKind},
        geometry::polygon::region_area,
    };

    fn settings() -> CarveSettings {
        CarveSettings {
            layer_height: 0.2,
            first_layer_z: 0.1,
            import_radius: 0.1,
        }
    }

    fn carve(mesh: &Mesh, settings: CarveSettings) -> (Vec<LoopLayer>, Diagnostics) {
        let diagnostics = Diagnostics::new();
        let layers = Carver::new(mesh, settings)
            .carve(&diagnostics, &Progress::new(), &CancelToken::new())
            .unwrap();
        (layers, diagnostics)
    }

    #[test]
    fn plane_heights() {
        let heights = settings().heights(1.0);
        assert_eq!(heights.len(), 5);
        assert!((heights[4] - 0.9).abs() < 1e-12);
    }

    #[test]
    fn cube_layers() {
        let cube = PrimitiveSolid::new(SolidKind::Cube {
            size: Pos::repeat(10.0),
        })
        .build();
        let (layers, diagnostics) = carve(&cube, settings());

        assert_eq!(layers.len(), 50);
        assert!(diagnostics.is_empty());
        for layer in layers.iter() {
            assert_eq!(layer.loops.len(), 1);
            assert!(layer.loops[0].is_ccw());
            assert_eq!(layer.loops[0].len(), 4);
            assert!((region_area(&layer.loops) - 100.0).abs() < 1e-9);
        }
    }

    #[test]
    fn holes_are_clockwise() {
        let outer = PrimitiveSolid::new(SolidKind::Cube {
            size: Pos::new(10.0, 10.0, 2.0),
        })
        .build();
        let hole = PrimitiveSolid::new(SolidKind::Cube {
            size: Pos::new(4.0, 4.0, 2.0),
        })
        .translated(Pos::new(3.0, 3.0, 0.0))
        .build();

        let diagnostics = Diagnostics::new();
        let mut loops = Carver::new(&outer, settings()).carve_layer(0, 1.0, &diagnostics).loops;
        loops.extend(Carver::new(&hole, settings()).carve_layer(0, 1.0, &diagnostics).loops);
        orient_by_nesting(&mut loops);

        assert!(loops[0].is_ccw());
        assert!(!loops[1].is_ccw());
        assert!((region_area(&loops) - 84.0).abs() < 1e-9);
    }

    #[test]
    fn vertex_planes_are_perturbed() {
        let cube = PrimitiveSolid::new(SolidKind::Cube {
            size: Pos::repeat(1.0),
        })
        .build();
        let settings = CarveSettings {
            first_layer_z: 0.0,
            ..settings()
        };
        let (layers, _) = carve(&cube, settings);

        assert_eq!(layers.len(), 5);
        assert_eq!(layers[0].z, 0.0);
        assert_eq!(layers[0].loops.len(), 1);
        assert!((region_area(&layers[0].loops) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn open_mesh_is_reported() {
        let mut builder = MeshBuilder::new();
        builder.add_cuboid(Pos::zeros(), Pos::repeat(10.0));
        let cube = builder.build();
        // Drop one side wall.
        let faces = (cube.faces().iter().enumerate())
            .filter(|(i, _)| !(4..6).contains(i))
            .map(|(_, x)| *x)
            .collect();
        let open = Mesh::new(cube.vertices().to_vec(), faces);

        let (layers, diagnostics) = carve(&open, settings());
        assert!(layers.iter().all(|x| x.loops.is_empty() && x.open_chains == 1));
        let entries = diagnostics.entries();
        assert!(entries.contains(&Diagnostic::OpenMesh { open_edges: 4 }));
        assert!(entries.contains(&Diagnostic::OpenChains { layer: 0, count: 1 }));
    }

    #[test]
    fn faces_between_planes_are_suspicious() {
        // Side walls of a slab that fits between the first two planes.
        let mut builder = MeshBuilder::new();
        builder.add_cuboid(Pos::new(0.0, 0.0, 0.12), Pos::new(10.0, 10.0, 0.18));
        let (layers, diagnostics) = carve(&builder.build(), settings());

        assert_eq!(layers.len(), 1);
        assert!(layers[0].loops.is_empty());
        assert!(diagnostics
            .entries()
            .contains(&Diagnostic::SuspiciousMesh { faces: 8, total: 12 }));
    }

    #[test]
    fn slivers_are_discarded() {
        let mut builder = MeshBuilder::new();
        builder.add_cuboid(Pos::zeros(), Pos::new(1e-5, 1e-5, 1.0));
        let (layers, diagnostics) = carve(&builder.build(), settings());

        assert_eq!(layers.len(), 5);
        assert!(layers.iter().all(|x| x.loops.is_empty() && x.open_chains == 0));
        let entries = diagnostics.entries();
        for layer in 0..5 {
            assert!(entries.contains(&Diagnostic::DiscardedLoops { layer, count: 1 }));
        }
        assert!(!entries.iter().any(|x| matches!(x, Diagnostic::SuspiciousMesh { .. })));
    }

    #[test]
    fn cancellation() {
        let cube = PrimitiveSolid::new(SolidKind::Cube {
            size: Pos::repeat(10.0),
        })
        .build();
        let cancel = CancelToken::new();
        cancel.cancel();

        let result = Carver::new(&cube, settings()).carve(&Diagnostics::new(), &Progress::new(), &cancel);
        assert!(matches!(result, Err(SliceError::Cancelled)));
    }
}
