//! Declarative CSG scenes. A TOML document describes a tree of primitive
//! solids, mesh files and boolean combinations, which is flattened into an
//! arena and carved layer by layer.
//!
//! ```toml
//! [root]
//! type = "difference"
//! children = [
//!     { type = "cube", size = [20, 20, 10] },
//!     { type = "cylinder", radius = 4, height = 10, translate = [10, 10, 0] },
//! ]
//! ```

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use common::{
    config::SliceConfig,
    math::Pos,
    progress::{CancelToken, Progress},
};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    builder::{PrimitiveSolid, SolidKind},
    carve::{CarveSettings, Carver, LoopLayer},
    diagnostics::Diagnostics,
    error::SliceError,
    geometry::{difference, intersection, union_all, Polygon},
    mesh::{load_mesh, Mesh},
};

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("failed to read scene: {0}")]
    Io(#[from] io::Error),
    #[error("failed to parse scene: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("`{0}` node has no children")]
    Empty(&'static str),
}

/// One node of a scene.
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryNode {
    Primitive(PrimitiveSolid),
    Mesh(PathBuf),
    Group,
    Union,
    Difference,
    Intersection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub node: GeometryNode,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

/// Scene tree stored as an arena. The root is the first node.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    nodes: Vec<SceneNode>,
}

#[derive(Deserialize)]
struct SceneFile {
    root: NodeSpec,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum NodeSpec {
    Cube {
        size: [f64; 3],
        #[serde(default)]
        translate: [f64; 3],
    },
    Cylinder {
        radius: f64,
        height: f64,
        #[serde(default = "default_segments")]
        segments: u32,
        #[serde(default)]
        translate: [f64; 3],
    },
    Sphere {
        radius: f64,
        #[serde(default = "default_segments")]
        segments: u32,
        #[serde(default = "default_rings")]
        rings: u32,
        #[serde(default)]
        translate: [f64; 3],
    },
    Mesh {
        path: PathBuf,
    },
    Group {
        children: Vec<NodeSpec>,
    },
    Union {
        children: Vec<NodeSpec>,
    },
    Difference {
        children: Vec<NodeSpec>,
    },
    Intersection {
        children: Vec<NodeSpec>,
    },
}

fn default_segments() -> u32 {
    32
}

fn default_rings() -> u32 {
    16
}

impl Scene {
    pub fn parse(source: &str) -> Result<Self, SceneError> {
        let file: SceneFile = toml::from_str(source)?;
        let mut scene = Self { nodes: Vec::new() };
        scene.push(file.root, None)?;
        Ok(scene)
    }

    /// Reads a scene file. Relative mesh paths are resolved against the
    /// directory of the scene.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SceneError> {
        let path = path.as_ref();
        let mut scene = Self::parse(&fs::read_to_string(path)?)?;

        let base = path.parent().unwrap_or(Path::new(""));
        for node in scene.nodes.iter_mut() {
            if let GeometryNode::Mesh(mesh) = &mut node.node {
                if mesh.is_relative() {
                    *mesh = base.join(&*mesh);
                }
            }
        }
        Ok(scene)
    }

    fn push(&mut self, parsed: NodeSpec, parent: Option<usize>) -> Result<usize, SceneError> {
        let primitive = |kind, translate: [f64; 3]| {
            GeometryNode::Primitive(PrimitiveSolid::new(kind).translated(Pos::from(translate)))
        };

        let (node, children) = match parsed {
            NodeSpec::Cube { size, translate } => (
                primitive(
                    SolidKind::Cube {
                        size: Pos::from(size),
                    },
                    translate,
                ),
                Vec::new(),
            ),
            NodeSpec::Cylinder {
                radius,
                height,
                segments,
                translate,
            } => (
                primitive(
                    SolidKind::Cylinder {
                        radius,
                        height,
                        segments,
                    },
                    translate,
                ),
                Vec::new(),
            ),
            NodeSpec::Sphere {
                radius,
                segments,
                rings,
                translate,
            } => (
                primitive(
                    SolidKind::Sphere {
                        radius,
                        segments,
                        rings,
                    },
                    translate,
                ),
                Vec::new(),
            ),
            NodeSpec::Mesh { path } => (GeometryNode::Mesh(path), Vec::new()),
            NodeSpec::Group { children } => (GeometryNode::Group, children),
            NodeSpec::Union { children } => (GeometryNode::Union, children),
            NodeSpec::Difference { children } => (GeometryNode::Difference, children),
            NodeSpec::Intersection { children } => (GeometryNode::Intersection, children),
        };

        let name = match node {
            GeometryNode::Group => Some("group"),
            GeometryNode::Union => Some("union"),
            GeometryNode::Difference => Some("difference"),
            GeometryNode::Intersection => Some("intersection"),
            _ => None,
        };
        if let Some(name) = name.filter(|_| children.is_empty()) {
            return Err(SceneError::Empty(name));
        }

        let index = self.nodes.len();
        self.nodes.push(SceneNode {
            node,
            parent,
            children: Vec::new(),
        });

        for child in children {
            let child = self.push(child, Some(index))?;
            self.nodes[index].children.push(child);
        }
        Ok(index)
    }

    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> &SceneNode {
        &self.nodes[index]
    }

    pub fn parent(&self, index: usize) -> Option<usize> {
        self.nodes[index].parent
    }

    /// Nodes without children, the ones that turn into meshes.
    pub fn leaves(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.nodes.len()).filter(|&i| self.nodes[i].children.is_empty())
    }

    /// Builds or loads the mesh of every leaf, shifted together so the
    /// lowest point of the scene rests on the bed.
    pub fn meshes(&self) -> Result<Vec<(usize, Mesh)>, SliceError> {
        let mut meshes = self
            .leaves()
            .map(|leaf| -> Result<_, SliceError> {
                let mesh = match &self.nodes[leaf].node {
                    GeometryNode::Primitive(solid) => solid.build(),
                    GeometryNode::Mesh(path) => load_mesh(path)?,
                    _ => Mesh::default(),
                };
                Ok((leaf, mesh))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let bottom = (meshes.iter())
            .map(|(_, x)| x.bounds())
            .filter(|x| !x.is_empty())
            .map(|x| x.min.z)
            .fold(f64::INFINITY, f64::min);
        if bottom.is_finite() {
            for (_, mesh) in meshes.iter_mut() {
                mesh.set_position(mesh.position() - Pos::new(0.0, 0.0, bottom));
            }
        }

        Ok(meshes)
    }

    /// Carves every leaf on the same planes and combines the loops of each
    /// plane following the tree. Returns the layers and the top of the
    /// scene.
    pub fn carve(
        &self,
        config: &SliceConfig,
        diagnostics: &Diagnostics,
        progress: &Progress,
        cancel: &CancelToken,
    ) -> Result<(Vec<LoopLayer>, f64), SliceError> {
        let settings = CarveSettings::from_config(config);
        let carvers = (self.meshes()?.into_iter())
            .map(|(leaf, mesh)| (leaf, Carver::new(&mesh, settings)))
            .collect::<Vec<_>>();

        let top = carvers.iter().map(|(_, x)| x.top()).fold(0.0, f64::max);
        let heights = settings.heights(top);
        progress.set_total(((carvers.len() + 1) * heights.len()) as u64);

        let mut carved = vec![Vec::new(); self.nodes.len()];
        for (leaf, carver) in carvers.iter() {
            carved[*leaf] = carver.carve_at(&heights, diagnostics, progress, cancel)?;
        }

        let layers = (heights.iter().enumerate())
            .map(|(k, &z)| LoopLayer {
                index: k,
                z,
                loops: self.evaluate(0, k, &carved),
                open_chains: self.leaves().map(|x| carved[x][k].open_chains).sum(),
            })
            .collect::<Vec<_>>();

        info!(
            nodes = self.nodes.len(),
            leaves = carvers.len(),
            layers = layers.len(),
            "Carved scene"
        );
        Ok((layers, top))
    }

    fn evaluate(&self, index: usize, layer: usize, carved: &[Vec<LoopLayer>]) -> Vec<Polygon> {
        let node = &self.nodes[index];
        if node.children.is_empty() {
            return carved[index][layer].loops.clone();
        }

        let mut children = node.children.iter().map(|&x| self.evaluate(x, layer, carved));
        let loops = match node.node {
            GeometryNode::Difference => {
                let first = children.next().unwrap_or_default();
                let rest = children.collect::<Vec<_>>();
                difference(&first, &union_all(rest.iter().map(Vec::as_slice)))
            }
            GeometryNode::Intersection => {
                let first = children.next().unwrap_or_default();
                children.fold(first, |acc, x| intersection(&acc, &x))
            }
            _ => {
                let all = children.collect::<Vec<_>>();
                union_all(all.iter().map(Vec::as_slice))
            }
        };

        debug!(node = index, layer, loops = loops.len(), "Evaluated scene node");
        loops
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::polygon::{region_area, region_contains};
    use common::math::Point;

    const SCENE: &str = r#"
        [root]
        type = "difference"
        children = [
            { type = "cube", size = [20, 20, 2] },
            { type = "union", children = [
                { type = "cube", size = [4, 4, 2], translate = [2, 2, 0] },
                { type = "cube", size = [4, 4, 2], translate = [14, 14, 0] },
            ] },
        ]
    "#;

    #[test]
    fn arena_has_parent_links() {
        let scene = Scene::parse(SCENE).unwrap();
        assert_eq!(scene.nodes().len(), 5);
        assert_eq!(scene.node(0).node, GeometryNode::Difference);
        assert_eq!(scene.node(0).children, vec![1, 2]);
        assert_eq!(scene.node(2).children, vec![3, 4]);
        assert_eq!(scene.parent(4), Some(2));
        assert_eq!(scene.parent(0), None);
        assert_eq!(scene.leaves().collect::<Vec<_>>(), vec![1, 3, 4]);
    }

    #[test]
    fn carves_boolean_tree() {
        let scene = Scene::parse(SCENE).unwrap();
        let (layers, top) = scene
            .carve(
                &SliceConfig::default(),
                &Diagnostics::new(),
                &Progress::new(),
                &CancelToken::new(),
            )
            .unwrap();

        assert_eq!(top, 2.0);
        assert_eq!(layers.len(), 10);
        for layer in layers.iter() {
            assert!((region_area(&layer.loops) - (400.0 - 32.0)).abs() < 1e-6);
            assert!(!region_contains(&layer.loops, &Point::new(4.0, 4.0)));
            assert!(region_contains(&layer.loops, &Point::new(10.0, 10.0)));
        }
    }

    #[test]
    fn rejects_bad_scenes() {
        let empty = "[root]\ntype = \"union\"\nchildren = []\n";
        assert!(matches!(Scene::parse(empty), Err(SceneError::Empty("union"))));

        let unknown = "[root]\ntype = \"torus\"\n";
        assert!(matches!(Scene::parse(unknown), Err(SceneError::Toml(_))));
    }
}
