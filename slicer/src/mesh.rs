use std::{collections::HashMap, mem, path::Path, sync::Arc};

use common::{
    config::SliceConfig,
    math::{BoundingBox, Pos},
};
use mesh_format::ImportError;
use nalgebra::{Matrix4, Vector3};

/// A mesh made of vertices and triangular faces. It can be scaled, translated,
/// and rotated. The vertex and face buffers are shared between clones.
#[derive(Debug, Clone)]
pub struct Mesh {
    inner: Arc<MeshInner>,

    transformation_matrix: Matrix4<f64>,
    inv_transformation_matrix: Matrix4<f64>,

    position: Pos,
    scale: Pos,
    rotation: Pos,
}

#[derive(Debug)]
struct MeshInner {
    vertices: Box<[Pos]>,
    faces: Box<[[u32; 3]]>,
}

/// An undirected mesh edge with the faces using it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub vertices: [u32; 2],
    pub faces: Vec<u32>,
}

impl Mesh {
    /// Creates a new mesh from the given vertices and faces with an identity
    /// transformation.
    pub fn new(vertices: Vec<Pos>, faces: Vec<[u32; 3]>) -> Self {
        Self {
            inner: Arc::new(MeshInner {
                vertices: vertices.into_boxed_slice(),
                faces: faces.into_boxed_slice(),
            }),
            ..Default::default()
        }
    }

    pub fn from_import(mesh: mesh_format::Mesh) -> Self {
        Self::new(mesh.verts, mesh.faces)
    }

    pub fn vertices(&self) -> &[Pos] {
        self.inner.vertices.as_ref()
    }

    pub fn faces(&self) -> &[[u32; 3]] {
        self.inner.faces.as_ref()
    }

    pub fn face(&self, index: usize) -> [u32; 3] {
        self.faces()[index]
    }

    /// Normal of a face in model space, zero for degenerate faces.
    pub fn normal(&self, index: usize) -> Pos {
        let (v, f) = (self.vertices(), self.face(index));
        let edge1 = v[f[1] as usize] - v[f[0] as usize];
        let edge2 = v[f[2] as usize] - v[f[0] as usize];
        edge1.cross(&edge2).try_normalize(0.0).unwrap_or_else(Pos::zeros)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices().len()
    }

    pub fn face_count(&self) -> usize {
        self.faces().len()
    }

    /// Approximate memory used by the vertex and face buffers.
    pub fn byte_size(&self) -> usize {
        self.vertex_count() * mem::size_of::<Pos>() + self.face_count() * mem::size_of::<[u32; 3]>()
    }

    /// Derives the undirected edges of the mesh, in order of first use.
    pub fn edges(&self) -> Vec<Edge> {
        let mut index = HashMap::<(u32, u32), usize>::new();
        let mut edges = Vec::<Edge>::new();

        for (face, &[a, b, c]) in self.faces().iter().enumerate() {
            for (a, b) in [(a, b), (b, c), (c, a)] {
                let key = (a.min(b), a.max(b));
                let idx = *index.entry(key).or_insert_with(|| {
                    edges.push(Edge {
                        vertices: [key.0, key.1],
                        faces: Vec::new(),
                    });
                    edges.len() - 1
                });
                edges[idx].faces.push(face as u32);
            }
        }

        edges
    }

    /// Number of edges not shared by exactly two faces. Zero for a closed
    /// mesh.
    pub fn open_edges(&self) -> usize {
        self.edges().iter().filter(|x| x.faces.len() != 2).count()
    }

    pub fn is_closed(&self) -> bool {
        self.open_edges() == 0
    }

    /// Intersect the mesh with a plane with linear time complexity. You
    /// should probably use the [`crate::segments::FaceIndex`] struct as it
    /// can massively accelerate slicing of high face count meshes.
    pub fn intersect_plane(&self, height: f64) -> Vec<crate::carve::Segment> {
        let vertices = self.transformed_vertices();
        (0..self.face_count())
            .filter_map(|face| crate::carve::intersect_face(&vertices, self.face(face), height))
            .collect()
    }

    /// Applies the transformation to every vertex.
    pub fn transformed_vertices(&self) -> Vec<Pos> {
        self.vertices().iter().map(|x| self.transform(x)).collect()
    }

    /// Updates the internal transformation matrices. This is called
    /// automatically by [`Mesh::set_position`], [`Mesh::set_scale`] and
    /// [`Mesh::set_rotation`].
    pub fn update_transformation_matrix(&mut self) {
        let scale = Matrix4::new_nonuniform_scaling(&self.scale);
        let rotation =
            Matrix4::from_euler_angles(self.rotation.x, self.rotation.y, self.rotation.z);
        let translation = Matrix4::new_translation(&self.position);

        self.transformation_matrix = translation * scale * rotation;
        self.inv_transformation_matrix = self
            .transformation_matrix
            .try_inverse()
            .unwrap_or_else(Matrix4::identity);
    }

    /// Transforms a point according to the models translation, scale, and rotation.
    pub fn transform(&self, pos: &Pos) -> Pos {
        (self.transformation_matrix * pos.push(1.0)).xyz()
    }

    /// Transforms a normal according to the models scale and rotation.
    pub fn transform_normal(&self, normal: &Pos) -> Pos {
        (self.transformation_matrix * normal.to_homogeneous()).xyz()
    }

    /// Undoes the transformation of a point from the models translation, scale, and rotation.
    pub fn inv_transform(&self, pos: &Pos) -> Pos {
        (self.inv_transformation_matrix * pos.push(1.0)).xyz()
    }

    /// Bounding box of the transformed vertices.
    pub fn bounds(&self) -> BoundingBox {
        let mut bounds = BoundingBox::empty();
        for vertex in self.vertices() {
            bounds.extend(&self.transform(vertex));
        }
        bounds
    }

    /// Applies the carve settings of a config: scale, flips and the rotation
    /// about Z, then drops the model onto the bed.
    pub fn apply_config(&mut self, config: &SliceConfig) {
        let flip = |flip: bool| if flip { -1.0 } else { 1.0 };
        self.scale = Vector3::new(
            config.scale * flip(config.flip_x),
            config.scale * flip(config.flip_y),
            config.scale * flip(config.flip_z),
        );
        self.rotation = Vector3::new(0.0, 0.0, config.rotate.to_radians());
        self.update_transformation_matrix();
        self.place_on_bed();
    }

    /// Translates the model along Z so its lowest point is at z = 0. The
    /// XY placement is kept.
    pub fn place_on_bed(&mut self) {
        let bounds = self.bounds();
        if bounds.is_empty() {
            return;
        }

        self.set_position(self.position - Pos::new(0.0, 0.0, bounds.min.z));
    }
}

impl Mesh {
    /// Gets the current transformation matrix of the model.
    pub fn transformation_matrix(&self) -> &Matrix4<f64> {
        &self.transformation_matrix
    }

    /// Changes the position of the model, automatically updating the internal
    /// transformation matrix.
    pub fn set_position(&mut self, pos: Pos) {
        self.position = pos;
        self.update_transformation_matrix();
    }

    pub fn position(&self) -> Pos {
        self.position
    }

    /// Changes the current scale of the model, automatically updating the
    /// internal transformation matrix. Negative components mirror the model.
    pub fn set_scale(&mut self, scale: Pos) {
        self.scale = scale;
        self.update_transformation_matrix();
    }

    pub fn scale(&self) -> Pos {
        self.scale
    }

    /// Changes the current rotation of the model, using Euler angles in
    /// radians. The internal transformation matrix is automatically updated.
    pub fn set_rotation(&mut self, rotation: Pos) {
        self.rotation = rotation;
        self.update_transformation_matrix();
    }

    pub fn rotation(&self) -> Pos {
        self.rotation
    }
}

/// Loads and decodes a mesh file, sniffing its format from the content.
pub fn load_mesh(path: impl AsRef<Path>) -> Result<Mesh, ImportError> {
    mesh_format::load_mesh(path).map(Mesh::from_import)
}

impl Default for Mesh {
    fn default() -> Self {
        Self {
            inner: Arc::new(MeshInner {
                vertices: Box::new([]),
                faces: Box::new([]),
            }),

            transformation_matrix: Matrix4::identity(),
            inv_transformation_matrix: Matrix4::identity(),

            position: Pos::repeat(0.0),
            scale: Pos::repeat(1.0),
            rotation: Pos::repeat(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use common::math::positions_eq;

    use super::*;
    use crate::builder::MeshBuilder;

    #[test]
    fn cube_is_closed() {
        let mut builder = MeshBuilder::new();
        builder.add_cuboid(Pos::zeros(), Pos::repeat(10.0));
        let cube = builder.build();

        assert_eq!(cube.face_count(), 12);
        assert_eq!(cube.edges().len(), 18);
        assert!(cube.is_closed());
    }

    #[test]
    fn config_transforms() {
        let mut builder = MeshBuilder::new();
        builder.add_cuboid(Pos::new(0.0, 0.0, 5.0), Pos::new(10.0, 20.0, 10.0));
        let mut mesh = builder.build();

        let config = SliceConfig {
            scale: 2.0,
            rotate: 90.0,
            flip_x: true,
            ..Default::default()
        };
        mesh.apply_config(&config);

        let bounds = mesh.bounds();
        assert!(positions_eq(&bounds.size(), &Pos::new(40.0, 20.0, 10.0)));
        assert!(bounds.min.z.abs() < 1e-9);

        let back = mesh.inv_transform(&mesh.transform(&Pos::new(1.0, 2.0, 3.0)));
        assert!(positions_eq(&back, &Pos::new(1.0, 2.0, 3.0)));
    }
}
