use std::f64::consts::{PI, TAU};

use common::math::Pos;

use crate::mesh::Mesh;

pub struct MeshBuilder {
    vertices: Vec<Pos>,
    faces: Vec<[u32; 3]>,
}

/// A primitive solid. The translation moves the minimum corner of a cube,
/// the bottom center of a cylinder and the center of a sphere.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveSolid {
    pub kind: SolidKind,
    pub translate: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SolidKind {
    Cube {
        size: Pos,
    },
    Cylinder {
        radius: f64,
        height: f64,
        segments: u32,
    },
    Sphere {
        radius: f64,
        segments: u32,
        rings: u32,
    },
}

impl MeshBuilder {
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            faces: Vec::new(),
        }
    }

    pub fn add_vertex(&mut self, vertex: Pos) -> u32 {
        self.vertices.push(vertex);
        (self.vertices.len() - 1) as u32
    }

    pub fn add_face(&mut self, face: [u32; 3]) {
        self.faces.push(face);
    }

    pub fn add_quad(&mut self, quad: [u32; 4]) {
        self.add_face([quad[0], quad[1], quad[2]]);
        self.add_face([quad[2], quad[1], quad[3]]);
    }

    pub fn build(self) -> Mesh {
        Mesh::new(self.vertices, self.faces)
    }
}

impl MeshBuilder {
    pub fn add_vertical_cylinder(
        &mut self,
        bottom: Pos,
        height: f64,
        (bottom_radius, top_radius): (f64, f64),
        precision: u32,
    ) {
        let top = bottom + Pos::new(0.0, 0.0, height);
        let bottom_center = self.add_vertex(bottom);
        let top_center = self.add_vertex(top);

        let mut last = None;
        let mut fist = None;
        for i in 0..precision {
            let angle = TAU * (i as f64) / (precision as f64);
            let normal = Pos::new(angle.sin(), angle.cos(), 0.0);

            let top = self.add_vertex(top + normal * top_radius);
            let bottom = self.add_vertex(bottom + normal * bottom_radius);

            if let Some((last_top, last_bottom)) = last {
                self.add_quad([last_bottom, last_top, bottom, top]);
                self.add_face([top, last_top, top_center]);
                self.add_face([bottom_center, last_bottom, bottom]);
            }

            last = Some((top, bottom));
            if fist.is_none() {
                fist = Some((top, bottom));
            }
        }

        if let Some((first_top, first_bottom)) = fist {
            if let Some((last_top, last_bottom)) = last {
                self.add_quad([last_bottom, last_top, first_bottom, first_top]);
                self.add_face([first_top, last_top, top_center]);
                self.add_face([bottom_center, last_bottom, first_bottom]);
            }
        }
    }

    /// Adds an axis aligned box spanning `min` to `max`, with 8 shared
    /// vertices and outward facing triangles.
    pub fn add_cuboid(&mut self, min: Pos, max: Pos) {
        let corners = (0..8).map(|i| {
            Pos::new(
                if i & 1 == 0 { min.x } else { max.x },
                if i & 2 == 0 { min.y } else { max.y },
                if i & 4 == 0 { min.z } else { max.z },
            )
        });
        let base = self.vertices.len() as u32;
        corners.for_each(|x| {
            self.add_vertex(x);
        });

        const FACES: [[u32; 3]; 12] = [
            [0, 2, 3],
            [0, 3, 1],
            [4, 5, 7],
            [4, 7, 6],
            [0, 1, 5],
            [0, 5, 4],
            [2, 6, 7],
            [2, 7, 3],
            [0, 4, 6],
            [0, 6, 2],
            [1, 3, 7],
            [1, 7, 5],
        ];
        for face in FACES {
            self.add_face(face.map(|x| x + base));
        }
    }

    /// Adds a UV sphere with `segments` vertices around each of its
    /// `rings - 1` latitude rings, giving `2 * segments * (rings - 1)` faces.
    pub fn add_sphere(&mut self, center: Pos, radius: f64, segments: u32, rings: u32) {
        let (segments, rings) = (segments.max(3), rings.max(2));
        let south = self.add_vertex(center - Pos::new(0.0, 0.0, radius));

        let mut ring_start = Vec::new();
        for ring in 1..rings {
            let polar = PI * ring as f64 / rings as f64;
            let (z, r) = (-polar.cos() * radius, polar.sin() * radius);
            ring_start.push(self.vertices.len() as u32);
            for i in 0..segments {
                let angle = TAU * i as f64 / segments as f64;
                self.add_vertex(center + Pos::new(angle.cos() * r, angle.sin() * r, z));
            }
        }

        let north = self.add_vertex(center + Pos::new(0.0, 0.0, radius));
        let at = |ring: usize, i: u32| ring_start[ring] + i % segments;

        for i in 0..segments {
            self.add_face([south, at(0, i + 1), at(0, i)]);
            for ring in 0..ring_start.len() - 1 {
                self.add_quad([at(ring, i), at(ring, i + 1), at(ring + 1, i), at(ring + 1, i + 1)]);
            }
            let last = ring_start.len() - 1;
            self.add_face([north, at(last, i), at(last, i + 1)]);
        }
    }
}

impl PrimitiveSolid {
    pub fn new(kind: SolidKind) -> Self {
        Self {
            kind,
            translate: Pos::zeros(),
        }
    }

    pub fn translated(mut self, translate: Pos) -> Self {
        self.translate = translate;
        self
    }

    pub fn build(&self) -> Mesh {
        let mut builder = MeshBuilder::new();
        match self.kind {
            SolidKind::Cube { size } => builder.add_cuboid(self.translate, self.translate + size),
            SolidKind::Cylinder {
                radius,
                height,
                segments,
            } => builder.add_vertical_cylinder(
                self.translate,
                height,
                (radius, radius),
                segments.max(3),
            ),
            SolidKind::Sphere {
                radius,
                segments,
                rings,
            } => builder.add_sphere(self.translate, radius, segments, rings),
        }
        builder.build()
    }
}

impl Default for MeshBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sphere_face_count() {
        let sphere = PrimitiveSolid::new(SolidKind::Sphere {
            radius: 10.0,
            segments: 20,
            rings: 9,
        })
        .build();

        assert_eq!(sphere.face_count(), 320);
        assert!(sphere.is_closed());

        let bounds = sphere.bounds();
        assert!((bounds.min.z + 10.0).abs() < 1e-9);
        assert!((bounds.max.z - 10.0).abs() < 1e-9);
    }

    #[test]
    fn cylinder_is_closed() {
        let cylinder = PrimitiveSolid::new(SolidKind::Cylinder {
            radius: 10.0,
            height: 20.0,
            segments: 64,
        })
        .translated(Pos::new(0.0, 0.0, 1.0))
        .build();

        assert_eq!(cylinder.face_count(), 64 * 4);
        assert!(cylinder.is_closed());
        assert!((cylinder.bounds().max.z - 21.0).abs() < 1e-9);
    }
}
