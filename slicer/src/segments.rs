use common::math::Pos;
use ordered_float::OrderedFloat;

use crate::{
    carve::{intersect_face, Segment},
    mesh::Mesh,
};

/// Acceleration structure for carving. The Z range of the mesh is split into
/// buckets and every face is referenced by all buckets its Z interval
/// overlaps. Inside a bucket faces are sorted by their lowest point, so a
/// plane only has to look at a prefix of one bucket to find the faces it
/// cuts.
pub struct FaceIndex {
    start_height: f64,
    end_height: f64,
    bucket_height: f64,

    buckets: Vec<Vec<IndexedFace>>,
    vertices: Vec<Pos>,
    faces: Vec<[u32; 3]>,
}

#[derive(Debug, Clone, Copy)]
struct IndexedFace {
    face: usize,
    min: f64,
    max: f64,
}

impl FaceIndex {
    /// Indexes the transformed faces of a mesh using the given bucket count.
    pub fn from_mesh(mesh: &Mesh, bucket_count: usize) -> Self {
        let vertices = mesh.transformed_vertices();
        let faces = mesh.faces().to_vec();
        let bounds = mesh.bounds();

        let bucket_count = bucket_count.max(1);
        let extent = if bounds.is_empty() { 0.0 } else { bounds.size().z };
        let bucket_height = (extent / bucket_count as f64).max(f64::EPSILON);
        let start_height = if bounds.is_empty() { 0.0 } else { bounds.min.z };
        let end_height = start_height + extent;

        let mut buckets = vec![Vec::new(); bucket_count];
        for (face, &indices) in faces.iter().enumerate() {
            let (min, max) = face_bounds(&vertices, indices);
            let first = bucket_of(start_height, bucket_height, bucket_count, min);
            let last = bucket_of(start_height, bucket_height, bucket_count, max);
            for bucket in buckets[first..=last].iter_mut() {
                bucket.push(IndexedFace { face, min, max });
            }
        }

        for bucket in buckets.iter_mut() {
            bucket.sort_by_key(|x| (OrderedFloat(x.min), OrderedFloat(x.max)));
        }

        Self {
            start_height,
            end_height,
            bucket_height,
            buckets,
            vertices,
            faces,
        }
    }

    pub fn vertices(&self) -> &[Pos] {
        &self.vertices
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Faces whose Z interval contains the height, in order of their lowest
    /// point.
    pub fn candidates(&self, height: f64) -> impl Iterator<Item = usize> + '_ {
        let count = self.buckets.len();
        let bucket = (height >= self.start_height && height <= self.end_height)
            .then(|| &self.buckets[bucket_of(self.start_height, self.bucket_height, count, height)])
            .map(|x| &x[..x.partition_point(|face| face.min <= height)])
            .unwrap_or_default();

        (bucket.iter())
            .filter(move |x| x.max >= height)
            .map(|x| x.face)
    }

    /// Checks if any vertex of a candidate face lies exactly on the plane.
    pub fn touches_vertex(&self, height: f64) -> bool {
        self.candidates(height).any(|face| {
            (self.faces[face].iter()).any(|&x| self.vertices[x as usize].z == height)
        })
    }

    /// Height difference between the lowest and highest vertex of a face.
    pub fn extent(&self, face: usize) -> f64 {
        let (min, max) = face_bounds(&self.vertices, self.faces[face]);
        max - min
    }

    /// Lazily intersects every candidate face with the plane.
    pub fn segments(&self, height: f64) -> SegmentIter<'_> {
        SegmentIter {
            index: self,
            candidates: Box::new(self.candidates(height)),
            height,
            cut: Vec::new(),
        }
    }

    pub fn intersect_face(&self, face: usize, height: f64) -> Option<Segment> {
        intersect_face(&self.vertices, self.faces[face], height)
    }
}

/// Pulls segments out of the candidate faces of one plane until they are
/// exhausted, remembering which faces they came from.
pub struct SegmentIter<'a> {
    index: &'a FaceIndex,
    candidates: Box<dyn Iterator<Item = usize> + 'a>,
    height: f64,
    cut: Vec<usize>,
}

impl SegmentIter<'_> {
    /// Faces that produced a segment so far.
    pub fn cut(&self) -> &[usize] {
        &self.cut
    }
}

impl Iterator for SegmentIter<'_> {
    type Item = Segment;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let face = self.candidates.next()?;
            if let Some(segment) = self.index.intersect_face(face, self.height) {
                self.cut.push(face);
                return Some(segment);
            }
        }
    }
}

fn bucket_of(start: f64, height: f64, count: usize, z: f64) -> usize {
    (((z - start) / height).max(0.0) as usize).min(count - 1)
}

/// Gets the min and max heights of the vertices of a face.
fn face_bounds(vertices: &[Pos], face: [u32; 3]) -> (f64, f64) {
    let heights = face.map(|x| vertices[x as usize].z);
    (
        heights[0].min(heights[1]).min(heights[2]),
        heights[0].max(heights[1]).max(heights[2]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{PrimitiveSolid, SolidKind};

    fn sphere() -> Mesh {
        PrimitiveSolid::new(SolidKind::Sphere {
            radius: 10.0,
            segments: 20,
            rings: 9,
        })
        .build()
    }

    #[test]
    fn candidates_match_linear_scan() {
        let mesh = sphere();
        let index = FaceIndex::from_mesh(&mesh, 16);
        let vertices = mesh.transformed_vertices();

        for height in [-9.95, -3.3, 0.1, 4.2, 9.99] {
            let mut expected = (0..mesh.face_count())
                .filter(|&face| {
                    let (min, max) = face_bounds(&vertices, mesh.face(face));
                    min <= height && max >= height
                })
                .collect::<Vec<_>>();
            let mut found = index.candidates(height).collect::<Vec<_>>();

            expected.sort();
            found.sort();
            assert_eq!(found, expected);
        }

        assert_eq!(index.candidates(20.0).count(), 0);
        assert_eq!(index.candidates(-20.0).count(), 0);
    }

    #[test]
    fn segments_match_mesh_intersection() {
        let mesh = sphere();
        let index = FaceIndex::from_mesh(&mesh, 8);
        assert_eq!(index.segments(1.5).count(), mesh.intersect_plane(1.5).len());
        // One band of quads, two triangles each.
        assert_eq!(index.segments(1.5).count(), 40);

        let mut segments = index.segments(1.5);
        segments.by_ref().for_each(drop);
        assert_eq!(segments.cut().len(), 40);
        assert!(segments.cut().iter().all(|&x| index.extent(x) > 0.0));
    }

    #[test]
    fn detects_vertices_on_plane() {
        let mesh = PrimitiveSolid::new(SolidKind::Cube {
            size: Pos::repeat(10.0),
        })
        .build();
        let index = FaceIndex::from_mesh(&mesh, 4);

        assert!(index.touches_vertex(10.0));
        assert!(index.touches_vertex(0.0));
        assert!(!index.touches_vertex(5.0));
        assert_eq!(index.candidates(10.0).count(), 10);
    }
}
