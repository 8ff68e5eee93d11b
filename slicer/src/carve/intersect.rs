use common::math::{Point, Pos};

/// Intersection of one face with a slicing plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub a: Point,
    pub b: Point,
}

impl Segment {
    pub fn new(a: Point, b: Point) -> Self {
        Self { a, b }
    }

    pub fn length(&self) -> f64 {
        (self.b - self.a).norm()
    }
}

/// Intersects a plane with a triangle.
///
/// A face lying in the plane gives nothing. An edge lying in the plane is
/// returned only by the face that rises above it, so a shared edge is not
/// reported twice. A single vertex on the plane gives a segment only when the
/// other two vertices are on opposite sides.
pub fn intersect_face(vertices: &[Pos], face: [u32; 3], height: f64) -> Option<Segment> {
    let v = face.map(|x| vertices[x as usize]);

    // By subtracting the height from each vertex z coord, an edge crosses the
    // plane if one end is above and one is below.
    let d = v.map(|x| x.z - height);
    let on_plane = d.map(|x| x == 0.0);

    let crossing = |i: usize, j: usize| {
        let t = d[i] / (d[i] - d[j]);
        (v[i] + (v[j] - v[i]) * t).xy()
    };

    match on_plane.iter().filter(|&&x| x).count() {
        3 => None,
        2 => {
            let other = (0..3).find(|&i| !on_plane[i])?;
            let (a, b) = ((other + 1) % 3, (other + 2) % 3);
            (d[other] > 0.0).then(|| Segment::new(v[a].xy(), v[b].xy()))
        }
        1 => {
            let on = (0..3).find(|&i| on_plane[i])?;
            let (a, b) = ((on + 1) % 3, (on + 2) % 3);
            (d[a] * d[b] < 0.0).then(|| Segment::new(v[on].xy(), crossing(a, b)))
        }
        _ => {
            let mut points = [(0, 1), (1, 2), (2, 0)]
                .into_iter()
                .filter(|&(i, j)| (d[i] > 0.0) != (d[j] > 0.0))
                .map(|(i, j)| crossing(i, j));
            let (a, b) = (points.next()?, points.next()?);
            Some(Segment::new(a, b))
        }
    }
}
