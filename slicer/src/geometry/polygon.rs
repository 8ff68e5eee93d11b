use common::math::{cross2, Point};
use ordered_float::OrderedFloat;

/// Open path, used for fill lines.
pub type Polyline = Vec<Point>;

/// Closed planar loop. Counter-clockwise loops bound filled regions and
/// clockwise loops are holes, so the filled side is always on the left.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Polygon {
    points: Vec<Point>,
}

impl Polygon {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn into_points(self) -> Vec<Point> {
        self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Iterates over the edges, including the closing one.
    pub fn edges(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        let n = self.points.len();
        (0..n).map(move |i| (self.points[i], self.points[(i + 1) % n]))
    }

    /// Shoelace area, positive for counter-clockwise loops.
    pub fn signed_area(&self) -> f64 {
        self.edges().map(|(a, b)| cross2(&a, &b)).sum::<f64>() / 2.0
    }

    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    pub fn is_ccw(&self) -> bool {
        self.signed_area() > 0.0
    }

    pub fn perimeter(&self) -> f64 {
        self.edges().map(|(a, b)| (b - a).norm()).sum()
    }

    pub fn reverse(&mut self) {
        self.points.reverse();
    }

    pub fn reversed(mut self) -> Self {
        self.reverse();
        self
    }

    /// Reverses the loop if needed so it is counter-clockwise when `ccw` is
    /// set and clockwise otherwise.
    pub fn orient(&mut self, ccw: bool) {
        if self.is_ccw() != ccw {
            self.reverse();
        }
    }

    pub fn translate(&mut self, offset: Point) {
        self.points.iter_mut().for_each(|x| *x += offset);
    }

    /// Minimum and maximum corner.
    pub fn bounds(&self) -> (Point, Point) {
        let mut min = Point::repeat(f64::MAX);
        let mut max = Point::repeat(f64::MIN);
        for point in self.points.iter() {
            min = min.inf(point);
            max = max.sup(point);
        }
        (min, max)
    }

    /// Even-odd point containment. Points exactly on an edge may go either way.
    pub fn contains(&self, point: &Point) -> bool {
        let mut inside = false;
        for (a, b) in self.edges() {
            if (a.y > point.y) != (b.y > point.y) {
                let x = a.x + (point.y - a.y) / (b.y - a.y) * (b.x - a.x);
                if point.x < x {
                    inside = !inside;
                }
            }
        }
        inside
    }

    /// Number of times the loop winds counter-clockwise around the point.
    pub fn winding_number(&self, point: &Point) -> i32 {
        let mut winding = 0;
        for (a, b) in self.edges() {
            let side = cross2(&(b - a), &(point - a));
            if a.y <= point.y {
                if b.y > point.y && side > 0.0 {
                    winding += 1;
                }
            } else if b.y <= point.y && side < 0.0 {
                winding -= 1;
            }
        }
        winding
    }

    /// Index of the vertex closest to the point along with its distance.
    pub fn closest_vertex(&self, point: &Point) -> Option<(usize, f64)> {
        (self.points.iter().enumerate())
            .map(|(i, x)| (i, (x - point).norm()))
            .min_by_key(|x| OrderedFloat(x.1))
    }

    /// Checks if the corner at a vertex turns away from the filled side.
    pub fn is_concave(&self, index: usize) -> bool {
        let n = self.points.len();
        let prev = self.points[(index + n - 1) % n];
        let (point, next) = (self.points[index], self.points[(index + 1) % n]);
        cross2(&(point - prev), &(next - point)) < 0.0
    }

    /// Removes repeated vertices and vertices within `tolerance` of the line
    /// through their neighbours.
    pub fn simplify(&mut self, tolerance: f64) {
        let mut changed = true;
        while changed && self.points.len() >= 3 {
            changed = false;
            let mut i = 0;
            while i < self.points.len() && self.points.len() >= 3 {
                let n = self.points.len();
                let prev = self.points[(i + n - 1) % n];
                let (point, next) = (self.points[i], self.points[(i + 1) % n]);

                let base = next - prev;
                let length = base.norm();
                let redundant = if length <= tolerance {
                    (point - prev).norm() <= tolerance
                } else {
                    let distance = cross2(&base, &(point - prev)).abs() / length;
                    let along = (point - prev).dot(&base) / length;
                    distance <= tolerance && along >= -tolerance && along <= length + tolerance
                };

                if redundant {
                    self.points.remove(i);
                    changed = true;
                } else {
                    i += 1;
                }
            }
        }

        if self.points.len() < 3 {
            self.points.clear();
        }
    }
}

/// Sum of the signed areas of a loop set.
pub fn region_area(loops: &[Polygon]) -> f64 {
    loops.iter().map(Polygon::signed_area).sum()
}

/// Checks if a point is inside an oriented loop set, i.e. if the loops wind
/// around it a positive number of times.
pub fn region_contains(loops: &[Polygon], point: &Point) -> bool {
    loops.iter().map(|x| x.winding_number(point)).sum::<i32>() > 0
}

/// Bounds of a whole loop set.
pub fn region_bounds(loops: &[Polygon]) -> (Point, Point) {
    let mut min = Point::repeat(f64::MAX);
    let mut max = Point::repeat(f64::MIN);
    for polygon in loops {
        let (lo, hi) = polygon.bounds();
        min = min.inf(&lo);
        max = max.sup(&hi);
    }
    (min, max)
}

/// Parameters along `a -> b` where the segment properly crosses an edge of
/// the loops. Touching at either end and collinear overlaps do not count.
pub fn segment_crossings(loops: &[Polygon], a: &Point, b: &Point) -> Vec<f64> {
    let r = b - a;
    let mut out = Vec::new();
    for (p, q) in loops.iter().flat_map(|x| x.edges()) {
        let s = q - p;
        let denom = cross2(&r, &s);
        if denom.abs() <= f64::EPSILON * r.norm() * s.norm() {
            continue;
        }

        let pa = p - a;
        let t = cross2(&pa, &s) / denom;
        let u = cross2(&pa, &r) / denom;
        if t > 1e-9 && t < 1.0 - 1e-9 && (0.0..=1.0).contains(&u) {
            out.push(t);
        }
    }
    out
}

pub fn segment_crosses(loops: &[Polygon], a: &Point, b: &Point) -> bool {
    !segment_crossings(loops, a, b).is_empty()
}

/// Orients loops by nesting depth: loops inside an even number of other
/// loops become counter-clockwise outer boundaries and the rest clockwise
/// holes.
pub fn orient_by_nesting(loops: &mut [Polygon]) {
    let depths = (0..loops.len())
        .map(|i| {
            let Some(probe) = loops[i].points.first() else {
                return 0;
            };
            (loops.iter().enumerate())
                .filter(|(j, other)| *j != i && other.contains(probe))
                .count()
        })
        .collect::<Vec<_>>();

    for (polygon, depth) in loops.iter_mut().zip(depths) {
        polygon.orient(depth % 2 == 0);
    }
}

/// Splits an oriented loop set into islands, each an outer loop followed by
/// the holes directly inside it.
pub fn group_islands(loops: &[Polygon]) -> Vec<Vec<Polygon>> {
    let outers = (0..loops.len())
        .filter(|&i| loops[i].is_ccw())
        .collect::<Vec<_>>();
    let mut islands = outers
        .iter()
        .map(|&i| vec![loops[i].clone()])
        .collect::<Vec<_>>();

    for hole in loops.iter().filter(|x| !x.is_ccw() && !x.is_empty()) {
        let probe = hole.points[0];
        let parent = (outers.iter().enumerate())
            .filter(|(_, &outer)| loops[outer].contains(&probe))
            .min_by_key(|x| OrderedFloat(loops[*x.1].area()));

        if let Some((island, _)) = parent {
            islands[island].push(hole.clone());
        }
    }

    islands
}

#[cfg(test)]
pub(crate) mod tests {
    use proptest::prelude::*;

    use super::*;

    pub fn square(min: (f64, f64), size: f64) -> Polygon {
        let (x, y) = min;
        Polygon::new(vec![
            Point::new(x, y),
            Point::new(x + size, y),
            Point::new(x + size, y + size),
            Point::new(x, y + size),
        ])
    }

    pub fn regular(center: Point, radius: f64, sides: usize) -> Polygon {
        Polygon::new(
            (0..sides)
                .map(|i| {
                    let angle = std::f64::consts::TAU * i as f64 / sides as f64;
                    center + Point::new(angle.cos(), angle.sin()) * radius
                })
                .collect(),
        )
    }

    #[test]
    fn square_area_and_containment() {
        let square = square((0.0, 0.0), 10.0);
        assert_eq!(square.signed_area(), 100.0);
        assert!(square.is_ccw());
        assert!(square.contains(&Point::new(5.0, 5.0)));
        assert!(!square.contains(&Point::new(15.0, 5.0)));
        assert_eq!(square.winding_number(&Point::new(5.0, 5.0)), 1);
        assert_eq!(square.clone().reversed().winding_number(&Point::new(5.0, 5.0)), -1);
        assert_eq!(square.perimeter(), 40.0);
    }

    #[test]
    fn simplify_drops_collinear() {
        let mut polygon = Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(5.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ]);
        polygon.simplify(1e-9);
        assert_eq!(polygon.len(), 4);
        assert_eq!(polygon.area(), 100.0);
    }

    #[test]
    fn nesting_orientation_and_islands() {
        let mut loops = vec![
            square((0.0, 0.0), 10.0).reversed(),
            square((2.0, 2.0), 6.0),
            square((20.0, 0.0), 5.0).reversed(),
        ];
        orient_by_nesting(&mut loops);

        assert!(loops[0].is_ccw());
        assert!(!loops[1].is_ccw());
        assert!(loops[2].is_ccw());
        assert_eq!(region_area(&loops), 100.0 - 36.0 + 25.0);

        let islands = group_islands(&loops);
        assert_eq!(islands.len(), 2);
        assert_eq!(islands[0].len(), 2);
        assert_eq!(islands[1].len(), 1);

        assert!(region_contains(&loops, &Point::new(1.0, 1.0)));
        assert!(!region_contains(&loops, &Point::new(5.0, 5.0)));
    }

    proptest! {
        #[test]
        fn reversing_negates_area(radius in 0.5f64..50.0, sides in 3usize..64, x in -100f64..100.0) {
            let polygon = regular(Point::new(x, -x), radius, sides);
            let area = polygon.signed_area();
            prop_assert!(area > 0.0);
            prop_assert!((polygon.reversed().signed_area() + area).abs() < 1e-9 * area.max(1.0));
        }

        #[test]
        fn regular_polygon_contains_center(radius in 0.5f64..50.0, sides in 3usize..64) {
            let polygon = regular(Point::new(1.0, 2.0), radius, sides);
            prop_assert!(polygon.contains(&Point::new(1.0, 2.0)));
            prop_assert_eq!(polygon.winding_number(&Point::new(1.0, 2.0)), 1);
        }
    }
}
