use std::collections::HashMap;

use common::math::Point;

/// Spatial hash merging points closer than a tolerance. Each distinct point
/// gets a stable id, the first point inserted for an id is its
/// representative.
pub struct PointIndex {
    tolerance: f64,
    cells: HashMap<(i64, i64), Vec<usize>>,
    points: Vec<Point>,
}

impl PointIndex {
    pub fn new(tolerance: f64) -> Self {
        Self {
            tolerance: tolerance.max(f64::EPSILON),
            cells: HashMap::new(),
            points: Vec::new(),
        }
    }

    fn cell(&self, point: &Point) -> (i64, i64) {
        (
            (point.x / self.tolerance).floor() as i64,
            (point.y / self.tolerance).floor() as i64,
        )
    }

    /// Finds a stored point within the tolerance.
    pub fn find(&self, point: &Point) -> Option<usize> {
        let (cx, cy) = self.cell(point);
        let mut best = None::<(usize, f64)>;
        for x in cx - 1..=cx + 1 {
            for y in cy - 1..=cy + 1 {
                let Some(ids) = self.cells.get(&(x, y)) else {
                    continue;
                };

                for &id in ids {
                    let distance = (self.points[id] - point).norm();
                    if distance <= self.tolerance && best.map_or(true, |x| distance < x.1) {
                        best = Some((id, distance));
                    }
                }
            }
        }

        best.map(|x| x.0)
    }

    /// Returns the id of a stored point within the tolerance, inserting the
    /// point if there is none.
    pub fn insert(&mut self, point: Point) -> usize {
        if let Some(id) = self.find(&point) {
            return id;
        }

        let id = self.points.len();
        let cell = self.cell(&point);
        self.points.push(point);
        self.cells.entry(cell).or_default().push(id);
        id
    }

    pub fn point(&self, id: usize) -> Point {
        self.points[id]
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_within_tolerance() {
        let mut index = PointIndex::new(0.1);
        let a = index.insert(Point::new(1.0, 1.0));
        let b = index.insert(Point::new(1.05, 0.98));
        let c = index.insert(Point::new(1.2, 1.0));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(index.len(), 2);
        assert_eq!(index.point(b), Point::new(1.0, 1.0));
        assert_eq!(index.find(&Point::new(5.0, 5.0)), None);
    }
}
