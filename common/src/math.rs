use nalgebra::{Vector2, Vector3};

pub type Pos = Vector3<f64>;
pub type Point = Vector2<f64>;

/// Default tolerance for coordinate equality, in mm.
pub const EPSILON: f64 = 1e-6;

pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= EPSILON
}

pub fn points_eq(a: &Point, b: &Point) -> bool {
    approx_eq(a.x, b.x) && approx_eq(a.y, b.y)
}

pub fn positions_eq(a: &Pos, b: &Pos) -> bool {
    approx_eq(a.x, b.x) && approx_eq(a.y, b.y) && approx_eq(a.z, b.z)
}

/// Z component of the cross product of two planar vectors.
pub fn cross2(a: &Point, b: &Point) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Left hand normal of a planar direction, not normalized.
pub fn perp(a: &Point) -> Point {
    Point::new(-a.y, a.x)
}

pub fn rotate(point: &Point, angle: f64) -> Point {
    let (sin, cos) = angle.sin_cos();
    Point::new(point.x * cos - point.y * sin, point.x * sin + point.y * cos)
}

/// Axis aligned box, `min <= max` component-wise once any point was added.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Pos,
    pub max: Pos,
}

impl BoundingBox {
    pub fn empty() -> Self {
        Self {
            min: Pos::repeat(f64::MAX),
            max: Pos::repeat(f64::MIN),
        }
    }

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Pos>) -> Self {
        let mut bounds = Self::empty();
        points.into_iter().for_each(|x| bounds.extend(x));
        bounds
    }

    pub fn extend(&mut self, point: &Pos) {
        self.min = self.min.inf(point);
        self.max = self.max.sup(point);
    }

    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn size(&self) -> Pos {
        if self.is_empty() {
            return Pos::zeros();
        }

        self.max - self.min
    }

    pub fn center(&self) -> Pos {
        (self.min + self.max) / 2.0
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_box_grows() {
        let points = [Pos::new(1.0, -2.0, 3.0), Pos::new(-1.0, 4.0, 0.0)];
        let bounds = BoundingBox::from_points(&points);

        assert_eq!(bounds.min, Pos::new(-1.0, -2.0, 0.0));
        assert_eq!(bounds.max, Pos::new(1.0, 4.0, 3.0));
        assert_eq!(bounds.size(), Pos::new(2.0, 6.0, 3.0));
        assert!(BoundingBox::empty().is_empty());
    }

    #[test]
    fn planar_helpers() {
        let x = Point::new(1.0, 0.0);
        let y = Point::new(0.0, 1.0);

        assert_eq!(cross2(&x, &y), 1.0);
        assert_eq!(perp(&x), y);
        assert!(points_eq(&rotate(&x, std::f64::consts::FRAC_PI_2), &y));
    }
}
