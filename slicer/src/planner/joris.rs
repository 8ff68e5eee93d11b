use common::math::Pos;

use crate::{
    error::{GeometryError, PlanError, SliceError},
    geometry::Polygon,
    layer::LayerGeometry,
};

/// The single outer wall a spiral layer is printed as. `None` when the
/// layer is empty.
pub fn spiral_loop(layer: &LayerGeometry) -> Result<Option<&Polygon>, SliceError> {
    if layer.outline.is_empty() {
        return Ok(None);
    }

    let outer = (layer.islands.iter())
        .flat_map(|x| x.perimeters.iter())
        .filter(|x| x.is_ccw())
        .collect::<Vec<_>>();

    match outer.as_slice() {
        [] => Err(GeometryError::EmptyOffset { layer: layer.index }.into()),
        [polygon] => Ok(Some(polygon)),
        _ => Err(PlanError::MultipleJorisComponents {
            layer: layer.index,
            components: outer.len(),
        }
        .into()),
    }
}

/// Points of one revolution around the loop from vertex `start`, rising
/// linearly with the walked length from `from_z` to `to_z`. The start
/// vertex is not included and the last point returns above it.
pub fn helix(polygon: &Polygon, start: usize, from_z: f64, to_z: f64) -> Vec<Pos> {
    let points = polygon.points();
    let n = points.len();
    let total = polygon.perimeter();
    if n == 0 || total <= 0.0 {
        return Vec::new();
    }

    let mut walked = 0.0;
    let mut last = points[start];
    (1..=n)
        .map(|i| {
            let point = points[(start + i) % n];
            walked += (point - last).norm();
            last = point;

            let z = if i == n {
                to_z
            } else {
                from_z + (to_z - from_z) * walked / total
            };
            Pos::new(point.x, point.y, z)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        geometry::polygon::tests::square,
        layer::{Island, LayerGeometry},
    };

    fn layer(perimeters: Vec<Polygon>) -> LayerGeometry {
        LayerGeometry {
            index: 4,
            outline: vec![square((0.0, 0.0), 10.0)],
            islands: vec![Island {
                perimeters,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn rises_over_one_revolution() {
        let polygon = square((0.0, 0.0), 10.0);
        let points = helix(&polygon, 1, 1.0, 2.0);

        assert_eq!(points.len(), 4);
        let zs = points.iter().map(|x| x.z).collect::<Vec<_>>();
        assert_eq!(zs, vec![1.25, 1.5, 1.75, 2.0]);
        assert_eq!((points[3].x, points[3].y), (10.0, 0.0));
    }

    #[test]
    fn one_outer_wall_required() {
        let wall = square((0.2, 0.2), 9.6);
        let hole = square((4.0, 4.0), 2.0).reversed();

        let single = layer(vec![wall.clone(), hole]);
        assert_eq!(spiral_loop(&single).unwrap(), Some(&wall));

        let double = layer(vec![wall.clone(), square((20.0, 0.0), 5.0)]);
        assert!(matches!(
            spiral_loop(&double),
            Err(SliceError::Plan(PlanError::MultipleJorisComponents { layer: 4, components: 2 }))
        ));

        assert!(matches!(
            spiral_loop(&layer(Vec::new())),
            Err(SliceError::Geometry(GeometryError::EmptyOffset { layer: 4 }))
        ));
        assert_eq!(spiral_loop(&LayerGeometry::default()).unwrap(), None);
    }
}
