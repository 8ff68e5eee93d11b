use common::math::Point;
use ordered_float::OrderedFloat;

use crate::{
    geometry::{Polygon, Polyline},
    layer::Island,
};

/// Vertices closer to the head than the best one by less than this count as
/// a tie.
const TIE: f64 = 1e-9;

/// Start vertex of a closed loop: the vertex nearest to the head, preferring
/// concave corners among equally near vertices so seams are hidden.
pub fn loop_start(polygon: &Polygon, head: &Point) -> usize {
    let Some((best, distance)) = polygon.closest_vertex(head) else {
        return 0;
    };

    (polygon.points().iter().enumerate())
        .filter(|(_, x)| (*x - head).norm() <= distance + TIE)
        .map(|(i, _)| i)
        .find(|&i| polygon.is_concave(i))
        .unwrap_or(best)
}

/// Visits closed loops nearest first. Returns each loop with its start
/// vertex; the head ends a loop where it started it.
pub fn order_loops<'a>(
    loops: impl IntoIterator<Item = &'a Polygon>,
    mut head: Point,
) -> Vec<(&'a Polygon, usize)> {
    let mut pending = loops.into_iter().filter(|x| x.len() >= 3).collect::<Vec<_>>();
    let mut out = Vec::with_capacity(pending.len());

    while !pending.is_empty() {
        let (index, start, _) = (pending.iter().enumerate())
            .map(|(i, polygon)| {
                let start = loop_start(polygon, &head);
                (i, start, (polygon.points()[start] - head).norm())
            })
            .fold((0, 0, f64::MAX), |best, x| if x.2 < best.2 { x } else { best });

        let polygon = pending.remove(index);
        head = polygon.points()[start];
        out.push((polygon, start));
    }

    out
}

/// Visits open paths nearest first, entering each from whichever end is
/// closer. Returns each path with whether it is walked backwards.
pub fn order_lines(lines: &[Polyline], mut head: Point) -> Vec<(&Polyline, bool)> {
    let mut pending = lines.iter().filter(|x| x.len() >= 2).collect::<Vec<_>>();
    let mut out = Vec::with_capacity(pending.len());

    while !pending.is_empty() {
        let (index, reversed, _) = (pending.iter().enumerate())
            .flat_map(|(i, line)| {
                let first = line[0];
                let last = line[line.len() - 1];
                [(i, false, (first - head).norm()), (i, true, (last - head).norm())]
            })
            .fold((0, false, f64::MAX), |best, x| if x.2 < best.2 { x } else { best });

        let line = pending.remove(index);
        head = if reversed { line[0] } else { line[line.len() - 1] };
        out.push((line, reversed));
    }

    out
}

/// Visits islands nearest first, measured to the closest outline vertex.
pub fn order_islands(islands: &[Island], head: Point) -> Vec<&Island> {
    let mut pending = islands.iter().collect::<Vec<_>>();
    let mut out = Vec::with_capacity(pending.len());
    let mut head = head;

    while !pending.is_empty() {
        let (index, point, _) = (pending.iter().enumerate())
            .filter_map(|(i, island)| {
                let (vertex, distance) = (island.outline.iter())
                    .filter_map(|x| x.closest_vertex(&head).map(|(v, d)| (x.points()[v], d)))
                    .min_by_key(|x| OrderedFloat(x.1))?;
                Some((i, vertex, distance))
            })
            .fold((0, head, f64::MAX), |best, x| if x.2 < best.2 { x } else { best });

        head = point;
        out.push(pending.remove(index));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::polygon::tests::square;

    #[test]
    fn nearest_vertex_start() {
        let polygon = square((0.0, 0.0), 10.0);
        assert_eq!(loop_start(&polygon, &Point::new(11.0, 9.0)), 2);
        assert_eq!(loop_start(&polygon, &Point::new(-1.0, 0.5)), 0);
    }

    #[test]
    fn ties_prefer_concave_corners() {
        // An L shape; the head is as far from the convex corner (10, 0) as
        // from the concave corner (5, 5).
        let polygon = Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 5.0),
            Point::new(5.0, 5.0),
            Point::new(5.0, 10.0),
            Point::new(0.0, 10.0),
        ]);
        assert!(polygon.is_concave(3));
        assert_eq!(loop_start(&polygon, &Point::new(10.0, 3.75)), 2);
        assert_eq!(loop_start(&polygon, &Point::new(7.5, 2.5)), 3);
    }

    #[test]
    fn loops_nearest_first() {
        let loops = [
            square((20.0, 0.0), 5.0),
            square((0.0, 0.0), 5.0),
            square((10.0, 0.0), 5.0),
        ];
        let order = order_loops(&loops, Point::new(-1.0, -1.0));
        let xs = order.iter().map(|(x, _)| x.points()[0].x).collect::<Vec<_>>();
        assert_eq!(xs, vec![0.0, 10.0, 20.0]);
        assert_eq!(order[0].1, 0);
    }

    #[test]
    fn lines_alternate_direction() {
        let lines = vec![
            vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)],
            vec![Point::new(0.0, 1.0), Point::new(10.0, 1.0)],
            vec![Point::new(0.0, 2.0), Point::new(10.0, 2.0)],
        ];
        let order = order_lines(&lines, Point::new(-1.0, 0.0));
        let reversed = order.iter().map(|x| x.1).collect::<Vec<_>>();
        assert_eq!(reversed, vec![false, true, false]);
    }
}
