use common::math::{cross2, perp, rotate, Point};

use super::{
    boolean::{normalize, FillRule},
    polygon::Polygon,
};

/// Offsets an oriented loop set by `distance`: positive values inset
/// (shrink the filled region) and negative values outset it. Corners that
/// open a gap are filled with arcs whose chord error is at most
/// `precision`. Parts that collapse are removed, so the result may be
/// empty.
pub fn offset(loops: &[Polygon], distance: f64, precision: f64) -> Vec<Polygon> {
    if distance == 0.0 {
        return loops.to_vec();
    }

    let raw = (loops.iter())
        .filter(|x| x.len() >= 3)
        .map(|x| offset_loop(x, distance, precision))
        .collect::<Vec<_>>();

    normalize(&raw, FillRule::Positive)
}

/// Shifts every edge to its left by `distance` and joins consecutive edges.
/// The result may self-intersect; the reversed parts it creates wind
/// negatively and are dropped by the positive fill rule.
fn offset_loop(polygon: &Polygon, distance: f64, precision: f64) -> Polygon {
    let points = polygon.points();
    let n = points.len();

    let normals = (0..n)
        .map(|i| {
            let direction = points[(i + 1) % n] - points[i];
            perp(&direction).try_normalize(0.0).unwrap_or_else(Point::zeros)
        })
        .collect::<Vec<_>>();

    let mut out = Vec::with_capacity(n * 2);
    for i in 0..n {
        let vertex = points[i];
        let (before, after) = (normals[(i + n - 1) % n], normals[i]);
        let incoming = vertex - points[(i + n - 1) % n];
        let outgoing = points[(i + 1) % n] - vertex;

        let start = vertex + before * distance;
        let end = vertex + after * distance;
        out.push(start);

        // Turning away from the offset side leaves a gap to fill with an arc.
        if cross2(&incoming, &outgoing) * distance < 0.0 {
            out.extend(arc(vertex, before * distance, after * distance, precision));
        }

        out.push(end);
    }

    out.dedup_by(|a, b| (*a - *b).norm() < 1e-12);
    Polygon::new(out)
}

/// Interior points of the shorter arc around `center` from `center + from`
/// to `center + to`.
fn arc(center: Point, from: Point, to: Point, precision: f64) -> Vec<Point> {
    let radius = from.norm();
    if radius <= 0.0 {
        return Vec::new();
    }

    let sweep = cross2(&from, &to).atan2(from.dot(&to));
    let step = if precision < radius {
        2.0 * (1.0 - precision / radius).acos()
    } else {
        std::f64::consts::FRAC_PI_2
    };

    let count = (sweep.abs() / step).ceil() as usize;
    (1..count)
        .map(|i| center + rotate(&from, sweep * i as f64 / count as f64))
        .collect()
}
