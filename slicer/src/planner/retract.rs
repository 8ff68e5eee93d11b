use common::{config::SliceConfig, math::Point};
use ordered_float::OrderedFloat;

use crate::{
    geometry::{
        polygon::{region_contains, segment_crosses},
        Polygon,
    },
    layer::Island,
};

/// What a travel can bump into on the current layer.
#[derive(Clone, Copy, Default)]
pub struct TravelScope<'a> {
    /// Every loop of the layer.
    pub outline: &'a [Polygon],
    /// Island the head is working on, for combing.
    pub island: Option<&'a Island>,
}

/// How a travel between two points is carried out.
#[derive(Debug, Clone, PartialEq)]
pub enum TravelPlan {
    /// Straight move without retracting.
    Direct,
    /// Straight move bracketed by a retract and an unretract.
    Retracted,
    /// Unretracted move through the listed points, ending at the target.
    Combed(Vec<Point>),
}

/// Decides how to travel from `from` to `to`. Nothing is retracted before
/// the first extrusion of the job or when retraction is off.
pub fn plan_travel(
    config: &SliceConfig,
    scope: &TravelScope,
    extruded: bool,
    from: &Point,
    to: &Point,
) -> TravelPlan {
    let distance = (to - from).norm();
    let wants_retract = extruded
        && config.retraction_amount > 0.0
        && (distance > config.retraction_min_travel || segment_crosses(scope.outline, from, to));
    if !wants_retract {
        return TravelPlan::Direct;
    }

    if config.combing {
        let route = scope.island.and_then(|island| comb(island, from, to));
        if let Some(route) = route.filter(|x| path_length(from, x) <= config.retraction_min_travel) {
            return TravelPlan::Combed(route);
        }
    }

    TravelPlan::Retracted
}

/// Route from `from` to `to` that stays inside the island, following its
/// outer perimeter where the straight line would leave it. The returned
/// points exclude `from` and end with `to`.
pub fn comb(island: &Island, from: &Point, to: &Point) -> Option<Vec<Point>> {
    let outline = island.outline.as_slice();
    if !region_contains(outline, from) || !region_contains(outline, to) {
        return None;
    }
    if !segment_crosses(outline, from, to) {
        return Some(vec![*to]);
    }

    let boundary = (island.perimeters.iter())
        .filter_map(|x| x.closest_vertex(from).map(|(_, d)| (x, d)))
        .min_by_key(|x| OrderedFloat(x.1))?
        .0;
    let (start, _) = boundary.closest_vertex(from)?;
    let (end, _) = boundary.closest_vertex(to)?;

    let points = boundary.points();
    let n = points.len();
    let walk = |step: usize| {
        let mut out = vec![points[start]];
        let mut i = start;
        while i != end {
            i = (i + step) % n;
            out.push(points[i]);
        }
        out.push(*to);
        out
    };

    let (forward, backward) = (walk(1), walk(n - 1));
    let mut route = if path_length(from, &forward) <= path_length(from, &backward) {
        forward
    } else {
        backward
    };
    route.dedup();

    let mut last = *from;
    for point in route.iter() {
        if segment_crosses(outline, &last, point) {
            return None;
        }
        last = *point;
    }
    Some(route)
}

fn path_length(from: &Point, route: &[Point]) -> f64 {
    let mut last = *from;
    let mut length = 0.0;
    for point in route {
        length += (point - last).norm();
        last = *point;
    }
    length
}
