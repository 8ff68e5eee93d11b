use std::f64::consts::{FRAC_PI_2, FRAC_PI_3};

use common::{
    config::InfillPattern,
    math::{rotate, Point},
};
use ordered_float::OrderedFloat;
use rand::{rngs::StdRng, Rng, SeedableRng};

use super::{
    point_index::PointIndex,
    polygon::{
        region_area, region_bounds, region_contains, segment_crosses, segment_crossings, Polygon,
        Polyline,
    },
};

/// Darts rejected in a row before random fill gives up.
const MAX_REJECTS: usize = 100;

#[derive(Debug, Clone, Copy)]
pub struct FillSettings {
    pub pattern: InfillPattern,
    /// Base line direction in radians.
    pub angle: f64,
    /// Distance between parallel lines, or the minimum point spacing of
    /// random fill.
    pub spacing: f64,
    pub zigzag: bool,
    pub seed: u64,
}

impl FillSettings {
    pub fn linear(angle: f64, spacing: f64) -> Self {
        Self {
            pattern: InfillPattern::Linear,
            angle,
            spacing,
            zigzag: false,
            seed: 0,
        }
    }
}

/// Fills an oriented loop set with the configured pattern.
pub fn fill(region: &[Polygon], settings: &FillSettings) -> Vec<Polyline> {
    if region.is_empty() || !(settings.spacing > 0.0) {
        return Vec::new();
    }

    let spacing = settings.spacing;
    let families = match settings.pattern {
        InfillPattern::Linear => vec![(settings.angle, spacing)],
        InfillPattern::Rect => vec![
            (settings.angle, spacing),
            (settings.angle + FRAC_PI_2, spacing),
        ],
        InfillPattern::Hex => {
            let row = spacing * 3f64.sqrt() / 2.0;
            (0..3)
                .map(|i| (settings.angle + FRAC_PI_3 * i as f64, row))
                .collect()
        }
        InfillPattern::Random => return random_fill(region, spacing, settings.seed),
    };

    let mut out = Vec::new();
    for (angle, spacing) in families {
        let rows = scanlines(region, angle, spacing);
        if settings.zigzag {
            out.extend(zigzag(region, rows));
        } else {
            out.extend(rows.into_iter().flatten().map(|(a, b)| vec![a, b]));
        }
    }
    out
}

/// Intersects the region with parallel lines at `angle`, placed on a global
/// grid so lines line up between layers. Returns the spans of every line,
/// ordered along the line.
fn scanlines(region: &[Polygon], angle: f64, spacing: f64) -> Vec<Vec<(Point, Point)>> {
    let rotated = (region.iter())
        .map(|x| x.points().iter().map(|p| rotate(p, -angle)).collect::<Vec<_>>())
        .collect::<Vec<_>>();

    let (min_y, max_y) = (rotated.iter().flatten())
        .fold((f64::MAX, f64::MIN), |(lo, hi), p| (lo.min(p.y), hi.max(p.y)));
    if min_y > max_y {
        return Vec::new();
    }

    let phase = spacing / 2.0;
    let first = ((min_y - phase) / spacing).ceil() as i64;
    let last = ((max_y - phase) / spacing).floor() as i64;

    let mut rows = Vec::new();
    for k in first..=last {
        let y = phase + k as f64 * spacing;

        let mut crossings = Vec::new();
        for points in rotated.iter() {
            let n = points.len();
            for i in 0..n {
                let (a, b) = (points[i], points[(i + 1) % n]);
                if (a.y <= y) != (b.y <= y) {
                    let x = a.x + (y - a.y) / (b.y - a.y) * (b.x - a.x);
                    crossings.push((x, if b.y > a.y { -1 } else { 1 }));
                }
            }
        }
        crossings.sort_by_key(|&(x, _)| OrderedFloat(x));

        let mut spans = Vec::new();
        let (mut winding, mut start) = (0, None);
        for (x, direction) in crossings {
            let was_inside = winding > 0;
            winding += direction;
            match (was_inside, winding > 0) {
                (false, true) => start = Some(x),
                (true, false) => {
                    if let Some(start) = start.take().filter(|&s| x - s > 1e-9) {
                        spans.push((
                            rotate(&Point::new(start, y), angle),
                            rotate(&Point::new(x, y), angle),
                        ));
                    }
                }
                _ => {}
            }
        }

        if !spans.is_empty() {
            rows.push(spans);
        }
    }

    rows
}

/// Joins the spans of consecutive rows into back and forth paths where the
/// connecting move stays inside the region.
fn zigzag(region: &[Polygon], rows: Vec<Vec<(Point, Point)>>) -> Vec<Polyline> {
    let mut out = Vec::<Polyline>::new();
    let mut current = Vec::<Point>::new();

    for (i, mut row) in rows.into_iter().enumerate() {
        if i % 2 == 1 {
            row.reverse();
            row.iter_mut().for_each(|(a, b)| std::mem::swap(a, b));
        }

        for (j, (a, b)) in row.into_iter().enumerate() {
            let joins = j == 0
                && current
                    .last()
                    .is_some_and(|end| connector_inside(region, &current, end, &a));
            if !joins && !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }

            current.extend([a, b]);
        }
    }

    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn connector_inside(region: &[Polygon], path: &[Point], from: &Point, to: &Point) -> bool {
    if segment_crosses(region, from, to) {
        return false;
    }

    // The connector usually runs along the boundary, so it is probed slightly
    // towards the previous span.
    let mid = (from + to) / 2.0;
    let previous = match path {
        [.., a, b] => (a + b) / 2.0,
        _ => return false,
    };
    let inward = (previous - mid).try_normalize(0.0).unwrap_or_else(Point::zeros);
    region_contains(region, &(mid + inward * 1e-6))
}

/// Dart throwing with a minimum spacing, chained into a path by always
/// moving to the nearest unvisited point and clipped to the region.
fn random_fill(region: &[Polygon], spacing: f64, seed: u64) -> Vec<Polyline> {
    let area = region_area(region);
    if area <= 0.0 {
        return Vec::new();
    }

    let target = (area / (spacing * spacing)).ceil() as usize;
    let (min, max) = region_bounds(region);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut index = PointIndex::new(spacing);
    let mut points = Vec::new();

    let mut rejects = 0;
    while rejects < MAX_REJECTS && points.len() < target {
        let point = Point::new(rng.gen_range(min.x..=max.x), rng.gen_range(min.y..=max.y));
        if !region_contains(region, &point) || index.find(&point).is_some() {
            rejects += 1;
            continue;
        }

        rejects = 0;
        index.insert(point);
        points.push(point);
    }

    let mut out = Vec::new();
    let mut current = Vec::<Point>::new();
    for pair in nearest_chain(points).windows(2) {
        let pieces = clip_segment(region, &pair[0], &pair[1]);
        match pieces.as_slice() {
            [(a, b)] if *a == pair[0] && *b == pair[1] => {
                if current.is_empty() {
                    current.push(*a);
                }
                current.push(*b);
            }
            _ => {
                if current.len() >= 2 {
                    out.push(std::mem::take(&mut current));
                }
                current.clear();
                out.extend(pieces.into_iter().map(|(a, b)| vec![a, b]));
            }
        }
    }

    if current.len() >= 2 {
        out.push(current);
    }
    out
}

fn nearest_chain(mut points: Vec<Point>) -> Vec<Point> {
    let mut out = Vec::with_capacity(points.len());
    let Some(mut head) = points.pop() else {
        return out;
    };

    out.push(head);
    while !points.is_empty() {
        let (next, _) = (points.iter().enumerate())
            .map(|(i, x)| (i, (x - head).norm_squared()))
            .fold((0, f64::MAX), |best, x| if x.1 < best.1 { x } else { best });
        head = points.swap_remove(next);
        out.push(head);
    }
    out
}

/// Parts of the segment `a -> b` inside the region.
pub fn clip_segment(region: &[Polygon], a: &Point, b: &Point) -> Vec<(Point, Point)> {
    let mut ts = segment_crossings(region, a, b);
    ts.extend([0.0, 1.0]);
    ts.sort_by_key(|&x| OrderedFloat(x));
    ts.dedup_by(|x, y| (*x - *y).abs() < 1e-12);

    let at = |t: f64| if t == 0.0 { *a } else if t == 1.0 { *b } else { a + (b - a) * t };

    let mut out = Vec::<(Point, Point)>::new();
    for pair in ts.windows(2) {
        let mid = at((pair[0] + pair[1]) / 2.0);
        if !region_contains(region, &mid) {
            continue;
        }

        let (start, end) = (at(pair[0]), at(pair[1]));
        match out.last_mut() {
            Some(last) if last.1 == start => last.1 = end,
            _ => out.push((start, end)),
        }
    }
    out
}
