//! Polygon booleans. Every edge of both operands is split where it meets
//! another edge, then each fragment is kept if the result region is on
//! exactly one of its sides. Kept fragments are oriented with the region on
//! their left and stitched back into loops.

use std::collections::{HashMap, HashSet};

use common::math::{cross2, perp, Point};
use itertools::Itertools;
use ordered_float::OrderedFloat;

use super::{point_index::PointIndex, polygon::Polygon};

/// Nodes closer than this are merged.
const SNAP: f64 = 1e-7;
/// Distance of the side samples from a fragment.
const SAMPLE: f64 = 1e-6;
/// Loops with a smaller area are dropped from results.
const MIN_AREA: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillRule {
    EvenOdd,
    NonZero,
    Positive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    Union,
    Intersection,
    Difference,
}

impl FillRule {
    fn inside(self, winding: i32) -> bool {
        match self {
            Self::EvenOdd => winding % 2 != 0,
            Self::NonZero => winding != 0,
            Self::Positive => winding > 0,
        }
    }
}

impl BoolOp {
    fn apply(self, a: bool, b: bool) -> bool {
        match self {
            Self::Union => a || b,
            Self::Intersection => a && b,
            Self::Difference => a && !b,
        }
    }
}

pub fn union(a: &[Polygon], b: &[Polygon]) -> Vec<Polygon> {
    combine(a, b, BoolOp::Union)
}

pub fn intersection(a: &[Polygon], b: &[Polygon]) -> Vec<Polygon> {
    combine(a, b, BoolOp::Intersection)
}

pub fn difference(a: &[Polygon], b: &[Polygon]) -> Vec<Polygon> {
    combine(a, b, BoolOp::Difference)
}

/// Union of any number of loop sets.
pub fn union_all<'a>(sets: impl IntoIterator<Item = &'a [Polygon]>) -> Vec<Polygon> {
    sets.into_iter()
        .fold(Vec::new(), |acc, set| union(&acc, set))
}

/// Rebuilds a possibly self-overlapping loop set into disjoint, oriented
/// loops covering the points the fill rule considers inside.
pub fn normalize(loops: &[Polygon], rule: FillRule) -> Vec<Polygon> {
    overlay(loops, &[], |a, _| rule.inside(a))
}

/// Combines two oriented loop sets. Operands are expected to be results of
/// earlier operations or carved layers: disjoint counter-clockwise outers
/// with clockwise holes.
pub fn combine(a: &[Polygon], b: &[Polygon], op: BoolOp) -> Vec<Polygon> {
    let disjoint = match (bounds(a), bounds(b)) {
        (Some(a), Some(b)) => {
            a.0.x > b.1.x || b.0.x > a.1.x || a.0.y > b.1.y || b.0.y > a.1.y
        }
        _ => true,
    };

    if disjoint {
        return match op {
            BoolOp::Union => a.iter().chain(b).cloned().collect(),
            BoolOp::Intersection => Vec::new(),
            BoolOp::Difference => a.to_vec(),
        };
    }

    let rule = FillRule::Positive;
    overlay(a, b, |a, b| op.apply(rule.inside(a), rule.inside(b)))
}

fn bounds(loops: &[Polygon]) -> Option<(Point, Point)> {
    let mut out = None::<(Point, Point)>;
    for polygon in loops.iter().filter(|x| !x.is_empty()) {
        let (min, max) = polygon.bounds();
        out = Some(match out {
            Some((lo, hi)) => (lo.inf(&min), hi.sup(&max)),
            None => (min, max),
        });
    }
    out
}

/// Loop with its bounds, for skipping far away loops in winding queries.
struct Operand<'a> {
    loops: Vec<(&'a Polygon, Point, Point)>,
}

impl<'a> Operand<'a> {
    fn new(loops: &'a [Polygon]) -> Self {
        Self {
            loops: (loops.iter())
                .filter(|x| x.len() >= 3)
                .map(|x| {
                    let (min, max) = x.bounds();
                    (x, min, max)
                })
                .collect(),
        }
    }

    fn winding(&self, point: &Point) -> i32 {
        (self.loops.iter())
            .filter(|(_, min, max)| {
                point.x >= min.x && point.x <= max.x && point.y >= min.y && point.y <= max.y
            })
            .map(|(polygon, ..)| polygon.winding_number(point))
            .sum()
    }
}

fn overlay(a: &[Polygon], b: &[Polygon], classify: impl Fn(i32, i32) -> bool) -> Vec<Polygon> {
    let edges = (a.iter().chain(b))
        .filter(|x| x.len() >= 3)
        .flat_map(|x| x.edges())
        .filter(|(p, q)| p != q)
        .collect::<Vec<_>>();

    let splits = split_edges(&edges);

    let mut nodes = PointIndex::new(SNAP);
    let mut seen = HashSet::new();
    let mut fragments = Vec::new();
    for ((p, q), mut points) in edges.iter().zip(splits) {
        let direction = q - p;
        points.sort_by_key(|x| OrderedFloat((x - p).dot(&direction)));

        let ids = points.into_iter().map(|x| nodes.insert(x)).collect::<Vec<_>>();
        for (u, v) in ids.into_iter().tuple_windows() {
            if u != v && seen.insert((u.min(v), u.max(v))) {
                fragments.push((u, v));
            }
        }
    }

    let (a, b) = (Operand::new(a), Operand::new(b));
    let inside = |point: &Point| classify(a.winding(point), b.winding(point));

    let mut kept = Vec::new();
    for (u, v) in fragments {
        let (pu, pv) = (nodes.point(u), nodes.point(v));
        let length = (pv - pu).norm();
        if length <= f64::EPSILON {
            continue;
        }

        let mid = (pu + pv) / 2.0;
        let normal = perp(&((pv - pu) / length)) * SAMPLE;
        match (inside(&(mid + normal)), inside(&(mid - normal))) {
            (true, false) => kept.push((u, v)),
            (false, true) => kept.push((v, u)),
            _ => {}
        }
    }

    stitch(&nodes, &kept)
}

/// Finds the points where every edge has to be split, including its own
/// endpoints.
fn split_edges(edges: &[(Point, Point)]) -> Vec<Vec<Point>> {
    let mut splits = edges.iter().map(|(p, q)| vec![*p, *q]).collect::<Vec<_>>();

    let min_x = |i: usize| edges[i].0.x.min(edges[i].1.x);
    let mut order = (0..edges.len()).collect::<Vec<_>>();
    order.sort_by_key(|&i| OrderedFloat(min_x(i)));

    for (k, &i) in order.iter().enumerate() {
        let (p, q) = edges[i];
        let max_x = p.x.max(q.x) + SNAP;
        let (min_y, max_y) = (p.y.min(q.y) - SNAP, p.y.max(q.y) + SNAP);

        for &j in order[k + 1..].iter() {
            if min_x(j) > max_x {
                break;
            }

            let (r, s) = edges[j];
            if r.y.max(s.y) < min_y || r.y.min(s.y) > max_y {
                continue;
            }

            for (edge, point) in intersect_edges((p, q), (r, s)) {
                splits[if edge == 0 { i } else { j }].push(point);
            }
        }
    }

    splits
}

/// Split points between two edges, tagged with the edge (0 or 1) they
/// split.
fn intersect_edges((p, p2): (Point, Point), (q, q2): (Point, Point)) -> Vec<(u8, Point)> {
    let (r, s) = (p2 - p, q2 - q);
    let (r_len, s_len) = (r.norm(), s.norm());
    let denom = cross2(&r, &s);
    let qp = q - p;

    if denom.abs() > 1e-12 * r_len * s_len {
        let t = cross2(&qp, &s) / denom;
        let u = cross2(&qp, &r) / denom;
        let (tol_t, tol_u) = (SNAP / r_len, SNAP / s_len);
        if !(-tol_t..=1.0 + tol_t).contains(&t) || !(-tol_u..=1.0 + tol_u).contains(&u) {
            return Vec::new();
        }

        let point = if u <= tol_u {
            q
        } else if u >= 1.0 - tol_u {
            q2
        } else if t <= tol_t {
            p
        } else if t >= 1.0 - tol_t {
            p2
        } else {
            p + r * t
        };
        return vec![(0, point), (1, point)];
    }

    // Parallel, only collinear overlaps matter.
    if cross2(&r, &qp).abs() / r_len > SNAP {
        return Vec::new();
    }

    let mut out = Vec::new();
    let inner = |point: Point, start: Point, dir: Point, len: f64| {
        let t = (point - start).dot(&dir) / (len * len);
        t > 0.0 && t < 1.0
    };
    for point in [q, q2] {
        if inner(point, p, r, r_len) {
            out.push((0, point));
        }
    }
    for point in [p, p2] {
        if inner(point, q, s, s_len) {
            out.push((1, point));
        }
    }
    out
}

/// Links directed fragments into closed loops. At nodes with several ways
/// out the sharpest left turn is taken, which separates loops that only
/// touch at a vertex.
fn stitch(nodes: &PointIndex, fragments: &[(usize, usize)]) -> Vec<Polygon> {
    let mut outgoing = HashMap::<usize, Vec<usize>>::new();
    for (i, &(from, _)) in fragments.iter().enumerate() {
        outgoing.entry(from).or_default().push(i);
    }

    let mut used = vec![false; fragments.len()];
    let mut out = Vec::new();

    for start in 0..fragments.len() {
        if used[start] {
            continue;
        }

        used[start] = true;
        let origin = fragments[start].0;
        let mut chain = vec![origin];
        let mut current = start;

        let closed = loop {
            let (from, to) = fragments[current];
            if to == origin {
                break true;
            }

            let incoming = nodes.point(to) - nodes.point(from);
            let next = (outgoing.get(&to).into_iter().flatten())
                .filter(|&&x| !used[x])
                .max_by(|&&x, &&y| {
                    let turn = |fragment: usize| {
                        let out = nodes.point(fragments[fragment].1) - nodes.point(to);
                        cross2(&incoming, &out).atan2(incoming.dot(&out))
                    };
                    turn(x).total_cmp(&turn(y))
                })
                .copied();

            let Some(next) = next else {
                break false;
            };

            used[next] = true;
            chain.push(to);
            current = next;
        };

        if !closed {
            continue;
        }

        let mut polygon = Polygon::new(chain.into_iter().map(|x| nodes.point(x)).collect());
        polygon.simplify(SNAP);
        if polygon.area() >= MIN_AREA {
            out.push(polygon);
        }
    }

    out
}
