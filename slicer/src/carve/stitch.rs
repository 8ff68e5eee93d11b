use std::collections::{HashMap, HashSet};

use crate::geometry::{point_index::PointIndex, Polygon};

use super::Segment;

/// Loops below this area are treated as carving noise.
const MIN_LOOP_AREA: f64 = 1e-9;

#[derive(Debug, Default)]
pub struct Stitched {
    pub loops: Vec<Polygon>,
    pub open_chains: usize,
    pub discarded: usize,
}

/// Endpoints of neighbouring faces meet within this distance.
const EXACT_RADIUS: f64 = 1e-6;

/// Links segments into closed loops. Chains that do not close are dropped
/// and counted. The returned loops are not oriented.
///
/// Endpoints are first joined where they meet exactly. Only if that leaves
/// open chains is everything relinked with endpoints closer than `radius`
/// merged, which closes the gaps of slightly broken meshes.
pub fn stitch(segments: impl IntoIterator<Item = Segment>, radius: f64) -> Stitched {
    let segments = segments.into_iter().collect::<Vec<_>>();
    let exact = link(&segments, EXACT_RADIUS.min(radius));
    if exact.open_chains == 0 || radius <= EXACT_RADIUS {
        return exact;
    }

    link(&segments, radius)
}

fn link(segments: &[Segment], radius: f64) -> Stitched {
    let mut nodes = PointIndex::new(radius);
    let mut seen = HashSet::new();
    let mut edges = Vec::<[usize; 2]>::new();

    for segment in segments {
        let (a, b) = (nodes.insert(segment.a), nodes.insert(segment.b));
        if a != b && seen.insert((a.min(b), a.max(b))) {
            edges.push([a, b]);
        }
    }

    let mut adjacent = HashMap::<usize, Vec<usize>>::new();
    for (i, &[a, b]) in edges.iter().enumerate() {
        adjacent.entry(a).or_default().push(i);
        adjacent.entry(b).or_default().push(i);
    }

    let mut used = vec![false; edges.len()];
    let next_edge = |node: usize, used: &mut [bool]| {
        let edge = *adjacent.get(&node)?.iter().find(|&&x| !used[x])?;
        used[edge] = true;
        let [a, b] = edges[edge];
        Some(if a == node { b } else { a })
    };

    let mut out = Stitched::default();
    for start in 0..edges.len() {
        if used[start] {
            continue;
        }

        used[start] = true;
        let [first, second] = edges[start];
        let mut chain = vec![first, second];

        let mut closed = false;
        while let Some(node) = next_edge(chain[chain.len() - 1], &mut used) {
            if node == first {
                closed = true;
                break;
            }
            chain.push(node);
        }

        if !closed {
            // Walk the other way so an open chain is only counted once.
            chain.reverse();
            while let Some(node) = next_edge(chain[chain.len() - 1], &mut used) {
                chain.push(node);
            }
            out.open_chains += 1;
            continue;
        }

        let mut polygon = Polygon::new(chain.into_iter().map(|x| nodes.point(x)).collect());
        polygon.simplify(1e-9);
        if polygon.len() < 3 || polygon.area() < MIN_LOOP_AREA {
            out.discarded += 1;
            continue;
        }

        out.loops.push(polygon);
    }

    out
}
