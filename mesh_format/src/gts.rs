//! GNU Triangulated Surface files. After an `nv ne nf` header come `nv`
//! vertex lines, `ne` edge lines (two vertex indices) and `nf` face lines
//! (three edge indices), all indices 1-based.

use common::progress::Progress;
use nalgebra::Vector3;

use crate::{
    util::{parse_f64, VertexWelder},
    FormatPlugin, ImportError, Mesh,
};

pub struct GtsPlugin;

impl FormatPlugin for GtsPlugin {
    fn name(&self) -> &'static str {
        "gts"
    }

    fn sniff(&self, bytes: &[u8]) -> bool {
        let head = String::from_utf8_lossy(&bytes[..bytes.len().min(4096)]);
        let found = content_lines(&head).next().is_some_and(|x| parse_header(x).is_some());
        found
    }

    fn decode(&self, bytes: &[u8], progress: &Progress) -> Result<Mesh, ImportError> {
        let text = String::from_utf8_lossy(bytes);
        let mut lines = content_lines(&text);

        let header = lines.next().ok_or_else(|| malformed("empty file"))?;
        let [nv, ne, nf] = parse_header(header).ok_or_else(|| malformed("invalid header"))?;
        progress.set_total((nv + ne + nf) as u64);

        let mut verts = VertexWelder::new();
        let mut vertex_ids = Vec::with_capacity(nv);
        for _ in 0..nv {
            let mut parts = lines.next().ok_or_else(|| malformed("missing vertex"))?.split_whitespace();
            let vert = Vector3::new(
                parse_f64("gts", parts.next())?,
                parse_f64("gts", parts.next())?,
                parse_f64("gts", parts.next())?,
            );
            vertex_ids.push(verts.index(vert));
            progress.add_complete(1);
        }

        let mut edges = Vec::with_capacity(ne);
        for _ in 0..ne {
            let line = lines.next().ok_or_else(|| malformed("missing edge"))?;
            let [a, b] = parse_indices::<2>(line, nv)?;
            edges.push([vertex_ids[a], vertex_ids[b]]);
            progress.add_complete(1);
        }

        let mut faces = Vec::with_capacity(nf);
        for _ in 0..nf {
            let line = lines.next().ok_or_else(|| malformed("missing face"))?;
            let [e1, e2, e3] = parse_indices::<3>(line, ne)?.map(|x| edges[x]);
            faces.push(face_from_edges(e1, e2, e3)?);
            progress.add_complete(1);
        }

        Ok(Mesh {
            verts: verts.into_vertices(),
            faces,
        })
    }
}

fn malformed(reason: &str) -> ImportError {
    ImportError::malformed("gts", reason)
}

fn content_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .map(str::trim)
        .filter(|x| !x.is_empty() && !x.starts_with('#') && !x.starts_with('!'))
}

fn parse_header(line: &str) -> Option<[usize; 3]> {
    let mut parts = line.split_whitespace().map(|x| x.parse::<usize>().ok());
    let header = [parts.next()??, parts.next()??, parts.next()??];
    // Anything after the counts names the GTS object classes.
    parts.next().map_or(true, |x| x.is_none()).then_some(header)
}

fn parse_indices<const N: usize>(line: &str, count: usize) -> Result<[usize; N], ImportError> {
    let mut parts = line.split_whitespace();
    let mut out = [0; N];
    for slot in out.iter_mut() {
        let index = parts
            .next()
            .and_then(|x| x.parse::<usize>().ok())
            .ok_or_else(|| malformed("invalid index"))?;
        if index == 0 || index > count {
            return Err(malformed("index out of range"));
        }
        *slot = index - 1;
    }

    Ok(out)
}

/// Recovers the vertex loop of a face from its three edges, following the
/// edges in order.
fn face_from_edges(e1: [u32; 2], e2: [u32; 2], e3: [u32; 2]) -> Result<[u32; 3], ImportError> {
    let shared = |a: [u32; 2], b: [u32; 2]| a.into_iter().find(|x| b.contains(x));

    let first = shared(e1, e2).ok_or_else(|| malformed("face edges are not connected"))?;
    let second = shared(e2, e3).ok_or_else(|| malformed("face edges are not connected"))?;
    let third = shared(e3, e1).ok_or_else(|| malformed("face edges are not connected"))?;

    if first == second || second == third || first == third {
        return Err(malformed("degenerate face"));
    }

    Ok([third, first, second])
}
