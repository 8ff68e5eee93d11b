use common::{progress::Progress, serde::SliceDeserializer};
use nalgebra::Vector3;

use crate::{
    util::{parse_f64, tokenize, VertexWelder, NEWLINE},
    FormatPlugin, ImportError, Mesh,
};

pub struct ObjPlugin;

impl FormatPlugin for ObjPlugin {
    fn name(&self) -> &'static str {
        "obj"
    }

    fn sniff(&self, bytes: &[u8]) -> bool {
        let head = String::from_utf8_lossy(&bytes[..bytes.len().min(64 * 1024)]);
        let mut lines = head.lines().map(str::trim_start);
        lines.any(|x| x.starts_with("v ") || x.starts_with("v\t"))
            && head
                .lines()
                .map(str::trim_start)
                .all(|x| x.is_empty() || x.starts_with(|c: char| c.is_ascii_alphabetic() || c == '#'))
    }

    fn decode(&self, bytes: &[u8], progress: &Progress) -> Result<Mesh, ImportError> {
        progress.set_total(bytes.len() as u64);
        let mut des = SliceDeserializer::new(bytes);

        // Raw vertices in file order, OBJ indices refer to these.
        let mut raw = Vec::new();
        let mut faces = Vec::new();

        tokenize(&mut des, &NEWLINE, progress, |line| {
            let mut parts = line.split_whitespace();
            match parts.next() {
                Some("v") => raw.push(next_vertex(&mut parts)?),
                Some("f") => {
                    let indices = (parts.map(|x| resolve_index(x, raw.len())))
                        .collect::<Result<Vec<_>, _>>()?;
                    if indices.len() < 3 {
                        return Err(ImportError::malformed("obj", "face with less than 3 vertices"));
                    }

                    // Polygons are fanned out from their first vertex.
                    for i in 1..indices.len() - 1 {
                        faces.push([indices[0], indices[i], indices[i + 1]]);
                    }
                }
                _ => {}
            }
            Ok(())
        })?;

        let mut verts = VertexWelder::new();
        let remap = raw.into_iter().map(|x| verts.index(x)).collect::<Vec<_>>();
        let faces = (faces.into_iter())
            .map(|face: [usize; 3]| face.map(|x| remap[x]))
            .collect();

        Ok(Mesh {
            verts: verts.into_vertices(),
            faces,
        })
    }
}

fn next_vertex<'a>(parts: &mut impl Iterator<Item = &'a str>) -> Result<Vector3<f64>, ImportError> {
    Ok(Vector3::new(
        parse_f64("obj", parts.next())?,
        parse_f64("obj", parts.next())?,
        parse_f64("obj", parts.next())?,
    ))
}

/// Resolves an `i`, `i/t` or `i/t/n` token into a zero based vertex index.
/// Negative indices count back from the last vertex read so far.
fn resolve_index(token: &str, vertex_count: usize) -> Result<usize, ImportError> {
    let number = token.split_once('/').map(|x| x.0).unwrap_or(token);
    let index = number
        .parse::<i64>()
        .map_err(|_| ImportError::malformed("obj", format!("invalid face index `{token}`")))?;

    let resolved = match index.signum() {
        1 => index - 1,
        -1 => vertex_count as i64 + index,
        _ => -1,
    };

    if resolved < 0 || resolved as usize >= vertex_count {
        return Err(ImportError::malformed(
            "obj",
            format!("face index {index} out of range"),
        ));
    }

    Ok(resolved as usize)
}
