use std::collections::HashMap;

use common::{math::EPSILON, progress::Progress, serde::Deserializer};
use nalgebra::Vector3;

use crate::ImportError;

pub const WHITESPACE: [char; 4] = [' ', '\t', '\r', '\n'];
pub const NEWLINE: [char; 2] = ['\n', '\r'];

/// Splits the input into tokens on any of the (ASCII) delimiters, reading
/// it in 8 KiB chunks.
pub fn tokenize<T: Deserializer>(
    des: &mut T,
    delimiter: &[char],
    progress: &Progress,
    mut callback: impl FnMut(&str) -> Result<(), ImportError>,
) -> Result<(), ImportError> {
    let is_delimiter = |x: &u8| delimiter.contains(&(*x as char));

    let mut carry = Vec::new();
    loop {
        let next = des.read_bytes(8 * 1024);
        let done = next.is_empty();
        carry.extend_from_slice(next);
        progress.set_complete(des.pos() as u64);

        let split = match done {
            true => carry.len(),
            false => match carry.iter().rposition(is_delimiter) {
                Some(pos) => pos + 1,
                None => continue,
            },
        };

        let rest = carry.split_off(split);
        let chunk = String::from_utf8_lossy(&carry);
        for token in chunk.split(delimiter).filter(|x| !x.is_empty()) {
            callback(token)?;
        }

        carry = rest;
        if done {
            break;
        }
    }

    Ok(())
}

/// Assigns indices to vertices, sharing one index between vertices that
/// are within [`EPSILON`] of each other on every axis.
#[derive(Default)]
pub struct VertexWelder {
    cells: HashMap<[i64; 3], Vec<u32>>,
    verts: Vec<Vector3<f64>>,
}

impl VertexWelder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(&mut self, vert: Vector3<f64>) -> u32 {
        let cell = cell_of(&vert);
        for x in -1..=1 {
            for y in -1..=1 {
                for z in -1..=1 {
                    let key = [cell[0] + x, cell[1] + y, cell[2] + z];
                    let Some(candidates) = self.cells.get(&key) else {
                        continue;
                    };

                    for &idx in candidates {
                        let other = self.verts[idx as usize];
                        if (other - vert).abs().max() <= EPSILON {
                            return idx;
                        }
                    }
                }
            }
        }

        let idx = self.verts.len() as u32;
        self.verts.push(vert);
        self.cells.entry(cell).or_default().push(idx);
        idx
    }

    pub fn len(&self) -> usize {
        self.verts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verts.is_empty()
    }

    pub fn into_vertices(self) -> Vec<Vector3<f64>> {
        self.verts
    }
}

fn cell_of(vert: &Vector3<f64>) -> [i64; 3] {
    [vert.x, vert.y, vert.z].map(|x| (x / EPSILON).floor() as i64)
}

/// Parses a whitespace separated float, mapping failures to a malformed
/// error for `format`.
pub fn parse_f64(format: &'static str, token: Option<&str>) -> Result<f64, ImportError> {
    let token = token.ok_or_else(|| ImportError::malformed(format, "unexpected end of line"))?;
    token
        .parse::<f64>()
        .ok()
        .filter(|x| x.is_finite())
        .ok_or_else(|| ImportError::malformed(format, format!("invalid number `{token}`")))
}
