use common::{
    progress::Progress,
    serde::{Deserializer, DynamicSerializer, Serializer, SliceDeserializer},
};
use nalgebra::Vector3;

use crate::{
    util::{parse_f64, tokenize, VertexWelder, WHITESPACE},
    FormatPlugin, ImportError, Mesh,
};

const HEADER_SIZE: usize = 80;
const RECORD_SIZE: usize = 50;

pub struct StlPlugin;

impl FormatPlugin for StlPlugin {
    fn name(&self) -> &'static str {
        "stl"
    }

    fn sniff(&self, bytes: &[u8]) -> bool {
        is_ascii(bytes) || binary_face_count(bytes).is_some()
    }

    fn decode(&self, bytes: &[u8], progress: &Progress) -> Result<Mesh, ImportError> {
        let mut des = SliceDeserializer::new(bytes);
        if is_ascii(bytes) {
            ascii::parse(&mut des, progress)
        } else {
            binary::parse(&mut des, progress)
        }
    }
}

/// A file is only treated as text if it mentions `vertex` more than
/// `max(2, len / 8000)` times, some binary files start with `solid` too.
fn is_ascii(bytes: &[u8]) -> bool {
    let threshold = (bytes.len() / 8000).max(2);
    bytes
        .windows(6)
        .filter(|x| *x == b"vertex")
        .take(threshold + 1)
        .count()
        > threshold
}

fn binary_face_count(bytes: &[u8]) -> Option<u32> {
    let mut des = SliceDeserializer::new(bytes);
    des.advance_by(HEADER_SIZE);
    (des.remaining() >= 4).then_some(())?;

    let count = des.read_u32_le();
    (des.remaining() >= count as usize * RECORD_SIZE).then_some(count)
}

/// From Wikipedia :eyes:
/// ```text
/// UINT8[80]    – Header                 - 80 bytes
/// UINT32       – Number of triangles    - 04 bytes
/// foreach triangle                      - 50 bytes
///     REAL32[3] – Normal vector         - 12 bytes
///     REAL32[3] – Vertex 1              - 12 bytes
///     REAL32[3] – Vertex 2              - 12 bytes
///     REAL32[3] – Vertex 3              - 12 bytes
///     UINT16    – Attribute byte count  - 02 bytes
/// end
/// ```
mod binary {
    use super::*;

    pub fn parse<T: Deserializer>(des: &mut T, progress: &Progress) -> Result<Mesh, ImportError> {
        if des.size() < HEADER_SIZE + 4 {
            return Err(ImportError::malformed("stl", "file shorter than its header"));
        }

        des.advance_by(HEADER_SIZE);
        let tri_count = des.read_u32_le();
        if des.remaining() < tri_count as usize * RECORD_SIZE {
            return Err(ImportError::malformed(
                "stl",
                format!("header declares {tri_count} triangles but the file is truncated"),
            ));
        }

        progress.set_total(tri_count as u64);

        let mut verts = VertexWelder::new();
        let mut faces = Vec::with_capacity(tri_count as usize);
        for i in 0..tri_count {
            progress.set_complete(i as u64);
            des.advance_by(4 * 3);
            faces.push([
                verts.index(des_vec3f_bin(des)),
                verts.index(des_vec3f_bin(des)),
                verts.index(des_vec3f_bin(des)),
            ]);
            des.advance_by(2);
        }

        Ok(Mesh {
            verts: verts.into_vertices(),
            faces,
        })
    }

    fn des_vec3f_bin<T: Deserializer>(des: &mut T) -> Vector3<f64> {
        Vector3::new(des.read_f32_le(), des.read_f32_le(), des.read_f32_le()).cast()
    }
}

/// ```text
/// solid name
/// facet normal ni nj nk
///     outer loop
///         vertex v1x v1y v1z
///         vertex v2x v2y v2z
///         vertex v3x v3y v3z
///     endloop
/// endfacet
/// endsolid name
/// ```
mod ascii {
    use super::*;

    pub fn parse<T: Deserializer>(des: &mut T, progress: &Progress) -> Result<Mesh, ImportError> {
        progress.set_total(des.size() as u64);

        let mut verts = VertexWelder::new();
        let mut faces = Vec::new();

        let mut builder = [Vector3::zeros(); 3];
        let mut loop_verts = 0;
        // Coordinates still to be read for the current vertex.
        let mut pending = 0;

        tokenize(des, &WHITESPACE, progress, |token| {
            if pending > 0 {
                builder[loop_verts - 1][3 - pending] = parse_f64("stl", Some(token))?;
                pending -= 1;
                return Ok(());
            }

            match token {
                "vertex" => {
                    if loop_verts == 3 {
                        return Err(ImportError::malformed("stl", "facet with more than 3 vertices"));
                    }
                    loop_verts += 1;
                    pending = 3;
                }
                "outer" => loop_verts = 0,
                "endloop" => {
                    if loop_verts != 3 {
                        return Err(ImportError::malformed("stl", "facet with less than 3 vertices"));
                    }
                    faces.push(builder.map(|x| verts.index(x)));
                    loop_verts = 0;
                }
                _ => {}
            }

            Ok(())
        })?;

        if pending > 0 {
            return Err(ImportError::malformed("stl", "unexpected end of file"));
        }

        Ok(Mesh {
            verts: verts.into_vertices(),
            faces,
        })
    }
}

/// Encodes a mesh as binary STL with zeroed normals.
pub fn encode_binary(mesh: &Mesh) -> Vec<u8> {
    let mut ser = DynamicSerializer::new();
    let mut header = [0; HEADER_SIZE];
    header[..6].copy_from_slice(b"binary");
    ser.write_bytes(&header);
    ser.write_u32_le(mesh.faces.len() as u32);

    for face in mesh.faces.iter() {
        (0..3).for_each(|_| ser.write_f32_le(0.0));
        for &idx in face {
            let vert = mesh.verts[idx as usize];
            (0..3).for_each(|i| ser.write_f32_le(vert[i] as f32));
        }
        ser.write_u16_le(0);
    }

    ser.into_inner()
}

/// Encodes a mesh as ASCII STL with zeroed normals.
pub fn encode_ascii(mesh: &Mesh, name: &str) -> String {
    let mut out = format!("solid {name}\n");
    for face in mesh.faces.iter() {
        out.push_str("facet normal 0 0 0\n  outer loop\n");
        for &idx in face {
            let vert = mesh.verts[idx as usize];
            out.push_str(&format!("    vertex {} {} {}\n", vert.x, vert.y, vert.z));
        }
        out.push_str("  endloop\nendfacet\n");
    }
    out.push_str(&format!("endsolid {name}\n"));
    out
}
