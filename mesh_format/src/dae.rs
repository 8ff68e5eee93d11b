//! COLLADA documents. Positions come from the `<float_array>` of the
//! `<source>` linked through `<vertices>/<input semantic="POSITION">` from
//! the `<input semantic="VERTEX">` of each `<triangles>`, `<polylist>` or
//! `<polygons>` primitive. Scene graph transforms are not applied.

use std::collections::HashMap;

use common::progress::Progress;
use nalgebra::Vector3;
use quick_xml::{
    events::{BytesStart, Event},
    Reader,
};

use crate::{util::VertexWelder, FormatPlugin, ImportError, Mesh};

pub struct DaePlugin;

#[derive(Default)]
struct Source {
    values: Vec<f64>,
    stride: usize,
}

#[derive(Default)]
struct Primitive {
    /// `(semantic, source id, offset)` of every input.
    inputs: Vec<(String, String, usize)>,
    vcount: Vec<usize>,
    polygons: Vec<Vec<usize>>,
    triangles: bool,
}

#[derive(Clone, Copy)]
enum TextTarget {
    FloatArray,
    VCount,
    Polygon,
}

impl FormatPlugin for DaePlugin {
    fn name(&self) -> &'static str {
        "dae"
    }

    fn sniff(&self, bytes: &[u8]) -> bool {
        let head = &bytes[..bytes.len().min(4096)];
        head.windows(8).any(|x| x == b"<COLLADA")
    }

    fn decode(&self, bytes: &[u8], progress: &Progress) -> Result<Mesh, ImportError> {
        progress.set_total(bytes.len() as u64);
        let content = String::from_utf8_lossy(bytes);
        let mut reader = Reader::from_str(&content);
        reader.config_mut().trim_text(true);

        let mut sources = HashMap::<String, Source>::new();
        let mut vertices = HashMap::<String, String>::new();
        let mut primitives = Vec::new();

        let mut current_source = None::<String>;
        let mut current_vertices = None::<String>;
        let mut primitive = None::<Primitive>;
        let mut text_target = None::<TextTarget>;
        let mut text = String::new();

        let mut buf = Vec::new();
        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| malformed(format!("XML parse error: {e}")))?;

            match event {
                Event::Start(ref e) | Event::Empty(ref e) => {
                    let is_start = matches!(event, Event::Start(_));
                    match e.local_name().as_ref() {
                        b"source" if is_start => current_source = attribute(e, b"id"),
                        b"float_array" if is_start => text_target = Some(TextTarget::FloatArray),
                        b"accessor" => {
                            if let Some(source) = &current_source {
                                let stride = attribute(e, b"stride")
                                    .and_then(|x| x.parse().ok())
                                    .unwrap_or(3);
                                sources.entry(source.clone()).or_default().stride = stride;
                            }
                        }
                        b"vertices" if is_start => current_vertices = attribute(e, b"id"),
                        b"triangles" | b"polylist" | b"polygons" if is_start => {
                            primitive = Some(Primitive {
                                triangles: e.local_name().as_ref() == b"triangles",
                                ..Default::default()
                            });
                        }
                        b"input" => {
                            let semantic = attribute(e, b"semantic").unwrap_or_default();
                            let source = attribute(e, b"source").unwrap_or_default();
                            let source = source.trim_start_matches('#').to_owned();

                            if let Some(primitive) = &mut primitive {
                                let offset = attribute(e, b"offset")
                                    .and_then(|x| x.parse().ok())
                                    .unwrap_or(0);
                                primitive.inputs.push((semantic, source, offset));
                            } else if let Some(id) = &current_vertices {
                                if semantic == "POSITION" {
                                    vertices.insert(id.clone(), source);
                                }
                            }
                        }
                        b"vcount" if is_start => text_target = Some(TextTarget::VCount),
                        b"p" if is_start => text_target = Some(TextTarget::Polygon),
                        _ => {}
                    }
                }
                Event::Text(ref e) => {
                    if text_target.is_some() {
                        let unescaped = e.unescape().map_err(|e| malformed(e.to_string()))?;
                        text.push_str(&unescaped);
                        text.push(' ');
                    }
                }
                Event::End(ref e) => match e.local_name().as_ref() {
                    b"source" => current_source = None,
                    b"vertices" => current_vertices = None,
                    b"float_array" | b"vcount" | b"p" => {
                        let target = text_target.take();
                        let content = std::mem::take(&mut text);
                        match (target, &mut primitive, &current_source) {
                            (Some(TextTarget::FloatArray), _, Some(source)) => {
                                let source = sources.entry(source.clone()).or_default();
                                source.values = parse_numbers(&content)?;
                            }
                            (Some(TextTarget::VCount), Some(primitive), _) => {
                                primitive.vcount = parse_numbers(&content)?;
                            }
                            (Some(TextTarget::Polygon), Some(primitive), _) => {
                                primitive.polygons.push(parse_numbers(&content)?);
                            }
                            _ => {}
                        }
                    }
                    b"triangles" | b"polylist" | b"polygons" => {
                        primitives.extend(primitive.take());
                    }
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }

            progress.set_complete(reader.buffer_position() as u64);
            buf.clear();
        }

        let mut verts = VertexWelder::new();
        let mut faces = Vec::new();
        for primitive in primitives.iter() {
            decode_primitive(primitive, &sources, &vertices, &mut verts, &mut faces)?;
        }

        if faces.is_empty() {
            return Err(malformed("document contains no triangles"));
        }

        Ok(Mesh {
            verts: verts.into_vertices(),
            faces,
        })
    }
}

fn decode_primitive(
    primitive: &Primitive,
    sources: &HashMap<String, Source>,
    vertices: &HashMap<String, String>,
    verts: &mut VertexWelder,
    faces: &mut Vec<[u32; 3]>,
) -> Result<(), ImportError> {
    let Some((_, source, offset)) = (primitive.inputs.iter())
        .find(|(semantic, ..)| semantic == "VERTEX" || semantic == "POSITION")
    else {
        return Err(malformed("primitive without a VERTEX input"));
    };

    let source_id = vertices.get(source).unwrap_or(source);
    let positions = sources
        .get(source_id)
        .ok_or_else(|| malformed(format!("unknown source `{source_id}`")))?;
    let stride = positions.stride.max(3);
    let input_stride = primitive.inputs.iter().map(|x| x.2).max().unwrap_or(0) + 1;

    let mut vertex = |index: usize| -> Result<u32, ImportError> {
        let start = index * stride;
        let Some(coords) = positions.values.get(start..start + 3) else {
            return Err(malformed(format!("position index {index} out of range")));
        };
        Ok(verts.index(Vector3::new(coords[0], coords[1], coords[2])))
    };

    let mut polygons = Vec::new();
    for p in primitive.polygons.iter() {
        let indices = (p.iter().skip(*offset).step_by(input_stride))
            .map(|&x| vertex(x))
            .collect::<Result<Vec<_>, _>>()?;

        if primitive.triangles {
            polygons.extend(indices.chunks_exact(3).map(<[u32]>::to_vec));
        } else if primitive.vcount.is_empty() {
            polygons.push(indices);
        } else {
            let mut rest = &indices[..];
            for &count in primitive.vcount.iter() {
                let (polygon, tail) = rest.split_at(count.min(rest.len()));
                polygons.push(polygon.to_vec());
                rest = tail;
            }
        }
    }

    for polygon in polygons.into_iter().filter(|x| x.len() >= 3) {
        for i in 1..polygon.len() - 1 {
            faces.push([polygon[0], polygon[i], polygon[i + 1]]);
        }
    }

    Ok(())
}

fn attribute(element: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|x| x.key.local_name().as_ref() == name)
        .map(|x| String::from_utf8_lossy(&x.value).into_owned())
}

fn parse_numbers<T: std::str::FromStr>(text: &str) -> Result<Vec<T>, ImportError> {
    text.split_whitespace()
        .map(|x| {
            x.parse()
                .map_err(|_| malformed(format!("invalid number `{x}`")))
        })
        .collect()
}

fn malformed(reason: impl Into<String>) -> ImportError {
    ImportError::malformed("dae", reason)
}
