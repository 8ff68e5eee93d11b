use std::f64::consts::TAU;

use common::{
    config::{SliceConfig, SupportMode},
    math::{Point, Pos},
    motion::{Motion, MotionEvent},
};
use gcode_format::reader::parse_gcode;
use slicer::{
    builder::{MeshBuilder, PrimitiveSolid, SolidKind},
    diagnostics::Diagnostic,
    geometry::polygon::region_contains,
    mesh::Mesh,
    planner::layer_time,
    JobInput, SliceJob, SliceOutput,
};

fn slice(mesh: Mesh, config: SliceConfig) -> SliceOutput {
    SliceJob::new(config, JobInput::Mesh(mesh)).run().unwrap()
}

fn cuboids(boxes: &[(Pos, Pos)]) -> Mesh {
    let mut builder = MeshBuilder::new();
    for (min, max) in boxes {
        builder.add_cuboid(*min, *max);
    }
    builder.build()
}

/// Splits the events at the `LAYER:k` comments, keeping the head position
/// each layer starts from.
fn layers(events: &[MotionEvent]) -> Vec<(Pos, &[MotionEvent])> {
    let starts = (events.iter().enumerate())
        .filter(|(_, x)| matches!(&x.motion, Motion::Comment { text } if text.starts_with("LAYER:")))
        .map(|(i, _)| i)
        .collect::<Vec<_>>();

    let mut out = Vec::new();
    for (n, &start) in starts.iter().enumerate() {
        let end = starts.get(n + 1).copied().unwrap_or(events.len());
        let head = (events[..start].iter().rev())
            .find_map(MotionEvent::target)
            .unwrap_or_else(Pos::zeros);
        out.push((head, &events[start..end]));
    }
    out
}

fn distance_to_segment(point: &Point, a: &Point, b: &Point) -> f64 {
    let ab = b - a;
    let t = ((point - a).dot(&ab) / ab.norm_squared()).clamp(0.0, 1.0);
    (a + ab * t - point).norm()
}

#[test]
fn unit_cube() {
    let cube = PrimitiveSolid::new(SolidKind::Cube {
        size: Pos::repeat(10.0),
    })
    .build();
    assert_eq!(cube.face_count(), 12);

    let config = SliceConfig::default();
    let job = SliceJob::new(config, JobInput::Mesh(cube));
    let (output, gcode) = job.run_to_gcode().unwrap();

    assert_eq!(output.layers.layers.len(), 50);
    assert!(output.layers.raft.is_empty());
    for layer in output.layers.layers.iter() {
        assert_eq!(layer.outline.len(), 1);
        let outline = &layer.outline[0];
        assert!(outline.is_ccw());
        assert_eq!(outline.len(), 4);
        for point in outline.points() {
            for value in [point.x, point.y] {
                assert!(value.abs() < 1e-9 || (value - 10.0).abs() < 1e-9);
            }
        }
        assert!(layer.support.outline.is_empty());
    }

    // Absolute E only ever grows without retraction.
    let mut last = 0.0;
    let mut extrusions = 0;
    for line in gcode.lines().filter(|x| x.starts_with("G1 ")) {
        if let Some(e) = line.split_whitespace().find_map(|x| x.strip_prefix('E')) {
            let e = e.parse::<f64>().unwrap();
            assert!(e >= last, "{line}");
            last = e;
            extrusions += 1;
        }
    }
    assert!(extrusions > 0);
    let read = parse_gcode(&gcode).unwrap();
    let layer_comments = (read.iter())
        .filter(|x| matches!(&x.motion, Motion::Comment { text } if text.starts_with("LAYER:")))
        .count();
    assert_eq!(layer_comments, 50);
}

#[test]
fn sphere() {
    let sphere = PrimitiveSolid::new(SolidKind::Sphere {
        radius: 10.0,
        segments: 16,
        rings: 11,
    })
    .build();
    assert_eq!(sphere.face_count(), 320);

    let config = SliceConfig {
        fill_density: 0.0,
        top_bottom_layers: 0,
        ..Default::default()
    };
    let mut placed = sphere.clone();
    placed.apply_config(&config);
    let output = slice(sphere, config);

    assert_eq!(output.layers.layers.len(), 100);
    for layer in output.layers.layers.iter() {
        assert_eq!(layer.outline.len(), 1, "layer {}", layer.index);

        // Within the snapping tolerance of the polyhedral section, and close
        // to the circle of the true sphere.
        let section = placed.intersect_plane(layer.z);
        let radius = (100.0 - (layer.z - 10.0).powi(2)).sqrt();
        for point in layer.outline[0].points() {
            let distance = (section.iter())
                .map(|x| distance_to_segment(point, &x.a, &x.b))
                .fold(f64::INFINITY, f64::min);
            assert!(distance < 0.05, "layer {} is {distance} off", layer.index);
            assert!((point.norm() - radius).abs() < 1.0);
        }
    }

    let fill = (output.events.iter()).any(|x| {
        matches!(&x.motion, Motion::Comment { text } if text == "TYPE:FILL" || text == "TYPE:SKIN")
    });
    assert!(!fill);
}

#[test]
fn overhanging_t_shape() {
    let t = cuboids(&[
        (Pos::new(0.0, 0.0, 0.0), Pos::new(10.0, 10.0, 15.0)),
        (Pos::new(-5.0, 0.0, 15.0), Pos::new(15.0, 10.0, 20.0)),
    ]);
    let config = SliceConfig {
        support: SupportMode::TouchingBed,
        overhang_angle: 45.0,
        ..Default::default()
    };
    let output = slice(t, config);

    let below = (output.layers.layers.iter())
        .filter(|x| x.z < 15.0)
        .collect::<Vec<_>>();
    assert_eq!(below.len(), 75);

    for layer in below {
        let support = &layer.support.outline;
        for inside in [(-4.0, 5.0), (-2.5, 5.0), (-0.6, 5.0), (12.5, 5.0), (14.0, 5.0)] {
            assert!(region_contains(support, &Point::new(inside.0, inside.1)), "layer {}", layer.index);
        }
        // Clearance around the stem.
        for outside in [(-0.3, 5.0), (5.0, 5.0), (10.3, 5.0)] {
            assert!(!region_contains(support, &Point::new(outside.0, outside.1)), "layer {}", layer.index);
        }
    }

    let above = output.layers.layers.iter().filter(|x| x.z > 15.0);
    assert!(above.into_iter().all(|x| x.support.outline.is_empty()));
}

#[test]
fn spiral_vase() {
    let cylinder = PrimitiveSolid::new(SolidKind::Cylinder {
        radius: 10.0,
        height: 20.0,
        segments: 64,
    })
    .build();
    let config = SliceConfig {
        joris: true,
        wall_thickness: 0.4,
        edge_width: 0.4,
        top_bottom_layers: 0,
        ..Default::default()
    };
    let output = slice(cylinder, config);
    let events = &output.events;

    let first = events.iter().position(MotionEvent::is_extrude).unwrap();
    assert!(events[first..].iter().all(|x| !x.is_travel()));

    let start = events[..first].iter().rev().find_map(MotionEvent::target).unwrap();
    assert!((start.z - 0.1).abs() < 1e-9);

    let path = (events[first..].iter())
        .filter(|x| x.is_extrude())
        .filter_map(MotionEvent::target)
        .collect::<Vec<_>>();

    let mut last = start;
    let mut winding = 0.0;
    for point in path.iter() {
        assert!(point.z > last.z, "{} after {}", point.z, last.z);
        let turn = point.y.atan2(point.x) - last.y.atan2(last.x);
        winding += (turn + TAU / 2.0).rem_euclid(TAU) - TAU / 2.0;
        last = *point;
    }

    assert!((last.z - 20.0).abs() < 1e-9);
    assert!((winding / TAU - 100.0).abs() < 0.01, "{}", winding / TAU);
}

#[test]
fn spiral_vase_with_skirt() {
    let cylinder = PrimitiveSolid::new(SolidKind::Cylinder {
        radius: 10.0,
        height: 2.0,
        segments: 64,
    })
    .build();
    let config = SliceConfig {
        joris: true,
        wall_thickness: 0.4,
        edge_width: 0.4,
        top_bottom_layers: 0,
        skirt_line_count: 2,
        ..Default::default()
    };
    let output = slice(cylinder, config);
    assert_eq!(output.layers.layers[0].skirt.len(), 2);

    let events = &output.events;
    let is_comment = |event: &MotionEvent, name: &str| {
        matches!(&event.motion, Motion::Comment { text } if text == name)
    };
    let skirt = events.iter().position(|x| is_comment(x, "TYPE:SKIRT")).unwrap();
    let wall = events.iter().position(|x| is_comment(x, "TYPE:WALL-OUTER")).unwrap();
    assert_eq!(events.iter().filter(|x| is_comment(x, "TYPE:SKIRT")).count(), 1);
    assert!(skirt < wall);

    // Skirt lines sit outside the gap, the helix starts after them.
    let skirt_moves = (events[skirt..wall].iter())
        .filter(|x| x.is_extrude())
        .filter_map(MotionEvent::target)
        .collect::<Vec<_>>();
    assert!(!skirt_moves.is_empty());
    assert!(skirt_moves.iter().all(|x| x.xy().norm() > 12.0));

    let helix = (events[wall..].iter())
        .filter(|x| x.is_extrude())
        .filter_map(MotionEvent::target)
        .collect::<Vec<_>>();
    assert!(helix.iter().all(|x| x.xy().norm() < 10.0));
    assert!(helix.windows(2).all(|x| x[1].z > x[0].z));
    assert!((helix.last().unwrap().z - 2.0).abs() < 1e-9);
}

#[test]
fn cooling_clamp() {
    let pin = cuboids(&[(Pos::zeros(), Pos::new(1.0, 1.0, 20.0))]);
    let config = SliceConfig {
        min_layer_time: 10.0,
        min_feedrate: 5.0,
        print_speed: 60.0,
        ..Default::default()
    };
    let output = slice(pin, config);

    for (head, layer) in layers(&output.events) {
        let feeds = (layer.iter())
            .filter(|x| x.is_extrude() || x.is_travel())
            .filter_map(MotionEvent::feed)
            .collect::<Vec<_>>();
        assert!(feeds.iter().all(|&x| x >= 5.0 - 1e-9));

        let time = layer_time(layer, head);
        let clamped = feeds.iter().all(|&x| (x - 5.0).abs() < 1e-9);
        assert!(time >= 10.0 - 1e-6 || clamped, "{time}s with {feeds:?}");
    }

    assert!(output
        .diagnostics
        .iter()
        .any(|x| matches!(x, Diagnostic::CoolingSaturated { .. })));
}

#[test]
fn retraction_on_travel() {
    let squares = cuboids(&[
        (Pos::new(0.0, 0.0, 0.0), Pos::new(10.0, 10.0, 1.0)),
        (Pos::new(30.0, 0.0, 0.0), Pos::new(40.0, 10.0, 1.0)),
    ]);
    let config = SliceConfig {
        retraction_amount: 4.5,
        retraction_min_travel: 5.0,
        ..Default::default()
    };
    let output = slice(squares, config.clone());

    let layers = layers(&output.events);
    assert_eq!(layers.len(), 5);
    for (_, layer) in layers {
        let retracts = (layer.iter().enumerate())
            .filter(|(_, x)| matches!(x.motion, Motion::Retract { .. }))
            .map(|(i, _)| i)
            .collect::<Vec<_>>();
        assert_eq!(retracts.len(), 1);

        let i = retracts[0];
        let from = layer[..i].iter().rev().find_map(MotionEvent::target).unwrap();
        let to = layer[i + 1].target().unwrap();
        assert!(layer[i + 1].is_travel());
        assert!((to.xy() - from.xy()).norm() > 20.0);
        assert!(matches!(layer[i + 2].motion, Motion::Unretract { length, .. } if length == 4.5));
    }

    // Any long travel between two extrusions is retracted.
    let mut last_extrude = None::<Pos>;
    let mut head = Pos::zeros();
    let mut retracted = false;
    for event in output.events.iter() {
        match event.motion {
            Motion::Retract { .. } => retracted = true,
            Motion::Extrude { to, .. } => {
                if let Some(last) = last_extrude {
                    if (head.xy() - last.xy()).norm() > config.retraction_min_travel {
                        assert!(retracted);
                    }
                }
                retracted = false;
                last_extrude = Some(to);
            }
            _ => {}
        }
        if let Some(to) = event.target() {
            head = to;
        }
    }
}

#[test]
fn extruded_volume() {
    let cube = PrimitiveSolid::new(SolidKind::Cube {
        size: Pos::new(12.0, 7.0, 3.0),
    })
    .build();
    let config = SliceConfig {
        retraction_amount: 2.0,
        ..Default::default()
    };
    let output = slice(cube, config);

    let mut head = Pos::zeros();
    let (mut expected, mut total) = (0.0, 0.0);
    for event in output.events.iter() {
        if let Motion::Extrude { to, e, .. } = event.motion {
            expected += (to.xy() - head.xy()).norm() * 0.4 * 0.2;
            total += e;
        }
        if let Some(to) = event.target() {
            head = to;
        }
    }

    assert!(expected > 0.0);
    assert!((total - expected).abs() < 1e-6);
    assert!((output.stats.extruded - total).abs() < 1e-9);
}
