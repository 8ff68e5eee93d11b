//! Orders the printable geometry of every layer and turns it into motion
//! events.

use common::{
    config::{LayerSequence, SequenceStep, SliceConfig},
    math::{Point, Pos},
    motion::{Motion, MotionEvent},
    progress::CancelToken,
};
use tracing::{debug, info};

use crate::{
    diagnostics::{Diagnostic, Diagnostics},
    error::{PlanError, SliceError},
    geometry::{Polygon, Polyline},
    layer::{LayerGeometry, LayerStack, RaftLayer},
};

mod cooling;
mod joris;
mod order;
mod retract;

pub use cooling::{layer_time, slow_down, Cooling};
pub use joris::{helix, spiral_loop};
pub use order::{loop_start, order_islands, order_lines, order_loops};
pub use retract::{comb, plan_travel, TravelPlan, TravelScope};

/// Moves shorter than this are dropped.
const MIN_MOVE: f64 = 1e-6;

/// Plans the whole stack into one ordered event stream.
pub fn plan(
    stack: &LayerStack,
    config: &SliceConfig,
    diagnostics: &Diagnostics,
    cancel: &CancelToken,
) -> Result<Vec<MotionEvent>, SliceError> {
    Planner::new(config, diagnostics)?.run(stack, cancel)
}

/// Height, line size and feed of the paths being extruded.
#[derive(Debug, Clone, Copy)]
struct Extrusion {
    z: f64,
    width: f64,
    thickness: f64,
    feed: f64,
}

pub struct Planner<'a> {
    config: &'a SliceConfig,
    diagnostics: &'a Diagnostics,
    filament_area: Option<f64>,

    head: Pos,
    extruded: bool,
    layer_start: Pos,
    layer: Vec<MotionEvent>,
    events: Vec<MotionEvent>,
}

impl<'a> Planner<'a> {
    pub fn new(config: &'a SliceConfig, diagnostics: &'a Diagnostics) -> Result<Self, PlanError> {
        let mut feeds = vec![
            ("print_speed", config.print_speed),
            ("first_layer_speed", config.first_layer_speed),
            ("travel_speed", config.travel_speed),
        ];
        if config.retraction_amount > 0.0 {
            feeds.push(("retraction_speed", config.retraction_speed));
        }
        if let Some((name, _)) = feeds.into_iter().find(|(_, feed)| !(*feed > 0.0 && feed.is_finite())) {
            return Err(PlanError::NoFeedRate(name));
        }

        Ok(Self {
            config,
            diagnostics,
            filament_area: config.filament_area(),

            head: Pos::zeros(),
            extruded: false,
            layer_start: Pos::zeros(),
            layer: Vec::new(),
            events: Vec::new(),
        })
    }

    pub fn run(mut self, stack: &LayerStack, cancel: &CancelToken) -> Result<Vec<MotionEvent>, SliceError> {
        if stack.layers.is_empty() {
            return Err(PlanError::EmptyLayers.into());
        }

        self.events.push(MotionEvent::new(Motion::SetTemperature {
            target: self.config.print_temperature,
            wait: true,
        }));

        for raft in stack.raft.iter() {
            self.raft_layer(raft);
            self.events.append(&mut self.layer);
        }

        for layer in stack.layers.iter() {
            if cancel.is_cancelled() {
                return Err(SliceError::Cancelled);
            }

            self.model_layer(layer, stack.top_z)?;
            self.finish_layer(layer.index);
        }

        if self.config.fan_enabled {
            self.events.push(MotionEvent::extension("fan_off", "M107"));
        }

        info!(events = self.events.len(), "Planned toolpaths");
        Ok(self.events)
    }

    fn raft_layer(&mut self, raft: &RaftLayer) {
        self.begin_layer();
        self.comment(format!("RAFT:{}", raft.index));
        self.comment("TYPE:RAFT");

        let extrusion = Extrusion {
            z: raft.z,
            width: raft.width,
            thickness: raft.thickness,
            feed: self.config.first_layer_speed,
        };
        self.print_lines(&raft.lines, &extrusion, &TravelScope::default());
    }

    fn model_layer(&mut self, layer: &LayerGeometry, top_z: f64) -> Result<(), SliceError> {
        let config = self.config;
        self.begin_layer();
        self.comment(format!("LAYER:{}", layer.index));
        if layer.index == 1 && config.fan_enabled {
            self.layer.push(MotionEvent::extension("fan_on", "M106 S255"));
        }

        let extrusion = Extrusion {
            z: layer.z,
            width: config.edge_width,
            thickness: layer.thickness,
            feed: match layer.index {
                0 => config.first_layer_speed,
                _ => config.print_speed,
            },
        };

        let scope = TravelScope {
            outline: &layer.outline,
            island: None,
        };
        if !layer.skirt.is_empty() {
            self.comment("TYPE:SKIRT");
            self.print_loops(&layer.skirt, &extrusion, &scope);
        }

        if config.joris && layer.index >= config.top_bottom_layers as usize {
            return self.spiral_layer(layer, top_z, &extrusion);
        }

        let sequence = match layer.index {
            0 if config.force_first_layer_sequence => LayerSequence::FIRST_LAYER,
            _ => config.sequence,
        };

        for island in order_islands(&layer.islands, self.head.xy()) {
            let scope = TravelScope {
                outline: &layer.outline,
                island: Some(island),
            };

            for step in sequence.steps() {
                match step {
                    SequenceStep::Perimeter => {
                        self.section("WALL-OUTER", !island.perimeters.is_empty());
                        self.print_loops(&island.perimeters, &extrusion, &scope);
                    }
                    SequenceStep::Loops => {
                        self.section("WALL-INNER", !island.loops.is_empty());
                        self.print_loops(island.loops.iter().flatten(), &extrusion, &scope);
                    }
                    SequenceStep::Infill => {
                        self.section("SKIN", !island.skin.is_empty());
                        self.print_lines(&island.skin, &extrusion, &scope);
                        self.section("FILL", !island.infill.is_empty());
                        self.print_lines(&island.infill, &extrusion, &scope);
                    }
                }
            }
        }

        let support = &layer.support;
        self.section("SUPPORT", !support.outline.is_empty() || !support.fill.is_empty());
        self.print_loops(&support.outline, &extrusion, &scope);
        self.print_lines(&support.fill, &extrusion, &scope);

        Ok(())
    }

    /// Prints the outer wall as one revolution of a helix climbing to the
    /// next layer.
    fn spiral_layer(
        &mut self,
        layer: &LayerGeometry,
        top_z: f64,
        extrusion: &Extrusion,
    ) -> Result<(), SliceError> {
        let Some(polygon) = spiral_loop(layer)? else {
            return Ok(());
        };

        self.comment("TYPE:WALL-OUTER");
        let start = loop_start(polygon, &self.head.xy());
        let scope = TravelScope {
            outline: &layer.outline,
            island: None,
        };

        // Carried straight on from the end of the last revolution when it
        // ends within a line width of this one.
        let point = polygon.points()[start];
        if !self.extruded || (point - self.head.xy()).norm() > extrusion.width {
            self.travel(point, extrusion.z, &scope);
        }

        let to_z = (layer.z + layer.thickness).min(top_z);
        for point in helix(polygon, start, extrusion.z, to_z) {
            self.extrude_to(point, extrusion);
        }
        Ok(())
    }

    fn begin_layer(&mut self) {
        self.layer_start = self.head;
        self.layer.clear();
    }

    /// Slows the layer down if it prints too fast, then moves its events
    /// to the output.
    fn finish_layer(&mut self, index: usize) {
        let cooling = slow_down(
            &mut self.layer,
            self.layer_start,
            self.config.min_layer_time,
            self.config.min_feedrate,
        );
        if cooling.saturated {
            self.diagnostics.push(Diagnostic::CoolingSaturated { layer: index });
        }

        debug!(
            layer = index,
            events = self.layer.len(),
            time = cooling.time,
            factor = cooling.factor,
            "Planned layer"
        );
        self.events.append(&mut self.layer);
    }

    fn comment(&mut self, text: impl Into<String>) {
        self.layer.push(MotionEvent::comment(text));
    }

    fn section(&mut self, kind: &str, present: bool) {
        if present {
            self.comment(format!("TYPE:{kind}"));
        }
    }

    fn print_loops<'p>(
        &mut self,
        loops: impl IntoIterator<Item = &'p Polygon>,
        extrusion: &Extrusion,
        scope: &TravelScope,
    ) {
        for (polygon, start) in order_loops(loops, self.head.xy()) {
            let points = polygon.points();
            self.travel(points[start], extrusion.z, scope);
            for i in 1..=points.len() {
                let point = points[(start + i) % points.len()];
                self.extrude_to(Pos::new(point.x, point.y, extrusion.z), extrusion);
            }
        }
    }

    fn print_lines(&mut self, lines: &[Polyline], extrusion: &Extrusion, scope: &TravelScope) {
        for (line, reversed) in order_lines(lines, self.head.xy()) {
            let points = if reversed {
                line.iter().rev().copied().collect::<Vec<_>>()
            } else {
                line.clone()
            };

            self.travel(points[0], extrusion.z, scope);
            for point in &points[1..] {
                self.extrude_to(Pos::new(point.x, point.y, extrusion.z), extrusion);
            }
        }
    }

    fn travel(&mut self, to: Point, z: f64, scope: &TravelScope) {
        let target = Pos::new(to.x, to.y, z);
        if (target - self.head).norm() < MIN_MOVE {
            return;
        }

        let feed = self.config.travel_speed;
        match plan_travel(self.config, scope, self.extruded, &self.head.xy(), &to) {
            TravelPlan::Direct => self.layer.push(MotionEvent::travel(target, feed)),
            TravelPlan::Retracted => {
                let (length, speed) = (self.config.retraction_amount, self.config.retraction_speed);
                self.layer.extend([
                    MotionEvent::new(Motion::Retract {
                        length,
                        feed: speed,
                    }),
                    MotionEvent::travel(target, feed),
                    MotionEvent::new(Motion::Unretract {
                        length,
                        feed: speed,
                    }),
                ]);
            }
            TravelPlan::Combed(route) => {
                let moves = route.into_iter().map(|x| MotionEvent::travel(Pos::new(x.x, x.y, z), feed));
                self.layer.extend(moves);
            }
        }

        self.head = target;
    }

    /// Extrudes to a point. The filament amount follows the XY length of
    /// the move.
    fn extrude_to(&mut self, to: Pos, extrusion: &Extrusion) {
        let length = (to.xy() - self.head.xy()).norm();
        if length < MIN_MOVE {
            return;
        }

        let volume = length * extrusion.width * extrusion.thickness * self.config.extrusion_multiplier;
        let e = match self.filament_area {
            Some(area) => volume / area,
            None => volume,
        };

        self.layer.push(MotionEvent::extrude(to, extrusion.feed, e));
        self.head = to;
        self.extruded = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        geometry::{offset, polygon::tests::square},
        layer::{Island, SupportGeometry},
    };

    fn island(min: (f64, f64), size: f64) -> Island {
        let outline = vec![square(min, size)];
        Island {
            perimeters: offset(&outline, 0.2, 0.04),
            loops: vec![offset(&outline, 0.6, 0.04)],
            skin: vec![
                vec![Point::new(min.0 + 1.0, min.1 + 1.0), Point::new(min.0 + size - 1.0, min.1 + 1.0)],
                vec![Point::new(min.0 + 1.0, min.1 + 2.0), Point::new(min.0 + size - 1.0, min.1 + 2.0)],
            ],
            outline,
            ..Default::default()
        }
    }

    fn layer(index: usize, islands: Vec<Island>) -> LayerGeometry {
        LayerGeometry {
            index,
            z: 0.1 + 0.2 * index as f64,
            thickness: 0.2,
            outline: islands.iter().flat_map(|x| x.outline.clone()).collect(),
            islands,
            ..Default::default()
        }
    }

    fn stack(layers: Vec<LayerGeometry>) -> LayerStack {
        LayerStack {
            raft: Vec::new(),
            top_z: layers.last().map_or(0.0, |x| x.z + 0.1),
            layers,
        }
    }

    fn run(stack: &LayerStack, config: &SliceConfig) -> Vec<MotionEvent> {
        plan(stack, config, &Diagnostics::new(), &CancelToken::new()).unwrap()
    }

    fn comments(events: &[MotionEvent]) -> Vec<&str> {
        (events.iter())
            .filter_map(|x| match &x.motion {
                Motion::Comment { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn rejects_bad_input() {
        let diagnostics = Diagnostics::new();
        let cancel = CancelToken::new();
        let config = SliceConfig::default();
        assert!(matches!(
            plan(&LayerStack::default(), &config, &diagnostics, &cancel),
            Err(SliceError::Plan(PlanError::EmptyLayers))
        ));

        let config = SliceConfig {
            travel_speed: 0.0,
            ..Default::default()
        };
        let stack = stack(vec![layer(0, vec![island((0.0, 0.0), 10.0)])]);
        assert!(matches!(
            plan(&stack, &config, &diagnostics, &cancel),
            Err(SliceError::Plan(PlanError::NoFeedRate("travel_speed")))
        ));

        cancel.cancel();
        assert!(matches!(
            plan(&stack, &SliceConfig::default(), &diagnostics, &cancel),
            Err(SliceError::Cancelled)
        ));
    }

    #[test]
    fn layer_sequence() {
        let stack = stack(vec![
            layer(0, vec![island((0.0, 0.0), 10.0)]),
            layer(1, vec![island((0.0, 0.0), 10.0)]),
        ]);
        let events = run(&stack, &SliceConfig::default());

        assert!(matches!(events[0].motion, Motion::SetTemperature { wait: true, .. }));
        assert_eq!(
            comments(&events),
            vec![
                "LAYER:0",
                "TYPE:WALL-OUTER",
                "TYPE:WALL-INNER",
                "TYPE:SKIN",
                "LAYER:1",
                "TYPE:WALL-INNER",
                "TYPE:WALL-OUTER",
                "TYPE:SKIN",
            ]
        );

        let fan = (events.iter())
            .filter(|x| matches!(x.motion, Motion::Extension { .. }))
            .count();
        assert_eq!(fan, 2);
        assert!(matches!(&events.last().unwrap().motion, Motion::Extension { line, .. } if line == "M107"));
    }

    #[test]
    fn extrusion_volume() {
        let config = SliceConfig {
            min_layer_time: 0.0,
            ..Default::default()
        };
        let stack = stack(vec![layer(0, vec![island((0.0, 0.0), 10.0)])]);
        let events = run(&stack, &config);

        let mut head = Pos::zeros();
        let (mut expected, mut total) = (0.0, 0.0);
        for event in events.iter() {
            if let Motion::Extrude { to, e, .. } = event.motion {
                expected += (to.xy() - head.xy()).norm() * 0.4 * 0.2;
                total += e;
            }
            if let Some(to) = event.target() {
                head = to;
            }
        }

        // Walls of 9.6 and 8.8 plus two skin lines of 8.
        assert!((expected - (4.0 * 9.6 + 4.0 * 8.8 + 16.0) * 0.08).abs() < 1e-9);
        assert!((total - expected).abs() < 1e-6);
    }

    #[test]
    fn loops_are_closed() {
        let stack = stack(vec![layer(0, vec![island((0.0, 0.0), 10.0)])]);
        let events = run(&stack, &SliceConfig::default());

        // Travel to the wall start, then around back to it.
        let first = events.iter().position(|x| x.is_travel()).unwrap();
        let start = events[first].target().unwrap();
        let end = (events[first + 1..].iter())
            .position(|x| !x.is_extrude())
            .map_or(events.len(), |i| first + 1 + i);

        let wall = &events[first + 1..end];
        assert!(wall.len() >= 4);
        assert_eq!(wall.last().unwrap().target(), Some(start));
        assert!((start - Pos::new(0.2, 0.2, 0.1)).norm() < 1e-9);
    }

    #[test]
    fn retracts_between_islands() {
        let config = SliceConfig {
            retraction_amount: 4.5,
            retraction_min_travel: 5.0,
            min_layer_time: 0.0,
            ..Default::default()
        };
        let stack = stack(vec![
            layer(0, vec![island((0.0, 0.0), 10.0), island((30.0, 0.0), 10.0)]),
            layer(1, vec![island((0.0, 0.0), 10.0), island((30.0, 0.0), 10.0)]),
        ]);
        let events = run(&stack, &config);

        let retracts = events.iter().enumerate().filter(|(_, x)| matches!(x.motion, Motion::Retract { .. }));
        let positions = retracts.map(|(i, _)| i).collect::<Vec<_>>();
        assert_eq!(positions.len(), 2);
        for i in positions {
            assert!(events[i + 1].is_travel());
            assert!(matches!(events[i + 2].motion, Motion::Unretract { length, .. } if length == 4.5));
        }
    }

    #[test]
    fn support_after_islands() {
        let mut layer = layer(0, vec![island((0.0, 0.0), 10.0)]);
        layer.support = SupportGeometry {
            outline: vec![square((12.0, 0.0), 4.0)],
            fill: vec![vec![Point::new(12.5, 1.0), Point::new(15.5, 1.0)]],
        };
        let events = run(&stack(vec![layer]), &SliceConfig::default());
        assert_eq!(comments(&events).last(), Some(&"TYPE:SUPPORT"));
    }

    #[test]
    fn cooling_slows_small_layers() {
        let config = SliceConfig {
            min_layer_time: 10.0,
            min_feedrate: 5.0,
            print_speed: 60.0,
            ..Default::default()
        };
        let diagnostics = Diagnostics::new();
        let stack = stack((0..3).map(|k| layer(k, vec![island((0.0, 0.0), 3.0)])).collect());
        let events = plan(&stack, &config, &diagnostics, &CancelToken::new()).unwrap();

        let feeds = (events.iter())
            .filter(|x| x.is_extrude() || x.is_travel())
            .filter_map(MotionEvent::feed);
        assert!(feeds.clone().all(|x| x >= 5.0 - 1e-9));
        assert!(feeds.clone().all(|x| x < 60.0));
        assert!(!diagnostics.is_empty());
    }
}
