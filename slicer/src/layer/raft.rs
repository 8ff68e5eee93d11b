use std::f64::consts::FRAC_PI_2;

use common::config::SliceConfig;
use tracing::debug;

use crate::geometry::{fill, offset, union, FillSettings};

use super::{LayerStack, RaftLayer};

/// Adds the raft under the first layer: thick base lines followed by thin
/// interface lines across them. Every model layer is lifted by the total
/// raft thickness.
pub fn add_raft(stack: &mut LayerStack, config: &SliceConfig) {
    let Some(first) = stack.layers.first() else {
        return;
    };

    let width = config.edge_width;
    let footprint = union(&first.outline, &first.support.outline);
    let outline = offset(&footprint, -config.raft_margin, config.precision());

    let base = (0..config.raft_base_layers).map(|_| {
        (
            config.raft_base_thickness,
            width * 2.0,
            FillSettings::linear(0.0, width * 4.0),
        )
    });
    let interface = (0..config.raft_interface_layers).map(|_| {
        (
            config.raft_interface_thickness,
            width,
            FillSettings::linear(FRAC_PI_2, width * 2.0),
        )
    });

    let mut z = 0.0;
    for (index, (thickness, width, settings)) in base.chain(interface).enumerate() {
        z += thickness;
        stack.raft.push(RaftLayer {
            index,
            z,
            thickness,
            width,
            lines: fill(&outline, &settings),
        });
    }

    for layer in stack.layers.iter_mut() {
        layer.z += z;
    }
    stack.top_z += z;
    debug!(layers = stack.raft.len(), lift = z, "Added raft");
}
