//! Per layer construction: perimeters, skin, sparse infill, support, skirt
//! and raft.

use std::f64::consts::FRAC_PI_2;

use common::{
    config::{InfillPattern, SliceConfig, SupportMode},
    math::Point,
    progress::{CancelToken, Progress},
};
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::{debug, info};

use crate::{
    carve::LoopLayer,
    diagnostics::{Diagnostic, Diagnostics},
    error::SliceError,
    geometry::{
        difference, fill, intersection, offset,
        polygon::{group_islands, region_bounds},
        FillSettings, Polygon, Polyline,
    },
};

pub mod raft;
pub mod skirt;
pub mod support;

/// One connected region of a layer with its toolpath geometry.
#[derive(Debug, Clone, Default)]
pub struct Island {
    /// Outer loop followed by its holes.
    pub outline: Vec<Polygon>,
    /// Outermost wall, half a line width inside the outline.
    pub perimeters: Vec<Polygon>,
    /// Inner walls, outermost first.
    pub loops: Vec<Vec<Polygon>>,
    pub skin: Vec<Polyline>,
    pub infill: Vec<Polyline>,
}

#[derive(Debug, Clone, Default)]
pub struct SupportGeometry {
    pub outline: Vec<Polygon>,
    pub fill: Vec<Polyline>,
}

#[derive(Debug, Clone, Default)]
pub struct LayerGeometry {
    pub index: usize,
    /// Height of the carved plane, where the nozzle sits while printing the
    /// layer.
    pub z: f64,
    pub thickness: f64,
    pub outline: Vec<Polygon>,
    pub islands: Vec<Island>,
    pub support: SupportGeometry,
    pub skirt: Vec<Polygon>,
}

#[derive(Debug, Clone, Default)]
pub struct RaftLayer {
    pub index: usize,
    pub z: f64,
    pub thickness: f64,
    pub width: f64,
    pub lines: Vec<Polyline>,
}

#[derive(Debug, Clone, Default)]
pub struct LayerStack {
    pub raft: Vec<RaftLayer>,
    pub layers: Vec<LayerGeometry>,
    /// Highest point of the model, after any raft lift.
    pub top_z: f64,
}

/// Builds the printable geometry of every carved layer. Islands are built in
/// parallel, support needs the whole stack and is added afterwards.
pub fn build_layers(
    carved: &[LoopLayer],
    config: &SliceConfig,
    top_z: f64,
    diagnostics: &Diagnostics,
    progress: &Progress,
    cancel: &CancelToken,
) -> Result<LayerStack, SliceError> {
    let outlines = carved.iter().map(|x| x.loops.as_slice()).collect::<Vec<_>>();

    let mut layers = (0..carved.len())
        .into_par_iter()
        .map(|k| {
            if cancel.is_cancelled() {
                return Err(SliceError::Cancelled);
            }

            let layer = build_layer(&carved[k], &outlines, config, diagnostics);
            progress.add_complete(1);
            Ok(layer)
        })
        .collect::<Result<Vec<_>, _>>()?;

    if config.support != SupportMode::None {
        support::add_support(&mut layers, &outlines, config);
    }

    if config.skirt_line_count > 0 {
        if let Some(first) = layers.first_mut() {
            first.skirt = skirt::skirt(first, config);
        }
    }

    let mut stack = LayerStack {
        raft: Vec::new(),
        layers,
        top_z,
    };

    if config.raft {
        raft::add_raft(&mut stack, config);
    }

    info!(
        layers = stack.layers.len(),
        raft = stack.raft.len(),
        "Built layer geometry"
    );
    Ok(stack)
}

/// Line angle of a layer, rotated by 90° on alternate layers.
pub fn layer_angle(config: &SliceConfig, index: usize) -> f64 {
    config.infill_angle.to_radians() + FRAC_PI_2 * (index % 2) as f64
}

fn build_layer(
    layer: &LoopLayer,
    outlines: &[&[Polygon]],
    config: &SliceConfig,
    diagnostics: &Diagnostics,
) -> LayerGeometry {
    let k = layer.index;
    let core = core_region(k, outlines, config.top_bottom_layers as usize);

    let islands = group_islands(&layer.loops)
        .into_iter()
        .map(|outline| build_island(k, outline, &core, config, diagnostics))
        .collect::<Vec<_>>();

    debug!(layer = k, islands = islands.len(), "Built layer");
    LayerGeometry {
        index: k,
        z: layer.z,
        thickness: config.layer_height,
        outline: layer.loops.clone(),
        islands,
        ..Default::default()
    }
}

/// Region covered by every layer within `top_bottom` layers of layer `k`.
/// Layers beyond the stack count as empty, so the first and last layers get
/// no core. Parts of a layer outside its core are printed as solid skin.
pub fn core_region(k: usize, outlines: &[&[Polygon]], top_bottom: usize) -> Vec<Polygon> {
    if top_bottom == 0 {
        return outlines[k].to_vec();
    }
    if k < top_bottom || k + top_bottom >= outlines.len() {
        return Vec::new();
    }

    let mut core = outlines[k].to_vec();
    for outline in outlines[k - top_bottom..=k + top_bottom].iter() {
        if core.is_empty() {
            break;
        }
        core = intersection(&core, outline);
    }
    core
}

fn build_island(
    layer: usize,
    outline: Vec<Polygon>,
    core: &[Polygon],
    config: &SliceConfig,
    diagnostics: &Diagnostics,
) -> Island {
    let (width, precision) = (config.edge_width, config.precision());
    let count = config.perimeter_count();

    let perimeters = if count > 0 {
        offset(&outline, width / 2.0, precision)
    } else {
        Vec::new()
    };
    if count > 0 && perimeters.is_empty() {
        diagnostics.push(Diagnostic::EmptyInset { layer });
    }

    let loops = (1..count)
        .map(|i| offset(&outline, width / 2.0 + i as f64 * width, precision))
        .take_while(|x| !x.is_empty())
        .collect::<Vec<_>>();

    let region = offset(&outline, count as f64 * width, precision);
    let angle = layer_angle(config, layer);

    let skin = difference(&region, core);
    let skin = fill(
        &skin,
        &FillSettings {
            zigzag: config.infill_zigzag,
            ..FillSettings::linear(angle, width)
        },
    );

    let infill = match config.fill_spacing(config.fill_density) {
        Some(spacing) => fill(
            &intersection(&region, core),
            &FillSettings {
                pattern: config.infill_pattern,
                angle: match config.infill_pattern {
                    InfillPattern::Linear => angle,
                    _ => config.infill_angle.to_radians(),
                },
                spacing,
                zigzag: config.infill_zigzag,
                seed: config.random_seed ^ layer as u64,
            },
        ),
        None => Vec::new(),
    };

    Island {
        outline,
        perimeters,
        loops,
        skin,
        infill,
    }
}

/// Replicates the loops of every layer `copies` times along +X, stepping
/// by the model width plus `spacing`.
pub fn multiply(layers: &mut [LoopLayer], copies: u32, spacing: f64) {
    if copies <= 1 {
        return;
    }

    let all = layers.iter().flat_map(|x| x.loops.iter().cloned()).collect::<Vec<_>>();
    if all.is_empty() {
        return;
    }

    let (min, max) = region_bounds(&all);
    let step = max.x - min.x + spacing;
    for layer in layers.iter_mut() {
        let original = layer.loops.clone();
        for copy in 1..copies {
            layer.loops.extend(original.iter().cloned().map(|mut x| {
                x.translate(Point::new(step * copy as f64, 0.0));
                x
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::polygon::{region_area, tests::square};

    fn carved(count: usize, loops: Vec<Polygon>) -> Vec<LoopLayer> {
        (0..count)
            .map(|index| LoopLayer {
                index,
                z: 0.1 + 0.2 * index as f64,
                loops: loops.clone(),
                open_chains: 0,
            })
            .collect()
    }

    fn build(carved: &[LoopLayer], config: &SliceConfig) -> LayerStack {
        build_layers(
            carved,
            config,
            10.0,
            &Diagnostics::new(),
            &Progress::new(),
            &CancelToken::new(),
        )
        .unwrap()
    }

    #[test]
    fn walls_and_fill() {
        let config = SliceConfig::default();
        let stack = build(&carved(10, vec![square((0.0, 0.0), 10.0)]), &config);
        assert_eq!(stack.layers.len(), 10);

        let island = &stack.layers[5].islands[0];
        assert_eq!(island.outline.len(), 1);
        assert!((region_area(&island.perimeters) - 9.6 * 9.6).abs() < 1e-6);
        assert_eq!(island.loops.len(), 1);
        assert!((region_area(&island.loops[0]) - 8.8 * 8.8).abs() < 1e-6);

        // Middle layers are sparse, the bottom and top three are solid.
        assert!(island.skin.is_empty());
        assert!(!island.infill.is_empty());
        for k in [0, 2, 7, 9] {
            let island = &stack.layers[k].islands[0];
            assert!(!island.skin.is_empty(), "layer {k}");
            assert!(island.infill.is_empty(), "layer {k}");
        }
    }

    #[test]
    fn skin_under_top_surface() {
        // A 10x10 base with a 4x4 pillar on top of it: the base layers under
        // the open top surface need skin only where the pillar is missing.
        let mut carved = carved(8, vec![square((0.0, 0.0), 10.0)]);
        for layer in carved[4..].iter_mut() {
            layer.loops = vec![square((3.0, 3.0), 4.0)];
        }

        let config = SliceConfig {
            top_bottom_layers: 2,
            ..Default::default()
        };
        let stack = build(&carved, &config);
        let island = &stack.layers[2].islands[0];
        assert!(!island.skin.is_empty());
        assert!(!island.infill.is_empty());
    }

    #[test]
    fn alternating_angles() {
        let config = SliceConfig::default();
        assert_eq!(layer_angle(&config, 0), 0.0);
        assert_eq!(layer_angle(&config, 1), FRAC_PI_2);
        assert_eq!(layer_angle(&config, 2), 0.0);
    }

    #[test]
    fn no_infill_without_density() {
        let config = SliceConfig {
            fill_density: 0.0,
            top_bottom_layers: 0,
            ..Default::default()
        };
        let stack = build(&carved(3, vec![square((0.0, 0.0), 10.0)]), &config);
        let islands = stack.layers.iter().flat_map(|x| &x.islands);
        for island in islands {
            assert!(island.infill.is_empty() && island.skin.is_empty());
        }
    }

    #[test]
    fn thin_walls_are_reported() {
        let diagnostics = Diagnostics::new();
        let thin = Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 0.2),
            Point::new(0.0, 0.2),
        ]);
        build_layers(
            &carved(1, vec![thin]),
            &SliceConfig::default(),
            1.0,
            &diagnostics,
            &Progress::new(),
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(diagnostics.entries(), vec![Diagnostic::EmptyInset { layer: 0 }]);
    }

    #[test]
    fn copies_step_along_x() {
        let mut layers = carved(2, vec![square((0.0, 0.0), 10.0)]);
        multiply(&mut layers, 3, 5.0);

        assert_eq!(layers[1].loops.len(), 3);
        let (min, max) = region_bounds(&layers[1].loops);
        assert_eq!(min, Point::new(0.0, 0.0));
        assert_eq!(max, Point::new(40.0, 10.0));
    }
}
