use common::config::{SliceConfig, SupportMode};
use tracing::debug;

use crate::geometry::{difference, fill, offset, union, FillSettings, Polygon};

use super::{layer_angle, LayerGeometry};

/// Parts of each layer that stick out further than the overhang angle allows
/// over the layer below. The first layer rests on the bed and has none.
pub fn overhangs(outlines: &[&[Polygon]], allowed: f64, precision: f64) -> Vec<Vec<Polygon>> {
    let mut out = vec![Vec::new(); outlines.len()];
    for k in 1..outlines.len() {
        let below = offset(outlines[k - 1], -allowed, precision);
        out[k] = difference(outlines[k], &below);
    }
    out
}

/// Region needing support on every layer, before the clearance to the model
/// is removed.
pub fn support_regions(
    outlines: &[&[Polygon]],
    mode: SupportMode,
    allowed: f64,
    precision: f64,
) -> Vec<Vec<Polygon>> {
    let count = outlines.len();
    let mut regions = vec![Vec::new(); count];
    if mode == SupportMode::None || count < 2 {
        return regions;
    }

    let mut overhangs = overhangs(outlines, allowed, precision);
    if mode == SupportMode::TouchingBed {
        // Only keep the columns with nothing but air down to the bed.
        let mut below = outlines[0].to_vec();
        for k in 1..count {
            overhangs[k] = difference(&overhangs[k], &below);
            below = union(&below, outlines[k]);
        }
    }

    // Each layer carries the support of the layer above plus whatever that
    // layer overhangs, minus the model itself.
    for j in (0..count - 1).rev() {
        let carried = union(&regions[j + 1], &overhangs[j + 1]);
        regions[j] = difference(&carried, outlines[j]);
    }

    regions
}

/// Adds support outlines and fill to the layers.
pub fn add_support(layers: &mut [LayerGeometry], outlines: &[&[Polygon]], config: &SliceConfig) {
    let precision = config.precision();
    let allowed = config.layer_height * config.overhang_angle.to_radians().tan();
    let regions = support_regions(outlines, config.support, allowed, precision);

    for (layer, region) in layers.iter_mut().zip(regions) {
        if region.is_empty() {
            continue;
        }

        let model = offset(&layer.outline, -config.support_clearance, precision);
        let outline = difference(&region, &model);
        let fill = match config.fill_spacing(config.support_fill_density) {
            Some(spacing) => fill(
                &outline,
                &FillSettings::linear(layer_angle(config, layer.index), spacing),
            ),
            None => Vec::new(),
        };

        debug!(layer = layer.index, loops = outline.len(), "Added support");
        layer.support.outline = outline;
        layer.support.fill = fill;
    }
}
