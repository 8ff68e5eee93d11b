use common::config::SliceConfig;

use crate::geometry::{offset, union, Polygon};

use super::LayerGeometry;

/// Skirt loops around the first layer, innermost first. Only the outer
/// boundaries of the outsets are kept.
pub fn skirt(layer: &LayerGeometry, config: &SliceConfig) -> Vec<Polygon> {
    let footprint = union(&layer.outline, &layer.support.outline);
    let width = config.edge_width;

    (0..config.skirt_line_count)
        .flat_map(|i| {
            let distance = config.skirt_gap + width / 2.0 + i as f64 * width;
            offset(&footprint, -distance, config.precision())
        })
        .filter(Polygon::is_ccw)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::polygon::tests::square;

    #[test]
    fn skirt_surrounds_islands() {
        let layer = LayerGeometry {
            outline: vec![
                square((0.0, 0.0), 10.0),
                square((4.0, 4.0), 2.0).reversed(),
                square((11.0, 0.0), 10.0),
            ],
            ..Default::default()
        };
        let config = SliceConfig {
            skirt_line_count: 2,
            ..Default::default()
        };

        // The 1 mm gap closes up, so every line is a single loop.
        let skirt = skirt(&layer, &config);
        assert_eq!(skirt.len(), 2);
        let (min, _) = skirt[0].bounds();
        assert!((min.x + 3.2).abs() < 1e-9);
        let (min, _) = skirt[1].bounds();
        assert!((min.x + 3.6).abs() < 1e-9);
    }
}
