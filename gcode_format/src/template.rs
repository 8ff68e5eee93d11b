//! `{token}` substitution for the start and end G-code.
//!
//! A token directly after an `F` that names a speed is written in mm/min,
//! so `G1 F{travel_speed}` works as expected. Unknown tokens are replaced
//! with `?token?` to make them easy to spot in the output.

use std::time::Duration;

use chrono::{DateTime, Local};
use common::{
    config::SliceConfig,
    misc::{human_duration, trim_float},
};

use crate::stats::GcodeStats;

const SPEEDS: &[&str] = &[
    "print_speed",
    "travel_speed",
    "first_layer_speed",
    "retraction_speed",
    "min_feedrate",
];

pub struct TemplateContext<'a> {
    pub config: &'a SliceConfig,
    pub stats: &'a GcodeStats,
    pub now: DateTime<Local>,
}

impl TemplateContext<'_> {
    fn lookup(&self, token: &str, feed: bool) -> String {
        let config = self.config;
        let value = match token {
            "time" => return self.now.format("%H:%M:%S").to_string(),
            "date" => return self.now.format("%d-%m-%Y").to_string(),
            "day" => return self.now.format("%a").to_string(),
            "print_time" => {
                let seconds = self.stats.print_time.max(0.0);
                return human_duration(Duration::from_secs_f64(seconds));
            }
            "filament_amount" => return trim_float(self.stats.filament_amount, 2),
            "layer_count" => return self.stats.layers.to_string(),

            "print_speed" => config.print_speed,
            "travel_speed" => config.travel_speed,
            "first_layer_speed" => config.first_layer_speed,
            "retraction_speed" => config.retraction_speed,
            "min_feedrate" => config.min_feedrate,
            "layer_height" => config.layer_height,
            "edge_width" => config.edge_width,
            "nozzle_size" => config.nozzle_size,
            "print_temperature" => config.print_temperature,
            "filament_diameter" => config.filament_diameter,
            "retraction_amount" => config.retraction_amount,
            _ => return format!("?{token}?"),
        };

        match feed && SPEEDS.contains(&token) {
            true => trim_float(value * 60.0, 1),
            false => trim_float(value, 3),
        }
    }
}

/// Replaces every `{token}` in the template.
pub fn substitute(template: &str, context: &TemplateContext) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];

        let token = after
            .find('}')
            .map(|end| &after[..end])
            .filter(|x| !x.is_empty() && x.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));

        match token {
            Some(token) => {
                let feed = out.ends_with('F');
                out.push_str(&context.lookup(token, feed));
                rest = &after[token.len() + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use proptest::prelude::*;

    use super::*;

    fn render(template: &str) -> String {
        let config = SliceConfig::default();
        let stats = GcodeStats {
            filament_amount: 1234.5678,
            print_time: 90.0,
            layers: 50,
            retracts: 0,
        };
        let context = TemplateContext {
            config: &config,
            stats: &stats,
            now: Local.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap(),
        };
        substitute(template, &context)
    }

    #[test]
    fn default_start_gcode() {
        assert_eq!(
            render(&SliceConfig::default().start_gcode),
            ";Sliced at: Tue 05-03-2024 14:07:09\n;Layer height: 0.2"
        );
    }

    #[test]
    fn tokens() {
        assert_eq!(render("G1 F{travel_speed}"), "G1 F9000");
        assert_eq!(render("speed {travel_speed}"), "speed 150");
        assert_eq!(render(";{filament_amount} {print_time}"), ";1234.57 1m 30.00s");
        assert_eq!(render("{layer_count} layers"), "50 layers");
        assert_eq!(render("M104 S{nonsense}"), "M104 S?nonsense?");
        assert_eq!(render("{ not a token } {}"), "{ not a token } {}");
        assert_eq!(render("open {layer_height"), "open {layer_height");
    }

    proptest! {
        #[test]
        fn text_without_braces_is_kept(text in "[^{}]*") {
            prop_assert_eq!(render(&text), text);
        }

        #[test]
        fn known_tokens_leave_no_braces(prefix in "[a-zA-Z ;]{0,8}") {
            let out = render(&format!("{prefix}{{layer_height}}{{print_speed}}"));
            prop_assert!(!out.contains('{') && !out.contains('?'), "unexpected brace or '?' in {:?}", out);
        }
    }
}
