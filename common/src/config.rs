use std::{
    fmt::{self, Display},
    fs, io,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown config key `{0}`")]
    UnknownKey(String),
    #[error("can't parse `{value}` for `{key}`, expected {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },
    #[error("`{key}` = {value} is out of range, expected {expected}")]
    OutOfRange {
        key: &'static str,
        value: f64,
        expected: &'static str,
    },
    #[error("override `{0}` is not of the form KEY=VALUE")]
    MalformedOverride(String),
    #[error("invalid layer sequence `{0}`")]
    InvalidSequence(String),
    #[error("unknown profile `{0}`")]
    UnknownProfile(String),
    #[error("failed to read config: {0}")]
    Io(#[from] io::Error),
    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum InfillPattern {
    #[default]
    Linear,
    Hex,
    Rect,
    Random,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SupportMode {
    #[default]
    None,
    TouchingBed,
    Everywhere,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SequenceStep {
    Perimeter,
    Loops,
    Infill,
}

/// Order in which the categories of a layer are printed.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(try_from = "String", into = "String")]
pub struct LayerSequence(pub [SequenceStep; 3]);

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SliceConfig {
    pub layer_height: f64,
    pub edge_width: f64,
    pub wall_thickness: f64,
    pub top_bottom_layers: u32,
    pub fill_density: f64,
    pub infill_pattern: InfillPattern,
    pub print_speed: f64,
    pub travel_speed: f64,
    pub first_layer_speed: f64,
    pub retraction_amount: f64,
    pub retraction_speed: f64,
    pub retraction_min_travel: f64,
    pub combing: bool,
    pub min_layer_time: f64,
    pub min_feedrate: f64,
    pub support: SupportMode,
    pub overhang_angle: f64,
    pub raft: bool,
    pub sequence: LayerSequence,
    pub force_first_layer_sequence: bool,
    pub joris: bool,
    pub nozzle_size: f64,

    // Carving
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_layer_z: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import_radius: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision: Option<f64>,
    pub scale: f64,
    pub rotate: f64,
    pub flip_x: bool,
    pub flip_y: bool,
    pub flip_z: bool,

    // Extrusion
    pub extrusion_multiplier: f64,
    pub relative_e: bool,
    pub filament_diameter: f64,
    pub print_temperature: f64,
    pub fan_enabled: bool,

    // Raft and support
    pub raft_base_layers: u32,
    pub raft_interface_layers: u32,
    pub raft_margin: f64,
    pub raft_base_thickness: f64,
    pub raft_interface_thickness: f64,
    pub support_clearance: f64,
    pub support_fill_density: f64,

    // Skirt and copies
    pub skirt_line_count: u32,
    pub skirt_gap: f64,
    pub copies: u32,
    pub copy_spacing: f64,

    // Infill
    pub infill_angle: f64,
    pub infill_zigzag: bool,
    pub random_seed: u64,

    // Output
    pub start_gcode: String,
    pub end_gcode: String,
    pub gcode_small: bool,
}

impl SliceConfig {
    /// Loads `config.toml` from the given directory, falling back to the
    /// defaults if it is missing or broken.
    pub fn load_or_default(config_dir: &Path) -> Self {
        match Self::load(config_dir) {
            Ok(config) => config,
            Err(err) => {
                warn!("Failed to load config, using defaults: {}", err);
                Self::default()
            }
        }
    }

    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_file = config_dir.join("config.toml");
        Ok(if config_file.exists() {
            let file = fs::read(&config_file)?;
            let string = String::from_utf8_lossy(&file);
            let config = toml::from_str(&string)?;
            info!("Successfully loaded config file");
            config
        } else {
            info!("No config file found, using defaults");
            Self::default()
        })
    }

    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        fs::create_dir_all(config_dir)?;

        let string = toml::to_string(self).map_err(|err| io::Error::other(err.to_string()))?;
        fs::write(config_dir.join("config.toml"), string)?;
        Ok(())
    }

    /// Directory holding the user's `config.toml`.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|x| x.join("slicer"))
    }

    /// Sets one option from its textual form. Ranges are checked by
    /// [`SliceConfig::validate`] once every override has been applied.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        match key {
            "layer_height" => self.layer_height = parse(key, value)?,
            "edge_width" => self.edge_width = parse(key, value)?,
            "wall_thickness" => self.wall_thickness = parse(key, value)?,
            "top_bottom_layers" => self.top_bottom_layers = parse(key, value)?,
            "fill_density" => self.fill_density = parse(key, value)?,
            "infill_pattern" => self.infill_pattern = parse(key, value)?,
            "print_speed" => self.print_speed = parse(key, value)?,
            "travel_speed" => self.travel_speed = parse(key, value)?,
            "first_layer_speed" => self.first_layer_speed = parse(key, value)?,
            "retraction_amount" => self.retraction_amount = parse(key, value)?,
            "retraction_speed" => self.retraction_speed = parse(key, value)?,
            "retraction_min_travel" => self.retraction_min_travel = parse(key, value)?,
            "combing" => self.combing = parse(key, value)?,
            "min_layer_time" => self.min_layer_time = parse(key, value)?,
            "min_feedrate" => self.min_feedrate = parse(key, value)?,
            "support" => self.support = parse(key, value)?,
            "overhang_angle" => self.overhang_angle = parse(key, value)?,
            "raft" => self.raft = parse(key, value)?,
            "sequence" => self.sequence = value.parse()?,
            "force_first_layer_sequence" => self.force_first_layer_sequence = parse(key, value)?,
            "joris" => self.joris = parse(key, value)?,
            "nozzle_size" => self.nozzle_size = parse(key, value)?,
            "first_layer_z" => self.first_layer_z = Some(parse(key, value)?),
            "import_radius" => self.import_radius = Some(parse(key, value)?),
            "precision" => self.precision = Some(parse(key, value)?),
            "scale" => self.scale = parse(key, value)?,
            "rotate" => self.rotate = parse(key, value)?,
            "flip_x" => self.flip_x = parse(key, value)?,
            "flip_y" => self.flip_y = parse(key, value)?,
            "flip_z" => self.flip_z = parse(key, value)?,
            "extrusion_multiplier" => self.extrusion_multiplier = parse(key, value)?,
            "relative_e" => self.relative_e = parse(key, value)?,
            "filament_diameter" => self.filament_diameter = parse(key, value)?,
            "print_temperature" => self.print_temperature = parse(key, value)?,
            "fan_enabled" => self.fan_enabled = parse(key, value)?,
            "raft_base_layers" => self.raft_base_layers = parse(key, value)?,
            "raft_interface_layers" => self.raft_interface_layers = parse(key, value)?,
            "raft_margin" => self.raft_margin = parse(key, value)?,
            "raft_base_thickness" => self.raft_base_thickness = parse(key, value)?,
            "raft_interface_thickness" => self.raft_interface_thickness = parse(key, value)?,
            "support_clearance" => self.support_clearance = parse(key, value)?,
            "support_fill_density" => self.support_fill_density = parse(key, value)?,
            "skirt_line_count" => self.skirt_line_count = parse(key, value)?,
            "skirt_gap" => self.skirt_gap = parse(key, value)?,
            "copies" => self.copies = parse(key, value)?,
            "copy_spacing" => self.copy_spacing = parse(key, value)?,
            "infill_angle" => self.infill_angle = parse(key, value)?,
            "infill_zigzag" => self.infill_zigzag = parse(key, value)?,
            "random_seed" => self.random_seed = parse(key, value)?,
            "start_gcode" => self.start_gcode = unescape_newlines(value),
            "end_gcode" => self.end_gcode = unescape_newlines(value),
            "gcode_small" => self.gcode_small = parse(key, value)?,
            _ => return Err(ConfigError::UnknownKey(key.to_owned())),
        }

        Ok(())
    }

    /// Applies a list of `KEY=VALUE` overrides and validates the result.
    pub fn apply_overrides<'a>(
        &mut self,
        overrides: impl IntoIterator<Item = &'a (String, String)>,
    ) -> Result<(), ConfigError> {
        for (key, value) in overrides {
            self.set(key, value)?;
        }

        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("layer_height", self.layer_height)?;
        positive("edge_width", self.edge_width)?;
        positive("nozzle_size", self.nozzle_size)?;
        if self.layer_height > self.nozzle_size {
            return Err(ConfigError::OutOfRange {
                key: "layer_height",
                value: self.layer_height,
                expected: "at most nozzle_size",
            });
        }

        at_least("wall_thickness", self.wall_thickness, 0.0)?;
        within("fill_density", self.fill_density, 0.0, 1.0)?;
        positive("print_speed", self.print_speed)?;
        positive("travel_speed", self.travel_speed)?;
        positive("first_layer_speed", self.first_layer_speed)?;
        at_least("retraction_amount", self.retraction_amount, 0.0)?;
        positive("retraction_speed", self.retraction_speed)?;
        at_least("retraction_min_travel", self.retraction_min_travel, 0.0)?;
        at_least("min_layer_time", self.min_layer_time, 0.0)?;
        positive("min_feedrate", self.min_feedrate)?;

        if !(0.0..90.0).contains(&self.overhang_angle) {
            return Err(ConfigError::OutOfRange {
                key: "overhang_angle",
                value: self.overhang_angle,
                expected: "within [0, 90)",
            });
        }

        if let Some(z) = self.first_layer_z {
            within("first_layer_z", z, 0.0, self.layer_height)?;
        }
        if let Some(radius) = self.import_radius {
            positive("import_radius", radius)?;
        }
        if let Some(precision) = self.precision {
            positive("precision", precision)?;
        }

        positive("scale", self.scale)?;
        positive("extrusion_multiplier", self.extrusion_multiplier)?;
        at_least("filament_diameter", self.filament_diameter, 0.0)?;
        at_least("print_temperature", self.print_temperature, 0.0)?;
        at_least("raft_margin", self.raft_margin, 0.0)?;
        positive("raft_base_thickness", self.raft_base_thickness)?;
        positive("raft_interface_thickness", self.raft_interface_thickness)?;
        at_least("support_clearance", self.support_clearance, 0.0)?;
        within("support_fill_density", self.support_fill_density, 0.0, 1.0)?;
        at_least("skirt_gap", self.skirt_gap, 0.0)?;
        at_least("copies", self.copies as f64, 1.0)?;
        at_least("copy_spacing", self.copy_spacing, 0.0)?;

        Ok(())
    }

    pub fn first_layer_z(&self) -> f64 {
        self.first_layer_z.unwrap_or(self.layer_height / 2.0)
    }

    pub fn import_radius(&self) -> f64 {
        self.import_radius.unwrap_or(self.edge_width / 4.0)
    }

    pub fn precision(&self) -> f64 {
        self.precision.unwrap_or(0.2 * self.layer_height)
    }

    /// Number of perimeter walls, `wall_thickness / edge_width` rounded.
    pub fn perimeter_count(&self) -> usize {
        (self.wall_thickness / self.edge_width).round() as usize
    }

    /// Line spacing for a fill of the given density, `None` for an empty
    /// fill.
    pub fn fill_spacing(&self, density: f64) -> Option<f64> {
        (density > 0.0).then(|| self.edge_width / density)
    }

    /// Cross section of the filament, `None` when E is volumetric.
    pub fn filament_area(&self) -> Option<f64> {
        (self.filament_diameter > 0.0)
            .then(|| std::f64::consts::PI * (self.filament_diameter / 2.0).powi(2))
    }

    /// Unit of the E amounts written for this config.
    pub fn extrusion_unit(&self) -> &'static str {
        match self.filament_area() {
            Some(_) => "mm of filament",
            None => "mm³ of plastic",
        }
    }
}

impl Default for SliceConfig {
    fn default() -> Self {
        Self {
            layer_height: 0.2,
            edge_width: 0.4,
            wall_thickness: 0.8,
            top_bottom_layers: 3,
            fill_density: 0.2,
            infill_pattern: InfillPattern::Linear,
            print_speed: 50.0,
            travel_speed: 150.0,
            first_layer_speed: 25.0,
            retraction_amount: 0.0,
            retraction_speed: 13.5,
            retraction_min_travel: 5.0,
            combing: false,
            min_layer_time: 10.0,
            min_feedrate: 5.0,
            support: SupportMode::None,
            overhang_angle: 45.0,
            raft: false,
            sequence: LayerSequence::default(),
            force_first_layer_sequence: true,
            joris: false,
            nozzle_size: 0.4,

            first_layer_z: None,
            import_radius: None,
            precision: None,
            scale: 1.0,
            rotate: 0.0,
            flip_x: false,
            flip_y: false,
            flip_z: false,

            extrusion_multiplier: 1.0,
            relative_e: false,
            filament_diameter: 0.0,
            print_temperature: 210.0,
            fan_enabled: true,

            raft_base_layers: 1,
            raft_interface_layers: 1,
            raft_margin: 3.0,
            raft_base_thickness: 0.3,
            raft_interface_thickness: 0.2,
            support_clearance: 0.5,
            support_fill_density: 1.0,

            skirt_line_count: 0,
            skirt_gap: 3.0,
            copies: 1,
            copy_spacing: 5.0,

            infill_angle: 0.0,
            infill_zigzag: false,
            random_seed: 0,

            start_gcode: ";Sliced at: {day} {date} {time}\n;Layer height: {layer_height}".into(),
            end_gcode: "M104 S0\nG28 X0 Y0\nM84".into(),
            gcode_small: false,
        }
    }
}

/// Splits a `KEY=VALUE` command line override.
pub fn parse_override(raw: &str) -> Result<(String, String), ConfigError> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| ConfigError::MalformedOverride(raw.to_owned()))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(ConfigError::MalformedOverride(raw.to_owned()));
    }

    Ok((key.to_owned(), value.to_owned()))
}

trait ConfigValue: Sized {
    const EXPECTED: &'static str;
    fn parse_value(value: &str) -> Option<Self>;
}

impl ConfigValue for f64 {
    const EXPECTED: &'static str = "a finite number";
    fn parse_value(value: &str) -> Option<Self> {
        value.parse::<f64>().ok().filter(|x| x.is_finite())
    }
}

impl ConfigValue for u32 {
    const EXPECTED: &'static str = "a non-negative integer";
    fn parse_value(value: &str) -> Option<Self> {
        value.parse().ok()
    }
}

impl ConfigValue for u64 {
    const EXPECTED: &'static str = "a non-negative integer";
    fn parse_value(value: &str) -> Option<Self> {
        value.parse().ok()
    }
}

impl ConfigValue for bool {
    const EXPECTED: &'static str = "true or false";
    fn parse_value(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigValue for InfillPattern {
    const EXPECTED: &'static str = "one of linear, hex, rect, random";
    fn parse_value(value: &str) -> Option<Self> {
        Some(match value.to_ascii_lowercase().as_str() {
            "linear" | "line" => Self::Linear,
            "hex" | "hexagonal" => Self::Hex,
            "rect" | "grid" => Self::Rect,
            "random" => Self::Random,
            _ => return None,
        })
    }
}

impl ConfigValue for SupportMode {
    const EXPECTED: &'static str = "one of none, touching_bed, everywhere";
    fn parse_value(value: &str) -> Option<Self> {
        Some(match value.to_ascii_lowercase().as_str() {
            "none" => Self::None,
            "touching_bed" => Self::TouchingBed,
            "everywhere" => Self::Everywhere,
            _ => return None,
        })
    }
}

fn parse<T: ConfigValue>(key: &str, value: &str) -> Result<T, ConfigError> {
    T::parse_value(value).ok_or_else(|| ConfigError::InvalidValue {
        key: key.to_owned(),
        value: value.to_owned(),
        expected: T::EXPECTED,
    })
}

fn unescape_newlines(value: &str) -> String {
    value.replace("\\n", "\n")
}

fn positive(key: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        return Ok(());
    }

    Err(ConfigError::OutOfRange {
        key,
        value,
        expected: "greater than zero",
    })
}

fn at_least(key: &'static str, value: f64, min: f64) -> Result<(), ConfigError> {
    if value >= min && value.is_finite() {
        return Ok(());
    }

    Err(ConfigError::OutOfRange {
        key,
        value,
        expected: if min == 0.0 {
            "not negative"
        } else {
            "at least one"
        },
    })
}

fn within(key: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        return Ok(());
    }

    Err(ConfigError::OutOfRange {
        key,
        value,
        expected: "within the allowed interval",
    })
}

impl SequenceStep {
    fn name(&self) -> &'static str {
        match self {
            Self::Perimeter => "Perimeter",
            Self::Loops => "Loops",
            Self::Infill => "Infill",
        }
    }
}

impl FromStr for SequenceStep {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "p" | "perimeter" => Self::Perimeter,
            "l" | "loops" => Self::Loops,
            "i" | "infill" => Self::Infill,
            _ => return Err(ConfigError::InvalidSequence(s.to_owned())),
        })
    }
}

impl LayerSequence {
    /// Order forced onto the first layer for bed adhesion.
    pub const FIRST_LAYER: Self = Self([
        SequenceStep::Perimeter,
        SequenceStep::Loops,
        SequenceStep::Infill,
    ]);

    pub fn steps(&self) -> &[SequenceStep; 3] {
        &self.0
    }
}

impl Default for LayerSequence {
    fn default() -> Self {
        Self([
            SequenceStep::Loops,
            SequenceStep::Perimeter,
            SequenceStep::Infill,
        ])
    }
}

impl FromStr for LayerSequence {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let steps = s
            .split('>')
            .map(SequenceStep::from_str)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| ConfigError::InvalidSequence(s.to_owned()))?;

        match steps[..] {
            [a, b, c] if a != b && b != c && a != c => Ok(Self([a, b, c])),
            _ => Err(ConfigError::InvalidSequence(s.to_owned())),
        }
    }
}

impl TryFrom<String> for LayerSequence {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LayerSequence> for String {
    fn from(value: LayerSequence) -> Self {
        value.to_string()
    }
}

impl Display for LayerSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c] = self.0.map(|x| x.name());
        write!(f, "{a} > {b} > {c}")
    }
}
