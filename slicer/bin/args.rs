use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use common::{
    catalogue::ConfigCatalogue,
    config::{parse_override, ConfigError, SliceConfig},
};
use tracing::level_filters::LevelFilter;

#[derive(Debug, Parser)]
/// Slices a mesh into G-code for filament printers.
pub struct Args {
    /// Mesh to slice (.stl, .obj, .gts or .dae), or a scene document when
    /// --scene is given.
    pub input: PathBuf,

    #[arg(short, long)]
    /// File to write the G-code to.
    pub output: PathBuf,

    #[arg(long = "config", value_name = "KEY=VALUE", value_parser = override_parser)]
    /// Overrides a config option, may be repeated. Applied after the saved
    /// config or the chosen profile.
    pub overrides: Vec<(String, String)>,

    #[arg(long)]
    /// Starts from a named profile instead of the saved config.
    pub profile: Option<String>,

    #[arg(long)]
    /// TOML file with extra `[profiles.<name>]` tables.
    pub profiles: Option<PathBuf>,

    #[arg(long)]
    /// Reads the input as a TOML scene of primitives, meshes and boolean
    /// operations.
    pub scene: bool,

    #[arg(short, long, action = ArgAction::Count)]
    /// Logs more, repeat for even more.
    pub verbose: u8,
}

impl Args {
    /// Builds the config: the saved config or a profile, then the
    /// overrides.
    pub fn slice_config(&self) -> Result<SliceConfig> {
        let mut config = match &self.profile {
            Some(name) => {
                let catalogue = match &self.profiles {
                    Some(path) => {
                        let source = fs::read_to_string(path)
                            .with_context(|| format!("reading profiles `{}`", path.display()))?;
                        ConfigCatalogue::from_toml_str(&source)?
                    }
                    None => ConfigCatalogue::builtin(),
                };
                catalogue.get(name)?.clone()
            }
            None => match SliceConfig::config_dir() {
                Some(dir) => SliceConfig::load_or_default(&dir),
                None => SliceConfig::default(),
            },
        };

        config.apply_overrides(&self.overrides)?;
        Ok(config)
    }

    pub fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::INFO,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }
}

fn override_parser(raw: &str) -> Result<(String, String), ConfigError> {
    parse_override(raw)
}
