//! Named, read-only slicing profiles shared between jobs.

use std::{collections::BTreeMap, sync::Arc};

use serde::Deserialize;
use tracing::debug;

use crate::config::{ConfigError, InfillPattern, SliceConfig};

#[derive(Debug, Clone)]
pub struct ConfigCatalogue {
    profiles: Arc<BTreeMap<String, SliceConfig>>,
}

#[derive(Deserialize)]
struct CatalogueFile {
    #[serde(default)]
    profiles: BTreeMap<String, SliceConfig>,
}

impl ConfigCatalogue {
    /// The built-in profiles: `default`, `draft`, `fine` and `vase`.
    pub fn builtin() -> Self {
        Self {
            profiles: Arc::new(builtin_profiles()),
        }
    }

    /// Builds a catalogue from the built-in profiles extended by the
    /// `[profiles.<name>]` tables of a TOML document. Missing keys in a
    /// table take their default value.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let file: CatalogueFile = toml::from_str(source)?;

        let mut profiles = builtin_profiles();
        for (name, config) in file.profiles {
            config.validate()?;
            debug!(profile = %name, "Loaded profile");
            profiles.insert(name, config);
        }

        Ok(Self {
            profiles: Arc::new(profiles),
        })
    }

    pub fn get(&self, name: &str) -> Result<&SliceConfig, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile(name.to_owned()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }
}

impl Default for ConfigCatalogue {
    fn default() -> Self {
        Self::builtin()
    }
}

fn builtin_profiles() -> BTreeMap<String, SliceConfig> {
    let draft = SliceConfig {
        layer_height: 0.3,
        fill_density: 0.1,
        top_bottom_layers: 2,
        print_speed: 70.0,
        ..SliceConfig::default()
    };

    let fine = SliceConfig {
        layer_height: 0.1,
        top_bottom_layers: 6,
        print_speed: 40.0,
        infill_pattern: InfillPattern::Hex,
        ..SliceConfig::default()
    };

    let vase = SliceConfig {
        joris: true,
        wall_thickness: 0.4,
        top_bottom_layers: 3,
        fill_density: 0.0,
        ..SliceConfig::default()
    };

    BTreeMap::from([
        ("default".to_owned(), SliceConfig::default()),
        ("draft".to_owned(), draft),
        ("fine".to_owned(), fine),
        ("vase".to_owned(), vase),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_profiles_validate() {
        let catalogue = ConfigCatalogue::builtin();
        for name in catalogue.names() {
            catalogue.get(name).unwrap().validate().unwrap();
        }

        assert!(catalogue.get("vase").unwrap().joris);
        assert!(matches!(
            catalogue.get("missing"),
            Err(ConfigError::UnknownProfile(_))
        ));
    }

    #[test]
    fn toml_profiles_extend_builtins() {
        let catalogue = ConfigCatalogue::from_toml_str(
            "[profiles.petg]\nprint_temperature = 240\nretraction_amount = 1.5\n",
        )
        .unwrap();

        let petg = catalogue.get("petg").unwrap();
        assert_eq!(petg.print_temperature, 240.0);
        assert_eq!(petg.layer_height, 0.2);
        assert!(catalogue.get("draft").is_ok());
    }
}
