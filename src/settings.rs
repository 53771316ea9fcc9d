use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::{Error, Result};

pub const DEFAULT_NAMESPACE: &str = "http://www.mediawiki.org/xml/export-0.11/";

/// Runtime knobs, layered: defaults, then `wikicat.toml`, then `WIKICAT_*` env vars.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Export namespace the dump root is expected to declare.
    pub namespace: String,
    pub negative_samples: usize,
    pub train_ratio: f64,
    pub vocab_size: usize,
    pub epochs: usize,
    pub learning_rate: f32,
    pub seed: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            namespace: DEFAULT_NAMESPACE.to_string(),
            negative_samples: 1000,
            train_ratio: 0.8,
            vocab_size: 60_000,
            epochs: 30,
            learning_rate: 0.5,
            seed: None,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        let defaults = Settings::default();
        let settings: Settings = Config::builder()
            .set_default("namespace", defaults.namespace)
            .and_then(|b| b.set_default("negative_samples", defaults.negative_samples as u64))
            .and_then(|b| b.set_default("train_ratio", defaults.train_ratio))
            .and_then(|b| b.set_default("vocab_size", defaults.vocab_size as u64))
            .and_then(|b| b.set_default("epochs", defaults.epochs as u64))
            .and_then(|b| b.set_default("learning_rate", defaults.learning_rate as f64))
            .map_err(config_error)?
            .add_source(File::with_name("wikicat").required(false))
            .add_source(Environment::with_prefix("WIKICAT"))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(config_error)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.train_ratio > 0.0 && self.train_ratio < 1.0) {
            return Err(Error::Configuration(format!(
                "train_ratio must be in (0, 1), got {}",
                self.train_ratio
            )));
        }
        if self.vocab_size < 2 {
            return Err(Error::Configuration(
                "vocab_size must leave room for the padding and OOV slots".into(),
            ));
        }
        Ok(())
    }
}

fn config_error(e: config::ConfigError) -> Error {
    Error::Configuration(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let s = Settings::default();
        assert!(s.validate().is_ok());
        assert_eq!(s.negative_samples, 1000);
        assert_eq!(s.namespace, DEFAULT_NAMESPACE);
    }

    // Env vars are process-wide, so every WIKICAT_* case lives in this one test.
    #[test]
    fn load_layers_env_over_defaults() {
        let keys = ["WIKICAT_NEGATIVE_SAMPLES", "WIKICAT_TRAIN_RATIO", "WIKICAT_EPOCHS"];

        let s = Settings::load().unwrap();
        assert_eq!(s.train_ratio, 0.8);
        assert_eq!(s.vocab_size, 60_000);
        assert_eq!(s.seed, None);

        std::env::set_var("WIKICAT_NEGATIVE_SAMPLES", "25");
        let s = Settings::load().unwrap();
        assert_eq!(s.negative_samples, 25);
        assert_eq!(s.epochs, 30);

        std::env::set_var("WIKICAT_TRAIN_RATIO", "1.5");
        assert!(matches!(Settings::load(), Err(Error::Configuration(_))));
        std::env::remove_var("WIKICAT_TRAIN_RATIO");

        std::env::set_var("WIKICAT_EPOCHS", "many");
        assert!(matches!(Settings::load(), Err(Error::Configuration(_))));

        for key in keys {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn rejects_degenerate_split() {
        let s = Settings {
            train_ratio: 1.0,
            ..Settings::default()
        };
        assert!(matches!(s.validate(), Err(Error::Configuration(_))));
    }
}
