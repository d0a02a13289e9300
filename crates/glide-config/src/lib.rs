//! Glide configuration system
//!
//! This crate provides centralized configuration for the transition engine,
//! loading settings from `glide.toml` with `GLIDE_*` environment overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name, looked up in the current directory.
pub const CONFIG_FILE: &str = "glide.toml";

/// Errors raised while loading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Main configuration structure for the engine
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct GlideConfig {
    /// Default spring used by presets and shared-element morphs
    pub spring: SpringConfig,
    /// Integrator thresholds and guards
    pub simulation: SimulationConfig,
    /// Navigation pairing behavior
    pub navigation: NavigationConfig,
    /// Shared-element correlation settings
    pub hero: HeroConfig,
}

/// Default spring parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpringConfig {
    pub stiffness: f64,
    pub damping: f64,
    pub mass: f64,
}

/// Spring integration settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    /// Position threshold for settling detection
    pub rest_delta: f64,
    /// Velocity threshold for settling detection
    pub rest_speed: f64,
    /// Largest integration step in milliseconds; longer frames are clamped
    pub max_step_ms: f64,
    /// Force-complete a spring that has not settled after this long
    pub max_duration_ms: f64,
}

/// How out/in view events are paired into a navigation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DetectorStrategy {
    /// OUT must arrive before IN (hosts with native destroy callbacks)
    #[default]
    OutFirst,
    /// OUT and IN may arrive in any order (hosts observing removal after the fact)
    AnyOrder,
}

impl DetectorStrategy {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "out_first" => Some(Self::OutFirst),
            "any_order" => Some(Self::AnyOrder),
            _ => None,
        }
    }
}

/// Navigation configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NavigationConfig {
    pub strategy: DetectorStrategy,
    /// Hide entering views until their transition is positioned
    pub hide_until_ready: bool,
}

/// Shared-element (hero) configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HeroConfig {
    /// Attribute hosts are asked to read correlation keys from
    pub key_attribute: String,
    /// Pairs further apart vertically than this fall back to plain transitions
    pub max_distance: Option<f64>,
}

impl Default for SpringConfig {
    fn default() -> Self {
        Self {
            stiffness: 300.0,
            damping: 30.0,
            mass: 1.0,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            rest_delta: 0.01,
            rest_speed: 0.01,
            max_step_ms: 33.0,
            max_duration_ms: 5000.0,
        }
    }
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            strategy: DetectorStrategy::OutFirst,
            hide_until_ready: true,
        }
    }
}

impl Default for HeroConfig {
    fn default() -> Self {
        Self {
            key_attribute: "data-hero-key".to_string(),
            max_distance: Some(700.0),
        }
    }
}

fn env_flag(val: &str) -> bool {
    val == "1" || val.eq_ignore_ascii_case("true")
}

fn env_f64(name: &str) -> Option<f64> {
    std::env::var(name).ok()?.parse::<f64>().ok()
}

impl GlideConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(toml::from_str(&content)?)
    }

    /// Load configuration from `glide.toml` in the current directory
    /// or return default configuration if the file doesn't exist
    pub fn load_or_default() -> Self {
        Self::load_from_file(CONFIG_FILE).unwrap_or_default()
    }

    /// Merge configuration with environment variables
    ///
    /// Environment variables take precedence over configuration file values.
    /// Unparseable values are ignored.
    pub fn merge_with_env(&mut self) {
        // Spring defaults
        if let Some(v) = env_f64("GLIDE_STIFFNESS") {
            self.spring.stiffness = v;
        }
        if let Some(v) = env_f64("GLIDE_DAMPING") {
            self.spring.damping = v;
        }
        if let Some(v) = env_f64("GLIDE_MASS") {
            self.spring.mass = v;
        }

        // Simulation
        if let Some(v) = env_f64("GLIDE_REST_DELTA") {
            self.simulation.rest_delta = v;
        }
        if let Some(v) = env_f64("GLIDE_REST_SPEED") {
            self.simulation.rest_speed = v;
        }
        if let Some(v) = env_f64("GLIDE_MAX_DURATION_MS") {
            self.simulation.max_duration_ms = v;
        }

        // Navigation
        if let Ok(val) = std::env::var("GLIDE_NAV_STRATEGY") {
            if let Some(strategy) = DetectorStrategy::parse(&val) {
                self.navigation.strategy = strategy;
            }
        }
        if let Ok(val) = std::env::var("GLIDE_HIDE_UNTIL_READY") {
            self.navigation.hide_until_ready = env_flag(&val);
        }

        // Hero
        if let Ok(attr) = std::env::var("GLIDE_HERO_KEY_ATTRIBUTE") {
            self.hero.key_attribute = attr;
        }
        if let Ok(val) = std::env::var("GLIDE_HERO_MAX_DISTANCE") {
            self.hero.max_distance = match val.as_str() {
                "none" | "off" => None,
                other => other.parse::<f64>().ok().or(self.hero.max_distance),
            };
        }
    }

    /// Load configuration with environment variable overrides
    ///
    /// 1. Load from glide.toml (or use defaults if not found)
    /// 2. Override with environment variables if present
    pub fn load() -> Self {
        let mut config = Self::load_or_default();
        config.merge_with_env();
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = GlideConfig::default();
        assert_eq!(config.spring.stiffness, 300.0);
        assert_eq!(config.spring.damping, 30.0);
        assert_eq!(config.spring.mass, 1.0);
        assert_eq!(config.navigation.strategy, DetectorStrategy::OutFirst);
        assert!(config.navigation.hide_until_ready);
        assert_eq!(config.hero.key_attribute, "data-hero-key");
    }

    #[test]
    fn test_toml_serialization() {
        let config = GlideConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: GlideConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[spring]\nstiffness = 120.0\n\n[navigation]\nstrategy = \"any_order\""
        )
        .unwrap();

        let config = GlideConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.spring.stiffness, 120.0);
        assert_eq!(config.spring.damping, 30.0);
        assert_eq!(config.navigation.strategy, DetectorStrategy::AnyOrder);
        assert_eq!(config.simulation.max_duration_ms, 5000.0);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = GlideConfig::load_from_file(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[spring\nstiffness = ").unwrap();
        let err = GlideConfig::load_from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_or_default() {
        // Should not panic even if glide.toml doesn't exist
        let config = GlideConfig::load_or_default();
        assert!(config.simulation.max_duration_ms > 0.0);
    }

    #[test]
    fn test_merge_with_env() {
        unsafe {
            std::env::set_var("GLIDE_STIFFNESS", "500");
            std::env::set_var("GLIDE_NAV_STRATEGY", "any-order");
            std::env::set_var("GLIDE_HIDE_UNTIL_READY", "false");
            std::env::set_var("GLIDE_HERO_MAX_DISTANCE", "none");
        }

        let mut config = GlideConfig::default();
        config.merge_with_env();

        assert_eq!(config.spring.stiffness, 500.0);
        assert_eq!(config.navigation.strategy, DetectorStrategy::AnyOrder);
        assert!(!config.navigation.hide_until_ready);
        assert_eq!(config.hero.max_distance, None);

        unsafe {
            std::env::remove_var("GLIDE_STIFFNESS");
            std::env::remove_var("GLIDE_NAV_STRATEGY");
            std::env::remove_var("GLIDE_HIDE_UNTIL_READY");
            std::env::remove_var("GLIDE_HERO_MAX_DISTANCE");
        }
    }
}
