//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/spx-model/spx-model.toml`
//! 3. Explicit config file passed by the caller
//! 4. Environment variables: `SPX_*` prefix

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{ModelError, ModelResult};

/// What a guard does when its expression cannot be evaluated.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GuardPolicy {
    /// Any failure counts as false.
    #[default]
    FailClosed,
    /// Unparseable guard text is an error; evaluation failures are still false.
    Strict,
}

impl FromStr for GuardPolicy {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "fail_closed" => Ok(GuardPolicy::FailClosed),
            "strict" => Ok(GuardPolicy::Strict),
            other => Err(ModelError::Config {
                message: format!("unknown guard_policy '{other}' (expected fail_closed or strict)"),
            }),
        }
    }
}

impl fmt::Display for GuardPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardPolicy::FailClosed => f.write_str("fail_closed"),
            GuardPolicy::Strict => f.write_str("strict"),
        }
    }
}

/// Raw settings for intermediate parsing (None = not specified, inherit).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub guard_policy: Option<GuardPolicy>,
    pub max_build_depth: Option<usize>,
    pub strict_fields: Option<bool>,
}

/// Runtime settings for a model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Behavior of guards that fail to evaluate (default: fail_closed)
    pub guard_policy: GuardPolicy,
    /// Nesting limit for tree construction (default: 64)
    pub max_build_depth: usize,
    /// Reject configuration keys a type does not declare (default: true)
    pub strict_fields: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            guard_policy: GuardPolicy::FailClosed,
            max_build_depth: 64,
            strict_fields: true,
        }
    }
}

/// Get the XDG config directory for spx-model.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "spx-model").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("spx-model.toml"))
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> ModelResult<RawSettings> {
    let content = std::fs::read_to_string(path).map_err(|e| ModelError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ModelError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    /// Overlay the fields `raw` specifies.
    fn merge_with(&self, raw: &RawSettings) -> Self {
        Self {
            guard_policy: raw.guard_policy.unwrap_or(self.guard_policy),
            max_build_depth: raw.max_build_depth.unwrap_or(self.max_build_depth),
            strict_fields: raw.strict_fields.unwrap_or(self.strict_fields),
        }
    }

    /// Load layered settings: defaults, global file, `explicit` file, env vars.
    ///
    /// A missing global file is skipped; a missing explicit file is an error.
    pub fn load(explicit: Option<&Path>) -> ModelResult<Self> {
        // 1. Start with defaults
        let mut current = Self::default();

        // 2. Global config
        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                debug!("Loading global config {}", global_path.display());
                current = current.merge_with(&load_raw_settings(&global_path)?);
            }
        }

        // 3. Explicit file
        if let Some(path) = explicit {
            current = current.merge_with(&load_raw_settings(path)?);
        }

        // 4. Environment variables (explicit override)
        let env = Environment::with_prefix("SPX")
            .prefix_separator("_")
            .separator("__");
        Self::apply_env_overrides(current, env)
    }

    /// Apply SPX_* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self, env: Environment) -> ModelResult<Self> {
        let config = Config::builder().add_source(env).build().map_err(config_err)?;

        if let Ok(val) = config.get_string("guard_policy") {
            settings.guard_policy = val.parse()?;
        }
        if let Ok(val) = config.get_int("max_build_depth") {
            settings.max_build_depth = usize::try_from(val).map_err(|_| ModelError::Config {
                message: format!("max_build_depth must be non-negative, got {val}"),
            })?;
        }
        if let Ok(val) = config.get_bool("strict_fields") {
            settings.strict_fields = val;
        }

        Ok(settings)
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> ModelResult<String> {
        toml::to_string_pretty(self).map_err(|e| ModelError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# spx-model configuration
#
# Locations (by precedence, lowest to highest):
#   Global:   ~/.config/spx-model/spx-model.toml
#   Explicit: file passed to Settings::load
#   Env:      SPX_* environment variables (e.g. SPX_GUARD_POLICY=strict)

# What a branch does when its guard cannot be evaluated:
#   fail_closed  treat the guard as false
#   strict       unparseable guard text is an error
# guard_policy = "fail_closed"

# Maximum nesting depth accepted while building a tree
# max_build_depth = 64

# Reject configuration keys that a component type does not declare
# strict_fields = true
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ModelError {
    ModelError::Config {
        message: e.to_string(),
    }
}
