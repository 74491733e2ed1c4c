//! Configuration loading and management.
//!
//! Configuration is loaded from multiple sources with the following precedence
//! (highest to lowest):
//!
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. `.sql-source-tracer.toml` in current directory
//! 4. `~/.config/sql-source-tracer/config.toml`
//! 5. Default values
//!
//! # Configuration File Format
//!
//! ```toml
//! [search]
//! backend = "ripgrep"          # ripgrep, walk
//! ripgrep_path = "rg"
//! timeout_secs = 5
//! cache_capacity = 512
//!
//! [thresholds]
//! cascade_window_ms = 50
//! min_identifier_digits = 4
//! rule_base_confidence = 0.6
//! high_band = 0.9
//!
//! [limits]
//! max_results = 10
//! max_patterns = 5
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `SQL_TRACER_PROJECT_ROOT` | Root of the application to search |
//! | `SQL_TRACER_BACKEND` | `ripgrep` or `walk` |
//! | `SQL_TRACER_RG_PATH` | Path to the ripgrep binary |
//! | `SQL_TRACER_TIMEOUT_SECS` | Search timeout in seconds |
//!
//! # Heuristic thresholds
//!
//! The numbers in [`Thresholds`] are empirical calibrations, not derived
//! values. They are kept as named constants so deployments can tune them.

use std::{env, fs, path::PathBuf};

use serde::Deserialize;

use crate::error::{AppResult, config_error};

/// INSERT pairs closer than this are treated as one cascading write
pub const CASCADE_WINDOW_MS: i64 = 50;
/// Numeric tokens with at least this many digits are treated as identifiers
pub const MIN_IDENTIFIER_DIGITS: usize = 4;
/// Quoted tokens with at least this many letters are treated as identifiers
pub const MIN_QUOTED_TOKEN_LEN: usize = 3;
/// Starting confidence for a rule-validated match
pub const RULE_BASE_CONFIDENCE: f64 = 0.6;
/// Completeness score at or above which a match is labelled `high`
pub const HIGH_BAND: f64 = 0.9;
/// Completeness score at or above which a match is labelled `medium`
pub const MEDIUM_BAND: f64 = 0.7;
/// Completeness score at or above which a match is labelled `partial`
pub const PARTIAL_BAND: f64 = 0.4;
/// Default timeout for one external search call
pub const SEARCH_TIMEOUT_SECS: u64 = 5;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub project_root: Option<PathBuf>,
    #[serde(default)]
    pub search:       SearchConfig,
    #[serde(default)]
    pub thresholds:   Thresholds,
    #[serde(default)]
    pub limits:       LimitsConfig
}

/// Search backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// External `rg` process
    #[default]
    Ripgrep,
    /// In-process directory walk with the `regex` crate
    Walk
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ripgrep" | "rg" => Ok(Self::Ripgrep),
            "walk" => Ok(Self::Walk),
            other => Err(format!("unknown search backend '{}'", other))
        }
    }
}

/// Code search configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub backend:        BackendKind,
    pub ripgrep_path:   String,
    pub timeout_secs:   u64,
    pub cache_capacity: usize
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            backend:        BackendKind::Ripgrep,
            ripgrep_path:   String::from("rg"),
            timeout_secs:   SEARCH_TIMEOUT_SECS,
            cache_capacity: 512
        }
    }
}

/// Heuristic thresholds used across the analyzers
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub cascade_window_ms:     i64,
    pub min_identifier_digits: usize,
    pub min_quoted_token_len:  usize,
    pub rule_base_confidence:  f64,
    pub high_band:             f64,
    pub medium_band:           f64,
    pub partial_band:          f64
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            cascade_window_ms:     CASCADE_WINDOW_MS,
            min_identifier_digits: MIN_IDENTIFIER_DIGITS,
            min_quoted_token_len:  MIN_QUOTED_TOKEN_LEN,
            rule_base_confidence:  RULE_BASE_CONFIDENCE,
            high_band:             HIGH_BAND,
            medium_band:           MEDIUM_BAND,
            partial_band:          PARTIAL_BAND
        }
    }
}

/// Result-size limits
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_results:  usize,
    pub max_patterns: usize
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_results:  10,
            max_patterns: 5
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. Config file in current directory (.sql-source-tracer.toml)
    /// 3. Config file in home directory (~/.config/sql-source-tracer/config.toml)
    /// 4. Default values
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(home) = env::var_os("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("sql-source-tracer")
                .join("config.toml");
            if home_config.exists() {
                config = Self::from_file(&home_config)?;
            }
        }

        let local_config = PathBuf::from(".sql-source-tracer.toml");
        if local_config.exists() {
            config = Self::from_file(&local_config)?;
        }

        config.apply_env()?;
        Ok(config)
    }

    /// Parse a single TOML file
    pub fn from_file(path: &std::path::Path) -> AppResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| config_error(format!("Failed to read config file: {}", e)))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> AppResult<Self> {
        toml::from_str(content).map_err(|e| config_error(format!("Invalid config file: {}", e)))
    }

    fn apply_env(&mut self) -> AppResult<()> {
        if let Ok(root) = env::var("SQL_TRACER_PROJECT_ROOT") {
            self.project_root = Some(PathBuf::from(root));
        }

        if let Ok(backend) = env::var("SQL_TRACER_BACKEND") {
            self.search.backend = backend.parse().map_err(config_error)?;
        }

        if let Ok(path) = env::var("SQL_TRACER_RG_PATH") {
            self.search.ripgrep_path = path;
        }

        if let Ok(secs) = env::var("SQL_TRACER_TIMEOUT_SECS") {
            self.search.timeout_secs = secs.parse().map_err(|_| {
                config_error(format!("SQL_TRACER_TIMEOUT_SECS must be an integer, got '{}'", secs))
            })?;
        }

        Ok(())
    }
}
