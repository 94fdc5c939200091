//! tasklog configuration.
//!
//! Loaded from `~/.tasklog/config.toml`. Every key is optional and a
//! missing file means defaults:
//!
//! ```toml
//! mode = "strict"      # or "tolerant" (default)
//! pretty = true        # pretty-print JSON output
//! log = "tasklog=debug" # tracing filter directives
//! ```
//!
//! The decode mode is resolved through a chain, first match wins:
//!
//! 1. `--strict` / `--tolerant` on the command line
//! 2. `TASKLOG_MODE` environment variable
//! 3. `mode` in the config file
//! 4. tolerant

use std::{env, fs, io, path::Path, path::PathBuf};

use serde::Deserialize;

use crate::decode::DecodeMode;

/// Environment variable overriding the configured decode mode.
pub const MODE_ENV: &str = "TASKLOG_MODE";

/// tasklog configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    /// How undecodable lines are treated when no flag or env var says.
    pub mode: Option<DecodeMode>,

    /// Pretty-print JSON output.
    #[serde(default)]
    pub pretty: bool,

    /// Tracing filter directives, used when `TASKLOG_LOG` is unset.
    pub log: Option<String>,
}

impl Config {
    /// Load config from `~/.tasklog/config.toml`, or defaults if absent.
    pub fn load() -> Result<Self, String> {
        match Self::path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load config from an explicit path, or defaults if it doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let contents = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(format!("failed to read {}: {e}", path.display())),
        };

        toml::from_str(&contents).map_err(|e| format!("invalid config at {}: {e}", path.display()))
    }

    /// The config file path: `~/.tasklog/config.toml`.
    pub fn path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".tasklog").join("config.toml"))
    }

    /// Resolve the decode mode from the tiered resolution chain.
    pub fn resolve_mode(&self, explicit: Option<DecodeMode>) -> Result<DecodeMode, String> {
        self.mode_from(explicit, env::var(MODE_ENV).ok())
    }

    fn mode_from(
        &self,
        explicit: Option<DecodeMode>,
        from_env: Option<String>,
    ) -> Result<DecodeMode, String> {
        // 1. Explicit flag.
        if let Some(mode) = explicit {
            return Ok(mode);
        }

        // 2. TASKLOG_MODE environment variable.
        if let Some(value) = from_env
            && !value.is_empty()
        {
            return value
                .parse()
                .map_err(|e| format!("invalid {MODE_ENV}: {e}"));
        }

        // 3. Config file, then the default.
        Ok(self.mode.unwrap_or_default())
    }
}
