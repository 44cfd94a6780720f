//! Configuration for the merge assistant.
//!
//! Every key is optional. A missing file means built-in defaults, which match
//! the behaviour of a plain `git svn` workflow on a Windows TortoiseGit setup.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::errors::ConfigError;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "MERGE_SVN_CONFIG";
/// Environment variable overriding `merge.trunk_branch`.
pub const TRUNK_ENV: &str = "MERGE_SVN_TRUNK";
/// Environment variable overriding `merge_tool.path`.
pub const MERGE_TOOL_ENV: &str = "MERGE_SVN_MERGE_TOOL";

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Full configuration file layout.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MergeConfig {
    #[serde(default)]
    pub merge: MergeSection,

    #[serde(default)]
    pub merge_tool: MergeToolSection,

    #[serde(default)]
    pub logging: LoggingSection,
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Merge behaviour.
#[derive(Debug, Clone, Deserialize)]
pub struct MergeSection {
    /// Default answer to the trunk branch prompt.
    #[serde(default = "default_trunk_branch")]
    pub trunk_branch: String,

    /// Always create a merge commit.
    #[serde(default = "default_true")]
    pub no_ff: bool,

    /// Commit message used when `git commit --no-edit` refuses to finish a
    /// merge.
    #[serde(default = "default_fallback_commit_message")]
    pub fallback_commit_message: String,

    /// Offer to delete the merged branch once the run succeeds.
    #[serde(default = "default_true")]
    pub delete_branch_prompt: bool,

    /// Upper bound on conflict menu rounds before giving up.
    #[serde(default = "default_max_rounds")]
    pub max_conflict_rounds: u32,
}

impl Default for MergeSection {
    fn default() -> Self {
        Self {
            trunk_branch: default_trunk_branch(),
            no_ff: true,
            fallback_commit_message: default_fallback_commit_message(),
            delete_branch_prompt: true,
            max_conflict_rounds: default_max_rounds(),
        }
    }
}

/// External merge tool.
#[derive(Debug, Clone, Deserialize)]
pub struct MergeToolSection {
    /// Preferred merge tool executable. Used only when it exists; otherwise
    /// `git mergetool` runs whatever git is configured with.
    #[serde(default = "default_merge_tool_path")]
    pub path: PathBuf,
}

impl Default for MergeToolSection {
    fn default() -> Self {
        Self {
            path: default_merge_tool_path(),
        }
    }
}

/// Diagnostics.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    /// Minimum tracing level on stderr: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Optional file that receives debug-level logs.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_file: None,
        }
    }
}

fn default_trunk_branch() -> String {
    "master".into()
}

fn default_true() -> bool {
    true
}

fn default_fallback_commit_message() -> String {
    "Merge completed after conflict resolution".into()
}

fn default_max_rounds() -> u32 {
    50
}

fn default_merge_tool_path() -> PathBuf {
    PathBuf::from(r"C:\Program Files\TortoiseGit\bin\TortoiseGitMerge.exe")
}

fn default_log_level() -> String {
    "warn".into()
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl MergeConfig {
    /// Load a [`MergeConfig`] from a TOML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&contents)?;
        debug!("configuration parsed successfully");
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Resolve the configuration to use for this run.
    ///
    /// An explicit path must exist. Without one, `$MERGE_SVN_CONFIG` and then
    /// the per-user config file are tried; if neither exists the defaults
    /// apply. Environment overrides are applied and the result validated.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => std::env::var_os(CONFIG_ENV)
                .map(|v| expand_tilde(Path::new(&v)))
                .or_else(|| default_config_path().filter(|p| p.exists())),
        };

        let mut config = match path {
            Some(p) => Self::load_from_file(expand_tilde(&p))?,
            None => {
                debug!("no configuration file found, using defaults");
                Self::default()
            }
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `MERGE_SVN_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Some(trunk) = non_empty_env(TRUNK_ENV) {
            debug!(trunk = %trunk, "trunk branch overridden from environment");
            self.merge.trunk_branch = trunk;
        }
        if let Some(tool) = non_empty_env(MERGE_TOOL_ENV) {
            debug!(tool = %tool, "merge tool overridden from environment");
            self.merge_tool.path = PathBuf::from(tool);
        }
    }

    /// Validate that all values are sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.merge.trunk_branch.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "merge.trunk_branch".into(),
                detail: "trunk branch name must not be empty".into(),
            });
        }
        if self.merge.fallback_commit_message.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "merge.fallback_commit_message".into(),
                detail: "fallback commit message must not be empty".into(),
            });
        }
        if self.merge.max_conflict_rounds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "merge.max_conflict_rounds".into(),
                detail: "must be at least 1".into(),
            });
        }
        if !VALID_LOG_LEVELS.contains(&self.logging.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "logging.log_level".into(),
                detail: format!(
                    "'{}' is not one of {}",
                    self.logging.log_level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }
        Ok(())
    }
}

/// `<config dir>/merge-svn/config.toml` for the current user.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("merge-svn").join("config.toml"))
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
