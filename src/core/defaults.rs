use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::dump::DEFAULT_THRESHOLD_SECS;
use crate::error::{Error, Result};

/// Optional per-project overrides, read from `<project_root>/.envsync.json`.
pub const CONFIG_FILE: &str = ".envsync.json";

/// Commands and constants the sync run uses, overridable per project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Defaults {
    /// Remote-execution front-end, invoked as `<drush> @alias <command>`
    #[serde(default = "default_drush")]
    pub drush: String,

    #[serde(default = "default_composer_command")]
    pub composer_command: String,

    /// Arguments appended to `sql:dump`, before the output redirection
    #[serde(default = "default_dump_options")]
    pub dump_options: String,

    #[serde(default = "default_dump_threshold_secs")]
    pub dump_threshold_secs: i64,

    /// Storage-engine rewrite used by `--dump-convert`
    #[serde(default = "default_convert_from")]
    pub convert_from: String,

    #[serde(default = "default_convert_to")]
    pub convert_to: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            drush: default_drush(),
            composer_command: default_composer_command(),
            dump_options: default_dump_options(),
            dump_threshold_secs: default_dump_threshold_secs(),
            convert_from: default_convert_from(),
            convert_to: default_convert_to(),
        }
    }
}

// =============================================================================
// Default value functions
// =============================================================================

fn default_drush() -> String {
    "drush".to_string()
}

fn default_composer_command() -> String {
    "composer install --prefer-dist -v -o 2>&1".to_string()
}

fn default_dump_options() -> String {
    "--ssh-options=\"-o PasswordAuthentication=no -o LogLevel=QUIET\" --skip-tables-key=common --skip-tables-list=cache,cache_*".to_string()
}

fn default_dump_threshold_secs() -> i64 {
    DEFAULT_THRESHOLD_SECS
}

fn default_convert_from() -> String {
    "InnoDB".to_string()
}

fn default_convert_to() -> String {
    "MyISAM".to_string()
}

// =============================================================================
// Loading
// =============================================================================

pub fn config_path(project_root: &Path) -> PathBuf {
    project_root.join(CONFIG_FILE)
}

/// Load project overrides merged over built-in defaults.
///
/// A missing file yields the built-in defaults; an unreadable or malformed
/// file is an error.
pub fn load(project_root: &Path) -> Result<Defaults> {
    let path = config_path(project_root);
    if !path.exists() {
        return Ok(Defaults::default());
    }

    let content = fs::read_to_string(&path).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("read {}", path.display())))
    })?;

    let defaults: Defaults = serde_json::from_str(&content)
        .map_err(|e| Error::config_invalid_json(path.display().to_string(), e))?;

    if defaults.dump_threshold_secs < 0 {
        return Err(Error::config_invalid_value(
            "dump_threshold_secs",
            Some(defaults.dump_threshold_secs.to_string()),
            "must not be negative",
        ));
    }

    Ok(defaults)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn missing_file_gives_builtin_defaults() {
        let root = tempfile::tempdir().unwrap();
        let defaults = load(root.path()).unwrap();
        assert_eq!(defaults, Defaults::default());
        assert_eq!(defaults.dump_threshold_secs, 60);
        assert_eq!(defaults.drush, "drush");
    }

    #[test]
    fn partial_file_overrides_only_given_keys() {
        let root = tempfile::tempdir().unwrap();
        fs::write(
            config_path(root.path()),
            r#"{"drush": "vendor/bin/drush", "dump_threshold_secs": 300}"#,
        )
        .unwrap();

        let defaults = load(root.path()).unwrap();
        assert_eq!(defaults.drush, "vendor/bin/drush");
        assert_eq!(defaults.dump_threshold_secs, 300);
        assert_eq!(defaults.composer_command, default_composer_command());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        fs::write(config_path(root.path()), "{ not json").unwrap();
        let err = load(root.path()).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigInvalidJson);
    }

    #[test]
    fn negative_threshold_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        fs::write(config_path(root.path()), r#"{"dump_threshold_secs": -1}"#).unwrap();
        let err = load(root.path()).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigInvalidValue);
    }
}
