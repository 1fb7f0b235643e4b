use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::defaults::{self, Defaults};
use crate::error::{Error, Result};

/// Reset configuration location, relative to the project root.
pub const DEFAULT_RESET_CONFIG: &str = ".docksal/configuration.reset.yml";

pub const DEFAULT_DOCROOT: &str = "docroot";

/// Filesystem layout and project settings for one sync run.
///
/// Built once at the entry point and passed down explicitly.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncContext {
    pub project_root: PathBuf,
    /// Document root, relative to the project root
    pub docroot: PathBuf,
    /// Reset configuration file, relative to the project root
    pub reset_config: PathBuf,
    #[serde(skip)]
    pub defaults: Defaults,
}

impl SyncContext {
    pub fn new(project_root: PathBuf, docroot: Option<PathBuf>, reset_config: Option<PathBuf>) -> Result<Self> {
        if !project_root.is_dir() {
            return Err(Error::validation_invalid_argument(
                "project_root",
                format!("Project root '{}' is not a directory", project_root.display()),
            ));
        }

        let defaults = defaults::load(&project_root)?;

        Ok(Self {
            project_root,
            docroot: docroot.unwrap_or_else(|| PathBuf::from(DEFAULT_DOCROOT)),
            reset_config: reset_config.unwrap_or_else(|| PathBuf::from(DEFAULT_RESET_CONFIG)),
            defaults,
        })
    }

    /// Context with built-in defaults and no filesystem checks.
    pub fn with_defaults(project_root: impl AsRef<Path>) -> Self {
        Self {
            project_root: project_root.as_ref().to_path_buf(),
            docroot: PathBuf::from(DEFAULT_DOCROOT),
            reset_config: PathBuf::from(DEFAULT_RESET_CONFIG),
            defaults: Defaults::default(),
        }
    }

    pub fn docroot_path(&self) -> PathBuf {
        self.project_root.join(&self.docroot)
    }

    pub fn reset_config_path(&self) -> PathBuf {
        self.project_root.join(&self.reset_config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_rooted_at_project() {
        let ctx = SyncContext::with_defaults("/project");
        assert_eq!(ctx.docroot_path(), PathBuf::from("/project/docroot"));
        assert_eq!(
            ctx.reset_config_path(),
            PathBuf::from("/project/.docksal/configuration.reset.yml")
        );
    }

    #[test]
    fn rejects_missing_project_root() {
        let err = SyncContext::new(PathBuf::from("/nonexistent/envsync"), None, None).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::ValidationInvalidArgument);
    }

    #[test]
    fn loads_project_overrides() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join(".envsync.json"), r#"{"drush": "fin drush"}"#).unwrap();
        let ctx = SyncContext::new(root.path().to_path_buf(), Some(PathBuf::from("web")), None).unwrap();
        assert_eq!(ctx.defaults.drush, "fin drush");
        assert_eq!(ctx.docroot_path(), root.path().join("web"));
    }
}
