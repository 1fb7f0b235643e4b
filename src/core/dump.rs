//! Database dump location and reuse policy.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Default staleness threshold for `--skip-dump-recent`, in seconds.
pub const DEFAULT_THRESHOLD_SECS: i64 = 60;

/// Directory used when no dump directory is requested.
pub const DEFAULT_DUMP_DIR: &str = "/tmp";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DumpDescriptor {
    pub directory: PathBuf,
    pub path: PathBuf,
}

impl DumpDescriptor {
    /// `<dir>/<site>.<environment_from>.sql`, where `<dir>` is `/tmp` or
    /// `dump_dir` rooted at the project root.
    pub fn new(project_root: &Path, dump_dir: Option<&str>, site: &str, environment_from: &str) -> Self {
        let directory = match dump_dir.filter(|d| !d.is_empty() && *d != DEFAULT_DUMP_DIR) {
            Some(dir) => project_root.join(dir.trim_start_matches('/')),
            None => PathBuf::from(DEFAULT_DUMP_DIR),
        };
        let path = directory.join(file_name(site, environment_from));
        Self { directory, path }
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn ensure_directory(&self) -> Result<()> {
        if self.directory.is_dir() {
            return Ok(());
        }
        fs::create_dir_all(&self.directory).map_err(|e| {
            Error::internal_io(
                e.to_string(),
                Some(format!("create dump directory {}", self.directory.display())),
            )
        })
    }
}

pub fn file_name(site: &str, environment_from: &str) -> String {
    format!("{}.{}.sql", site, environment_from)
}

/// True when an existing dump may be reused instead of regenerated.
pub fn should_skip(path: &Path, recent_only: bool, threshold_secs: i64) -> bool {
    should_skip_at(path, recent_only, threshold_secs, Utc::now())
}

pub fn should_skip_at(path: &Path, recent_only: bool, threshold_secs: i64, now: DateTime<Utc>) -> bool {
    if !recent_only {
        return false;
    }

    let Some(modified) = modified_at(path) else {
        return false;
    };

    (now - modified).num_seconds() <= threshold_secs
}

fn modified_at(path: &Path) -> Option<DateTime<Utc>> {
    let metadata = fs::metadata(path).ok()?;
    if !metadata.is_file() {
        return None;
    }
    metadata.modified().ok().map(DateTime::<Utc>::from)
}
