// Command execution against a resolved alias through the drush front-end.

use std::path::{Path, PathBuf};

use crate::alias::ExecutionTarget;
use crate::error::Result;
use crate::runner::{CommandRunner, StepResult};

/// Environment variable carrying the "import as" environment to the front-end.
pub const ENVIRONMENT_ID_VAR: &str = "ENVSYNC_ENVIRONMENT_ID";

pub struct RemoteExecutor<'a> {
    runner: &'a dyn CommandRunner,
    front_end: String,
    working_dir: PathBuf,
}

impl<'a> RemoteExecutor<'a> {
    pub fn new(runner: &'a dyn CommandRunner, front_end: impl Into<String>, working_dir: PathBuf) -> Self {
        Self {
            runner,
            front_end: front_end.into(),
            working_dir,
        }
    }

    /// Same executor, running from another directory.
    pub fn in_dir(&self, working_dir: &Path) -> RemoteExecutor<'a> {
        RemoteExecutor {
            runner: self.runner,
            front_end: self.front_end.clone(),
            working_dir: working_dir.to_path_buf(),
        }
    }

    pub fn command_line(&self, command: &str, target: &ExecutionTarget) -> String {
        format!("{} {} {}", self.front_end, target.id, command)
    }

    /// Run `command` against `target`.
    ///
    /// `extra_environment_id` is exported to the front-end process as
    /// [`ENVIRONMENT_ID_VAR`]; when `None` nothing is exported.
    pub fn execute(
        &self,
        command: &str,
        target: &ExecutionTarget,
        extra_environment_id: Option<&str>,
        verbose: bool,
    ) -> Result<StepResult> {
        let line = self.command_line(command, target);
        let env: Vec<(&str, &str)> = extra_environment_id
            .map(|id| vec![(ENVIRONMENT_ID_VAR, id)])
            .unwrap_or_default();

        self.runner.run(&line, &self.working_dir, &env, verbose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::RecordingRunner;
    use std::collections::BTreeMap;

    fn target() -> ExecutionTarget {
        ExecutionTarget::new("www", "local", BTreeMap::new())
    }

    #[test]
    fn prefixes_command_with_front_end_and_alias() {
        let runner = RecordingRunner::new();
        let executor = RemoteExecutor::new(&runner, "drush", PathBuf::from("/project"));
        executor.execute("cr 2>&1", &target(), None, false).unwrap();

        let recorded = runner.commands();
        assert_eq!(recorded[0].command, "drush @www.local cr 2>&1");
        assert_eq!(recorded[0].working_dir, PathBuf::from("/project"));
        assert!(recorded[0].env.is_empty());
    }

    #[test]
    fn forwards_extra_environment_id() {
        let runner = RecordingRunner::new();
        let executor = RemoteExecutor::new(&runner, "vendor/bin/drush", PathBuf::from("/project"));
        executor
            .in_dir(Path::new("/project/docroot"))
            .execute("updb -y", &target(), Some("staging"), false)
            .unwrap();

        let recorded = runner.commands();
        assert_eq!(recorded[0].command, "vendor/bin/drush @www.local updb -y");
        assert_eq!(recorded[0].working_dir, PathBuf::from("/project/docroot"));
        assert_eq!(
            recorded[0].env,
            vec![(ENVIRONMENT_ID_VAR.to_string(), "staging".to_string())]
        );
    }

    #[test]
    fn passes_exit_code_through() {
        let runner = RecordingRunner::new().fail_on("sql:dump", 5, &["denied"]);
        let executor = RemoteExecutor::new(&runner, "drush", PathBuf::from("/project"));
        let result = executor.execute("sql:dump", &target(), None, false).unwrap();
        assert_eq!(result.exit_code, 5);
        assert_eq!(result.output, vec!["denied"]);
    }
}
