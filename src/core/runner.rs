//! Local command execution.
//!
//! Every command goes through `sh -c` so templates may carry pipes and
//! redirections. The working directory is always passed explicitly; nothing
//! in this crate changes the process-wide current directory.

use serde::Serialize;
use std::cell::RefCell;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{Error, Result};

/// Exit status and merged stdout/stderr lines of one command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub success: bool,
    pub exit_code: i32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub output: Vec<String>,
}

impl StepResult {
    pub fn from_exit_code(exit_code: i32, output: Vec<String>) -> Self {
        Self {
            success: exit_code == 0,
            exit_code,
            output,
        }
    }

    /// Result of a step that had nothing to run.
    pub fn noop() -> Self {
        Self::from_exit_code(0, Vec::new())
    }

    pub fn output_text(&self) -> String {
        self.output.join("\n")
    }
}

pub trait CommandRunner {
    /// Run `command` through the shell in `working_dir`.
    ///
    /// A non-zero exit is reported in the returned [`StepResult`]; only a
    /// failure to spawn the shell is an error.
    fn run(
        &self,
        command: &str,
        working_dir: &Path,
        env: &[(&str, &str)],
        verbose: bool,
    ) -> Result<StepResult>;
}

/// Runs commands with the system shell.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run(
        &self,
        command: &str,
        working_dir: &Path,
        env: &[(&str, &str)],
        verbose: bool,
    ) -> Result<StepResult> {
        // Group the command so stderr joins stdout on a single pipe, in order.
        let merged = format!("{{ {}\n}} 2>&1", command);

        let mut cmd = Command::new("sh");
        cmd.args(["-c", &merged])
            .current_dir(working_dir)
            .envs(env.iter().copied())
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        let mut child = cmd.spawn().map_err(|e| {
            Error::internal_io(
                format!("Failed to spawn shell: {}", e),
                Some(format!("run '{}' in {}", command, working_dir.display())),
            )
        })?;

        let mut output = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            for line in BufReader::new(stdout).lines() {
                let line = line.map_err(|e| {
                    Error::internal_io(e.to_string(), Some("read command output".to_string()))
                })?;
                if verbose {
                    eprintln!("{}", line);
                }
                output.push(line);
            }
        }

        let status = child.wait().map_err(|e| {
            Error::internal_io(e.to_string(), Some("wait for command".to_string()))
        })?;

        Ok(StepResult::from_exit_code(status.code().unwrap_or(-1), output))
    }
}

/// One command seen by a [`RecordingRunner`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedCommand {
    pub command: String,
    pub working_dir: PathBuf,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<(String, String)>,
}

/// Records commands instead of running them.
///
/// Commands succeed with no output unless a scripted failure or response
/// matches. Lets pipeline tests run without a shell or a real database.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    commands: RefCell<Vec<RecordedCommand>>,
    failures: Vec<(String, i32, Vec<String>)>,
    responses: Vec<(String, Vec<String>)>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Any command containing `needle` exits with `exit_code` and `output`.
    pub fn fail_on(mut self, needle: &str, exit_code: i32, output: &[&str]) -> Self {
        self.failures.push((
            needle.to_string(),
            exit_code,
            output.iter().map(|s| s.to_string()).collect(),
        ));
        self
    }

    /// Any successful command containing `needle` prints `output`.
    pub fn respond_to(mut self, needle: &str, output: &[&str]) -> Self {
        self.responses.push((
            needle.to_string(),
            output.iter().map(|s| s.to_string()).collect(),
        ));
        self
    }

    pub fn commands(&self) -> Vec<RecordedCommand> {
        self.commands.borrow().clone()
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.commands
            .borrow()
            .iter()
            .map(|c| c.command.clone())
            .collect()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(
        &self,
        command: &str,
        working_dir: &Path,
        env: &[(&str, &str)],
        _verbose: bool,
    ) -> Result<StepResult> {
        self.commands.borrow_mut().push(RecordedCommand {
            command: command.to_string(),
            working_dir: working_dir.to_path_buf(),
            env: env
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        });

        if let Some((_, code, output)) = self
            .failures
            .iter()
            .find(|(needle, _, _)| command.contains(needle.as_str()))
        {
            return Ok(StepResult::from_exit_code(*code, output.clone()));
        }

        let output = self
            .responses
            .iter()
            .find(|(needle, _)| command.contains(needle.as_str()))
            .map(|(_, out)| out.clone())
            .unwrap_or_default();

        Ok(StepResult::from_exit_code(0, output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_runner_captures_stdout_and_stderr_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let result = ShellRunner
            .run("echo one; echo two 1>&2; echo three", dir.path(), &[], false)
            .unwrap();
        assert!(result.success);
        assert_eq!(result.output, vec!["one", "two", "three"]);
    }

    #[test]
    fn shell_runner_reports_nonzero_exit_without_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = ShellRunner
            .run("echo nope; exit 3", dir.path(), &[], false)
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.exit_code, 3);
        assert_eq!(result.output_text(), "nope");
    }

    #[test]
    fn shell_runner_still_captures_when_echoing() {
        let dir = tempfile::tempdir().unwrap();
        let result = ShellRunner
            .run("echo streamed; echo also 1>&2", dir.path(), &[], true)
            .unwrap();
        assert!(result.success);
        assert_eq!(result.output, vec!["streamed", "also"]);
    }

    #[test]
    fn shell_runner_uses_explicit_working_dir_and_env() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "here").unwrap();
        let result = ShellRunner
            .run(
                "cat marker.txt; echo \" $ENVSYNC_TEST\"",
                dir.path(),
                &[("ENVSYNC_TEST", "value")],
                false,
            )
            .unwrap();
        assert_eq!(result.output, vec!["here value"]);
    }

    #[test]
    fn shell_runner_supports_redirection() {
        let dir = tempfile::tempdir().unwrap();
        ShellRunner
            .run("echo dumped > out.sql", dir.path(), &[], false)
            .unwrap();
        let written = std::fs::read_to_string(dir.path().join("out.sql")).unwrap();
        assert_eq!(written.trim(), "dumped");
    }

    #[test]
    fn shell_runner_fails_for_missing_working_dir() {
        let result = ShellRunner.run("true", Path::new("/nonexistent/envsync/dir"), &[], false);
        assert!(result.is_err());
    }

    #[test]
    fn recording_runner_scripts_failures_and_responses() {
        let runner = RecordingRunner::new()
            .fail_on("bad", 2, &["broken"])
            .respond_to("hello", &["world"]);

        let ok = runner.run("say hello", Path::new("/srv"), &[], false).unwrap();
        assert_eq!(ok.output, vec!["world"]);

        let failed = runner.run("bad thing", Path::new("/srv"), &[], false).unwrap();
        assert_eq!(failed.exit_code, 2);
        assert!(!failed.success);

        assert_eq!(runner.command_lines(), vec!["say hello", "bad thing"]);
    }
}
