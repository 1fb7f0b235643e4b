//! Reset pipeline: the ordered command list run against the local copy
//! after import.
//!
//! Steps come from a YAML file with a top-level `commands` list:
//!
//! ```yaml
//! commands:
//!   - name: Enable dev modules
//!     drush: en -y devel
//!   - name: Clear Cache
//!     condition: environment.local
//!     run: cache-clear --env=%environment_id%
//! ```
//!
//! Steps run strictly in file order, one at a time. The first step with a
//! non-zero exit aborts the pipeline.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::alias::{ExecutionTarget, URI_ATTRIBUTE};
use crate::error::{Error, ResetStepFailedDetails, Result};
use crate::remote::RemoteExecutor;
use crate::runner::{CommandRunner, StepResult};
use crate::template::{self, TokenBindings};

/// Display name for steps without one.
pub const MISSING_NAME: &str = "Missing command name";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResetConfig {
    #[serde(default)]
    pub commands: Vec<ResetStep>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResetStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drush: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<String>,
}

impl ResetStep {
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => MISSING_NAME,
        }
    }

    pub fn action(&self) -> StepAction<'_> {
        if let Some(drush) = self.drush.as_deref().filter(|s| !s.is_empty()) {
            StepAction::Drush(drush)
        } else if let Some(run) = self.run.as_deref().filter(|s| !s.is_empty()) {
            StepAction::Run(run)
        } else {
            StepAction::Noop
        }
    }

    pub fn parsed_condition(&self) -> Option<Condition> {
        self.condition.as_deref().and_then(Condition::parse)
    }
}

/// What a step dispatches to. `drush` wins when both templates are set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAction<'a> {
    Drush(&'a str),
    Run(&'a str),
    Noop,
}

impl StepAction<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            StepAction::Drush(_) => "drush",
            StepAction::Run(_) => "run",
            StepAction::Noop => "noop",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionCategory {
    Site,
    Environment,
    Unknown(String),
}

/// A `category.value` step condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Condition {
    pub category: ConditionCategory,
    pub value: String,
}

impl Condition {
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() {
            return None;
        }
        let (category, value) = raw.split_once('.').unwrap_or((raw, ""));
        let category = match category {
            "site" => ConditionCategory::Site,
            "environment" => ConditionCategory::Environment,
            other => ConditionCategory::Unknown(other.to_string()),
        };
        Some(Self {
            category,
            value: value.to_string(),
        })
    }

    /// Whether the step should run.
    ///
    /// Conditions are advisory and not yet implemented: the category is
    /// recognized but neither `site` nor `environment` filters anything, so
    /// every step runs. Real filtering needs a decision on what the value
    /// is compared against.
    pub fn applies(&self, _site: &str, _environment: &str) -> bool {
        match self.category {
            ConditionCategory::Site => true,
            ConditionCategory::Environment => true,
            ConditionCategory::Unknown(_) => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Idle,
    InProgress,
    Completed,
    Aborted,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    pub name: String,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl StepRecord {
    fn pending(step: &ResetStep) -> Self {
        Self {
            name: step.display_name().to_string(),
            kind: step.action().kind(),
            command: None,
            condition: step.parsed_condition(),
            status: StepStatus::Pending,
            exit_code: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResetReport {
    pub status: PipelineStatus,
    pub steps: Vec<StepRecord>,
}

impl ResetReport {
    /// Idle report with one pending record per configured step.
    pub fn idle(steps: &[ResetStep]) -> Self {
        Self {
            status: PipelineStatus::Idle,
            steps: steps.iter().map(StepRecord::pending).collect(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<ResetConfig> {
    if !path.is_file() {
        return Err(Error::config_missing_file(path.display().to_string()));
    }

    let content = fs::read_to_string(path).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("read {}", path.display())))
    })?;

    if content.trim().is_empty() {
        return Ok(ResetConfig::default());
    }

    serde_yml::from_str(&content)
        .map_err(|e| Error::config_invalid_yaml(path.display().to_string(), e))
}

pub struct ResetPipeline<'a> {
    runner: &'a dyn CommandRunner,
    executor: RemoteExecutor<'a>,
    working_dir: PathBuf,
    target: &'a ExecutionTarget,
    site: &'a str,
    environment_as: &'a str,
    verbose: bool,
}

impl<'a> ResetPipeline<'a> {
    /// `working_dir` is the document root; every step runs there.
    pub fn new(
        runner: &'a dyn CommandRunner,
        executor: &RemoteExecutor<'a>,
        working_dir: &Path,
        target: &'a ExecutionTarget,
        site: &'a str,
        environment_as: &'a str,
    ) -> Self {
        Self {
            runner,
            executor: executor.in_dir(working_dir),
            working_dir: working_dir.to_path_buf(),
            target,
            site,
            environment_as,
            verbose: false,
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn drush_bindings(&self) -> TokenBindings {
        TokenBindings {
            environment_id: Some(self.environment_as.to_string()),
            site_id: Some(self.site.to_string()),
            ..Default::default()
        }
    }

    fn run_bindings(&self) -> TokenBindings {
        TokenBindings {
            environment_id: Some(self.environment_as.to_string()),
            site_id: Some(self.site.to_string()),
            site_uri: Some(
                self.target
                    .attribute(URI_ATTRIBUTE)
                    .unwrap_or_default()
                    .to_string(),
            ),
            drush_alias: Some(self.target.id.clone()),
        }
    }

    /// Run `steps` in order. On the first step exiting above zero the
    /// pipeline is aborted and the error details carry the report: earlier
    /// steps `succeeded`, the failing one `failed`, the rest still `pending`.
    pub fn run(&self, steps: &[ResetStep]) -> Result<ResetReport> {
        let mut report = ResetReport::idle(steps);
        report.status = PipelineStatus::InProgress;

        for (index, step) in steps.iter().enumerate() {
            if let Some(condition) = &report.steps[index].condition {
                if !condition.applies(self.site, self.environment_as) {
                    continue;
                }
            }

            log_status!("reset", "{}", report.steps[index].name);
            report.steps[index].status = StepStatus::Running;

            let (command, result) = self.dispatch(step)?;

            let record = &mut report.steps[index];
            record.command = command.clone();
            record.exit_code = Some(result.exit_code);

            if result.exit_code > 0 {
                log_status!("reset", "Error: {}", result.output_text());
                record.status = StepStatus::Failed;
                let name = record.name.clone();
                report.status = PipelineStatus::Aborted;
                return Err(Error::reset_step_failed(ResetStepFailedDetails {
                    step: name,
                    position: index + 1,
                    command: command.unwrap_or_default(),
                    exit_code: result.exit_code,
                    output: result.output,
                    pipeline: report,
                }));
            }

            record.status = StepStatus::Succeeded;
        }

        report.status = PipelineStatus::Completed;
        Ok(report)
    }

    fn dispatch(&self, step: &ResetStep) -> Result<(Option<String>, StepResult)> {
        match step.action() {
            StepAction::Drush(template) => {
                let command = format!("{} 2>&1", template::substitute(template, &self.drush_bindings()));
                let result = self.executor.execute(
                    &command,
                    self.target,
                    Some(self.environment_as),
                    self.verbose,
                )?;
                let line = self.executor.command_line(&command, self.target);
                Ok((Some(line), result))
            }
            StepAction::Run(template) => {
                let command = format!("{} 2>&1", template::substitute(template, &self.run_bindings()));
                let result = self
                    .runner
                    .run(&command, &self.working_dir, &[], self.verbose)?;
                Ok((Some(command), result))
            }
            StepAction::Noop => Ok((None, StepResult::noop())),
        }
    }
}
