//! Sync orchestration: composer install → dump → import → file sync → reset.
//!
//! Stages run in that fixed order, each skippable through [`SyncOptions`].
//! Whether a failed command stops the run is decided per call site by
//! [`failure_policy`].

use serde::Serialize;
use std::path::Path;

use crate::alias::{AliasRegistry, AliasResolver, ExecutionTarget};
use crate::context::SyncContext;
use crate::dump::{self, DumpDescriptor};
use crate::error::{Error, RemoteCommandFailedDetails, Result};
use crate::remote::RemoteExecutor;
use crate::reset::{self, ResetConfig, ResetPipeline, ResetReport};
use crate::runner::{CommandRunner, StepResult};
use crate::shell;

pub const DEFAULT_SITE: &str = "www";
pub const DEFAULT_ENVIRONMENT_FROM: &str = "remote_stage";
pub const DEFAULT_ENVIRONMENT_AS: &str = "local";

/// Environment whose alias receives the import and the reset steps.
pub const LOCAL_ENVIRONMENT: &str = "local";

const CONFIRM_QUESTION: &str = "Confirm overwrite of database?";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOptions {
    pub site: String,
    pub environment_from: String,
    pub environment_as: String,
    pub skip_dump: bool,
    pub skip_dump_recent: bool,
    pub skip_import: bool,
    pub skip_files: bool,
    pub skip_composer: bool,
    pub skip_reset: bool,
    pub dump_dir: Option<String>,
    pub dump_convert: bool,
    pub confirm: bool,
    pub verbose: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            site: DEFAULT_SITE.to_string(),
            environment_from: DEFAULT_ENVIRONMENT_FROM.to_string(),
            environment_as: DEFAULT_ENVIRONMENT_AS.to_string(),
            skip_dump: false,
            skip_dump_recent: false,
            skip_import: false,
            skip_files: false,
            skip_composer: false,
            skip_reset: false,
            dump_dir: None,
            dump_convert: false,
            confirm: false,
            verbose: false,
        }
    }
}

/// Asks the user before anything destructive happens.
pub trait Confirmation {
    fn confirm(&self, question: &str) -> Result<bool>;
}

/// Fixed answer, for non-interactive callers and tests.
#[derive(Debug, Clone, Copy)]
pub struct AutoAnswer(pub bool);

impl Confirmation for AutoAnswer {
    fn confirm(&self, _question: &str) -> Result<bool> {
        Ok(self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Composer,
    Dump,
    Import,
    Files,
    Reset,
}

impl Stage {
    pub fn title(&self) -> &'static str {
        match self {
            Stage::Composer => "Composer Install",
            Stage::Dump => "Database Dump",
            Stage::Import => "Database Import",
            Stage::Files => "File Import",
            Stage::Reset => "Drupal Reset",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    Ran,
    /// Ran, but a non-fatal command failed
    Warned,
    Skipped,
    Disabled,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    pub outcome: StageOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl StageReport {
    fn new(stage: Stage, outcome: StageOutcome, detail: Option<String>) -> Self {
        Self {
            stage,
            outcome,
            detail,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Completed,
    Declined,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub status: SyncStatus,
    pub site: String,
    pub environment_from: String,
    pub environment_as: String,
    pub dump_file: String,
    pub stages: Vec<StageReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset: Option<ResetReport>,
}

/// External commands whose failure handling is decided explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallSite {
    ComposerInstall,
    RemoteCacheClear,
    RemoteDump,
    DumpConvert,
    LocalDrop,
    LocalImport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    Warn,
    Fatal,
}

/// Reset steps are always fatal and handled by the reset pipeline itself.
pub fn failure_policy(call: CallSite) -> FailurePolicy {
    match call {
        CallSite::ComposerInstall => FailurePolicy::Warn,
        CallSite::RemoteCacheClear => FailurePolicy::Warn,
        CallSite::RemoteDump => FailurePolicy::Fatal,
        CallSite::DumpConvert => FailurePolicy::Fatal,
        CallSite::LocalDrop => FailurePolicy::Fatal,
        CallSite::LocalImport => FailurePolicy::Fatal,
    }
}

pub struct SyncOrchestrator<'a> {
    ctx: &'a SyncContext,
    runner: &'a dyn CommandRunner,
    aliases: &'a dyn AliasRegistry,
    confirmation: &'a dyn Confirmation,
}

struct Targets {
    source: ExecutionTarget,
    local: ExecutionTarget,
}

impl<'a> SyncOrchestrator<'a> {
    pub fn new(
        ctx: &'a SyncContext,
        runner: &'a dyn CommandRunner,
        aliases: &'a dyn AliasRegistry,
        confirmation: &'a dyn Confirmation,
    ) -> Self {
        Self {
            ctx,
            runner,
            aliases,
            confirmation,
        }
    }

    pub fn run(&self, options: &SyncOptions) -> Result<SyncReport> {
        validate(options)?;

        log_status!("sync", "Site: {}", options.site);
        log_status!("sync", "Environment from: {}", options.environment_from);
        log_status!("sync", "Environment as: {}", options.environment_as);

        // Everything that can fail on configuration is checked before the
        // confirmation gate, so nothing destructive has happened yet.
        let resolver = AliasResolver::new(self.aliases);
        let targets = Targets {
            source: resolver.resolve(&options.site, &options.environment_from)?,
            local: resolver.resolve(&options.site, LOCAL_ENVIRONMENT)?,
        };
        let reset_config = if options.skip_reset {
            None
        } else {
            Some(reset::load_config(&self.ctx.reset_config_path())?)
        };

        let descriptor = DumpDescriptor::new(
            &self.ctx.project_root,
            options.dump_dir.as_deref(),
            &options.site,
            &options.environment_from,
        );

        let mut report = SyncReport {
            status: SyncStatus::Declined,
            site: options.site.clone(),
            environment_from: options.environment_from.clone(),
            environment_as: options.environment_as.clone(),
            dump_file: descriptor.path.display().to_string(),
            stages: Vec::new(),
            reset: None,
        };

        if !options.confirm && !self.confirmation.confirm(CONFIRM_QUESTION)? {
            log_status!("sync", "Cancelled, nothing was changed");
            return Ok(report);
        }

        let executor = RemoteExecutor::new(
            self.runner,
            self.ctx.defaults.drush.clone(),
            self.ctx.project_root.clone(),
        );

        report.stages.push(self.composer_stage(options)?);
        report
            .stages
            .push(self.dump_stage(options, &descriptor, &executor, &targets.source)?);
        report
            .stages
            .push(self.import_stage(options, &descriptor, &executor, &targets.local)?);
        report.stages.push(self.files_stage());

        match reset_config {
            Some(config) => {
                let reset = self.reset_stage(options, &config, &executor, &targets.local)?;
                report.stages.push(StageReport::new(Stage::Reset, StageOutcome::Ran, None));
                report.reset = Some(reset);
            }
            None => report.stages.push(skipped(Stage::Reset)),
        }

        report.status = SyncStatus::Completed;
        log_status!("sync", "Synchronization complete");
        Ok(report)
    }

    fn composer_stage(&self, options: &SyncOptions) -> Result<StageReport> {
        if options.skip_composer {
            return Ok(skipped(Stage::Composer));
        }
        header(Stage::Composer);

        log_status!("sync", "Installing Dependencies");
        let command = &self.ctx.defaults.composer_command;
        let result = self
            .runner
            .run(command, &self.ctx.project_root, &[], options.verbose)?;
        let warned = check(CallSite::ComposerInstall, Stage::Composer, command, None, result)?;

        Ok(finished(Stage::Composer, warned, None))
    }

    fn dump_stage(
        &self,
        options: &SyncOptions,
        descriptor: &DumpDescriptor,
        executor: &RemoteExecutor<'_>,
        source: &ExecutionTarget,
    ) -> Result<StageReport> {
        if options.skip_dump {
            return Ok(skipped(Stage::Dump));
        }
        header(Stage::Dump);

        log_status!("sync", "Validating dump directory");
        descriptor.ensure_directory()?;

        let threshold = self.ctx.defaults.dump_threshold_secs;
        if dump::should_skip(&descriptor.path, options.skip_dump_recent, threshold) {
            log_status!("sync", "Skipping");
            return Ok(StageReport::new(
                Stage::Dump,
                StageOutcome::Skipped,
                Some(format!("{} is less than {}s old", descriptor.path.display(), threshold)),
            ));
        }

        log_status!("sync", "Clearing Remote Cache");
        let command = "cr 2>&1";
        let result = executor.execute(command, source, None, options.verbose)?;
        let mut warned = check(
            CallSite::RemoteCacheClear,
            Stage::Dump,
            &executor.command_line(command, source),
            Some(source),
            result,
        )?;

        log_status!("sync", "Dumping Remote Database");
        let dump_path = descriptor.path.display().to_string();
        let command = format!(
            "sql:dump {} > {}",
            self.ctx.defaults.dump_options,
            shell::quote_path(&dump_path)
        );
        let result = executor.execute(&command, source, None, options.verbose)?;
        warned |= check(
            CallSite::RemoteDump,
            Stage::Dump,
            &executor.command_line(&command, source),
            Some(source),
            result,
        )?;

        if options.dump_convert {
            log_status!(
                "sync",
                "Converting to {} Format",
                self.ctx.defaults.convert_to
            );
            let command = convert_command(
                &self.ctx.defaults.convert_from,
                &self.ctx.defaults.convert_to,
                &descriptor.path,
            );
            let result = self
                .runner
                .run(&command, &self.ctx.project_root, &[], options.verbose)?;
            warned |= check(CallSite::DumpConvert, Stage::Dump, &command, None, result)?;
        }

        log_status!("sync", "Finishing");
        Ok(finished(Stage::Dump, warned, Some(dump_path)))
    }

    fn import_stage(
        &self,
        options: &SyncOptions,
        descriptor: &DumpDescriptor,
        executor: &RemoteExecutor<'_>,
        local: &ExecutionTarget,
    ) -> Result<StageReport> {
        if options.skip_import {
            return Ok(skipped(Stage::Import));
        }
        header(Stage::Import);

        if !descriptor.exists() {
            log_status!("sync", "Skipping");
            return Ok(StageReport::new(
                Stage::Import,
                StageOutcome::Skipped,
                Some(format!("{} does not exist", descriptor.path.display())),
            ));
        }

        log_status!("sync", "Dropping Local Database");
        let command = "sql-drop -y";
        let result = executor.execute(command, local, None, options.verbose)?;
        let mut warned = check(
            CallSite::LocalDrop,
            Stage::Import,
            &executor.command_line(command, local),
            Some(local),
            result,
        )?;

        log_status!("sync", "Importing Database from File");
        let command = format!(
            "sql-cli < {}",
            shell::quote_path(&descriptor.path.display().to_string())
        );
        let result = executor.execute(&command, local, None, options.verbose)?;
        warned |= check(
            CallSite::LocalImport,
            Stage::Import,
            &executor.command_line(&command, local),
            Some(local),
            result,
        )?;

        Ok(finished(Stage::Import, warned, None))
    }

    /// File sync from the source environment is not implemented. The stage
    /// is always reported as disabled and `skip_files` has no effect.
    fn files_stage(&self) -> StageReport {
        StageReport::new(
            Stage::Files,
            StageOutcome::Disabled,
            Some("file sync is not implemented".to_string()),
        )
    }

    fn reset_stage(
        &self,
        options: &SyncOptions,
        config: &ResetConfig,
        executor: &RemoteExecutor<'_>,
        local: &ExecutionTarget,
    ) -> Result<ResetReport> {
        header(Stage::Reset);

        let docroot = self.ctx.docroot_path();
        let report = ResetPipeline::new(
            self.runner,
            executor,
            &docroot,
            local,
            &options.site,
            &options.environment_as,
        )
        .verbose(options.verbose)
        .run(&config.commands)?;

        log_status!("sync", "{} reset steps completed", report.steps.len());
        Ok(report)
    }
}

fn validate(options: &SyncOptions) -> Result<()> {
    let missing: Vec<String> = [
        ("site", &options.site),
        ("environment_from", &options.environment_from),
        ("environment_as", &options.environment_as),
    ]
    .iter()
    .filter(|(_, value)| value.trim().is_empty())
    .map(|(name, _)| name.to_string())
    .collect();

    if !missing.is_empty() {
        return Err(Error::validation_missing_argument(missing));
    }

    for (field, value) in [("site", &options.site), ("environment_from", &options.environment_from)] {
        if value.contains(['/', ' ']) {
            return Err(Error::validation_invalid_argument(
                field,
                format!("'{}' must not contain slashes or spaces", value),
            ));
        }
    }

    Ok(())
}

/// Apply the decision table to one command result.
///
/// Returns `Ok(true)` when a non-fatal failure was tolerated.
fn check(
    call: CallSite,
    stage: Stage,
    command: &str,
    target: Option<&ExecutionTarget>,
    result: StepResult,
) -> Result<bool> {
    if result.success {
        return Ok(false);
    }

    match failure_policy(call) {
        FailurePolicy::Warn => {
            log_status!(
                "sync",
                "Warning: '{}' exited with {}, continuing",
                command,
                result.exit_code
            );
            Ok(true)
        }
        FailurePolicy::Fatal => {
            log_status!("sync", "Error: {}", result.output_text());
            Err(Error::remote_command_failed(RemoteCommandFailedDetails {
                stage: stage.title().to_string(),
                command: command.to_string(),
                exit_code: result.exit_code,
                output: result.output,
                target: target.map(|t| t.id.clone()),
            }))
        }
    }
}

fn convert_command(from: &str, to: &str, path: &Path) -> String {
    format!(
        "sed -i.bak {} {}",
        shell::quote_arg(&format!("s/{}/{}/g", from, to)),
        shell::quote_path(&path.display().to_string())
    )
}

fn header(stage: Stage) {
    log_status!("sync", "== {} ==", stage.title());
}

fn skipped(stage: Stage) -> StageReport {
    StageReport::new(stage, StageOutcome::Skipped, Some("skipped by option".to_string()))
}

fn finished(stage: Stage, warned: bool, detail: Option<String>) -> StageReport {
    let outcome = if warned {
        StageOutcome::Warned
    } else {
        StageOutcome::Ran
    };
    StageReport::new(stage, outcome, detail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_table_matches_documented_policy() {
        assert_eq!(failure_policy(CallSite::ComposerInstall), FailurePolicy::Warn);
        assert_eq!(failure_policy(CallSite::RemoteCacheClear), FailurePolicy::Warn);
        assert_eq!(failure_policy(CallSite::RemoteDump), FailurePolicy::Fatal);
        assert_eq!(failure_policy(CallSite::DumpConvert), FailurePolicy::Fatal);
        assert_eq!(failure_policy(CallSite::LocalDrop), FailurePolicy::Fatal);
        assert_eq!(failure_policy(CallSite::LocalImport), FailurePolicy::Fatal);
    }

    #[test]
    fn convert_command_quotes_expression_and_path() {
        let cmd = convert_command("InnoDB", "MyISAM", Path::new("/tmp/www.prod.sql"));
        assert_eq!(cmd, "sed -i.bak s/InnoDB/MyISAM/g '/tmp/www.prod.sql'");
    }

    #[test]
    fn validate_rejects_blank_and_path_like_values() {
        let mut options = SyncOptions::default();
        assert!(validate(&options).is_ok());

        options.site = " ".to_string();
        assert_eq!(
            validate(&options).unwrap_err().code,
            crate::error::ErrorCode::ValidationMissingArgument
        );

        options.site = "../www".to_string();
        assert_eq!(
            validate(&options).unwrap_err().code,
            crate::error::ErrorCode::ValidationInvalidArgument
        );
    }

    #[test]
    fn warn_policy_tolerates_failure() {
        let result = StepResult::from_exit_code(1, vec!["composer broke".to_string()]);
        let warned = check(CallSite::ComposerInstall, Stage::Composer, "composer", None, result).unwrap();
        assert!(warned);
    }

    #[test]
    fn fatal_policy_returns_remote_command_failed() {
        let result = StepResult::from_exit_code(2, vec!["access denied".to_string()]);
        let err = check(CallSite::RemoteDump, Stage::Dump, "drush sql:dump", None, result).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::RemoteCommandFailed);
        assert_eq!(err.details["stage"], "Database Dump");
        assert_eq!(err.details["output"][0], "access denied");
    }
}
