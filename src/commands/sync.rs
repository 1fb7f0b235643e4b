use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use envsync::alias::DrushAliasRegistry;
use envsync::context::SyncContext;
use envsync::runner::ShellRunner;
use envsync::sync::{
    SyncOptions, SyncOrchestrator, SyncReport, DEFAULT_ENVIRONMENT_AS, DEFAULT_ENVIRONMENT_FROM,
    DEFAULT_SITE,
};

use super::{CmdResult, GlobalArgs};
use crate::tty;

/// Multi-letter short forms (`-ef`, `-sdr`, ...) are rewritten to the long
/// flags before parsing.
#[derive(Args, Debug, Default)]
pub struct SyncArgs {
    /// Auto confirm actions [-y]
    #[arg(short = 'y', long)]
    pub confirm: bool,

    /// The site to sync [-s]
    #[arg(short = 's', long)]
    pub site: Option<String>,

    /// The environment to import from [-ef]
    #[arg(long = "environment_from")]
    pub environment_from: Option<String>,

    /// The environment to import as [-ea]
    #[arg(long = "environment_as", default_value = DEFAULT_ENVIRONMENT_AS)]
    pub environment_as: String,

    /// Skip MySQL dump file creation [-sd]
    #[arg(long)]
    pub skip_dump: bool,

    /// Skip MySQL dump file creation if file is recent [-sdr]
    #[arg(long)]
    pub skip_dump_recent: bool,

    /// Skip database import [-si]
    #[arg(long)]
    pub skip_import: bool,

    /// Skip file rsync (file sync is not implemented; accepted for compatibility) [-sf]
    #[arg(long)]
    pub skip_files: bool,

    /// Skip composer dependency install [-sc]
    #[arg(long)]
    pub skip_composer: bool,

    /// Skip Drupal reset [-sr]
    #[arg(long)]
    pub skip_reset: bool,

    /// Dump directory, relative to the project root [-dd]
    #[arg(long, value_name = "DIR")]
    pub dump_dir: Option<String>,

    /// Rewrite the dump's storage engine (InnoDB to MyISAM by default) [-dc]
    #[arg(long)]
    pub dump_convert: bool,

    /// Project root (defaults to $PROJECT_ROOT, then the current directory)
    #[arg(long, value_name = "PATH")]
    pub project_root: Option<String>,

    /// Document root relative to the project root (defaults to $DOCROOT, then "docroot")
    #[arg(long, value_name = "PATH")]
    pub docroot: Option<String>,

    /// Reset configuration file relative to the project root
    #[arg(long, value_name = "PATH")]
    pub reset_config: Option<String>,
}

#[derive(Serialize)]
pub struct SyncOutput {
    pub command: String,
    pub project_root: String,
    #[serde(flatten)]
    pub report: SyncReport,
}

pub fn run(args: SyncArgs, global: &GlobalArgs) -> CmdResult<SyncOutput> {
    let project_root = resolve_project_root(args.project_root.as_deref())?;
    let docroot = args
        .docroot
        .clone()
        .or_else(|| non_empty_env("DOCROOT"))
        .map(PathBuf::from);
    let reset_config = args.reset_config.clone().map(|p| PathBuf::from(expand(&p)));

    let ctx = SyncContext::new(project_root, docroot, reset_config)?;
    let options = build_options(args, global);

    require_confirmation_source(options.confirm, tty::is_stdin_tty())?;

    tty::status("envsync is working...");

    let runner = ShellRunner;
    let aliases = DrushAliasRegistry::new(&runner, ctx.defaults.drush.clone(), ctx.project_root.clone());
    let confirmation = tty::TtyConfirmation;

    let report = SyncOrchestrator::new(&ctx, &runner, &aliases, &confirmation).run(&options)?;

    Ok((
        SyncOutput {
            command: "sync".to_string(),
            project_root: ctx.project_root.display().to_string(),
            report,
        },
        0,
    ))
}

fn build_options(args: SyncArgs, global: &GlobalArgs) -> SyncOptions {
    SyncOptions {
        site: args.site.unwrap_or_else(|| DEFAULT_SITE.to_string()),
        environment_from: args
            .environment_from
            .unwrap_or_else(|| DEFAULT_ENVIRONMENT_FROM.to_string()),
        environment_as: args.environment_as,
        skip_dump: args.skip_dump,
        skip_dump_recent: args.skip_dump_recent,
        skip_import: args.skip_import,
        skip_files: args.skip_files,
        skip_composer: args.skip_composer,
        skip_reset: args.skip_reset,
        dump_dir: args.dump_dir,
        dump_convert: args.dump_convert,
        confirm: args.confirm,
        verbose: global.verbose,
    }
}

/// Without `--confirm` the overwrite question needs a terminal to answer it.
fn require_confirmation_source(confirm: bool, interactive: bool) -> envsync::Result<()> {
    if confirm || interactive {
        return Ok(());
    }
    Err(envsync::Error::validation_invalid_argument(
        "confirm",
        "Confirmation needs an interactive terminal; pass --confirm (-y) to run unattended",
    ))
}

fn resolve_project_root(flag: Option<&str>) -> envsync::Result<PathBuf> {
    if let Some(path) = flag.map(str::to_string).or_else(|| non_empty_env("PROJECT_ROOT")) {
        return Ok(PathBuf::from(expand(&path)));
    }
    std::env::current_dir().map_err(|e| {
        envsync::Error::internal_io(e.to_string(), Some("resolve current directory".to_string()))
    })
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn expand(path: &str) -> String {
    shellexpand::tilde(path).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_site_and_source_fall_back_to_defaults() {
        let args = SyncArgs {
            environment_as: DEFAULT_ENVIRONMENT_AS.to_string(),
            ..Default::default()
        };
        let options = build_options(args, &GlobalArgs { verbose: true });
        assert_eq!(options.site, "www");
        assert_eq!(options.environment_from, "remote_stage");
        assert_eq!(options.environment_as, "local");
        assert!(options.verbose);
        assert!(!options.confirm);
    }

    #[test]
    fn flags_map_onto_options() {
        let args = SyncArgs {
            site: Some("intranet".to_string()),
            environment_from: Some("prod".to_string()),
            environment_as: "staging".to_string(),
            skip_dump_recent: true,
            skip_files: true,
            dump_dir: Some("dumps".to_string()),
            confirm: true,
            ..Default::default()
        };
        let options = build_options(args, &GlobalArgs { verbose: false });
        assert_eq!(options.site, "intranet");
        assert_eq!(options.environment_from, "prod");
        assert_eq!(options.environment_as, "staging");
        assert!(options.skip_dump_recent);
        assert!(options.skip_files);
        assert_eq!(options.dump_dir.as_deref(), Some("dumps"));
        assert!(options.confirm);
    }

    #[test]
    fn unattended_run_without_confirm_is_rejected() {
        let err = require_confirmation_source(false, false).unwrap_err();
        assert_eq!(err.code, envsync::ErrorCode::ValidationInvalidArgument);
        assert_eq!(err.details["field"], "confirm");
    }

    #[test]
    fn confirm_flag_or_terminal_is_enough() {
        assert!(require_confirmation_source(true, false).is_ok());
        assert!(require_confirmation_source(false, true).is_ok());
    }

    #[test]
    fn explicit_project_root_wins() {
        let root = resolve_project_root(Some("/srv/project")).unwrap();
        assert_eq!(root, PathBuf::from("/srv/project"));
    }
}
