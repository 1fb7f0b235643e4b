use clap::{Parser, Subcommand};

use commands::GlobalArgs;

mod commands;
mod output;
mod tty;

use commands::sync;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "envsync")]
#[command(version = VERSION)]
#[command(about = "Pull a remote environment's database into a local site and reset it")]
struct Cli {
    /// Stream command output while it runs
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synchronize a local environment from a remote one
    Sync(sync::SyncArgs),
}

fn main() -> std::process::ExitCode {
    let args = envsync::args::normalize(std::env::args().collect());
    let cli = Cli::parse_from(args);

    let global = GlobalArgs {
        verbose: cli.verbose,
    };

    let (json_result, exit_code) = commands::run_json(cli.command, &global);
    if let Err(err) = output::print_json_result(json_result) {
        eprintln!("{}", err);
    }

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
