pub mod sync;

pub type CmdResult<T> = envsync::Result<(T, i32)>;

pub struct GlobalArgs {
    pub verbose: bool,
}

macro_rules! dispatch {
    ($args:expr, $global:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args, $global))
    };
}

pub fn run_json(
    command: crate::Commands,
    global: &GlobalArgs,
) -> (envsync::Result<serde_json::Value>, i32) {
    match command {
        crate::Commands::Sync(args) => dispatch!(args, global, sync),
    }
}
