//! Argument normalization utilities.
//!
//! Transforms CLI arguments before clap parsing to support syntax clap
//! cannot express directly.

/// Multi-letter short options of `sync` and the long flags they stand for.
const SYNC_SHORT_FLAGS: &[(&str, &str)] = &[
    ("-ef", "--environment_from"),
    ("-ea", "--environment_as"),
    ("-sdr", "--skip-dump-recent"),
    ("-sd", "--skip-dump"),
    ("-si", "--skip-import"),
    ("-sf", "--skip-files"),
    ("-sc", "--skip-composer"),
    ("-sr", "--skip-reset"),
    ("-dd", "--dump-dir"),
    ("-dc", "--dump-convert"),
];

/// Rewrite `sync` short options such as `-ef remote_stage` or `-dd=dumps`
/// into their long forms. Global flags may precede the subcommand; nothing
/// before it and nothing after `--` is rewritten.
pub fn normalize_sync_short_flags(args: Vec<String>) -> Vec<String> {
    let Some(position) = subcommand_position(&args) else {
        return args;
    };
    if args[position] != "sync" {
        return args;
    }

    let mut found_separator = false;
    args.into_iter()
        .enumerate()
        .map(|(index, arg)| {
            if index <= position || found_separator {
                return arg;
            }
            if arg == "--" {
                found_separator = true;
                return arg;
            }
            expand_short_flag(&arg).unwrap_or(arg)
        })
        .collect()
}

/// Index of the first argument after the program name that is not a flag.
/// Global flags take no values, so this is the subcommand.
fn subcommand_position(args: &[String]) -> Option<usize> {
    args.iter()
        .enumerate()
        .skip(1)
        .take_while(|(_, arg)| arg.as_str() != "--")
        .find(|(_, arg)| !arg.starts_with('-'))
        .map(|(index, _)| index)
}

fn expand_short_flag(arg: &str) -> Option<String> {
    let (flag, value) = match arg.split_once('=') {
        Some((flag, value)) => (flag, Some(value)),
        None => (arg, None),
    };

    let (_, long) = SYNC_SHORT_FLAGS.iter().find(|(short, _)| *short == flag)?;
    Some(match value {
        Some(value) => format!("{}={}", long, value),
        None => long.to_string(),
    })
}

/// Apply all argument normalizations in sequence.
pub fn normalize(args: Vec<String>) -> Vec<String> {
    normalize_sync_short_flags(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn expands_multi_letter_shorts() {
        let result = normalize(args(&[
            "envsync", "sync", "-ef", "remote_stage", "-ea", "staging", "-sdr", "-sc", "-y",
        ]));
        assert_eq!(
            result,
            args(&[
                "envsync",
                "sync",
                "--environment_from",
                "remote_stage",
                "--environment_as",
                "staging",
                "--skip-dump-recent",
                "--skip-composer",
                "-y",
            ])
        );
    }

    #[test]
    fn expands_shorts_with_inline_value() {
        let result = normalize(args(&["envsync", "sync", "-dd=dumps"]));
        assert_eq!(result[2], "--dump-dir=dumps");
    }

    #[test]
    fn leaves_values_and_single_letter_flags_alone() {
        let input = args(&["envsync", "sync", "-s", "www", "--site", "-sd-like"]);
        assert_eq!(normalize(input.clone()), input);
    }

    #[test]
    fn stops_at_separator() {
        let result = normalize(args(&["envsync", "sync", "--", "-sd"]));
        assert_eq!(result[3], "-sd");
    }

    #[test]
    fn expands_after_leading_global_flag() {
        let result = normalize(args(&["envsync", "-v", "sync", "-ef", "prod", "-sdr"]));
        assert_eq!(
            result,
            args(&[
                "envsync",
                "-v",
                "sync",
                "--environment_from",
                "prod",
                "--skip-dump-recent",
            ])
        );
    }

    #[test]
    fn global_flags_before_subcommand_are_untouched() {
        let result = normalize(args(&["envsync", "--verbose", "sync", "-sc"]));
        assert_eq!(result[1], "--verbose");
        assert_eq!(result[3], "--skip-composer");
    }

    #[test]
    fn ignores_other_commands() {
        let input = args(&["envsync", "help", "-sd"]);
        assert_eq!(normalize(input.clone()), input);

        let flagged = args(&["envsync", "-v", "help", "-sd"]);
        assert_eq!(normalize(flagged.clone()), flagged);
    }
}
