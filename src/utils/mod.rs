//! Generic utility primitives with zero domain knowledge.
//!
//! - `args` - CLI argument normalization
//! - `shell` - Shell escaping and quoting
//! - `template` - `%token%` substitution

pub mod args;
pub mod shell;
pub mod template;
