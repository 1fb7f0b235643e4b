// Public modules
pub mod alias;
pub mod context;
pub mod defaults;
pub mod dump;
pub mod error;
pub mod remote;
pub mod reset;
pub mod runner;
pub mod sync;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result};
