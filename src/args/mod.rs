//! CLI argument types and parsing helpers.
mod cli;
mod defaults;
pub(crate) mod parsers;
mod types;

#[cfg(test)]
mod tests;

pub use cli::{Command, OrchestratorArgs};
pub use types::{Endpoint, OutputFormat, PositiveUsize};
