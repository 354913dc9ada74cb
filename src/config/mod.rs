//! Exercise file loading and application.
pub(crate) mod apply;
mod loader;
pub mod types;


pub use apply::apply_config;
pub use loader::load_exercise;
pub use types::ExerciseFile;

#[cfg(test)]
pub(crate) use loader::load_exercise_file;
