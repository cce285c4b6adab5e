//! Configuration loading and application.
mod apply;
mod loader;
pub mod types;


pub use apply::{apply_config, build_catalog};
pub use loader::load_config;

#[cfg(test)]
pub(crate) use loader::load_config_file;
