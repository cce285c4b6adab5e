mod app;
mod config;
mod registry;
mod validation;

pub use app::{AppError, AppResult};
pub use config::ConfigError;
pub use registry::RegistryError;
pub use validation::ValidationError;
