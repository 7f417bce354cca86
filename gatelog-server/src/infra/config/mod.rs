pub mod loader;
pub mod models;
pub mod sources;

pub use loader::{ConfigLoadError, ConfigLoader};
pub use models::{
    Config, ConfigLoad, ConfigMetadata, ConfigWarning, ConfigWarnings,
    DatabaseConfig, Environment, ResetConfig, ScanConfig, ServerConfig,
};
