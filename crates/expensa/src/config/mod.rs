pub mod loader;
pub mod schema;

pub use loader::{load_config, load_config_from_str};
pub use schema::{
    BackendConfig, Config, DatabaseConfig, FormatsConfig, LimitsConfig, NotifyConfig,
    PushConfig, RenderConfig, StorageConfig,
};
