mod config_loader;


pub use config_loader::{
    AppConfig, ChatConfig, ConfigLoader, ModelConfig, SafetyConfig, ServerConfig, StoreBackend,
    StoreConfig,
};
