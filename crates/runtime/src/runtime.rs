use crate::{ModelBackend, OpenAiAdapter};
use chatgate_common::Result;
use chatgate_config::AppConfig;
use std::sync::Arc;
use tracing::{info, warn};

/// Factory for creating model backends
pub struct ModelRuntime;

impl ModelRuntime {
    /// Create a backend based on configuration
    pub fn create(config: &AppConfig) -> Result<Arc<dyn ModelBackend>> {
        // For now, we only support OpenAI-compatible endpoints
        if config.model.api_key.is_empty() {
            warn!("No model API key configured; requests will be sent unauthenticated");
        }

        let adapter = OpenAiAdapter::new(&config.model)?;
        info!("Model backend: {} at {}", config.model.model, config.model.endpoint);

        Ok(Arc::new(adapter))
    }
}
