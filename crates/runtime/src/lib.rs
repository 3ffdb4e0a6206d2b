mod openai_adapter;
mod runtime;


pub use openai_adapter::OpenAiAdapter;
pub use runtime::ModelRuntime;

use async_trait::async_trait;
use chatgate_common::{Message, Result};

/// Trait for hosted model backends
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Model identifier reported to the scanner and in logs
    fn model_name(&self) -> &str;

    /// Generate one complete response for the given conversation.
    ///
    /// Faults are `Error::Generation`; `content_filtered` is set when the
    /// provider refused the content under its own safety policy.
    async fn complete(&self, messages: &[Message]) -> Result<String>;
}
