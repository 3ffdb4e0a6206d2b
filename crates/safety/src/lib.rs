mod client;
pub mod reasons;

#[cfg(test)]
mod tests;

pub use client::{ScanAction, ScanClient, ScanVerdict, SafetyProfile, AUTH_HEADER};
pub use reasons::{resolve, BlockCategory};

use async_trait::async_trait;
use chatgate_common::Result;

/// Content-safety scanner consulted before and after generation
#[async_trait]
pub trait Scanner: Send + Sync {
    /// Whether scanning is switched on for this process
    fn enabled(&self) -> bool;

    /// Scan an outgoing user prompt
    async fn scan_prompt(&self, conversation_id: &str, prompt: &str) -> Result<ScanVerdict>;

    /// Scan a model response, with its prompt as context
    async fn scan_response(
        &self,
        conversation_id: &str,
        prompt: &str,
        response: &str,
    ) -> Result<ScanVerdict>;
}
