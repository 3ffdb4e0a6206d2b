mod jsonl;
mod memory;


pub use jsonl::JsonlStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use chatgate_common::{ConversationRecord, ConversationTurn, Result};
use chatgate_config::{StoreBackend, StoreConfig};
use std::sync::Arc;
use tracing::info;

/// Trait for persistent conversation storage
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Up to `limit` most recent turns of a conversation, newest first
    async fn read_recent(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>>;

    /// Append one turn. Records are never updated or deleted.
    async fn append(&self, record: &ConversationRecord) -> Result<()>;
}

/// Open the store selected by configuration
pub fn open(config: &StoreConfig) -> Arc<dyn ConversationStore> {
    match config.backend {
        StoreBackend::Memory => {
            info!("Conversation store: in-memory");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::Jsonl => {
            info!("Conversation store: {}", config.path.display());
            Arc::new(JsonlStore::new(config.path.clone()))
        }
    }
}

/// Newest first by creation time; on equal timestamps the later append wins
fn newest_first<'a>(
    records: impl Iterator<Item = &'a ConversationRecord>,
    conversation_id: &str,
    limit: usize,
) -> Vec<ConversationTurn> {
    let mut matching: Vec<&ConversationRecord> = records
        .filter(|record| record.conversation_id == conversation_id)
        .collect();
    matching.sort_by_key(|record| record.created_at);

    matching
        .into_iter()
        .rev()
        .take(limit)
        .map(ConversationRecord::turn)
        .collect()
}
