use crate::{newest_first, ConversationStore};
use async_trait::async_trait;
use chatgate_common::{ConversationRecord, ConversationTurn, Result};
use tokio::sync::RwLock;

/// Process-local store; contents are lost on restart
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<Vec<ConversationRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn read_recent(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>> {
        let records = self.records.read().await;
        Ok(newest_first(records.iter(), conversation_id, limit))
    }

    async fn append(&self, record: &ConversationRecord) -> Result<()> {
        self.records.write().await.push(record.clone());
        Ok(())
    }
}
