use crate::{newest_first, ConversationStore};
use async_trait::async_trait;
use chatgate_common::{ConversationRecord, ConversationTurn, Error, Result};
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

/// Append-only file store, one JSON record per line
#[derive(Debug)]
pub struct JsonlStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<Vec<ConversationRecord>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(Error::StoreRead(format!(
                    "{}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        let mut records = Vec::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ConversationRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    "Skipping unreadable record at {}:{}: {}",
                    self.path.display(),
                    index + 1,
                    e
                ),
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl ConversationStore for JsonlStore {
    async fn read_recent(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>> {
        let records = self.load().await?;
        Ok(newest_first(records.iter(), conversation_id, limit))
    }

    async fn append(&self, record: &ConversationRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let persist_err =
            |e: std::io::Error| Error::StorePersist(format!("{}: {}", self.path.display(), e));

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(persist_err)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(persist_err)?;
        file.write_all(line.as_bytes()).await.map_err(persist_err)?;
        file.flush().await.map_err(persist_err)?;
        Ok(())
    }
}
