// src/storage/mod.rs
use crate::error::{BotError, Result};
use crate::types::Order;
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Sink for completed orders.
#[async_trait]
pub trait OrderRecorder: Send + Sync {
    async fn record_order(&self, bot_label: &str, order: &Order, order_id: &str) -> Result<()>;
}

#[derive(Serialize)]
struct OrderRecord<'a> {
    bot: &'a str,
    order_id: &'a str,
    recorded_at: String,
    order: &'a Order,
}

/// Appends one JSON object per order to a JSON-lines file.
pub struct JsonlOrderRecorder {
    path: PathBuf,
}

impl JsonlOrderRecorder {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl OrderRecorder for JsonlOrderRecorder {
    async fn record_order(&self, bot_label: &str, order: &Order, order_id: &str) -> Result<()> {
        let record = OrderRecord {
            bot: bot_label,
            order_id,
            recorded_at: Utc::now().to_rfc3339(),
            order,
        };
        let mut line =
            serde_json::to_string(&record).map_err(|e| BotError::Persistence(e.to_string()))?;
        line.push('\n');

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| BotError::Persistence(format!("{}: {}", dir.display(), e)))?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| BotError::Persistence(format!("{}: {}", self.path.display(), e)))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| BotError::Persistence(e.to_string()))?;
        file.flush()
            .await
            .map_err(|e| BotError::Persistence(e.to_string()))?;
        Ok(())
    }
}
