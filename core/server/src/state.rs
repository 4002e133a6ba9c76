//! Shared handler state.

use std::sync::Arc;
use tracing::info;

use cipherkeep_common::Result;
use cipherkeep_storage::{BlobStore, MemoryRecordStore, RecordStore, SqliteRecordStore};

use crate::config::ServerConfig;
use crate::guard::SessionGuard;

/// Application state shared across all handlers.
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub blobs: BlobStore,
    pub guard: SessionGuard,
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Assemble state from explicit parts.
    pub fn new(store: Arc<dyn RecordStore>, blobs: BlobStore, guard: SessionGuard) -> Self {
        Self {
            store,
            blobs,
            guard,
            max_upload_bytes: ServerConfig::default().max_upload_bytes,
        }
    }

    /// Open the stores named by `config`.
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let store: Arc<dyn RecordStore> = if config.is_in_memory() {
            Arc::new(MemoryRecordStore::new())
        } else {
            Arc::new(SqliteRecordStore::open(&config.database)?)
        };
        let blobs = BlobStore::new(&config.storage)?;
        let guard = SessionGuard::new(config.session_ttl)?;

        info!(store = store.name(), storage = %config.storage.display(), "Server state ready");

        Ok(Self {
            store,
            blobs,
            guard,
            max_upload_bytes: config.max_upload_bytes,
        })
    }
}
