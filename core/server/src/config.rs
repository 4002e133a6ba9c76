//! Server configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Database setting that selects the in-memory record store.
pub const IN_MEMORY_DATABASE: &str = ":memory:";

/// Settings of one server instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address, e.g. `127.0.0.1:8080`.
    pub address: String,
    /// SQLite file holding records, or `:memory:`.
    pub database: String,
    /// Root directory of the blob store.
    pub storage: PathBuf,
    /// Lifetime of a session credential.
    pub session_ttl: Duration,
    /// Largest accepted request body, file uploads included.
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    /// Whether records are kept in memory only.
    pub fn is_in_memory(&self) -> bool {
        self.database == IN_MEMORY_DATABASE
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:8080".to_string(),
            database: "cipherkeep.db".to_string(),
            storage: PathBuf::from("storage"),
            session_ttl: Duration::from_secs(3600),
            max_upload_bytes: 64 * 1024 * 1024,
        }
    }
}
