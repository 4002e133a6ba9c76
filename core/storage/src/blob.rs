//! Local filesystem blob store.
//!
//! Uploaded ciphertext is kept under random paths of the form
//! `ab/cd/ef/<26 hex digits>` below the store root. The path says nothing
//! about the file it holds and is never derived from client input.

use rand::rngs::OsRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use cipherkeep_common::{Error, Result};

const ALPHABET: &[u8; 16] = b"0123456789abcdef";

/// Number of random symbols in a blob path.
const PATH_SYMBOLS: usize = 32;

/// Length of each of the three directory levels.
const LEVEL_WIDTH: usize = 2;

/// Allocation gives up after this many collisions in a row.
pub const MAX_ALLOCATION_ATTEMPTS: usize = 1024;

/// Location of a blob relative to the store root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlobPath(String);

impl BlobPath {
    /// Draw a fresh random path.
    fn random() -> Self {
        let mut rng = OsRng;
        let symbols: Vec<u8> = (0..PATH_SYMBOLS)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())])
            .collect();
        // Every symbol is ASCII, so this never fails.
        let symbols = String::from_utf8_lossy(&symbols).into_owned();

        let (a, rest) = symbols.split_at(LEVEL_WIDTH);
        let (b, rest) = rest.split_at(LEVEL_WIDTH);
        let (c, leaf) = rest.split_at(LEVEL_WIDTH);
        Self(format!("{}/{}/{}/{}", a, b, c, leaf))
    }

    /// Parse a stored path, rejecting anything that could leave the root.
    pub fn parse(raw: &str) -> Result<Self> {
        let components: Vec<&str> = raw.split('/').collect();
        let well_formed = components.len() == 4
            && components[..3].iter().all(|c| c.len() == LEVEL_WIDTH)
            && components[3].len() == PATH_SYMBOLS - 3 * LEVEL_WIDTH
            && components
                .iter()
                .all(|c| c.bytes().all(|b| ALPHABET.contains(&b)));

        if !well_formed {
            return Err(Error::InvalidInput(format!("Invalid blob path: {}", raw)));
        }
        Ok(Self(raw.to_string()))
    }

    /// Get the path string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for BlobPath {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<BlobPath> for String {
    fn from(path: BlobPath) -> Self {
        path.0
    }
}

/// Content store for encrypted file bodies.
///
/// The root is shared by all requests. Concurrent allocations are kept
/// apart by creating the leaf exclusively, not by locking.
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        if !root.exists() {
            std::fs::create_dir_all(&root)?;
        }

        info!(root = %root.display(), "Blob store opened");
        Ok(Self { root })
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn to_fs_path(&self, path: &BlobPath) -> PathBuf {
        let mut fs_path = self.root.clone();
        for component in path.as_str().split('/') {
            fs_path.push(component);
        }
        fs_path
    }

    /// Reserve a fresh, unused blob path.
    ///
    /// # Postconditions
    /// - Parent directories exist
    /// - An empty file exists at the returned path, created exclusively,
    ///   so no other caller can have received the same path
    ///
    /// # Errors
    /// - `Error::Storage` after `MAX_ALLOCATION_ATTEMPTS` collisions
    /// - I/O errors creating directories
    pub async fn allocate_path(&self) -> Result<BlobPath> {
        for attempt in 1..=MAX_ALLOCATION_ATTEMPTS {
            let candidate = BlobPath::random();
            let fs_path = self.to_fs_path(&candidate);

            if let Some(parent) = fs_path.parent() {
                fs::create_dir_all(parent).await?;
            }

            match OpenOptions::new().write(true).create_new(true).open(&fs_path).await {
                Ok(_) => return Ok(candidate),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!(attempt, path = %candidate, "Blob path collision, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(attempts = MAX_ALLOCATION_ATTEMPTS, "Blob path allocation exhausted");
        Err(Error::Storage("could not allocate a blob path".to_string()))
    }

    /// Write `data` at a freshly allocated path.
    pub async fn put(&self, path: &BlobPath, data: &[u8]) -> Result<()> {
        let mut file = File::create(self.to_fs_path(path)).await?;
        file.write_all(data).await?;
        file.sync_all().await?;

        debug!(path = %path, size = data.len(), "Blob written");
        Ok(())
    }

    /// Allocate a path and write `data` to it.
    ///
    /// A failed write releases the reserved path.
    pub async fn store(&self, data: &[u8]) -> Result<BlobPath> {
        let path = self.allocate_path().await?;
        let written = self.put(&path, data).await;
        self.release_on_error(&path, written).await?;
        Ok(path)
    }

    /// Pass `result` through, removing the reservation at `path` if it failed.
    async fn release_on_error<T>(&self, path: &BlobPath, result: Result<T>) -> Result<T> {
        if result.is_err() {
            if let Err(e) = self.delete(path).await {
                warn!(path = %path, error = %e, "Could not release blob path");
            }
        }
        result
    }

    /// Open a blob for reading.
    ///
    /// # Errors
    /// - `Error::NotFound` if there is no blob at `path`
    pub async fn get(&self, path: &BlobPath) -> Result<File> {
        match File::open(self.to_fs_path(path)).await {
            Ok(file) => Ok(file),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(Error::NotFound(format!("Blob not found: {}", path)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a blob. Removing an absent blob succeeds.
    pub async fn delete(&self, path: &BlobPath) -> Result<()> {
        match fs::remove_file(self.to_fs_path(path)).await {
            Ok(()) => {
                debug!(path = %path, "Blob deleted");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    #[test]
    fn test_random_path_shape() {
        let path = BlobPath::random();
        let parts: Vec<&str> = path.as_str().split('/').collect();

        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0].len(), 2);
        assert_eq!(parts[3].len(), 26);
        assert!(BlobPath::parse(path.as_str()).is_ok());
    }

    #[test]
    fn test_parse_rejects_escape() {
        assert!(BlobPath::parse("../../etc/passwd").is_err());
        assert!(BlobPath::parse("/ab/cd/ef/0123456789abcdef0123456789").is_err());
        assert!(BlobPath::parse("AB/cd/ef/0123456789abcdef0123456789").is_err());
        assert!(BlobPath::parse("").is_err());
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let temp = TempDir::new().unwrap();
        let store = BlobStore::new(temp.path().join("blobs")).unwrap();

        let path = store.store(b"ciphertext").await.unwrap();
        let mut file = store.get(&path).await.unwrap();
        let mut content = Vec::new();
        file.read_to_end(&mut content).await.unwrap();

        assert_eq!(content, b"ciphertext");
        assert!(store.root().join(path.as_str()).exists());
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let temp = TempDir::new().unwrap();
        let store = BlobStore::new(temp.path()).unwrap();
        let path = BlobPath::random();

        assert!(matches!(store.get(&path).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_twice_succeeds() {
        let temp = TempDir::new().unwrap();
        let store = BlobStore::new(temp.path()).unwrap();
        let path = store.store(b"x").await.unwrap();

        store.delete(&path).await.unwrap();
        store.delete(&path).await.unwrap();

        assert!(matches!(store.get(&path).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_failed_write_releases_reservation() {
        let temp = TempDir::new().unwrap();
        let store = BlobStore::new(temp.path()).unwrap();
        let path = store.allocate_path().await.unwrap();
        assert!(store.root().join(path.as_str()).exists());

        let failed: Result<()> = Err(Error::Storage("No space left on device".into()));
        let result = store.release_on_error(&path, failed).await;

        assert!(matches!(result, Err(Error::Storage(_))));
        assert!(!store.root().join(path.as_str()).exists());
    }

    #[tokio::test]
    async fn test_successful_write_keeps_blob() {
        let temp = TempDir::new().unwrap();
        let store = BlobStore::new(temp.path()).unwrap();
        let path = store.allocate_path().await.unwrap();

        store.release_on_error(&path, Ok(())).await.unwrap();
        assert!(store.root().join(path.as_str()).exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_allocations_are_distinct() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(BlobStore::new(temp.path()).unwrap());

        let tasks: Vec<_> = (0..10_000)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    let path = store.allocate_path().await.unwrap();
                    store.put(&path, &(i as u32).to_le_bytes()).await.unwrap();
                    path
                })
            })
            .collect();

        let paths: Vec<BlobPath> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        let unique: HashSet<&BlobPath> = paths.iter().collect();
        assert_eq!(unique.len(), 10_000);

        for path in &paths {
            let mut content = Vec::new();
            store.get(path).await.unwrap().read_to_end(&mut content).await.unwrap();
            assert_eq!(content.len(), 4);
        }
    }
}
