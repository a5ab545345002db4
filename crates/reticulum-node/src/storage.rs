//! State persistence for Reticulum nodes.
//!
//! Persists the path table, packet hashlist, tunnel table and known
//! identities across restarts, one file per table. Uses atomic writes
//! (write to `.tmp`, then rename) to prevent corruption, and remembers the
//! checksum of the last write of each table so unchanged tables are not
//! rewritten.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::fs;

use reticulum_transport::engine::persist::TransportSnapshot;

use crate::storage_codec::{self, StorageCodecError, Table};

/// Errors from storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{table:?} table: {source}")]
    Codec {
        table: Table,
        #[source]
        source: StorageCodecError,
    },
}

/// Persistent storage for node state.
#[derive(Debug)]
pub struct Storage {
    base_dir: PathBuf,
    checksums: HashMap<Table, [u8; 32]>,
}

impl Storage {
    /// Create a new storage instance, creating the directory if needed.
    ///
    /// # Note
    /// This performs blocking I/O (`create_dir_all`). Call at startup before the async runtime is under load.
    pub fn new(base_dir: PathBuf) -> Result<Self, StorageError> {
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self {
            base_dir,
            checksums: HashMap::new(),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Write one table unless its bytes match the last write. Returns
    /// whether the file was written.
    pub async fn save_table(&mut self, table: Table, bytes: &[u8]) -> Result<bool, StorageError> {
        let checksum = storage_codec::checksum(bytes);
        if self.checksums.get(&table) == Some(&checksum) {
            tracing::trace!(table = table.file_name(), "table unchanged, skipping write");
            return Ok(false);
        }
        atomic_write(&self.base_dir.join(table.file_name()), bytes).await?;
        self.checksums.insert(table, checksum);
        Ok(true)
    }

    /// Save every table of `snapshot`. Returns the number of tables written.
    pub async fn save_snapshot(&mut self, snapshot: &TransportSnapshot) -> Result<usize, StorageError> {
        let mut written = 0;
        for table in Table::ALL {
            let bytes = storage_codec::encode_table(table, snapshot)
                .map_err(|source| StorageError::Codec { table, source })?;
            if self.save_table(table, &bytes).await? {
                written += 1;
            }
        }
        tracing::debug!(written, "persisted transport state");
        Ok(written)
    }

    /// Load every table. Missing files leave their table empty; a table
    /// that fails to decode is an error.
    pub async fn load_snapshot(&mut self) -> Result<TransportSnapshot, StorageError> {
        let mut snapshot = TransportSnapshot::default();
        for table in Table::ALL {
            let path = self.base_dir.join(table.file_name());
            match fs::read(&path).await {
                Ok(bytes) => {
                    storage_codec::decode_table(table, &bytes, &mut snapshot)
                        .map_err(|source| StorageError::Codec { table, source })?;
                    self.checksums.insert(table, storage_codec::checksum(&bytes));
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(StorageError::Io(e)),
            }
        }
        Ok(snapshot)
    }
}

/// Write data atomically: write to a `.tmp` file then rename.
pub(crate) async fn atomic_write(path: &Path, data: &[u8]) -> Result<(), std::io::Error> {
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, data).await?;
    fs::rename(&tmp_path, path).await?;
    Ok(())
}
