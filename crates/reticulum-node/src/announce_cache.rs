//! On-disk mirror of the engine's announce cache.
//!
//! The engine keeps the raw announces that back its paths in memory and
//! reports changes as `CachePacket` / `CacheEvicted` actions. This cache
//! mirrors them to `{dir}/{hex(packet_hash)}` so the packets are there to
//! answer path requests after a restart.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use bytes::Bytes;

use reticulum_core::types::PacketHash;

use crate::storage::atomic_write;

/// A directory of cached announce packets.
#[derive(Debug)]
pub struct AnnounceCache {
    dir: PathBuf,
}

impl AnnounceCache {
    /// Open the cache, creating the directory if needed.
    ///
    /// # Note
    /// This performs blocking I/O (`create_dir_all`).
    pub fn new(dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, packet_hash: &PacketHash) -> PathBuf {
        self.dir.join(hex::encode(packet_hash.as_ref()))
    }

    /// Write one announce.
    pub async fn store(&self, packet_hash: &PacketHash, raw: &[u8]) -> Result<(), std::io::Error> {
        atomic_write(&self.path_for(packet_hash), raw).await
    }

    /// Delete one announce. Returns whether a file was removed.
    pub async fn remove(&self, packet_hash: &PacketHash) -> Result<bool, std::io::Error> {
        match tokio::fs::remove_file(self.path_for(packet_hash)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Read every cached announce. Files whose name is not a packet hash,
    /// and empty files, are skipped.
    pub async fn load_all(&self) -> Result<Vec<(PacketHash, Bytes)>, std::io::Error> {
        let mut loaded = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(packet_hash) = packet_hash_from_name(&path) else {
                continue;
            };
            match tokio::fs::read(&path).await {
                Ok(raw) if !raw.is_empty() => loaded.push((packet_hash, Bytes::from(raw))),
                Ok(_) => continue,
                Err(e) => {
                    tracing::debug!(path = %path.display(), %e, "unreadable cached announce");
                }
            }
        }

        Ok(loaded)
    }

    /// Delete cached announces not in `keep`. Returns how many were removed.
    pub async fn retain(&self, keep: &HashSet<PacketHash>) -> Result<usize, std::io::Error> {
        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if let Some(packet_hash) = packet_hash_from_name(&path)
                && !keep.contains(&packet_hash)
            {
                tokio::fs::remove_file(&path).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn packet_hash_from_name(path: &Path) -> Option<PacketHash> {
    let name = path.file_name()?.to_str()?;
    let bytes = hex::decode(name).ok()?;
    PacketHash::try_from(bytes.as_slice()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_hash(seed: u8) -> PacketHash {
        PacketHash::new([seed; 32])
    }

    fn open() -> (tempfile::TempDir, AnnounceCache) {
        let dir = tempfile::tempdir().unwrap();
        let cache = AnnounceCache::new(dir.path().join("announces")).unwrap();
        (dir, cache)
    }

    #[tokio::test]
    async fn store_and_load_roundtrip() {
        let (_dir, cache) = open();
        cache.store(&make_hash(0xAA), &[0x10, 0x20, 0x30]).await.unwrap();
        cache.store(&make_hash(0xBB), &[0x40, 0x50]).await.unwrap();

        let mut loaded = cache.load_all().await.unwrap();
        loaded.sort_by_key(|(hash, _)| *hash);
        assert_eq!(
            loaded,
            vec![
                (make_hash(0xAA), Bytes::from_static(&[0x10, 0x20, 0x30])),
                (make_hash(0xBB), Bytes::from_static(&[0x40, 0x50])),
            ]
        );
    }

    #[tokio::test]
    async fn files_are_named_by_hex_hash() {
        let (_dir, cache) = open();
        cache.store(&make_hash(0x0F), b"x").await.unwrap();
        assert!(cache.dir().join("0f".repeat(32)).exists());
    }

    #[tokio::test]
    async fn remove_reports_whether_file_existed() {
        let (_dir, cache) = open();
        cache.store(&make_hash(1), b"announce").await.unwrap();
        assert!(cache.remove(&make_hash(1)).await.unwrap());
        assert!(!cache.remove(&make_hash(1)).await.unwrap());
        assert!(cache.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn foreign_and_empty_files_are_skipped() {
        let (_dir, cache) = open();
        std::fs::write(cache.dir().join("notes.txt"), b"hello").unwrap();
        std::fs::write(cache.dir().join("abcd"), b"short hash").unwrap();
        std::fs::write(cache.dir().join(hex::encode([2u8; 32])), b"").unwrap();
        cache.store(&make_hash(3), b"kept").await.unwrap();

        let loaded = cache.load_all().await.unwrap();
        assert_eq!(loaded, vec![(make_hash(3), Bytes::from_static(b"kept"))]);
    }

    #[tokio::test]
    async fn retain_removes_unreferenced_announces() {
        let (_dir, cache) = open();
        cache.store(&make_hash(1), &[0x01]).await.unwrap();
        cache.store(&make_hash(2), &[0x02]).await.unwrap();
        std::fs::write(cache.dir().join("README"), b"left alone").unwrap();

        let keep: HashSet<_> = [make_hash(1)].into_iter().collect();
        assert_eq!(cache.retain(&keep).await.unwrap(), 1);

        let loaded = cache.load_all().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].0, make_hash(1));
        assert!(cache.dir().join("README").exists());
    }
}
