// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Published snapshot repository.
//!
//! ```text
//! {datasites}/{owner}/public/routers/{router_name}/metadata.json
//! ```
//!
//! Only the lifecycle commit path writes here. The snapshot is for outside
//! readers; nothing in this crate reads it to authorize anything.

use super::super::{FileStore, StorageError, StorageResult};
use crate::models::PublishedSnapshot;

/// Repository for publicly readable router snapshots.
pub struct SnapshotRepository<'a> {
    storage: &'a FileStore,
}

impl<'a> SnapshotRepository<'a> {
    pub fn new(storage: &'a FileStore) -> Self {
        Self { storage }
    }

    /// Write (or overwrite) a snapshot.
    pub fn write(&self, snapshot: &PublishedSnapshot) -> StorageResult<()> {
        let path = self
            .storage
            .paths()
            .snapshot(&snapshot.author, &snapshot.project_name);
        self.storage.write_json(path, snapshot)
    }

    /// Read a snapshot as an outside party would.
    pub fn read(&self, owner: &str, router_name: &str) -> StorageResult<PublishedSnapshot> {
        self.storage
            .read_json(self.storage.paths().snapshot(owner, router_name))
    }

    /// Remove a router's snapshot. Missing snapshots are not an error.
    pub fn remove(&self, owner: &str, router_name: &str) -> StorageResult<()> {
        match self
            .storage
            .delete(self.storage.paths().snapshot(owner, router_name))
        {
            Ok(()) | Err(StorageError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Router, RouterMetadata, RouterStatus, Service, ServiceKind};
    use crate::storage::StoragePaths;
    use chrono::Utc;
    use tempfile::TempDir;

    fn snapshot() -> PublishedSnapshot {
        let mut router = Router::draft("r1", "alice@x", vec![Service::new(ServiceKind::Chat, 1.5)]);
        router.status = RouterStatus::Published;
        router.metadata = Some(RouterMetadata {
            code_hash: "h".to_string(),
            publish_date: Utc::now(),
            ..Default::default()
        });
        PublishedSnapshot::from_router(&router).unwrap()
    }

    #[test]
    fn write_read_remove() {
        let temp = TempDir::new().unwrap();
        let mut storage = FileStore::new(StoragePaths::new(temp.path()));
        storage.initialize().unwrap();
        let repo = SnapshotRepository::new(&storage);

        let snap = snapshot();
        repo.write(&snap).unwrap();
        assert_eq!(repo.read("alice@x", "r1").unwrap(), snap);

        repo.remove("alice@x", "r1").unwrap();
        assert!(matches!(repo.read("alice@x", "r1"), Err(StorageError::NotFound(_))));

        // Removing twice is fine.
        repo.remove("alice@x", "r1").unwrap();
    }
}
