// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Router record repository (the authoritative store).
//!
//! ```text
//! /data/routers/{router_name}.json
//! ```

use super::super::{FileStore, StorageError, StorageResult};
use crate::models::Router;

/// Repository for authoritative router records.
pub struct RouterRepository<'a> {
    storage: &'a FileStore,
}

impl<'a> RouterRepository<'a> {
    /// Create a new RouterRepository.
    pub fn new(storage: &'a FileStore) -> Self {
        Self { storage }
    }

    /// Check if a router record exists.
    pub fn exists(&self, router_name: &str) -> bool {
        self.storage
            .exists(self.storage.paths().router_record(router_name))
    }

    /// Get a router by name.
    pub fn get(&self, router_name: &str) -> StorageResult<Router> {
        let path = self.storage.paths().router_record(router_name);
        if !self.storage.exists(&path) {
            return Err(StorageError::NotFound(format!("Router {router_name}")));
        }
        self.storage.read_json(path)
    }

    /// Create a new router record.
    pub fn create(&self, router: &Router) -> StorageResult<()> {
        if self.exists(&router.name) {
            return Err(StorageError::AlreadyExists(format!("Router {}", router.name)));
        }
        self.storage
            .write_json(self.storage.paths().router_record(&router.name), router)
    }

    /// Overwrite an existing router record.
    pub fn save(&self, router: &Router) -> StorageResult<()> {
        if !self.exists(&router.name) {
            return Err(StorageError::NotFound(format!("Router {}", router.name)));
        }
        self.storage
            .write_json(self.storage.paths().router_record(&router.name), router)
    }

    /// Remove a router record.
    pub fn delete(&self, router_name: &str) -> StorageResult<()> {
        if !self.exists(router_name) {
            return Err(StorageError::NotFound(format!("Router {router_name}")));
        }
        self.storage
            .delete(self.storage.paths().router_record(router_name))
    }

    /// List routers owned by `owner`.
    pub fn list_by_owner(&self, owner: &str) -> StorageResult<Vec<Router>> {
        let names = self
            .storage
            .list_files(self.storage.paths().routers_dir(), "json")?;

        let mut routers = Vec::new();
        for name in names {
            match self.get(&name) {
                Ok(router) if router.owner == owner => routers.push(router),
                Ok(_) => {}
                Err(e) => tracing::warn!(router = %name, error = %e, "Skipping unreadable router record"),
            }
        }
        Ok(routers)
    }
}
