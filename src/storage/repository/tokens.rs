// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Distribution of capability tokens to delegates.
//!
//! ```text
//! {datasites}/{owner}/public/routers/{router}/delegate/
//!   access_token       # signed capability token
//!   permissions.json   # terminal read grant for the delegate only
//! ```
//!
//! The permission file is terminal: rules from parent directories (the
//! public area) do not apply below it.

use serde::{Deserialize, Serialize};

use super::super::{FileStore, StorageError, StorageResult};

/// One access rule in a permission file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRule {
    pub pattern: String,
    pub read: Vec<String>,
}

/// Read-permission file guarding a token artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPermissions {
    /// When set, permissions from parent directories are not inherited.
    pub terminal: bool,
    pub rules: Vec<AccessRule>,
}

impl AccessPermissions {
    /// Terminal grant letting only `reader` read everything in the directory.
    pub fn only(reader: &str) -> Self {
        Self {
            terminal: true,
            rules: vec![AccessRule {
                pattern: "**".to_string(),
                read: vec![reader.to_string()],
            }],
        }
    }

    pub fn can_read(&self, identity: &str) -> bool {
        self.rules
            .iter()
            .any(|rule| rule.read.iter().any(|r| r == identity))
    }
}

/// Repository for delegate token artifacts.
pub struct TokenArtifactRepository<'a> {
    storage: &'a FileStore,
}

impl<'a> TokenArtifactRepository<'a> {
    pub fn new(storage: &'a FileStore) -> Self {
        Self { storage }
    }

    /// Write the token and its permission file. The permission file goes
    /// first so the token is never readable without its grant.
    pub fn store(
        &self,
        owner: &str,
        router_name: &str,
        delegate: &str,
        token: &str,
    ) -> StorageResult<()> {
        let paths = self.storage.paths();
        self.storage.write_json(
            paths.access_permissions(owner, router_name),
            &AccessPermissions::only(delegate),
        )?;
        self.storage
            .write_raw(paths.access_token(owner, router_name), token.as_bytes())
    }

    /// Read the token on behalf of `reader`.
    ///
    /// Fails with `PermissionDenied` unless the permission file names the
    /// reader, and with `NotFound` when no artifact exists.
    pub fn read_for(&self, owner: &str, router_name: &str, reader: &str) -> StorageResult<String> {
        let paths = self.storage.paths();
        let permissions: AccessPermissions = self
            .storage
            .read_json(paths.access_permissions(owner, router_name))?;

        if !permissions.terminal || !permissions.can_read(reader) {
            return Err(StorageError::PermissionDenied {
                user_id: reader.to_string(),
                resource: format!("{router_name} access token"),
            });
        }

        let raw = self
            .storage
            .read_raw(paths.access_token(owner, router_name))?;
        String::from_utf8(raw)
            .map(|token| token.trim().to_string())
            .map_err(|e| StorageError::SerializationError(format!("Invalid token encoding: {e}")))
    }

    /// Delete the artifact directory. Missing artifacts are not an error.
    pub fn remove(&self, owner: &str, router_name: &str) -> StorageResult<()> {
        let dir = self.storage.paths().delegate_dir(owner, router_name);
        if !dir.exists() {
            return Ok(());
        }
        match self.storage.delete_dir(dir) {
            Ok(()) | Err(StorageError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
