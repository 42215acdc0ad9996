// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path constants and utilities for the storage layout.
//!
//! Two trees are involved:
//!
//! - the **data root** holds the authoritative state that only this server
//!   writes (router records, audit logs, the capability secret);
//! - the **datasites root** is the shared tree other parties read from
//!   (published snapshots, delegate opt-in markers, token artifacts).

use std::path::{Path, PathBuf};

/// Default base directory for authoritative storage.
pub const DATA_ROOT: &str = "/data";

/// File name of a router's published snapshot.
pub const SNAPSHOT_FILE: &str = "metadata.json";

/// File name of the delegate opt-in marker in a datasite.
pub const DELEGATE_MARKER_FILE: &str = "router_delegate.json";

/// File name of a distributed capability token.
pub const ACCESS_TOKEN_FILE: &str = "access_token";

/// File name of the read-permission file guarding a token artifact.
pub const PERMISSIONS_FILE: &str = "permissions.json";

/// Storage path utilities.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
    datasites: PathBuf,
    projects: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DATA_ROOT)
    }
}

impl StoragePaths {
    /// Create paths rooted at `root`, with datasites and projects nested
    /// beneath it (useful for testing).
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            datasites: root.join("datasites"),
            projects: root.join("projects"),
            root,
        }
    }

    /// Override the shared datasites root.
    pub fn with_datasites(mut self, datasites: impl AsRef<Path>) -> Self {
        self.datasites = datasites.as_ref().to_path_buf();
        self
    }

    /// Override the router projects root.
    pub fn with_projects(mut self, projects: impl AsRef<Path>) -> Self {
        self.projects = projects.as_ref().to_path_buf();
        self
    }

    /// Root directory for authoritative data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Root of the shared datasites tree.
    pub fn datasites_root(&self) -> &Path {
        &self.datasites
    }

    // ========== Router Records ==========

    /// Directory containing all router records.
    pub fn routers_dir(&self) -> PathBuf {
        self.root.join("routers")
    }

    /// Path to a router's authoritative record.
    pub fn router_record(&self, router_name: &str) -> PathBuf {
        self.routers_dir().join(format!("{router_name}.json"))
    }

    // ========== Projects ==========

    /// Directory containing generated router projects.
    pub fn projects_dir(&self) -> &Path {
        &self.projects
    }

    /// On-disk project artifact for a router.
    pub fn project_dir(&self, router_name: &str) -> PathBuf {
        self.projects.join(router_name)
    }

    // ========== Audit Log ==========

    /// Directory containing audit logs.
    pub fn audit_dir(&self) -> PathBuf {
        self.root.join("audit")
    }

    /// Append-only delegate control log for a router (JSONL).
    pub fn control_audit_file(&self, router_name: &str) -> PathBuf {
        self.audit_dir().join(router_name).join("control.jsonl")
    }

    // ========== Secrets ==========

    /// Directory for process secrets.
    pub fn secrets_dir(&self) -> PathBuf {
        self.root.join("secrets")
    }

    /// Persisted capability token secret.
    pub fn control_token_key(&self) -> PathBuf {
        self.secrets_dir().join("control_token.key")
    }

    // ========== Datasites ==========

    /// A party's datasite directory.
    pub fn datasite(&self, email: &str) -> PathBuf {
        self.datasites.join(email)
    }

    /// Public area of a datasite.
    pub fn public_dir(&self, email: &str) -> PathBuf {
        self.datasite(email).join("public")
    }

    /// Delegate opt-in marker for an identity.
    pub fn delegate_marker(&self, email: &str) -> PathBuf {
        self.public_dir(email).join(DELEGATE_MARKER_FILE)
    }

    /// Published namespace of a router.
    pub fn published_router_dir(&self, owner: &str, router_name: &str) -> PathBuf {
        self.public_dir(owner).join("routers").join(router_name)
    }

    /// Publicly readable snapshot of a router's metadata.
    pub fn snapshot(&self, owner: &str, router_name: &str) -> PathBuf {
        self.published_router_dir(owner, router_name)
            .join(SNAPSHOT_FILE)
    }

    /// Directory holding a router's delegate token artifact.
    pub fn delegate_dir(&self, owner: &str, router_name: &str) -> PathBuf {
        self.published_router_dir(owner, router_name)
            .join("delegate")
    }

    /// Distributed capability token.
    pub fn access_token(&self, owner: &str, router_name: &str) -> PathBuf {
        self.delegate_dir(owner, router_name).join(ACCESS_TOKEN_FILE)
    }

    /// Permission file scoping the token to its delegate.
    pub fn access_permissions(&self, owner: &str, router_name: &str) -> PathBuf {
        self.delegate_dir(owner, router_name).join(PERMISSIONS_FILE)
    }
}
