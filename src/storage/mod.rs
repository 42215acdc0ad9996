// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Persistent state of the control plane, kept as plain files.
//!
//! ## Storage Layout
//!
//! ```text
//! /data/                          # authoritative, server-private
//!   routers/{router}.json         # router records
//!   audit/{router}/control.jsonl  # delegate control audit log
//!   secrets/control_token.key     # capability token secret
//!   projects/{router}/            # generated router projects
//!
//! {datasites}/                    # shared, read by other parties
//!   {owner}/public/routers/{router}/
//!     metadata.json               # published snapshot
//!     delegate/access_token       # capability token
//!     delegate/permissions.json   # read grant for the delegate only
//!   {email}/public/router_delegate.json   # delegate opt-in marker
//! ```

pub mod audit;
pub mod file_store;
pub mod ownership;
pub mod paths;
pub mod repository;

pub use audit::{AuditLog, AuditRecord};
pub use file_store::{FileStore, StorageError, StorageResult};
pub use ownership::{OwnedResource, OwnershipEnforcer};
pub use paths::StoragePaths;
pub use repository::{
    AccessPermissions, DelegateDirectory, DelegateMarker, RouterRepository, SnapshotRepository,
    TokenArtifactRepository,
};
