// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed access to storage.
//!
//! Each repository borrows the [`FileStore`](super::FileStore) and owns the
//! path conventions for one kind of entity.

pub mod delegates;
pub mod routers;
pub mod snapshots;
pub mod tokens;

pub use delegates::{DelegateDirectory, DelegateMarker};
pub use routers::RouterRepository;
pub use snapshots::SnapshotRepository;
pub use tokens::{AccessPermissions, TokenArtifactRepository};
