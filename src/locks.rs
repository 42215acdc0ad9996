// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-router mutual exclusion.
//!
//! Grant, revoke, control actions and lifecycle transitions on one router
//! run one at a time. The [`RouterLease`] returned by [`RouterLocks::acquire`]
//! is also the proof the snapshot commit path asks for, so a record and its
//! snapshot are always written under the same lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of per-router async locks.
#[derive(Debug, Default)]
pub struct RouterLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Exclusive hold on one router, released on drop.
#[derive(Debug)]
pub struct RouterLease {
    router_name: String,
    _guard: OwnedMutexGuard<()>,
}

impl RouterLease {
    pub fn router_name(&self) -> &str {
        &self.router_name
    }
}

impl RouterLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `router_name`.
    pub async fn acquire(&self, router_name: &str) -> RouterLease {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            // Drop entries nobody holds or waits on.
            locks.retain(|name, lock| name == router_name || Arc::strong_count(lock) > 1);
            locks
                .entry(router_name.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        RouterLease {
            router_name: router_name.to_string(),
            _guard: lock.lock_owned().await,
        }
    }

    /// Number of routers with a live lock entry.
    pub fn tracked(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
