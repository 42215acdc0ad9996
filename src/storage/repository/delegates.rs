// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Delegate directory.
//!
//! An identity opts in as a delegate by publishing a marker in the public
//! area of its datasite:
//!
//! ```text
//! {datasites}/{email}/public/router_delegate.json
//! ```
//!
//! A marker only counts when the email inside it matches the datasite it
//! lives in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::{FileStore, StorageError, StorageResult};
use crate::models::ControlAction;

/// Public opt-in marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DelegateMarker {
    pub email: String,
    pub enrolled_at: DateTime<Utc>,
    /// Actions the delegate is willing to perform.
    pub control_types: Vec<ControlAction>,
}

/// Lookup and maintenance of delegate opt-in markers.
pub struct DelegateDirectory<'a> {
    storage: &'a FileStore,
}

impl<'a> DelegateDirectory<'a> {
    pub fn new(storage: &'a FileStore) -> Self {
        Self { storage }
    }

    /// Publish the opt-in marker for `email`.
    pub fn enroll(&self, email: &str) -> StorageResult<DelegateMarker> {
        let marker = DelegateMarker {
            email: email.to_string(),
            enrolled_at: Utc::now(),
            control_types: vec![ControlAction::UpdatePricing],
        };
        self.storage
            .write_json(self.storage.paths().delegate_marker(email), &marker)?;
        Ok(marker)
    }

    /// Remove the opt-in marker for `email`.
    pub fn withdraw(&self, email: &str) -> StorageResult<()> {
        self.storage
            .delete(self.storage.paths().delegate_marker(email))
    }

    /// Read a valid marker for `email`.
    pub fn marker(&self, email: &str) -> StorageResult<DelegateMarker> {
        let marker: DelegateMarker = self
            .storage
            .read_json(self.storage.paths().delegate_marker(email))?;
        if marker.email != email {
            return Err(StorageError::NotFound(format!("Delegate marker for {email}")));
        }
        Ok(marker)
    }

    /// Whether `email` has opted in.
    pub fn is_enrolled(&self, email: &str) -> bool {
        self.marker(email).is_ok()
    }

    /// Identities with a valid marker, excluding `caller`.
    pub fn list_available(&self, caller: &str) -> StorageResult<Vec<String>> {
        let datasites = self
            .storage
            .list_dirs(self.storage.paths().datasites_root())?;

        Ok(datasites
            .into_iter()
            .filter(|email| email != caller)
            .filter(|email| self.is_enrolled(email))
            .collect())
    }
}
