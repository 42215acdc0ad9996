// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Append-only audit log of delegate control actions.
//!
//! One JSONL file per router. Records are only ever appended; nothing in
//! the crate rewrites or truncates an audit file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{FileStore, StorageError, StorageResult};
use crate::models::ControlAction;

/// One accepted delegate control action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AuditRecord {
    /// Unique record ID.
    pub event_id: String,
    /// Router the action was applied to.
    pub router_name: String,
    /// Delegate who performed the action.
    pub delegate_email: String,
    /// Action performed.
    pub control_type: ControlAction,
    /// Mutation payload as submitted.
    #[schema(value_type = Object)]
    pub control_data: serde_json::Value,
    /// Optional human-readable reason supplied by the delegate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// When the action was applied.
    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    /// Create a new record stamped now.
    pub fn new(
        router_name: impl Into<String>,
        delegate_email: impl Into<String>,
        control_type: ControlAction,
        control_data: serde_json::Value,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            router_name: router_name.into(),
            delegate_email: delegate_email.into(),
            control_type,
            control_data,
            reason: None,
            timestamp: Utc::now(),
        }
    }

    /// Attach the delegate's reason.
    pub fn with_reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason.filter(|r| !r.trim().is_empty());
        self
    }
}

/// Repository for the delegate control audit log.
pub struct AuditLog<'a> {
    storage: &'a FileStore,
}

impl<'a> AuditLog<'a> {
    /// Create a new audit log view.
    pub fn new(storage: &'a FileStore) -> Self {
        Self { storage }
    }

    /// Append a record to the router's log.
    pub fn append(&self, record: &AuditRecord) -> StorageResult<()> {
        let path = self
            .storage
            .paths()
            .control_audit_file(&record.router_name);
        let line = serde_json::to_string(record)?;
        self.storage.append_line(path, &line)
    }

    /// All records for a router, oldest first. Empty if none were written.
    pub fn list(&self, router_name: &str) -> StorageResult<Vec<AuditRecord>> {
        let path = self.storage.paths().control_audit_file(router_name);
        let content = match self.storage.read_raw(&path) {
            Ok(content) => content,
            Err(StorageError::NotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let content = String::from_utf8(content).map_err(|e| {
            StorageError::SerializationError(format!("Invalid UTF-8 in audit log: {e}"))
        })?;

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(StorageError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoragePaths;
    use serde_json::json;
    use tempfile::TempDir;

    fn setup() -> (TempDir, FileStore) {
        let temp = TempDir::new().unwrap();
        let mut storage = FileStore::new(StoragePaths::new(temp.path()));
        storage.initialize().unwrap();
        (temp, storage)
    }

    #[test]
    fn reason_blank_is_dropped() {
        let record = AuditRecord::new("r1", "bob@x", ControlAction::UpdatePricing, json!({}))
            .with_reason(Some("   ".to_string()));
        assert!(record.reason.is_none());
    }

    #[test]
    fn append_and_list_in_order() {
        let (_temp, storage) = setup();
        let log = AuditLog::new(&storage);

        let first = AuditRecord::new("r1", "bob@x", ControlAction::UpdatePricing, json!({"chat": 0.5}))
            .with_reason(Some("promo".to_string()));
        let second = AuditRecord::new("r1", "bob@x", ControlAction::UpdatePricing, json!({"chat": 1.0}));
        log.append(&first).unwrap();
        log.append(&second).unwrap();

        let records = log.list("r1").unwrap();
        assert_eq!(records, vec![first, second]);
    }

    #[test]
    fn logs_are_per_router() {
        let (_temp, storage) = setup();
        let log = AuditLog::new(&storage);

        log.append(&AuditRecord::new("r1", "bob@x", ControlAction::UpdatePricing, json!({})))
            .unwrap();

        assert_eq!(log.list("r1").unwrap().len(), 1);
        assert!(log.list("r2").unwrap().is_empty());
    }
}
