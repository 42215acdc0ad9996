// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Router lifecycle state machine.
//!
//! ```text
//! Draft ──publish──▶ Published ──unpublish──▶ Unpublished
//!                        ▲                          │
//!                        └──────────publish─────────┘
//! ```
//!
//! `Delegated` is an orthogonal flag that only exists while Published, and
//! it blocks unpublish and delete.
//!
//! [`Lifecycle::commit`] is the only writer of published snapshots. It
//! writes the authoritative record first and the snapshot second, and it
//! requires the router's [`RouterLease`] so both writes happen under the
//! same per-router lock. When the snapshot write fails after the record was
//! written, the record is flagged `needs_reconciliation` and the caller gets
//! [`ControlError::SnapshotDiverged`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::auth::AuthenticatedUser;
use crate::error::ControlError;
use crate::locks::{RouterLease, RouterLocks};
use crate::models::{
    is_valid_price, is_valid_router_name, PublishRouterRequest, PublishedSnapshot, Router,
    RouterMetadata, RouterStatus, Service,
};
use crate::storage::{
    FileStore, OwnershipEnforcer, RouterRepository, SnapshotRepository, StorageError,
    TokenArtifactRepository,
};

/// Lifecycle operations over the authoritative store.
pub struct Lifecycle<'a> {
    storage: &'a FileStore,
    locks: &'a RouterLocks,
}

impl<'a> Lifecycle<'a> {
    pub fn new(storage: &'a FileStore, locks: &'a RouterLocks) -> Self {
        Self { storage, locks }
    }

    /// Load a router record, mapping absence to `NotFound`.
    ///
    /// Names that are not valid router names never reach the filesystem, so
    /// a record is only reachable under the name its lock is keyed on.
    pub fn load(&self, router_name: &str) -> Result<Router, ControlError> {
        if !is_valid_router_name(router_name) {
            return Err(ControlError::NotFound(format!("Router {router_name}")));
        }
        match RouterRepository::new(self.storage).get(router_name) {
            Ok(router) => Ok(router),
            Err(StorageError::NotFound(_)) => Err(ControlError::NotFound(format!("Router {router_name}"))),
            Err(e) => Err(e.into()),
        }
    }

    /// Load a router the caller owns.
    pub fn load_owned(&self, router_name: &str, caller: &AuthenticatedUser) -> Result<Router, ControlError> {
        let router = self.load(router_name)?;
        router
            .verify_ownership(caller)
            .map_err(|_| ControlError::NotOwner)?;
        Ok(router)
    }

    /// Write `router` and its derived snapshot under `lease`.
    pub fn commit(&self, lease: &RouterLease, router: &mut Router) -> Result<(), ControlError> {
        if lease.router_name() != router.name {
            return Err(ControlError::InvalidRequest(format!(
                "lease for {} cannot commit router {}",
                lease.router_name(),
                router.name
            )));
        }

        let records = RouterRepository::new(self.storage);
        router.needs_reconciliation = false;
        router.touch();
        records.save(router)?;

        let snapshots = SnapshotRepository::new(self.storage);
        let written = match PublishedSnapshot::from_router(router) {
            Some(snapshot) => snapshots.write(&snapshot),
            None => snapshots.remove(&router.owner, &router.name),
        };

        if let Err(e) = written {
            router.needs_reconciliation = true;
            if let Err(flag_err) = records.save(router) {
                tracing::error!(
                    router = %router.name,
                    error = %flag_err,
                    "Failed to flag router for reconciliation"
                );
            }
            tracing::error!(
                router = %router.name,
                error = %e,
                "Snapshot write failed after record write; router needs reconciliation"
            );
            return Err(ControlError::SnapshotDiverged {
                router: router.name.clone(),
                detail: e.to_string(),
            });
        }

        Ok(())
    }

    /// Create a Draft router owned by `server_owner`. Only that identity
    /// may create routers on this server.
    pub async fn create_router(
        &self,
        caller: &AuthenticatedUser,
        server_owner: &str,
        name: &str,
        services: Vec<Service>,
    ) -> Result<Router, ControlError> {
        if !caller.is(server_owner) {
            return Err(ControlError::NotOwner);
        }
        if !is_valid_router_name(name) {
            return Err(ControlError::InvalidRequest(format!(
                "router name '{name}' must be non-empty and use only letters, digits, '-' or '_'"
            )));
        }
        validate_services(&services)?;

        let _lease = self.locks.acquire(name).await;
        let router = Router::draft(name, caller.user_id.clone(), services);
        match RouterRepository::new(self.storage).create(&router) {
            Ok(()) => {}
            Err(StorageError::AlreadyExists(_)) => {
                return Err(ControlError::AlreadyExists(format!("Router {name}")))
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(router = %name, owner = %router.owner, "Router created");
        Ok(router)
    }

    pub fn get_router(&self, router_name: &str, caller: &AuthenticatedUser) -> Result<Router, ControlError> {
        self.load_owned(router_name, caller)
    }

    pub fn list_routers(&self, caller: &AuthenticatedUser) -> Result<Vec<Router>, ControlError> {
        Ok(RouterRepository::new(self.storage).list_by_owner(&caller.user_id)?)
    }

    /// Draft/Unpublished → Published.
    pub async fn publish(
        &self,
        router_name: &str,
        caller: &AuthenticatedUser,
        request: PublishRouterRequest,
    ) -> Result<Router, ControlError> {
        let lease = self.locks.acquire(router_name).await;
        let mut router = self.load_owned(router_name, caller)?;

        if router.is_published() {
            return Err(ControlError::AlreadyPublished(router.name));
        }

        let project_dir = self.storage.paths().project_dir(router_name);
        if !project_dir.is_dir() {
            return Err(ControlError::ProjectMissing(router.name));
        }
        let code_hash = project_code_hash(&project_dir).map_err(StorageError::from)?;

        router.status = RouterStatus::Published;
        router.metadata = Some(RouterMetadata {
            summary: request.summary,
            description: request.description,
            tags: request.tags,
            code_hash,
            publish_date: Utc::now(),
            delegate_email: None,
            delegate_control_types: Vec::new(),
        });
        self.commit(&lease, &mut router)?;

        tracing::info!(router = %router.name, "Router published");
        Ok(router)
    }

    /// Published → Unpublished. A delegated router must be revoked first.
    pub async fn unpublish(&self, router_name: &str, caller: &AuthenticatedUser) -> Result<Router, ControlError> {
        let lease = self.locks.acquire(router_name).await;
        let mut router = self.load_owned(router_name, caller)?;

        if !router.is_published() {
            return Err(ControlError::NotPublished(router.name));
        }
        if router.is_delegated() {
            return Err(ControlError::StillDelegated(router.name));
        }

        router.status = RouterStatus::Unpublished;
        self.commit(&lease, &mut router)?;

        tracing::info!(router = %router.name, "Router unpublished");
        Ok(router)
    }

    /// Remove a router. A published router is unpublished first so its
    /// snapshot goes away; a delegated one must be revoked first.
    pub async fn delete(&self, router_name: &str, caller: &AuthenticatedUser) -> Result<Router, ControlError> {
        let lease = self.locks.acquire(router_name).await;
        let mut router = self.load_owned(router_name, caller)?;

        if router.is_delegated() {
            return Err(ControlError::StillDelegated(router.name));
        }

        if router.is_published() {
            router.status = RouterStatus::Unpublished;
            self.commit(&lease, &mut router)?;
        } else {
            SnapshotRepository::new(self.storage).remove(&router.owner, &router.name)?;
        }

        if let Err(e) = TokenArtifactRepository::new(self.storage).remove(&router.owner, &router.name) {
            tracing::warn!(router = %router.name, error = %e, "Failed to remove stale token artifact");
        }

        RouterRepository::new(self.storage).delete(&router.name)?;
        tracing::info!(router = %router.name, "Router deleted");
        Ok(router)
    }

    /// Re-derive the snapshot from the record and clear the reconciliation
    /// flag. A token artifact left behind by an undelegated router is
    /// removed.
    pub async fn reconcile(&self, router_name: &str, caller: &AuthenticatedUser) -> Result<Router, ControlError> {
        let lease = self.locks.acquire(router_name).await;
        let mut router = self.load_owned(router_name, caller)?;
        let was_flagged = router.needs_reconciliation;

        self.commit(&lease, &mut router)?;

        if !router.is_delegated() {
            TokenArtifactRepository::new(self.storage).remove(&router.owner, &router.name)?;
        }

        tracing::info!(router = %router.name, was_flagged, "Router reconciled");
        Ok(router)
    }
}

/// Service lists hold each kind at most once, with valid prices.
pub fn validate_services(services: &[Service]) -> Result<(), ControlError> {
    for (i, service) in services.iter().enumerate() {
        if !is_valid_price(service.pricing) {
            return Err(ControlError::InvalidRequest(format!(
                "{} pricing must be a non-negative number",
                service.kind
            )));
        }
        if services[..i].iter().any(|s| s.kind == service.kind) {
            return Err(ControlError::InvalidRequest(format!(
                "service {} listed twice",
                service.kind
            )));
        }
    }
    Ok(())
}

/// SHA-256 over the project's files in path order. Hidden entries are
/// skipped.
pub fn project_code_hash(dir: &Path) -> io::Result<String> {
    let mut files = Vec::new();
    collect_files(dir, &mut files)?;
    files.sort();

    let mut hasher = Sha256::new();
    for path in files {
        let relative = path.strip_prefix(dir).unwrap_or(&path);
        hasher.update(relative.to_string_lossy().replace('\\', "/").as_bytes());
        hasher.update([0u8]);
        hasher.update(fs::read(&path)?);
        hasher.update([0u8]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ServiceKind;
    use crate::storage::StoragePaths;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        storage: FileStore,
        locks: RouterLocks,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let mut storage = FileStore::new(StoragePaths::new(temp.path()));
            storage.initialize().unwrap();
            Self {
                _temp: temp,
                storage,
                locks: RouterLocks::new(),
            }
        }

        fn lifecycle(&self) -> Lifecycle<'_> {
            Lifecycle::new(&self.storage, &self.locks)
        }

        fn write_project(&self, name: &str) {
            let dir = self.storage.paths().project_dir(name);
            fs::create_dir_all(dir.join("src")).unwrap();
            fs::write(dir.join("src/server.py"), "print('hi')").unwrap();
            fs::write(dir.join("pyproject.toml"), "[project]").unwrap();
        }

        async fn draft(&self, name: &str) -> Router {
            self.lifecycle()
                .create_router(
                    &user("alice@x"),
                    "alice@x",
                    name,
                    vec![Service::new(ServiceKind::Chat, 1.0)],
                )
                .await
                .unwrap()
        }

        async fn published(&self, name: &str) -> Router {
            self.draft(name).await;
            self.write_project(name);
            self.lifecycle()
                .publish(name, &user("alice@x"), PublishRouterRequest::default())
                .await
                .unwrap()
        }
    }

    fn user(id: &str) -> AuthenticatedUser {
        AuthenticatedUser {
            user_id: id.to_string(),
            session_id: None,
            expires_at: 0,
        }
    }

    #[tokio::test]
    async fn only_server_owner_creates_routers() {
        let fx = Fixture::new();
        let result = fx
            .lifecycle()
            .create_router(&user("bob@x"), "alice@x", "r1", Vec::new())
            .await;
        assert!(matches!(result, Err(ControlError::NotOwner)));
    }

    #[tokio::test]
    async fn create_rejects_bad_input() {
        let fx = Fixture::new();
        let lifecycle = fx.lifecycle();
        let alice = user("alice@x");

        let bad_name = lifecycle.create_router(&alice, "alice@x", "../r1", Vec::new()).await;
        assert!(matches!(bad_name, Err(ControlError::InvalidRequest(_))));

        let twice = vec![
            Service::new(ServiceKind::Chat, 1.0),
            Service::new(ServiceKind::Chat, 2.0),
        ];
        let duplicate = lifecycle.create_router(&alice, "alice@x", "r1", twice).await;
        assert!(matches!(duplicate, Err(ControlError::InvalidRequest(_))));

        fx.draft("r1").await;
        let again = lifecycle.create_router(&alice, "alice@x", "r1", Vec::new()).await;
        assert!(matches!(again, Err(ControlError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn publish_writes_snapshot() {
        let fx = Fixture::new();
        let router = fx.published("r1").await;

        assert!(router.is_published());
        let metadata = router.metadata.as_ref().unwrap();
        assert_eq!(metadata.code_hash.len(), 64);

        let snapshot = SnapshotRepository::new(&fx.storage).read("alice@x", "r1").unwrap();
        assert_eq!(snapshot.code_hash, metadata.code_hash);
        assert_eq!(snapshot.services, router.services);
    }

    #[tokio::test]
    async fn publish_requires_project_and_draft() {
        let fx = Fixture::new();
        fx.draft("r1").await;

        let missing = fx
            .lifecycle()
            .publish("r1", &user("alice@x"), PublishRouterRequest::default())
            .await;
        assert!(matches!(missing, Err(ControlError::ProjectMissing(_))));

        fx.write_project("r1");
        fx.lifecycle()
            .publish("r1", &user("alice@x"), PublishRouterRequest::default())
            .await
            .unwrap();
        let twice = fx
            .lifecycle()
            .publish("r1", &user("alice@x"), PublishRouterRequest::default())
            .await;
        assert!(matches!(twice, Err(ControlError::AlreadyPublished(_))));
    }

    #[tokio::test]
    async fn non_owner_cannot_transition() {
        let fx = Fixture::new();
        fx.published("r1").await;
        let result = fx.lifecycle().unpublish("r1", &user("bob@x")).await;
        assert!(matches!(result, Err(ControlError::NotOwner)));
    }

    #[tokio::test]
    async fn unpublish_removes_snapshot_and_can_republish() {
        let fx = Fixture::new();
        fx.published("r1").await;
        let alice = user("alice@x");

        let router = fx.lifecycle().unpublish("r1", &alice).await.unwrap();
        assert_eq!(router.status, RouterStatus::Unpublished);
        assert!(!fx.storage.exists(fx.storage.paths().snapshot("alice@x", "r1")));

        let again = fx.lifecycle().unpublish("r1", &alice).await;
        assert!(matches!(again, Err(ControlError::NotPublished(_))));

        let router = fx
            .lifecycle()
            .publish("r1", &alice, PublishRouterRequest::default())
            .await
            .unwrap();
        assert!(router.is_published());
    }

    #[tokio::test]
    async fn delegated_router_cannot_be_unpublished_or_deleted() {
        let fx = Fixture::new();
        let mut router = fx.published("r1").await;
        {
            let lease = fx.locks.acquire("r1").await;
            router.metadata.as_mut().unwrap().delegate_email = Some("bob@x".to_string());
            fx.lifecycle().commit(&lease, &mut router).unwrap();
        }

        let alice = user("alice@x");
        let unpublish = fx.lifecycle().unpublish("r1", &alice).await;
        assert!(matches!(unpublish, Err(ControlError::StillDelegated(_))));
        let delete = fx.lifecycle().delete("r1", &alice).await;
        assert!(matches!(delete, Err(ControlError::StillDelegated(_))));
        assert!(fx.lifecycle().load("r1").unwrap().is_published());
    }

    #[tokio::test]
    async fn delete_published_router_cleans_snapshot() {
        let fx = Fixture::new();
        fx.published("r1").await;

        fx.lifecycle().delete("r1", &user("alice@x")).await.unwrap();
        assert!(matches!(fx.lifecycle().load("r1"), Err(ControlError::NotFound(_))));
        assert!(!fx.storage.exists(fx.storage.paths().snapshot("alice@x", "r1")));
    }

    #[tokio::test]
    async fn snapshot_failure_flags_record_until_reconciled() {
        let fx = Fixture::new();
        fx.draft("r1").await;
        fx.write_project("r1");

        // A plain file where the published directory belongs makes the
        // snapshot write fail.
        let blocker = fx.storage.paths().published_router_dir("alice@x", "r1");
        fs::create_dir_all(blocker.parent().unwrap()).unwrap();
        fs::write(&blocker, "blocked").unwrap();

        let alice = user("alice@x");
        let result = fx
            .lifecycle()
            .publish("r1", &alice, PublishRouterRequest::default())
            .await;
        assert!(matches!(result, Err(ControlError::SnapshotDiverged { .. })));

        let record = fx.lifecycle().load("r1").unwrap();
        assert!(record.is_published());
        assert!(record.needs_reconciliation);

        fs::remove_file(&blocker).unwrap();
        let router = fx.lifecycle().reconcile("r1", &alice).await.unwrap();
        assert!(!router.needs_reconciliation);
        assert!(!fx.lifecycle().load("r1").unwrap().needs_reconciliation);
        assert!(SnapshotRepository::new(&fx.storage).read("alice@x", "r1").is_ok());
    }

    #[tokio::test]
    async fn invalid_names_never_resolve_to_a_record() {
        let fx = Fixture::new();
        fx.draft("r1").await;
        let alice = user("alice@x");

        assert!(matches!(fx.lifecycle().load("../routers/r1"), Err(ControlError::NotFound(_))));

        let _held = fx.locks.acquire("r1").await;
        let delete = fx.lifecycle().delete("../routers/r1", &alice).await;
        assert!(matches!(delete, Err(ControlError::NotFound(_))));
        assert!(fx.storage.exists(fx.storage.paths().router_record("r1")));
    }

    #[tokio::test]
    async fn reconcile_removes_artifact_of_undelegated_router() {
        let fx = Fixture::new();
        fx.published("r1").await;
        TokenArtifactRepository::new(&fx.storage)
            .store("alice@x", "r1", "bob@x", "stale")
            .unwrap();

        fx.lifecycle().reconcile("r1", &user("alice@x")).await.unwrap();
        assert!(!fx.storage.exists(fx.storage.paths().access_token("alice@x", "r1")));
    }

    #[tokio::test]
    async fn commit_requires_matching_lease() {
        let fx = Fixture::new();
        let mut router = fx.draft("r1").await;
        let lease = fx.locks.acquire("r2").await;
        let result = fx.lifecycle().commit(&lease, &mut router);
        assert!(matches!(result, Err(ControlError::InvalidRequest(_))));
    }

    #[test]
    fn code_hash_tracks_content() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.py"), "one").unwrap();
        let first = project_code_hash(temp.path()).unwrap();
        assert_eq!(first, project_code_hash(temp.path()).unwrap());

        fs::write(temp.path().join(".cache"), "ignored").unwrap();
        assert_eq!(first, project_code_hash(temp.path()).unwrap());

        fs::write(temp.path().join("a.py"), "two").unwrap();
        assert_ne!(first, project_code_hash(temp.path()).unwrap());
    }
}
