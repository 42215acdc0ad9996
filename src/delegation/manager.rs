// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Delegation manager.
//!
//! A published router has at most one active delegate. Granting issues a
//! capability token, distributes it where only the delegate may read it and
//! then records the delegate on the router (record, then snapshot). Revoking
//! clears the delegate from the record and removes the artifact; any
//! previously issued token then fails validation on the delegate claim.

use chrono::Utc;

use crate::auth::AuthenticatedUser;
use crate::capability::CapabilityService;
use crate::error::ControlError;
use crate::identity;
use crate::lifecycle::Lifecycle;
use crate::locks::RouterLocks;
use crate::models::{is_valid_router_name, ControlAction, Router};
use crate::storage::{
    DelegateDirectory, DelegateMarker, FileStore, StorageError, TokenArtifactRepository,
};

pub struct DelegationManager<'a> {
    storage: &'a FileStore,
    locks: &'a RouterLocks,
    capabilities: &'a CapabilityService,
}

impl<'a> DelegationManager<'a> {
    pub fn new(storage: &'a FileStore, locks: &'a RouterLocks, capabilities: &'a CapabilityService) -> Self {
        Self {
            storage,
            locks,
            capabilities,
        }
    }

    fn lifecycle(&self) -> Lifecycle<'a> {
        Lifecycle::new(self.storage, self.locks)
    }

    /// Grant `delegate_email` the right to perform `action` on a published
    /// router owned by `caller`.
    pub async fn grant(
        &self,
        router_name: &str,
        caller: &AuthenticatedUser,
        delegate_email: &str,
        action: ControlAction,
    ) -> Result<Router, ControlError> {
        let delegate = identity::normalize(delegate_email);
        let lifecycle = self.lifecycle();

        let lease = self.locks.acquire(router_name).await;
        let mut router = lifecycle.load_owned(router_name, caller)?;

        if !router.is_published() {
            return Err(ControlError::NotPublished(router.name));
        }
        if let Some(current) = router.delegate() {
            return Err(ControlError::AlreadyDelegated {
                router: router.name.clone(),
                delegate: current.to_string(),
            });
        }
        self.check_delegate(&router, &delegate, action)?;

        let token = self
            .capabilities
            .issue(&router.name, &router.owner, &delegate, action, Utc::now())?;

        // The artifact lands before the record names the delegate, so a
        // recorded delegation always has a token to read.
        let artifacts = TokenArtifactRepository::new(self.storage);
        if let Err(e) = artifacts.store(&router.owner, &router.name, &delegate, &token) {
            tracing::error!(
                router = %router.name,
                delegate = %delegate,
                error = %e,
                "Failed to distribute access token"
            );
            if let Err(cleanup) = artifacts.remove(&router.owner, &router.name) {
                tracing::warn!(router = %router.name, error = %cleanup, "Failed to remove partial token artifact");
            }
            return Err(e.into());
        }

        if let Some(metadata) = router.metadata.as_mut() {
            metadata.delegate_email = Some(delegate.clone());
            metadata.delegate_control_types = vec![action];
        }
        match lifecycle.commit(&lease, &mut router) {
            Ok(()) => {}
            Err(e @ ControlError::SnapshotDiverged { .. }) => {
                // The record holds the delegation; the artifact stays with it
                // and reconcile repairs the snapshot.
                tracing::warn!(router = %router.name, delegate = %delegate, "Delegation recorded with a diverged snapshot");
                return Err(e);
            }
            Err(e) => {
                if let Err(cleanup) = artifacts.remove(&router.owner, &router.name) {
                    tracing::warn!(router = %router.name, error = %cleanup, "Failed to remove token artifact");
                }
                return Err(e);
            }
        }

        tracing::info!(
            router = %router.name,
            delegate = %delegate,
            action = %action,
            "Delegate access granted"
        );
        Ok(router)
    }

    /// Revoke the active delegation, returning the former delegate.
    pub async fn revoke(&self, router_name: &str, caller: &AuthenticatedUser) -> Result<String, ControlError> {
        let lifecycle = self.lifecycle();

        let lease = self.locks.acquire(router_name).await;
        let mut router = lifecycle.load_owned(router_name, caller)?;

        let delegate = router
            .delegate()
            .map(str::to_string)
            .ok_or_else(|| ControlError::NotDelegated(router.name.clone()))?;

        clear_delegate(&mut router);
        let committed = lifecycle.commit(&lease, &mut router);

        // A diverged snapshot still means the record dropped the delegate.
        if matches!(committed, Ok(()) | Err(ControlError::SnapshotDiverged { .. })) {
            if let Err(e) = TokenArtifactRepository::new(self.storage).remove(&router.owner, &router.name) {
                tracing::warn!(
                    router = %router.name,
                    error = %e,
                    "Failed to remove access token artifact; the token no longer validates"
                );
            }
        }
        committed?;

        tracing::info!(router = %router.name, delegate = %delegate, "Delegation revoked");
        Ok(delegate)
    }

    /// Identities that opted in as delegates, excluding the caller.
    pub fn list_available_delegates(&self, caller: &AuthenticatedUser) -> Result<Vec<String>, ControlError> {
        Ok(DelegateDirectory::new(self.storage).list_available(&caller.user_id)?)
    }

    /// The access token of `router_name` by `router_author`, as read by the
    /// caller. Anyone but the delegate sees `NotFound`.
    pub fn access_token(
        &self,
        router_name: &str,
        router_author: &str,
        caller: &AuthenticatedUser,
    ) -> Result<String, ControlError> {
        let author = identity::normalize(router_author);
        if !is_valid_router_name(router_name) || !identity::is_valid(&author) {
            return Err(ControlError::NotFound(format!("Access token for router {router_name}")));
        }
        TokenArtifactRepository::new(self.storage)
            .read_for(&author, router_name, &caller.user_id)
            .map_err(|e| match e {
                StorageError::NotFound(_) | StorageError::PermissionDenied { .. } => {
                    ControlError::NotFound(format!("Access token for router {router_name}"))
                }
                other => other.into(),
            })
    }

    /// Publish the caller's delegate opt-in marker.
    pub fn enroll(&self, caller: &AuthenticatedUser) -> Result<DelegateMarker, ControlError> {
        let marker = DelegateDirectory::new(self.storage).enroll(&caller.user_id)?;
        tracing::info!(delegate = %caller.user_id, "Delegate enrolled");
        Ok(marker)
    }

    /// Remove the caller's delegate opt-in marker.
    pub fn withdraw(&self, caller: &AuthenticatedUser) -> Result<(), ControlError> {
        DelegateDirectory::new(self.storage)
            .withdraw(&caller.user_id)
            .map_err(|e| match e {
                StorageError::NotFound(_) => {
                    ControlError::NotFound(format!("Delegate marker for {}", caller.user_id))
                }
                other => other.into(),
            })?;
        tracing::info!(delegate = %caller.user_id, "Delegate withdrawn");
        Ok(())
    }

    fn check_delegate(&self, router: &Router, delegate: &str, action: ControlAction) -> Result<(), ControlError> {
        if delegate == router.owner {
            return Err(ControlError::InvalidDelegate(
                "a router owner cannot be its own delegate".to_string(),
            ));
        }
        if !identity::is_valid(delegate) {
            return Err(ControlError::InvalidDelegate(format!(
                "'{delegate}' is not an email identity"
            )));
        }

        let marker = DelegateDirectory::new(self.storage)
            .marker(delegate)
            .map_err(|_| ControlError::InvalidDelegate(format!("{delegate} has not opted in as a delegate")))?;
        if !marker.control_types.contains(&action) {
            return Err(ControlError::InvalidDelegate(format!(
                "{delegate} does not accept {action}"
            )));
        }
        Ok(())
    }
}

fn clear_delegate(router: &mut Router) {
    if let Some(metadata) = router.metadata.as_mut() {
        metadata.delegate_email = None;
        metadata.delegate_control_types.clear();
    }
}
