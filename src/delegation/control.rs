// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Remote control handler.
//!
//! A delegate's mutation is applied only after three checks pass, in order:
//!
//! 1. the router's record names the caller as its delegate
//! 2. the action is one the server recognizes
//! 3. the capability token validates against the record's claims
//!
//! The mutation goes through the lifecycle commit path (record, then
//! snapshot). The audit record is appended only after that succeeds.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::auth::AuthenticatedUser;
use crate::capability::{CapabilityService, ExpectedClaims};
use crate::error::ControlError;
use crate::identity;
use crate::lifecycle::Lifecycle;
use crate::locks::RouterLocks;
use crate::models::{is_valid_price, ChargeType, ControlAction, Router, ServiceKind};
use crate::storage::{AuditLog, AuditRecord, FileStore};

/// A control request as submitted by a delegate.
#[derive(Debug, Clone)]
pub struct ControlRequest<'r> {
    pub router_name: &'r str,
    pub delegate_email: &'r str,
    pub control_type: &'r str,
    pub control_data: &'r Value,
    pub access_token: &'r str,
    pub reason: Option<String>,
}

/// Result of an accepted control action.
#[derive(Debug, Clone)]
pub struct ControlOutcome {
    pub router: Router,
    pub audit: AuditRecord,
}

/// Per-service price change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricingUpdate {
    pub pricing: f64,
    pub charge_type: Option<ChargeType>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PriceSpec {
    Flat(f64),
    Detailed {
        pricing: f64,
        #[serde(default)]
        charge_type: Option<ChargeType>,
    },
}

pub struct ControlHandler<'a> {
    storage: &'a FileStore,
    locks: &'a RouterLocks,
    capabilities: &'a CapabilityService,
}

impl<'a> ControlHandler<'a> {
    pub fn new(storage: &'a FileStore, locks: &'a RouterLocks, capabilities: &'a CapabilityService) -> Self {
        Self {
            storage,
            locks,
            capabilities,
        }
    }

    pub async fn handle(&self, request: ControlRequest<'_>, now: DateTime<Utc>) -> Result<ControlOutcome, ControlError> {
        let delegate = identity::normalize(request.delegate_email);
        let lifecycle = Lifecycle::new(self.storage, self.locks);

        let lease = self.locks.acquire(request.router_name).await;

        let mut router = match lifecycle.load(request.router_name) {
            Ok(router) => router,
            Err(ControlError::NotFound(_)) => return Err(ControlError::NotDelegatedToYou),
            Err(e) => return Err(e),
        };
        if router.delegate() != Some(delegate.as_str()) {
            return Err(ControlError::NotDelegatedToYou);
        }

        let action: ControlAction = request
            .control_type
            .parse()
            .map_err(ControlError::UnsupportedAction)?;

        let expected = ExpectedClaims {
            router_name: &router.name,
            router_author: &router.owner,
            delegate_email: &delegate,
            action,
        };
        if !self.capabilities.validate(request.access_token, &expected, now) {
            return Err(ControlError::InvalidToken);
        }

        match action {
            ControlAction::UpdatePricing => {
                let updates = parse_pricing(request.control_data)?;
                apply_pricing(&mut router, &updates)?;
            }
        }
        lifecycle.commit(&lease, &mut router)?;

        let audit = AuditRecord::new(&router.name, &delegate, action, request.control_data.clone())
            .with_reason(request.reason);
        if let Err(e) = AuditLog::new(self.storage).append(&audit) {
            tracing::error!(
                router = %router.name,
                delegate = %delegate,
                error = %e,
                "Control action applied but audit append failed"
            );
            return Err(e.into());
        }

        tracing::info!(
            router = %router.name,
            delegate = %delegate,
            action = %action,
            event_id = %audit.event_id,
            "Delegate control action applied"
        );
        Ok(ControlOutcome { router, audit })
    }

    /// Audit records of a router, oldest first.
    pub fn audit_logs(&self, router_name: &str, caller: &AuthenticatedUser) -> Result<Vec<AuditRecord>, ControlError> {
        Lifecycle::new(self.storage, self.locks).load_owned(router_name, caller)?;
        Ok(AuditLog::new(self.storage).list(router_name)?)
    }
}

/// Parse an `UpdatePricing` payload.
///
/// Accepted shapes, keyed by service kind:
/// `{"chat": 0.5}` or `{"chat": {"pricing": 0.5, "charge_type": "per_request"}}`.
pub fn parse_pricing(data: &Value) -> Result<BTreeMap<ServiceKind, PricingUpdate>, ControlError> {
    let object = data
        .as_object()
        .ok_or_else(|| ControlError::BadPayload("expected an object keyed by service".into()))?;
    if object.is_empty() {
        return Err(ControlError::BadPayload("no services to update".into()));
    }

    let mut updates = BTreeMap::new();
    for (key, value) in object {
        let kind: ServiceKind = serde_json::from_value(Value::String(key.clone()))
            .map_err(|_| ControlError::BadPayload(format!("unknown service '{key}'")))?;
        let price: PriceSpec = serde_json::from_value(value.clone())
            .map_err(|_| ControlError::BadPayload(format!("invalid pricing for '{key}'")))?;

        let update = match price {
            PriceSpec::Flat(pricing) => PricingUpdate {
                pricing,
                charge_type: None,
            },
            PriceSpec::Detailed {
                pricing,
                charge_type,
            } => PricingUpdate {
                pricing,
                charge_type,
            },
        };
        if !is_valid_price(update.pricing) {
            return Err(ControlError::BadPayload(format!(
                "pricing for '{key}' must be a non-negative number"
            )));
        }
        updates.insert(kind, update);
    }
    Ok(updates)
}

/// Apply all updates or none.
fn apply_pricing(router: &mut Router, updates: &BTreeMap<ServiceKind, PricingUpdate>) -> Result<(), ControlError> {
    if let Some(kind) = updates.keys().find(|k| router.service(**k).is_none()) {
        return Err(ControlError::BadPayload(format!(
            "router {} has no {kind} service",
            router.name
        )));
    }

    for (kind, update) in updates {
        if let Some(service) = router.service_mut(*kind) {
            service.pricing = update.pricing;
            if let Some(charge_type) = update.charge_type {
                service.charge_type = charge_type;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delegation::test_support::{user, Fixture};
    use crate::storage::SnapshotRepository;
    use serde_json::json;

    fn request<'r>(token: &'r str, data: &'r Value) -> ControlRequest<'r> {
        ControlRequest {
            router_name: "r1",
            delegate_email: "bob@x",
            control_type: "UpdatePricing",
            control_data: data,
            access_token: token,
            reason: Some("market rate".to_string()),
        }
    }

    #[tokio::test]
    async fn pricing_update_reaches_record_snapshot_and_audit() {
        let fx = Fixture::delegated("r1", "bob@x").await;
        let token = fx.token_for("bob@x");
        let data = json!({ "chat": 0.5 });

        let outcome = fx.handler().handle(request(&token, &data), Utc::now()).await.unwrap();
        assert_eq!(outcome.router.service(ServiceKind::Chat).unwrap().pricing, 0.5);

        let record = fx.lifecycle().load("r1").unwrap();
        let snapshot = SnapshotRepository::new(&fx.storage).read("alice@x", "r1").unwrap();
        assert_eq!(snapshot.services, record.services);
        assert_eq!(record.service(ServiceKind::Chat).unwrap().pricing, 0.5);

        let logs = fx.handler().audit_logs("r1", &user("alice@x")).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].delegate_email, "bob@x");
        assert_eq!(logs[0].control_data, data);
        assert_eq!(logs[0].reason.as_deref(), Some("market rate"));
    }

    #[tokio::test]
    async fn stranger_is_not_delegated() {
        let fx = Fixture::delegated("r1", "bob@x").await;
        let token = fx.token_for("bob@x");
        let data = json!({ "chat": 0.5 });

        let mut req = request(&token, &data);
        req.delegate_email = "carol@x";
        let result = fx.handler().handle(req, Utc::now()).await;
        assert!(matches!(result, Err(ControlError::NotDelegatedToYou)));

        let mut req = request(&token, &data);
        req.router_name = "missing";
        let result = fx.handler().handle(req, Utc::now()).await;
        assert!(matches!(result, Err(ControlError::NotDelegatedToYou)));
    }

    #[tokio::test]
    async fn unknown_action_is_unsupported() {
        let fx = Fixture::delegated("r1", "bob@x").await;
        let token = fx.token_for("bob@x");
        let data = json!({ "chat": 0.5 });

        let mut req = request(&token, &data);
        req.control_type = "DeleteRouter";
        let result = fx.handler().handle(req, Utc::now()).await;
        assert!(matches!(result, Err(ControlError::UnsupportedAction(_))));
    }

    #[tokio::test]
    async fn bad_token_changes_nothing() {
        let fx = Fixture::delegated("r1", "bob@x").await;
        let data = json!({ "chat": 0.5 });

        let result = fx.handler().handle(request("garbage", &data), Utc::now()).await;
        assert!(matches!(result, Err(ControlError::InvalidToken)));

        let record = fx.lifecycle().load("r1").unwrap();
        assert_eq!(record.service(ServiceKind::Chat).unwrap().pricing, 1.0);
        assert!(fx.handler().audit_logs("r1", &user("alice@x")).unwrap().is_empty());
    }

    #[tokio::test]
    async fn expired_token_rejected() {
        let fx = Fixture::delegated("r1", "bob@x").await;
        let token = fx.token_for("bob@x");
        let data = json!({ "chat": 0.5 });

        let later = Utc::now() + fx.capabilities.max_age() + chrono::Duration::days(1);
        let result = fx.handler().handle(request(&token, &data), later).await;
        assert!(matches!(result, Err(ControlError::InvalidToken)));
    }

    #[tokio::test]
    async fn revoked_token_no_longer_works() {
        let fx = Fixture::delegated("r1", "bob@x").await;
        let token = fx.token_for("bob@x");
        fx.manager().revoke("r1", &user("alice@x")).await.unwrap();

        let data = json!({ "chat": 0.5 });
        let result = fx.handler().handle(request(&token, &data), Utc::now()).await;
        assert!(matches!(result, Err(ControlError::NotDelegatedToYou)));
    }

    #[tokio::test]
    async fn bad_payload_is_not_applied() {
        let fx = Fixture::delegated("r1", "bob@x").await;
        let token = fx.token_for("bob@x");

        for data in [
            json!([1, 2]),
            json!({}),
            json!({ "chat": -1.0 }),
            json!({ "chat": "free" }),
            json!({ "video": 1.0 }),
            json!({ "chat": 0.5, "search": 0.1 }),
        ] {
            let result = fx.handler().handle(request(&token, &data), Utc::now()).await;
            assert!(matches!(result, Err(ControlError::BadPayload(_))), "{data}");
        }

        let record = fx.lifecycle().load("r1").unwrap();
        assert_eq!(record.service(ServiceKind::Chat).unwrap().pricing, 1.0);
        assert!(fx.handler().audit_logs("r1", &user("alice@x")).unwrap().is_empty());
    }

    #[tokio::test]
    async fn audit_logs_are_owner_only() {
        let fx = Fixture::delegated("r1", "bob@x").await;
        let result = fx.handler().audit_logs("r1", &user("bob@x"));
        assert!(matches!(result, Err(ControlError::NotOwner)));
    }

    #[test]
    fn detailed_pricing_parses() {
        let updates = parse_pricing(&json!({
            "search": { "pricing": 0.25, "charge_type": "per_request" }
        }))
        .unwrap();
        assert_eq!(
            updates[&ServiceKind::Search],
            PricingUpdate {
                pricing: 0.25,
                charge_type: Some(ChargeType::PerRequest)
            }
        );
    }

    #[tokio::test]
    async fn revoke_and_control_do_not_interleave() {
        let fx = Fixture::delegated("r1", "bob@x").await;
        let token = fx.token_for("bob@x");
        let data = json!({ "chat": 0.5 });
        let alice = user("alice@x");

        let handler = fx.handler();
        let manager = fx.manager();
        let (controlled, revoked) = tokio::join!(
            handler.handle(request(&token, &data), Utc::now()),
            manager.revoke("r1", &alice),
        );
        revoked.unwrap();

        let logs = fx.handler().audit_logs("r1", &alice).unwrap();
        match controlled {
            Ok(_) => assert_eq!(logs.len(), 1),
            Err(e) => {
                assert!(matches!(e, ControlError::NotDelegatedToYou));
                assert!(logs.is_empty());
            }
        }
        assert!(!fx.lifecycle().load("r1").unwrap().is_delegated());
    }

    #[tokio::test]
    async fn full_delegation_scenario() {
        let fx = Fixture::published("r1").await;
        fx.enroll("bob@x");
        let alice = user("alice@x");

        let router = fx
            .manager()
            .grant("r1", &alice, "bob@x", ControlAction::UpdatePricing)
            .await
            .unwrap();
        assert_eq!(router.delegate(), Some("bob@x"));

        let token = fx.token_for("bob@x");
        let data = json!({ "chat": 0.5 });
        fx.handler().handle(request(&token, &data), Utc::now()).await.unwrap();
        assert_eq!(fx.handler().audit_logs("r1", &alice).unwrap().len(), 1);

        let blocked = fx.lifecycle().unpublish("r1", &alice).await;
        assert!(matches!(blocked, Err(ControlError::StillDelegated(_))));

        fx.manager().revoke("r1", &alice).await.unwrap();
        fx.lifecycle().unpublish("r1", &alice).await.unwrap();
    }
}
