// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Domain Data Models
//!
//! Routers, their services and metadata, the control actions a delegate can
//! be granted, and the publicly readable snapshot derived from a router.
//!
//! ## Two stores, one source of truth
//!
//! A [`Router`] record is authoritative. A [`PublishedSnapshot`] is always
//! derived from it with [`PublishedSnapshot::from_router`] and is never read
//! back to make authorization decisions.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Snapshot schema version written into every published snapshot.
pub const SNAPSHOT_VERSION: &str = "1.0.0";

// =============================================================================
// Services
// =============================================================================

/// Kind of service a router exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Chat,
    Search,
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceKind::Chat => write!(f, "chat"),
            ServiceKind::Search => write!(f, "search"),
        }
    }
}

/// Billing unit for a service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChargeType {
    #[default]
    PerRequest,
}

/// A priced service attached to a router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Service {
    /// Service kind.
    #[serde(rename = "type")]
    pub kind: ServiceKind,
    /// Whether callers may invoke it.
    pub enabled: bool,
    /// Price per charge unit (never negative).
    pub pricing: f64,
    /// Billing unit.
    #[serde(default)]
    pub charge_type: ChargeType,
}

impl Service {
    pub fn new(kind: ServiceKind, pricing: f64) -> Self {
        Self {
            kind,
            enabled: true,
            pricing,
            charge_type: ChargeType::PerRequest,
        }
    }
}

/// Whether a price is a usable amount (finite and not negative).
pub fn is_valid_price(price: f64) -> bool {
    price.is_finite() && price >= 0.0
}

// =============================================================================
// Control Actions
// =============================================================================

/// Control action a delegate may be granted on a router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum ControlAction {
    UpdatePricing,
}

impl ControlAction {
    /// Wire name used in tokens and requests.
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlAction::UpdatePricing => "UpdatePricing",
        }
    }
}

impl fmt::Display for ControlAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControlAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UpdatePricing" => Ok(ControlAction::UpdatePricing),
            other => Err(other.to_string()),
        }
    }
}

// =============================================================================
// Routers
// =============================================================================

/// Lifecycle status of a router.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RouterStatus {
    #[default]
    Draft,
    Published,
    Unpublished,
}

/// Published metadata of a router.
///
/// Exists once a router has been published. The delegate fields are set
/// only while a delegation is active.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RouterMetadata {
    pub summary: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// SHA-256 over the router's project files.
    pub code_hash: String,
    pub publish_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegate_email: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub delegate_control_types: Vec<ControlAction>,
}

/// Authoritative router record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Router {
    /// Unique within the owner's namespace.
    pub name: String,
    /// Owner identity (normalized email).
    pub owner: String,
    pub status: RouterStatus,
    pub services: Vec<Service>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<RouterMetadata>,
    /// Set when a snapshot write failed after the record was written.
    #[serde(default)]
    pub needs_reconciliation: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Router {
    /// Create a draft router.
    pub fn draft(name: impl Into<String>, owner: impl Into<String>, services: Vec<Service>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            owner: owner.into(),
            status: RouterStatus::Draft,
            services,
            metadata: None,
            needs_reconciliation: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_published(&self) -> bool {
        self.status == RouterStatus::Published
    }

    /// Currently delegated identity, if any.
    pub fn delegate(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.delegate_email.as_deref())
    }

    pub fn is_delegated(&self) -> bool {
        self.delegate().is_some()
    }

    pub fn service(&self, kind: ServiceKind) -> Option<&Service> {
        self.services.iter().find(|s| s.kind == kind)
    }

    pub fn service_mut(&mut self, kind: ServiceKind) -> Option<&mut Service> {
        self.services.iter_mut().find(|s| s.kind == kind)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl crate::storage::OwnedResource for Router {
    fn owner_user_id(&self) -> &str {
        &self.owner
    }
}

/// Router names are path components: non-empty, `[A-Za-z0-9_-]`.
pub fn is_valid_router_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 128
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

// =============================================================================
// Published Snapshot
// =============================================================================

/// Publicly readable copy of a router's metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PublishedSnapshot {
    pub project_name: String,
    pub description: String,
    pub summary: String,
    pub tags: Vec<String>,
    pub services: Vec<Service>,
    pub code_hash: String,
    pub version: String,
    pub publish_date: DateTime<Utc>,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegate_email: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub delegate_control_types: Vec<ControlAction>,
}

impl PublishedSnapshot {
    /// Derive the snapshot of a published router. Returns `None` for routers
    /// that are not published or carry no metadata.
    pub fn from_router(router: &Router) -> Option<Self> {
        if !router.is_published() {
            return None;
        }
        let metadata = router.metadata.as_ref()?;
        Some(Self {
            project_name: router.name.clone(),
            description: metadata.description.clone(),
            summary: metadata.summary.clone(),
            tags: metadata.tags.clone(),
            services: router.services.clone(),
            code_hash: metadata.code_hash.clone(),
            version: SNAPSHOT_VERSION.to_string(),
            publish_date: metadata.publish_date,
            author: router.owner.clone(),
            delegate_email: metadata.delegate_email.clone(),
            delegate_control_types: metadata.delegate_control_types.clone(),
        })
    }
}

// =============================================================================
// Requests and Responses
// =============================================================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateRouterRequest {
    pub name: String,
    #[serde(default)]
    pub services: Vec<Service>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct PublishRouterRequest {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GrantDelegateRequest {
    pub delegate_email: String,
    /// Defaults to `UpdatePricing`.
    #[serde(default)]
    pub control_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RevokeDelegationResponse {
    pub delegate_email: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct DelegateControlRequest {
    pub control_type: String,
    #[schema(value_type = Object)]
    pub control_data: serde_json::Value,
    pub access_token: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ControlResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AccessTokenResponse {
    pub router_name: String,
    pub router_author: String,
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DelegateListResponse {
    pub delegates: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn published_router() -> Router {
        let mut router = Router::draft(
            "r1",
            "alice@x",
            vec![Service::new(ServiceKind::Chat, 1.0)],
        );
        router.status = RouterStatus::Published;
        router.metadata = Some(RouterMetadata {
            summary: "s".to_string(),
            description: "d".to_string(),
            tags: vec!["t".to_string()],
            code_hash: "abc".to_string(),
            publish_date: Utc::now(),
            delegate_email: Some("bob@x".to_string()),
            delegate_control_types: vec![ControlAction::UpdatePricing],
        });
        router
    }

    #[test]
    fn service_serializes_with_type_key() {
        let json = serde_json::to_value(Service::new(ServiceKind::Search, 0.25)).unwrap();
        assert_eq!(json["type"], "search");
        assert_eq!(json["charge_type"], "per_request");
        assert_eq!(json["pricing"], 0.25);
    }

    #[test]
    fn control_action_parses_known_names_only() {
        assert_eq!(
            "UpdatePricing".parse::<ControlAction>(),
            Ok(ControlAction::UpdatePricing)
        );
        assert!("DeleteRouter".parse::<ControlAction>().is_err());
        assert!("updatepricing".parse::<ControlAction>().is_err());
    }

    #[test]
    fn snapshot_mirrors_record() {
        let router = published_router();
        let snapshot = PublishedSnapshot::from_router(&router).unwrap();
        assert_eq!(snapshot.project_name, "r1");
        assert_eq!(snapshot.author, "alice@x");
        assert_eq!(snapshot.services, router.services);
        assert_eq!(snapshot.delegate_email.as_deref(), Some("bob@x"));
        assert_eq!(snapshot.version, SNAPSHOT_VERSION);
    }

    #[test]
    fn snapshot_absent_for_unpublished() {
        let mut router = published_router();
        router.status = RouterStatus::Unpublished;
        assert!(PublishedSnapshot::from_router(&router).is_none());
    }

    #[test]
    fn router_name_validation() {
        assert!(is_valid_router_name("my-router_2"));
        assert!(!is_valid_router_name(""));
        assert!(!is_valid_router_name("../etc"));
        assert!(!is_valid_router_name("a b"));
    }

    #[test]
    fn price_validation() {
        assert!(is_valid_price(0.0));
        assert!(is_valid_price(2.5));
        assert!(!is_valid_price(-0.01));
        assert!(!is_valid_price(f64::NAN));
        assert!(!is_valid_price(f64::INFINITY));
    }
}
