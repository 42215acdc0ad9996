// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session JWT claims and authenticated user representation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::identity;

/// Claims read from a caller's session JWT.
///
/// `sub` carries the caller's email identity.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionClaims {
    pub sub: String,

    #[serde(default)]
    pub exp: i64,

    #[serde(default)]
    pub sid: Option<String>,
}

/// Authenticated caller extracted from a session JWT.
///
/// This is the primary type used throughout the application to represent
/// the identity making a request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    /// Normalized email identity.
    pub user_id: String,

    /// Session ID (if available)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Token expiration (Unix timestamp, not serialized)
    #[serde(skip)]
    pub expires_at: i64,
}

impl AuthenticatedUser {
    /// Create from session claims, normalizing the identity.
    pub fn from_claims(claims: SessionClaims) -> Self {
        Self {
            user_id: identity::normalize(&claims.sub),
            session_id: claims.sid,
            expires_at: claims.exp,
        }
    }

    /// Whether this caller is `identity` after normalization.
    pub fn is(&self, identity: &str) -> bool {
        self.user_id == identity::normalize(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_claims_normalizes_identity() {
        let user = AuthenticatedUser::from_claims(SessionClaims {
            sub: "  Bob@X ".to_string(),
            exp: 1_700_003_600,
            sid: Some("sess_abc".to_string()),
        });
        assert_eq!(user.user_id, "bob@x");
        assert_eq!(user.session_id.as_deref(), Some("sess_abc"));
        assert!(user.is("BOB@x"));
        assert!(!user.is("alice@x"));
    }
}
