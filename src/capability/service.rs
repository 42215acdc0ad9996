// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Capability token issuance and validation.
//!
//! A token proves that one delegate may perform one action on one router of
//! one owner. Validation is fail-closed: the signature must verify, every
//! claim must equal the caller's expectation exactly, and the token must be
//! younger than the configured maximum age.
//!
//! There is no revocation list. Revoking a delegation clears the delegate
//! claim on the router record, so the expectation a caller builds from the
//! record no longer matches any previously issued token.

use chrono::{DateTime, Duration, Utc};

use super::codec::{TokenClaims, TokenCodec, TokenError};
use crate::models::ControlAction;

/// Tolerated clock skew for tokens issued "in the future".
const CLOCK_SKEW_LEEWAY_SECS: i64 = 60;

/// Default maximum token age.
pub const DEFAULT_TOKEN_TTL_DAYS: i64 = 90;

/// Claims a presented token must carry.
#[derive(Debug, Clone, Copy)]
pub struct ExpectedClaims<'a> {
    pub router_name: &'a str,
    pub router_author: &'a str,
    pub delegate_email: &'a str,
    pub action: ControlAction,
}

/// Issues and validates capability tokens.
#[derive(Debug, Clone)]
pub struct CapabilityService {
    codec: TokenCodec,
    max_age: Duration,
}

impl CapabilityService {
    pub fn new(secret: &[u8], max_age: Duration) -> Self {
        Self {
            codec: TokenCodec::new(secret),
            max_age,
        }
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Sign a token for `(router, owner, delegate, action)` issued at `now`.
    pub fn issue(
        &self,
        router_name: &str,
        router_author: &str,
        delegate_email: &str,
        action: ControlAction,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        self.codec.encode(&TokenClaims {
            router_name: router_name.to_string(),
            router_author: router_author.to_string(),
            delegate_email: delegate_email.to_string(),
            control_type: action.as_str().to_string(),
            created_at: now.timestamp(),
        })
    }

    /// Verify a token against `expected`, returning its claims.
    pub fn verify(
        &self,
        token: &str,
        expected: &ExpectedClaims<'_>,
        now: DateTime<Utc>,
    ) -> Result<TokenClaims, TokenError> {
        let claims = self.codec.decode(token)?;

        if claims.router_name != expected.router_name {
            return Err(TokenError::ClaimMismatch("router_name"));
        }
        if claims.router_author != expected.router_author {
            return Err(TokenError::ClaimMismatch("router_author"));
        }
        if claims.delegate_email != expected.delegate_email {
            return Err(TokenError::ClaimMismatch("delegate_email"));
        }
        if claims.control_type != expected.action.as_str() {
            return Err(TokenError::ClaimMismatch("control_type"));
        }

        let issued_at =
            DateTime::<Utc>::from_timestamp(claims.created_at, 0).ok_or(TokenError::Malformed)?;
        if issued_at > now + Duration::seconds(CLOCK_SKEW_LEEWAY_SECS) {
            return Err(TokenError::NotYetValid);
        }
        if now - issued_at > self.max_age {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    /// Boolean form of [`verify`](Self::verify).
    pub fn validate(&self, token: &str, expected: &ExpectedClaims<'_>, now: DateTime<Utc>) -> bool {
        match self.verify(token, expected, now) {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(
                    router = %expected.router_name,
                    delegate = %expected.delegate_email,
                    reason = %e,
                    "Capability token rejected"
                );
                false
            }
        }
    }
}
