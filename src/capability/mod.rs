// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Capability Tokens
//!
//! - `codec` - HS256 signing of the claim set
//! - `service` - issuance and fail-closed validation against expected claims
//!
//! The signing secret is process-wide. When none is configured it is
//! generated once and persisted in the data root, so tokens survive
//! restarts.

pub mod codec;
pub mod service;

pub use codec::{TokenClaims, TokenCodec, TokenError};
pub use service::{CapabilityService, ExpectedClaims, DEFAULT_TOKEN_TTL_DAYS};

use crate::storage::{FileStore, StorageError, StorageResult};

/// Minimum accepted secret length in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Resolve the token secret: configured value, else the persisted key, else
/// a freshly generated key that is persisted for next time.
pub fn load_or_create_secret(storage: &FileStore, configured: Option<&str>) -> StorageResult<Vec<u8>> {
    if let Some(secret) = configured {
        if secret.len() < MIN_SECRET_LEN {
            tracing::warn!(
                min_len = MIN_SECRET_LEN,
                "Configured control token secret is shorter than recommended"
            );
        }
        return Ok(secret.as_bytes().to_vec());
    }

    let path = storage.paths().control_token_key();
    match storage.read_raw(&path) {
        Ok(secret) if !secret.is_empty() => return Ok(secret),
        Ok(_) | Err(StorageError::NotFound(_)) => {}
        Err(e) => return Err(e),
    }

    let secret = format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    );
    storage.write_raw(&path, secret.as_bytes())?;
    tracing::info!(path = %path.display(), "Generated control token secret");
    Ok(secret.into_bytes())
}
