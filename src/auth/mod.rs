// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Caller identity for the control plane.
//!
//! ## Auth Flow
//!
//! 1. The caller presents `Authorization: Bearer <session JWT>`
//! 2. The server verifies the JWT (HS256 under `AUTH_JWT_SECRET`, or
//!    structure only in development mode)
//! 3. `sub` is normalized into the caller's email identity
//!
//! Capability tokens for delegates are a separate mechanism, see
//! [`crate::capability`].

pub mod claims;
pub mod error;
pub mod extractor;

pub use claims::AuthenticatedUser;
pub use error::AuthError;
pub use extractor::Auth;
