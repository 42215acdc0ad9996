// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Router Control Server - delegation and metered access for published routers.
//!
//! A router owner publishes a router, optionally hands one delegate a scoped
//! capability to change its pricing, and every paid invocation of the
//! router's services is metered against an external ledger.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Session JWT authentication
//! - `billing` - Ledger clients and the metered payment transaction
//! - `capability` - Signed capability tokens for delegates
//! - `delegation` - Delegate grants, revocation and remote control
//! - `invoke` - Priced chat and search invocation
//! - `lifecycle` - Router state machine and the record/snapshot commit path
//! - `providers` - Built-in and HTTP chat/search providers
//! - `storage` - File-backed records, snapshots, tokens and audit logs

pub mod api;
pub mod auth;
pub mod billing;
pub mod capability;
pub mod config;
pub mod delegation;
pub mod error;
pub mod identity;
pub mod invoke;
pub mod lifecycle;
pub mod locks;
pub mod models;
pub mod providers;
pub mod state;
pub mod storage;
