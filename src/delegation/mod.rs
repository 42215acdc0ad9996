// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Delegation
//!
//! - `manager` - grant, revoke, the delegate directory and token retrieval
//! - `control` - delegate-submitted control actions and their audit log
//!
//! Both take the router's lease before reading the record, so a revoke and
//! a control action on the same router never interleave.

pub mod control;
pub mod manager;

pub use control::{parse_pricing, ControlHandler, ControlOutcome, ControlRequest, PricingUpdate};
pub use manager::DelegationManager;
