// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Billing
//!
//! - `ledger` - ledger client contract and backend selection
//! - `http` - remote ledger over HTTP
//! - `memory` - in-process ledger
//! - `metered` - reserve / execute / confirm-or-cancel around one priced call

pub mod http;
pub mod ledger;
pub mod memory;
pub mod metered;

pub use http::HttpLedger;
pub use ledger::{
    AccountInfo, LedgerBackend, LedgerClient, LedgerError, LedgerTransaction, Reservation,
    TransactionStatus,
};
pub use memory::InMemoryLedger;
pub use metered::{Charge, Deliverable, MeteredRequest};
