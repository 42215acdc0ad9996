// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ledger client contract.
//!
//! The ledger itself is an external accounting service. The control plane
//! only creates scoped payment tokens, opens reservations, and confirms or
//! cancels them. It never persists transactions.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::http::HttpLedger;
use super::memory::InMemoryLedger;

/// Status of a ledger transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Confirmed,
    Cancelled,
}

/// A transaction as reported by the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LedgerTransaction {
    pub id: String,
    pub sender: String,
    pub recipient: String,
    pub amount: f64,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

/// Account summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AccountInfo {
    pub email: String,
    pub balance: f64,
}

/// Handle of an open reservation. Funds move only on confirm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub transaction_id: String,
    pub payer: String,
    pub recipient: String,
    pub amount: f64,
}

/// Ledger failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    #[error("insufficient funds")]
    InsufficientFunds,

    #[error("payment token rejected: {0}")]
    InvalidPaymentToken(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(f64),

    #[error("unknown transaction {0}")]
    UnknownTransaction(String),

    #[error("transaction {id} is {status:?}")]
    InvalidState { id: String, status: TransactionStatus },

    #[error("ledger unreachable: {0}")]
    Transport(String),

    #[error("ledger response was invalid: {0}")]
    InvalidResponse(String),
}

impl LedgerError {
    /// Whether the ledger refused the payment itself, as opposed to failing.
    pub fn is_payment_rejection(&self) -> bool {
        matches!(
            self,
            LedgerError::InsufficientFunds
                | LedgerError::InvalidPaymentToken(_)
                | LedgerError::InvalidAmount(_)
        )
    }
}

/// Operations the control plane needs from a ledger.
pub trait LedgerClient: Send + Sync {
    /// Create a token pre-authorizing payments to `recipient`.
    fn create_transaction_token(
        &self,
        recipient: &str,
    ) -> impl Future<Output = Result<String, LedgerError>> + Send;

    /// Hold `amount` from `payer` towards the token's recipient.
    fn reserve(
        &self,
        payer: &str,
        amount: f64,
        token: &str,
    ) -> impl Future<Output = Result<Reservation, LedgerError>> + Send;

    /// Move the reserved funds.
    fn confirm(
        &self,
        reservation: &Reservation,
    ) -> impl Future<Output = Result<LedgerTransaction, LedgerError>> + Send;

    /// Release the hold. Best effort from the caller's side.
    fn cancel(&self, reservation: &Reservation) -> impl Future<Output = Result<(), LedgerError>> + Send;

    fn account_info(&self, email: &str) -> impl Future<Output = Result<AccountInfo, LedgerError>> + Send;

    fn transaction_history(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<Vec<LedgerTransaction>, LedgerError>> + Send;
}

/// Ledger selected at startup.
#[derive(Debug)]
pub enum LedgerBackend {
    Http(HttpLedger),
    Memory(InMemoryLedger),
}

impl LedgerBackend {
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerBackend::Http(_) => "http",
            LedgerBackend::Memory(_) => "memory",
        }
    }
}

impl LedgerClient for LedgerBackend {
    async fn create_transaction_token(&self, recipient: &str) -> Result<String, LedgerError> {
        match self {
            LedgerBackend::Http(l) => l.create_transaction_token(recipient).await,
            LedgerBackend::Memory(l) => l.create_transaction_token(recipient).await,
        }
    }

    async fn reserve(&self, payer: &str, amount: f64, token: &str) -> Result<Reservation, LedgerError> {
        match self {
            LedgerBackend::Http(l) => l.reserve(payer, amount, token).await,
            LedgerBackend::Memory(l) => l.reserve(payer, amount, token).await,
        }
    }

    async fn confirm(&self, reservation: &Reservation) -> Result<LedgerTransaction, LedgerError> {
        match self {
            LedgerBackend::Http(l) => l.confirm(reservation).await,
            LedgerBackend::Memory(l) => l.confirm(reservation).await,
        }
    }

    async fn cancel(&self, reservation: &Reservation) -> Result<(), LedgerError> {
        match self {
            LedgerBackend::Http(l) => l.cancel(reservation).await,
            LedgerBackend::Memory(l) => l.cancel(reservation).await,
        }
    }

    async fn account_info(&self, email: &str) -> Result<AccountInfo, LedgerError> {
        match self {
            LedgerBackend::Http(l) => l.account_info(email).await,
            LedgerBackend::Memory(l) => l.account_info(email).await,
        }
    }

    async fn transaction_history(&self, email: &str) -> Result<Vec<LedgerTransaction>, LedgerError> {
        match self {
            LedgerBackend::Http(l) => l.transaction_history(email).await,
            LedgerBackend::Memory(l) => l.transaction_history(email).await,
        }
    }
}
