// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process ledger.
//!
//! Used when no `LEDGER_URL` is configured and as the ledger in tests.
//! Accounts are opened on first use with a starting balance. A reservation
//! holds funds against the payer's available balance until it is confirmed
//! or cancelled.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use uuid::Uuid;

use super::ledger::{
    AccountInfo, LedgerClient, LedgerError, LedgerTransaction, Reservation, TransactionStatus,
};

/// Starting balance of accounts opened in development mode.
pub const DEFAULT_STARTING_BALANCE: f64 = 100.0;

#[derive(Debug, Default)]
struct Books {
    balances: HashMap<String, f64>,
    /// Payment token -> recipient.
    tokens: HashMap<String, String>,
    transactions: Vec<LedgerTransaction>,
}

impl Books {
    fn balance(&mut self, email: &str, starting_balance: f64) -> f64 {
        *self
            .balances
            .entry(email.to_string())
            .or_insert(starting_balance)
    }

    fn held(&self, email: &str) -> f64 {
        self.transactions
            .iter()
            .filter(|t| t.sender == email && t.status == TransactionStatus::Pending)
            .map(|t| t.amount)
            .sum()
    }

    fn pending_mut(&mut self, id: &str) -> Result<&mut LedgerTransaction, LedgerError> {
        let tx = self
            .transactions
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| LedgerError::UnknownTransaction(id.to_string()))?;
        if tx.status != TransactionStatus::Pending {
            return Err(LedgerError::InvalidState {
                id: id.to_string(),
                status: tx.status,
            });
        }
        Ok(tx)
    }
}

/// Ledger kept in memory.
#[derive(Debug)]
pub struct InMemoryLedger {
    starting_balance: f64,
    books: Mutex<Books>,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new(DEFAULT_STARTING_BALANCE)
    }
}

impl InMemoryLedger {
    pub fn new(starting_balance: f64) -> Self {
        Self {
            starting_balance,
            books: Mutex::new(Books::default()),
        }
    }

    fn books(&self) -> MutexGuard<'_, Books> {
        self.books.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set an account's balance.
    pub fn set_balance(&self, email: &str, balance: f64) {
        self.books().balances.insert(email.to_string(), balance);
    }

    /// All transactions with the given status.
    pub fn transactions_with_status(&self, status: TransactionStatus) -> Vec<LedgerTransaction> {
        self.books()
            .transactions
            .iter()
            .filter(|t| t.status == status)
            .cloned()
            .collect()
    }

    /// Number of reservations ever opened.
    pub fn reservation_count(&self) -> usize {
        self.books().transactions.len()
    }
}

impl LedgerClient for InMemoryLedger {
    async fn create_transaction_token(&self, recipient: &str) -> Result<String, LedgerError> {
        let token = Uuid::new_v4().simple().to_string();
        self.books()
            .tokens
            .insert(token.clone(), recipient.to_string());
        Ok(token)
    }

    async fn reserve(&self, payer: &str, amount: f64, token: &str) -> Result<Reservation, LedgerError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let mut books = self.books();
        let recipient = books
            .tokens
            .get(token)
            .cloned()
            .ok_or_else(|| LedgerError::InvalidPaymentToken("unknown token".to_string()))?;
        if recipient == payer {
            return Err(LedgerError::InvalidPaymentToken(
                "payer and recipient are the same account".to_string(),
            ));
        }

        let available = books.balance(payer, self.starting_balance) - books.held(payer);
        if available < amount {
            return Err(LedgerError::InsufficientFunds);
        }

        let tx = LedgerTransaction {
            id: Uuid::new_v4().to_string(),
            sender: payer.to_string(),
            recipient: recipient.clone(),
            amount,
            status: TransactionStatus::Pending,
            created_at: Utc::now(),
        };
        let reservation = Reservation {
            transaction_id: tx.id.clone(),
            payer: payer.to_string(),
            recipient,
            amount,
        };
        books.transactions.push(tx);
        Ok(reservation)
    }

    async fn confirm(&self, reservation: &Reservation) -> Result<LedgerTransaction, LedgerError> {
        let mut books = self.books();
        let starting_balance = self.starting_balance;

        let tx = books.pending_mut(&reservation.transaction_id)?;
        tx.status = TransactionStatus::Confirmed;
        let tx = tx.clone();

        let payer_balance = books.balance(&tx.sender, starting_balance);
        books.balances.insert(tx.sender.clone(), payer_balance - tx.amount);
        let recipient_balance = books.balance(&tx.recipient, starting_balance);
        books
            .balances
            .insert(tx.recipient.clone(), recipient_balance + tx.amount);

        Ok(tx)
    }

    async fn cancel(&self, reservation: &Reservation) -> Result<(), LedgerError> {
        let mut books = self.books();
        books.pending_mut(&reservation.transaction_id)?.status = TransactionStatus::Cancelled;
        Ok(())
    }

    async fn account_info(&self, email: &str) -> Result<AccountInfo, LedgerError> {
        let balance = self.books().balance(email, self.starting_balance);
        Ok(AccountInfo {
            email: email.to_string(),
            balance,
        })
    }

    async fn transaction_history(&self, email: &str) -> Result<Vec<LedgerTransaction>, LedgerError> {
        let mut history: Vec<LedgerTransaction> = self
            .books()
            .transactions
            .iter()
            .filter(|t| t.sender == email || t.recipient == email)
            .cloned()
            .collect();
        history.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn confirm_moves_funds() {
        let ledger = InMemoryLedger::new(10.0);
        let token = ledger.create_transaction_token("alice@x").await.unwrap();

        let reservation = ledger.reserve("carol@x", 2.5, &token).await.unwrap();
        assert_eq!(reservation.recipient, "alice@x");
        assert_eq!(ledger.account_info("carol@x").await.unwrap().balance, 10.0);

        let tx = ledger.confirm(&reservation).await.unwrap();
        assert_eq!(tx.status, TransactionStatus::Confirmed);
        assert_eq!(ledger.account_info("carol@x").await.unwrap().balance, 7.5);
        assert_eq!(ledger.account_info("alice@x").await.unwrap().balance, 12.5);
    }

    #[tokio::test]
    async fn cancel_releases_hold() {
        let ledger = InMemoryLedger::new(3.0);
        let token = ledger.create_transaction_token("alice@x").await.unwrap();

        let first = ledger.reserve("carol@x", 2.0, &token).await.unwrap();
        assert_eq!(
            ledger.reserve("carol@x", 2.0, &token).await,
            Err(LedgerError::InsufficientFunds)
        );

        ledger.cancel(&first).await.unwrap();
        assert!(ledger.reserve("carol@x", 2.0, &token).await.is_ok());
        assert_eq!(ledger.account_info("carol@x").await.unwrap().balance, 3.0);
    }

    #[tokio::test]
    async fn settled_transactions_cannot_change() {
        let ledger = InMemoryLedger::default();
        let token = ledger.create_transaction_token("alice@x").await.unwrap();
        let reservation = ledger.reserve("carol@x", 1.0, &token).await.unwrap();

        ledger.confirm(&reservation).await.unwrap();
        assert!(matches!(
            ledger.cancel(&reservation).await,
            Err(LedgerError::InvalidState { .. })
        ));
        assert!(matches!(
            ledger.confirm(&reservation).await,
            Err(LedgerError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn unknown_token_rejected() {
        let ledger = InMemoryLedger::default();
        let result = ledger.reserve("carol@x", 1.0, "bogus").await;
        assert!(matches!(result, Err(LedgerError::InvalidPaymentToken(_))));
        assert_eq!(ledger.reservation_count(), 0);
    }

    #[tokio::test]
    async fn history_lists_both_sides() {
        let ledger = InMemoryLedger::default();
        let token = ledger.create_transaction_token("alice@x").await.unwrap();
        let reservation = ledger.reserve("carol@x", 1.0, &token).await.unwrap();
        ledger.confirm(&reservation).await.unwrap();

        assert_eq!(ledger.transaction_history("carol@x").await.unwrap().len(), 1);
        assert_eq!(ledger.transaction_history("alice@x").await.unwrap().len(), 1);
        assert!(ledger.transaction_history("dave@x").await.unwrap().is_empty());
    }
}
