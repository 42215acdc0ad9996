// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Metered payment transaction.
//!
//! Wraps one priced operation so the payer is charged if and only if the
//! operation delivered a result:
//!
//! 1. price 0: run the operation, no ledger interaction
//! 2. price > 0 without a payment token: `PaymentRequired`, operation not run
//! 3. reserve `price` from the payer, scoped by the token
//! 4. run the operation
//! 5. deliverable result: confirm, report the amount charged
//! 6. error or empty result: cancel the reservation, charge nothing
//!
//! A failed confirm is reported to the caller and never retried.

use std::future::Future;

use serde::Serialize;
use utoipa::ToSchema;

use super::ledger::{LedgerClient, LedgerError, Reservation};
use crate::error::ControlError;
use crate::models::is_valid_price;

/// Results that can be judged usable before payment is taken.
pub trait Deliverable {
    fn is_deliverable(&self) -> bool;
}

/// One priced invocation.
#[derive(Debug, Clone, Copy)]
pub struct MeteredRequest<'a> {
    pub payer: &'a str,
    /// The operation's owner, who receives the payment.
    pub recipient: &'a str,
    pub price: f64,
    pub payment_token: Option<&'a str>,
}

/// Receipt of a metered invocation.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Charge {
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
}

impl Charge {
    pub fn free() -> Self {
        Self {
            amount: 0.0,
            transaction_id: None,
        }
    }
}

/// Run `operation` under the metered payment protocol.
pub async fn run<L, F, Fut, T, E>(
    ledger: &L,
    request: MeteredRequest<'_>,
    operation: F,
) -> Result<(T, Charge), ControlError>
where
    L: LedgerClient,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    T: Deliverable,
    E: Into<ControlError>,
{
    if !is_valid_price(request.price) {
        return Err(ControlError::InvalidRequest(format!(
            "price {} is not a valid amount",
            request.price
        )));
    }

    if request.price == 0.0 {
        let output = operation().await.map_err(Into::into)?;
        return Ok((output, Charge::free()));
    }

    let token = request.payment_token.ok_or(ControlError::PaymentRequired)?;

    let reservation = ledger.reserve(request.payer, request.price, token).await?;
    tracing::debug!(
        payer = %request.payer,
        amount = request.price,
        transaction_id = %reservation.transaction_id,
        "Reservation opened"
    );

    if reservation.recipient != request.recipient {
        release(ledger, &reservation).await;
        return Err(LedgerError::InvalidPaymentToken(format!(
            "token pays {}, not {}",
            reservation.recipient, request.recipient
        ))
        .into());
    }

    let output = match operation().await {
        Ok(output) if output.is_deliverable() => output,
        Ok(_) => {
            release(ledger, &reservation).await;
            return Err(ControlError::EmptyResult);
        }
        Err(e) => {
            release(ledger, &reservation).await;
            return Err(e.into());
        }
    };

    match ledger.confirm(&reservation).await {
        Ok(tx) => {
            tracing::info!(
                payer = %request.payer,
                recipient = %request.recipient,
                amount = tx.amount,
                transaction_id = %tx.id,
                "Payment confirmed"
            );
            Ok((
                output,
                Charge {
                    amount: tx.amount,
                    transaction_id: Some(tx.id),
                },
            ))
        }
        Err(e) => {
            tracing::error!(
                payer = %request.payer,
                transaction_id = %reservation.transaction_id,
                error = %e,
                "Payment confirmation failed"
            );
            release(ledger, &reservation).await;
            Err(e.into())
        }
    }
}

/// Best-effort cancel; a reservation that cannot be cancelled expires
/// ledger-side.
async fn release<L: LedgerClient>(ledger: &L, reservation: &Reservation) {
    match ledger.cancel(reservation).await {
        Ok(()) => tracing::debug!(
            transaction_id = %reservation.transaction_id,
            "Reservation cancelled"
        ),
        Err(e) => tracing::warn!(
            transaction_id = %reservation.transaction_id,
            error = %e,
            "Failed to cancel reservation; leaving it to expire"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::ledger::TransactionStatus;
    use crate::billing::memory::InMemoryLedger;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Answer(&'static str);

    impl Deliverable for Answer {
        fn is_deliverable(&self) -> bool {
            !self.0.is_empty()
        }
    }

    fn request<'a>(price: f64, token: Option<&'a str>) -> MeteredRequest<'a> {
        MeteredRequest {
            payer: "carol@x",
            recipient: "alice@x",
            price,
            payment_token: token,
        }
    }

    async fn ledger_with_token() -> (InMemoryLedger, String) {
        let ledger = InMemoryLedger::new(10.0);
        let token = ledger.create_transaction_token("alice@x").await.unwrap();
        (ledger, token)
    }

    #[tokio::test]
    async fn successful_operation_is_charged_once() {
        let (ledger, token) = ledger_with_token().await;

        let (answer, charge) = run(&ledger, request(2.5, Some(&token)), || async {
            Ok::<_, ControlError>(Answer("hello"))
        })
        .await
        .unwrap();

        assert_eq!(answer.0, "hello");
        assert_eq!(charge.amount, 2.5);
        let confirmed = ledger.transactions_with_status(TransactionStatus::Confirmed);
        assert_eq!(confirmed.len(), 1);
        assert_eq!(confirmed[0].amount, 2.5);
        assert_eq!(ledger.account_info("carol@x").await.unwrap().balance, 7.5);
    }

    #[tokio::test]
    async fn failed_operation_is_not_charged() {
        let (ledger, token) = ledger_with_token().await;

        let result = run(&ledger, request(2.5, Some(&token)), || async {
            Err::<Answer, _>(ControlError::InvalidRequest("boom".into()))
        })
        .await;

        assert!(matches!(result, Err(ControlError::InvalidRequest(_))));
        assert!(ledger.transactions_with_status(TransactionStatus::Confirmed).is_empty());
        assert_eq!(ledger.transactions_with_status(TransactionStatus::Cancelled).len(), 1);
        assert_eq!(ledger.account_info("carol@x").await.unwrap().balance, 10.0);
    }

    #[tokio::test]
    async fn empty_result_is_not_charged() {
        let (ledger, token) = ledger_with_token().await;

        let result = run(&ledger, request(1.0, Some(&token)), || async {
            Ok::<_, ControlError>(Answer(""))
        })
        .await;

        assert!(matches!(result, Err(ControlError::EmptyResult)));
        assert!(ledger.transactions_with_status(TransactionStatus::Confirmed).is_empty());
    }

    #[tokio::test]
    async fn missing_token_short_circuits() {
        let ledger = InMemoryLedger::default();
        let calls = AtomicUsize::new(0);

        let result = run(&ledger, request(1.0, None), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ControlError>(Answer("hello"))
        })
        .await;

        assert!(matches!(result, Err(ControlError::PaymentRequired)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(ledger.reservation_count(), 0);
    }

    #[tokio::test]
    async fn free_tier_never_reserves() {
        let (ledger, token) = ledger_with_token().await;

        for token in [None, Some(token.as_str())] {
            let (_, charge) = run(&ledger, request(0.0, token), || async {
                Ok::<_, ControlError>(Answer("hello"))
            })
            .await
            .unwrap();
            assert_eq!(charge, Charge::free());
        }
        assert_eq!(ledger.reservation_count(), 0);
    }

    #[tokio::test]
    async fn rejected_reservation_does_not_run_operation() {
        let (ledger, token) = ledger_with_token().await;
        ledger.set_balance("carol@x", 0.5);
        let calls = AtomicUsize::new(0);

        let result = run(&ledger, request(1.0, Some(&token)), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ControlError>(Answer("hello"))
        })
        .await;

        assert!(matches!(result, Err(ControlError::Ledger(LedgerError::InsufficientFunds))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn token_for_other_recipient_is_released() {
        let ledger = InMemoryLedger::new(10.0);
        let token = ledger.create_transaction_token("dave@x").await.unwrap();

        let result = run(&ledger, request(1.0, Some(&token)), || async {
            Ok::<_, ControlError>(Answer("hello"))
        })
        .await;

        assert!(matches!(result, Err(ControlError::Ledger(LedgerError::InvalidPaymentToken(_)))));
        assert_eq!(ledger.transactions_with_status(TransactionStatus::Cancelled).len(), 1);
    }

    #[tokio::test]
    async fn invalid_price_rejected() {
        let ledger = InMemoryLedger::default();
        let result = run(&ledger, request(-1.0, None), || async {
            Ok::<_, ControlError>(Answer("hello"))
        })
        .await;
        assert!(matches!(result, Err(ControlError::InvalidRequest(_))));
    }
}
