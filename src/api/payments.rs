// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ledger passthrough endpoints for the authenticated caller.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    auth::Auth,
    billing::{AccountInfo, LedgerClient, LedgerTransaction},
    error::{ApiError, ControlError, ErrorBody},
    identity,
    state::AppState,
};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreatePaymentTokenRequest {
    /// Identity the token pays, usually a router owner.
    pub recipient: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaymentTokenResponse {
    pub recipient: String,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransactionHistoryResponse {
    pub transactions: Vec<LedgerTransaction>,
    pub total: usize,
}

/// Create a payment token scoped to `recipient`.
#[utoipa::path(
    post,
    path = "/v1/payments/tokens",
    tag = "Payments",
    security(("bearer_auth" = [])),
    request_body = CreatePaymentTokenRequest,
    responses(
        (status = 201, description = "Payment token", body = PaymentTokenResponse),
        (status = 400, description = "Invalid recipient", body = ErrorBody),
        (status = 502, description = "Ledger unavailable", body = ErrorBody)
    )
)]
pub async fn create_payment_token(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<CreatePaymentTokenRequest>,
) -> Result<(StatusCode, Json<PaymentTokenResponse>), ApiError> {
    let recipient = identity::normalize(&request.recipient);
    if !identity::is_valid(&recipient) {
        return Err(ApiError::bad_request(format!(
            "'{}' is not an email identity",
            request.recipient
        )));
    }

    let token = state
        .ledger
        .create_transaction_token(&recipient)
        .await
        .map_err(ControlError::from)?;
    tracing::info!(payer = %user.user_id, recipient = %recipient, "Payment token created");

    Ok((StatusCode::CREATED, Json(PaymentTokenResponse { recipient, token })))
}

/// The caller's ledger account.
#[utoipa::path(
    get,
    path = "/v1/payments/account",
    tag = "Payments",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Account balance", body = AccountInfo),
        (status = 502, description = "Ledger unavailable", body = ErrorBody)
    )
)]
pub async fn account_info(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<AccountInfo>, ApiError> {
    let info = state
        .ledger
        .account_info(&user.user_id)
        .await
        .map_err(ControlError::from)?;
    Ok(Json(info))
}

/// The caller's ledger transactions.
#[utoipa::path(
    get,
    path = "/v1/payments/transactions",
    tag = "Payments",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Transaction history", body = TransactionHistoryResponse),
        (status = 502, description = "Ledger unavailable", body = ErrorBody)
    )
)]
pub async fn transaction_history(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<TransactionHistoryResponse>, ApiError> {
    let transactions = state
        .ledger
        .transaction_history(&user.user_id)
        .await
        .map_err(ControlError::from)?;
    let total = transactions.len();
    Ok(Json(TransactionHistoryResponse {
        transactions,
        total,
    }))
}
