// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP client for a remote ledger service.
//!
//! | Operation | Request |
//! |-----------|---------|
//! | create token | `POST {base}/tokens` `{recipient}` |
//! | reserve | `POST {base}/transactions` `{payer, amount, token}` |
//! | confirm | `POST {base}/transactions/{id}/confirm` |
//! | cancel | `POST {base}/transactions/{id}/cancel` |
//! | account | `GET {base}/accounts/{email}` |
//! | history | `GET {base}/accounts/{email}/transactions` |

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use super::ledger::{AccountInfo, LedgerClient, LedgerError, LedgerTransaction, Reservation};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

/// Remote ledger reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpLedger {
    base_url: Url,
    api_key: Option<String>,
    http: Client,
}

impl HttpLedger {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, LedgerError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| LedgerError::Transport(format!("invalid ledger URL: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(LedgerError::Transport(format!(
                "ledger URL {base_url} cannot be a base"
            )));
        }

        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LedgerError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            api_key,
            http,
        })
    }

    /// `base_url` with `segments` appended, each percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Response, LedgerError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status(status, body));
        }
        Ok(response)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, LedgerError> {
        self.execute(request)
            .await?
            .json()
            .await
            .map_err(|e| LedgerError::InvalidResponse(e.to_string()))
    }
}

/// Map a non-success ledger response onto a [`LedgerError`].
fn map_status(status: StatusCode, body: String) -> LedgerError {
    match status {
        StatusCode::PAYMENT_REQUIRED => LedgerError::InsufficientFunds,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LedgerError::InvalidPaymentToken(body),
        StatusCode::NOT_FOUND => LedgerError::UnknownTransaction(body),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            LedgerError::InvalidResponse(format!("ledger rejected request: {body}"))
        }
        other => LedgerError::Transport(format!("ledger returned {other}: {body}")),
    }
}

impl LedgerClient for HttpLedger {
    async fn create_transaction_token(&self, recipient: &str) -> Result<String, LedgerError> {
        let request = self
            .http
            .post(self.endpoint(&["tokens"]))
            .json(&json!({ "recipient": recipient }));
        let response: TokenResponse = self.send(request).await?;
        Ok(response.token)
    }

    async fn reserve(&self, payer: &str, amount: f64, token: &str) -> Result<Reservation, LedgerError> {
        let request = self.http.post(self.endpoint(&["transactions"])).json(&json!({
            "payer": payer,
            "amount": amount,
            "token": token,
        }));
        let tx: LedgerTransaction = self.send(request).await?;

        if tx.sender != payer || (tx.amount - amount).abs() > f64::EPSILON {
            return Err(LedgerError::InvalidResponse(format!(
                "reservation {} does not match the request",
                tx.id
            )));
        }

        Ok(Reservation {
            transaction_id: tx.id,
            payer: tx.sender,
            recipient: tx.recipient,
            amount: tx.amount,
        })
    }

    async fn confirm(&self, reservation: &Reservation) -> Result<LedgerTransaction, LedgerError> {
        let request = self.http.post(self.endpoint(&[
            "transactions",
            &reservation.transaction_id,
            "confirm",
        ]));
        self.send(request).await
    }

    async fn cancel(&self, reservation: &Reservation) -> Result<(), LedgerError> {
        let request = self.http.post(self.endpoint(&[
            "transactions",
            &reservation.transaction_id,
            "cancel",
        ]));
        // Any 2xx counts, including an empty 204.
        self.execute(request).await?;
        Ok(())
    }

    async fn account_info(&self, email: &str) -> Result<AccountInfo, LedgerError> {
        self.send(self.http.get(self.endpoint(&["accounts", email])))
            .await
    }

    async fn transaction_history(&self, email: &str) -> Result<Vec<LedgerTransaction>, LedgerError> {
        self.send(self.http.get(self.endpoint(&["accounts", email, "transactions"])))
            .await
    }
}
