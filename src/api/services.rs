// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Priced chat and search endpoints.
//!
//! Paid services take the ledger payment token in the `X-Payment-Token`
//! header. The response reports what was charged.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    auth::Auth,
    billing::Charge,
    error::{ApiError, ErrorBody},
    invoke::ServiceInvoker,
    providers::{ChatRequest, ChatResponse, SearchRequest, SearchResponse},
    state::AppState,
};

pub const PAYMENT_TOKEN_HEADER: &str = "x-payment-token";

#[derive(Debug, Serialize, ToSchema)]
pub struct ChatResult {
    pub response: ChatResponse,
    pub charge: Charge,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SearchResult {
    pub response: SearchResponse,
    pub charge: Charge,
}

fn payment_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(PAYMENT_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Chat with a published router.
#[utoipa::path(
    post,
    path = "/v1/routers/{name}/chat",
    tag = "Services",
    security(("bearer_auth" = [])),
    params(
        ("name" = String, Path, description = "Router name"),
        ("X-Payment-Token" = Option<String>, Header, description = "Ledger payment token")
    ),
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Chat reply and charge", body = ChatResult),
        (status = 402, description = "Payment required or rejected", body = ErrorBody),
        (status = 412, description = "Router not published or chat disabled", body = ErrorBody),
        (status = 502, description = "Provider or ledger failure", body = ErrorBody)
    )
)]
pub async fn chat(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResult>, ApiError> {
    let invoker = ServiceInvoker::new(state.lifecycle(), state.ledger.as_ref(), &state.provider);
    let (response, charge) = invoker
        .chat(&name, &user, &request, payment_token(&headers))
        .await?;
    Ok(Json(ChatResult { response, charge }))
}

/// Search a published router's documents.
#[utoipa::path(
    post,
    path = "/v1/routers/{name}/search",
    tag = "Services",
    security(("bearer_auth" = [])),
    params(
        ("name" = String, Path, description = "Router name"),
        ("X-Payment-Token" = Option<String>, Header, description = "Ledger payment token")
    ),
    request_body = SearchRequest,
    responses(
        (status = 200, description = "Search results and charge", body = SearchResult),
        (status = 402, description = "Payment required or rejected", body = ErrorBody),
        (status = 412, description = "Router not published or search disabled", body = ErrorBody),
        (status = 502, description = "Provider or ledger failure", body = ErrorBody)
    )
)]
pub async fn search(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResult>, ApiError> {
    let invoker = ServiceInvoker::new(state.lifecycle(), state.ledger.as_ref(), &state.provider);
    let (response, charge) = invoker
        .search(&name, &user, &request, payment_token(&headers))
        .await?;
    Ok(Json(SearchResult { response, charge }))
}
