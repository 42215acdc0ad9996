// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Delegation endpoints.
//!
//! Owners grant and revoke delegates and read the control audit log.
//! Delegates opt in through the directory and fetch their access tokens.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    auth::Auth,
    error::{ApiError, ErrorBody},
    models::{
        AccessTokenResponse, ControlAction, DelegateListResponse, GrantDelegateRequest,
        RevokeDelegationResponse, Router,
    },
    state::AppState,
    storage::{AuditRecord, DelegateMarker},
};

/// Grant a delegate control over a published router.
#[utoipa::path(
    post,
    path = "/v1/routers/{name}/delegate",
    tag = "Delegation",
    security(("bearer_auth" = [])),
    params(("name" = String, Path, description = "Router name")),
    request_body = GrantDelegateRequest,
    responses(
        (status = 200, description = "Delegate granted", body = Router),
        (status = 400, description = "Unknown control type", body = ErrorBody),
        (status = 403, description = "Not the owner, or delegate not eligible", body = ErrorBody),
        (status = 409, description = "Router already delegated", body = ErrorBody),
        (status = 412, description = "Router not published", body = ErrorBody)
    )
)]
pub async fn grant_delegate(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<GrantDelegateRequest>,
) -> Result<Json<Router>, ApiError> {
    let action = match request.control_type.as_deref() {
        Some(raw) => raw
            .parse::<ControlAction>()
            .map_err(|raw| ApiError::bad_request(format!("unsupported control type '{raw}'")))?,
        None => ControlAction::UpdatePricing,
    };

    let router = state
        .delegation()
        .grant(&name, &user, &request.delegate_email, action)
        .await?;
    Ok(Json(router))
}

/// Revoke the active delegation.
#[utoipa::path(
    delete,
    path = "/v1/routers/{name}/delegate",
    tag = "Delegation",
    security(("bearer_auth" = [])),
    params(("name" = String, Path, description = "Router name")),
    responses(
        (status = 200, description = "Delegation revoked", body = RevokeDelegationResponse),
        (status = 403, description = "Not the owner", body = ErrorBody),
        (status = 412, description = "Router not delegated", body = ErrorBody)
    )
)]
pub async fn revoke_delegation(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<RevokeDelegationResponse>, ApiError> {
    let delegate_email = state.delegation().revoke(&name, &user).await?;
    Ok(Json(RevokeDelegationResponse { delegate_email }))
}

/// Delegate control audit log of a router, oldest first.
#[utoipa::path(
    get,
    path = "/v1/routers/{name}/audit",
    tag = "Delegation",
    security(("bearer_auth" = [])),
    params(("name" = String, Path, description = "Router name")),
    responses(
        (status = 200, description = "Audit records", body = Vec<AuditRecord>),
        (status = 403, description = "Not the owner", body = ErrorBody),
        (status = 404, description = "Router not found", body = ErrorBody)
    )
)]
pub async fn audit_logs(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Vec<AuditRecord>>, ApiError> {
    Ok(Json(state.control().audit_logs(&name, &user)?))
}

/// Identities that opted in as delegates.
#[utoipa::path(
    get,
    path = "/v1/delegates",
    tag = "Delegation",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Available delegates", body = DelegateListResponse)
    )
)]
pub async fn list_delegates(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<DelegateListResponse>, ApiError> {
    let delegates = state.delegation().list_available_delegates(&user)?;
    Ok(Json(DelegateListResponse { delegates }))
}

/// Opt in as a delegate.
#[utoipa::path(
    post,
    path = "/v1/delegates/me",
    tag = "Delegation",
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Opt-in marker published", body = DelegateMarker)
    )
)]
pub async fn enroll_delegate(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<DelegateMarker>), ApiError> {
    let marker = state.delegation().enroll(&user)?;
    Ok((StatusCode::CREATED, Json(marker)))
}

/// Withdraw the delegate opt-in.
#[utoipa::path(
    delete,
    path = "/v1/delegates/me",
    tag = "Delegation",
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Opt-in marker removed"),
        (status = 404, description = "Caller had not opted in", body = ErrorBody)
    )
)]
pub async fn withdraw_delegate(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    state.delegation().withdraw(&user)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Fetch the access token distributed to the caller for a router.
#[utoipa::path(
    get,
    path = "/v1/delegates/tokens/{author}/{name}",
    tag = "Delegation",
    security(("bearer_auth" = [])),
    params(
        ("author" = String, Path, description = "Router owner email"),
        ("name" = String, Path, description = "Router name")
    ),
    responses(
        (status = 200, description = "Access token", body = AccessTokenResponse),
        (status = 404, description = "No token for the caller", body = ErrorBody)
    )
)]
pub async fn access_token(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path((author, name)): Path<(String, String)>,
) -> Result<Json<AccessTokenResponse>, ApiError> {
    let access_token = state.delegation().access_token(&name, &author, &user)?;
    Ok(Json(AccessTokenResponse {
        router_name: name,
        router_author: crate::identity::normalize(&author),
        access_token,
    }))
}
