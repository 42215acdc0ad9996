// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;

use crate::{
    auth::Auth,
    delegation::ControlRequest,
    error::{ApiError, ErrorBody},
    models::{ControlResponse, DelegateControlRequest},
    state::AppState,
};

/// Apply a control action as the router's delegate.
///
/// The caller's identity is the delegate identity checked against the
/// router record and the token's claims.
#[utoipa::path(
    post,
    path = "/v1/routers/{name}/control",
    tag = "Delegation",
    security(("bearer_auth" = [])),
    params(("name" = String, Path, description = "Router name")),
    request_body = DelegateControlRequest,
    responses(
        (status = 200, description = "Action applied", body = ControlResponse),
        (status = 400, description = "Unsupported action or bad payload", body = ErrorBody),
        (status = 403, description = "Not the delegate, or invalid token", body = ErrorBody),
        (status = 502, description = "Snapshot or audit write failed", body = ErrorBody)
    )
)]
pub async fn delegate_control(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<DelegateControlRequest>,
) -> Result<Json<ControlResponse>, ApiError> {
    let outcome = state
        .control()
        .handle(
            ControlRequest {
                router_name: &name,
                delegate_email: &user.user_id,
                control_type: &request.control_type,
                control_data: &request.control_data,
                access_token: &request.access_token,
                reason: request.reason.clone(),
            },
            Utc::now(),
        )
        .await?;

    Ok(Json(ControlResponse {
        success: true,
        message: format!(
            "{} applied to router {}",
            outcome.audit.control_type, outcome.router.name
        ),
    }))
}
