// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Router lifecycle endpoints.
//!
//! All operations require authentication. Reads and transitions are
//! restricted to the router's owner; creation to the server owner.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    auth::Auth,
    error::{ApiError, ErrorBody},
    models::{CreateRouterRequest, PublishRouterRequest, Router},
    state::AppState,
};

/// Response containing a list of routers.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RouterListResponse {
    pub routers: Vec<Router>,
    pub total: usize,
}

/// Create a Draft router.
#[utoipa::path(
    post,
    path = "/v1/routers",
    tag = "Routers",
    security(("bearer_auth" = [])),
    request_body = CreateRouterRequest,
    responses(
        (status = 201, description = "Router created", body = Router),
        (status = 400, description = "Invalid name or services", body = ErrorBody),
        (status = 403, description = "Caller is not the server owner", body = ErrorBody),
        (status = 409, description = "Router already exists", body = ErrorBody)
    )
)]
pub async fn create_router(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<CreateRouterRequest>,
) -> Result<(StatusCode, Json<Router>), ApiError> {
    let router = state
        .lifecycle()
        .create_router(&user, &state.settings.owner_email, &request.name, request.services)
        .await?;
    Ok((StatusCode::CREATED, Json(router)))
}

/// List the caller's routers.
#[utoipa::path(
    get,
    path = "/v1/routers",
    tag = "Routers",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Routers owned by the caller", body = RouterListResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_routers(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<RouterListResponse>, ApiError> {
    let routers = state.lifecycle().list_routers(&user)?;
    let total = routers.len();
    Ok(Json(RouterListResponse { routers, total }))
}

/// Get a router record.
#[utoipa::path(
    get,
    path = "/v1/routers/{name}",
    tag = "Routers",
    security(("bearer_auth" = [])),
    params(("name" = String, Path, description = "Router name")),
    responses(
        (status = 200, description = "Router record", body = Router),
        (status = 403, description = "Not the owner", body = ErrorBody),
        (status = 404, description = "Router not found", body = ErrorBody)
    )
)]
pub async fn get_router(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Router>, ApiError> {
    Ok(Json(state.lifecycle().get_router(&name, &user)?))
}

/// Publish a router, writing its public snapshot.
#[utoipa::path(
    post,
    path = "/v1/routers/{name}/publish",
    tag = "Routers",
    security(("bearer_auth" = [])),
    params(("name" = String, Path, description = "Router name")),
    request_body = PublishRouterRequest,
    responses(
        (status = 200, description = "Router published", body = Router),
        (status = 409, description = "Already published", body = ErrorBody),
        (status = 412, description = "Project artifacts missing", body = ErrorBody),
        (status = 502, description = "Snapshot write failed", body = ErrorBody)
    )
)]
pub async fn publish_router(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<PublishRouterRequest>,
) -> Result<Json<Router>, ApiError> {
    Ok(Json(state.lifecycle().publish(&name, &user, request).await?))
}

/// Unpublish a router. A delegated router must be revoked first.
#[utoipa::path(
    post,
    path = "/v1/routers/{name}/unpublish",
    tag = "Routers",
    security(("bearer_auth" = [])),
    params(("name" = String, Path, description = "Router name")),
    responses(
        (status = 200, description = "Router unpublished", body = Router),
        (status = 412, description = "Not published, or still delegated", body = ErrorBody)
    )
)]
pub async fn unpublish_router(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Router>, ApiError> {
    Ok(Json(state.lifecycle().unpublish(&name, &user).await?))
}

/// Delete a router and its published artifacts.
#[utoipa::path(
    delete,
    path = "/v1/routers/{name}",
    tag = "Routers",
    security(("bearer_auth" = [])),
    params(("name" = String, Path, description = "Router name")),
    responses(
        (status = 204, description = "Router deleted"),
        (status = 404, description = "Router not found", body = ErrorBody),
        (status = 412, description = "Still delegated", body = ErrorBody)
    )
)]
pub async fn delete_router(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.lifecycle().delete(&name, &user).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Re-derive a router's snapshot from its record.
#[utoipa::path(
    post,
    path = "/v1/routers/{name}/reconcile",
    tag = "Routers",
    security(("bearer_auth" = [])),
    params(("name" = String, Path, description = "Router name")),
    responses(
        (status = 200, description = "Snapshot matches the record", body = Router),
        (status = 502, description = "Snapshot write failed again", body = ErrorBody)
    )
)]
pub async fn reconcile_router(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Router>, ApiError> {
    Ok(Json(state.lifecycle().reconcile(&name, &user).await?))
}
