// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Error taxonomy of the control plane and its HTTP rendering.
//!
//! Every failure carries a stable [`ErrorKind`] and a snake_case code. None
//! of them is fatal to the process.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::billing::LedgerError;
use crate::capability::TokenError;
use crate::models::ServiceKind;
use crate::providers::ProviderError;
use crate::storage::StorageError;

/// Error categories surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Unauthorized,
    PreconditionFailed,
    PaymentRequired,
    UpstreamFailure,
    BadRequest,
}

/// Errors of control-plane operations.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("Router {0} is already published")]
    AlreadyPublished(String),

    #[error("Router {router} is already delegated to {delegate}")]
    AlreadyDelegated { router: String, delegate: String },

    #[error("Access token is invalid")]
    InvalidToken,

    #[error("Router is not delegated to you")]
    NotDelegatedToYou,

    #[error("Invalid delegate: {0}")]
    InvalidDelegate(String),

    #[error("Only the router owner may do this")]
    NotOwner,

    #[error("Router {0} is not published")]
    NotPublished(String),

    #[error("Router {0} is still delegated; revoke the delegation first")]
    StillDelegated(String),

    #[error("Router {0} has no active delegate")]
    NotDelegated(String),

    #[error("Project for router {0} does not exist")]
    ProjectMissing(String),

    #[error("The {0} service is disabled")]
    ServiceDisabled(ServiceKind),

    #[error("Payment required: a payment token must be supplied")]
    PaymentRequired,

    #[error("Unsupported control action: {0}")]
    UnsupportedAction(String),

    #[error("Invalid control payload: {0}")]
    BadPayload(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("The operation produced no result")]
    EmptyResult,

    #[error("Router {router} record was written but its published snapshot was not: {detail}; reconcile required")]
    SnapshotDiverged { router: String, detail: String },

    #[error("Storage failure: {0}")]
    Storage(#[from] StorageError),

    #[error("Ledger failure: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Provider failure: {0}")]
    Provider(ProviderError),

    #[error("Token failure: {0}")]
    Token(#[from] TokenError),
}

impl From<ProviderError> for ControlError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::Disabled(kind) => ControlError::ServiceDisabled(kind),
            other => ControlError::Provider(other),
        }
    }
}

impl ControlError {
    /// Taxonomy category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ControlError::NotFound(_) | ControlError::Storage(StorageError::NotFound(_)) => {
                ErrorKind::NotFound
            }
            ControlError::Storage(StorageError::AlreadyExists(_)) => ErrorKind::Conflict,
            ControlError::Storage(StorageError::PermissionDenied { .. }) => ErrorKind::Unauthorized,
            ControlError::AlreadyExists(_)
            | ControlError::AlreadyPublished(_)
            | ControlError::AlreadyDelegated { .. } => ErrorKind::Conflict,
            ControlError::InvalidToken
            | ControlError::NotDelegatedToYou
            | ControlError::InvalidDelegate(_)
            | ControlError::NotOwner => ErrorKind::Unauthorized,
            ControlError::NotPublished(_)
            | ControlError::StillDelegated(_)
            | ControlError::NotDelegated(_)
            | ControlError::ProjectMissing(_)
            | ControlError::ServiceDisabled(_) => ErrorKind::PreconditionFailed,
            ControlError::PaymentRequired => ErrorKind::PaymentRequired,
            ControlError::Ledger(e) if e.is_payment_rejection() => ErrorKind::PaymentRequired,
            ControlError::UnsupportedAction(_)
            | ControlError::BadPayload(_)
            | ControlError::InvalidRequest(_) => ErrorKind::BadRequest,
            ControlError::Provider(ProviderError::InvalidRequest(_)) => ErrorKind::BadRequest,
            ControlError::SnapshotDiverged { .. }
            | ControlError::EmptyResult
            | ControlError::Storage(_)
            | ControlError::Ledger(_)
            | ControlError::Provider(_)
            | ControlError::Token(_) => ErrorKind::UpstreamFailure,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ControlError::NotFound(_) => "not_found",
            ControlError::AlreadyExists(_) => "already_exists",
            ControlError::AlreadyPublished(_) => "already_published",
            ControlError::AlreadyDelegated { .. } => "already_delegated",
            ControlError::InvalidToken => "invalid_token",
            ControlError::NotDelegatedToYou => "not_delegated_to_you",
            ControlError::InvalidDelegate(_) => "invalid_delegate",
            ControlError::NotOwner => "not_owner",
            ControlError::NotPublished(_) => "not_published",
            ControlError::StillDelegated(_) => "still_delegated",
            ControlError::NotDelegated(_) => "not_delegated",
            ControlError::ProjectMissing(_) => "project_missing",
            ControlError::ServiceDisabled(_) => "service_disabled",
            ControlError::PaymentRequired => "payment_required",
            ControlError::UnsupportedAction(_) => "unsupported_action",
            ControlError::BadPayload(_) => "bad_payload",
            ControlError::InvalidRequest(_) => "invalid_request",
            ControlError::EmptyResult => "empty_result",
            ControlError::SnapshotDiverged { .. } => "snapshot_diverged",
            ControlError::Storage(StorageError::NotFound(_)) => "not_found",
            ControlError::Storage(StorageError::AlreadyExists(_)) => "already_exists",
            ControlError::Storage(StorageError::PermissionDenied { .. }) => "permission_denied",
            ControlError::Storage(_) => "storage_failure",
            ControlError::Ledger(e) if e.is_payment_rejection() => "payment_rejected",
            ControlError::Ledger(_) => "ledger_failure",
            ControlError::Provider(_) => "provider_failure",
            ControlError::Token(_) => "token_failure",
        }
    }
}

impl ErrorKind {
    /// HTTP status for this category.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Unauthorized => StatusCode::FORBIDDEN,
            ErrorKind::PreconditionFailed => StatusCode::PRECONDITION_FAILED,
            ErrorKind::PaymentRequired => StatusCode::PAYMENT_REQUIRED,
            ErrorKind::UpstreamFailure => StatusCode::BAD_GATEWAY,
            ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
        }
    }
}

/// Error returned by HTTP handlers.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    error: String,
    error_code: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }
}

impl From<ControlError> for ApiError {
    fn from(e: ControlError) -> Self {
        let kind = e.kind();
        if kind == ErrorKind::UpstreamFailure {
            tracing::error!(error = %e, code = e.code(), "Upstream failure");
        }
        Self::new(kind.status_code(), e.code(), e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
            error_code: self.code,
        });
        (self.status, body).into_response()
    }
}
