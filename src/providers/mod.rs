// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Service Providers
//!
//! Chat and search implementations behind a router. The provider is chosen
//! once at startup: the built-in provider, or a custom upstream reached at
//! `PROVIDER_URL`. A router whose service is missing or disabled yields
//! [`ProviderError::Disabled`], never a generic failure.

pub mod builtin;
pub mod http;
pub mod types;

pub use builtin::BuiltinProvider;
pub use http::HttpProvider;
pub use types::{ChatMessage, ChatRequest, ChatResponse, SearchHit, SearchRequest, SearchResponse};

use crate::models::{Router, ServiceKind};

/// Provider failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("{0} service is disabled")]
    Disabled(ServiceKind),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("upstream failure: {0}")]
    Upstream(String),
}

/// Provider selected at startup.
#[derive(Debug)]
pub enum Provider {
    Builtin(BuiltinProvider),
    Http(HttpProvider),
}

/// Fails with `Disabled` unless `router` offers `kind` and it is enabled.
pub fn ensure_enabled(router: &Router, kind: ServiceKind) -> Result<(), ProviderError> {
    match router.service(kind) {
        Some(service) if service.enabled => Ok(()),
        _ => Err(ProviderError::Disabled(kind)),
    }
}

impl Provider {
    pub fn kind(&self) -> &'static str {
        match self {
            Provider::Builtin(_) => "builtin",
            Provider::Http(_) => "http",
        }
    }

    pub async fn chat(&self, router: &Router, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        ensure_enabled(router, ServiceKind::Chat)?;
        request.validate()?;
        match self {
            Provider::Builtin(p) => p.chat(router, request),
            Provider::Http(p) => p.chat(router, request).await,
        }
    }

    pub async fn search(
        &self,
        router: &Router,
        request: &SearchRequest,
    ) -> Result<SearchResponse, ProviderError> {
        ensure_enabled(router, ServiceKind::Search)?;
        request.validate()?;
        match self {
            Provider::Builtin(p) => p.search(router, request),
            Provider::Http(p) => p.search(router, request).await,
        }
    }
}
