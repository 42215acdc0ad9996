// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Priced service invocation.
//!
//! A caller invokes a published router's chat or search service. The
//! router's provider runs inside the metered payment transaction: the price
//! is the service's configured pricing and the payment goes to the router's
//! owner.

use crate::auth::AuthenticatedUser;
use crate::billing::metered::{self, Charge, MeteredRequest};
use crate::billing::LedgerClient;
use crate::error::ControlError;
use crate::lifecycle::Lifecycle;
use crate::models::{Router, ServiceKind};
use crate::providers::{
    ensure_enabled, ChatRequest, ChatResponse, Provider, SearchRequest, SearchResponse,
};

pub struct ServiceInvoker<'a, L> {
    lifecycle: Lifecycle<'a>,
    ledger: &'a L,
    provider: &'a Provider,
}

impl<'a, L: LedgerClient> ServiceInvoker<'a, L> {
    pub fn new(lifecycle: Lifecycle<'a>, ledger: &'a L, provider: &'a Provider) -> Self {
        Self {
            lifecycle,
            ledger,
            provider,
        }
    }

    /// Published router offering `kind`, with that service's price.
    fn priced(&self, router_name: &str, kind: ServiceKind) -> Result<(Router, f64), ControlError> {
        let router = self.lifecycle.load(router_name)?;
        if !router.is_published() {
            return Err(ControlError::NotPublished(router.name));
        }
        ensure_enabled(&router, kind)?;
        let price = router.service(kind).map(|s| s.pricing).unwrap_or_default();
        Ok((router, price))
    }

    pub async fn chat(
        &self,
        router_name: &str,
        caller: &AuthenticatedUser,
        request: &ChatRequest,
        payment_token: Option<&str>,
    ) -> Result<(ChatResponse, Charge), ControlError> {
        let (router, price) = self.priced(router_name, ServiceKind::Chat)?;
        request.validate()?;

        metered::run(
            self.ledger,
            MeteredRequest {
                payer: &caller.user_id,
                recipient: &router.owner,
                price,
                payment_token,
            },
            || self.provider.chat(&router, request),
        )
        .await
    }

    pub async fn search(
        &self,
        router_name: &str,
        caller: &AuthenticatedUser,
        request: &SearchRequest,
        payment_token: Option<&str>,
    ) -> Result<(SearchResponse, Charge), ControlError> {
        let (router, price) = self.priced(router_name, ServiceKind::Search)?;
        request.validate()?;

        metered::run(
            self.ledger,
            MeteredRequest {
                payer: &caller.user_id,
                recipient: &router.owner,
                price,
                payment_token,
            },
            || self.provider.search(&router, request),
        )
        .await
    }
}
