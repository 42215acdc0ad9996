// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Custom provider reached over HTTP.
//!
//! Requests are forwarded as `POST {base}/chat` and `POST {base}/search`
//! with the router name and owner added to the body.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use super::types::{ChatRequest, ChatResponse, SearchRequest, SearchResponse};
use super::ProviderError;
use crate::models::Router;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Serialize)]
struct Forwarded<'a, T> {
    router: &'a str,
    owner: &'a str,
    #[serde(flatten)]
    request: &'a T,
}

#[derive(Debug, Clone)]
pub struct HttpProvider {
    base_url: Url,
    http: Client,
}

impl HttpProvider {
    pub fn new(base_url: &str) -> Result<Self, ProviderError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ProviderError::Upstream(format!("invalid provider URL: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ProviderError::Upstream(format!(
                "provider URL {base_url} cannot be a base"
            )));
        }

        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Upstream(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { base_url, http })
    }

    fn endpoint(&self, name: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push(name);
        }
        url
    }

    async fn forward<T: Serialize, R: DeserializeOwned>(
        &self,
        name: &str,
        router: &Router,
        request: &T,
    ) -> Result<R, ProviderError> {
        let body = Forwarded {
            router: &router.name,
            owner: &router.owner,
            request,
        };

        let response = self
            .http
            .post(self.endpoint(name))
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Upstream(format!("{name} request failed: {e}")))?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::InvalidRequest(format!("{status}: {body}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Upstream(format!(
                "{name} returned {status}: {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::Upstream(format!("invalid {name} response: {e}")))
    }

    pub async fn chat(&self, router: &Router, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        self.forward("chat", router, request).await
    }

    pub async fn search(
        &self,
        router: &Router,
        request: &SearchRequest,
    ) -> Result<SearchResponse, ProviderError> {
        self.forward("search", router, request).await
    }
}
