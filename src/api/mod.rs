// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::HeaderName,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    billing::{AccountInfo, Charge, LedgerTransaction, TransactionStatus},
    error::ErrorBody,
    models::{
        AccessTokenResponse, ChargeType, ControlAction, ControlResponse, CreateRouterRequest,
        DelegateControlRequest, DelegateListResponse, GrantDelegateRequest, PublishRouterRequest,
        PublishedSnapshot, RevokeDelegationResponse, Router as RouterRecord, RouterMetadata,
        RouterStatus, Service, ServiceKind,
    },
    providers::{ChatMessage, ChatRequest, ChatResponse, SearchHit, SearchRequest, SearchResponse},
    state::AppState,
    storage::{AuditRecord, DelegateMarker},
};

pub mod control;
pub mod delegation;
pub mod health;
pub mod payments;
pub mod routers;
pub mod services;

const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route(
            "/routers",
            get(routers::list_routers).post(routers::create_router),
        )
        .route(
            "/routers/{name}",
            get(routers::get_router).delete(routers::delete_router),
        )
        .route("/routers/{name}/publish", post(routers::publish_router))
        .route("/routers/{name}/unpublish", post(routers::unpublish_router))
        .route("/routers/{name}/reconcile", post(routers::reconcile_router))
        .route(
            "/routers/{name}/delegate",
            post(delegation::grant_delegate).delete(delegation::revoke_delegation),
        )
        .route("/routers/{name}/control", post(control::delegate_control))
        .route("/routers/{name}/audit", get(delegation::audit_logs))
        .route("/routers/{name}/chat", post(services::chat))
        .route("/routers/{name}/search", post(services::search))
        .route("/delegates", get(delegation::list_delegates))
        .route(
            "/delegates/me",
            post(delegation::enroll_delegate).delete(delegation::withdraw_delegate),
        )
        .route(
            "/delegates/tokens/{author}/{name}",
            get(delegation::access_token),
        )
        .route("/payments/tokens", post(payments::create_payment_token))
        .route("/payments/account", get(payments::account_info))
        .route("/payments/transactions", get(payments::transaction_history))
        .with_state(state.clone());

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state);

    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .nest("/v1", v1_routes)
        .merge(health_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        routers::create_router,
        routers::list_routers,
        routers::get_router,
        routers::publish_router,
        routers::unpublish_router,
        routers::delete_router,
        routers::reconcile_router,
        delegation::grant_delegate,
        delegation::revoke_delegation,
        delegation::audit_logs,
        delegation::list_delegates,
        delegation::enroll_delegate,
        delegation::withdraw_delegate,
        delegation::access_token,
        control::delegate_control,
        services::chat,
        services::search,
        payments::create_payment_token,
        payments::account_info,
        payments::transaction_history
    ),
    components(
        schemas(
            ErrorBody,
            RouterRecord,
            RouterStatus,
            RouterMetadata,
            Service,
            ServiceKind,
            ChargeType,
            ControlAction,
            PublishedSnapshot,
            CreateRouterRequest,
            PublishRouterRequest,
            GrantDelegateRequest,
            RevokeDelegationResponse,
            DelegateControlRequest,
            ControlResponse,
            AccessTokenResponse,
            DelegateListResponse,
            DelegateMarker,
            AuditRecord,
            ChatMessage,
            ChatRequest,
            ChatResponse,
            SearchRequest,
            SearchHit,
            SearchResponse,
            Charge,
            AccountInfo,
            LedgerTransaction,
            TransactionStatus,
            routers::RouterListResponse,
            services::ChatResult,
            services::SearchResult,
            payments::CreatePaymentTokenRequest,
            payments::PaymentTokenResponse,
            payments::TransactionHistoryResponse,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Routers", description = "Router records and publication"),
        (name = "Delegation", description = "Delegate grants, control actions and audit"),
        (name = "Services", description = "Metered chat and search"),
        (name = "Payments", description = "Ledger tokens, balance and history")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    /// Unsigned session JWT; accepted because test state runs in development mode.
    fn session(user_id: &str) -> String {
        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let claims = URL_SAFE_NO_PAD
            .encode(format!(r#"{{"sub":"{user_id}","exp":9999999999}}"#).as_bytes());
        format!("{header}.{claims}.unsigned")
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        user: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header("Authorization", format!("Bearer {}", session(user)));
        }
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    fn app(temp: &TempDir) -> (AppState, Router) {
        let state = AppState::for_tests(temp.path());
        (state.clone(), router(state))
    }

    fn write_project(state: &AppState, name: &str) {
        let dir = state.storage.paths().project_dir(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("README.md"), "pricing guide for the router").unwrap();
    }

    #[tokio::test]
    async fn health_reports_backends() {
        let temp = TempDir::new().unwrap();
        let (_state, app) = app(&temp);

        let (status, body) = send(&app, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"]["storage"], "ok");
        assert_eq!(body["checks"]["ledger"], "memory");
        assert_eq!(body["checks"]["provider"], "builtin");
        assert_eq!(body["checks"]["auth"], "development");
    }

    #[tokio::test]
    async fn openapi_document_is_served() {
        let temp = TempDir::new().unwrap();
        let (_state, app) = app(&temp);

        let (status, body) = send(&app, "GET", "/api-doc/openapi.json", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"]["/v1/routers/{name}/control"].is_object());
    }

    #[tokio::test]
    async fn requests_without_session_are_rejected() {
        let temp = TempDir::new().unwrap();
        let (_state, app) = app(&temp);

        let (status, body) = send(&app, "GET", "/v1/routers", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error_code"], "missing_auth_header");
    }

    #[tokio::test]
    async fn only_server_owner_creates_routers() {
        let temp = TempDir::new().unwrap();
        let (_state, app) = app(&temp);

        let body = json!({ "name": "r1", "services": [] });
        let (status, body) = send(&app, "POST", "/v1/routers", Some("bob@x"), Some(body)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error_code"], "not_owner");
    }

    #[tokio::test]
    async fn delegation_round_trip_over_http() {
        let temp = TempDir::new().unwrap();
        let (state, app) = app(&temp);
        let alice = Some("alice@x");
        let bob = Some("bob@x");

        let create = json!({
            "name": "r1",
            "services": [{ "type": "chat", "enabled": true, "pricing": 1.0 }]
        });
        let (status, _) = send(&app, "POST", "/v1/routers", alice, Some(create)).await;
        assert_eq!(status, StatusCode::CREATED);

        write_project(&state, "r1");
        let (status, body) = send(&app, "POST", "/v1/routers/r1/publish", alice, Some(json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "published");

        let (status, _) = send(&app, "POST", "/v1/delegates/me", bob, None).await;
        assert_eq!(status, StatusCode::CREATED);

        let grant = json!({ "delegate_email": "bob@x" });
        let (status, body) = send(&app, "POST", "/v1/routers/r1/delegate", alice, Some(grant.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["metadata"]["delegate_email"], "bob@x");

        let (status, body) = send(&app, "POST", "/v1/routers/r1/delegate", alice, Some(grant)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error_code"], "already_delegated");

        let (status, body) = send(&app, "GET", "/v1/delegates/tokens/alice@x/r1", bob, None).await;
        assert_eq!(status, StatusCode::OK);
        let token = body["access_token"].as_str().unwrap().to_string();

        let (status, _) = send(&app, "GET", "/v1/delegates/tokens/alice@x/r1", Some("carol@x"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let control = json!({
            "control_type": "UpdatePricing",
            "control_data": { "chat": 0.5 },
            "access_token": token,
            "reason": "promo"
        });
        let (status, body) = send(&app, "POST", "/v1/routers/r1/control", bob, Some(control.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let (status, body) = send(&app, "GET", "/v1/routers/r1/audit", alice, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (status, body) = send(&app, "POST", "/v1/routers/r1/unpublish", alice, None).await;
        assert_eq!(status, StatusCode::PRECONDITION_FAILED);
        assert_eq!(body["error_code"], "still_delegated");

        let (status, body) = send(&app, "DELETE", "/v1/routers/r1/delegate", alice, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["delegate_email"], "bob@x");

        let (status, body) = send(&app, "POST", "/v1/routers/r1/control", bob, Some(control)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error_code"], "not_delegated_to_you");

        let (status, body) = send(&app, "POST", "/v1/routers/r1/unpublish", alice, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "unpublished");
    }

    #[tokio::test]
    async fn paid_chat_over_http() {
        let temp = TempDir::new().unwrap();
        let (state, app) = app(&temp);
        let alice = Some("alice@x");
        let bob = Some("bob@x");

        let create = json!({
            "name": "r1",
            "services": [{ "type": "chat", "enabled": true, "pricing": 2.5 }]
        });
        send(&app, "POST", "/v1/routers", alice, Some(create)).await;
        write_project(&state, "r1");
        send(&app, "POST", "/v1/routers/r1/publish", alice, Some(json!({}))).await;

        let chat = json!({ "messages": [{ "role": "user", "content": "hello" }] });
        let (status, body) = send(&app, "POST", "/v1/routers/r1/chat", bob, Some(chat.clone())).await;
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(body["error_code"], "payment_required");

        let (status, body) = send(
            &app,
            "POST",
            "/v1/payments/tokens",
            bob,
            Some(json!({ "recipient": "alice@x" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let token = body["token"].as_str().unwrap().to_string();

        let request = Request::builder()
            .method("POST")
            .uri("/v1/routers/r1/chat")
            .header("Authorization", format!("Bearer {}", session("bob@x")))
            .header("Content-Type", "application/json")
            .header("X-Payment-Token", token)
            .body(Body::from(chat.to_string()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["response"]["message"]["content"], "[r1] hello");
        assert_eq!(body["charge"]["amount"], 2.5);

        let (status, body) = send(&app, "GET", "/v1/payments/account", bob, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["balance"], 97.5);

        let (status, body) = send(&app, "GET", "/v1/payments/transactions", bob, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        assert_eq!(body["transactions"][0]["status"], "confirmed");
    }
}
