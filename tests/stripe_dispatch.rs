//! Cleaning empty-string args, form-encoding a vendor body, and setting the
//! vendor content type, verified against a real HTTP request/response round
//! trip rather than unit-level helpers.

mod common;

use std::collections::HashMap;

use actionbroker::adapters::{AdapterRegistry, ContentType, VendorAdapter};
use actionbroker::executor::{Executor, ExecutorContext};
use actionbroker::mcp::{ListExpansionHint, RuntimeHints};
use actionbroker::model::{AuthKind, Method, RiskLevel};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Stands in for the built-in Stripe adapter against a
/// wiremock host rather than `api.stripe.com`. `StripeAdapter` itself is
/// already exercised at the unit level in `adapters::stripe`; this
/// confirms the *pipeline* - clean → adapter → body encode → dispatch -
/// actually wires a form-encoding adapter through `Executor::dispatch_http`.
struct FormAdapter;

impl VendorAdapter for FormAdapter {
    fn matches(&self, _base_url: &str) -> bool {
        true
    }

    fn content_type(&self) -> ContentType {
        ContentType::FormUrlEncoded
    }
}

#[tokio::test]
async fn empty_string_dropped_and_body_form_encoded() {
    common::allow_loopback();
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/customers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cus_123",
            "object": "customer",
            "name": "Bob"
        })))
        .mount(&mock_server)
        .await;

    let src = common::source(&mock_server.uri(), AuthKind::Bearer);
    let cred = common::credential(Uuid::new_v4(), src.id);
    let op = common::op_with_params(src.id, Method::Post, "/v1/customers", &[], RiskLevel::Safe, false);

    let mut registry = AdapterRegistry::new();
    registry.register(Box::new(FormAdapter));
    let executor = Executor::new(registry, 50);
    let ctx = ExecutorContext { source: &src, credential: &cred, user_id: cred.user_id };

    let result = executor
        .dispatch_http(&op, json!({"email": "", "name": "Bob"}), &ctx, None)
        .await
        .expect("dispatch should succeed");

    assert!(result.is_success());
    assert_eq!(result.status, 200);
    assert_eq!(result.body["id"], "cus_123");

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let req = &requests[0];

    let content_type = req.headers.get("content-type").map(|v| v.to_str().unwrap()).unwrap_or_default();
    assert!(content_type.contains("application/x-www-form-urlencoded"), "got {content_type}");

    let body = String::from_utf8(req.body.clone()).unwrap();
    assert!(body.contains("name=Bob"), "body was: {body}");
    assert!(!body.contains("email"), "empty email should have been cleaned: {body}");

    let auth = req.headers.get("authorization").map(|v| v.to_str().unwrap()).unwrap_or_default();
    assert_eq!(auth, "Bearer sk_test_abc123");
}

#[tokio::test]
async fn non_2xx_status_surfaces_as_error_message() {
    common::allow_loopback();
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/customers/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": {"message": "No such customer"}})))
        .mount(&mock_server)
        .await;

    let src = common::source(&mock_server.uri(), AuthKind::Bearer);
    let cred = common::credential(Uuid::new_v4(), src.id);
    let op = common::op_with_params(src.id, Method::Get, "/v1/customers/missing", &[], RiskLevel::Safe, false);

    let executor = Executor::new(AdapterRegistry::default(), 50);
    let ctx = ExecutorContext { source: &src, credential: &cred, user_id: cred.user_id };

    let result = executor.dispatch_http(&op, json!({}), &ctx, None).await.expect("dispatch itself must not error");

    assert_eq!(result.status, 404);
    assert!(!result.is_success());
    assert!(result.error_message.is_some());
    assert!(result.error_message.unwrap().starts_with("HTTP 404"));
}

/// Adapter headers should be layered on top of the auth header, not
/// replace it, and path/query parameters should still be excluded from
/// the JSON body for the default (non-form) content type.
#[tokio::test]
async fn default_adapter_sends_json_and_separates_query_from_body() {
    common::allow_loopback();
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/subscriptions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [], "has_more": false})))
        .mount(&mock_server)
        .await;

    let src = common::source(&mock_server.uri(), AuthKind::ApiKey);
    let cred = common::credential(Uuid::new_v4(), src.id);
    let op = common::op_with_params(
        src.id,
        Method::Get,
        "/v1/subscriptions",
        &[("limit", actionbroker::model::ParamLocation::Query)],
        RiskLevel::Safe,
        false,
    );

    let executor = Executor::new(AdapterRegistry::default(), 50);
    let ctx = ExecutorContext { source: &src, credential: &cred, user_id: cred.user_id };

    let result = executor.dispatch_http(&op, json!({"limit": "3"}), &ctx, None).await.unwrap();
    assert!(result.is_success());

    let requests = mock_server.received_requests().await.unwrap();
    let req = &requests[0];
    assert_eq!(req.url.query(), Some("limit=3"));
    // ApiKey auth defaults to X-API-Key; header names arrive lower-cased on the wire.
    let headers: HashMap<String, String> = req
        .headers
        .iter()
        .map(|(k, v)| (k.as_str().to_lowercase(), v.to_str().unwrap().to_string()))
        .collect();
    assert_eq!(headers.get("x-api-key").map(String::as_str), Some("sk_test_abc123"));
}

/// A list_expansion template hint must inject its default `expand` value
/// into an HTTP list call the same way it already does on the MCP branch -
/// `dispatch_http` applies `RuntimeHints.pre_process_args` ahead of the
/// adapter and URL builder, gated on the glob against the Operation's
/// tool name.
#[tokio::test]
async fn list_expansion_hint_injects_expand_on_http_list_call() {
    common::allow_loopback();
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/subscriptions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [], "has_more": false})))
        .mount(&mock_server)
        .await;

    let src = common::source(&mock_server.uri(), AuthKind::ApiKey);
    let cred = common::credential(Uuid::new_v4(), src.id);
    let mut op = common::op_with_params(
        src.id,
        Method::Get,
        "/v1/subscriptions",
        &[("expand", actionbroker::model::ParamLocation::Query)],
        RiskLevel::Safe,
        false,
    );
    op.display_name = "list_subscriptions".into();

    let hints = RuntimeHints {
        list_expansion: Some(ListExpansionHint {
            tool_name_glob: "list_*".into(),
            defaults: json!({"expand": ["data.customer"]}),
        }),
        ..RuntimeHints::default()
    };

    let executor = Executor::new(AdapterRegistry::default(), 50);
    let ctx = ExecutorContext { source: &src, credential: &cred, user_id: cred.user_id };

    let result = executor.dispatch_http(&op, json!({}), &ctx, Some(&hints)).await.unwrap();
    assert!(result.is_success());

    let requests = mock_server.received_requests().await.unwrap();
    let req = &requests[0];
    let query = req.url.query().unwrap_or_default();
    assert!(query.contains("expand"), "expected injected expand param, got query: {query}");
}
