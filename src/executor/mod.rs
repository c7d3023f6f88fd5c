pub mod clean;
pub mod headers;
pub mod summarize;
pub mod url_builder;

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::{Duration, Instant};

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::Client;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::adapters::{AdapterRegistry, ContentType, encode_form_body};
use crate::errors::{BrokerError, BrokerResult};
use crate::mcp::RuntimeHints;
use crate::model::{Credential, Method, Operation, Source};
use crate::utils::{truncate_with_marker, validate_url};

pub use clean::{clean_args, deep_clean_schema};
pub use headers::{build_auth_headers, mock_user_header};
pub use summarize::{ERR_CAP, LLM_SUMMARY_CAP, summarize_error, summarize_success};
pub use url_builder::{build_body, build_url};

/// Connection timeout and overall deadline for a single upstream dispatch
///.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of one Executor dispatch, HTTP or MCP.
#[derive(Debug, Clone)]
pub struct ExecResult {
    pub url: String,
    pub status: u16,
    pub body: Value,
    pub duration_ms: u64,
    pub error_message: Option<String>,
}

impl ExecResult {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Everything the Executor needs to dispatch one Operation, replacing the
/// closure-captured state of a typical `execute()` tool function.
pub struct ExecutorContext<'a> {
    pub source: &'a Source,
    pub credential: &'a Credential,
    pub user_id: Uuid,
}

/// Dispatches a selected Operation's HTTP branch.
/// The MCP branch is handled by `crate::mcp` and is not owned
/// by this type — the Executor only knows how to talk HTTP.
pub struct Executor {
    http: Client,
    adapters: AdapterRegistry,
    per_source_quota: Quota,
    rate_limiters: StdMutex<HashMap<Uuid, Arc<DefaultDirectRateLimiter>>>,
}

impl Executor {
    /// `requests_per_second` bounds how often one Source is dispatched
    /// against concurrently, independent of any quota the upstream itself
    /// enforces — a broker-side backstop against a single misbehaving Agent
    /// hammering a shared Source.
    pub fn new(adapters: AdapterRegistry, requests_per_second: u32) -> Self {
        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client with rustls-tls backend must build");
        let qps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::new(5).unwrap());
        Self {
            http,
            adapters,
            per_source_quota: Quota::per_second(qps),
            rate_limiters: StdMutex::new(HashMap::new()),
        }
    }

    async fn throttle(&self, source_id: Uuid) {
        let limiter = {
            let mut limiters = self.rate_limiters.lock().expect("rate limiter mutex poisoned");
            limiters
                .entry(source_id)
                .or_insert_with(|| Arc::new(RateLimiter::direct(self.per_source_quota)))
                .clone()
        };
        limiter.until_ready().await;
    }

    /// Clean args, apply template hints and adapter hooks, build
    /// URL/headers/body, dispatch, and summarize the response.
    ///
    /// `hints` is the Source's `RuntimeHints` (if any), resolved by the
    /// caller via `CatalogStore::hints_for_source`. A `list_expansion`
    /// hint whose glob matches this Operation's name has its defaults
    /// merged into `args` before the adapter or URL builder ever see
    /// them, the same way the MCP branch applies hints ahead of dispatch.
    pub async fn dispatch_http(&self, op: &Operation, args: Value, ctx: &ExecutorContext<'_>, hints: Option<&RuntimeHints>) -> BrokerResult<ExecResult> {
        let start = Instant::now();
        let adapter = self.adapters.resolve(&ctx.source.base_url);

        let cleaned = clean_args(&args);
        let tool_name = op.mcp_tool_name.as_deref().unwrap_or(op.display_name.as_str());
        let cleaned = match hints {
            Some(h) => h.pre_process_args(tool_name, cleaned),
            None => cleaned,
        };
        let cleaned = adapter.before_request(cleaned, op, ctx.source);

        let url = build_url(ctx.source.base_url_trimmed(), &op.path, &op.parameter_schema, &cleaned);
        validate_url(&url).map_err(BrokerError::Forbidden)?;

        let body = if matches!(op.method, Method::Post | Method::Put | Method::Patch | Method::Delete) {
            build_body(&cleaned, &op.parameter_schema, op.request_body_schema.as_ref())
        } else {
            None
        };

        let mut header_map = build_auth_headers(ctx.source, ctx.credential)?;
        header_map.insert("Accept".to_string(), "application/json".to_string());
        if body.is_some() {
            let content_type = match adapter.content_type() {
                ContentType::Json => "application/json",
                ContentType::FormUrlEncoded => "application/x-www-form-urlencoded",
            };
            header_map.insert("Content-Type".to_string(), content_type.to_string());
        }
        for (name, value) in adapter.get_headers(ctx.source, ctx.credential) {
            header_map.insert(name, value);
        }
        let (mock_name, mock_value) = mock_user_header(ctx.user_id);
        header_map.insert(mock_name, mock_value);

        self.throttle(ctx.source.id).await;
        let raw = self
            .send_with_one_retry(op.method, &url, &header_map, body.as_ref(), adapter.content_type())
            .await?;

        let duration_ms = start.elapsed().as_millis() as u64;
        let status = raw.status().as_u16();

        let text = raw.text().await.map_err(|e| BrokerError::UpstreamTransport(e.to_string()))?;

        // JSON content parses to structured data regardless of what the
        // upstream's Content-Type header claims; anything else (or JSON
        // that fails to parse, e.g. truncated/mislabeled) falls back to
        // the uniform `{text: ...}` shape.
        let mut parsed_body = match serde_json::from_str::<Value>(&text) {
            Ok(v) => v,
            Err(_) => serde_json::json!({ "text": truncate_with_marker(&text, ERR_CAP) }),
        };
        parsed_body = adapter.after_response(parsed_body, op, ctx.source);

        let error_message = if (200..300).contains(&status) {
            info!(method = op.method.as_str(), url = %url, status, duration_ms, "executor dispatch ok");
            None
        } else {
            warn!(method = op.method.as_str(), url = %url, status, duration_ms, "executor dispatch failed");
            Some(summarize_error(status, &parsed_body.to_string()))
        };

        Ok(ExecResult {
            url,
            status,
            body: parsed_body,
            duration_ms,
            error_message,
        })
    }

    /// A single transport error within one dispatch may retry once
    /// before surfacing
    /// `upstream_transport_error`.
    async fn send_with_one_retry(
        &self,
        method: Method,
        url: &str,
        headers: &HashMap<String, String>,
        body: Option<&Value>,
        content_type: ContentType,
    ) -> BrokerResult<reqwest::Response> {
        match self.send_once(method, url, headers, body, content_type).await {
            Ok(response) => Ok(response),
            Err(_) => self
                .send_once(method, url, headers, body, content_type)
                .await
                .map_err(|e| BrokerError::UpstreamTransport(e.to_string())),
        }
    }

    async fn send_once(
        &self,
        method: Method,
        url: &str,
        headers: &HashMap<String, String>,
        body: Option<&Value>,
        content_type: ContentType,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let mut builder = self.http.request(reqwest_method(method), url);
        for (name, value) in headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = body {
            builder = match content_type {
                ContentType::Json => builder.json(body),
                ContentType::FormUrlEncoded => builder.body(encode_form_body(body)),
            };
        }
        builder.send().await
    }
}

fn reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
        Method::Head => reqwest::Method::HEAD,
        Method::Options => reqwest::Method::OPTIONS,
        Method::Mcp => reqwest::Method::POST,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exec_result_success_range() {
        let ok = ExecResult {
            url: "x".into(),
            status: 204,
            body: Value::Null,
            duration_ms: 1,
            error_message: None,
        };
        assert!(ok.is_success());
        let err = ExecResult { status: 404, ..ok };
        assert!(!err.is_success());
    }

    #[test]
    fn reqwest_method_maps_mcp_to_post() {
        assert_eq!(reqwest_method(Method::Mcp), reqwest::Method::POST);
        assert_eq!(reqwest_method(Method::Get), reqwest::Method::GET);
    }
}
