mod detect;
mod registry;

pub use detect::{PaginationFamily, detect_family, extract_items, last_item_id, next_page_args, resolve_has_more};
pub use registry::PaginationRegistry;

use serde_json::Value;
use tokio::sync::Mutex;

use crate::errors::BrokerResult;
use crate::executor::{ExecResult, Executor, ExecutorContext};
use crate::mcp::RuntimeHints;
use crate::model::{Operation, PageCache};

/// Per-ToolInvocation pagination state: the
/// `PageCache` data plus enough context (family, last request args) to
/// reissue the Operation for `fetchNextPage`. Owned by the same runner
/// that owns the invocation's PageCache — never shared across invocations,
/// mutated only by the invocation's owning task.
pub struct PaginatedInvocation {
    pub cache: PageCache,
    family: PaginationFamily,
    last_args: Value,
    /// Enforces "at most one in-flight fetchNextPage per invocation"
    ///: a second caller blocks here
    /// rather than racing a duplicate dispatch.
    in_flight: Mutex<()>,
}

impl PaginatedInvocation {
    /// Build pagination state from the Operation's first successful
    /// response, detecting the family once and caching page 1.
    pub fn from_first_response(first_request_args: Value, first_response_body: &Value) -> Self {
        let family = detect_family(first_response_body, &first_request_args);
        let items = extract_items(first_response_body);
        let returned = items.len();
        let has_more = resolve_has_more(family, first_response_body, returned);
        let cursor = last_item_id(&items);

        let mut cache = PageCache::new();
        cache.push_page(items, cursor, has_more);

        Self {
            cache,
            family,
            last_args: first_request_args,
            in_flight: Mutex::new(()),
        }
    }

    pub fn family(&self) -> PaginationFamily {
        self.family
    }

    pub fn has_more(&self) -> bool {
        self.cache.has_more
    }

    /// Reissues `op` under the
    /// same identity and credentials via `executor`, overriding only
    /// pagination-related arguments, then appends the result into the
    /// cache at `cachedPages + 1`. The Model is not re-engaged; callers are
    /// expected to write an ActionRecord flagged `paginated=true` for the
    /// returned `ExecResult` themselves (component C10 owns persistence,
    /// not this type).
    pub async fn fetch_next_page(&mut self, executor: &Executor, op: &Operation, ctx: &ExecutorContext<'_>, hints: Option<&RuntimeHints>) -> BrokerResult<ExecResult> {
        let _guard = self.in_flight.lock().await;

        let last_page_len = self.cache.view_page(self.cache.len() as u32).map(<[Value]>::len).unwrap_or(0);
        let args = next_page_args(self.family, self.cache.cursor.as_deref(), &self.last_args, last_page_len);

        let result = executor.dispatch_http(op, args.clone(), ctx, hints).await?;

        if result.is_success() {
            let items = extract_items(&result.body);
            let returned = items.len();
            let has_more = resolve_has_more(self.family, &result.body, returned);
            let cursor = last_item_id(&items);
            self.cache.push_page(items, cursor, has_more);
            self.last_args = args;
        }

        Ok(result)
    }

    /// Returns the cached page at 1-based index `k`, if present.
    pub fn view_page(&self, k: u32) -> Option<&[Value]> {
        self.cache.view_page(k)
    }

    /// Concatenates all cached pages in index order.
    pub fn view_all(&self) -> Vec<Value> {
        self.cache.view_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn first_response_seeds_cursor_family() {
        let body = json!({"data": [{"id": "a"}, {"id": "b"}], "has_more": true});
        let state = PaginatedInvocation::from_first_response(json!({"limit": 2}), &body);
        assert_eq!(state.family(), PaginationFamily::Cursor);
        assert!(state.has_more());
        assert_eq!(state.view_page(1).unwrap().len(), 2);
        assert_eq!(state.cache.cursor.as_deref(), Some("b"));
    }

    #[test]
    fn no_family_never_reports_more() {
        let body = json!({"status": "ok"});
        let state = PaginatedInvocation::from_first_response(json!({}), &body);
        assert_eq!(state.family(), PaginationFamily::None);
        assert!(!state.has_more());
    }
}
