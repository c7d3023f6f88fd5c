use serde_json::Value;

/// Body field names recognized as the paginated list itself.
const LIST_FIELD_NAMES: &[&str] = &[
    "data", "results", "items", "records", "entries", "list", "rows", "objects",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationFamily {
    /// Stripe-like: `{has_more: true, data: [...]}`, next param `starting_after`.
    Cursor,
    OffsetLimit,
    PageNumber,
    /// No recognized family; `hasMore` is always false.
    None,
}

fn first_list_field(body: &Value) -> Option<&Vec<Value>> {
    let obj = body.as_object()?;
    LIST_FIELD_NAMES
        .iter()
        .find_map(|name| obj.get(*name).and_then(Value::as_array))
}

/// Extract the page's data array, or an empty page if none of the known
/// list field names are present.
pub fn extract_items(body: &Value) -> Vec<Value> {
    first_list_field(body).cloned().unwrap_or_default()
}

pub fn last_item_id(items: &[Value]) -> Option<String> {
    items.last()?.get("id").and_then(Value::as_str).map(String::from)
}

/// Detect which of the three families (in priority order) a response
/// belongs to.
pub fn detect_family(body: &Value, request_args: &Value) -> PaginationFamily {
    let obj = body.as_object();

    let is_cursor = obj
        .map(|o| o.get("has_more").and_then(Value::as_bool) == Some(true))
        .unwrap_or(false)
        && first_list_field(body).is_some();
    if is_cursor {
        return PaginationFamily::Cursor;
    }

    let args_have_offset_limit = request_args.get("limit").is_some() || request_args.get("offset").is_some();
    let body_has_offset_limit = obj.map(|o| o.contains_key("offset") || o.contains_key("limit")).unwrap_or(false);
    if args_have_offset_limit || body_has_offset_limit {
        return PaginationFamily::OffsetLimit;
    }

    let args_have_page = request_args.get("page").is_some();
    let body_has_page = obj.map(|o| o.contains_key("page") || o.contains_key("total_pages")).unwrap_or(false);
    if args_have_page || body_has_page {
        return PaginationFamily::PageNumber;
    }

    PaginationFamily::None
}

/// Whether a further page is expected, given the family and the response
/// that was just fetched.
pub fn resolve_has_more(family: PaginationFamily, body: &Value, returned: usize) -> bool {
    match family {
        PaginationFamily::Cursor => body.get("has_more").and_then(Value::as_bool).unwrap_or(false),
        PaginationFamily::OffsetLimit => match (
            body.get("offset").and_then(Value::as_u64),
            body.get("total").and_then(Value::as_u64),
        ) {
            (Some(offset), Some(total)) => offset + returned as u64 < total,
            _ => returned > 0,
        },
        PaginationFamily::PageNumber => match (
            body.get("page").and_then(Value::as_u64),
            body.get("total_pages").and_then(Value::as_u64),
        ) {
            (Some(page), Some(total_pages)) => page < total_pages,
            _ => returned > 0,
        },
        PaginationFamily::None => false,
    }
}

/// Build the argument set for the next page's fetch: override only the
/// pagination-related keys, leaving everything else from `prior_args`
/// untouched.
pub fn next_page_args(
    family: PaginationFamily,
    last_cursor: Option<&str>,
    prior_args: &Value,
    last_returned: usize,
) -> Value {
    let mut map = prior_args.as_object().cloned().unwrap_or_default();
    match family {
        PaginationFamily::Cursor => {
            if let Some(cursor) = last_cursor {
                map.insert("starting_after".to_string(), Value::String(cursor.to_string()));
            }
        }
        PaginationFamily::OffsetLimit => {
            let current_offset = prior_args.get("offset").and_then(Value::as_u64).unwrap_or(0);
            map.insert("offset".to_string(), Value::from(current_offset + last_returned as u64));
        }
        PaginationFamily::PageNumber => {
            let current_page = prior_args.get("page").and_then(Value::as_u64).unwrap_or(1);
            map.insert("page".to_string(), Value::from(current_page + 1));
        }
        PaginationFamily::None => {}
    }
    Value::Object(map)
}
