use serde_json::Value;

use super::{ContentType, VendorAdapter};

/// Built-in Stripe adapter. Stripe's API takes
/// `application/x-www-form-urlencoded` bodies with bracket-notation nesting:
/// `parent[child]=v`, arrays as `parent[0]=v`, objects-in-arrays as
/// `parent[0][child]=v`. Null/undefined values are skipped entirely.
pub struct StripeAdapter;

impl VendorAdapter for StripeAdapter {
    fn matches(&self, base_url: &str) -> bool {
        base_url.contains("api.stripe.com")
    }

    fn content_type(&self) -> ContentType {
        ContentType::FormUrlEncoded
    }
}

/// Flatten a JSON object into Stripe's bracket-notation `(key, value)` pairs.
pub fn encode_form(value: &Value) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    flatten(value, None, &mut pairs);
    pairs
}

/// Render the flattened pairs as a `x-www-form-urlencoded` body string.
pub fn encode_form_body(value: &Value) -> String {
    let pairs = encode_form(value);
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (k, v) in &pairs {
        serializer.append_pair(k, v);
    }
    serializer.finish()
}

fn flatten(value: &Value, prefix: Option<&str>, out: &mut Vec<(String, String)>) {
    match value {
        Value::Null => {}
        Value::Object(map) => {
            for (key, val) in map {
                let next_prefix = match prefix {
                    Some(p) => format!("{p}[{key}]"),
                    None => key.clone(),
                };
                flatten(val, Some(&next_prefix), out);
            }
        }
        Value::Array(arr) => {
            for (idx, val) in arr.iter().enumerate() {
                let next_prefix = match prefix {
                    Some(p) => format!("{p}[{idx}]"),
                    None => idx.to_string(),
                };
                flatten(val, Some(&next_prefix), out);
            }
        }
        Value::String(s) => {
            if let Some(p) = prefix {
                out.push((p.to_string(), s.clone()));
            }
        }
        Value::Bool(b) => {
            if let Some(p) = prefix {
                out.push((p.to_string(), b.to_string()));
            }
        }
        Value::Number(n) => {
            if let Some(p) = prefix {
                out.push((p.to_string(), n.to_string()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn matches_stripe_host_only() {
        assert!(StripeAdapter.matches("https://api.stripe.com/v1/customers"));
        assert!(!StripeAdapter.matches("https://api.example.com"));
    }

    #[test]
    fn flat_object_encodes_plainly() {
        let pairs = encode_form(&json!({"name": "Ada", "email": "ada@example.com"}));
        assert!(pairs.contains(&("name".to_string(), "Ada".to_string())));
        assert!(pairs.contains(&("email".to_string(), "ada@example.com".to_string())));
    }

    #[test]
    fn nested_object_uses_bracket_notation() {
        let pairs = encode_form(&json!({"metadata": {"order_id": "123"}}));
        assert_eq!(pairs, vec![("metadata[order_id]".to_string(), "123".to_string())]);
    }

    #[test]
    fn array_uses_index_bracket_notation() {
        let pairs = encode_form(&json!({"items": ["a", "b"]}));
        assert_eq!(
            pairs,
            vec![
                ("items[0]".to_string(), "a".to_string()),
                ("items[1]".to_string(), "b".to_string()),
            ]
        );
    }

    #[test]
    fn object_in_array_nests_both_brackets() {
        let pairs = encode_form(&json!({"items": [{"price": "10"}]}));
        assert_eq!(pairs, vec![("items[0][price]".to_string(), "10".to_string())]);
    }

    #[test]
    fn null_values_are_skipped() {
        let pairs = encode_form(&json!({"name": "Ada", "nickname": null}));
        assert_eq!(pairs, vec![("name".to_string(), "Ada".to_string())]);
    }

    #[test]
    fn form_body_is_url_encoded() {
        let body = encode_form_body(&json!({"name": "Ada Lovelace"}));
        assert_eq!(body, "name=Ada+Lovelace");
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;

    proptest! {
        /// A flat object's form body, parsed back through the same
        /// `x-www-form-urlencoded` rules, yields exactly the pairs
        /// `encode_form` produced for it — the bracket notation only bites
        /// on nested shapes, so a flat map round-trips losslessly.
        #[test]
        fn flat_object_round_trips_through_form_encoding(
            map in prop::collection::hash_map("[a-zA-Z][a-zA-Z0-9_]{0,8}", "[a-zA-Z0-9 ]{0,12}", 0..8)
        ) {
            let value = Value::Object(map.iter().map(|(k, v)| (k.clone(), Value::String(v.clone()))).collect());
            let body = encode_form_body(&value);
            let decoded: HashMap<String, String> = form_urlencoded::parse(body.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            prop_assert_eq!(decoded, map);
        }

        /// `flatten` never panics and produces exactly one pair per
        /// non-null leaf, regardless of nesting shape.
        #[test]
        fn pair_count_matches_non_null_leaf_count(
            a in "[a-z]{1,5}", b in "[a-z]{1,5}", c in any::<i64>(), nest_b in any::<bool>()
        ) {
            let value = if nest_b {
                json!({"a": a, "b": {"c": c}})
            } else {
                json!({"a": a, "b": b})
            };
            let pairs = encode_form(&value);
            prop_assert_eq!(pairs.len(), 2);
        }
    }
}
