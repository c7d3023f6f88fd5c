use serde_json::Value;

/// Drop keys whose value is `null`, empty string, or empty array.
/// Objects and non-empty arrays/strings/numbers/bools pass
/// through untouched — this operates one level deep on an args object, as
/// every call site in the Executor hands it a flat arguments map.
pub fn clean_args(args: &Value) -> Value {
    let Some(map) = args.as_object() else {
        return args.clone();
    };
    let cleaned: serde_json::Map<String, Value> = map
        .iter()
        .filter(|(_, v)| !is_empty_value(v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    Value::Object(cleaned)
}

fn is_empty_value(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

/// Recursively strip JSON-Schema nodes of vendor-specific noise so two
/// semantically identical schemas compare equal regardless of how they
/// were authored. Idempotent by construction — a schema with no `nullable`/
/// empty-`required`/empty-`enum` artifacts left to strip is a fixed point
/// — running it twice yields the same result as running it once.
pub fn deep_clean_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => {
            let mut cleaned = serde_json::Map::new();
            for (k, v) in map {
                if k == "required" && matches!(v, Value::Array(a) if a.is_empty()) {
                    continue;
                }
                if k == "nullable" && v == &Value::Bool(false) {
                    continue;
                }
                cleaned.insert(k.clone(), deep_clean_schema(v));
            }
            Value::Object(cleaned)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(deep_clean_schema).collect()),
        other => other.clone(),
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// One flat JSON value `clean_args` might see in an arguments map: the
    /// leaf shapes it actually treats specially, plus a couple it passes
    /// through untouched.
    fn arg_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<String>().prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            any::<bool>().prop_map(Value::from),
            Just(Value::Array(vec![])),
            prop::collection::vec(any::<String>().prop_map(Value::from), 1..4).prop_map(Value::Array),
        ]
    }

    proptest! {
        /// `clean_args` is idempotent: applying it twice matches applying it once.
        #[test]
        fn clean_args_is_idempotent_for_arbitrary_flat_maps(
            map in prop::collection::hash_map("[a-z][a-z0-9_]{0,8}", arg_value(), 0..8)
        ) {
            let args = Value::Object(map.into_iter().collect());
            let once = clean_args(&args);
            let twice = clean_args(&once);
            prop_assert_eq!(once, twice);
        }

        /// A cleaned map never carries a key `clean_args` would itself drop.
        #[test]
        fn clean_args_output_has_no_empty_values(
            map in prop::collection::hash_map("[a-z][a-z0-9_]{0,8}", arg_value(), 0..8)
        ) {
            let args = Value::Object(map.into_iter().collect());
            let cleaned = clean_args(&args);
            for value in cleaned.as_object().unwrap().values() {
                prop_assert!(!is_empty_value(value));
            }
        }
    }
}
