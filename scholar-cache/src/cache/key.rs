//! Cache key normalization
//!
//! Requests are keyed as `"{category}:v{namespace_version}:{token}"`, where the
//! token is a hash of the operation name and its normalized parameters. Two
//! requests that differ only in parameter order, surrounding whitespace or
//! `"5"` vs `5` map to the same key.

use crate::cache::types::{CacheKey, Category};
use serde::Serialize;
use serde_json::{Map, Number, Value};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;

/// Hex characters of the SHA-256 digest kept in the key
pub const TOKEN_LEN: usize = 32;

/// Normalize a parameter set: drop nulls, trim strings, coerce numeric
/// strings, sort lists. Key order is handled at serialization time.
pub fn normalize_params(params: &Map<String, Value>) -> Map<String, Value> {
    params
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(name, value)| (name.clone(), normalize_value(value)))
        .collect()
}

fn normalize_value(value: &Value) -> Value {
    match value {
        Value::String(s) => coerce_string(s.trim()),
        Value::Array(items) => {
            let mut items: Vec<Value> = items.iter().map(normalize_value).collect();
            items.sort_by(compare_values);
            Value::Array(items)
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), normalize_value(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn coerce_string(s: &str) -> Value {
    if let Ok(i) = s.parse::<i64>() {
        return Value::Number(i.into());
    }
    if let Ok(u) = s.parse::<u64>() {
        return Value::Number(u.into());
    }
    // `parse::<f64>` also accepts "inf" and "NaN"; those stay strings
    if let Ok(f) = s.parse::<f64>() {
        if let Some(n) = Number::from_f64(f).filter(|_| f.is_finite()) {
            return Value::Number(n);
        }
    }
    Value::String(s.to_string())
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => canonical_json(a).cmp(&canonical_json(b)),
    }
}

/// Serialize with object keys sorted at every level
///
/// Independent of whether `serde_json` was built with `preserve_order`.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (k, v)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(k.clone()).to_string());
                out.push(':');
                write_canonical(v, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Hash token for an operation and its (already normalized) parameters
pub fn params_token(operation: &str, normalized: &Map<String, Value>) -> String {
    let mut payload = Map::new();
    payload.insert("op".to_string(), Value::String(operation.trim().to_string()));
    payload.insert("params".to_string(), Value::Object(normalized.clone()));

    let digest = Sha256::digest(canonical_json(&Value::Object(payload)).as_bytes());
    let mut token = hex::encode(digest);
    token.truncate(TOKEN_LEN);
    token
}

/// Full normalized key for a request
pub fn make_key(
    category: Category,
    namespace_version: u32,
    operation: &str,
    params: &Map<String, Value>,
) -> CacheKey {
    let normalized = normalize_params(params);
    format!(
        "{}:v{}:{}",
        category,
        namespace_version,
        params_token(operation, &normalized)
    )
}

/// Prefix shared by every key of a category in one namespace, as a glob
pub fn namespace_glob(category: Category, namespace_version: u32) -> String {
    format!("{}:v{}:*", category, namespace_version)
}

/// Cache key builder for API requests
///
/// ```
/// use scholar_cache::{CacheKeyBuilder, Category};
///
/// let key = CacheKeyBuilder::new(Category::Search, "search")
///     .param("query", "  malaria  ")
///     .param("pageSize", "25")
///     .build(1);
/// assert!(key.starts_with("search:v1:"));
/// ```
pub struct CacheKeyBuilder {
    category: Category,
    operation: String,
    params: Map<String, Value>,
}

impl CacheKeyBuilder {
    /// Create a new cache key builder
    pub fn new(category: Category, operation: impl Into<String>) -> Self {
        Self {
            category,
            operation: operation.into(),
            params: Map::new(),
        }
    }

    /// Add a parameter. Values that fail to serialize are treated as null and dropped
    pub fn param(mut self, name: impl Into<String>, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.params.insert(name.into(), value);
        self
    }

    /// Add every entry of a parameter map
    pub fn params(mut self, params: &Map<String, Value>) -> Self {
        for (name, value) in params {
            self.params.insert(name.clone(), value.clone());
        }
        self
    }

    /// Build the cache key under a namespace version
    pub fn build(self, namespace_version: u32) -> CacheKey {
        make_key(self.category, namespace_version, &self.operation, &self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_normalization_is_order_and_type_insensitive() {
        let a = make_key(Category::Search, 1, "search", &obj(json!({"q": "  X  ", "n": "5"})));
        let b = make_key(Category::Search, 1, "search", &obj(json!({"n": 5, "q": "X"})));
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_shape() {
        let key = make_key(Category::Record, 2, "article", &obj(json!({"id": "PMC1"})));
        let parts: Vec<&str> = key.split(':').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "record");
        assert_eq!(parts[1], "v2");
        assert_eq!(parts[2].len(), TOKEN_LEN);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_namespace_versions_diverge() {
        let params = obj(json!({"query": "cancer"}));
        let v1 = make_key(Category::Search, 1, "search", &params);
        let v2 = make_key(Category::Search, 2, "search", &params);
        assert_ne!(v1, v2);
    }

    #[test]
    fn test_operation_and_category_matter() {
        let params = obj(json!({"id": "PMC1"}));
        assert_ne!(
            make_key(Category::Record, 1, "article", &params),
            make_key(Category::Record, 1, "references", &params)
        );
        assert_ne!(
            make_key(Category::Record, 1, "article", &params),
            make_key(Category::Fulltext, 1, "article", &params)
        );
    }

    #[test]
    fn test_nulls_are_dropped() {
        let with_null = obj(json!({"q": "x", "cursor": null}));
        let without = obj(json!({"q": "x"}));
        assert_eq!(normalize_params(&with_null), normalize_params(&without));
    }

    #[test]
    fn test_nested_values_are_normalized() {
        let normalized = normalize_params(&obj(json!({
            "filter": {"year": " 2020 ", "source": " MED "},
            "ids": ["b", " a ", "3"]
        })));

        assert_eq!(normalized["filter"]["year"], json!(2020));
        assert_eq!(normalized["filter"]["source"], json!("MED"));
        // strings order before numbers in a mixed list
        assert_eq!(normalized["ids"], json!(["a", "b", 3]));
    }

    #[test]
    fn test_coercion() {
        assert_eq!(coerce_string("42"), json!(42));
        assert_eq!(coerce_string("-7"), json!(-7));
        assert_eq!(coerce_string("2.5"), json!(2.5));
        assert_eq!(coerce_string("inf"), json!("inf"));
        assert_eq!(coerce_string("NaN"), json!("NaN"));
        assert_eq!(coerce_string("PMC123"), json!("PMC123"));
    }

    #[test]
    fn test_list_order_is_ignored() {
        let a = make_key(Category::Search, 1, "s", &obj(json!({"f": ["x", "y", "z"]})));
        let b = make_key(Category::Search, 1, "s", &obj(json!({"f": ["z", "x", "y"]})));
        assert_eq!(a, b);
    }

    #[test]
    fn test_canonical_json_sorts_keys() {
        assert_eq!(
            canonical_json(&json!({"b": 1, "a": {"d": [1, 2], "c": "x"}})),
            r#"{"a":{"c":"x","d":[1,2]},"b":1}"#
        );
    }

    #[test]
    fn test_builder_matches_make_key() {
        let built = CacheKeyBuilder::new(Category::Search, "search")
            .param("query", "  malaria ")
            .param("pageSize", 25)
            .param("cursorMark", Option::<String>::None)
            .build(1);
        let direct = make_key(
            Category::Search,
            1,
            "search",
            &obj(json!({"pageSize": "25", "query": "malaria"})),
        );
        assert_eq!(built, direct);
    }

    #[test]
    fn test_namespace_glob() {
        assert_eq!(namespace_glob(Category::Search, 3), "search:v3:*");
    }

    proptest! {
        #[test]
        fn prop_insertion_order_does_not_matter(
            entries in proptest::collection::btree_map("[a-z]{1,6}", "[ a-zA-Z0-9]{0,8}", 0..8)
        ) {
            let forward: Map<String, Value> = entries
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            let mut reversed = Map::new();
            for (k, v) in entries.iter().rev() {
                reversed.insert(k.clone(), Value::String(format!("  {}  ", v)));
            }

            prop_assert_eq!(
                make_key(Category::Record, 1, "op", &forward),
                make_key(Category::Record, 1, "op", &reversed)
            );
        }
    }
}
