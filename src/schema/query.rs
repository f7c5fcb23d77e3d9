//! Read-only queries over an OpenAPI document held as a `serde_json::Value`.

use serde::Serialize;
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet};

pub const EXPAND_DEPTH: usize = 2;

const SUMMARY_LIMIT: usize = 100;
const SUGGESTION_LIMIT: usize = 5;
const TOP_LEVEL_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub path: String,
    pub method: String,
    pub summary: String,
    #[serde(rename = "operationId")]
    pub operation_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathEntry {
    pub path: String,
    pub methods: Vec<String>,
}

/// A path key together with its whole path item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Endpoint {
    pub path: String,
    pub methods: Value,
}

impl Endpoint {
    fn new(path: &str, item: &Value) -> Self {
        Self {
            path: path.to_string(),
            methods: item.clone(),
        }
    }

    pub fn expanded(&self, schema: &Value, depth: usize) -> Value {
        json!({
            "path": self.path,
            "methods": expand_refs(&self.methods, schema, depth),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaInfo {
    pub title: Option<String>,
    pub version: Option<String>,
    pub total_endpoints: usize,
    pub methods: BTreeMap<String, usize>,
    pub top_level_paths: Vec<String>,
}

fn paths(schema: &Value) -> impl Iterator<Item = (&String, &Value)> {
    schema
        .get("paths")
        .and_then(Value::as_object)
        .into_iter()
        .flatten()
}

// `parameters` and `x-*` extensions sit beside the operations in a path item.
fn is_operation_key(key: &str) -> bool {
    key != "parameters" && !key.starts_with("x-")
}

fn operations(item: &Value) -> impl Iterator<Item = (&String, &Value)> {
    item.as_object()
        .into_iter()
        .flatten()
        .filter(|(key, _)| is_operation_key(key))
}

fn str_field<'a>(spec: &'a Value, key: &str) -> &'a str {
    spec.get(key).and_then(Value::as_str).unwrap_or("")
}

fn truncate_summary(summary: &str) -> String {
    if summary.chars().count() <= SUMMARY_LIMIT {
        return summary.to_string();
    }
    let cut: String = summary.chars().take(SUMMARY_LIMIT).collect();
    format!("{cut}...")
}

/// Case-insensitive substring match over path, summary, description and
/// operationId. Hits keep document order.
pub fn search(query: &str, schema: &Value) -> Vec<SearchHit> {
    let needle = query.to_lowercase();
    let mut hits = Vec::new();

    for (path, item) in paths(schema) {
        for (method, spec) in operations(item) {
            if !spec.is_object() {
                continue;
            }
            let summary = str_field(spec, "summary");
            let description = str_field(spec, "description");
            let operation_id = str_field(spec, "operationId");

            let haystack = format!("{path} {summary} {description} {operation_id}").to_lowercase();
            if haystack.contains(&needle) {
                hits.push(SearchHit {
                    path: path.clone(),
                    method: method.to_uppercase(),
                    summary: truncate_summary(summary),
                    operation_id: operation_id.to_string(),
                });
            }
        }
    }

    hits
}

/// Exact key, then the key with a leading `/`, then the first key containing `path`.
pub fn get_endpoint(path: &str, schema: &Value) -> Option<Endpoint> {
    let paths = schema.get("paths")?.as_object()?;

    if let Some(item) = paths.get(path) {
        return Some(Endpoint::new(path, item));
    }

    if !path.starts_with('/') {
        let rooted = format!("/{path}");
        if let Some(item) = paths.get(&rooted) {
            return Some(Endpoint::new(&rooted, item));
        }
    }

    paths
        .iter()
        .find(|(key, _)| key.contains(path))
        .map(|(key, item)| Endpoint::new(key, item))
}

pub fn similar_paths(path: &str, schema: &Value) -> Vec<String> {
    let needle = path.to_lowercase();
    paths(schema)
        .map(|(key, _)| key)
        .filter(|key| key.to_lowercase().contains(&needle))
        .take(SUGGESTION_LIMIT)
        .cloned()
        .collect()
}

pub fn list_paths(prefix: &str, schema: &Value) -> Vec<PathEntry> {
    let mut entries: Vec<PathEntry> = paths(schema)
        .filter(|(path, _)| path.starts_with(prefix))
        .map(|(path, item)| PathEntry {
            path: path.clone(),
            methods: operations(item).map(|(m, _)| m.to_uppercase()).collect(),
        })
        .collect();
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    entries
}

pub fn schema_info(schema: &Value) -> SchemaInfo {
    let info_field = |key: &str| {
        schema
            .get("info")
            .and_then(|info| info.get(key))
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    let mut methods = BTreeMap::new();
    let mut prefixes = BTreeSet::new();
    let mut total_endpoints = 0;

    for (path, item) in paths(schema) {
        total_endpoints += 1;
        for (method, _) in operations(item) {
            *methods.entry(method.to_uppercase()).or_insert(0) += 1;
        }
        let first = path.trim_matches('/').split('/').next().unwrap_or("");
        prefixes.insert(format!("/{first}"));
    }

    SchemaInfo {
        title: info_field("title"),
        version: info_field("version"),
        total_endpoints,
        methods,
        top_level_paths: prefixes.into_iter().take(TOP_LEVEL_LIMIT).collect(),
    }
}

/// Resolves a local `#/...` JSON pointer. External refs come back untouched;
/// dangling ones are tagged with `_error`.
pub fn resolve_ref(reference: &str, schema: &Value) -> Value {
    let Some(pointer) = reference.strip_prefix('#').filter(|p| p.starts_with('/')) else {
        return json!({ "$ref": reference });
    };
    match schema.pointer(pointer) {
        Some(target) => target.clone(),
        None => json!({ "$ref": reference, "_error": "Could not resolve" }),
    }
}

/// Replaces `{"$ref": ...}` objects with their targets. Each substitution
/// spends one level of `depth`; walking into objects and arrays does not.
pub fn expand_refs(value: &Value, schema: &Value, depth: usize) -> Value {
    if depth == 0 {
        return value.clone();
    }
    match value {
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(Value::String(reference)) = map.get("$ref") {
                    let resolved = resolve_ref(reference, schema);
                    return expand_refs(&resolved, schema, depth - 1);
                }
            }
            Value::Object(
                map.iter()
                    .map(|(key, v)| (key.clone(), expand_refs(v, schema, depth)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| expand_refs(item, schema, depth))
                .collect(),
        ),
        other => other.clone(),
    }
}
