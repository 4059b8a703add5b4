//! Schema validation helpers for xbot JSON5 configuration.

use super::SchemaMode;
use crate::ConfigError;
use serde_json::{Map, Value};

/// Validate a single config layer (or the merged result) against the schema.
pub(super) fn validate_layer_schema(
    value: &Value,
    mode: SchemaMode,
    layer: &str,
) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, "")?;
    ensure_allowed_keys(
        map,
        &["$schema", "server", "storage", "ai", "history"],
        layer,
        "",
    )?;

    if let Some(value) = map.get("$schema") {
        expect_string(value, layer, "$schema")?;
    }
    if let Some(value) = map.get("server") {
        validate_server(value, mode, layer, "server")?;
    }
    if let Some(value) = map.get("storage") {
        validate_storage(value, layer, "storage")?;
    }
    if let Some(value) = map.get("ai") {
        validate_ai(value, layer, "ai")?;
    }
    if let Some(value) = map.get("history") {
        validate_history(value, layer, "history")?;
    }
    Ok(())
}

fn validate_server(
    value: &Value,
    mode: SchemaMode,
    layer: &str,
    path: &str,
) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, &["address", "port", "host"], layer, path)?;
    if let Some(value) = map.get("address") {
        expect_string(value, layer, &join_path(path, "address"))?;
    }
    if let Some(value) = map.get("host") {
        expect_string(value, layer, &join_path(path, "host"))?;
    }
    if let Some(value) = map.get("port") {
        let port_path = join_path(path, "port");
        expect_u64(value, layer, &port_path)?;
        // Layers may carry placeholder ports; only the merged result must be bindable.
        if mode == SchemaMode::Full {
            match value.as_u64() {
                Some(port) if (1..=u64::from(u16::MAX)).contains(&port) => {}
                _ => return Err(invalid_field(layer, &port_path, "port out of range")),
            }
        }
    }
    Ok(())
}

/// Validate the "storage" block.
fn validate_storage(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(
        map,
        &[
            "message_storage",
            "mongo",
            "s3",
            "local",
            "object_window_days",
            "scan_policy",
            "fetch_concurrency",
            "operation_timeout_secs",
        ],
        layer,
        path,
    )?;
    if let Some(value) = map.get("message_storage") {
        expect_string(value, layer, &join_path(path, "message_storage"))?;
    }
    if let Some(value) = map.get("mongo") {
        validate_mongo(value, layer, &join_path(path, "mongo"))?;
    }
    if let Some(value) = map.get("s3") {
        validate_s3(value, layer, &join_path(path, "s3"))?;
    }
    if let Some(value) = map.get("local") {
        let local_path = join_path(path, "local");
        let local = expect_object(value, layer, &local_path)?;
        ensure_allowed_keys(local, &["path"], layer, &local_path)?;
        if let Some(value) = local.get("path") {
            expect_string(value, layer, &join_path(&local_path, "path"))?;
        }
    }
    for key in [
        "object_window_days",
        "fetch_concurrency",
        "operation_timeout_secs",
    ] {
        if let Some(value) = map.get(key) {
            expect_u64(value, layer, &join_path(path, key))?;
        }
    }
    if let Some(value) = map.get("scan_policy") {
        validate_scan_policy(value, layer, &join_path(path, "scan_policy"))?;
    }
    Ok(())
}

fn validate_mongo(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(
        map,
        &["uri", "database", "server_selection_timeout_secs"],
        layer,
        path,
    )?;
    for key in ["uri", "database"] {
        if let Some(value) = map.get(key) {
            expect_string(value, layer, &join_path(path, key))?;
        }
    }
    if let Some(value) = map.get("server_selection_timeout_secs") {
        expect_u64(
            value,
            layer,
            &join_path(path, "server_selection_timeout_secs"),
        )?;
    }
    Ok(())
}

fn validate_s3(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    let strings = [
        "endpoint",
        "access_key",
        "secret_key",
        "bucket",
        "region",
    ];
    let mut allowed = strings.to_vec();
    allowed.push("allow_http");
    ensure_allowed_keys(map, &allowed, layer, path)?;
    for key in strings {
        if let Some(value) = map.get(key) {
            expect_string(value, layer, &join_path(path, key))?;
        }
    }
    if let Some(value) = map.get("allow_http") {
        expect_bool(value, layer, &join_path(path, "allow_http"))?;
    }
    Ok(())
}

fn validate_scan_policy(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let Some(policy) = value.as_str() else {
        return Err(invalid_field(layer, path, "expected string"));
    };
    if matches!(policy, "strict" | "best_effort") {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "invalid scan policy"))
    }
}

/// Validate the "ai" block.
fn validate_ai(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(
        map,
        &["text", "summary_models", "image", "request_timeout_secs"],
        layer,
        path,
    )?;
    for key in ["text", "image"] {
        if let Some(value) = map.get(key) {
            validate_endpoint(value, layer, &join_path(path, key))?;
        }
    }
    if let Some(value) = map.get("summary_models") {
        validate_string_array(value, layer, &join_path(path, "summary_models"))?;
    }
    if let Some(value) = map.get("request_timeout_secs") {
        expect_u64(value, layer, &join_path(path, "request_timeout_secs"))?;
    }
    Ok(())
}

fn validate_endpoint(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    let keys = ["endpoint", "api_key", "model"];
    ensure_allowed_keys(map, &keys, layer, path)?;
    for key in keys {
        if let Some(value) = map.get(key) {
            expect_string(value, layer, &join_path(path, key))?;
        }
    }
    Ok(())
}

fn validate_history(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    let keys = ["max_records", "leaderboard_limit"];
    ensure_allowed_keys(map, &keys, layer, path)?;
    for key in keys {
        if let Some(value) = map.get(key) {
            expect_u64(value, layer, &join_path(path, key))?;
        }
    }
    Ok(())
}

fn validate_string_array(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let items = value
        .as_array()
        .ok_or_else(|| invalid_field(layer, path, "expected array"))?;
    for (idx, item) in items.iter().enumerate() {
        expect_string(item, layer, &format!("{path}[{idx}]"))?;
    }
    Ok(())
}

fn expect_object<'a>(
    value: &'a Value,
    layer: &str,
    path: &str,
) -> Result<&'a Map<String, Value>, ConfigError> {
    value
        .as_object()
        .ok_or_else(|| invalid_field(layer, path, "expected object"))
}

fn expect_string(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_string() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected string"))
    }
}

fn expect_bool(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_boolean() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected boolean"))
    }
}

/// Non-negative integers only; durations and counts are never negative.
fn expect_u64(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_u64() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected non-negative integer"))
    }
}

fn ensure_allowed_keys(
    map: &Map<String, Value>,
    allowed: &[&str],
    layer: &str,
    path: &str,
) -> Result<(), ConfigError> {
    for key in map.keys() {
        if !allowed.contains(&key.as_str()) {
            return Err(invalid_field(layer, &join_path(path, key), "unknown key"));
        }
    }
    Ok(())
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn invalid_field(layer: &str, path: &str, message: &str) -> ConfigError {
    let normalized_path = if path.is_empty() { "root" } else { path };
    ConfigError::InvalidField {
        path: format!("{layer}:{normalized_path}"),
        message: message.to_string(),
    }
}
