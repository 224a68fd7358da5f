//! Settings loading with deep merge and environment variable overrides.
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use reel_core::logging::LogFormat;
use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::ReelSettings;

/// Resolve the path to the settings file (`~/.reel/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".reel").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<ReelSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; a file with invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<ReelSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Defaults merged with the file at `path`, without env overrides.
pub fn load_file_layer(path: &Path) -> Result<ReelSettings> {
    let defaults = serde_json::to_value(ReelSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `REEL_*` environment variable overrides.
///
/// Values outside their allowed range, or that fail to parse, are ignored
/// with a warning.
pub fn apply_env_overrides(settings: &mut ReelSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides from an arbitrary lookup (env in production, a map in tests).
pub fn apply_overrides(settings: &mut ReelSettings, lookup: impl Fn(&str) -> Option<String>) {
    let read = |name: &str| lookup(name).filter(|v| !v.is_empty());

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = read("REEL_HOST") {
        settings.server.host = v;
    }
    if let Some(v) =
        read("REEL_PORT").and_then(|v| checked(&v, "REEL_PORT", parse_u16_range(&v, 0, 65535)))
    {
        settings.server.port = v;
    }

    // ── Live ────────────────────────────────────────────────────────
    if let Some(v) = read("REEL_BROADCAST_QUEUE")
        .and_then(|v| checked(&v, "REEL_BROADCAST_QUEUE", parse_usize_range(&v, 1, 1_000_000)))
    {
        settings.live.broadcast_queue_capacity = v;
    }
    if let Some(v) = read("REEL_CLIENT_BUFFER")
        .and_then(|v| checked(&v, "REEL_CLIENT_BUFFER", parse_usize_range(&v, 1, 65_536)))
    {
        settings.live.client_buffer_frames = v;
    }
    if let Some(v) = read("REEL_HEARTBEAT_INTERVAL_MS").and_then(|v| {
        checked(&v, "REEL_HEARTBEAT_INTERVAL_MS", parse_u64_range(&v, 100, 3_600_000))
    }) {
        settings.live.heartbeat_interval_ms = v;
    }
    if let Some(v) = read("REEL_STALE_AFTER_MS")
        .and_then(|v| checked(&v, "REEL_STALE_AFTER_MS", parse_u64_range(&v, 100, 86_400_000)))
    {
        settings.live.stale_after_ms = v;
    }
    if let Some(v) = read("REEL_WRITE_TIMEOUT_MS")
        .and_then(|v| checked(&v, "REEL_WRITE_TIMEOUT_MS", parse_u64_range(&v, 10, 600_000)))
    {
        settings.live.write_timeout_ms = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read("REEL_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read("REEL_LOG_FORMAT")
        .and_then(|v| checked(&v, "REEL_LOG_FORMAT", v.parse::<LogFormat>().ok()))
    {
        settings.logging.format = v;
    }
}

fn checked<T>(raw: &str, key: &str, parsed: Option<T>) -> Option<T> {
    if parsed.is_none() {
        tracing::warn!(key, value = %raw, "invalid env override, ignoring");
    }
    parsed
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SettingsError;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"server": {"port": 8080, "host": "localhost"}});
        let source = serde_json::json!({"server": {"port": 9090}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["server"]["port"], 9090);
        assert_eq!(merged["server"]["host"], "localhost");
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"items": [1, 2, 3]});
        let source = serde_json::json!({"items": [4, 5]});
        let merged = deep_merge(target, source);
        assert_eq!(merged["items"], serde_json::json!([4, 5]));
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_primitive_replaces_object() {
        let target = serde_json::json!({"a": {"nested": true}});
        let source = serde_json::json!({"a": 42});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 42);
    }

    // ── load_file_layer ─────────────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let settings = load_file_layer(Path::new("/nonexistent/settings.json")).unwrap();
        assert_eq!(settings.server.port, 8090);
        assert_eq!(settings.live.broadcast_queue_capacity, 1000);
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"server": {"port": 9999}, "live": {"heartbeatIntervalMs": 1000}}"#,
        )
        .unwrap();

        let settings = load_file_layer(&path).unwrap();
        assert_eq!(settings.server.port, 9999);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.live.heartbeat_interval_ms, 1000);
        assert_eq!(settings.live.stale_after_ms, 300_000);
    }

    #[test]
    fn load_null_keeps_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"live": {"writeTimeoutMs": null}}"#).unwrap();

        let settings = load_file_layer(&path).unwrap();
        assert_eq!(settings.live.write_timeout_ms, 5_000);
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();

        let result = load_file_layer(&path);
        assert!(matches!(result.unwrap_err(), SettingsError::Json(_)));
    }

    #[test]
    fn load_wrong_type_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server": {"port": "high"}}"#).unwrap();

        assert!(load_file_layer(&path).is_err());
    }

    // ── overrides ───────────────────────────────────────────────────

    #[test]
    fn overrides_apply() {
        let mut settings = ReelSettings::default();
        apply_overrides(
            &mut settings,
            lookup_from(&[
                ("REEL_HOST", "0.0.0.0"),
                ("REEL_PORT", "9100"),
                ("REEL_BROADCAST_QUEUE", "50"),
                ("REEL_HEARTBEAT_INTERVAL_MS", "2000"),
                ("REEL_STALE_AFTER_MS", "10000"),
                ("REEL_WRITE_TIMEOUT_MS", "250"),
                ("REEL_LOG_LEVEL", "debug"),
                ("REEL_LOG_FORMAT", "json"),
            ]),
        );
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 9100);
        assert_eq!(settings.live.broadcast_queue_capacity, 50);
        assert_eq!(settings.live.heartbeat_interval_ms, 2000);
        assert_eq!(settings.live.stale_after_ms, 10_000);
        assert_eq!(settings.live.write_timeout_ms, 250);
        assert_eq!(settings.logging.level, "debug");
        assert_eq!(settings.logging.format, LogFormat::Json);
    }

    #[test]
    fn invalid_overrides_are_ignored() {
        let mut settings = ReelSettings::default();
        apply_overrides(
            &mut settings,
            lookup_from(&[
                ("REEL_PORT", "70000"),
                ("REEL_BROADCAST_QUEUE", "0"),
                ("REEL_HEARTBEAT_INTERVAL_MS", "soon"),
                ("REEL_LOG_FORMAT", "xml"),
                ("REEL_HOST", ""),
            ]),
        );
        let defaults = ReelSettings::default();
        assert_eq!(settings.server.port, defaults.server.port);
        assert_eq!(settings.server.host, defaults.server.host);
        assert_eq!(
            settings.live.broadcast_queue_capacity,
            defaults.live.broadcast_queue_capacity
        );
        assert_eq!(
            settings.live.heartbeat_interval_ms,
            defaults.live.heartbeat_interval_ms
        );
        assert_eq!(settings.logging.format, LogFormat::Compact);
    }

    // ── parsing ─────────────────────────────────────────────────────

    #[test]
    fn parse_ranges() {
        assert_eq!(parse_u16_range("8080", 1, 65535), Some(8080));
        assert_eq!(parse_u16_range("0", 1, 65535), None);
        assert_eq!(parse_u64_range("5000", 100, 10_000), Some(5000));
        assert_eq!(parse_u64_range("50", 100, 10_000), None);
        assert_eq!(parse_usize_range("-1", 0, 10), None);
        assert_eq!(parse_usize_range("10", 0, 10), Some(10));
    }
}
