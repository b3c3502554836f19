//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`ScribeSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply `SCRIBE_*` environment variable overrides (highest priority)
//! 4. Validate the result

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::{ScribeSettings, CHUNK_SIZE_BOUNDS, PARALLELISM_BOUNDS};

/// Directory holding the settings file and the default job database.
pub fn scribe_home() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".scribe")
}

/// Resolve the path to the settings file (`~/.scribe/settings.json`).
pub fn settings_path() -> PathBuf {
    scribe_home().join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<ScribeSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; invalid JSON or invalid values are errors.
pub fn load_settings_from_path(path: &Path) -> Result<ScribeSettings> {
    let defaults = serde_json::to_value(ScribeSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: ScribeSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
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

/// Apply process environment overrides to loaded settings.
pub fn apply_env_overrides(settings: &mut ScribeSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides from an arbitrary variable lookup.
///
/// Numbers must parse and fall within range, booleans accept
/// `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`. Invalid values are
/// logged and ignored.
pub fn apply_overrides<F>(settings: &mut ScribeSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = env.string("SCRIBE_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.u16("SCRIBE_PORT", 1, 65535) {
        settings.server.port = v;
    }
    if let Some(v) = env.u64("SCRIBE_REQUEST_TIMEOUT_MS", 1000, 3_600_000) {
        settings.server.request_timeout_ms = v;
    }

    // ── Store ───────────────────────────────────────────────────────
    if let Some(v) = env.string("SCRIBE_DB_PATH") {
        settings.store.db_path = v;
    }

    // ── Job policy ──────────────────────────────────────────────────
    if let Some(v) = env.u64("SCRIBE_CHUNK_SIZE", CHUNK_SIZE_BOUNDS.0, CHUNK_SIZE_BOUNDS.1) {
        settings.job.chunk_size = v;
    }
    if let Some(v) = env.usize("SCRIBE_PARALLELISM", PARALLELISM_BOUNDS.0, PARALLELISM_BOUNDS.1) {
        settings.job.parallelism = v;
    }

    // ── Source ──────────────────────────────────────────────────────
    if let Some(v) = env.u64("SCRIBE_SOURCE_TIMEOUT_MS", 1000, 600_000) {
        settings.source.timeout_ms = v;
    }

    // ── Transcription ───────────────────────────────────────────────
    if let Some(v) = env.string("SCRIBE_TRANSCRIBE_URL") {
        settings.transcription.base_url = v;
    }
    if let Some(v) = env.string("SCRIBE_TRANSCRIBE_MODEL") {
        settings.transcription.model = v;
    }
    if let Some(v) = env.string("SCRIBE_TRANSCRIBE_API_KEY") {
        settings.transcription.api_key = Some(v);
    }
    if let Some(v) = env.u64("SCRIBE_TRANSCRIBE_TIMEOUT_MS", 1000, 3_600_000) {
        settings.transcription.timeout_ms = v;
    }
    if let Some(v) = env.string("SCRIBE_TRANSCRIBE_LANGUAGE") {
        settings.transcription.language = Some(v);
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("SCRIBE_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.bool("SCRIBE_LOG_JSON") {
        settings.logging.json = v;
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

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

// ── Variable readers (thin wrappers) ────────────────────────────────────────

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn parsed<T>(&self, name: &str, kind: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
        let val = (self.lookup)(name)?;
        let result = parse(&val);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid {kind} env var, ignoring");
        }
        result
    }

    fn bool(&self, name: &str) -> Option<bool> {
        self.parsed(name, "boolean", parse_bool)
    }

    fn u16(&self, name: &str, min: u16, max: u16) -> Option<u16> {
        self.parsed(name, "u16", |v| parse_u16_range(v, min, max))
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        self.parsed(name, "u64", |v| parse_u64_range(v, min, max))
    }

    fn usize(&self, name: &str, min: usize, max: usize) -> Option<usize> {
        self.parsed(name, "usize", |v| parse_usize_range(v, min, max))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::errors::SettingsError;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({
            "server": {"port": 8080, "host": "localhost"}
        });
        let source = serde_json::json!({
            "server": {"port": 9090}
        });
        let merged = deep_merge(target, source);
        assert_eq!(merged["server"]["port"], 9090);
        assert_eq!(merged["server"]["host"], "localhost");
    }

    #[test]
    fn merge_null_preserves_target() {
        let merged = deep_merge(
            serde_json::json!({"a": 1}),
            serde_json::json!({"a": null}),
        );
        assert_eq!(merged["a"], 1);
    }

    #[test]
    fn merge_replaces_arrays() {
        let merged = deep_merge(
            serde_json::json!({"a": [1, 2, 3]}),
            serde_json::json!({"a": [4]}),
        );
        assert_eq!(merged["a"], serde_json::json!([4]));
    }

    // ── file loading ────────────────────────────────────────────────

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings_from_path(&dir.path().join("nope.json")).unwrap();
        assert_eq!(settings.job.parallelism, 5);
    }

    #[test]
    fn partial_file_merges_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"job": {"parallelism": 3}, "transcription": {"apiKey": "k", "model": "large-v3"}}"#,
        )
        .unwrap();

        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.job.parallelism, 3);
        assert_eq!(settings.job.chunk_size, 524_288);
        assert_eq!(settings.transcription.model, "large-v3");
        assert_eq!(settings.transcription.api_key.as_deref(), Some("k"));
    }

    #[test]
    fn invalid_json_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            load_settings_from_path(&path),
            Err(SettingsError::Json(_))
        ));
    }

    #[test]
    fn invalid_values_rejected_after_merge() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"job": {"parallelism": 0}}"#).unwrap();
        assert!(matches!(
            load_settings_from_path(&path),
            Err(SettingsError::InvalidValue(_))
        ));
    }

    #[test]
    fn file_policy_values_are_range_checked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        for body in [
            r#"{"job": {"chunkSize": 1099511627776}}"#,
            r#"{"job": {"chunkSize": 1}}"#,
            r#"{"job": {"parallelism": 1000}}"#,
        ] {
            std::fs::write(&path, body).unwrap();
            assert!(
                matches!(load_settings_from_path(&path), Err(SettingsError::InvalidValue(_))),
                "{body}"
            );
        }
    }

    // ── overrides ───────────────────────────────────────────────────

    #[test]
    fn overrides_apply() {
        let mut settings = ScribeSettings::default();
        apply_overrides(
            &mut settings,
            lookup(&[
                ("SCRIBE_PORT", "9000"),
                ("SCRIBE_PARALLELISM", "8"),
                ("SCRIBE_CHUNK_SIZE", "1048576"),
                ("SCRIBE_TRANSCRIBE_URL", "https://api.example.com"),
                ("SCRIBE_TRANSCRIBE_API_KEY", "sk-test"),
                ("SCRIBE_LOG_JSON", "off"),
            ]),
        );
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.job.parallelism, 8);
        assert_eq!(settings.job.chunk_size, 1_048_576);
        assert_eq!(settings.transcription.base_url, "https://api.example.com");
        assert_eq!(settings.transcription.api_key.as_deref(), Some("sk-test"));
        assert!(!settings.logging.json);
    }

    #[test]
    fn out_of_range_overrides_ignored() {
        let mut settings = ScribeSettings::default();
        apply_overrides(
            &mut settings,
            lookup(&[
                ("SCRIBE_PORT", "0"),
                ("SCRIBE_PARALLELISM", "500"),
                ("SCRIBE_CHUNK_SIZE", "ten"),
                ("SCRIBE_LOG_JSON", "maybe"),
                ("SCRIBE_HOST", ""),
            ]),
        );
        let defaults = ScribeSettings::default();
        assert_eq!(settings.server.port, defaults.server.port);
        assert_eq!(settings.job.parallelism, defaults.job.parallelism);
        assert_eq!(settings.job.chunk_size, defaults.job.chunk_size);
        assert_eq!(settings.logging.json, defaults.logging.json);
        assert_eq!(settings.server.host, defaults.server.host);
    }

    // ── parsing ─────────────────────────────────────────────────────

    #[test]
    fn parse_bool_variants() {
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("nah"), None);
    }

    #[test]
    fn parse_ranges() {
        assert_eq!(parse_u16_range("8080", 1, 65535), Some(8080));
        assert_eq!(parse_u64_range("5", 10, 20), None);
        assert_eq!(parse_usize_range("-1", 0, 10), None);
    }
}
