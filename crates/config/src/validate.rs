//! Configuration validation.
//!
//! Reports syntax errors, unknown or misspelled fields, values the service
//! cannot run with, and missing credentials.

use std::path::{Path, PathBuf};

use crate::schema::LexlinkerConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "syntax", "unknown-field", "type-error", "range", "credentials"
    pub category: &'static str,
    /// Dotted path, e.g. "history.limit"
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn new(
        severity: Severity,
        category: &'static str,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result of validating a configuration file.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

/// Smallest limit that leaves room for a body next to the widest two-part
/// suffix, `"\n(Part 2/2)"`.
const MIN_CHUNK_LIMIT: usize = 12;

const KNOWN_FIELDS: &[(&str, &[&str])] = &[
    ("server", &["bind", "port", "debug_routes", "data_dir"]),
    ("history", &["limit"]),
    ("retry", &["max_attempts", "initial_delay_seconds"]),
    ("outbound", &["chunk_limit"]),
    ("provider", &["api_key", "base_url", "model"]),
    ("routing", &["classifier", "triage_model", "preamble"]),
    ("guardrails", &["input", "output", "model"]),
    ("twilio", &["account_sid", "auth_token", "phone_number", "api_base"]),
];

/// Validate a config file at the given path, or the discovered one if `path`
/// is `None`.
#[must_use]
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => crate::loader::find_config_file(),
    };

    let Some(actual_path) = config_path else {
        let mut result = ValidationResult::default();
        result.diagnostics.push(Diagnostic::new(
            Severity::Info,
            "file-ref",
            "",
            "no config file found; using defaults",
        ));
        result
            .diagnostics
            .extend(validate_config(&LexlinkerConfig::default()).diagnostics);
        return result;
    };

    let mut result = match std::fs::read_to_string(&actual_path) {
        Ok(content) => {
            let ext = actual_path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("toml");
            validate_str(&content, ext)
        },
        Err(e) => ValidationResult {
            diagnostics: vec![Diagnostic::new(
                Severity::Error,
                "syntax",
                "",
                format!("failed to read config file: {e}"),
            )],
            config_path: None,
        },
    };
    result.config_path = Some(actual_path);
    result
}

/// Validate raw config text in the format named by `ext`.
#[must_use]
pub fn validate_str(raw: &str, ext: &str) -> ValidationResult {
    let mut result = ValidationResult::default();

    let value = match parse_as(raw, ext) {
        Ok(serde_json::Value::Null) => serde_json::Value::Object(serde_json::Map::new()),
        Ok(v) => v,
        Err(message) => {
            result
                .diagnostics
                .push(Diagnostic::new(Severity::Error, "syntax", "", message));
            return result;
        },
    };

    check_unknown_fields(&value, &mut result.diagnostics);

    match serde_json::from_value::<LexlinkerConfig>(value) {
        Ok(config) => result
            .diagnostics
            .extend(validate_config(&config).diagnostics),
        Err(e) => result.diagnostics.push(Diagnostic::new(
            Severity::Error,
            "type-error",
            "",
            format!("type error: {e}"),
        )),
    }
    result
}

/// Semantic checks on an already-loaded config (after env overrides).
#[must_use]
pub fn validate_config(config: &LexlinkerConfig) -> ValidationResult {
    let mut diagnostics = Vec::new();

    if config.history.limit == 0 {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "range",
            "history.limit",
            "must be at least 1",
        ));
    }
    if config.retry.max_attempts == 0 {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "range",
            "retry.max_attempts",
            "must be at least 1",
        ));
    }
    if config.outbound.chunk_limit < MIN_CHUNK_LIMIT {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "range",
            "outbound.chunk_limit",
            format!(
                "{} leaves no room for a part suffix; use at least {MIN_CHUNK_LIMIT}",
                config.outbound.chunk_limit
            ),
        ));
    }
    if config.retry.initial_delay_seconds == 0 {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "range",
            "retry.initial_delay_seconds",
            "retries will hit the engine without any backoff",
        ));
    }

    if config.provider.api_key.is_none() {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "credentials",
            "provider.api_key",
            "no API key set (OPENAI_API_KEY); every engine call will fail",
        ));
    }

    let twilio = &config.twilio;
    let any_twilio = twilio.account_sid.is_some()
        || twilio.auth_token.is_some()
        || twilio.phone_number.is_some();
    if any_twilio && !twilio.is_configured() {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "credentials",
            "twilio",
            "incomplete Twilio credentials; outbound delivery is disabled",
        ));
    } else if !any_twilio {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "credentials",
            "twilio",
            "Twilio not configured; long replies are returned inline only",
        ));
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

fn parse_as(raw: &str, ext: &str) -> Result<serde_json::Value, String> {
    match ext {
        "toml" => toml::from_str(raw).map_err(|e| format!("TOML syntax error: {e}")),
        "yaml" | "yml" => serde_yaml::from_str(raw).map_err(|e| format!("YAML syntax error: {e}")),
        "json" => serde_json::from_str(raw).map_err(|e| format!("JSON syntax error: {e}")),
        other => Err(format!("unsupported config format: .{other}")),
    }
}

fn check_unknown_fields(value: &serde_json::Value, diagnostics: &mut Vec<Diagnostic>) {
    let Some(root) = value.as_object() else {
        if !value.is_null() {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "type-error",
                "",
                "config root must be a table",
            ));
        }
        return;
    };

    let sections: Vec<&str> = KNOWN_FIELDS.iter().map(|(name, _)| *name).collect();
    for (key, child) in root {
        let Some((_, fields)) = KNOWN_FIELDS.iter().find(|(name, _)| name == key) else {
            diagnostics.push(unknown(key, key, &sections, "at top level "));
            continue;
        };
        let Some(table) = child.as_object() else {
            continue;
        };
        for field in table.keys() {
            if !fields.contains(&field.as_str()) {
                diagnostics.push(unknown(&format!("{key}.{field}"), field, fields, ""));
            }
        }
    }
}

fn unknown(path: &str, key: &str, candidates: &[&str], level: &str) -> Diagnostic {
    let message = match suggest(key, candidates, 3) {
        Some(s) => format!("unknown field {level}(did you mean \"{s}\"?)"),
        None => format!("unknown field {level}").trim_end().to_string(),
    };
    Diagnostic::new(Severity::Error, "unknown-field", path, message)
}

/// Closest candidate within `max_distance` edits.
fn suggest<'a>(needle: &str, candidates: &[&'a str], max_distance: usize) -> Option<&'a str> {
    candidates
        .iter()
        .map(|c| (*c, levenshtein(needle, c)))
        .filter(|(_, d)| *d <= max_distance)
        .min_by_key(|(_, d)| *d)
        .map(|(c, _)| c)
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut cur = vec![i + 1; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            cur[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(cur[j] + 1);
        }
        prev = cur;
    }
    prev[b.len()]
}
