//! Configuration validation engine.
//!
//! Validates configuration files (any supported format) against the known
//! schema, detects
//! unknown/misspelled fields, and reports values that will misbehave at
//! runtime.

use std::{collections::HashMap, path::Path};

use serde_json::Value;

use crate::{
    loader::{ConfigFormat, resolve},
    schema::SapfireConfig,
};

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
    /// Category: "syntax", "unknown-field", "type-error", "value", "credentials"
    pub category: &'static str,
    /// Dotted path, e.g. "settings.locale.langauge"
    pub path: String,
    pub message: String,
}

/// Result of validating a configuration file.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<std::path::PathBuf>,
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

// ── Schema tree for unknown-field detection ─────────────────────────────────

/// Expected shape of the configuration schema.
enum KnownKeys {
    /// A struct with fixed field names.
    Struct(HashMap<&'static str, KnownKeys>),
    /// Scalar or list value — stop recursion.
    Leaf,
}

/// Build the full schema map mirroring every field in `schema.rs`.
fn build_schema_map() -> KnownKeys {
    use KnownKeys::{Leaf, Struct};

    let user = Struct(HashMap::from([
        ("id", Leaf),
        ("name", Leaf),
        ("username", Leaf),
        ("color", Leaf),
    ]));

    let gemini = Struct(HashMap::from([
        ("api_key", Leaf),
        ("base_url", Leaf),
        ("text_model", Leaf),
        ("image_model", Leaf),
        ("image_aspect_ratio", Leaf),
    ]));

    let chat = Struct(HashMap::from([
        ("image_prefix", Leaf),
        ("greeting", Leaf),
        ("fallback_reply", Leaf),
        ("image_failure_reply", Leaf),
    ]));

    let settings = Struct(HashMap::from([
        (
            "appearance",
            Struct(HashMap::from([
                ("theme", Leaf),
                ("accent_color", Leaf),
                ("animations_enabled", Leaf),
                ("compact_mode", Leaf),
                ("font_size", Leaf),
                ("mood_theme", Leaf),
            ])),
        ),
        (
            "notifications",
            Struct(HashMap::from([
                ("sound", Leaf),
                ("preview", Leaf),
                ("vibrate", Leaf),
                ("stories", Leaf),
                ("calls", Leaf),
                ("groups", Leaf),
                ("dnd", Leaf),
            ])),
        ),
        (
            "privacy",
            Struct(HashMap::from([
                ("last_seen", Leaf),
                ("read_receipts", Leaf),
                ("profile_visibility", Leaf),
                ("incognito_chat", Leaf),
                ("ghost_mode", Leaf),
                ("hide_phone_number", Leaf),
                ("block_list", Leaf),
            ])),
        ),
        (
            "locale",
            Struct(HashMap::from([
                ("language", Leaf),
                ("time_format", Leaf),
                ("timezone", Leaf),
            ])),
        ),
    ]));

    Struct(HashMap::from([
        ("user", user),
        ("providers", Struct(HashMap::from([("gemini", gemini)]))),
        ("chat", chat),
        ("settings", settings),
        ("storage", Struct(HashMap::from([("data_dir", Leaf)]))),
    ]))
}

// ── Levenshtein distance ────────────────────────────────────────────────────

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Closest candidate within `max_distance` edits, if any.
fn suggest<'a>(needle: &str, candidates: &[&'a str], max_distance: usize) -> Option<&'a str> {
    let mut best: Option<(&'a str, usize)> = None;
    for &candidate in candidates {
        let d = levenshtein(needle, candidate);
        if d > 0 && d <= max_distance && best.as_ref().is_none_or(|(_, bd)| d < *bd) {
            best = Some((candidate, d));
        }
    }
    best.map(|(s, _)| s)
}

/// Check that dotted `key` names a single value in the schema.
pub fn check_settable_key(key: &str) -> anyhow::Result<()> {
    let schema = build_schema_map();
    let mut node = &schema;
    let mut walked = String::new();
    for segment in key.split('.') {
        let KnownKeys::Struct(fields) = node else {
            anyhow::bail!("{walked} is a value, not a section");
        };
        node = match fields.get(segment) {
            Some(child) => child,
            None => {
                let known: Vec<&str> = fields.keys().copied().collect();
                match suggest(segment, &known, 3) {
                    Some(s) => anyhow::bail!("unknown config key: {key} (did you mean \"{s}\"?)"),
                    None => anyhow::bail!("unknown config key: {key}"),
                }
            },
        };
        if !walked.is_empty() {
            walked.push('.');
        }
        walked.push_str(segment);
    }
    match node {
        KnownKeys::Leaf => Ok(()),
        KnownKeys::Struct(_) => anyhow::bail!("{key} is a section, not a value"),
    }
}

// ── Core validation ─────────────────────────────────────────────────────────

/// Validate a config file at the given path, or discover the default config
/// file location if `path` is `None`.
#[must_use]
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => crate::loader::find_config_file(),
    };

    let Some(ref actual_path) = config_path else {
        return ValidationResult {
            diagnostics: vec![Diagnostic {
                severity: Severity::Info,
                category: "syntax",
                path: String::new(),
                message: "no config file found; using defaults".into(),
            }],
            config_path: None,
        };
    };

    let format = match ConfigFormat::from_path(actual_path) {
        Ok(format) => format,
        Err(e) => {
            return ValidationResult {
                diagnostics: vec![Diagnostic {
                    severity: Severity::Error,
                    category: "syntax",
                    path: String::new(),
                    message: e.to_string(),
                }],
                config_path: Some(actual_path.clone()),
            };
        },
    };

    match std::fs::read_to_string(actual_path) {
        Ok(content) => {
            let mut result = validate_str(&content, format);
            result.config_path = Some(actual_path.clone());
            result
        },
        Err(e) => ValidationResult {
            diagnostics: vec![Diagnostic {
                severity: Severity::Error,
                category: "syntax",
                path: String::new(),
                message: format!("failed to read config file: {e}"),
            }],
            config_path: Some(actual_path.clone()),
        },
    }
}

/// Validate a TOML string without touching the file system.
#[must_use]
pub fn validate_toml_str(toml_str: &str) -> ValidationResult {
    validate_str(toml_str, ConfigFormat::Toml)
}

/// Validate config text in `format` without touching the file system.
#[must_use]
pub fn validate_str(content: &str, format: ConfigFormat) -> ValidationResult {
    let mut diagnostics = Vec::new();

    let doc = match format.parse(content) {
        Ok(doc) => doc,
        Err(e) => {
            diagnostics.push(Diagnostic {
                severity: Severity::Error,
                category: "syntax",
                path: String::new(),
                message: format!("{} syntax error: {e}", format.name()),
            });
            return ValidationResult {
                diagnostics,
                config_path: None,
            };
        },
    };

    let schema = build_schema_map();
    check_unknown_fields(&doc, &schema, "", &mut diagnostics);

    match resolve(doc) {
        Ok(config) => check_semantic_warnings(&config, &mut diagnostics),
        Err(e) => diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "type-error",
            path: String::new(),
            message: format!("type error: {e}"),
        }),
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

/// Walk the document tree against the schema tree and flag unknown keys.
fn check_unknown_fields(
    value: &Value,
    schema: &KnownKeys,
    prefix: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let (Value::Object(table), KnownKeys::Struct(fields)) = (value, schema) else {
        return;
    };
    let known_keys: Vec<&str> = fields.keys().copied().collect();
    for (key, child_value) in table {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        if let Some(child_schema) = fields.get(key.as_str()) {
            check_unknown_fields(child_value, child_schema, &path, diagnostics);
            continue;
        }
        let level = if prefix.is_empty() {
            "at top level "
        } else {
            ""
        };
        let msg = match suggest(key, &known_keys, 3) {
            Some(s) => format!("unknown field {level}(did you mean \"{s}\"?)"),
            None => format!("unknown field {level}"),
        };
        diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "unknown-field",
            path,
            message: msg.trim().to_string(),
        });
    }
}

fn is_hex_color(value: &str) -> bool {
    let Some(hex) = value.strip_prefix('#') else {
        return false;
    };
    matches!(hex.len(), 3 | 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit())
}

fn check_semantic_warnings(config: &SapfireConfig, diagnostics: &mut Vec<Diagnostic>) {
    if config.user.id.trim().is_empty() {
        diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "value",
            path: "user.id".into(),
            message: "user id must not be empty".into(),
        });
    }

    for (path, color) in [
        ("user.color", &config.user.color),
        (
            "settings.appearance.accent_color",
            &config.settings.appearance.accent_color,
        ),
    ] {
        if !is_hex_color(color) {
            diagnostics.push(Diagnostic {
                severity: Severity::Warning,
                category: "value",
                path: path.into(),
                message: format!("\"{color}\" is not a #rgb/#rrggbb color"),
            });
        }
    }

    let prefix = &config.chat.image_prefix;
    if prefix.trim().is_empty() {
        diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "value",
            path: "chat.image_prefix".into(),
            message: "image prefix must not be empty".into(),
        });
    } else if prefix.chars().any(char::is_whitespace) {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            category: "value",
            path: "chat.image_prefix".into(),
            message: "image prefix contains whitespace and can never match a command".into(),
        });
    }

    let gemini = &config.providers.gemini;
    if !gemini.base_url.starts_with("http://") && !gemini.base_url.starts_with("https://") {
        diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "value",
            path: "providers.gemini.base_url".into(),
            message: format!("\"{}\" is not an http(s) URL", gemini.base_url),
        });
    }

    let env_has_key = ["GEMINI_API_KEY", "API_KEY"]
        .iter()
        .any(|k| std::env::var(k).is_ok_and(|v| !v.trim().is_empty()));
    if !gemini.has_api_key() && !env_has_key {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            category: "credentials",
            path: "providers.gemini.api_key".into(),
            message: "no Gemini API key configured (set api_key or GEMINI_API_KEY)".into(),
        });
    }

    let font_size = config.settings.appearance.font_size;
    if !(10..=24).contains(&font_size) {
        diagnostics.push(Diagnostic {
            severity: Severity::Info,
            category: "value",
            path: "settings.appearance.font_size".into(),
            message: format!("font size {font_size} is outside the usual 10-24 range"),
        });
    }
}
