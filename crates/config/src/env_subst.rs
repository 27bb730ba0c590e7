//! `${ENV_VAR}` expansion inside parsed config documents.
//!
//! Expansion runs on string values of the parsed document tree; keys are left
//! alone and unset variables keep their placeholder.

use serde_json::Value;

/// Expand placeholders in every string value of `doc` from the process
/// environment.
pub fn substitute_env(doc: &mut Value) {
    substitute_env_with(doc, &|name: &str| std::env::var(name).ok());
}

fn substitute_env_with(doc: &mut Value, lookup: &dyn Fn(&str) -> Option<String>) {
    match doc {
        Value::String(s) if s.contains("${") => *s = expand(s, lookup),
        Value::Array(items) => {
            for item in items {
                substitute_env_with(item, lookup);
            }
        },
        Value::Object(map) => {
            for value in map.values_mut() {
                substitute_env_with(value, lookup);
            }
        },
        _ => {},
    }
}

/// Expand every closed `${NAME}` in `input`. An unclosed `${` is copied
/// through with the rest of the string.
fn expand(input: &str, lookup: &dyn Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let body = &rest[start + 2..];
        let Some(end) = body.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let name = &body[..end];
        match lookup(name).filter(|_| !name.is_empty()) {
            Some(value) => out.push_str(&value),
            None => out.push_str(&rest[start..start + end + 3]),
        }
        rest = &body[end + 1..];
    }

    out.push_str(rest);
    out
}
