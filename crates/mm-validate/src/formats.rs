use std::sync::LazyLock;

use mm_core::Entity;
use regex::Regex;
use serde_json::Value;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));
static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://.+").expect("valid url regex"));
static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[\d\s\-\(\)]+$").expect("valid phone regex"));

pub fn is_email(value: &Value) -> bool {
    value.as_str().is_some_and(|s| EMAIL.is_match(s))
}

pub fn is_url(value: &Value) -> bool {
    value.as_str().is_some_and(|s| URL.is_match(s))
}

pub fn is_phone(value: &Value) -> bool {
    value.as_str().is_some_and(|s| PHONE.is_match(s))
}

/// Missing, null, empty string, or `false`.
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null | Value::Bool(false)) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

/// Non-blank value at a dotted path.
pub fn present<'a>(entity: &'a Entity, path: &str) -> Option<&'a Value> {
    entity.get_path(path).filter(|v| !is_blank(Some(v)))
}

/// Character length of a string value.
pub fn char_len(value: &Value) -> Option<usize> {
    value.as_str().map(|s| s.chars().count())
}

/// Present value that is not one of `allowed`.
pub fn outside<'a>(value: Option<&'a Value>, allowed: &[&str]) -> Option<&'a Value> {
    value
        .filter(|v| !is_blank(Some(v)))
        .filter(|v| !v.as_str().is_some_and(|s| allowed.contains(&s)))
}
