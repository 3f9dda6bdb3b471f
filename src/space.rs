//! Namespace ("space") selection and `USE` directive tracking.
//!
//! A session's active space is sticky: it is whatever the last executed
//! `USE` left behind. Matching is plain text, so a `USE x;` inside a quoted
//! string literal also counts. Callers rely on that behavior.

use std::sync::OnceLock;

use regex::Regex;

/// Picks the target space: method-level, then interface-level, then the
/// process default. Empty strings count as unset.
pub fn resolve_space<'a>(
    interface_space: Option<&'a str>,
    method_space: Option<&'a str>,
    default_space: &'a str,
) -> &'a str {
    method_space
        .filter(|s| !s.is_empty())
        .or_else(|| interface_space.filter(|s| !s.is_empty()))
        .unwrap_or(default_space)
}

fn use_directive() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)\bUSE\s+(\S+);").expect("use directive pattern"))
}

/// Returns the target of the last `USE <space>;` directive in `text`.
pub fn last_use_directive(text: &str) -> Option<&str> {
    use_directive()
        .captures_iter(text)
        .last()
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Prepends `USE <target>;` unless the session already sits in `target`.
///
/// An empty target is never injected.
pub fn with_use_prefix(text: &str, session_space: Option<&str>, target: &str) -> String {
    if target.is_empty() || session_space == Some(target) {
        text.to_string()
    } else {
        format!("USE {target};\n{}", text.trim_start())
    }
}

/// Space a session sits in after successfully executing `submitted`.
///
/// The last directive wins; without one the resolved target applies, and an
/// empty target leaves the previous value untouched.
pub fn space_after(submitted: &str, previous: Option<&str>, target: &str) -> Option<String> {
    match last_use_directive(submitted) {
        Some(space) => Some(space.to_string()),
        None if target.is_empty() => previous.map(str::to_string),
        None => Some(target.to_string()),
    }
}
