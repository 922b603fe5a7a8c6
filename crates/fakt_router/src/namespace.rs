//! Namespace extraction from generated sources.

use once_cell::sync::Lazy;
use regex::Regex;

static PACKAGE_DECL: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*package[ \t]+([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*)").ok()
});

/// Returns the first `package a.b.c` declaration that starts a line.
///
/// Declarations indented with spaces or tabs still count; text after the name
/// (a semicolon, a comment) is ignored.
pub fn extract_namespace(content: &str) -> Option<String> {
    let re = PACKAGE_DECL.as_ref()?;
    re.captures(content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Splits a dotted namespace into its non-empty segments.
pub fn segments(namespace: &str) -> Vec<&str> {
    namespace.split('.').filter(|s| !s.is_empty()).collect()
}
