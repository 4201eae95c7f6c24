//! One-time code input format.
//!
//! Operators type the code as `code12345`. This is a client-side format
//! check, not a security boundary.

use std::sync::LazyLock;

use regex::Regex;

/// Literal prefix every code submission starts with.
pub const CODE_PREFIX: &str = "code";

static CODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^code([0-9]+)$").expect("static login code regex is valid")
});

/// Extract the digits from a `code<digits>` submission.
pub fn parse_login_code(input: &str) -> Option<&str> {
    CODE_RE
        .captures(input.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}
