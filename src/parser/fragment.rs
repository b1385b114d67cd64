//! Locating `{"entities": [...]}` blocks inside free-form model output.

use regex::Regex;
use std::sync::LazyLock;

/// Opening marker of a reasoning block.
pub const THINK_OPEN: &str = "<think>";
/// Closing marker of a reasoning block.
pub const THINK_CLOSE: &str = "</think>";

/// Single nesting level only: the inner run stops at the first `]`.
static ENTITIES_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{\s*"entities"\s*:\s*\[([^\]]*)\]\s*\}"#).expect("entities pattern is valid")
});

/// Drop a leading reasoning block.
///
/// Everything up to and including the first closing marker is removed. An
/// opening marker without a closing one leaves the text untouched.
pub fn strip_reasoning(text: &str) -> &str {
    if !text.contains(THINK_OPEN) {
        return text;
    }
    match text.find(THINK_CLOSE) {
        Some(end) => &text[end + THINK_CLOSE.len()..],
        None => text,
    }
}

/// Return the inner list text of every entities block, in order of appearance.
pub fn find_entity_fragments(text: &str) -> Vec<&str> {
    ENTITIES_BLOCK
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .collect()
}
