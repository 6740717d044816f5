//! Small shared helpers.

pub mod html;
pub mod mime;

/// Format count with noun, handling pluralization.
///
/// `plural_count(1, "record")` -> `"1 record"`, `plural_count(3, "relay")` -> `"3 relays"`.
#[inline]
pub fn plural_count(count: usize, noun: &str) -> String {
    let suffix = if count == 1 { "" } else { "s" };
    format!("{count} {noun}{suffix}")
}
