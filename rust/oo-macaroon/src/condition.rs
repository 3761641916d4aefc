//! First-party condition syntax.
//!
//! A condition is a kind followed by an argument, separated either by the
//! first whitespace or by the first `=`: `object=01J9ZQ`, `before
//! 2020-01-01T00:00:00Z` and `method=read` all parse.

/// Condition kind that binds a token to one stored object.
pub const OBJECT: &str = "object";

/// Condition kind that limits a token to uses before an RFC 3339 instant.
pub const BEFORE: &str = "before";

/// Condition kind that limits a token to one store method.
pub const METHOD: &str = "method";

/// Split a condition into its kind and argument.
///
/// Returns `None` when the kind is empty.
pub fn parse(condition: &str) -> Option<(&str, &str)> {
    let condition = condition.trim();
    let (kind, argument) = match condition.find(|c: char| c == '=' || c.is_whitespace()) {
        Some(index) => {
            let (kind, rest) = condition.split_at(index);
            let separator_len = rest.chars().next().map_or(0, char::len_utf8);
            (kind, rest[separator_len..].trim_start())
        }
        None => (condition, ""),
    };

    if kind.is_empty() {
        None
    } else {
        Some((kind, argument))
    }
}

/// The condition that ties a token to `object_id`.
pub fn object(object_id: &str) -> String {
    format!("{OBJECT}={object_id}")
}
