//! Turning a model's dish guess into a usable title.

use regex::Regex;
use serde_json::Value as JsonValue;
use std::sync::LazyLock;

/// Reserved title meaning "the model could not name the dish".
pub const UNKNOWN_DISH: &str = "Unknown Dish";

/// Generic answers that name no dish at all (compared case-insensitively).
const PLACEHOLDER_TITLES: &[&str] = &[
    "dish",
    "food",
    "unknown",
    "none",
    "unknown dish",
    "n/a",
    "null",
];

static ALPHA_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\p{L}{3,}").unwrap());

/// Capitalized words, optionally joined by lowercase connectors
/// ("Fish and Chips", "Steak au Poivre", "Mac & Cheese").
static CAPITALIZED_RUN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\p{Lu}[\p{L}'’-]*(?:[ \t]+(?:(?:and|with|au|aux|al|alla|e|de|del|di|du|of|in|on|&)[ \t]+)?\p{Lu}[\p{L}'’-]*)*",
    )
    .unwrap()
});

static LEADING_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:dish|title|name)[ \t]*:[ \t]*").unwrap());

/// Pulls `title` out of the identification reply and sanitizes it.
#[must_use]
pub fn title_from_reply(reply: &JsonValue) -> String {
    let raw = reply
        .get("title")
        .or_else(|| reply.get("dish"))
        .and_then(JsonValue::as_str)
        .unwrap_or_default();
    sanitize_title(raw)
}

/// Reduces a raw model title to a clean dish name, or [`UNKNOWN_DISH`].
#[must_use]
pub fn sanitize_title(raw: &str) -> String {
    let trimmed = raw
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '.' || c == '!' || c == ':')
        .trim();
    let trimmed = LEADING_LABEL_RE.replace(trimmed, "");
    let trimmed = trimmed.trim_matches(|c: char| c.is_whitespace() || c == '"' || c == '\'');

    let candidate = CAPITALIZED_RUN_RE
        .find(trimmed)
        .map_or(trimmed, |m| m.as_str().trim());

    if is_placeholder(candidate) || !ALPHA_RUN_RE.is_match(candidate) {
        return UNKNOWN_DISH.to_string();
    }
    candidate.to_string()
}

#[must_use]
pub fn is_unknown(title: &str) -> bool {
    title == UNKNOWN_DISH
}

fn is_placeholder(s: &str) -> bool {
    s.is_empty() || PLACEHOLDER_TITLES.iter().any(|p| s.eq_ignore_ascii_case(p))
}
