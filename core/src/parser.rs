//! # Ingredient Line Parser
//!
//! Splits a free-text recipe line such as `"1 1/2 cups flour"` into a leading
//! quantity, an optional unit from a closed vocabulary, and the item name.
//!
//! Parsing never fails. A line without a recognizable quantity or unit comes
//! back whole as the name. The category is always computed from the full
//! original line so quantity and unit tokens cannot hide a keyword.
//!
//! ```rust
//! use mealsync_core::parser::parse_ingredient;
//!
//! let parsed = parse_ingredient("3 large eggs");
//! assert_eq!(parsed.quantity.as_deref(), Some("3"));
//! assert_eq!(parsed.unit.as_deref(), Some("large"));
//! assert_eq!(parsed.ingredient, "eggs");
//! ```

use std::sync::LazyLock;

use regex::Regex;

use crate::category::classify;
use crate::models::ParsedIngredient;

/// Units recognized right after the quantity. Size words count as units so
/// that "3 large eggs" keeps "eggs" as the item.
pub const UNITS: &[&str] = &[
    "cups", "cup", "tbsp", "tsp", "oz", "lbs", "lb", "kg", "g", "ml", "l", "large", "medium",
    "small", "cloves", "clove", "cans", "can", "packages", "package", "bunches", "bunch", "heads",
    "head",
];

// Digits, '.', '/' with internal whitespace only between numeric tokens ("1 1/2").
static QUANTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\d|\.\d)[\d./]*(?:\s+\d[\d./]*)*").expect("quantity pattern should be valid")
});

static UNIT: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!(r"(?i)^(?:{})\b", UNITS.join("|"));
    Regex::new(&pattern).expect("unit pattern should be valid")
});

/// Parse one ingredient line into quantity, unit, name and category.
#[must_use]
pub fn parse_ingredient(line: &str) -> ParsedIngredient {
    let category = classify(line);
    let trimmed = line.trim();

    let (quantity, rest) = split_quantity(trimmed);

    let (unit, name) = match UNIT.find(rest) {
        Some(m) => (Some(m.as_str()), rest[m.end()..].trim()),
        None => (None, rest),
    };

    // "2 cups" or "large": the unit word is all there is, so it is the item.
    let (unit, name) = match (unit, name.is_empty()) {
        (Some(u), true) => (None, u),
        _ => (unit, name),
    };

    if name.is_empty() {
        return ParsedIngredient {
            quantity: None,
            unit: None,
            ingredient: trimmed.to_string(),
            category,
        };
    }

    ParsedIngredient {
        quantity: quantity.map(str::to_string),
        unit: unit.map(str::to_string),
        ingredient: name.to_string(),
        category,
    }
}

/// Split off the leading quantity. The quantity must be followed by
/// whitespace or directly by a known unit ("500g"); otherwise the digits are
/// part of the name ("7up", "3-inch piece").
fn split_quantity(line: &str) -> (Option<&str>, &str) {
    let Some(m) = QUANTITY.find(line) else {
        return (None, line);
    };
    let rest = &line[m.end()..];
    let separated = rest.starts_with(char::is_whitespace);
    if rest.is_empty() || !(separated || UNIT.is_match(rest)) {
        return (None, line);
    }
    (Some(m.as_str().trim()), rest.trim_start())
}
