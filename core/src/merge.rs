//! Consolidates duplicate lines within one recipe's contribution to a
//! shopping list.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::MergeableItem;
use crate::scale::{format_quantity, parse_quantity};
use crate::units::{convert, normalize_unit};

static DESCRIPTORS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:fresh|frozen|dried|chopped|diced|sliced|minced|crushed|ground|shredded|grated|peeled|boneless|skinless|raw|cooked|uncooked|organic|finely|roughly|coarsely)\b",
    )
    .expect("descriptor pattern should be valid")
});

static PARENTHETICAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(.*?\)").expect("parenthetical pattern should be valid"));

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern should be valid"));

/// Comparison key for an ingredient name: lowercased, preparation words,
/// parenthetical notes and anything after a comma removed, last word naively
/// singularized.
#[must_use]
pub fn normalize_ingredient_name(name: &str) -> String {
    let lower = name.to_lowercase();
    let without_notes = PARENTHETICAL.replace_all(&lower, " ");
    let head = without_notes.split(',').next().unwrap_or_default();
    let stripped = DESCRIPTORS.replace_all(head, " ");
    let collapsed = WHITESPACE.replace_all(stripped.trim(), " ");

    if collapsed.is_empty() {
        return lower.trim().to_string();
    }
    singularize(&collapsed)
}

fn singularize(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies") {
        return format!("{stem}y");
    }
    if let Some(stem) = word.strip_suffix("ves") {
        return format!("{stem}f");
    }
    if let Some(stem) = word.strip_suffix("oes") {
        return format!("{stem}o");
    }
    if word.ends_with("ss") || word.ends_with("ses") {
        return word.to_string();
    }
    match word.strip_suffix('s') {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => word.to_string(),
    }
}

/// Merge one batch of items.
///
/// Items with the same recipe and normalized name are summed when both
/// quantities are readable and their units are compatible (identical after
/// alias folding, or both volume or both weight). The later quantity is
/// converted into the unit of the entry already kept. Identical entries without
/// any quantity collapse into one. Everything else is kept as a separate entry.
/// Output keeps first-occurrence order and provenance.
#[must_use]
pub fn merge_items(items: Vec<MergeableItem>) -> Vec<MergeableItem> {
    let mut merged: Vec<MergeableItem> = Vec::with_capacity(items.len());
    let mut by_key: HashMap<(Option<i64>, String), Vec<usize>> = HashMap::new();

    for item in items {
        let key = (item.recipe_id, normalize_ingredient_name(&item.ingredient));
        let candidates = by_key.entry(key).or_default();
        let absorbed = candidates
            .iter()
            .any(|&pos| absorb(&mut merged[pos], &item));
        if !absorbed {
            candidates.push(merged.len());
            merged.push(item);
        }
    }

    merged
}

/// Fold `item` into `existing` if they can be combined.
fn absorb(existing: &mut MergeableItem, item: &MergeableItem) -> bool {
    let same_unit = match (&existing.unit, &item.unit) {
        (None, None) => true,
        (Some(a), Some(b)) => normalize_unit(a) == normalize_unit(b),
        _ => false,
    };

    match (&existing.quantity, &item.quantity) {
        (None, None) => same_unit,
        (Some(kept), Some(incoming)) => {
            let (Some(kept_value), Some(incoming_value)) =
                (parse_quantity(kept), parse_quantity(incoming))
            else {
                return false;
            };
            let converted = match (&existing.unit, &item.unit) {
                (None, None) => Some(incoming_value),
                (Some(to), Some(from)) => convert(incoming_value, from, to),
                _ => None,
            };
            match converted {
                Some(value) => {
                    existing.quantity = Some(format_quantity(kept_value + value));
                    true
                }
                None => false,
            }
        }
        _ => false,
    }
}
