//! Unit aliases and same-dimension conversion, used to decide whether two
//! ingredient lines can be summed.

/// Physical dimension of a canonical unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dimension {
    /// Millilitres per unit.
    Volume(f64),
    /// Grams per unit.
    Weight(f64),
    /// Counted things (cloves, cans, "large"...). Only the identical unit is compatible.
    Count,
}

/// Canonical spelling for a unit: lowercased, trailing period dropped,
/// plural folded to singular. Unknown units are returned lowercased.
#[must_use]
pub fn normalize_unit(unit: &str) -> String {
    let lower = unit.trim().to_lowercase();
    let lower = lower.trim_end_matches('.');
    let canonical = match lower {
        "tsp" | "teaspoon" | "teaspoons" => "tsp",
        "tbsp" | "tbs" | "tablespoon" | "tablespoons" => "tbsp",
        "cup" | "cups" | "c" => "cup",
        "oz" | "ounce" | "ounces" => "oz",
        "lb" | "lbs" | "pound" | "pounds" => "lb",
        "g" | "gram" | "grams" => "g",
        "kg" | "kilogram" | "kilograms" => "kg",
        "ml" | "milliliter" | "milliliters" | "millilitre" | "millilitres" => "ml",
        "l" | "liter" | "liters" | "litre" | "litres" => "l",
        "clove" | "cloves" => "clove",
        "can" | "cans" => "can",
        "package" | "packages" | "pkg" => "package",
        "bunch" | "bunches" => "bunch",
        "head" | "heads" => "head",
        "slice" | "slices" => "slice",
        "piece" | "pieces" => "piece",
        other => other,
    };
    canonical.to_string()
}

/// Dimension of an already-canonical unit, `None` when unknown.
#[must_use]
pub fn dimension(canonical: &str) -> Option<Dimension> {
    match canonical {
        "ml" => Some(Dimension::Volume(1.0)),
        "l" => Some(Dimension::Volume(1000.0)),
        "tsp" => Some(Dimension::Volume(4.929)),
        "tbsp" => Some(Dimension::Volume(14.787)),
        "cup" => Some(Dimension::Volume(236.588)),
        "g" => Some(Dimension::Weight(1.0)),
        "kg" => Some(Dimension::Weight(1000.0)),
        "oz" => Some(Dimension::Weight(28.3495)),
        "lb" => Some(Dimension::Weight(453.592)),
        "clove" | "can" | "package" | "bunch" | "head" | "slice" | "piece" | "large"
        | "medium" | "small" => Some(Dimension::Count),
        _ => None,
    }
}

/// Convert `quantity` expressed in `from` into `to`. Both may be raw
/// spellings. Returns `None` when the units cannot be summed.
#[must_use]
pub fn convert(quantity: f64, from: &str, to: &str) -> Option<f64> {
    let from = normalize_unit(from);
    let to = normalize_unit(to);
    if from == to {
        return Some(quantity);
    }
    match (dimension(&from)?, dimension(&to)?) {
        (Dimension::Volume(a), Dimension::Volume(b))
        | (Dimension::Weight(a), Dimension::Weight(b)) => Some(quantity * a / b),
        _ => None,
    }
}

#[must_use]
pub fn are_compatible(a: &str, b: &str) -> bool {
    convert(1.0, a, b).is_some()
}
