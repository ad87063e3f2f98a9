//! Quantity arithmetic on the string forms found in recipes: whole numbers,
//! decimals, fractions ("1/2") and mixed numbers ("1 1/2").

use std::sync::LazyLock;

use regex::Regex;

static FRACTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)/(\d+)$").expect("fraction pattern should be valid"));

static MIXED_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s+(\d+)/(\d+)$").expect("mixed number pattern should be valid")
});

// Longest leading decimal, the way a lenient float parser reads "2 3" as 2.
static LEADING_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?")
        .expect("leading number pattern should be valid")
});

/// Numeric value of a quantity string, `None` when it cannot be read.
#[must_use]
pub fn parse_quantity(quantity: &str) -> Option<f64> {
    let trimmed = quantity.trim();

    if let Some(caps) = FRACTION.captures(trimmed) {
        let numerator: f64 = caps[1].parse().ok()?;
        let denominator: f64 = caps[2].parse().ok()?;
        return ratio(numerator, denominator);
    }

    if let Some(caps) = MIXED_NUMBER.captures(trimmed) {
        let whole: f64 = caps[1].parse().ok()?;
        let numerator: f64 = caps[2].parse().ok()?;
        let denominator: f64 = caps[3].parse().ok()?;
        return ratio(numerator, denominator).map(|f| whole + f);
    }

    let m = LEADING_NUMBER.find(trimmed)?;
    m.as_str().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        None
    } else {
        Some(numerator / denominator)
    }
}

/// Render a quantity: whole numbers without a decimal point, everything else
/// rounded to two decimals with trailing zeros (and a bare `.`) stripped.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn format_quantity(value: f64) -> String {
    if value.fract() == 0.0 {
        return format!("{value}");
    }
    let rounded = (value * 100.0).round() / 100.0;
    let fixed = format!("{rounded:.2}");
    fixed
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

/// Multiply a quantity string by `factor`.
///
/// `None` stays `None`, a factor of exactly 1 returns the input untouched, and
/// anything that cannot be read as a number is returned unchanged.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn scale_quantity(quantity: Option<&str>, factor: f64) -> Option<String> {
    let quantity = quantity?;
    if factor == 1.0 || !factor.is_finite() {
        return Some(quantity.to_string());
    }
    let Some(value) = parse_quantity(quantity) else {
        return Some(quantity.to_string());
    };
    let scaled = value * factor;
    if !scaled.is_finite() {
        return Some(quantity.to_string());
    }
    Some(format_quantity(scaled))
}

/// Ratio between the servings a recipe is planned for and the servings it
/// was written for. Falls back to 1 when either side is missing or not positive.
#[must_use]
pub fn serving_ratio(serving_size: Option<f64>, base_servings: Option<f64>) -> f64 {
    let usable = |v: f64| v.is_finite() && v > 0.0;
    match (serving_size, base_servings) {
        (Some(size), Some(base)) if usable(size) && usable(base) => size / base,
        _ => 1.0,
    }
}
