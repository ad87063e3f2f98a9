use anyhow::{Result, bail};
use serde::Serialize;

use mealsync_core::parser::parse_ingredient;
use mealsync_core::scale::scale_quantity;

pub(crate) fn cmd_parse(line: &str, json: bool) -> Result<()> {
    let parsed = parse_ingredient(line);
    if json {
        println!("{}", serde_json::to_string_pretty(&parsed)?);
        return Ok(());
    }
    println!("Quantity:   {}", parsed.quantity.as_deref().unwrap_or("-"));
    println!("Unit:       {}", parsed.unit.as_deref().unwrap_or("-"));
    println!("Ingredient: {}", parsed.ingredient);
    println!("Category:   {}", parsed.category);
    Ok(())
}

pub(crate) fn cmd_scale(quantity: &str, factor: f64, json: bool) -> Result<()> {
    #[derive(Serialize)]
    struct Scaled<'a> {
        quantity: &'a str,
        factor: f64,
        scaled: Option<String>,
    }

    if !factor.is_finite() {
        bail!("Factor must be a finite number");
    }
    let scaled = scale_quantity(Some(quantity), factor);
    if json {
        let out = Scaled {
            quantity,
            factor,
            scaled,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{}", scaled.as_deref().unwrap_or(quantity));
    }
    Ok(())
}
