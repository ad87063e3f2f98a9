use anyhow::Result;

use mealsync_core::models::NewRecipe;
use mealsync_core::parser::parse_ingredient;
use mealsync_core::service::PlannerService;

use super::helpers::{exit_not_found, format_amount, format_servings, print_recipe_table};

pub(crate) fn cmd_recipe_add(
    svc: &PlannerService,
    title: &str,
    servings: Option<f64>,
    ingredients: Vec<String>,
    json: bool,
) -> Result<()> {
    let recipe = svc.create_recipe(&NewRecipe {
        title: title.trim().to_string(),
        ingredients,
        base_servings: servings,
    })?;
    if json {
        println!("{}", serde_json::to_string_pretty(&recipe)?);
    } else {
        let id = recipe.id;
        let count = recipe.ingredients.len();
        println!("Created recipe: {title} (id: {id}, {count} ingredient(s))");
        println!("Plan it with: mealsync plan add {id} <day>");
    }
    Ok(())
}

pub(crate) fn cmd_recipe_list(svc: &PlannerService, json: bool) -> Result<()> {
    let recipes = svc.list_recipes()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&recipes)?);
        return Ok(());
    }
    if recipes.is_empty() {
        println!("No recipes yet. Create one with: mealsync recipe add <title> -i <line>");
        return Ok(());
    }
    print_recipe_table(&recipes);
    Ok(())
}

pub(crate) fn cmd_recipe_show(svc: &PlannerService, id: i64, json: bool) -> Result<()> {
    let Some(recipe) = svc.find_recipe(id)? else {
        exit_not_found(&format!("Recipe {id} not found"), json);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&recipe)?);
        return Ok(());
    }

    let title = &recipe.title;
    let servings = format_servings(recipe.base_servings);
    println!("{title} (id: {id}, servings: {servings})");
    println!();
    for line in &recipe.ingredients {
        let parsed = parse_ingredient(line);
        let amount = format_amount(parsed.quantity.as_deref(), parsed.unit.as_deref());
        let ingredient = &parsed.ingredient;
        let category = parsed.category;
        if amount.is_empty() {
            println!("  {ingredient}  [{category}]");
        } else {
            println!("  {amount} {ingredient}  [{category}]");
        }
    }
    Ok(())
}
