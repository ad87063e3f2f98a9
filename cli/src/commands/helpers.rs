use anyhow::{Context, Result};
use chrono::{Duration, Local, NaiveDate};
use serde::Serialize;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use mealsync_core::category::Category;
use mealsync_core::models::{MealAssignment, Recipe, ShoppingListItem, SyncReport};

/// Resolve a `--week` argument to a date inside the wanted week.
/// Accepts YYYY-MM-DD or this/last/next (default: this week).
pub(crate) fn parse_week(week: Option<&str>) -> Result<NaiveDate> {
    let today = Local::now().date_naive();
    match week.map(str::trim) {
        None | Some("this" | "today") => Ok(today),
        Some("last") => Ok(today - Duration::days(7)),
        Some("next") => Ok(today + Duration::days(7)),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("Invalid week '{s}'. Use YYYY-MM-DD or this/last/next")),
    }
}

/// "2 cup", "3", "" for an item's optional quantity and unit.
pub(crate) fn format_amount(quantity: Option<&str>, unit: Option<&str>) -> String {
    match (quantity, unit) {
        (Some(q), Some(u)) => format!("{q} {u}"),
        (Some(q), None) => q.to_string(),
        (None, Some(u)) => u.to_string(),
        (None, None) => String::new(),
    }
}

/// Group items in classifier order (Produce first, Other last), oldest first
/// within a category. Unknown labels sort with Other.
pub(crate) fn sort_by_aisle(items: &mut [ShoppingListItem]) {
    items.sort_by_key(|i| (i.category.parse().unwrap_or(Category::Other), i.id));
}

pub(crate) fn format_servings(servings: Option<f64>) -> String {
    servings.map_or("-".into(), |s| format!("{s}"))
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

/// Report a missing record and exit with status 2.
pub(crate) fn exit_not_found(message: &str, json: bool) -> ! {
    if json {
        println!("{}", json_error(message));
    } else {
        eprintln!("{message}");
    }
    process::exit(2);
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

pub(crate) fn print_recipe_table(recipes: &[Recipe]) {
    #[derive(Tabled)]
    struct RecipeRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Title")]
        title: String,
        #[tabled(rename = "Servings")]
        servings: String,
        #[tabled(rename = "Ingredients")]
        ingredients: usize,
    }

    let rows: Vec<RecipeRow> = recipes
        .iter()
        .map(|r| RecipeRow {
            id: r.id,
            title: truncate(&r.title, 40),
            servings: format_servings(r.base_servings),
            ingredients: r.ingredients.len(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..4)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn print_assignment_table(assignments: &[(MealAssignment, String)]) {
    #[derive(Tabled)]
    struct AssignmentRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Day")]
        day: String,
        #[tabled(rename = "Recipe")]
        recipe: String,
        #[tabled(rename = "Servings")]
        servings: String,
    }

    let rows: Vec<AssignmentRow> = assignments
        .iter()
        .map(|(a, title)| AssignmentRow {
            id: a.id,
            day: a.day_of_week.to_string(),
            recipe: truncate(title, 40),
            servings: format_servings(a.serving_size),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..4)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn print_item_table(items: &[ShoppingListItem]) {
    #[derive(Tabled)]
    struct ItemRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "")]
        checked: &'static str,
        #[tabled(rename = "Amount")]
        amount: String,
        #[tabled(rename = "Ingredient")]
        ingredient: String,
        #[tabled(rename = "Category")]
        category: String,
        #[tabled(rename = "Recipe")]
        recipe: String,
    }

    let rows: Vec<ItemRow> = items
        .iter()
        .map(|i| ItemRow {
            id: i.id,
            checked: if i.is_checked { "x" } else { " " },
            amount: format_amount(i.quantity.as_deref(), i.unit.as_deref()),
            ingredient: truncate(&i.ingredient, 35),
            category: i.category.clone(),
            recipe: i
                .recipe_title
                .as_deref()
                .map(|t| truncate(t, 25))
                .unwrap_or_default(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..3)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

/// Human summary of a sync report. Warnings go to stderr.
pub(crate) fn print_report(report: &SyncReport) {
    let mut parts = Vec::new();
    if report.items_inserted > 0 {
        parts.push(format!("{} item(s) listed", report.items_inserted));
    }
    if report.items_skipped > 0 {
        parts.push(format!("{} already on the list", report.items_skipped));
    }
    if report.items_deleted > 0 {
        parts.push(format!("{} item(s) removed", report.items_deleted));
    }
    if report.items_amount_differs > 0 {
        parts.push(format!(
            "{} kept at a different amount",
            report.items_amount_differs
        ));
    }
    if !parts.is_empty() {
        println!("Shopping list: {}", parts.join(", "));
    }
    for warning in &report.warnings {
        let recipe = warning
            .recipe_id
            .map(|id| format!(" (recipe {id})"))
            .unwrap_or_default();
        eprintln!("Warning: {}{recipe} failed: {}", warning.step, warning.message);
    }
    if !report.is_clean() {
        eprintln!("Run `mealsync list reconcile` to repair the shopping list.");
    }
}
