use std::fmt;
use std::str::FromStr;

use anyhow::{Result, bail};
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::category::Category;

// --- Parsed ingredient types ---

/// Structured form of a single free-text recipe line.
///
/// `quantity` and `unit` are `None` when the line has no recognizable leading
/// numeral or unit; `category` is always populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedIngredient {
    pub quantity: Option<String>,
    pub unit: Option<String>,
    pub ingredient: String,
    pub category: Category,
}

/// A parsed ingredient plus the recipe it came from. Only lives inside one
/// merge batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeableItem {
    pub ingredient: String,
    pub quantity: Option<String>,
    pub unit: Option<String>,
    pub category: Category,
    pub recipe_id: Option<i64>,
    pub recipe_title: Option<String>,
}

impl MergeableItem {
    #[must_use]
    pub fn from_parsed(parsed: ParsedIngredient, recipe_id: i64, recipe_title: &str) -> Self {
        Self {
            ingredient: parsed.ingredient,
            quantity: parsed.quantity,
            unit: parsed.unit,
            category: parsed.category,
            recipe_id: Some(recipe_id),
            recipe_title: Some(recipe_title.to_string()),
        }
    }
}

// --- Recipes ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    pub id: i64,
    pub title: String,
    pub ingredients: Vec<String>,
    pub base_servings: Option<f64>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewRecipe {
    pub title: String,
    pub ingredients: Vec<String>,
    pub base_servings: Option<f64>,
}

// --- Meal plans ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
        DayOfWeek::Sunday,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DayOfWeek::Monday => "monday",
            DayOfWeek::Tuesday => "tuesday",
            DayOfWeek::Wednesday => "wednesday",
            DayOfWeek::Thursday => "thursday",
            DayOfWeek::Friday => "friday",
            DayOfWeek::Saturday => "saturday",
            DayOfWeek::Sunday => "sunday",
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DayOfWeek {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "monday" | "mon" => Ok(DayOfWeek::Monday),
            "tuesday" | "tue" => Ok(DayOfWeek::Tuesday),
            "wednesday" | "wed" => Ok(DayOfWeek::Wednesday),
            "thursday" | "thu" => Ok(DayOfWeek::Thursday),
            "friday" | "fri" => Ok(DayOfWeek::Friday),
            "saturday" | "sat" => Ok(DayOfWeek::Saturday),
            "sunday" | "sun" => Ok(DayOfWeek::Sunday),
            _ => bail!("Invalid day '{s}'. Use monday-sunday or mon-sun"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MealPlan {
    pub id: i64,
    pub household_id: String,
    pub week_start: NaiveDate,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MealAssignment {
    pub id: i64,
    pub meal_plan_id: i64,
    pub recipe_id: i64,
    pub day_of_week: DayOfWeek,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serving_size: Option<f64>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewMealAssignment {
    pub meal_plan_id: i64,
    pub recipe_id: i64,
    pub day_of_week: DayOfWeek,
    pub serving_size: Option<f64>,
}

/// Household and meal plan an engine call operates on. Passed explicitly to
/// every sync call instead of being read from session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanContext {
    pub household_id: String,
    pub meal_plan_id: i64,
}

impl PlanContext {
    #[must_use]
    pub fn new(household_id: impl Into<String>, meal_plan_id: i64) -> Self {
        Self {
            household_id: household_id.into(),
            meal_plan_id,
        }
    }
}

// --- Shopping lists ---

#[derive(Debug, Clone, Serialize)]
pub struct ShoppingList {
    pub id: i64,
    pub household_id: String,
    pub meal_plan_id: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShoppingListItem {
    pub id: i64,
    pub uuid: String,
    pub shopping_list_id: i64,
    pub ingredient: String,
    pub quantity: Option<String>,
    pub unit: Option<String>,
    pub category: String,
    pub recipe_id: Option<i64>,
    pub recipe_title: Option<String>,
    pub is_checked: bool,
    pub created_at: String,
}

/// Row to insert. There is no `is_checked` field: new rows always start
/// unchecked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewShoppingListItem {
    pub shopping_list_id: i64,
    pub ingredient: String,
    pub quantity: Option<String>,
    pub unit: Option<String>,
    pub category: String,
    pub recipe_id: Option<i64>,
    pub recipe_title: Option<String>,
}

impl NewShoppingListItem {
    #[must_use]
    pub fn from_mergeable(shopping_list_id: i64, item: MergeableItem) -> Self {
        Self {
            shopping_list_id,
            ingredient: item.ingredient,
            quantity: item.quantity,
            unit: item.unit,
            category: item.category.to_string(),
            recipe_id: item.recipe_id,
            recipe_title: item.recipe_title,
        }
    }
}

// --- Assignment events and sync reporting ---

/// Assignment lifecycle events delivered by the meal-planning layer.
#[derive(Debug, Clone, PartialEq)]
pub enum AssignmentEvent {
    Add {
        recipe_id: i64,
        day: DayOfWeek,
        serving_size: Option<f64>,
    },
    Remove {
        assignment_id: i64,
    },
    Move {
        assignment_id: i64,
        day: DayOfWeek,
    },
    ClearDay {
        day: DayOfWeek,
    },
    ClearWeek,
}

/// Shopping-list step of a sync saga. Failures in these steps are soft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStep {
    LoadRecipe,
    ResolveList,
    LoadExisting,
    InsertItem,
    CountRemaining,
    DeleteItems,
}

impl fmt::Display for SyncStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncStep::LoadRecipe => "load recipe",
            SyncStep::ResolveList => "resolve shopping list",
            SyncStep::LoadExisting => "load existing items",
            SyncStep::InsertItem => "insert item",
            SyncStep::CountRemaining => "count remaining assignments",
            SyncStep::DeleteItems => "delete items",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncWarning {
    pub step: SyncStep,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipe_id: Option<i64>,
    pub message: String,
}

/// Outcome of one assignment event or reconciliation pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment: Option<MealAssignment>,
    pub assignments_removed: usize,
    pub items_inserted: usize,
    pub items_skipped: usize,
    /// Skipped entries whose listed amount differs from this assignment's
    /// scaled amount. The list keeps the amount it already has.
    pub items_amount_differs: usize,
    pub items_deleted: usize,
    pub recipes_unlisted: Vec<i64>,
    pub warnings: Vec<SyncWarning>,
}

impl SyncReport {
    /// True when every shopping-list step succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    pub(crate) fn warn(&mut self, step: SyncStep, recipe_id: Option<i64>, err: &anyhow::Error) {
        log::warn!("Shopping-list sync step '{step}' failed (recipe {recipe_id:?}): {err:#}");
        self.warnings.push(SyncWarning {
            step,
            recipe_id,
            message: format!("{err:#}"),
        });
    }
}

// --- Validation ---

pub fn validate_serving_size(serving_size: f64) -> Result<f64> {
    if !serving_size.is_finite() || serving_size <= 0.0 {
        bail!("Serving size must be a positive number (got {serving_size})");
    }
    Ok(serving_size)
}

pub fn validate_recipe(recipe: &NewRecipe) -> Result<()> {
    if recipe.title.trim().is_empty() {
        bail!("Recipe title must not be empty");
    }
    if let Some(base) = recipe.base_servings {
        validate_serving_size(base)?;
    }
    Ok(())
}

/// Monday of the week containing `date`. Meal plans are keyed by this.
#[must_use]
pub fn week_start_for(date: NaiveDate) -> NaiveDate {
    let offset = i64::from(date.weekday().num_days_from_monday());
    date - Duration::days(offset)
}
