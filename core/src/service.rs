use std::path::Path;

use anyhow::{Result, bail};
use chrono::NaiveDate;

use crate::db::Database;
use crate::models::{
    AssignmentEvent, MealAssignment, MealPlan, NewRecipe, NewShoppingListItem, PlanContext,
    Recipe, ShoppingList, ShoppingListItem, SyncReport, validate_recipe, validate_serving_size,
    week_start_for,
};
use crate::parser::parse_ingredient;
use crate::store::PlannerStore;
use crate::sync::{ShoppingListSync, SyncOptions};

/// Entry point for callers: owns the database and runs every assignment
/// change through the shopping-list sync controller.
pub struct PlannerService {
    db: Database,
    options: SyncOptions,
}

impl PlannerService {
    pub fn new(db_path: &str) -> Result<Self> {
        let db = Database::open(Path::new(db_path))?;
        Ok(Self {
            db,
            options: SyncOptions::default(),
        })
    }

    pub fn new_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self {
            db,
            options: SyncOptions::default(),
        })
    }

    #[must_use]
    pub fn with_sync_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    fn sync(&self) -> ShoppingListSync<'_, Database> {
        ShoppingListSync::new(&self.db, self.options)
    }

    // --- Recipes ---

    pub fn create_recipe(&self, recipe: &NewRecipe) -> Result<Recipe> {
        validate_recipe(recipe)?;
        self.db.insert_recipe(recipe)
    }

    pub fn get_recipe(&self, id: i64) -> Result<Recipe> {
        self.db.get_recipe(id)
    }

    pub fn find_recipe(&self, id: i64) -> Result<Option<Recipe>> {
        self.db.find_recipe(id)
    }

    pub fn list_recipes(&self) -> Result<Vec<Recipe>> {
        self.db.list_recipes()
    }

    // --- Meal plans ---

    /// Plan for the week containing `date`; weeks start on Monday.
    pub fn get_or_create_meal_plan(&self, household_id: &str, date: NaiveDate) -> Result<MealPlan> {
        let household_id = household_id.trim();
        if household_id.is_empty() {
            bail!("Household id must not be empty");
        }
        self.db
            .get_or_create_meal_plan(household_id, week_start_for(date))
    }

    pub fn plan_context(&self, household_id: &str, date: NaiveDate) -> Result<PlanContext> {
        let plan = self.get_or_create_meal_plan(household_id, date)?;
        Ok(PlanContext::new(plan.household_id, plan.id))
    }

    /// Context of the plan an existing assignment belongs to, `None` if the
    /// assignment does not exist.
    pub fn assignment_context(&self, assignment_id: i64) -> Result<Option<PlanContext>> {
        let Some(assignment) = self.db.find_assignment(assignment_id)? else {
            return Ok(None);
        };
        let plan = self.db.get_meal_plan(assignment.meal_plan_id)?;
        Ok(Some(PlanContext::new(plan.household_id, plan.id)))
    }

    pub fn list_assignments(&self, meal_plan_id: i64) -> Result<Vec<MealAssignment>> {
        self.db.list_assignments(meal_plan_id)
    }

    // --- Assignment events ---

    pub fn apply_event(&self, ctx: &PlanContext, event: AssignmentEvent) -> Result<SyncReport> {
        self.sync().apply(ctx, event)
    }

    /// Items already on the list keep the quantities they were listed with.
    pub fn update_serving_size(
        &self,
        assignment_id: i64,
        serving_size: Option<f64>,
    ) -> Result<MealAssignment> {
        if let Some(size) = serving_size {
            validate_serving_size(size)?;
        }
        self.db.update_assignment_serving(assignment_id, serving_size)
    }

    pub fn reconcile(&self, ctx: &PlanContext) -> Result<SyncReport> {
        self.sync().reconcile(ctx)
    }

    // --- Shopping list ---

    pub fn shopping_list(&self, meal_plan_id: i64) -> Result<Option<ShoppingList>> {
        self.db.find_shopping_list(meal_plan_id)
    }

    pub fn list_items(&self, meal_plan_id: i64) -> Result<Vec<ShoppingListItem>> {
        match self.db.find_shopping_list(meal_plan_id)? {
            Some(list) => self.db.list_items(list.id),
            None => Ok(Vec::new()),
        }
    }

    /// Add a free-text line that does not come from a recipe. The line is
    /// parsed and classified like a recipe ingredient.
    pub fn add_manual_item(&self, ctx: &PlanContext, line: &str) -> Result<ShoppingListItem> {
        if line.trim().is_empty() {
            bail!("Item must not be empty");
        }
        let list = self
            .db
            .create_shopping_list(&ctx.household_id, ctx.meal_plan_id)?;
        let parsed = parse_ingredient(line);
        self.db.insert_shopping_item(&NewShoppingListItem {
            shopping_list_id: list.id,
            ingredient: parsed.ingredient,
            quantity: parsed.quantity,
            unit: parsed.unit,
            category: parsed.category.to_string(),
            recipe_id: None,
            recipe_title: None,
        })
    }

    pub fn find_item(&self, item_id: i64) -> Result<Option<ShoppingListItem>> {
        self.db.find_shopping_item(item_id)
    }

    pub fn toggle_item(&self, item_id: i64) -> Result<ShoppingListItem> {
        self.db.toggle_item(item_id)
    }

    pub fn remove_item(&self, item_id: i64) -> Result<bool> {
        self.db.delete_item(item_id)
    }

    pub fn clear_checked_items(&self, meal_plan_id: i64) -> Result<usize> {
        match self.db.find_shopping_list(meal_plan_id)? {
            Some(list) => self.db.delete_checked_items(list.id),
            None => Ok(0),
        }
    }
}
