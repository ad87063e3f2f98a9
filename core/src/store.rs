use std::collections::HashSet;

use anyhow::Result;

use crate::models::{
    DayOfWeek, MealAssignment, NewMealAssignment, NewShoppingListItem, Recipe, ShoppingList,
    ShoppingListItem,
};

/// Storage the sync controller runs against.
///
/// `Database` is the production implementation. Every method is a single
/// request/response call; there is no transaction spanning two calls, so the
/// controller treats each one as a separate step that may fail on its own.
pub trait PlannerStore {
    // --- Recipes ---

    fn find_recipe(&self, recipe_id: i64) -> Result<Option<Recipe>>;

    // --- Assignments ---

    fn insert_assignment(&self, assignment: &NewMealAssignment) -> Result<MealAssignment>;
    fn find_assignment(&self, assignment_id: i64) -> Result<Option<MealAssignment>>;
    fn delete_assignment(&self, assignment_id: i64) -> Result<bool>;
    fn update_assignment_day(&self, assignment_id: i64, day: DayOfWeek) -> Result<MealAssignment>;
    fn list_assignments(&self, meal_plan_id: i64) -> Result<Vec<MealAssignment>>;

    /// Distinct recipe ids assigned on `day`, captured before a bulk clear.
    fn recipe_ids_for_day(&self, meal_plan_id: i64, day: DayOfWeek) -> Result<Vec<i64>>;
    fn delete_assignments_for_day(&self, meal_plan_id: i64, day: DayOfWeek) -> Result<usize>;
    fn delete_assignments_for_plan(&self, meal_plan_id: i64) -> Result<usize>;

    fn count_assignments(&self, meal_plan_id: i64, recipe_id: i64) -> Result<usize>;

    /// Which of `recipe_ids` still have at least one assignment in the plan.
    /// One query regardless of how many ids are passed.
    fn assigned_recipe_ids(&self, meal_plan_id: i64, recipe_ids: &[i64]) -> Result<HashSet<i64>>;

    // --- Shopping lists ---

    fn find_shopping_list(&self, meal_plan_id: i64) -> Result<Option<ShoppingList>>;

    /// Create the plan's list, or return the existing one if another writer got
    /// there first.
    fn create_shopping_list(&self, household_id: &str, meal_plan_id: i64)
    -> Result<ShoppingList>;

    fn insert_shopping_item(&self, item: &NewShoppingListItem) -> Result<ShoppingListItem>;
    fn list_items(&self, shopping_list_id: i64) -> Result<Vec<ShoppingListItem>>;
    fn list_items_for_recipe(
        &self,
        shopping_list_id: i64,
        recipe_id: i64,
    ) -> Result<Vec<ShoppingListItem>>;
    fn delete_items_for_recipe(&self, shopping_list_id: i64, recipe_id: i64) -> Result<usize>;
    fn delete_all_items(&self, shopping_list_id: i64) -> Result<usize>;
}
