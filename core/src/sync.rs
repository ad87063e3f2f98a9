//! # Shopping-List Sync Controller
//!
//! Keeps a meal plan's shopping list consistent with its assignments: every
//! recipe with at least one assignment in the plan has items on the list, and
//! a recipe with none has no items left.
//!
//! Each event runs as a fixed sequence of steps against a [`PlannerStore`]
//! with no transaction spanning them:
//!
//! 1. The assignment mutation itself. A failure here is returned as `Err` and
//!    nothing else runs.
//! 2. The shopping-list steps. A failure here does not undo step 1. It is
//!    logged, recorded as a [`SyncWarning`](crate::models::SyncWarning) in the
//!    returned [`SyncReport`], and the remaining steps continue where that is
//!    safe. Running [`ShoppingListSync::reconcile`] later repairs the list.
//!
//! Deletes are always preceded by a remaining-assignment lookup. If that
//! lookup fails nothing is deleted, so a failure can over-list but never drop
//! items another assignment still needs.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use anyhow::{Result, anyhow, bail};
use serde::Serialize;

use crate::merge::{merge_items, normalize_ingredient_name};
use crate::models::{
    AssignmentEvent, DayOfWeek, MealAssignment, MergeableItem, NewMealAssignment,
    NewShoppingListItem, PlanContext, Recipe, ShoppingList, SyncReport, SyncStep,
    validate_serving_size,
};
use crate::parser::parse_ingredient;
use crate::scale::{scale_quantity, serving_ratio};
use crate::store::PlannerStore;

/// What to do when a recipe that is already on the list is assigned again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Insert only entries whose `(list, recipe, normalized name)` key is not
    /// already present.
    #[default]
    SkipExisting,
    /// Insert a fresh set of rows for every assignment.
    Append,
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicatePolicy::SkipExisting => f.write_str("skip"),
            DuplicatePolicy::Append => f.write_str("append"),
        }
    }
}

impl FromStr for DuplicatePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "skip" | "skip_existing" | "skip-existing" => Ok(DuplicatePolicy::SkipExisting),
            "append" => Ok(DuplicatePolicy::Append),
            _ => bail!("Invalid duplicate policy '{s}'. Use skip or append"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    pub duplicate_policy: DuplicatePolicy,
}

/// Parse, scale and merge a recipe's ingredient lines for one assignment.
#[must_use]
pub fn recipe_items(recipe: &Recipe, serving_size: Option<f64>) -> Vec<MergeableItem> {
    let factor = serving_ratio(serving_size, recipe.base_servings);
    let items = recipe
        .ingredients
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let mut parsed = parse_ingredient(line);
            parsed.quantity = scale_quantity(parsed.quantity.as_deref(), factor);
            MergeableItem::from_parsed(parsed, recipe.id, &recipe.title)
        })
        .collect();
    merge_items(items)
}

pub struct ShoppingListSync<'a, S: PlannerStore + ?Sized> {
    store: &'a S,
    options: SyncOptions,
}

impl<'a, S: PlannerStore + ?Sized> ShoppingListSync<'a, S> {
    #[must_use]
    pub fn new(store: &'a S, options: SyncOptions) -> Self {
        Self { store, options }
    }

    /// Apply one assignment event to the plan in `ctx`.
    pub fn apply(&self, ctx: &PlanContext, event: AssignmentEvent) -> Result<SyncReport> {
        log::debug!("Applying {event:?} to meal plan {}", ctx.meal_plan_id);
        match event {
            AssignmentEvent::Add {
                recipe_id,
                day,
                serving_size,
            } => self.add(ctx, recipe_id, day, serving_size),
            AssignmentEvent::Remove { assignment_id } => self.remove(ctx, assignment_id),
            AssignmentEvent::Move { assignment_id, day } => {
                self.move_assignment(ctx, assignment_id, day)
            }
            AssignmentEvent::ClearDay { day } => self.clear_day(ctx, day),
            AssignmentEvent::ClearWeek => self.clear_week(ctx),
        }
    }

    // --- Events ---

    fn add(
        &self,
        ctx: &PlanContext,
        recipe_id: i64,
        day: DayOfWeek,
        serving_size: Option<f64>,
    ) -> Result<SyncReport> {
        if let Some(size) = serving_size {
            validate_serving_size(size)?;
        }
        let Some(recipe) = self.store.find_recipe(recipe_id)? else {
            bail!("Recipe {recipe_id} not found");
        };

        let assignment = self.store.insert_assignment(&NewMealAssignment {
            meal_plan_id: ctx.meal_plan_id,
            recipe_id,
            day_of_week: day,
            serving_size,
        })?;
        log::info!(
            "Assigned '{}' to {day} in meal plan {} (assignment {})",
            recipe.title,
            ctx.meal_plan_id,
            assignment.id
        );

        let mut report = SyncReport {
            assignment: Some(assignment),
            ..SyncReport::default()
        };
        self.list_recipe(
            ctx,
            &recipe,
            serving_size,
            self.options.duplicate_policy,
            &mut report,
        );
        Ok(report)
    }

    fn remove(&self, ctx: &PlanContext, assignment_id: i64) -> Result<SyncReport> {
        let assignment = self.assignment_in_plan(ctx, assignment_id)?;
        if !self.store.delete_assignment(assignment_id)? {
            bail!("Assignment {assignment_id} not found");
        }
        log::info!(
            "Removed assignment {assignment_id} (recipe {}) from meal plan {}",
            assignment.recipe_id,
            ctx.meal_plan_id
        );

        let mut report = SyncReport {
            assignments_removed: 1,
            ..SyncReport::default()
        };

        let recipe_id = assignment.recipe_id;
        match self.store.count_assignments(ctx.meal_plan_id, recipe_id) {
            Ok(0) => self.unlist(ctx, &[recipe_id], &mut report),
            Ok(remaining) => log::debug!(
                "Recipe {recipe_id} still has {remaining} assignment(s), keeping its items"
            ),
            Err(e) => report.warn(SyncStep::CountRemaining, Some(recipe_id), &e),
        }
        Ok(report)
    }

    fn move_assignment(
        &self,
        ctx: &PlanContext,
        assignment_id: i64,
        day: DayOfWeek,
    ) -> Result<SyncReport> {
        self.assignment_in_plan(ctx, assignment_id)?;
        let moved = self.store.update_assignment_day(assignment_id, day)?;
        log::info!("Moved assignment {assignment_id} to {day}");
        Ok(SyncReport {
            assignment: Some(moved),
            ..SyncReport::default()
        })
    }

    fn clear_day(&self, ctx: &PlanContext, day: DayOfWeek) -> Result<SyncReport> {
        let affected = self.store.recipe_ids_for_day(ctx.meal_plan_id, day)?;
        let removed = self
            .store
            .delete_assignments_for_day(ctx.meal_plan_id, day)?;
        log::info!(
            "Cleared {removed} assignment(s) on {day} from meal plan {}",
            ctx.meal_plan_id
        );

        let mut report = SyncReport {
            assignments_removed: removed,
            ..SyncReport::default()
        };
        if affected.is_empty() {
            return Ok(report);
        }

        match self.store.assigned_recipe_ids(ctx.meal_plan_id, &affected) {
            Ok(remaining) => {
                let orphaned: Vec<i64> = affected
                    .into_iter()
                    .filter(|id| !remaining.contains(id))
                    .collect();
                self.unlist(ctx, &orphaned, &mut report);
            }
            Err(e) => report.warn(SyncStep::CountRemaining, None, &e),
        }
        Ok(report)
    }

    /// Every assignment goes, so the list is emptied without reference
    /// counting. Manual items go with it.
    fn clear_week(&self, ctx: &PlanContext) -> Result<SyncReport> {
        let removed = self.store.delete_assignments_for_plan(ctx.meal_plan_id)?;
        log::info!(
            "Cleared {removed} assignment(s) from meal plan {}",
            ctx.meal_plan_id
        );

        let mut report = SyncReport {
            assignments_removed: removed,
            ..SyncReport::default()
        };

        let list = match self.store.find_shopping_list(ctx.meal_plan_id) {
            Ok(Some(list)) => list,
            Ok(None) => return Ok(report),
            Err(e) => {
                report.warn(SyncStep::ResolveList, None, &e);
                return Ok(report);
            }
        };
        match self.store.delete_all_items(list.id) {
            Ok(n) => report.items_deleted = n,
            Err(e) => report.warn(SyncStep::DeleteItems, None, &e),
        }
        Ok(report)
    }

    // --- Reconciliation ---

    /// Repair the plan's list after earlier soft failures.
    ///
    /// Lists the missing entries of every assigned recipe, scaled by its first
    /// assignment's serving size, and deletes the items of every recipe that
    /// has no assignment left. Entries already on the list are skipped
    /// whatever the configured [`DuplicatePolicy`]. Items without a recipe are
    /// left alone. Read failures before any write are returned as `Err`.
    pub fn reconcile(&self, ctx: &PlanContext) -> Result<SyncReport> {
        let assignments = self.store.list_assignments(ctx.meal_plan_id)?;
        let list = self.store.find_shopping_list(ctx.meal_plan_id)?;
        let items = match &list {
            Some(list) => self.store.list_items(list.id)?,
            None => Vec::new(),
        };

        let mut report = SyncReport::default();

        let mut assigned: HashSet<i64> = HashSet::new();
        let first_assignments: Vec<&MealAssignment> = assignments
            .iter()
            .filter(|a| assigned.insert(a.recipe_id))
            .collect();

        // partially listed recipes only get their missing entries
        for assignment in first_assignments {
            match self.store.find_recipe(assignment.recipe_id) {
                Ok(Some(recipe)) => self.list_recipe(
                    ctx,
                    &recipe,
                    assignment.serving_size,
                    DuplicatePolicy::SkipExisting,
                    &mut report,
                ),
                Ok(None) => report.warn(
                    SyncStep::LoadRecipe,
                    Some(assignment.recipe_id),
                    &anyhow!("Recipe {} not found", assignment.recipe_id),
                ),
                Err(e) => report.warn(SyncStep::LoadRecipe, Some(assignment.recipe_id), &e),
            }
        }

        let mut orphaned: Vec<i64> = Vec::new();
        for item in &items {
            if let Some(recipe_id) = item.recipe_id {
                if !assigned.contains(&recipe_id) && !orphaned.contains(&recipe_id) {
                    orphaned.push(recipe_id);
                }
            }
        }
        if let Some(list) = &list {
            self.delete_recipe_items(list, &orphaned, &mut report);
        }

        log::info!(
            "Reconciled meal plan {}: {} inserted, {} deleted",
            ctx.meal_plan_id,
            report.items_inserted,
            report.items_deleted
        );
        Ok(report)
    }

    // --- Shopping-list steps ---

    fn assignment_in_plan(&self, ctx: &PlanContext, assignment_id: i64) -> Result<MealAssignment> {
        let Some(assignment) = self.store.find_assignment(assignment_id)? else {
            bail!("Assignment {assignment_id} not found");
        };
        if assignment.meal_plan_id != ctx.meal_plan_id {
            bail!(
                "Assignment {assignment_id} belongs to meal plan {}, not {}",
                assignment.meal_plan_id,
                ctx.meal_plan_id
            );
        }
        Ok(assignment)
    }

    fn resolve_list(&self, ctx: &PlanContext) -> Result<ShoppingList> {
        if let Some(list) = self.store.find_shopping_list(ctx.meal_plan_id)? {
            return Ok(list);
        }
        log::debug!("Creating shopping list for meal plan {}", ctx.meal_plan_id);
        self.store
            .create_shopping_list(&ctx.household_id, ctx.meal_plan_id)
    }

    /// Unlisted -> Listed. Every failure in here is soft.
    fn list_recipe(
        &self,
        ctx: &PlanContext,
        recipe: &Recipe,
        serving_size: Option<f64>,
        policy: DuplicatePolicy,
        report: &mut SyncReport,
    ) {
        let items = recipe_items(recipe, serving_size);
        if items.is_empty() {
            log::debug!("Recipe {} has no ingredients, nothing to list", recipe.id);
            return;
        }

        let list = match self.resolve_list(ctx) {
            Ok(list) => list,
            Err(e) => {
                report.warn(SyncStep::ResolveList, Some(recipe.id), &e);
                return;
            }
        };

        // normalized name -> (quantity, unit) of every row already listed
        let mut existing: HashMap<String, Vec<(Option<String>, Option<String>)>> = HashMap::new();
        if policy == DuplicatePolicy::SkipExisting {
            match self.store.list_items_for_recipe(list.id, recipe.id) {
                Ok(rows) => {
                    for row in rows {
                        existing
                            .entry(normalize_ingredient_name(&row.ingredient))
                            .or_default()
                            .push((row.quantity, row.unit));
                    }
                }
                // without the key set, insert everything rather than nothing
                Err(e) => report.warn(SyncStep::LoadExisting, Some(recipe.id), &e),
            }
        }

        let (mut inserted, mut skipped, mut differs) = (0, 0, 0);
        for item in items {
            if let Some(listed) = existing.get(&normalize_ingredient_name(&item.ingredient)) {
                skipped += 1;
                let same_amount = listed
                    .iter()
                    .any(|(quantity, unit)| *quantity == item.quantity && *unit == item.unit);
                if !same_amount {
                    differs += 1;
                    log::warn!(
                        "'{}' of recipe {} is already listed with a different amount, keeping it",
                        item.ingredient,
                        recipe.id
                    );
                }
                continue;
            }
            let row = NewShoppingListItem::from_mergeable(list.id, item);
            match self.store.insert_shopping_item(&row) {
                Ok(_) => inserted += 1,
                Err(e) => report.warn(SyncStep::InsertItem, Some(recipe.id), &e),
            }
        }
        report.items_inserted += inserted;
        report.items_skipped += skipped;
        report.items_amount_differs += differs;

        log::info!(
            "Listed '{}' on shopping list {}: {inserted} inserted, {skipped} skipped",
            recipe.title,
            list.id
        );
    }

    /// Listed -> Unlisted for recipes already confirmed to have no
    /// assignment left.
    fn unlist(&self, ctx: &PlanContext, recipe_ids: &[i64], report: &mut SyncReport) {
        if recipe_ids.is_empty() {
            return;
        }
        match self.store.find_shopping_list(ctx.meal_plan_id) {
            Ok(Some(list)) => self.delete_recipe_items(&list, recipe_ids, report),
            Ok(None) => {}
            Err(e) => report.warn(SyncStep::ResolveList, None, &e),
        }
    }

    fn delete_recipe_items(&self, list: &ShoppingList, recipe_ids: &[i64], report: &mut SyncReport) {
        for &recipe_id in recipe_ids {
            match self.store.delete_items_for_recipe(list.id, recipe_id) {
                Ok(n) => {
                    log::debug!("Deleted {n} item(s) of recipe {recipe_id} from list {}", list.id);
                    report.items_deleted += n;
                    report.recipes_unlisted.push(recipe_id);
                }
                Err(e) => report.warn(SyncStep::DeleteItems, Some(recipe_id), &e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use chrono::NaiveDate;

    use super::*;
    use crate::db::Database;
    use crate::models::{NewRecipe, ShoppingListItem};

    fn week() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
    }

    fn setup() -> (Database, PlanContext) {
        let db = Database::open_in_memory().unwrap();
        let plan = db.get_or_create_meal_plan("home", week()).unwrap();
        (db, PlanContext::new("home", plan.id))
    }

    fn recipe(db: &Database, title: &str, lines: &[&str], base: Option<f64>) -> Recipe {
        db.insert_recipe(&NewRecipe {
            title: title.to_string(),
            ingredients: lines.iter().map(|l| (*l).to_string()).collect(),
            base_servings: base,
        })
        .unwrap()
    }

    fn pancakes(db: &Database) -> Recipe {
        recipe(db, "Pancakes", &["2 cups flour", "1 tsp salt"], Some(4.0))
    }

    fn add(day: DayOfWeek, recipe_id: i64) -> AssignmentEvent {
        AssignmentEvent::Add {
            recipe_id,
            day,
            serving_size: None,
        }
    }

    fn items(db: &Database, ctx: &PlanContext) -> Vec<ShoppingListItem> {
        match db.find_shopping_list(ctx.meal_plan_id).unwrap() {
            Some(list) => db.list_items(list.id).unwrap(),
            None => Vec::new(),
        }
    }

    fn items_for(db: &Database, ctx: &PlanContext, recipe_id: i64) -> usize {
        items(db, ctx)
            .iter()
            .filter(|i| i.recipe_id == Some(recipe_id))
            .count()
    }

    #[test]
    fn test_recipe_items_scales_and_classifies() {
        let (db, _) = setup();
        let r = pancakes(&db);
        let items = recipe_items(&r, Some(8.0));
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].quantity.as_deref(), Some("4"));
        assert_eq!(items[0].unit.as_deref(), Some("cups"));
        assert_eq!(items[0].ingredient, "flour");
        assert_eq!(items[1].quantity.as_deref(), Some("2"));
        assert_eq!(items[1].recipe_title.as_deref(), Some("Pancakes"));
    }

    #[test]
    fn test_recipe_items_merges_duplicates() {
        let (db, _) = setup();
        let r = recipe(
            &db,
            "Cookies",
            &["1 cup sugar", "1/2 cup sugar", "", "2 eggs"],
            None,
        );
        let items = recipe_items(&r, Some(3.0));
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].quantity.as_deref(), Some("1.5"));
    }

    #[test]
    fn test_add_lists_scaled_items() {
        let (db, ctx) = setup();
        let r = pancakes(&db);
        let sync = ShoppingListSync::new(&db, SyncOptions::default());

        let report = sync
            .apply(
                &ctx,
                AssignmentEvent::Add {
                    recipe_id: r.id,
                    day: DayOfWeek::Monday,
                    serving_size: Some(8.0),
                },
            )
            .unwrap();
        assert!(report.is_clean());
        assert_eq!(report.items_inserted, 2);
        assert_eq!(report.assignment.unwrap().serving_size, Some(8.0));

        let listed = items(&db, &ctx);
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].ingredient, "flour");
        assert_eq!(listed[0].quantity.as_deref(), Some("4"));
        assert_eq!(listed[0].category, "Pantry");
        assert_eq!(listed[1].ingredient, "salt");
        assert_eq!(listed[1].quantity.as_deref(), Some("2"));
        assert_eq!(listed[1].category, "Spices");
        assert!(listed.iter().all(|i| i.recipe_id == Some(r.id) && !i.is_checked));
    }

    #[test]
    fn test_add_unknown_recipe_fails_without_assignment() {
        let (db, ctx) = setup();
        let sync = ShoppingListSync::new(&db, SyncOptions::default());
        assert!(sync.apply(&ctx, add(DayOfWeek::Monday, 99)).is_err());
        assert!(db.list_assignments(ctx.meal_plan_id).unwrap().is_empty());
    }

    #[test]
    fn test_add_rejects_bad_serving_size() {
        let (db, ctx) = setup();
        let r = pancakes(&db);
        let sync = ShoppingListSync::new(&db, SyncOptions::default());
        let event = AssignmentEvent::Add {
            recipe_id: r.id,
            day: DayOfWeek::Monday,
            serving_size: Some(0.0),
        };
        assert!(sync.apply(&ctx, event).is_err());
        assert!(db.list_assignments(ctx.meal_plan_id).unwrap().is_empty());
    }

    #[test]
    fn test_add_recipe_without_ingredients() {
        let (db, ctx) = setup();
        let r = recipe(&db, "Leftovers", &[], None);
        let sync = ShoppingListSync::new(&db, SyncOptions::default());
        let report = sync.apply(&ctx, add(DayOfWeek::Monday, r.id)).unwrap();
        assert!(report.assignment.is_some());
        assert_eq!(report.items_inserted, 0);
        assert!(db.find_shopping_list(ctx.meal_plan_id).unwrap().is_none());
    }

    #[test]
    fn test_second_assignment_skips_existing() {
        let (db, ctx) = setup();
        let r = pancakes(&db);
        let sync = ShoppingListSync::new(&db, SyncOptions::default());
        sync.apply(&ctx, add(DayOfWeek::Monday, r.id)).unwrap();
        let report = sync.apply(&ctx, add(DayOfWeek::Tuesday, r.id)).unwrap();
        assert_eq!(report.items_inserted, 0);
        assert_eq!(report.items_skipped, 2);
        assert_eq!(report.items_amount_differs, 0);
        assert_eq!(items_for(&db, &ctx, r.id), 2);
    }

    #[test]
    fn test_skip_reports_larger_serving_size() {
        let (db, ctx) = setup();
        let r = pancakes(&db);
        let sync = ShoppingListSync::new(&db, SyncOptions::default());
        sync.apply(&ctx, add(DayOfWeek::Monday, r.id)).unwrap();
        let report = sync
            .apply(
                &ctx,
                AssignmentEvent::Add {
                    recipe_id: r.id,
                    day: DayOfWeek::Saturday,
                    serving_size: Some(8.0),
                },
            )
            .unwrap();
        assert!(report.is_clean());
        assert_eq!(report.items_inserted, 0);
        assert_eq!(report.items_skipped, 2);
        assert_eq!(report.items_amount_differs, 2);

        // the first assignment's amounts stay
        let listed = items(&db, &ctx);
        assert_eq!(listed.len(), 2);
        let flour = listed.iter().find(|i| i.ingredient == "flour").unwrap();
        assert_eq!(flour.quantity.as_deref(), Some("2"));
    }

    #[test]
    fn test_second_assignment_appends() {
        let (db, ctx) = setup();
        let r = pancakes(&db);
        let sync = ShoppingListSync::new(
            &db,
            SyncOptions {
                duplicate_policy: DuplicatePolicy::Append,
            },
        );
        sync.apply(&ctx, add(DayOfWeek::Monday, r.id)).unwrap();
        let report = sync.apply(&ctx, add(DayOfWeek::Tuesday, r.id)).unwrap();
        assert_eq!(report.items_inserted, 2);
        assert_eq!(items_for(&db, &ctx, r.id), 4);
    }

    #[test]
    fn test_remove_keeps_items_while_sibling_remains() {
        let (db, ctx) = setup();
        let r = pancakes(&db);
        let sync = ShoppingListSync::new(&db, SyncOptions::default());
        let monday = sync
            .apply(&ctx, add(DayOfWeek::Monday, r.id))
            .unwrap()
            .assignment
            .unwrap();
        let thursday = sync
            .apply(&ctx, add(DayOfWeek::Thursday, r.id))
            .unwrap()
            .assignment
            .unwrap();
        let before = items(&db, &ctx);

        let report = sync
            .apply(
                &ctx,
                AssignmentEvent::Remove {
                    assignment_id: monday.id,
                },
            )
            .unwrap();
        assert_eq!(report.assignments_removed, 1);
        assert_eq!(report.items_deleted, 0);
        let after = items(&db, &ctx);
        assert_eq!(
            before.iter().map(|i| i.id).collect::<Vec<_>>(),
            after.iter().map(|i| i.id).collect::<Vec<_>>()
        );

        let report = sync
            .apply(
                &ctx,
                AssignmentEvent::Remove {
                    assignment_id: thursday.id,
                },
            )
            .unwrap();
        assert_eq!(report.items_deleted, 2);
        assert_eq!(report.recipes_unlisted, vec![r.id]);
        assert_eq!(items_for(&db, &ctx, r.id), 0);
    }

    #[test]
    fn test_remove_only_touches_its_recipe() {
        let (db, ctx) = setup();
        let r1 = pancakes(&db);
        let r2 = recipe(&db, "Salad", &["1 head lettuce"], None);
        let sync = ShoppingListSync::new(&db, SyncOptions::default());
        let a = sync
            .apply(&ctx, add(DayOfWeek::Monday, r1.id))
            .unwrap()
            .assignment
            .unwrap();
        sync.apply(&ctx, add(DayOfWeek::Monday, r2.id)).unwrap();

        sync.apply(&ctx, AssignmentEvent::Remove { assignment_id: a.id })
            .unwrap();
        assert_eq!(items_for(&db, &ctx, r1.id), 0);
        assert_eq!(items_for(&db, &ctx, r2.id), 1);
    }

    #[test]
    fn test_remove_unknown_assignment() {
        let (db, ctx) = setup();
        let sync = ShoppingListSync::new(&db, SyncOptions::default());
        let err = sync
            .apply(&ctx, AssignmentEvent::Remove { assignment_id: 7 })
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_assignment_from_other_plan_is_rejected() {
        let (db, ctx) = setup();
        let r = pancakes(&db);
        let next_week = db
            .get_or_create_meal_plan("home", week() + chrono::Duration::days(7))
            .unwrap();
        let other = PlanContext::new("home", next_week.id);
        let sync = ShoppingListSync::new(&db, SyncOptions::default());
        let a = sync
            .apply(&other, add(DayOfWeek::Monday, r.id))
            .unwrap()
            .assignment
            .unwrap();

        assert!(
            sync.apply(&ctx, AssignmentEvent::Remove { assignment_id: a.id })
                .is_err()
        );
        assert!(db.find_assignment(a.id).unwrap().is_some());
    }

    #[test]
    fn test_move_changes_day_only() {
        let (db, ctx) = setup();
        let r = pancakes(&db);
        let sync = ShoppingListSync::new(&db, SyncOptions::default());
        let a = sync
            .apply(&ctx, add(DayOfWeek::Monday, r.id))
            .unwrap()
            .assignment
            .unwrap();
        let before = items(&db, &ctx).len();

        let report = sync
            .apply(
                &ctx,
                AssignmentEvent::Move {
                    assignment_id: a.id,
                    day: DayOfWeek::Saturday,
                },
            )
            .unwrap();
        assert_eq!(
            report.assignment.unwrap().day_of_week,
            DayOfWeek::Saturday
        );
        assert_eq!(report.items_inserted + report.items_deleted, 0);
        assert_eq!(items(&db, &ctx).len(), before);
    }

    #[test]
    fn test_clear_day_keeps_recipes_assigned_elsewhere() {
        let (db, ctx) = setup();
        let shared = pancakes(&db);
        let monday_only = recipe(&db, "Soup", &["1 can tomato soup"], None);
        let sync = ShoppingListSync::new(&db, SyncOptions::default());
        sync.apply(&ctx, add(DayOfWeek::Monday, shared.id)).unwrap();
        sync.apply(&ctx, add(DayOfWeek::Monday, monday_only.id))
            .unwrap();
        sync.apply(&ctx, add(DayOfWeek::Wednesday, shared.id))
            .unwrap();

        let report = sync
            .apply(
                &ctx,
                AssignmentEvent::ClearDay {
                    day: DayOfWeek::Monday,
                },
            )
            .unwrap();
        assert_eq!(report.assignments_removed, 2);
        assert_eq!(report.recipes_unlisted, vec![monday_only.id]);
        assert_eq!(items_for(&db, &ctx, shared.id), 2);
        assert_eq!(items_for(&db, &ctx, monday_only.id), 0);

        let report = sync
            .apply(
                &ctx,
                AssignmentEvent::ClearDay {
                    day: DayOfWeek::Wednesday,
                },
            )
            .unwrap();
        assert_eq!(report.recipes_unlisted, vec![shared.id]);
        assert_eq!(items_for(&db, &ctx, shared.id), 0);
    }

    #[test]
    fn test_clear_empty_day() {
        let (db, ctx) = setup();
        let sync = ShoppingListSync::new(&db, SyncOptions::default());
        let report = sync
            .apply(
                &ctx,
                AssignmentEvent::ClearDay {
                    day: DayOfWeek::Friday,
                },
            )
            .unwrap();
        assert_eq!(report.assignments_removed, 0);
        assert!(report.is_clean());
    }

    #[test]
    fn test_clear_week_empties_list() {
        let (db, ctx) = setup();
        let r = pancakes(&db);
        let sync = ShoppingListSync::new(&db, SyncOptions::default());
        sync.apply(&ctx, add(DayOfWeek::Monday, r.id)).unwrap();
        sync.apply(&ctx, add(DayOfWeek::Friday, r.id)).unwrap();

        let report = sync.apply(&ctx, AssignmentEvent::ClearWeek).unwrap();
        assert_eq!(report.assignments_removed, 2);
        assert_eq!(report.items_deleted, 2);
        assert!(items(&db, &ctx).is_empty());
        assert!(db.list_assignments(ctx.meal_plan_id).unwrap().is_empty());
    }

    #[test]
    fn test_sync_never_touches_checked_flag() {
        let (db, ctx) = setup();
        let r = pancakes(&db);
        let soup = recipe(&db, "Soup", &["1 can tomato soup"], None);
        let sync = ShoppingListSync::new(&db, SyncOptions::default());
        sync.apply(&ctx, add(DayOfWeek::Monday, r.id)).unwrap();
        let flour = items(&db, &ctx)[0].id;
        db.set_item_checked(flour, true).unwrap();

        sync.apply(&ctx, add(DayOfWeek::Tuesday, r.id)).unwrap();
        sync.apply(&ctx, add(DayOfWeek::Tuesday, soup.id)).unwrap();
        sync.reconcile(&ctx).unwrap();

        assert!(db.get_shopping_item(flour).unwrap().is_checked);
    }

    #[test]
    fn test_reconcile_repairs_list() {
        let (db, ctx) = setup();
        let r1 = pancakes(&db);
        let r2 = recipe(&db, "Salad", &["1 head lettuce"], Some(2.0));

        // r1 assigned without listing, r2 listed without assignment
        db.insert_assignment(&NewMealAssignment {
            meal_plan_id: ctx.meal_plan_id,
            recipe_id: r1.id,
            day_of_week: DayOfWeek::Monday,
            serving_size: Some(8.0),
        })
        .unwrap();
        let list = db.create_shopping_list("home", ctx.meal_plan_id).unwrap();
        for item in recipe_items(&r2, None) {
            db.insert_shopping_item(&NewShoppingListItem::from_mergeable(list.id, item))
                .unwrap();
        }
        db.insert_shopping_item(&NewShoppingListItem {
            shopping_list_id: list.id,
            ingredient: "napkins".to_string(),
            quantity: None,
            unit: None,
            category: "Other".to_string(),
            recipe_id: None,
            recipe_title: None,
        })
        .unwrap();

        let sync = ShoppingListSync::new(&db, SyncOptions::default());
        let report = sync.reconcile(&ctx).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.items_inserted, 2);
        assert_eq!(report.items_deleted, 1);
        assert_eq!(report.recipes_unlisted, vec![r2.id]);

        let listed = items(&db, &ctx);
        assert_eq!(items_for(&db, &ctx, r1.id), 2);
        assert_eq!(items_for(&db, &ctx, r2.id), 0);
        assert!(listed.iter().any(|i| i.ingredient == "napkins"));
        let flour = listed.iter().find(|i| i.ingredient == "flour").unwrap();
        assert_eq!(flour.quantity.as_deref(), Some("4"));

        // already consistent
        let again = sync.reconcile(&ctx).unwrap();
        assert_eq!(again.items_inserted + again.items_deleted, 0);
        assert_eq!(again.items_skipped, 2);
    }

    #[test]
    fn test_reconcile_never_duplicates_with_append() {
        let (db, ctx) = setup();
        let r = pancakes(&db);
        let sync = ShoppingListSync::new(
            &db,
            SyncOptions {
                duplicate_policy: DuplicatePolicy::Append,
            },
        );
        sync.apply(&ctx, add(DayOfWeek::Monday, r.id)).unwrap();
        sync.apply(&ctx, add(DayOfWeek::Tuesday, r.id)).unwrap();
        assert_eq!(items_for(&db, &ctx, r.id), 4);

        let report = sync.reconcile(&ctx).unwrap();
        assert_eq!(report.items_inserted, 0);
        assert_eq!(report.items_skipped, 2);
        assert_eq!(items_for(&db, &ctx, r.id), 4);
    }

    // --- Partial failure ---

    #[derive(Default)]
    struct Faults {
        insert_item_after: Option<usize>,
        count: bool,
        batch_count: bool,
        create_list: bool,
        delete_items: bool,
    }

    /// Wraps a real database and fails selected calls.
    struct FlakyStore {
        db: Database,
        faults: Faults,
        inserts: Cell<usize>,
        count_calls: Cell<usize>,
        batch_calls: Cell<usize>,
    }

    impl FlakyStore {
        fn new(db: Database, faults: Faults) -> Self {
            Self {
                db,
                faults,
                inserts: Cell::new(0),
                count_calls: Cell::new(0),
                batch_calls: Cell::new(0),
            }
        }
    }

    impl PlannerStore for FlakyStore {
        fn find_recipe(&self, recipe_id: i64) -> Result<Option<Recipe>> {
            self.db.find_recipe(recipe_id)
        }
        fn insert_assignment(&self, assignment: &NewMealAssignment) -> Result<MealAssignment> {
            self.db.insert_assignment(assignment)
        }
        fn find_assignment(&self, assignment_id: i64) -> Result<Option<MealAssignment>> {
            self.db.find_assignment(assignment_id)
        }
        fn delete_assignment(&self, assignment_id: i64) -> Result<bool> {
            self.db.delete_assignment(assignment_id)
        }
        fn update_assignment_day(
            &self,
            assignment_id: i64,
            day: DayOfWeek,
        ) -> Result<MealAssignment> {
            self.db.update_assignment_day(assignment_id, day)
        }
        fn list_assignments(&self, meal_plan_id: i64) -> Result<Vec<MealAssignment>> {
            self.db.list_assignments(meal_plan_id)
        }
        fn recipe_ids_for_day(&self, meal_plan_id: i64, day: DayOfWeek) -> Result<Vec<i64>> {
            self.db.recipe_ids_for_day(meal_plan_id, day)
        }
        fn delete_assignments_for_day(&self, meal_plan_id: i64, day: DayOfWeek) -> Result<usize> {
            self.db.delete_assignments_for_day(meal_plan_id, day)
        }
        fn delete_assignments_for_plan(&self, meal_plan_id: i64) -> Result<usize> {
            self.db.delete_assignments_for_plan(meal_plan_id)
        }
        fn count_assignments(&self, meal_plan_id: i64, recipe_id: i64) -> Result<usize> {
            self.count_calls.set(self.count_calls.get() + 1);
            if self.faults.count {
                bail!("connection reset");
            }
            self.db.count_assignments(meal_plan_id, recipe_id)
        }
        fn assigned_recipe_ids(
            &self,
            meal_plan_id: i64,
            recipe_ids: &[i64],
        ) -> Result<HashSet<i64>> {
            self.batch_calls.set(self.batch_calls.get() + 1);
            if self.faults.batch_count {
                bail!("connection reset");
            }
            self.db.assigned_recipe_ids(meal_plan_id, recipe_ids)
        }
        fn find_shopping_list(&self, meal_plan_id: i64) -> Result<Option<ShoppingList>> {
            self.db.find_shopping_list(meal_plan_id)
        }
        fn create_shopping_list(
            &self,
            household_id: &str,
            meal_plan_id: i64,
        ) -> Result<ShoppingList> {
            if self.faults.create_list {
                bail!("read-only database");
            }
            self.db.create_shopping_list(household_id, meal_plan_id)
        }
        fn insert_shopping_item(&self, item: &NewShoppingListItem) -> Result<ShoppingListItem> {
            let n = self.inserts.get();
            self.inserts.set(n + 1);
            if self.faults.insert_item_after.is_some_and(|limit| n >= limit) {
                bail!("disk full");
            }
            self.db.insert_shopping_item(item)
        }
        fn list_items(&self, shopping_list_id: i64) -> Result<Vec<ShoppingListItem>> {
            self.db.list_items(shopping_list_id)
        }
        fn list_items_for_recipe(
            &self,
            shopping_list_id: i64,
            recipe_id: i64,
        ) -> Result<Vec<ShoppingListItem>> {
            self.db.list_items_for_recipe(shopping_list_id, recipe_id)
        }
        fn delete_items_for_recipe(&self, shopping_list_id: i64, recipe_id: i64) -> Result<usize> {
            if self.faults.delete_items {
                bail!("database is locked");
            }
            self.db.delete_items_for_recipe(shopping_list_id, recipe_id)
        }
        fn delete_all_items(&self, shopping_list_id: i64) -> Result<usize> {
            if self.faults.delete_items {
                bail!("database is locked");
            }
            self.db.delete_all_items(shopping_list_id)
        }
    }

    #[test]
    fn test_failed_insert_keeps_assignment_and_other_items() {
        let (db, ctx) = setup();
        let r = recipe(
            &db,
            "Stew",
            &["1 lb beef", "2 carrots", "1 onion"],
            None,
        );
        let store = FlakyStore::new(
            db,
            Faults {
                insert_item_after: Some(1),
                ..Faults::default()
            },
        );
        let sync = ShoppingListSync::new(&store, SyncOptions::default());

        let report = sync.apply(&ctx, add(DayOfWeek::Monday, r.id)).unwrap();
        assert!(report.assignment.is_some());
        assert_eq!(report.items_inserted, 1);
        assert_eq!(report.warnings.len(), 2);
        assert!(report.warnings.iter().all(|w| w.step == SyncStep::InsertItem));
        assert_eq!(store.db.list_assignments(ctx.meal_plan_id).unwrap().len(), 1);
        assert_eq!(items(&store.db, &ctx).len(), 1);

        // assigning again fills in the missing rows without repeating the beef row
        let healthy = ShoppingListSync::new(&store.db, SyncOptions::default());
        let report = healthy.apply(&ctx, add(DayOfWeek::Tuesday, r.id)).unwrap();
        assert_eq!(report.items_inserted, 2);
        assert_eq!(report.items_skipped, 1);
        assert_eq!(items(&store.db, &ctx).len(), 3);
    }

    #[test]
    fn test_reconcile_fills_partially_listed_recipe() {
        let (db, ctx) = setup();
        let r = recipe(
            &db,
            "Stew",
            &["1 lb beef", "2 carrots", "1 onion"],
            None,
        );
        let store = FlakyStore::new(
            db,
            Faults {
                insert_item_after: Some(1),
                ..Faults::default()
            },
        );
        let report = ShoppingListSync::new(&store, SyncOptions::default())
            .apply(&ctx, add(DayOfWeek::Monday, r.id))
            .unwrap();
        assert_eq!(report.items_inserted, 1);
        assert_eq!(items_for(&store.db, &ctx, r.id), 1);

        let healthy = ShoppingListSync::new(&store.db, SyncOptions::default());
        let repaired = healthy.reconcile(&ctx).unwrap();
        assert!(repaired.is_clean());
        assert_eq!(repaired.items_inserted, 2);
        assert_eq!(repaired.items_skipped, 1);
        assert_eq!(repaired.items_deleted, 0);

        let listed = items(&store.db, &ctx);
        assert_eq!(listed.len(), 3);
        for name in ["beef", "carrots", "onion"] {
            assert_eq!(listed.iter().filter(|i| i.ingredient == name).count(), 1);
        }
        assert_eq!(store.db.list_assignments(ctx.meal_plan_id).unwrap().len(), 1);
    }

    #[test]
    fn test_failed_list_creation_is_soft() {
        let (db, ctx) = setup();
        let r = pancakes(&db);
        let store = FlakyStore::new(
            db,
            Faults {
                create_list: true,
                ..Faults::default()
            },
        );
        let sync = ShoppingListSync::new(&store, SyncOptions::default());

        let report = sync.apply(&ctx, add(DayOfWeek::Monday, r.id)).unwrap();
        assert!(report.assignment.is_some());
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].step, SyncStep::ResolveList);
        assert_eq!(report.warnings[0].recipe_id, Some(r.id));

        let healthy = ShoppingListSync::new(&store.db, SyncOptions::default());
        let repaired = healthy.reconcile(&ctx).unwrap();
        assert_eq!(repaired.items_inserted, 2);
    }

    #[test]
    fn test_failed_count_never_deletes() {
        let (db, ctx) = setup();
        let r = pancakes(&db);
        let a = ShoppingListSync::new(&db, SyncOptions::default())
            .apply(&ctx, add(DayOfWeek::Monday, r.id))
            .unwrap()
            .assignment
            .unwrap();
        let store = FlakyStore::new(
            db,
            Faults {
                count: true,
                ..Faults::default()
            },
        );
        let sync = ShoppingListSync::new(&store, SyncOptions::default());

        let report = sync
            .apply(&ctx, AssignmentEvent::Remove { assignment_id: a.id })
            .unwrap();
        assert_eq!(report.assignments_removed, 1);
        assert_eq!(report.items_deleted, 0);
        assert_eq!(report.warnings[0].step, SyncStep::CountRemaining);
        assert_eq!(items_for(&store.db, &ctx, r.id), 2);
        assert!(store.db.find_assignment(a.id).unwrap().is_none());

        let healthy = ShoppingListSync::new(&store.db, SyncOptions::default());
        let repaired = healthy.reconcile(&ctx).unwrap();
        assert_eq!(repaired.recipes_unlisted, vec![r.id]);
        assert_eq!(items_for(&store.db, &ctx, r.id), 0);
    }

    #[test]
    fn test_failed_batch_count_never_deletes() {
        let (db, ctx) = setup();
        let r = pancakes(&db);
        ShoppingListSync::new(&db, SyncOptions::default())
            .apply(&ctx, add(DayOfWeek::Monday, r.id))
            .unwrap();
        let store = FlakyStore::new(
            db,
            Faults {
                batch_count: true,
                ..Faults::default()
            },
        );
        let sync = ShoppingListSync::new(&store, SyncOptions::default());

        let report = sync
            .apply(
                &ctx,
                AssignmentEvent::ClearDay {
                    day: DayOfWeek::Monday,
                },
            )
            .unwrap();
        assert_eq!(report.assignments_removed, 1);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].step, SyncStep::CountRemaining);
        assert_eq!(report.warnings[0].recipe_id, None);
        assert_eq!(items_for(&store.db, &ctx, r.id), 2);
        assert_eq!(store.batch_calls.get(), 1);
        assert_eq!(store.count_calls.get(), 0);
    }

    #[test]
    fn test_clear_day_checks_remaining_in_one_query() {
        let (db, ctx) = setup();
        let soup = recipe(&db, "Soup", &["1 onion"], None);
        let salad = recipe(&db, "Salad", &["1 head lettuce"], None);
        let pasta = recipe(&db, "Pasta", &["200 g spaghetti"], None);
        let sync = ShoppingListSync::new(&db, SyncOptions::default());
        for r in [&soup, &salad, &pasta] {
            sync.apply(&ctx, add(DayOfWeek::Wednesday, r.id)).unwrap();
        }
        sync.apply(&ctx, add(DayOfWeek::Wednesday, soup.id)).unwrap();
        sync.apply(&ctx, add(DayOfWeek::Friday, salad.id)).unwrap();

        // a failing per-recipe count must not matter here
        let store = FlakyStore::new(
            db,
            Faults {
                count: true,
                ..Faults::default()
            },
        );
        let report = ShoppingListSync::new(&store, SyncOptions::default())
            .apply(
                &ctx,
                AssignmentEvent::ClearDay {
                    day: DayOfWeek::Wednesday,
                },
            )
            .unwrap();

        assert!(report.is_clean());
        assert_eq!(report.assignments_removed, 4);
        assert_eq!(store.batch_calls.get(), 1);
        assert_eq!(store.count_calls.get(), 0);

        let mut unlisted = report.recipes_unlisted.clone();
        unlisted.sort_unstable();
        let mut expected = vec![soup.id, pasta.id];
        expected.sort_unstable();
        assert_eq!(unlisted, expected);
        assert_eq!(items_for(&store.db, &ctx, salad.id), 1);
        assert_eq!(items_for(&store.db, &ctx, soup.id), 0);
        assert_eq!(items_for(&store.db, &ctx, pasta.id), 0);
    }

    #[test]
    fn test_failed_delete_is_reported() {
        let (db, ctx) = setup();
        let r = pancakes(&db);
        ShoppingListSync::new(&db, SyncOptions::default())
            .apply(&ctx, add(DayOfWeek::Monday, r.id))
            .unwrap();
        let store = FlakyStore::new(
            db,
            Faults {
                delete_items: true,
                ..Faults::default()
            },
        );
        let sync = ShoppingListSync::new(&store, SyncOptions::default());

        let report = sync.apply(&ctx, AssignmentEvent::ClearWeek).unwrap();
        assert_eq!(report.assignments_removed, 1);
        assert_eq!(report.items_deleted, 0);
        assert_eq!(report.warnings[0].step, SyncStep::DeleteItems);
        assert_eq!(items(&store.db, &ctx).len(), 2);
    }

    #[test]
    fn test_duplicate_policy_parse() {
        assert_eq!(
            "skip".parse::<DuplicatePolicy>().unwrap(),
            DuplicatePolicy::SkipExisting
        );
        assert_eq!(
            "Append".parse::<DuplicatePolicy>().unwrap(),
            DuplicatePolicy::Append
        );
        assert!("merge".parse::<DuplicatePolicy>().is_err());
        assert_eq!(DuplicatePolicy::default().to_string(), "skip");
    }
}
