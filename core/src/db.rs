use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use rusqlite::types::Type;
use rusqlite::{Connection, params, params_from_iter};
use uuid::Uuid;

use crate::models::{
    DayOfWeek, MealAssignment, MealPlan, NewMealAssignment, NewRecipe, NewShoppingListItem,
    Recipe, ShoppingList, ShoppingListItem,
};
use crate::store::PlannerStore;

const ASSIGNMENT_COLUMNS: &str =
    "id, meal_plan_id, recipe_id, day_of_week, serving_size, created_at";

const ITEM_COLUMNS: &str = "id, uuid, shopping_list_id, ingredient, quantity, unit, category,
     recipe_id, recipe_title, is_checked, created_at";

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS recipes (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    title TEXT NOT NULL,
                    ingredients TEXT NOT NULL DEFAULT '[]',
                    base_servings REAL,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS meal_plans (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    household_id TEXT NOT NULL,
                    week_start TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    UNIQUE (household_id, week_start)
                );

                CREATE TABLE IF NOT EXISTS meal_assignments (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    meal_plan_id INTEGER NOT NULL REFERENCES meal_plans(id),
                    recipe_id INTEGER NOT NULL REFERENCES recipes(id),
                    day_of_week TEXT NOT NULL,
                    serving_size REAL,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS shopping_lists (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    household_id TEXT NOT NULL,
                    meal_plan_id INTEGER NOT NULL UNIQUE REFERENCES meal_plans(id),
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS shopping_list_items (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL UNIQUE,
                    shopping_list_id INTEGER NOT NULL REFERENCES shopping_lists(id) ON DELETE CASCADE,
                    ingredient TEXT NOT NULL,
                    quantity TEXT,
                    unit TEXT,
                    category TEXT NOT NULL,
                    recipe_id INTEGER,
                    recipe_title TEXT,
                    is_checked INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_meal_assignments_plan_recipe
                    ON meal_assignments(meal_plan_id, recipe_id);
                CREATE INDEX IF NOT EXISTS idx_meal_assignments_plan_day
                    ON meal_assignments(meal_plan_id, day_of_week);
                CREATE INDEX IF NOT EXISTS idx_shopping_list_items_list_recipe
                    ON shopping_list_items(shopping_list_id, recipe_id);

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    // --- Row mapping helpers ---

    fn recipe_from_row(row: &rusqlite::Row) -> rusqlite::Result<Recipe> {
        let raw: String = row.get(2)?;
        let ingredients = serde_json::from_str(&raw)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;
        Ok(Recipe {
            id: row.get(0)?,
            title: row.get(1)?,
            ingredients,
            base_servings: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    fn meal_plan_from_row(row: &rusqlite::Row) -> rusqlite::Result<MealPlan> {
        let raw: String = row.get(2)?;
        let week_start = NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;
        Ok(MealPlan {
            id: row.get(0)?,
            household_id: row.get(1)?,
            week_start,
            created_at: row.get(3)?,
        })
    }

    // Expects ASSIGNMENT_COLUMNS order.
    fn assignment_from_row(row: &rusqlite::Row) -> rusqlite::Result<MealAssignment> {
        let raw: String = row.get(3)?;
        let day_of_week = raw
            .parse::<DayOfWeek>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, e.into()))?;
        Ok(MealAssignment {
            id: row.get(0)?,
            meal_plan_id: row.get(1)?,
            recipe_id: row.get(2)?,
            day_of_week,
            serving_size: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    fn shopping_list_from_row(row: &rusqlite::Row) -> rusqlite::Result<ShoppingList> {
        Ok(ShoppingList {
            id: row.get(0)?,
            household_id: row.get(1)?,
            meal_plan_id: row.get(2)?,
            created_at: row.get(3)?,
        })
    }

    // Expects ITEM_COLUMNS order.
    fn item_from_row(row: &rusqlite::Row) -> rusqlite::Result<ShoppingListItem> {
        Ok(ShoppingListItem {
            id: row.get(0)?,
            uuid: row.get(1)?,
            shopping_list_id: row.get(2)?,
            ingredient: row.get(3)?,
            quantity: row.get(4)?,
            unit: row.get(5)?,
            category: row.get(6)?,
            recipe_id: row.get(7)?,
            recipe_title: row.get(8)?,
            is_checked: row.get(9)?,
            created_at: row.get(10)?,
        })
    }

    // --- Recipes ---

    pub fn insert_recipe(&self, recipe: &NewRecipe) -> Result<Recipe> {
        let now = Local::now().to_rfc3339();
        let ingredients = serde_json::to_string(&recipe.ingredients)?;
        self.conn.execute(
            "INSERT INTO recipes (title, ingredients, base_servings, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![recipe.title.trim(), ingredients, recipe.base_servings, now],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_recipe(id)
    }

    pub fn get_recipe(&self, id: i64) -> Result<Recipe> {
        self.conn
            .query_row(
                "SELECT id, title, ingredients, base_servings, created_at FROM recipes WHERE id = ?1",
                params![id],
                Self::recipe_from_row,
            )
            .with_context(|| format!("Recipe {id} not found"))
    }

    pub fn list_recipes(&self) -> Result<Vec<Recipe>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, ingredients, base_servings, created_at FROM recipes ORDER BY id",
        )?;
        let recipes = stmt
            .query_map([], Self::recipe_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(recipes)
    }

    // --- Meal plans ---

    pub fn get_or_create_meal_plan(
        &self,
        household_id: &str,
        week_start: NaiveDate,
    ) -> Result<MealPlan> {
        let now = Local::now().to_rfc3339();
        let week = week_start.format("%Y-%m-%d").to_string();
        self.conn.execute(
            "INSERT OR IGNORE INTO meal_plans (household_id, week_start, created_at)
             VALUES (?1, ?2, ?3)",
            params![household_id, week, now],
        )?;
        self.conn
            .query_row(
                "SELECT id, household_id, week_start, created_at FROM meal_plans
                 WHERE household_id = ?1 AND week_start = ?2",
                params![household_id, week],
                Self::meal_plan_from_row,
            )
            .context("Meal plan not found after insert")
    }

    pub fn get_meal_plan(&self, id: i64) -> Result<MealPlan> {
        self.conn
            .query_row(
                "SELECT id, household_id, week_start, created_at FROM meal_plans WHERE id = ?1",
                params![id],
                Self::meal_plan_from_row,
            )
            .with_context(|| format!("Meal plan {id} not found"))
    }

    // --- Assignments ---

    pub fn get_assignment(&self, id: i64) -> Result<MealAssignment> {
        self.find_assignment(id)?
            .with_context(|| format!("Assignment {id} not found"))
    }

    /// Stores a new serving size. Existing shopping-list items keep the
    /// quantities they were listed with.
    pub fn update_assignment_serving(
        &self,
        id: i64,
        serving_size: Option<f64>,
    ) -> Result<MealAssignment> {
        let rows = self.conn.execute(
            "UPDATE meal_assignments SET serving_size = ?1 WHERE id = ?2",
            params![serving_size, id],
        )?;
        if rows == 0 {
            bail!("Assignment {id} not found");
        }
        self.get_assignment(id)
    }

    // --- Shopping list items ---

    pub fn find_shopping_item(&self, id: i64) -> Result<Option<ShoppingListItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM shopping_list_items WHERE id = ?1"
        ))?;
        let mut rows = stmt.query(params![id])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::item_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn get_shopping_item(&self, id: i64) -> Result<ShoppingListItem> {
        self.find_shopping_item(id)?
            .with_context(|| format!("Shopping list item {id} not found"))
    }

    pub fn set_item_checked(&self, id: i64, checked: bool) -> Result<ShoppingListItem> {
        let rows = self.conn.execute(
            "UPDATE shopping_list_items SET is_checked = ?1 WHERE id = ?2",
            params![checked, id],
        )?;
        if rows == 0 {
            bail!("Shopping list item {id} not found");
        }
        self.get_shopping_item(id)
    }

    pub fn toggle_item(&self, id: i64) -> Result<ShoppingListItem> {
        let item = self.get_shopping_item(id)?;
        self.set_item_checked(id, !item.is_checked)
    }

    pub fn delete_item(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM shopping_list_items WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    pub fn delete_checked_items(&self, shopping_list_id: i64) -> Result<usize> {
        let rows = self.conn.execute(
            "DELETE FROM shopping_list_items WHERE shopping_list_id = ?1 AND is_checked = 1",
            params![shopping_list_id],
        )?;
        Ok(rows)
    }
}

impl PlannerStore for Database {
    fn find_recipe(&self, recipe_id: i64) -> Result<Option<Recipe>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, ingredients, base_servings, created_at FROM recipes WHERE id = ?1",
        )?;
        let mut rows = stmt.query(params![recipe_id])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::recipe_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    fn insert_assignment(&self, assignment: &NewMealAssignment) -> Result<MealAssignment> {
        let now = Local::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO meal_assignments (meal_plan_id, recipe_id, day_of_week, serving_size, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    assignment.meal_plan_id,
                    assignment.recipe_id,
                    assignment.day_of_week.as_str(),
                    assignment.serving_size,
                    now,
                ],
            )
            .with_context(|| {
                format!(
                    "Failed to assign recipe {} to meal plan {}",
                    assignment.recipe_id, assignment.meal_plan_id
                )
            })?;
        let id = self.conn.last_insert_rowid();
        self.get_assignment(id)
    }

    fn find_assignment(&self, assignment_id: i64) -> Result<Option<MealAssignment>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM meal_assignments WHERE id = ?1"
        ))?;
        let mut rows = stmt.query(params![assignment_id])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::assignment_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    fn delete_assignment(&self, assignment_id: i64) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM meal_assignments WHERE id = ?1",
            params![assignment_id],
        )?;
        Ok(rows > 0)
    }

    fn update_assignment_day(&self, assignment_id: i64, day: DayOfWeek) -> Result<MealAssignment> {
        let rows = self.conn.execute(
            "UPDATE meal_assignments SET day_of_week = ?1 WHERE id = ?2",
            params![day.as_str(), assignment_id],
        )?;
        if rows == 0 {
            bail!("Assignment {assignment_id} not found");
        }
        self.get_assignment(assignment_id)
    }

    fn list_assignments(&self, meal_plan_id: i64) -> Result<Vec<MealAssignment>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM meal_assignments WHERE meal_plan_id = ?1 ORDER BY id"
        ))?;
        let assignments = stmt
            .query_map(params![meal_plan_id], Self::assignment_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(assignments)
    }

    fn recipe_ids_for_day(&self, meal_plan_id: i64, day: DayOfWeek) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT recipe_id FROM meal_assignments
             WHERE meal_plan_id = ?1 AND day_of_week = ?2
             GROUP BY recipe_id ORDER BY MIN(id)",
        )?;
        let ids = stmt
            .query_map(params![meal_plan_id, day.as_str()], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn delete_assignments_for_day(&self, meal_plan_id: i64, day: DayOfWeek) -> Result<usize> {
        let rows = self.conn.execute(
            "DELETE FROM meal_assignments WHERE meal_plan_id = ?1 AND day_of_week = ?2",
            params![meal_plan_id, day.as_str()],
        )?;
        Ok(rows)
    }

    fn delete_assignments_for_plan(&self, meal_plan_id: i64) -> Result<usize> {
        let rows = self.conn.execute(
            "DELETE FROM meal_assignments WHERE meal_plan_id = ?1",
            params![meal_plan_id],
        )?;
        Ok(rows)
    }

    fn count_assignments(&self, meal_plan_id: i64, recipe_id: i64) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM meal_assignments WHERE meal_plan_id = ?1 AND recipe_id = ?2",
            params![meal_plan_id, recipe_id],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count)?)
    }

    fn assigned_recipe_ids(&self, meal_plan_id: i64, recipe_ids: &[i64]) -> Result<HashSet<i64>> {
        if recipe_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let placeholders = (0..recipe_ids.len())
            .map(|i| format!("?{}", i + 2))
            .collect::<Vec<_>>()
            .join(", ");
        let mut values = Vec::with_capacity(recipe_ids.len() + 1);
        values.push(meal_plan_id);
        values.extend_from_slice(recipe_ids);

        let mut stmt = self.conn.prepare(&format!(
            "SELECT DISTINCT recipe_id FROM meal_assignments
             WHERE meal_plan_id = ?1 AND recipe_id IN ({placeholders})"
        ))?;
        let ids = stmt
            .query_map(params_from_iter(values.iter()), |row| row.get(0))?
            .collect::<Result<HashSet<i64>, _>>()?;
        Ok(ids)
    }

    fn find_shopping_list(&self, meal_plan_id: i64) -> Result<Option<ShoppingList>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, household_id, meal_plan_id, created_at FROM shopping_lists
             WHERE meal_plan_id = ?1",
        )?;
        let mut rows = stmt.query(params![meal_plan_id])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::shopping_list_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    fn create_shopping_list(
        &self,
        household_id: &str,
        meal_plan_id: i64,
    ) -> Result<ShoppingList> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT OR IGNORE INTO shopping_lists (household_id, meal_plan_id, created_at)
             VALUES (?1, ?2, ?3)",
            params![household_id, meal_plan_id, now],
        )?;
        self.find_shopping_list(meal_plan_id)?
            .with_context(|| format!("Shopping list for meal plan {meal_plan_id} not found"))
    }

    fn insert_shopping_item(&self, item: &NewShoppingListItem) -> Result<ShoppingListItem> {
        let now = Local::now().to_rfc3339();
        let uuid = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO shopping_list_items (uuid, shopping_list_id, ingredient, quantity, unit,
                 category, recipe_id, recipe_title, is_checked, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9)",
            params![
                uuid,
                item.shopping_list_id,
                item.ingredient,
                item.quantity,
                item.unit,
                item.category,
                item.recipe_id,
                item.recipe_title,
                now,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_shopping_item(id)
    }

    fn list_items(&self, shopping_list_id: i64) -> Result<Vec<ShoppingListItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM shopping_list_items WHERE shopping_list_id = ?1 ORDER BY id"
        ))?;
        let items = stmt
            .query_map(params![shopping_list_id], Self::item_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    fn list_items_for_recipe(
        &self,
        shopping_list_id: i64,
        recipe_id: i64,
    ) -> Result<Vec<ShoppingListItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM shopping_list_items
             WHERE shopping_list_id = ?1 AND recipe_id = ?2 ORDER BY id"
        ))?;
        let items = stmt
            .query_map(params![shopping_list_id, recipe_id], Self::item_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    fn delete_items_for_recipe(&self, shopping_list_id: i64, recipe_id: i64) -> Result<usize> {
        let rows = self.conn.execute(
            "DELETE FROM shopping_list_items WHERE shopping_list_id = ?1 AND recipe_id = ?2",
            params![shopping_list_id, recipe_id],
        )?;
        Ok(rows)
    }

    fn delete_all_items(&self, shopping_list_id: i64) -> Result<usize> {
        let rows = self.conn.execute(
            "DELETE FROM shopping_list_items WHERE shopping_list_id = ?1",
            params![shopping_list_id],
        )?;
        Ok(rows)
    }
}
