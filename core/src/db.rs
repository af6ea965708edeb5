use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, params, params_from_iter};

use crate::models::{ImportSummary, NewRecipe, Nutrients, Pagination, Recipe, RecipePage};
use crate::query::{CompiledFilter, ORDER_BY, register_functions};

const RECIPE_COLUMNS: &str = "id, title, cuisine, rating, prep_time, cook_time, total_time, description, nutrients, serves";

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        register_functions(&conn).context("Failed to register SQL functions")?;
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
                    cuisine TEXT,
                    title TEXT,
                    rating REAL,
                    prep_time INTEGER,
                    cook_time INTEGER,
                    total_time INTEGER,
                    description TEXT,
                    nutrients TEXT NOT NULL DEFAULT '{}',
                    serves TEXT
                );

                CREATE INDEX IF NOT EXISTS idx_recipes_rating ON recipes(rating);
                CREATE INDEX IF NOT EXISTS idx_recipes_cuisine ON recipes(cuisine);

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    // --- Row mapping helpers ---

    // Expects columns in RECIPE_COLUMNS order.
    fn recipe_from_row(row: &rusqlite::Row) -> rusqlite::Result<Recipe> {
        let nutrients: Option<String> = row.get(8)?;
        Ok(Recipe {
            id: row.get(0)?,
            title: row.get(1)?,
            cuisine: row.get(2)?,
            rating: row.get(3)?,
            prep_time: row.get(4)?,
            cook_time: row.get(5)?,
            total_time: row.get(6)?,
            description: row.get(7)?,
            nutrients: parse_nutrients(nutrients.as_deref()),
            serves: row.get(9)?,
        })
    }

    // --- Writes ---

    /// Delete every recipe and insert `recipes` in their place, in one
    /// transaction. On failure the previous contents are kept.
    pub fn replace_all(&self, recipes: &[NewRecipe]) -> Result<ImportSummary> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM recipes", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO recipes (cuisine, title, rating, prep_time, cook_time, total_time, description, nutrients, serves)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for recipe in recipes {
                stmt.execute(params![
                    recipe.cuisine,
                    recipe.title,
                    recipe.rating,
                    recipe.prep_time,
                    recipe.cook_time,
                    recipe.total_time,
                    recipe.description,
                    recipe.nutrients,
                    recipe.serves,
                ])
                .context("Failed to insert recipe")?;
            }
        }
        tx.commit()?;

        Ok(ImportSummary {
            recipes_imported: self.count_recipes()?,
            missing_ratings: self.count_missing_ratings()?,
        })
    }

    // --- Reads ---

    pub fn count_recipes(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM recipes", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn count_missing_ratings(&self) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM recipes WHERE rating IS NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    #[cfg(test)]
    pub fn get_recipe_by_id(&self, id: i64) -> Result<Recipe> {
        self.conn
            .query_row(
                &format!("SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = ?1"),
                params![id],
                Self::recipe_from_row,
            )
            .context("Recipe not found")
    }

    /// One page of all recipes, best rated first, with the total row count.
    pub fn list_recipes(&self, pagination: Pagination) -> Result<RecipePage> {
        let total = self.count_recipes()?;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes {ORDER_BY} LIMIT ?1 OFFSET ?2"
        ))?;
        let data = stmt
            .query_map(
                params![pagination.sql_limit(), pagination.offset()],
                Self::recipe_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RecipePage {
            page: pagination.page,
            limit: pagination.limit,
            total,
            data,
        })
    }

    /// Every recipe matching `filter`, best rated first. Not paginated.
    pub fn search_recipes(&self, filter: &CompiledFilter) -> Result<Vec<Recipe>> {
        let sql = format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes{} {ORDER_BY}",
            filter.where_sql()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let recipes = stmt
            .query_map(params_from_iter(filter.args.iter()), Self::recipe_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(recipes)
    }
}

/// Stored nutrients text back to a map. Empty, missing, or malformed text is
/// an empty map.
fn parse_nutrients(text: Option<&str>) -> Nutrients {
    let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
        return Nutrients::new();
    };
    serde_json::from_str(text).unwrap_or_else(|err| {
        tracing::warn!(%err, "unreadable nutrients text, using empty map");
        Nutrients::new()
    })
}
