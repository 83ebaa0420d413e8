//! SQLite storage implementation.
//!
//! This module provides a SQLite-based implementation of the `RecipeStore` and
//! `EmbeddingStore` traits. It uses rusqlite for database access.
//!
//! # Schema
//! - `recipes_table`: one row per recipe. `ingredients` and `instructions` hold
//!   JSON arrays of strings.
//! - `recipe_embeddings_table`: `(recipe_id INTEGER PRIMARY KEY, embedding_vector TEXT)`,
//!   the vector stored as a JSON array of floats. The primary key enforces at most
//!   one embedding per recipe.
//!
//! Foreign keys are declared but enforcement is switched off on every
//! connection, so deleting a recipe leaves its embedding behind. Queries
//! tolerate that by omission.
//!
//! Recipe rows are decoded one at a time and leniently: a numeric column holding
//! a REAL or TEXT value is coerced where possible and read as NULL otherwise. A
//! row that still cannot be decoded is skipped by batched reads.

use std::path::Path;

use super::{EmbeddingStore, RecipeStore, StorageError, StorageResult, StoredEmbedding};
use crate::models::Recipe;
use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use tokio::sync::Mutex;
use tracing::{debug, warn};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS recipes_table (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        ingredients TEXT,
        instructions TEXT,
        description TEXT,
        cuisine_type TEXT,
        prep_time INTEGER,
        cook_time INTEGER,
        total_time INTEGER,
        servings INTEGER,
        source TEXT
    );
    CREATE TABLE IF NOT EXISTS recipe_embeddings_table (
        recipe_id INTEGER PRIMARY KEY,
        embedding_vector TEXT NOT NULL,
        FOREIGN KEY (recipe_id) REFERENCES recipes_table(id)
    );
";

const RECIPE_COLUMNS: &str = "id, name, ingredients, instructions, description, cuisine_type, \
                              prep_time, cook_time, total_time, servings, source";

/// SQLite-based recipe and embedding storage.
pub struct SqliteStorage {
    /// Path to the SQLite database file (":memory:" for in-memory databases)
    db_path: String,

    connection: Mutex<Connection>,
}

impl SqliteStorage {
    /// Open (or create) a database file.
    ///
    /// The schema is not touched; call [`SqliteStorage::initialize`] before first use.
    ///
    /// # Errors
    /// Returns `StorageError::ConnectionError` if the file cannot be opened
    pub fn open(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = db_path.as_ref();
        let connection = Connection::open(path)
            .map_err(|e| StorageError::ConnectionError(format!("{}: {}", path.display(), e)))?;
        Self::configure(&connection)?;

        Ok(Self {
            db_path: path.to_string_lossy().to_string(),
            connection: Mutex::new(connection),
        })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> StorageResult<Self> {
        let connection =
            Connection::open_in_memory().map_err(|e| StorageError::ConnectionError(e.to_string()))?;
        Self::configure(&connection)?;

        Ok(Self {
            db_path: ":memory:".to_string(),
            connection: Mutex::new(connection),
        })
    }

    // The bundled SQLite build enforces foreign keys by default.
    fn configure(connection: &Connection) -> StorageResult<()> {
        connection
            .pragma_update(None, "foreign_keys", false)
            .map_err(|e| StorageError::ConnectionError(format!("failed to disable foreign keys: {e}")))
    }

    /// Create the tables if they do not exist yet.
    ///
    /// This is idempotent and safe to call on an existing database.
    pub fn initialize(&mut self) -> StorageResult<()> {
        debug!(db_path = %self.db_path, "initializing schema");
        self.connection
            .get_mut()
            .execute_batch(SCHEMA)
            .map_err(|e| StorageError::SchemaError(e.to_string()))
    }

    /// Path this storage was opened with.
    pub fn path(&self) -> &str {
        &self.db_path
    }

    fn serialize_list(values: &[String]) -> StorageResult<String> {
        serde_json::to_string(values).map_err(|e| StorageError::SerializationError(e.to_string()))
    }

    fn deserialize_list(recipe_id: i64, column: &str, raw: Option<String>) -> StorageResult<Vec<String>> {
        match raw {
            None => Ok(Vec::new()),
            Some(text) => serde_json::from_str(&text).map_err(|e| {
                StorageError::SerializationError(format!("recipe {recipe_id}: invalid {column} JSON: {e}"))
            }),
        }
    }

    fn serialize_embedding(embedding: &[f32]) -> StorageResult<String> {
        if embedding.iter().any(|x| !x.is_finite()) {
            return Err(StorageError::SerializationError(
                "embedding contains non-finite values".to_string(),
            ));
        }
        serde_json::to_string(embedding).map_err(|e| StorageError::SerializationError(e.to_string()))
    }

    fn deserialize_embedding(recipe_id: i64, text: &str) -> StorageResult<Vec<f32>> {
        serde_json::from_str(text).map_err(|e| {
            StorageError::SerializationError(format!("recipe {recipe_id}: invalid embedding vector: {e}"))
        })
    }
}

/// Raw column values of one `recipes_table` row, before decoding.
///
/// Everything but `id` is read as an untyped [`Value`] so a badly typed column
/// cannot fail the surrounding query.
struct RecipeRow {
    id: i64,
    values: [Value; 10],
}

impl RecipeRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            values: [
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
                row.get(7)?,
                row.get(8)?,
                row.get(9)?,
                row.get(10)?,
            ],
        })
    }

    fn into_recipe(self) -> StorageResult<Recipe> {
        let id = self.id;
        let [
            name,
            ingredients,
            instructions,
            description,
            cuisine_type,
            prep_time,
            cook_time,
            total_time,
            servings,
            source,
        ] = self.values;

        let name = text_value(name)
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| StorageError::SerializationError(format!("recipe {id}: missing name")))?;

        Ok(Recipe {
            id: Some(id),
            name,
            ingredients: SqliteStorage::deserialize_list(id, "ingredients", text_value(ingredients))?,
            instructions: SqliteStorage::deserialize_list(id, "instructions", text_value(instructions))?,
            description: text_value(description),
            cuisine_type: text_value(cuisine_type),
            prep_time: count_value(id, "prep_time", prep_time),
            cook_time: count_value(id, "cook_time", cook_time),
            total_time: count_value(id, "total_time", total_time),
            servings: count_value(id, "servings", servings),
            source: text_value(source),
        })
    }
}

fn text_value(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Text(text) => Some(text),
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) => Some(f.to_string()),
        Value::Blob(bytes) => String::from_utf8(bytes).ok(),
    }
}

/// Read a non-negative count, coercing REAL and TEXT values. Anything that
/// does not fit reads as NULL.
fn count_value(recipe_id: i64, column: &str, value: Value) -> Option<u32> {
    fn from_float(f: f64) -> Option<u32> {
        (0.0..=f64::from(u32::MAX)).contains(&f).then(|| f.round() as u32)
    }

    let coerced = match &value {
        Value::Null => return None,
        Value::Integer(i) => u32::try_from(*i).ok(),
        Value::Real(f) => from_float(*f),
        Value::Text(text) => {
            let text = text.trim();
            text.parse::<u32>()
                .ok()
                .or_else(|| text.parse::<f64>().ok().and_then(from_float))
        }
        Value::Blob(_) => None,
    };

    if coerced.is_none() {
        debug!(recipe_id, column, ?value, "unreadable numeric column, treating as NULL");
    }
    coerced
}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        StorageError::QueryError(e.to_string())
    }
}

#[async_trait]
impl RecipeStore for SqliteStorage {
    async fn insert_recipe(&mut self, recipe: &Recipe) -> StorageResult<i64> {
        let ingredients = Self::serialize_list(&recipe.ingredients)?;
        let instructions = Self::serialize_list(&recipe.instructions)?;

        let conn = self.connection.get_mut();
        conn.execute(
            "INSERT INTO recipes_table (name, ingredients, instructions, description, cuisine_type,
                                        prep_time, cook_time, total_time, servings, source)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                recipe.name,
                ingredients,
                instructions,
                recipe.description,
                recipe.cuisine_type,
                recipe.prep_time,
                recipe.cook_time,
                recipe.total_time,
                recipe.servings,
                recipe.source,
            ],
        )?;

        let id = conn.last_insert_rowid();
        debug!(recipe_id = id, name = %recipe.name, "inserted recipe");
        Ok(id)
    }

    async fn get_recipe(&self, id: i64) -> StorageResult<Recipe> {
        let conn = self.connection.lock().await;
        let row = conn
            .query_row(
                &format!("SELECT {RECIPE_COLUMNS} FROM recipes_table WHERE id = ?1"),
                params![id],
                RecipeRow::from_row,
            )
            .optional()?;

        row.ok_or_else(|| StorageError::NotFound(format!("Recipe {id} not found")))?
            .into_recipe()
    }

    async fn get_recipes(&self, ids: &[i64]) -> StorageResult<Vec<Recipe>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.connection.lock().await;
        let placeholders = vec!["?"; ids.len()].join(",");
        let mut stmt = conn.prepare(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes_table WHERE id IN ({placeholders})"
        ))?;
        let rows = stmt
            .query_map(params_from_iter(ids.iter()), RecipeRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut recipes = Vec::with_capacity(rows.len());
        for row in rows {
            let recipe_id = row.id;
            match row.into_recipe() {
                Ok(recipe) => recipes.push(recipe),
                Err(e) => warn!(recipe_id, stage = "join", error = %e, "skipping unreadable recipe row"),
            }
        }
        Ok(recipes)
    }

    async fn list_recipe_ids(&self) -> StorageResult<Vec<i64>> {
        let conn = self.connection.lock().await;
        let mut stmt = conn.prepare("SELECT id FROM recipes_table ORDER BY id ASC")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }

    async fn count_recipes(&self) -> StorageResult<usize> {
        let conn = self.connection.lock().await;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM recipes_table", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[async_trait]
impl EmbeddingStore for SqliteStorage {
    async fn get_all_embeddings(&self) -> StorageResult<Vec<StoredEmbedding>> {
        let conn = self.connection.lock().await;
        let mut stmt = conn.prepare(
            "SELECT recipe_id, embedding_vector FROM recipe_embeddings_table ORDER BY recipe_id ASC",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Option<String>>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows
            .into_iter()
            .map(|(recipe_id, text)| match text {
                Some(text) => match Self::deserialize_embedding(recipe_id, &text) {
                    Ok(vector) => StoredEmbedding::new(recipe_id, vector),
                    Err(e) => StoredEmbedding::malformed(recipe_id, e),
                },
                None => StoredEmbedding::malformed(
                    recipe_id,
                    StorageError::SerializationError(format!("recipe {recipe_id}: embedding is NULL")),
                ),
            })
            .collect())
    }

    async fn embedding_exists(&self, recipe_id: i64) -> StorageResult<bool> {
        let conn = self.connection.lock().await;
        let found = conn
            .query_row(
                "SELECT 1 FROM recipe_embeddings_table WHERE recipe_id = ?1",
                params![recipe_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    async fn insert_embedding_if_absent(&mut self, recipe_id: i64, vector: &[f32]) -> StorageResult<bool> {
        let text = Self::serialize_embedding(vector)?;
        let written = self.connection.get_mut().execute(
            "INSERT OR IGNORE INTO recipe_embeddings_table (recipe_id, embedding_vector) VALUES (?1, ?2)",
            params![recipe_id, text],
        )?;
        Ok(written > 0)
    }

    async fn list_embedding_ids(&self) -> StorageResult<Vec<i64>> {
        let conn = self.connection.lock().await;
        let mut stmt = conn.prepare("SELECT recipe_id FROM recipe_embeddings_table ORDER BY recipe_id ASC")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }

    async fn count_embeddings(&self) -> StorageResult<usize> {
        let conn = self.connection.lock().await;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM recipe_embeddings_table", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
