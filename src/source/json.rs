//! JSON file recipe source.
//!
//! Accepts either a JSON array of recipe objects or a JSON object whose values
//! are recipe objects (keys are ignored except in error messages). Scraped
//! exports that use `title` for the name, or a single newline-separated
//! `instructions` string, are normalized on the way in.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{RecipeSource, SourceError, SourceResult};
use crate::models::Recipe;

/// Recipe source backed by a JSON file, read on every fetch.
#[derive(Debug, Clone)]
pub struct JsonFileRecipeSource {
    path: PathBuf,
    name: String,
}

impl JsonFileRecipeSource {
    /// Create a source for `path`. The file is not read until the first fetch.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let name = format!("json:{}", path.display());
        Self { path, name }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RecipeSource for JsonFileRecipeSource {
    async fn fetch_recipes(&self) -> SourceResult<Vec<Recipe>> {
        let text = tokio::fs::read_to_string(&self.path).await?;
        let recipes = parse_recipes(&text)?;
        debug!(source = %self.name, count = recipes.len(), "read recipes");
        Ok(recipes)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Parse recipes from JSON text.
///
/// Recipes come back in file order, for keyed objects too.
///
/// # Errors
/// Returns `SourceError::ParseError` if the text is not an array or object of
/// recipes, or if an entry has no name or no ingredients. The message names the
/// offending entry by index or key.
pub fn parse_recipes(text: &str) -> SourceResult<Vec<Recipe>> {
    let document: Value =
        serde_json::from_str(text).map_err(|e| SourceError::ParseError(format!("invalid JSON: {e}")))?;

    let entries: Vec<(String, Value)> = match document {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, v)| (format!("#{i}"), v))
            .collect(),
        Value::Object(map) => map.into_iter().collect(),
        _ => {
            return Err(SourceError::ParseError(
                "expected an array or object of recipes".to_string(),
            ))
        }
    };

    entries
        .into_iter()
        .map(|(label, value)| parse_entry(&label, value))
        .collect()
}

fn parse_entry(label: &str, mut value: Value) -> SourceResult<Recipe> {
    let object = value
        .as_object_mut()
        .ok_or_else(|| SourceError::ParseError(format!("entry {label}: not an object")))?;

    if !object.contains_key("name") {
        if let Some(title) = object.remove("title") {
            object.insert("name".to_string(), title);
        }
    }
    let split_steps = match object.get("instructions") {
        Some(Value::String(text)) => Some(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(|line| Value::String(line.to_string()))
                .collect::<Vec<Value>>(),
        ),
        _ => None,
    };
    if let Some(steps) = split_steps {
        object.insert("instructions".to_string(), Value::Array(steps));
    }

    let mut recipe: Recipe =
        serde_json::from_value(value).map_err(|e| SourceError::ParseError(format!("entry {label}: {e}")))?;

    if recipe.name.trim().is_empty() {
        return Err(SourceError::ParseError(format!("entry {label}: recipe has no name")));
    }
    if recipe.ingredients.is_empty() {
        return Err(SourceError::ParseError(format!(
            "entry {label}: recipe '{}' has no ingredients",
            recipe.name
        )));
    }

    recipe.id = None;
    Ok(recipe)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_parse_array() {
        let recipes = parse_recipes(
            r#"[
                {"name": "Pancakes", "ingredients": ["flour", "milk"], "instructions": ["Mix.", "Fry."],
                 "prep_time": 5, "cook_time": 10, "total_time": 15, "servings": 4},
                {"name": "Toast", "ingredients": ["bread"]}
            ]"#,
        )
        .unwrap();

        assert_eq!(recipes.len(), 2);
        assert_eq!(recipes[0].name, "Pancakes");
        assert_eq!(recipes[0].instructions, vec!["Mix.".to_string(), "Fry.".to_string()]);
        assert_eq!(recipes[0].servings, Some(4));
        assert!(recipes[1].instructions.is_empty());
    }

    #[test]
    fn test_parse_keyed_object_with_scraped_fields() {
        let recipes = parse_recipes(
            r#"{
                "abc123": {
                    "title": "Lentil Soup",
                    "ingredients": ["1 cup lentils", "1 onion"],
                    "instructions": "Rinse lentils.\n\nSimmer with onion for 30 minutes.\n"
                }
            }"#,
        )
        .unwrap();

        assert_eq!(recipes.len(), 1);
        assert_eq!(recipes[0].name, "Lentil Soup");
        assert_eq!(
            recipes[0].instructions,
            vec!["Rinse lentils.".to_string(), "Simmer with onion for 30 minutes.".to_string()]
        );
    }

    #[test]
    fn test_keyed_object_keeps_file_order() {
        let recipes = parse_recipes(
            r#"{
                "2": {"name": "Second", "ingredients": ["b"]},
                "10": {"name": "Tenth", "ingredients": ["j"]},
                "1": {"name": "First", "ingredients": ["a"]}
            }"#,
        )
        .unwrap();

        let names: Vec<&str> = recipes.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Second", "Tenth", "First"]);
    }

    #[test]
    fn test_ids_from_file_are_discarded() {
        let recipes = parse_recipes(r#"[{"id": 12, "name": "Rice", "ingredients": ["rice"]}]"#).unwrap();
        assert_eq!(recipes[0].id, None);
    }

    #[test]
    fn test_invalid_entries_are_named() {
        let err = parse_recipes(r#"[{"name": "Ok", "ingredients": ["x"]}, {"name": "Empty", "ingredients": []}]"#)
            .unwrap_err();
        assert!(err.to_string().contains("#1"), "{err}");
        assert!(err.to_string().contains("Empty"), "{err}");

        let err = parse_recipes(r#"{"k1": {"name": "  ", "ingredients": ["x"]}}"#).unwrap_err();
        assert!(err.to_string().contains("k1"), "{err}");

        let err = parse_recipes(r#"{"k2": {"ingredients": ["x"]}}"#).unwrap_err();
        assert!(err.to_string().contains("k2"), "{err}");
    }

    #[test]
    fn test_rejects_non_collection() {
        assert!(matches!(parse_recipes("42"), Err(SourceError::ParseError(_))));
        assert!(matches!(parse_recipes("not json"), Err(SourceError::ParseError(_))));
    }

    #[tokio::test]
    async fn test_file_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"name": "A", "ingredients": ["a"]}}, {{"name": "B", "ingredients": ["b"]}}, {{"name": "C", "ingredients": ["c"]}}]"#
        )
        .unwrap();

        let source = JsonFileRecipeSource::new(file.path());
        assert_eq!(source.count_recipes().await.unwrap(), 3);
        assert_eq!(source.fetch_recipes_limit(2).await.unwrap().len(), 2);
        assert!(source.name().starts_with("json:"));
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let source = JsonFileRecipeSource::new("/nonexistent/recipes.json");
        assert!(matches!(source.fetch_recipes().await, Err(SourceError::IoError(_))));
    }
}
