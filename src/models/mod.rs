//! Core data models for the recipe recommender.
//!
//! This module contains the canonical recipe entity used end to end (storage,
//! ranking, and presentation) together with the transient values produced while
//! answering a query.

use serde::{Deserialize, Serialize};

/// A stored recipe.
///
/// Optional attributes are modeled explicitly so that a recipe read back from
/// storage and a recipe freshly parsed from an ingestion source share one type.
/// `ingredients` and `instructions` are order-preserving; step order is meaningful.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recipe {
    /// Store-assigned identifier (`None` until the recipe has been inserted)
    #[serde(rename = "recipe_id", alias = "id", default)]
    pub id: Option<i64>,

    /// Recipe name
    pub name: String,

    /// Ingredient lines, in the order they were written
    #[serde(default)]
    pub ingredients: Vec<String>,

    /// Instruction steps, in cooking order
    #[serde(default)]
    pub instructions: Vec<String>,

    /// Free-text description
    #[serde(default)]
    pub description: Option<String>,

    /// Cuisine classification (e.g. "Italian")
    #[serde(default)]
    pub cuisine_type: Option<String>,

    /// Preparation time in minutes
    #[serde(default)]
    pub prep_time: Option<u32>,

    /// Cooking time in minutes
    #[serde(default)]
    pub cook_time: Option<u32>,

    /// Total time in minutes. Nominally prep + cook, never enforced.
    #[serde(default)]
    pub total_time: Option<u32>,

    /// Number of servings
    #[serde(default)]
    pub servings: Option<u32>,

    /// Provenance tag (cookbook, website, ...)
    #[serde(default)]
    pub source: Option<String>,
}

impl Recipe {
    /// Create a recipe with only the required attributes set.
    pub fn new(name: impl Into<String>, ingredients: Vec<String>, instructions: Vec<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            ingredients,
            instructions,
            description: None,
            cuisine_type: None,
            prep_time: None,
            cook_time: None,
            total_time: None,
            servings: None,
            source: None,
        }
    }

    /// Return a copy of this recipe carrying the given store identifier.
    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }
}

/// One entry of a ranking: a recipe identifier and its cosine similarity to the query.
///
/// Scores live only for the duration of one query and are never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedRecipe {
    pub recipe_id: i64,
    pub score: f32,
}

impl RankedRecipe {
    pub fn new(recipe_id: i64, score: f32) -> Self {
        Self { recipe_id, score }
    }
}

/// A fully resolved recommendation.
///
/// Serializes to a flat object with the keys `recipe_id, name, ingredients,
/// instructions, description, cuisine_type, prep_time, cook_time, total_time,
/// servings, source, similarity_score`, which is what the conversational layer
/// forwards to its completion prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendedRecipe {
    #[serde(flatten)]
    pub recipe: Recipe,

    /// Cosine similarity between the query and this recipe, in [-1, 1]
    pub similarity_score: f32,
}

impl RecommendedRecipe {
    pub fn new(recipe: Recipe, similarity_score: f32) -> Self {
        Self {
            recipe,
            similarity_score,
        }
    }

    /// Identifier of the underlying recipe.
    pub fn recipe_id(&self) -> Option<i64> {
        self.recipe.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn carbonara() -> Recipe {
        let mut recipe = Recipe::new(
            "Spaghetti Carbonara",
            vec!["spaghetti".to_string(), "eggs".to_string(), "pancetta".to_string()],
            vec!["Cook spaghetti.".to_string(), "Fry pancetta.".to_string()],
        );
        recipe.cuisine_type = Some("Italian".to_string());
        recipe.prep_time = Some(10);
        recipe.cook_time = Some(15);
        recipe
    }

    #[test]
    fn test_recommended_recipe_serializes_flat_dictionary() {
        let rec = RecommendedRecipe::new(carbonara().with_id(7), 0.5);
        let value = serde_json::to_value(&rec).unwrap();
        let object = value.as_object().unwrap();

        let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "cook_time",
                "cuisine_type",
                "description",
                "ingredients",
                "instructions",
                "name",
                "prep_time",
                "recipe_id",
                "servings",
                "similarity_score",
                "source",
                "total_time",
            ]
        );
        assert_eq!(object["recipe_id"], serde_json::json!(7));
        assert_eq!(object["similarity_score"], serde_json::json!(0.5));
        assert!(object["description"].is_null());
    }

    #[test]
    fn test_recipe_deserializes_with_missing_optionals() {
        let recipe: Recipe = serde_json::from_str(
            r#"{"name": "Toast", "ingredients": ["bread"], "instructions": ["Toast it."]}"#,
        )
        .unwrap();

        assert_eq!(recipe.id, None);
        assert_eq!(recipe.name, "Toast");
        assert_eq!(recipe.servings, None);
        assert_eq!(recipe.source, None);
    }

    #[test]
    fn test_recipe_accepts_id_alias() {
        let recipe: Recipe = serde_json::from_str(r#"{"id": 3, "name": "Soup"}"#).unwrap();
        assert_eq!(recipe.id, Some(3));
        assert!(recipe.ingredients.is_empty());
    }
}
