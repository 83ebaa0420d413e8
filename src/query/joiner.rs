//! Resolve ranked identifiers into full recipe records.

use std::collections::HashMap;

use tracing::debug;

use crate::models::{RankedRecipe, RecommendedRecipe};
use crate::storage::{RecipeStore, StorageResult};

/// Attach recipe details to a ranking.
///
/// The output follows the order of `ranked` exactly, regardless of the order the
/// store returns rows in. Identifiers without a recipe row (an embedding left
/// behind by a deleted recipe) are omitted, so the result can be shorter than
/// the input.
///
/// # Errors
/// Returns the storage error if the lookup itself fails
pub async fn join<S>(store: &S, ranked: &[RankedRecipe]) -> StorageResult<Vec<RecommendedRecipe>>
where
    S: RecipeStore + ?Sized,
{
    if ranked.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<i64> = ranked.iter().map(|r| r.recipe_id).collect();
    let mut details: HashMap<i64, _> = store
        .get_recipes(&ids)
        .await?
        .into_iter()
        .filter_map(|recipe| recipe.id.map(|id| (id, recipe)))
        .collect();

    let mut joined = Vec::with_capacity(ranked.len());
    for entry in ranked {
        match details.remove(&entry.recipe_id) {
            Some(recipe) => joined.push(RecommendedRecipe::new(recipe, entry.score)),
            None => debug!(recipe_id = entry.recipe_id, stage = "join", "no recipe row for ranked id"),
        }
    }

    Ok(joined)
}
