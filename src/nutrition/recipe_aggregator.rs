use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::index::IngredientLookup;
use crate::nutrition::health_score::health_score;
use crate::nutrition::profile::{NutrientVector, NutritionProfile};
use crate::nutrition::quantity::{QuantityResolver, ResolvedQuantities};

/// Everything computed while scoring one ingredient list.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct RecipeNutrition {
    pub profile: NutritionProfile,
    /// Absolute nutrient totals for the resolved masses.
    pub totals: NutrientVector,
    pub resolved: ResolvedQuantities,
    /// Ingredients with no record in the index; they contribute nothing.
    pub unmatched: Vec<String>,
}

impl RecipeNutrition {
    pub fn quantity_incomplete(&self) -> bool {
        self.resolved.quantity_incomplete
    }
}

/// Sums per-ingredient contributions and normalizes them to 100 g of recipe.
pub struct NutritionAggregator<'a> {
    lookup: &'a dyn IngredientLookup,
    resolver: QuantityResolver,
}

impl<'a> NutritionAggregator<'a> {
    pub fn new(lookup: &'a dyn IngredientLookup, resolver: QuantityResolver) -> Self {
        Self { lookup, resolver }
    }

    pub fn aggregate(&self, ingredients: &[String], quantities: &[String], total_weight: Option<f64>) -> RecipeNutrition {
        let resolved = self.resolver.resolve(ingredients, quantities, total_weight);
        self.aggregate_resolved(resolved)
    }

    /// Normalizes by `max(W, K)`, never by the known mass alone, so a missing
    /// or implausible total weight cannot inflate the per-100g values.
    pub fn aggregate_resolved(&self, resolved: ResolvedQuantities) -> RecipeNutrition {
        let mut totals = NutrientVector::default();
        let mut unmatched = Vec::new();

        for item in &resolved.items {
            match self.lookup.record(&item.ingredient) {
                Some(record) => totals.add_assign(&record.nutrients.contribution(item.grams)),
                None => {
                    warn!(ingredient = %item.ingredient, "ingredient not in index; contributes nothing");
                    unmatched.push(item.ingredient.clone());
                }
            }
        }

        let mass = resolved.normalization_mass();
        let per_100g = if mass > 0.0 {
            totals.scaled(100.0 / mass)
        } else {
            NutrientVector::default()
        };
        let profile = NutritionProfile {
            per_100g,
            score_health: health_score(&per_100g),
        };
        debug!(mass, score = profile.score_health, unmatched = unmatched.len(), "aggregated recipe nutrition");

        RecipeNutrition {
            profile,
            totals,
            resolved,
            unmatched,
        }
    }
}
