pub mod health_score;
pub mod profile;
pub mod quantity;
pub mod recipe_aggregator;

pub use health_score::health_score;
pub use profile::{NutrientVector, NutritionDelta, NutritionProfile};
pub use quantity::{parse_quantity_grams, QuantityResolver, ResolvedQuantities};
pub use recipe_aggregator::{NutritionAggregator, RecipeNutrition};
