use serde::{Deserialize, Serialize};
use std::fmt;

use crate::nutrition::profile::{NutritionDelta, NutritionProfile};

/// One operation per request, encoded on the wire as `0|1|2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TransformationType {
    Add,
    Delete,
    Substitution,
}

impl TryFrom<u8> for TransformationType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TransformationType::Add),
            1 => Ok(TransformationType::Delete),
            2 => Ok(TransformationType::Substitution),
            other => Err(format!("unknown transformation type {} (expected 0=ADD, 1=DELETE, 2=SUBSTITUTION)", other)),
        }
    }
}

impl From<TransformationType> for u8 {
    fn from(value: TransformationType) -> Self {
        match value {
            TransformationType::Add => 0,
            TransformationType::Delete => 1,
            TransformationType::Substitution => 2,
        }
    }
}

impl fmt::Display for TransformationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransformationType::Add => "ADD",
            TransformationType::Delete => "DELETE",
            TransformationType::Substitution => "SUBSTITUTION",
        })
    }
}

/// Flat constraint flags as they arrive on the wire. Absent flags are false.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConstraints {
    pub transformation: TransformationType,
    pub no_lactose: bool,
    pub no_gluten: bool,
    pub no_nuts: bool,
    pub vegetarian: bool,
    pub vegan: bool,
    pub increase_protein: bool,
    pub decrease_sugar: bool,
    pub decrease_protein: bool,
    pub decrease_carbs: bool,
    pub decrease_calories: bool,
    pub decrease_sodium: bool,
    pub increase_fiber: bool,
}

impl Default for TransformConstraints {
    fn default() -> Self {
        Self {
            transformation: TransformationType::Substitution,
            no_lactose: false,
            no_gluten: false,
            no_nuts: false,
            vegetarian: false,
            vegan: false,
            increase_protein: false,
            decrease_sugar: false,
            decrease_protein: false,
            decrease_carbs: false,
            decrease_calories: false,
            decrease_sodium: false,
            increase_fiber: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub quantity_ingredients: Vec<String>,
    #[serde(default)]
    pub minutes: f64,
    #[serde(default)]
    pub steps: Vec<String>,
    /// Grams per serving.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serving_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub servings: Option<f64>,
}

impl Recipe {
    /// `serving_size × servings` when both are known and positive.
    pub fn total_weight(&self) -> Option<f64> {
        match (self.serving_size, self.servings) {
            (Some(size), Some(count)) if size > 0.0 && count > 0.0 => Some(size * count),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformRequest {
    pub recipe: Recipe,
    #[serde(default)]
    pub ingredients_to_remove: Option<Vec<String>>,
    #[serde(default)]
    pub ingredients_to_add: Option<Vec<String>>,
    #[serde(default)]
    pub constraints: TransformConstraints,
}

/// One substitution attempt. A failed attempt has
/// `substitute_ingredient == original_ingredient`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Substitution {
    pub original_ingredient: String,
    pub substitute_ingredient: String,
    /// Resolved grams before the change.
    pub original_quantity: Option<f64>,
    /// Resolved grams after the change.
    pub substitute_quantity: Option<f64>,
    pub reason: String,
}

impl Substitution {
    pub fn is_failed(&self) -> bool {
        self.substitute_ingredient == self.original_ingredient
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransformState {
    Received,
    Validated,
    BaselineScored,
    Mutated,
    FinalScored,
    StepAdapted,
    Done,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformResponse {
    pub recipe_id: i64,
    pub original_name: String,
    pub transformed_name: String,
    pub substitutions: Vec<Substitution>,
    pub nutrition_before: NutritionProfile,
    pub nutrition_after: NutritionProfile,
    pub delta: NutritionDelta,
    pub recipe: Recipe,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub partial_adaptation: bool,
    #[serde(default)]
    pub quantity_incomplete: bool,
    pub state: TransformState,
    pub success: bool,
    pub message: Option<String>,
}
