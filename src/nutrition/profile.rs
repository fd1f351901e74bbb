use serde::{Deserialize, Serialize};

/// Invokes `$mac!` once per nutrient field name. Keeps the field-wise
/// arithmetic below in one place as the vector grows.
macro_rules! for_each_nutrient {
    ($mac:ident) => {
        $mac!(energy_kcal);
        $mac!(protein_g);
        $mac!(fat_g);
        $mac!(saturated_fat_g);
        $mac!(carbs_g);
        $mac!(fiber_g);
        $mac!(sugar_g);
        $mac!(sodium_mg);
        $mac!(calcium_mg);
        $mac!(iron_mg);
        $mac!(potassium_mg);
        $mac!(vitamin_c_mg);
        $mac!(magnesium_mg);
    };
}

/// Nutrients for a fixed mass of food. In the ingredient index the mass is
/// 100 g; in an aggregated recipe it is whatever the sum represents.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq)]
pub struct NutrientVector {
    pub energy_kcal: f64,
    pub protein_g: f64,
    pub fat_g: f64,
    pub saturated_fat_g: f64,
    pub carbs_g: f64,
    pub fiber_g: f64,
    pub sugar_g: f64,
    pub sodium_mg: f64,
    pub calcium_mg: f64,
    pub iron_mg: f64,
    pub potassium_mg: f64,
    pub vitamin_c_mg: f64,
    pub magnesium_mg: f64,
}

/// Column names of the 13 nutrient fields, in declaration order.
pub const NUTRIENT_COLUMNS: [&str; 13] = [
    "energy_kcal",
    "protein_g",
    "fat_g",
    "saturated_fat_g",
    "carbs_g",
    "fiber_g",
    "sugar_g",
    "sodium_mg",
    "calcium_mg",
    "iron_mg",
    "potassium_mg",
    "vitamin_c_mg",
    "magnesium_mg",
];

impl NutrientVector {
    /// Builds a vector from values ordered as [`NUTRIENT_COLUMNS`].
    pub fn from_array(values: [f64; 13]) -> Self {
        let [energy_kcal, protein_g, fat_g, saturated_fat_g, carbs_g, fiber_g, sugar_g, sodium_mg, calcium_mg, iron_mg, potassium_mg, vitamin_c_mg, magnesium_mg] =
            values;
        Self {
            energy_kcal,
            protein_g,
            fat_g,
            saturated_fat_g,
            carbs_g,
            fiber_g,
            sugar_g,
            sodium_mg,
            calcium_mg,
            iron_mg,
            potassium_mg,
            vitamin_c_mg,
            magnesium_mg,
        }
    }

    pub fn scaled(&self, factor: f64) -> Self {
        let mut out = *self;
        macro_rules! scale {
            ($field:ident) => {
                out.$field = self.$field * factor;
            };
        }
        for_each_nutrient!(scale);
        out
    }

    pub fn add_assign(&mut self, other: &NutrientVector) {
        macro_rules! add {
            ($field:ident) => {
                self.$field += other.$field;
            };
        }
        for_each_nutrient!(add);
    }

    pub fn minus(&self, other: &NutrientVector) -> Self {
        let mut out = *self;
        macro_rules! sub {
            ($field:ident) => {
                out.$field = self.$field - other.$field;
            };
        }
        for_each_nutrient!(sub);
        out
    }

    /// Nutrients contributed by `grams` of a food described per 100 g.
    pub fn contribution(&self, grams: f64) -> Self {
        self.scaled(grams / 100.0)
    }
}

/// Per-100g nutrient profile of a recipe plus its health score. Always
/// derived from the ingredient index, never stored as a source of truth.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq)]
pub struct NutritionProfile {
    #[serde(flatten)]
    pub per_100g: NutrientVector,
    pub score_health: f64,
}

/// Field-wise `after - before`, in the shape returned to callers.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq)]
pub struct NutritionDelta {
    pub calories: f64,
    pub protein_g: f64,
    pub fat_g: f64,
    pub saturated_fat_g: f64,
    pub carbs_g: f64,
    pub fiber_g: f64,
    pub sugar_g: f64,
    pub sodium_mg: f64,
    pub score_health: f64,
}

impl NutritionDelta {
    pub fn between(before: &NutritionProfile, after: &NutritionProfile) -> Self {
        let diff = after.per_100g.minus(&before.per_100g);
        Self {
            calories: diff.energy_kcal,
            protein_g: diff.protein_g,
            fat_g: diff.fat_g,
            saturated_fat_g: diff.saturated_fat_g,
            carbs_g: diff.carbs_g,
            fiber_g: diff.fiber_g,
            sugar_g: diff.sugar_g,
            sodium_mg: diff.sodium_mg,
            score_health: after.score_health - before.score_health,
        }
    }
}
