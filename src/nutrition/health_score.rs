use crate::nutrition::profile::NutrientVector;

// Daily references for the benefit term.
const PROTEIN_REF_G: f64 = 50.0;
const FIBER_REF_G: f64 = 30.0;

// Daily limits for the risk term and the slope applied once a limit is exceeded.
const SUGAR_LIMIT_G: f64 = 50.0;
const SAT_FAT_LIMIT_G: f64 = 20.0;
const SODIUM_LIMIT_MG: f64 = 2000.0;
const SUGAR_SLOPE: f64 = 1.2;
const SAT_FAT_SLOPE: f64 = 1.0;
const SODIUM_SLOPE: f64 = 1.5;

const CALCIUM_REF_MG: f64 = 1000.0;
const IRON_REF_MG: f64 = 18.0;
const POTASSIUM_REF_MG: f64 = 3500.0;
const VITAMIN_C_REF_MG: f64 = 90.0;
const MAGNESIUM_REF_MG: f64 = 350.0;

const BENEFIT_WEIGHT: f64 = 0.4;
const RISK_WEIGHT: f64 = 0.4;
const MICRO_WEIGHT: f64 = 0.2;

/// Share of a daily reference reached, capped at 1. Negative input counts as 0.
fn adequacy(value: f64, reference: f64) -> f64 {
    (value.max(0.0) / reference).min(1.0)
}

/// Mean adequacy of protein and fiber, in [0, 1].
pub fn benefit_score(nutrients: &NutrientVector) -> f64 {
    (adequacy(nutrients.protein_g, PROTEIN_REF_G) + adequacy(nutrients.fiber_g, FIBER_REF_G)) / 2.0
}

/// `1 - ratio` while under the limit, then a negative penalty growing with
/// `slope` once the limit is exceeded.
fn limit_subscore(value: f64, limit: f64, slope: f64) -> f64 {
    let ratio = value.max(0.0) / limit;
    if ratio <= 1.0 {
        1.0 - ratio
    } else {
        -slope * (ratio - 1.0)
    }
}

/// Mean of the sugar, saturated fat and sodium subscores. Unbounded below, at most 1.
pub fn risk_score(nutrients: &NutrientVector) -> f64 {
    let sugar = limit_subscore(nutrients.sugar_g, SUGAR_LIMIT_G, SUGAR_SLOPE);
    let sat_fat = limit_subscore(nutrients.saturated_fat_g, SAT_FAT_LIMIT_G, SAT_FAT_SLOPE);
    let sodium = limit_subscore(nutrients.sodium_mg, SODIUM_LIMIT_MG, SODIUM_SLOPE);
    (sugar + sat_fat + sodium) / 3.0
}

/// Mean adequacy over calcium, iron, potassium, vitamin C and magnesium, in [0, 1].
pub fn micronutrient_score(nutrients: &NutrientVector) -> f64 {
    let total = adequacy(nutrients.calcium_mg, CALCIUM_REF_MG)
        + adequacy(nutrients.iron_mg, IRON_REF_MG)
        + adequacy(nutrients.potassium_mg, POTASSIUM_REF_MG)
        + adequacy(nutrients.vitamin_c_mg, VITAMIN_C_REF_MG)
        + adequacy(nutrients.magnesium_mg, MAGNESIUM_REF_MG);
    total / 5.0
}

/// Composite health score on a 0-100 scale. Applied identically to a single
/// ingredient's per-100g vector or to a recipe's normalized profile.
///
/// The score is floored at 0 and is exactly 0 when the vector carries no
/// energy, so an empty or entirely unmatched recipe never looks healthy.
pub fn health_score(nutrients: &NutrientVector) -> f64 {
    if nutrients.energy_kcal == 0.0 {
        return 0.0;
    }
    let raw = BENEFIT_WEIGHT * benefit_score(nutrients)
        + RISK_WEIGHT * risk_score(nutrients)
        + MICRO_WEIGHT * micronutrient_score(nutrients);
    (raw * 100.0).max(0.0)
}
