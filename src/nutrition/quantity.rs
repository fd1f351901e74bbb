use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

// Mass conversion constants (to grams)
const GRAMS_PER_KG: f64 = 1000.0;
const GRAMS_PER_MG: f64 = 0.001;
const GRAMS_PER_OZ: f64 = 28.35;
const GRAMS_PER_LB: f64 = 453.6;

/// Share of the remaining mass given to each unknown ingredient.
pub const DEFAULT_IMPUTATION_FACTOR: f64 = 0.5;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ResolvedIngredient {
    pub ingredient: String,
    pub grams: f64,
    /// False when the grams were imputed rather than parsed.
    pub known: bool,
}

/// Ingredient -> grams pairs in recipe order, every entry non-null.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct ResolvedQuantities {
    pub items: Vec<ResolvedIngredient>,
    /// Sum of parsed gram quantities (K).
    pub known_grams: f64,
    /// Number of ingredients whose quantity could not be parsed (U).
    pub unknown_count: usize,
    /// Declared total weight (W) when it is known and positive.
    pub total_weight: Option<f64>,
    /// Set when unknown ingredients could not be imputed for lack of W.
    pub quantity_incomplete: bool,
}

impl ResolvedQuantities {
    /// Denominator used for per-100g normalization: `max(W, K)`.
    pub fn normalization_mass(&self) -> f64 {
        self.total_weight.unwrap_or(0.0).max(self.known_grams)
    }

    pub fn grams_of(&self, ingredient: &str) -> Option<f64> {
        let key = ingredient.trim().to_lowercase();
        self.items
            .iter()
            .find(|item| item.ingredient.trim().to_lowercase() == key)
            .map(|item| item.grams)
    }
}

fn parse_number(token: &str) -> Option<f64> {
    if let Some((num, den)) = token.split_once('/') {
        let num: f64 = num.trim().parse().ok()?;
        let den: f64 = den.trim().parse().ok()?;
        if den == 0.0 {
            return None;
        }
        return Some(num / den);
    }
    token.parse::<f64>().ok()
}

fn unit_factor(unit: &str) -> Option<f64> {
    match unit {
        "" | "g" | "gr" | "gram" | "grams" | "gramme" | "grammes" => Some(1.0),
        "kg" | "kilo" | "kilos" | "kilogram" | "kilograms" => Some(GRAMS_PER_KG),
        "mg" | "milligram" | "milligrams" => Some(GRAMS_PER_MG),
        "oz" | "ounce" | "ounces" => Some(GRAMS_PER_OZ),
        "lb" | "lbs" | "pound" | "pounds" => Some(GRAMS_PER_LB),
        _ => None,
    }
}

/// Parses a quantity string into grams.
///
/// Accepts a non-negative number, simple fraction (`1/2`) or mixed number
/// (`1 1/2`), optionally followed by a mass unit with or without a space
/// (`100g`, `1.5 kg`, `8 oz`). A bare number is taken as grams. Volume units
/// and free text return `None`.
pub fn parse_quantity_grams(raw: &str) -> Option<f64> {
    let text = raw.trim().to_lowercase();
    if text.is_empty() {
        return None;
    }

    let split_at = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '/' || c == ' '))
        .unwrap_or(text.len());
    let (number_part, unit_part) = text.split_at(split_at);
    let unit = unit_part.trim().trim_end_matches('.');

    let mut amount = 0.0;
    let mut parsed_any = false;
    for token in number_part.split_whitespace() {
        amount += parse_number(token)?;
        parsed_any = true;
    }
    if !parsed_any || !amount.is_finite() || amount < 0.0 {
        return None;
    }

    unit_factor(unit).map(|factor| amount * factor)
}

/// Completes partially known ingredient quantities into grams.
#[derive(Debug, Clone, Copy)]
pub struct QuantityResolver {
    imputation_factor: f64,
}

impl Default for QuantityResolver {
    fn default() -> Self {
        Self::new(DEFAULT_IMPUTATION_FACTOR)
    }
}

impl QuantityResolver {
    pub fn new(imputation_factor: f64) -> Self {
        Self { imputation_factor }
    }

    /// Resolves every ingredient to a gram amount. Never fails.
    ///
    /// Unknown quantities each receive `max(W - K, 0) / U * factor` grams.
    /// When `total_weight` is missing or not positive they receive 0 g and the
    /// result is flagged `quantity_incomplete`, but it stays scorable.
    /// `quantities` shorter than `ingredients` leaves the tail unknown.
    pub fn resolve(
        &self,
        ingredients: &[String],
        quantities: &[String],
        total_weight: Option<f64>,
    ) -> ResolvedQuantities {
        let parsed: Vec<Option<f64>> = ingredients
            .iter()
            .enumerate()
            .map(|(i, _)| quantities.get(i).and_then(|q| parse_quantity_grams(q)))
            .collect();

        let known_grams: f64 = parsed.iter().flatten().sum();
        let unknown_count = parsed.iter().filter(|p| p.is_none()).count();
        let total_weight = total_weight.filter(|w| w.is_finite() && *w > 0.0);

        let (imputed, quantity_incomplete) = match (unknown_count, total_weight) {
            (0, _) => (0.0, false),
            (u, Some(w)) => ((w - known_grams).max(0.0) / u as f64 * self.imputation_factor, false),
            (u, None) => {
                warn!(unknown = u, "total weight unknown; unknown quantities resolved to 0 g");
                (0.0, true)
            }
        };

        let items = ingredients
            .iter()
            .zip(parsed)
            .map(|(name, grams)| ResolvedIngredient {
                ingredient: name.clone(),
                grams: grams.unwrap_or(imputed),
                known: grams.is_some(),
            })
            .collect();

        debug!(known_grams, unknown_count, imputed, ?total_weight, "resolved quantities");

        ResolvedQuantities {
            items,
            known_grams,
            unknown_count,
            total_weight,
            quantity_incomplete,
        }
    }
}
