//! Closed set of substitution constraints. Wire flags are translated once,
//! so the selector's filters can match on every variant.

use std::fmt;

use crate::index::tags::{DietTag, TagSet};
use crate::index::IngredientRecord;
use crate::nutrition::profile::NutrientVector;
use crate::transform::models::TransformConstraints;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Allergen {
    Lactose,
    Gluten,
    Nuts,
}

impl Allergen {
    pub fn excluded_tags(self) -> &'static [DietTag] {
        match self {
            Allergen::Lactose => &[DietTag::Dairy],
            Allergen::Gluten => &[DietTag::Gluten],
            Allergen::Nuts => &[DietTag::Nuts],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Diet {
    Vegetarian,
    Vegan,
}

impl Diet {
    pub fn excluded_tags(self) -> &'static [DietTag] {
        match self {
            Diet::Vegetarian => &[DietTag::Meat, DietTag::Fish],
            Diet::Vegan => &[DietTag::Meat, DietTag::Fish, DietTag::Dairy, DietTag::Egg, DietTag::Honey],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Nutrient {
    Calories,
    Protein,
    Carbs,
    Sugar,
    Fiber,
    Sodium,
}

impl Nutrient {
    pub fn value(self, nutrients: &NutrientVector) -> f64 {
        match self {
            Nutrient::Calories => nutrients.energy_kcal,
            Nutrient::Protein => nutrients.protein_g,
            Nutrient::Carbs => nutrients.carbs_g,
            Nutrient::Sugar => nutrients.sugar_g,
            Nutrient::Fiber => nutrients.fiber_g,
            Nutrient::Sodium => nutrients.sodium_mg,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Nutrient::Calories => "calories",
            Nutrient::Protein => "protein",
            Nutrient::Carbs => "carbs",
            Nutrient::Sugar => "sugar",
            Nutrient::Fiber => "fiber",
            Nutrient::Sodium => "sodium",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Increase,
    Decrease,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Constraint {
    AllergenExclusion(Allergen),
    DietPreference(Diet),
    NutritionGoal(Nutrient, Direction),
}

impl Constraint {
    /// Tags a candidate must not carry under this constraint.
    pub fn excluded_tags(&self) -> &'static [DietTag] {
        match self {
            Constraint::AllergenExclusion(allergen) => allergen.excluded_tags(),
            Constraint::DietPreference(diet) => diet.excluded_tags(),
            Constraint::NutritionGoal(..) => &[],
        }
    }

    /// Strict per-100g improvement of `candidate` over `original`. Always true
    /// for non-goal constraints.
    pub fn improves(&self, original: &NutrientVector, candidate: &NutrientVector) -> bool {
        match self {
            Constraint::NutritionGoal(nutrient, Direction::Increase) => nutrient.value(candidate) > nutrient.value(original),
            Constraint::NutritionGoal(nutrient, Direction::Decrease) => nutrient.value(candidate) < nutrient.value(original),
            Constraint::AllergenExclusion(_) | Constraint::DietPreference(_) => true,
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::AllergenExclusion(Allergen::Lactose) => f.write_str("no_lactose"),
            Constraint::AllergenExclusion(Allergen::Gluten) => f.write_str("no_gluten"),
            Constraint::AllergenExclusion(Allergen::Nuts) => f.write_str("no_nuts"),
            Constraint::DietPreference(Diet::Vegetarian) => f.write_str("vegetarian"),
            Constraint::DietPreference(Diet::Vegan) => f.write_str("vegan"),
            Constraint::NutritionGoal(nutrient, Direction::Increase) => write!(f, "increase_{}", nutrient.label()),
            Constraint::NutritionGoal(nutrient, Direction::Decrease) => write!(f, "decrease_{}", nutrient.label()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstraintSet {
    constraints: Vec<Constraint>,
}

impl ConstraintSet {
    pub fn new(constraints: Vec<Constraint>) -> Self {
        let mut set = Self::default();
        for c in constraints {
            set.insert(c);
        }
        set
    }

    pub fn insert(&mut self, constraint: Constraint) {
        if !self.constraints.contains(&constraint) {
            self.constraints.push(constraint);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter()
    }

    pub fn excluded_tags(&self) -> TagSet {
        self.constraints.iter().flat_map(|c| c.excluded_tags().iter().copied()).collect()
    }

    /// Eligibility: the record carries none of the excluded tags.
    pub fn permits(&self, record: &IngredientRecord) -> bool {
        self.constraints
            .iter()
            .all(|c| c.excluded_tags().iter().all(|tag| !record.has_tag(*tag)))
    }

    /// Every active goal improves strictly.
    pub fn improves(&self, original: &NutrientVector, candidate: &NutrientVector) -> bool {
        self.constraints.iter().all(|c| c.improves(original, candidate))
    }

    pub fn describe(&self) -> String {
        if self.constraints.is_empty() {
            return "none".to_string();
        }
        self.constraints.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
    }
}

impl From<&TransformConstraints> for ConstraintSet {
    fn from(flags: &TransformConstraints) -> Self {
        let mapping = [
            (flags.no_lactose, Constraint::AllergenExclusion(Allergen::Lactose)),
            (flags.no_gluten, Constraint::AllergenExclusion(Allergen::Gluten)),
            (flags.no_nuts, Constraint::AllergenExclusion(Allergen::Nuts)),
            (flags.vegetarian, Constraint::DietPreference(Diet::Vegetarian)),
            (flags.vegan, Constraint::DietPreference(Diet::Vegan)),
            (flags.increase_protein, Constraint::NutritionGoal(Nutrient::Protein, Direction::Increase)),
            (flags.decrease_protein, Constraint::NutritionGoal(Nutrient::Protein, Direction::Decrease)),
            (flags.decrease_sugar, Constraint::NutritionGoal(Nutrient::Sugar, Direction::Decrease)),
            (flags.decrease_carbs, Constraint::NutritionGoal(Nutrient::Carbs, Direction::Decrease)),
            (flags.decrease_calories, Constraint::NutritionGoal(Nutrient::Calories, Direction::Decrease)),
            (flags.decrease_sodium, Constraint::NutritionGoal(Nutrient::Sodium, Direction::Decrease)),
            (flags.increase_fiber, Constraint::NutritionGoal(Nutrient::Fiber, Direction::Increase)),
        ];
        ConstraintSet::new(mapping.into_iter().filter(|(on, _)| *on).map(|(_, c)| c).collect())
    }
}
