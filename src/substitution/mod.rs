pub mod constraints;
pub mod selector;

pub use constraints::{Allergen, Constraint, ConstraintSet, Diet, Direction, Nutrient};
pub use selector::{Candidate, SubstitutionSelector};
