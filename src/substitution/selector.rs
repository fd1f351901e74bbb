use serde::Serialize;
use std::cmp::Ordering;
use tracing::debug;

use crate::index::embedding_store::compare_distance;
use crate::index::{normalize_name, IngredientIndex};
use crate::substitution::constraints::ConstraintSet;

/// An eligible replacement and its distance to the original ingredient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub row: usize,
    pub name: String,
    pub distance: f32,
    pub health_score: f64,
    pub cluster: Option<u32>,
}

/// Picks replacements by distance in the nutritional coordinate space.
/// Read-only over the index.
pub struct SubstitutionSelector<'a> {
    index: &'a IngredientIndex,
}

impl<'a> SubstitutionSelector<'a> {
    pub fn new(index: &'a IngredientIndex) -> Self {
        Self { index }
    }

    /// Up to `top_k` candidates for `original_row`, best first.
    ///
    /// Candidates pass the eligibility filter (no excluded tag, not the
    /// original itself), then the directional filter (every active goal
    /// strictly improves), and are ranked by distance, then higher health
    /// score, then name.
    pub fn rank(&self, original_row: usize, constraints: &ConstraintSet, top_k: usize) -> Vec<Candidate> {
        let Some(original) = self.index.get(original_row) else {
            return Vec::new();
        };
        let original_key = normalize_name(&original.name);

        let eligible = |row: usize| {
            if row == original_row {
                return false;
            }
            let Some(record) = self.index.get(row) else {
                return false;
            };
            normalize_name(&record.name) != original_key
                && constraints.permits(record)
                && constraints.improves(&original.nutrients, &record.nutrients)
        };

        let neighbors = self.index.neighbors_of(original_row, self.index.len(), eligible);

        let mut candidates: Vec<Candidate> = neighbors
            .into_iter()
            .filter_map(|n| {
                self.index.get(n.row).map(|record| Candidate {
                    row: n.row,
                    name: record.name.clone(),
                    distance: n.distance,
                    health_score: record.health_score,
                    cluster: record.cluster,
                })
            })
            .collect();

        candidates.sort_by(|a, b| {
            compare_distance(a.distance, b.distance)
                .then_with(|| b.health_score.partial_cmp(&a.health_score).unwrap_or(Ordering::Equal))
                .then_with(|| a.name.cmp(&b.name))
        });
        candidates.truncate(top_k);

        debug!(
            original = %original.name,
            constraints = %constraints.describe(),
            candidates = ?candidates.iter().map(|c| (&c.name, c.distance)).collect::<Vec<_>>(),
            "ranked substitution candidates"
        );
        candidates
    }

    /// The best candidate, or `None` when nothing is eligible.
    pub fn select(&self, original_row: usize, constraints: &ConstraintSet) -> Option<Candidate> {
        self.rank(original_row, constraints, 1).into_iter().next()
    }
}
