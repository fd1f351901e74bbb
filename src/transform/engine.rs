use std::collections::HashSet;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::errors::{StepAdaptationError, TransformError};
use crate::index::{normalize_name, IngredientLookup};
use crate::nutrition::profile::{NutritionDelta, NutritionProfile};
use crate::nutrition::quantity::QuantityResolver;
use crate::nutrition::recipe_aggregator::{NutritionAggregator, RecipeNutrition};
use crate::substitution::constraints::ConstraintSet;
use crate::substitution::selector::SubstitutionSelector;
use crate::transform::models::{
    Recipe, Substitution, TransformRequest, TransformResponse, TransformState, TransformationType,
};
use crate::transform::step_adapter::{AdaptedSteps, IngredientChange, StepAdaptationRequest, StepAdapter};

/// Applies one ADD, DELETE or SUBSTITUTION to a recipe and reports the
/// nutritional effect. Holds no per-request state, so one engine serves
/// any number of concurrent requests.
pub struct TransformationEngine {
    lookup: Arc<dyn IngredientLookup>,
    config: EngineConfig,
    resolver: QuantityResolver,
    step_adapter: Option<Arc<dyn StepAdapter>>,
}

/// Request-scoped working state.
struct Transformation {
    state: TransformState,
    recipe: Recipe,
    original_ingredients: Vec<String>,
    original_steps: Vec<String>,
    /// Original positions already claimed by a substitution pair.
    claimed: HashSet<usize>,
    substitutions: Vec<Substitution>,
    /// Recipe position of each successful or in-recipe failed substitution.
    substitution_positions: Vec<Option<usize>>,
    changes: Vec<IngredientChange>,
    warnings: Vec<String>,
    notes: Vec<String>,
    partial_adaptation: bool,
}

impl Transformation {
    fn new(recipe: Recipe) -> Self {
        Self {
            state: TransformState::Received,
            original_ingredients: recipe.ingredients.clone(),
            original_steps: recipe.steps.clone(),
            claimed: HashSet::new(),
            recipe,
            substitutions: Vec::new(),
            substitution_positions: Vec::new(),
            changes: Vec::new(),
            warnings: Vec::new(),
            notes: Vec::new(),
            partial_adaptation: false,
        }
    }

    fn advance(&mut self, next: TransformState) {
        debug!(from = ?self.state, to = ?next, recipe = %self.recipe.name, "transformation state");
        self.state = next;
    }

    fn warn(&mut self, message: String) {
        warn!(recipe = %self.recipe.name, "{}", message);
        if !self.warnings.contains(&message) {
            self.warnings.push(message);
        }
    }

    /// First occurrence of `name` in the recipe as received that no earlier
    /// pair has claimed. `Err(true)` when every occurrence is claimed.
    fn claim(&mut self, name: &str) -> Result<usize, bool> {
        let key = normalize_name(name);
        let mut seen = false;
        for (pos, ingredient) in self.original_ingredients.iter().enumerate() {
            if normalize_name(ingredient) != key {
                continue;
            }
            seen = true;
            if self.claimed.insert(pos) {
                return Ok(pos);
            }
        }
        Err(seen)
    }
}

/// One SUBSTITUTION pair; `add` is `None` when the substitute is left to the selector.
struct SubstitutionPair {
    remove: String,
    add: Option<String>,
}

fn trimmed(entry: &str) -> Option<String> {
    let entry = entry.trim();
    (!entry.is_empty()).then(|| entry.to_string())
}

fn non_empty(list: &Option<Vec<String>>) -> Vec<String> {
    list.iter().flatten().filter_map(|s| trimmed(s)).collect()
}

/// Pairs `ingredients_to_remove[i]` with `ingredients_to_add[i]`. A blank add
/// entry, or an add list with no entries at all, means "let the selector
/// choose". Blank remove entries are kept so they can be reported.
fn substitution_pairs(request: &TransformRequest) -> Result<Vec<SubstitutionPair>, TransformError> {
    let remove = request.ingredients_to_remove.as_deref().unwrap_or_default();
    let add = request.ingredients_to_add.as_deref().unwrap_or_default();
    let has_explicit = add.iter().any(|a| !a.trim().is_empty());
    if has_explicit && remove.len() != add.len() {
        return Err(TransformError::validation(format!(
            "ingredients_to_remove ({}) and ingredients_to_add ({}) must be index-aligned",
            remove.len(),
            add.len()
        )));
    }

    let mut pairs = Vec::with_capacity(remove.len());
    for (i, name) in remove.iter().enumerate() {
        let explicit = add.get(i).and_then(|a| trimmed(a));
        if let Some(explicit) = &explicit {
            if normalize_name(explicit) == normalize_name(name) {
                return Err(TransformError::validation(format!(
                    "substitute for '{}' at position {} is the same ingredient",
                    name.trim(),
                    i
                )));
            }
        }
        pairs.push(SubstitutionPair {
            remove: name.trim().to_string(),
            add: explicit,
        });
    }
    Ok(pairs)
}

impl TransformationEngine {
    pub fn new(lookup: Arc<dyn IngredientLookup>, config: EngineConfig) -> Self {
        let config = config.normalized();
        Self {
            lookup,
            resolver: QuantityResolver::new(config.imputation_factor),
            config,
            step_adapter: None,
        }
    }

    pub fn with_step_adapter(mut self, adapter: Arc<dyn StepAdapter>) -> Self {
        self.step_adapter = Some(adapter);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Resolves quantities and aggregates the recipe as given.
    pub fn score(&self, recipe: &Recipe) -> RecipeNutrition {
        NutritionAggregator::new(self.lookup.as_ref(), self.resolver).aggregate(
            &recipe.ingredients,
            &recipe.quantity_ingredients,
            recipe.total_weight(),
        )
    }

    /// Parses a JSON request and transforms it. A malformed body yields a
    /// failed result rather than an error.
    pub async fn transform_json(&self, body: &str) -> TransformResponse {
        match serde_json::from_str::<TransformRequest>(body) {
            Ok(request) => self.transform(request).await,
            Err(err) => self.failed(Recipe::default(), TransformError::from(err)),
        }
    }

    pub async fn transform(&self, request: TransformRequest) -> TransformResponse {
        let (recipe, pairs) = match self.validate(&request) {
            Ok(validated) => validated,
            Err(err) => return self.failed(request.recipe, err),
        };

        let mut work = Transformation::new(recipe);
        let padded = request
            .recipe
            .ingredients
            .len()
            .saturating_sub(request.recipe.quantity_ingredients.len());
        if padded > 0 {
            work.warn(format!(
                "{} missing quantit{} padded with placeholder '{}'",
                padded,
                if padded == 1 { "y" } else { "ies" },
                self.config.placeholder_quantity
            ));
        }
        work.advance(TransformState::Validated);

        let before = self.score(&work.recipe);
        work.advance(TransformState::BaselineScored);

        let transformation = request.constraints.transformation;
        match transformation {
            TransformationType::Add => self.apply_add(&mut work, &non_empty(&request.ingredients_to_add)),
            TransformationType::Delete => self.apply_delete(&mut work, &non_empty(&request.ingredients_to_remove)),
            TransformationType::Substitution => {
                self.apply_substitution(&mut work, &pairs, &ConstraintSet::from(&request.constraints), &before)
            }
        }
        work.advance(TransformState::Mutated);

        let after = self.score(&work.recipe);
        for (entry, pos) in work.substitutions.iter_mut().zip(&work.substitution_positions) {
            if let Some(pos) = pos {
                entry.substitute_quantity = after.resolved.items.get(*pos).map(|item| item.grams);
            }
        }
        for name in before.unmatched.iter().chain(&after.unmatched) {
            work.warn(format!("'{}' not found in ingredient index; contributes no nutrients", name));
        }
        let delta = NutritionDelta::between(&before.profile, &after.profile);
        work.advance(TransformState::FinalScored);

        self.adapt_steps(&mut work).await;

        let message = self.summary(&work, transformation);
        work.advance(TransformState::Done);
        info!(
            recipe = %work.recipe.name,
            transformation = %transformation,
            changes = work.changes.len(),
            score_before = before.profile.score_health,
            score_after = after.profile.score_health,
            "recipe transformed"
        );

        TransformResponse {
            recipe_id: work.recipe.id.unwrap_or(0),
            original_name: request.recipe.name.clone(),
            transformed_name: work.recipe.name.clone(),
            substitutions: work.substitutions,
            nutrition_before: before.profile,
            nutrition_after: after.profile,
            delta,
            quantity_incomplete: before.quantity_incomplete() || after.quantity_incomplete(),
            recipe: work.recipe,
            warnings: work.warnings,
            partial_adaptation: work.partial_adaptation,
            state: work.state,
            success: true,
            message: Some(message),
        }
    }

    /// Checks the request and returns the working copy of the recipe with
    /// its quantity list padded or truncated to the ingredient count, plus the
    /// substitution pairs for a SUBSTITUTION request.
    fn validate(&self, request: &TransformRequest) -> Result<(Recipe, Vec<SubstitutionPair>), TransformError> {
        let recipe = &request.recipe;
        if recipe.ingredients.iter().all(|i| i.trim().is_empty()) {
            return Err(TransformError::validation("recipe has no ingredients"));
        }
        if recipe.steps.iter().all(|s| s.trim().is_empty()) {
            return Err(TransformError::validation("recipe has no steps"));
        }
        let pairs = match request.constraints.transformation {
            TransformationType::Substitution => substitution_pairs(request)?,
            TransformationType::Add | TransformationType::Delete => Vec::new(),
        };

        let mut working = recipe.clone();
        working
            .quantity_ingredients
            .resize(working.ingredients.len(), self.config.placeholder_quantity.clone());
        Ok((working, pairs))
    }

    fn apply_add(&self, work: &mut Transformation, names: &[String]) {
        if names.is_empty() {
            work.warn("no ingredients to add".to_string());
        }
        for name in names {
            work.recipe.ingredients.push(name.clone());
            work.recipe.quantity_ingredients.push(self.config.placeholder_quantity.clone());
            work.changes.push(IngredientChange::Added { ingredient: name.clone() });
        }
    }

    fn apply_delete(&self, work: &mut Transformation, names: &[String]) {
        if names.is_empty() {
            work.warn("no ingredients to remove".to_string());
        }
        for name in names {
            let key = normalize_name(name);
            let keep: Vec<bool> = work.recipe.ingredients.iter().map(|i| normalize_name(i) != key).collect();
            if keep.iter().all(|k| *k) {
                work.warn(format!("'{}' not found in recipe; nothing removed", name));
                continue;
            }
            let mut flags = keep.iter();
            work.recipe.ingredients.retain(|_| *flags.next().unwrap_or(&true));
            let mut flags = keep.iter();
            work.recipe.quantity_ingredients.retain(|_| *flags.next().unwrap_or(&true));
            work.changes.push(IngredientChange::Removed { ingredient: name.clone() });
        }
    }

    fn apply_substitution(
        &self,
        work: &mut Transformation,
        pairs: &[SubstitutionPair],
        constraints: &ConstraintSet,
        before: &RecipeNutrition,
    ) {
        let selector = SubstitutionSelector::new(self.lookup.index());

        for (i, pair) in pairs.iter().enumerate() {
            let name = &pair.remove;
            if name.is_empty() {
                match &pair.add {
                    Some(add) => work.warn(format!("blank ingredient to remove at position {}; '{}' not added", i, add)),
                    None => work.warn(format!("blank ingredient to remove at position {}; skipped", i)),
                }
                continue;
            }
            let pos = match work.claim(name) {
                Ok(pos) => pos,
                Err(already_claimed) => {
                    let reason = if already_claimed {
                        "already substituted by an earlier pair"
                    } else {
                        "not found in recipe"
                    };
                    work.warn(format!("'{}' {}; not substituted", name, reason));
                    work.substitutions.push(Substitution {
                        original_ingredient: name.clone(),
                        substitute_ingredient: name.clone(),
                        original_quantity: None,
                        substitute_quantity: None,
                        reason: reason.to_string(),
                    });
                    work.substitution_positions.push(None);
                    continue;
                }
            };
            let original = work.original_ingredients[pos].clone();
            let original_grams = before.resolved.items.get(pos).map(|item| item.grams);

            let chosen = match &pair.add {
                Some(explicit) => Ok((explicit.clone(), "requested substitute".to_string())),
                None => self.choose_substitute(&selector, &original, constraints),
            };

            match chosen {
                Ok((substitute, reason)) => {
                    debug!(original = %original, substitute = %substitute, "substituting ingredient");
                    work.recipe.ingredients[pos] = substitute.clone();
                    work.changes.push(IngredientChange::Substituted {
                        original: original.clone(),
                        substitute: substitute.clone(),
                    });
                    work.substitutions.push(Substitution {
                        original_ingredient: original,
                        substitute_ingredient: substitute,
                        original_quantity: original_grams,
                        substitute_quantity: None,
                        reason,
                    });
                }
                Err(reason) => {
                    work.warn(format!("no substitute for '{}': {}", original, reason));
                    work.substitutions.push(Substitution {
                        original_ingredient: original.clone(),
                        substitute_ingredient: original,
                        original_quantity: original_grams,
                        substitute_quantity: None,
                        reason,
                    });
                }
            }
            work.substitution_positions.push(Some(pos));
        }
    }

    /// Nearest eligible replacement for `original`, with the reason text, or
    /// the reason no replacement exists.
    fn choose_substitute(
        &self,
        selector: &SubstitutionSelector<'_>,
        original: &str,
        constraints: &ConstraintSet,
    ) -> Result<(String, String), String> {
        let index = self.lookup.index();
        let row = self
            .lookup
            .resolve(original)
            .ok_or_else(|| "not found in ingredient index".to_string())?;

        let ranked = selector.rank(row, constraints, self.config.candidate_pool);
        let best = ranked
            .first()
            .ok_or_else(|| format!("no eligible substitute satisfies constraints: {}", constraints.describe()))?;

        let same_cluster = match (index.get(row).and_then(|r| r.cluster), best.cluster) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        };
        let reason = format!(
            "nearest eligible ingredient (distance {:.3}{}); constraints: {}",
            best.distance,
            if same_cluster { ", same cluster" } else { "" },
            constraints.describe()
        );
        Ok((best.name.clone(), reason))
    }

    async fn adapt_steps(&self, work: &mut Transformation) {
        if work.changes.is_empty() {
            return;
        }
        let Some(adapter) = &self.step_adapter else {
            work.notes.push("step adaptation skipped".to_string());
            return;
        };

        let request = StepAdaptationRequest {
            recipe_name: work.recipe.name.clone(),
            ingredients: work.recipe.ingredients.clone(),
            steps: work.original_steps.clone(),
            changes: work.changes.clone(),
        };
        match self.call_step_adapter(adapter.as_ref(), &request).await {
            Ok(adapted) => {
                work.recipe.steps = adapted.steps;
                work.notes.extend(adapted.notes);
                work.advance(TransformState::StepAdapted);
            }
            Err(err) => {
                work.recipe.steps = work.original_steps.clone();
                work.partial_adaptation = true;
                work.warn(format!("step adaptation failed, original steps kept: {}", err));
            }
        }
    }

    /// One attempt plus at most one retry, each bounded by the configured timeout.
    async fn call_step_adapter(
        &self,
        adapter: &dyn StepAdapter,
        request: &StepAdaptationRequest,
    ) -> Result<AdaptedSteps, StepAdaptationError> {
        let limit = self.config.step_adaptation_timeout;
        let attempts = self.config.step_adaptation_attempts();
        let mut last_error = StepAdaptationError::Timeout(limit);

        for attempt in 1..=attempts {
            match timeout(limit, adapter.adapt(request)).await {
                Ok(Ok(adapted)) => return Ok(adapted),
                Ok(Err(err)) => {
                    warn!(attempt, attempts, error = %err, "step adaptation attempt failed");
                    last_error = err;
                }
                Err(_) => {
                    warn!(attempt, attempts, timeout = ?limit, "step adaptation attempt timed out");
                    last_error = StepAdaptationError::Timeout(limit);
                }
            }
        }
        Err(last_error)
    }

    fn summary(&self, work: &Transformation, transformation: TransformationType) -> String {
        let mut parts = Vec::new();
        let applied = work.changes.len();
        match transformation {
            TransformationType::Substitution if work.substitutions.is_empty() => {
                parts.push("no substitutions requested".to_string())
            }
            TransformationType::Substitution => parts.push(format!(
                "{} of {} substitution(s) applied",
                applied,
                work.substitutions.len()
            )),
            TransformationType::Add => parts.push(format!("{} ingredient(s) added", applied)),
            TransformationType::Delete => parts.push(format!("{} ingredient(s) removed", applied)),
        }
        if work.partial_adaptation {
            parts.push("steps not adapted".to_string());
        }
        parts.extend(work.notes.iter().cloned());
        parts.join("; ")
    }

    fn failed(&self, recipe: Recipe, err: TransformError) -> TransformResponse {
        warn!(recipe = %recipe.name, error = %err, "transformation rejected");
        TransformResponse {
            recipe_id: recipe.id.unwrap_or(0),
            original_name: recipe.name.clone(),
            transformed_name: recipe.name.clone(),
            substitutions: Vec::new(),
            nutrition_before: NutritionProfile::default(),
            nutrition_after: NutritionProfile::default(),
            delta: NutritionDelta::default(),
            recipe,
            warnings: Vec::new(),
            partial_adaptation: false,
            quantity_incomplete: false,
            state: TransformState::Failed,
            success: false,
            message: Some(err.to_string()),
        }
    }
}
