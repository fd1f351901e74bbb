use async_trait::async_trait;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;

use recipe_transform::config::EngineConfig;
use recipe_transform::errors::StepAdaptationError;
use recipe_transform::index::{load_ingredient_table, DietTag, IngredientIndex, IngredientLookup};
use recipe_transform::transform::{
    AdaptedSteps, IngredientChange, Recipe, StepAdaptationRequest, StepAdapter, TransformRequest, TransformState,
    TransformationEngine,
};

const HEADER: &str = "name,energy_kcal,protein_g,fat_g,saturated_fat_g,carbs_g,fiber_g,sugar_g,sodium_mg,calcium_mg,iron_mg,potassium_mg,vitamin_c_mg,magnesium_mg,cluster,pca_1,pca_2";

const ROWS: &[&str] = &[
    "Heavy cream,340,2.8,36,23,2.8,0,2.9,27,65,0,95,0.6,7,0,0.0,0.0",
    "Whipping cream,292,2.2,31,19,3,0,3,34,69,0,75,0.6,7,0,0.1,0.0",
    "Coconut cream,330,3.6,34.7,30,6.6,2.2,3.3,4,11,2.3,325,2.8,37,0,0.4,0.1",
    "Oat cream,150,1,13,1.5,6,0.8,3,40,120,0.3,90,0,10,0,0.5,0.2",
    "Butter,717,0.9,81,51,0.1,0,0.1,11,24,0,24,0,2,0,0.2,0.3",
    "Pasta,371,13,1.5,0.3,75,3.2,2.7,6,21,3.3,223,0,53,1,4.0,4.0",
    "Bacon,541,37,42,14,1.4,0,0,1717,11,1.4,565,0,32,2,7.0,1.0",
    "Egg yolk,322,16,27,9.6,3.6,0,0.6,48,129,2.7,109,0,5,2,6.0,2.0",
    "Parmesan,431,38,29,19,4.1,0,0.9,1529,1184,0.8,92,0,44,2,6.5,1.5",
    "Black pepper,251,10,3.3,1.4,64,25,0.6,20,443,9.7,1329,0,171,3,9.0,9.0",
];

fn write_index() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{}", HEADER).unwrap();
    for row in ROWS {
        writeln!(file, "{}", row).unwrap();
    }
    file.flush().unwrap();
    file
}

fn load_index() -> Arc<IngredientIndex> {
    let file = write_index();
    Arc::new(load_ingredient_table(file.path()).unwrap())
}

fn carbonara() -> Recipe {
    Recipe {
        id: Some(7),
        name: "Creamy carbonara".into(),
        ingredients: vec!["Pasta".into(), "Heavy cream".into(), "Bacon".into(), "Egg yolk".into(), "Black pepper".into()],
        quantity_ingredients: vec!["200g".into(), "100g".into(), "80g".into(), "40g".into(), "to taste".into()],
        minutes: 25.0,
        steps: vec![
            "Cook the pasta.".into(),
            "Fry the bacon.".into(),
            "Stir in the heavy cream and egg yolk.".into(),
        ],
        serving_size: Some(250.0),
        servings: Some(2.0),
    }
}

fn substitution(remove: &[&str], add: Option<&[&str]>, no_lactose: bool) -> TransformRequest {
    let body = serde_json::json!({
        "recipe": carbonara(),
        "ingredients_to_remove": remove,
        "ingredients_to_add": add,
        "constraints": {"transformation": 2, "no_lactose": no_lactose}
    });
    serde_json::from_value(body).unwrap()
}

/// Returns the original steps with a marker and counts calls.
struct EchoAdapter {
    calls: AtomicUsize,
}

#[async_trait]
impl StepAdapter for EchoAdapter {
    async fn adapt(&self, request: &StepAdaptationRequest) -> Result<AdaptedSteps, StepAdaptationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let substitute = request
            .changes
            .iter()
            .find_map(|c| match c {
                IngredientChange::Substituted { substitute, .. } => Some(substitute.clone()),
                _ => None,
            })
            .unwrap_or_default();
        Ok(AdaptedSteps {
            steps: request.steps.iter().map(|s| s.replace("heavy cream", &substitute)).collect(),
            notes: vec!["texture will be lighter".into()],
        })
    }
}

struct SlowAdapter {
    calls: AtomicUsize,
}

#[async_trait]
impl StepAdapter for SlowAdapter {
    async fn adapt(&self, _request: &StepAdaptationRequest) -> Result<AdaptedSteps, StepAdaptationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(AdaptedSteps::default())
    }
}

struct FailingAdapter {
    calls: AtomicUsize,
}

#[async_trait]
impl StepAdapter for FailingAdapter {
    async fn adapt(&self, _request: &StepAdaptationRequest) -> Result<AdaptedSteps, StepAdaptationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StepAdaptationError::Other("service unavailable".into()))
    }
}

fn fast_timeout() -> EngineConfig {
    EngineConfig {
        step_adaptation_timeout: Duration::from_millis(50),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_heavy_cream_without_lactose_is_replaced_by_non_dairy() {
    let index = load_index();
    let engine = TransformationEngine::new(index.clone(), EngineConfig::default());
    let response = engine.transform(substitution(&["Heavy cream"], None, true)).await;

    assert!(response.success);
    assert_eq!(response.state, TransformState::Done);
    let entry = &response.substitutions[0];
    assert!(!entry.is_failed());
    assert_eq!(entry.substitute_ingredient, "Coconut cream");
    assert_eq!(entry.original_quantity, Some(100.0));
    assert!(entry.reason.contains("no_lactose"));
    assert!(entry.reason.contains("same cluster"));

    let record = index.record(&entry.substitute_ingredient).unwrap();
    assert!(!record.has_tag(DietTag::Dairy));
    assert!(response.delta.fat_g < 0.0);
    assert_eq!(response.recipe.quantity_ingredients[1], "100g");
    assert_eq!(response.recipe_id, 7);
    assert_eq!(response.transformed_name, response.original_name);
}

#[tokio::test]
async fn test_without_constraint_the_nearest_dairy_record_is_allowed() {
    let engine = TransformationEngine::new(load_index(), EngineConfig::default());
    let response = engine.transform(substitution(&["Heavy cream"], None, false)).await;
    assert_eq!(response.substitutions[0].substitute_ingredient, "Whipping cream");
}

#[tokio::test]
async fn test_unknown_quantities_get_half_share_of_total_weight() {
    let engine = TransformationEngine::new(load_index(), EngineConfig::default());
    let recipe = Recipe {
        ingredients: vec!["Pasta".into(), "Butter".into(), "Parmesan".into()],
        quantity_ingredients: vec!["".into(), "a knob".into(), "some".into()],
        serving_size: Some(100.0),
        servings: Some(3.0),
        ..carbonara()
    };
    let nutrition = engine.score(&recipe);
    assert!(nutrition.resolved.items.iter().all(|item| item.grams == 50.0));
    assert_eq!(nutrition.resolved.normalization_mass(), 300.0);
    assert!(!nutrition.quantity_incomplete());
    // 50 g each of three ingredients spread over 300 g.
    let expected_fat = (1.5 + 81.0 + 29.0) * 0.5 / 3.0;
    assert!((nutrition.profile.per_100g.fat_g - expected_fat).abs() < 1e-9);
}

#[tokio::test]
async fn test_delete_of_absent_ingredient_is_a_warning() {
    let engine = TransformationEngine::new(load_index(), EngineConfig::default());
    let body = serde_json::json!({
        "recipe": carbonara(),
        "ingredients_to_remove": ["Mushrooms"],
        "constraints": {"transformation": 1}
    });
    let response = engine.transform_json(&body.to_string()).await;

    assert!(response.success);
    assert_eq!(response.recipe.ingredients, carbonara().ingredients);
    assert_eq!(response.recipe.quantity_ingredients, carbonara().quantity_ingredients);
    assert!(response.warnings.iter().any(|w| w.contains("not found")));
    assert_eq!(response.nutrition_before, response.nutrition_after);
}

#[tokio::test]
async fn test_step_adaptation_timeout_keeps_original_steps() {
    let adapter = Arc::new(SlowAdapter { calls: AtomicUsize::new(0) });
    let engine = TransformationEngine::new(load_index(), fast_timeout()).with_step_adapter(adapter.clone());
    let response = engine.transform(substitution(&["Heavy cream"], None, true)).await;

    assert!(response.success);
    assert!(response.partial_adaptation);
    assert_eq!(response.recipe.steps, carbonara().steps);
    assert_eq!(adapter.calls.load(Ordering::SeqCst), 2);
    assert!(response.warnings.iter().any(|w| w.contains("timed out")));
}

#[tokio::test]
async fn test_failing_adapter_is_retried_once() {
    let adapter = Arc::new(FailingAdapter { calls: AtomicUsize::new(0) });
    let config = EngineConfig {
        step_adaptation_retries: 3,
        ..fast_timeout()
    };
    let engine = TransformationEngine::new(load_index(), config).with_step_adapter(adapter.clone());
    let response = engine.transform(substitution(&["Heavy cream"], None, true)).await;

    assert_eq!(adapter.calls.load(Ordering::SeqCst), 2);
    assert!(response.partial_adaptation);
    assert!(response.success);
}

#[tokio::test]
async fn test_adapted_steps_and_notes_are_returned() {
    let adapter = Arc::new(EchoAdapter { calls: AtomicUsize::new(0) });
    let engine = TransformationEngine::new(load_index(), EngineConfig::default()).with_step_adapter(adapter.clone());
    let response = engine.transform(substitution(&["Heavy cream"], None, true)).await;

    assert!(!response.partial_adaptation);
    assert_eq!(response.recipe.steps[2], "Stir in the Coconut cream and egg yolk.");
    assert!(response.message.unwrap().contains("texture will be lighter"));
    assert_eq!(adapter.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_empty_substitution_is_a_no_op() {
    let adapter = Arc::new(EchoAdapter { calls: AtomicUsize::new(0) });
    let engine = TransformationEngine::new(load_index(), EngineConfig::default()).with_step_adapter(adapter.clone());
    let response = engine.transform(substitution(&[], None, true)).await;

    assert!(response.success);
    assert!(response.substitutions.is_empty());
    assert_eq!(response.nutrition_before, response.nutrition_after);
    assert_eq!(response.delta.score_health, 0.0);
    assert_eq!(response.recipe.steps, carbonara().steps);
    assert_eq!(adapter.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_explicit_substitute_is_used_directly() {
    let engine = TransformationEngine::new(load_index(), EngineConfig::default());
    let response = engine
        .transform(substitution(&["heavy cream", "Bacon"], Some(&["Oat cream", "Parmesan"]), true))
        .await;
    let names: Vec<&str> = response.substitutions.iter().map(|s| s.substitute_ingredient.as_str()).collect();
    assert_eq!(names, vec!["Oat cream", "Parmesan"]);
    assert_eq!(response.recipe.ingredients[1], "Oat cream");
    assert_eq!(response.recipe.ingredients[2], "Parmesan");
}

#[tokio::test]
async fn test_concurrent_requests_share_one_index() {
    let engine = Arc::new(TransformationEngine::new(load_index(), EngineConfig::default()));
    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine.transform(substitution(&["Heavy cream"], None, true)).await
        }));
    }
    let mut responses = Vec::new();
    for handle in handles {
        responses.push(handle.await.unwrap());
    }
    assert!(responses.windows(2).all(|w| w[0] == w[1]));
}

#[tokio::test]
async fn test_snapshot_reload_gives_identical_substitutions() {
    let index = load_index();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.json");
    index.save_snapshot(&path).unwrap();
    let reloaded = Arc::new(IngredientIndex::load(&path).unwrap());

    let from_csv = TransformationEngine::new(index, EngineConfig::default())
        .transform(substitution(&["Heavy cream"], None, true))
        .await;
    let from_snapshot = TransformationEngine::new(reloaded, EngineConfig::default())
        .transform(substitution(&["Heavy cream"], None, true))
        .await;
    assert_eq!(from_csv.substitutions, from_snapshot.substitutions);
}
