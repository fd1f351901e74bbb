use anyhow::{Context, Result};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use recipe_transform::api_connection::endpoints::{Provider, DEFAULT_API_KEY_ENV};
use recipe_transform::cli::{parse_args, Command, IndexArgs, ScoreArgs, SnapshotArgs, TransformArgs};
use recipe_transform::config::EngineConfig;
use recipe_transform::index::embedding_engine::EmbeddingEngine;
use recipe_transform::index::{IngredientIndex, IngredientLookup, SemanticMatcher};
use recipe_transform::transform::{LlmStepAdapter, Recipe, TransformationEngine};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_lookup(args: &IndexArgs) -> Result<Arc<dyn IngredientLookup>> {
    let index = IngredientIndex::load(&args.index)
        .with_context(|| format!("Failed to load ingredient index from {:?}", args.index))?;
    let index = Arc::new(index);
    if !args.semantic_matching {
        return Ok(index as Arc<dyn IngredientLookup>);
    }
    info!("Initializing name embeddings (this may take a moment)...");
    let embedder = EmbeddingEngine::new().context("Failed to load embedding model")?;
    let matcher = SemanticMatcher::new(index, Box::new(embedder)).context("Failed to embed ingredient names")?;
    Ok(Arc::new(matcher) as Arc<dyn IngredientLookup>)
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_str(&contents).with_context(|| format!("Failed to parse {:?}", path))
}

async fn run_transform(args: TransformArgs, config: EngineConfig) -> Result<()> {
    let lookup = load_lookup(&args.index)?;
    let mut engine = TransformationEngine::new(lookup, config);
    if !args.no_step_adaptation {
        let provider = Provider::openrouter(DEFAULT_API_KEY_ENV);
        let model = engine.config().step_adaptation_model.clone();
        engine = engine.with_step_adapter(Arc::new(LlmStepAdapter::new(provider, model)));
    }

    let body = fs::read_to_string(&args.request)
        .await
        .with_context(|| format!("Failed to read request file {:?}", args.request))?;
    let response = engine.transform_json(&body).await;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

async fn run_score(args: ScoreArgs, config: EngineConfig) -> Result<()> {
    let lookup = load_lookup(&args.index)?;
    let recipe: Recipe = read_json(&args.recipe).await?;
    let engine = TransformationEngine::new(lookup, config);
    let nutrition = engine.score(&recipe);
    let output = json!({
        "name": recipe.name,
        "nutrition": nutrition.profile,
        "resolved_quantities": nutrition.resolved,
        "unmatched": nutrition.unmatched,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run_snapshot(args: SnapshotArgs) -> Result<()> {
    let index = IngredientIndex::load(&args.index)
        .with_context(|| format!("Failed to load ingredient index from {:?}", args.index))?;
    index
        .save_snapshot(&args.out)
        .with_context(|| format!("Failed to write snapshot to {:?}", args.out))?;
    info!(records = index.len(), out = ?args.out, "snapshot written");
    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = parse_args();
    let config = EngineConfig::from_env();

    let result = match cli.command {
        Command::Transform(args) => run_transform(args, config).await,
        Command::Score(args) => run_score(args, config).await,
        Command::Snapshot(args) => run_snapshot(args),
    };

    if let Err(err) = result {
        error!(error = %format!("{:#}", err), "command failed");
        std::process::exit(1);
    }
}
