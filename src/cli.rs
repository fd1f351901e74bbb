use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Recipe nutrition scoring and constrained ingredient substitution", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Apply an ADD, DELETE or SUBSTITUTION request and print the result JSON
    Transform(TransformArgs),
    /// Print the nutrition profile and resolved quantities of a recipe
    Score(ScoreArgs),
    /// Convert an ingredient table into a reloadable JSON snapshot
    Snapshot(SnapshotArgs),
}

#[derive(Args, Debug)]
pub struct IndexArgs {
    /// Ingredient table (.csv) or index snapshot (.json)
    #[arg(short, long)]
    pub index: PathBuf,
    /// Fall back to model2vec name embeddings when lexical matching fails
    #[arg(long)]
    pub semantic_matching: bool,
}

#[derive(Args, Debug)]
pub struct TransformArgs {
    #[command(flatten)]
    pub index: IndexArgs,
    /// Transformation request JSON file
    #[arg(short, long)]
    pub request: PathBuf,
    /// Keep the original steps instead of calling the language model
    #[arg(long)]
    pub no_step_adaptation: bool,
}

#[derive(Args, Debug)]
pub struct ScoreArgs {
    #[command(flatten)]
    pub index: IndexArgs,
    /// Recipe JSON file
    #[arg(short, long)]
    pub recipe: PathBuf,
}

#[derive(Args, Debug)]
pub struct SnapshotArgs {
    /// Ingredient table (.csv)
    #[arg(short, long)]
    pub index: PathBuf,
    /// Output snapshot path (.json)
    #[arg(short, long)]
    pub out: PathBuf,
}

pub fn parse_args() -> Cli {
    Cli::parse()
}
