pub mod engine;
pub mod models;
pub mod step_adapter;

pub use engine::TransformationEngine;
pub use models::{Recipe, Substitution, TransformConstraints, TransformRequest, TransformResponse, TransformState, TransformationType};
pub use step_adapter::{AdaptedSteps, IngredientChange, LlmStepAdapter, StepAdaptationRequest, StepAdapter};
