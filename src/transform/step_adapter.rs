use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use tracing::debug;

use crate::api_connection::endpoints::{ChatCompletionRequest, ChatMessage, Provider};
use crate::errors::StepAdaptationError;

/// One applied change to the ingredient list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IngredientChange {
    Substituted { original: String, substitute: String },
    Added { ingredient: String },
    Removed { ingredient: String },
}

impl fmt::Display for IngredientChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngredientChange::Substituted { original, substitute } => write!(f, "Replace '{}' with '{}'", original, substitute),
            IngredientChange::Added { ingredient } => write!(f, "Add '{}'", ingredient),
            IngredientChange::Removed { ingredient } => write!(f, "Remove '{}'", ingredient),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepAdaptationRequest {
    pub recipe_name: String,
    /// Ingredient list after the transformation.
    pub ingredients: Vec<String>,
    /// Steps as they were before the transformation.
    pub steps: Vec<String>,
    pub changes: Vec<IngredientChange>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdaptedSteps {
    pub steps: Vec<String>,
    pub notes: Vec<String>,
}

/// Rewrites cooking steps after the ingredient list changed.
#[async_trait]
pub trait StepAdapter: Send + Sync {
    async fn adapt(&self, request: &StepAdaptationRequest) -> Result<AdaptedSteps, StepAdaptationError>;
}

/// Step adapter backed by an OpenAI-compatible chat completion.
pub struct LlmStepAdapter {
    provider: Provider,
    model: String,
}

impl LlmStepAdapter {
    pub fn new(provider: Provider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    fn build_prompt(request: &StepAdaptationRequest) -> String {
        let mut prompt = format!(
            "ORIGINAL RECIPE:\nName: {}\nIngredients: {}\nSteps:\n",
            request.recipe_name,
            request.ingredients.join(", ")
        );
        for (i, step) in request.steps.iter().enumerate() {
            prompt.push_str(&format!("{}. {}\n", i + 1, step));
        }
        prompt.push_str("\nCHANGES TO APPLY:\n");
        for change in &request.changes {
            prompt.push_str(&format!("- {}\n", change));
        }
        prompt
    }
}

const SYSTEM_PROMPT: &str = "/no_thinking
You are an expert chef specializing in recipe adaptation and ingredient substitution.
Adapt the recipe steps to the listed ingredient changes while keeping the dish's quality.
- Modify only the steps affected by the changes and keep the original numbering.
- Adjust cooking times or temperatures if the new ingredient needs it.
- Do not add new steps and do not change unaffected steps.
Return only the adapted steps as a numbered list, one step per line.
You may add lines starting with \"Note:\" for texture or flavor changes the cook should expect.
Do not include any other text or markdown formatting.";

#[async_trait]
impl StepAdapter for LlmStepAdapter {
    async fn adapt(&self, request: &StepAdaptationRequest) -> Result<AdaptedSteps, StepAdaptationError> {
        let chat_request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(Self::build_prompt(request)),
            ],
            temperature: Some(0.2),
            max_tokens: Some(2048),
        };

        let response = self.provider.call_chat_completion(chat_request).await?;
        let content = response
            .first_content()
            .ok_or(crate::errors::ApiConnectionError::NoChoices)?;
        debug!(chars = content.len(), "received adapted steps");
        parse_adapted_steps(content)
    }
}

fn strip_markdown_fences(text: &str) -> &str {
    let trimmed = text.trim();
    if trimmed.starts_with("```") && trimmed.ends_with("```") && trimmed.len() >= 6 {
        let inner = &trimmed[3..trimmed.len() - 3];
        // Drop an info string such as ```text
        return match inner.find('\n') {
            Some(pos) if !inner[..pos].trim().contains(' ') => inner[pos + 1..].trim(),
            _ => inner.trim(),
        };
    }
    trimmed
}

fn strip_think_block(text: &str) -> &str {
    match (text.find("<think>"), text.find("</think>")) {
        (Some(start), Some(end)) if start < end => text[end + "</think>".len()..].trim(),
        _ => text,
    }
}

/// Text after a leading step number such as `3.`, `3)` or `3 -`.
fn numbered_step(line: &str) -> Option<&str> {
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let rest = line[digits..].trim_start_matches(['.', ')', ':', '-']).trim();
    (!rest.is_empty()).then_some(rest)
}

/// Splits a completion into numbered steps and "note" lines. Any other line
/// is ignored. No steps at all is an error.
pub fn parse_adapted_steps(text: &str) -> Result<AdaptedSteps, StepAdaptationError> {
    let body = strip_markdown_fences(strip_think_block(text.trim()));
    let mut adapted = AdaptedSteps::default();

    for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let line = line.trim_start_matches(['*', '#']).trim();
        if let Some(step) = numbered_step(line) {
            adapted.steps.push(step.to_string());
        } else if line.to_lowercase().starts_with("note") {
            let note = line[4..].trim_start_matches(['s', 'S']).trim_start_matches([':', '-', '*']).trim();
            if !note.is_empty() {
                adapted.notes.push(note.to_string());
            }
        }
    }

    if adapted.steps.is_empty() {
        return Err(StepAdaptationError::EmptyResponse);
    }
    Ok(adapted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_numbered_steps_and_notes() {
        let text = "1. Whisk the coconut cream.\n2) Fold into the pasta.\n\nNote: the sauce will be slightly sweeter.\nEnjoy!";
        let adapted = parse_adapted_steps(text).unwrap();
        assert_eq!(adapted.steps, vec!["Whisk the coconut cream.", "Fold into the pasta."]);
        assert_eq!(adapted.notes, vec!["the sauce will be slightly sweeter."]);
    }

    #[test]
    fn test_parse_strips_fences_and_think_block() {
        let text = "<think>reasoning</think>\n```text\n1. Boil water.\n**Note**: salt generously.\n```";
        let adapted = parse_adapted_steps(text).unwrap();
        assert_eq!(adapted.steps, vec!["Boil water."]);
        assert_eq!(adapted.notes, vec!["salt generously."]);
    }

    #[test]
    fn test_parse_without_steps_is_error() {
        assert!(matches!(
            parse_adapted_steps("I cannot help with that."),
            Err(StepAdaptationError::EmptyResponse)
        ));
        assert!(parse_adapted_steps("").is_err());
    }

    #[test]
    fn test_prompt_lists_steps_and_changes() {
        let request = StepAdaptationRequest {
            recipe_name: "Carbonara".into(),
            ingredients: vec!["pasta".into(), "oat cream".into()],
            steps: vec!["Boil pasta.".into(), "Add cream.".into()],
            changes: vec![IngredientChange::Substituted {
                original: "heavy cream".into(),
                substitute: "oat cream".into(),
            }],
        };
        let prompt = LlmStepAdapter::build_prompt(&request);
        assert!(prompt.contains("Name: Carbonara"));
        assert!(prompt.contains("2. Add cream."));
        assert!(prompt.contains("- Replace 'heavy cream' with 'oat cream'"));
    }

    #[tokio::test]
    #[ignore] // Requires OPENROUTER_API_KEY and network access
    async fn test_llm_step_adapter_live() {
        let adapter = LlmStepAdapter::new(Provider::openrouter("OPENROUTER_API_KEY"), "qwen/qwen3-32b");
        let request = StepAdaptationRequest {
            recipe_name: "Cream sauce".into(),
            ingredients: vec!["coconut cream".into(), "garlic".into()],
            steps: vec!["Melt butter.".into(), "Add heavy cream and garlic.".into()],
            changes: vec![IngredientChange::Substituted {
                original: "heavy cream".into(),
                substitute: "coconut cream".into(),
            }],
        };
        let adapted = adapter.adapt(&request).await.unwrap();
        assert!(!adapted.steps.is_empty());
    }
}
