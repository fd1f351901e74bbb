use recipe_transform::api_connection::endpoints::{
    ChatCompletionRequest, ChatMessage, Provider, DEFAULT_API_KEY_ENV, OPENROUTER_MODELS,
};
use recipe_transform::errors::{ApiConnectionError, StepAdaptationError};
use recipe_transform::transform::{IngredientChange, LlmStepAdapter, StepAdaptationRequest, StepAdapter};
use dotenv::dotenv;
use std::env;

// Helper to select a model that is known to be Cerebras-powered from OPENROUTER_MODELS
fn get_cerebras_test_model() -> String {
    OPENROUTER_MODELS
        .iter()
        .find(|m| m.model_source == "cerebras")
        .map(|m| m.model_name.to_string())
        .expect("No Cerebras model found in OPENROUTER_MODELS for testing")
}

fn setup_test_environment() {
    dotenv().ok();
}

fn has_api_key() -> bool {
    setup_test_environment();
    if env::var(DEFAULT_API_KEY_ENV).is_err() {
        println!("Skipping: {} not set.", DEFAULT_API_KEY_ENV);
        return false;
    }
    true
}

fn cream_request() -> StepAdaptationRequest {
    StepAdaptationRequest {
        recipe_name: "Creamy tomato soup".into(),
        ingredients: vec!["Tomato".into(), "Onion".into(), "Coconut cream".into()],
        steps: vec![
            "Soften the onion in a pot.".into(),
            "Add the tomato and simmer for 20 minutes.".into(),
            "Blend, then stir in the heavy cream.".into(),
        ],
        changes: vec![IngredientChange::Substituted {
            original: "Heavy cream".into(),
            substitute: "Coconut cream".into(),
        }],
    }
}

#[tokio::test]
async fn test_missing_api_key_error() {
    setup_test_environment();
    let provider = Provider::openrouter("THIS_KEY_SHOULD_NOT_EXIST_IN_ENV_ABXYZ");
    let request = ChatCompletionRequest {
        model: get_cerebras_test_model(),
        messages: vec![ChatMessage::user("Hello")],
        temperature: None,
        max_tokens: None,
    };
    let result = provider.call_chat_completion(request).await;
    assert!(matches!(result, Err(ApiConnectionError::MissingApiKey(_))));
    if let Err(ApiConnectionError::MissingApiKey(key_name)) = result {
        assert_eq!(key_name, "THIS_KEY_SHOULD_NOT_EXIST_IN_ENV_ABXYZ");
    }
}

#[tokio::test]
async fn test_step_adapter_surfaces_missing_key() {
    let provider = Provider::openrouter("ANOTHER_KEY_THAT_IS_NOT_SET_QWERTY");
    let adapter = LlmStepAdapter::new(provider, get_cerebras_test_model());
    let result = adapter.adapt(&cream_request()).await;
    assert!(matches!(
        result,
        Err(StepAdaptationError::Api(ApiConnectionError::MissingApiKey(_)))
    ));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_a_network_error() {
    const KEY_NAME: &str = "RECIPE_TRANSFORM_TEST_DUMMY_KEY";
    env::set_var(KEY_NAME, "dummy");
    let provider = Provider::openrouter(KEY_NAME).with_url("http://127.0.0.1:9/v1/chat/completions");
    let request = ChatCompletionRequest {
        model: get_cerebras_test_model(),
        messages: vec![ChatMessage::user("Hello")],
        temperature: None,
        max_tokens: Some(8),
    };
    let result = provider.call_chat_completion(request).await;
    assert!(matches!(result, Err(ApiConnectionError::NetworkError(_))), "got {:?}", result);
    env::remove_var(KEY_NAME);
}

#[tokio::test]
#[ignore]
async fn test_successful_chat_call() {
    if !has_api_key() {
        return;
    }
    let provider = Provider::openrouter(DEFAULT_API_KEY_ENV);
    let request = ChatCompletionRequest {
        model: get_cerebras_test_model(),
        messages: vec![ChatMessage::user("What is the capital of France? Respond concisely.")],
        temperature: Some(0.7),
        max_tokens: Some(100),
    };

    let result = provider.call_chat_completion(request).await;
    assert!(result.is_ok(), "API call failed: {:?}", result.err());
    let response = result.unwrap();
    let content = response.first_content().unwrap_or_default();
    assert!(content.to_lowercase().contains("paris"));
}

#[tokio::test]
#[ignore]
async fn test_live_step_adaptation_mentions_substitute() {
    if !has_api_key() {
        return;
    }
    let adapter = LlmStepAdapter::new(Provider::openrouter(DEFAULT_API_KEY_ENV), get_cerebras_test_model());
    let adapted = adapter.adapt(&cream_request()).await.expect("step adaptation failed");
    assert!(!adapted.steps.is_empty());
    let joined = adapted.steps.join(" ").to_lowercase();
    assert!(joined.contains("coconut"));
    assert!(!joined.contains("heavy cream"));
}

#[tokio::test]
#[ignore]
async fn test_api_error_with_invalid_key() {
    setup_test_environment();
    const INVALID_KEY_ENV_NAME_FOR_THIS_TEST: &str = "ENV_VAR_WITH_BAD_KEY_VALUE";
    env::set_var(INVALID_KEY_ENV_NAME_FOR_THIS_TEST, "this_is_a_deliberately_bad_api_key_string_for_testing");

    let provider = Provider::openrouter(INVALID_KEY_ENV_NAME_FOR_THIS_TEST);
    let request = ChatCompletionRequest {
        model: get_cerebras_test_model(),
        messages: vec![ChatMessage::user("This call should fail due to invalid key.")],
        temperature: None,
        max_tokens: None,
    };

    let result = provider.call_chat_completion(request).await;
    assert!(matches!(result, Err(ApiConnectionError::ApiError { .. })), "Expected ApiError, got {:?}", result);
    if let Err(ApiConnectionError::ApiError { status, .. }) = result {
        assert_eq!(status, reqwest::StatusCode::UNAUTHORIZED);
    }
    env::remove_var(INVALID_KEY_ENV_NAME_FOR_THIS_TEST);
}
