use dotenv::dotenv;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::api_connection::endpoints::OPENROUTER_MODELS;
use crate::nutrition::quantity::DEFAULT_IMPUTATION_FACTOR;

const MAX_STEP_RETRIES: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Share of the remaining mass given to each unknown quantity.
    pub imputation_factor: f64,
    /// Quantity used for added ingredients and for padding short lists.
    pub placeholder_quantity: String,
    #[serde(with = "duration_secs")]
    pub step_adaptation_timeout: Duration,
    /// Retries after the first attempt, at most 1.
    pub step_adaptation_retries: u32,
    pub candidate_pool: usize,
    pub step_adaptation_model: String,
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            imputation_factor: DEFAULT_IMPUTATION_FACTOR,
            placeholder_quantity: "1".to_string(),
            step_adaptation_timeout: Duration::from_secs(30),
            step_adaptation_retries: MAX_STEP_RETRIES,
            candidate_pool: 5,
            step_adaptation_model: OPENROUTER_MODELS[0].model_name.to_string(),
        }
    }
}

fn env_override<T: FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparseable configuration value");
            None
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `RECIPE_*` environment variables (and `.env`).
    pub fn from_env() -> Self {
        dotenv().ok();
        let mut config = Self::default();
        if let Some(factor) = env_override::<f64>("RECIPE_IMPUTATION_FACTOR") {
            if factor.is_finite() && factor >= 0.0 {
                config.imputation_factor = factor;
            } else {
                warn!(factor, "imputation factor must be a non-negative number");
            }
        }
        if let Some(secs) = env_override::<u64>("RECIPE_STEP_TIMEOUT_SECS") {
            config.step_adaptation_timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = env_override::<u32>("RECIPE_STEP_RETRIES") {
            config.step_adaptation_retries = retries;
        }
        if let Some(pool) = env_override::<usize>("RECIPE_CANDIDATE_POOL") {
            config.candidate_pool = pool.max(1);
        }
        if let Ok(model) = env::var("RECIPE_STEP_MODEL") {
            if !model.trim().is_empty() {
                config.step_adaptation_model = model.trim().to_string();
            }
        }
        config.normalized()
    }

    /// Clamps values the engine does not support.
    pub fn normalized(mut self) -> Self {
        if self.step_adaptation_retries > MAX_STEP_RETRIES {
            warn!(
                requested = self.step_adaptation_retries,
                "step adaptation retries clamped to {}", MAX_STEP_RETRIES
            );
            self.step_adaptation_retries = MAX_STEP_RETRIES;
        }
        self.candidate_pool = self.candidate_pool.max(1);
        self
    }

    pub fn step_adaptation_attempts(&self) -> u32 {
        self.step_adaptation_retries.min(MAX_STEP_RETRIES) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.imputation_factor, 0.5);
        assert_eq!(config.placeholder_quantity, "1");
        assert_eq!(config.step_adaptation_timeout, Duration::from_secs(30));
        assert_eq!(config.step_adaptation_attempts(), 2);
        assert_eq!(config.step_adaptation_model, "qwen/qwen3-32b");
    }

    #[test]
    fn test_retries_are_clamped() {
        let config = EngineConfig {
            step_adaptation_retries: 5,
            candidate_pool: 0,
            ..Default::default()
        }
        .normalized();
        assert_eq!(config.step_adaptation_retries, 1);
        assert_eq!(config.candidate_pool, 1);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"imputation_factor": 0.25, "step_adaptation_timeout": 2.5}"#).unwrap();
        assert_eq!(config.imputation_factor, 0.25);
        assert_eq!(config.step_adaptation_timeout, Duration::from_millis(2500));
        assert_eq!(config.candidate_pool, 5);
    }

    #[test]
    fn test_env_overrides() {
        env::set_var("RECIPE_CANDIDATE_POOL", "8");
        env::set_var("RECIPE_STEP_RETRIES", "not-a-number");
        let config = EngineConfig::from_env();
        env::remove_var("RECIPE_CANDIDATE_POOL");
        env::remove_var("RECIPE_STEP_RETRIES");
        assert_eq!(config.candidate_pool, 8);
        assert_eq!(config.step_adaptation_retries, 1);
    }
}
