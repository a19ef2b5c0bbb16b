use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::llm::http::{DEFAULT_MODEL, DEFAULT_TIMEOUT};
use crate::llm::HttpProvider;
use crate::session::{ChatSession, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, SYSTEM_INSTRUCTION};
use crate::{Analyzer, DictionarySource, Error, KeywordDictionary, Thresholds};

pub const API_KEY_ENV: &str = "SCAM_GUARD_API_KEY";
pub const FALLBACK_API_KEY_ENV: &str = "GOOGLE_API_KEY";
pub const MODEL_ENV: &str = "SCAM_GUARD_MODEL";
pub const BASE_URL_ENV: &str = "SCAM_GUARD_BASE_URL";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub thresholds: Thresholds,
    pub dictionary: DictionarySource,
    pub model: ModelConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub name: String,
    pub base_url: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub system_instruction: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_MODEL.to_string(),
            base_url: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
        }
    }
}

pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: Config = toml::from_str(&raw)
        .with_context(|| format!("failed to parse config {}", path.display()))?;
    Ok(config)
}

impl Config {
    pub fn analyzer(&self) -> Result<Analyzer, Error> {
        let dictionary = KeywordDictionary::from_source(&self.dictionary)?;
        Ok(Analyzer::new(dictionary, self.thresholds))
    }

    pub fn session(&self) -> ChatSession {
        ChatSession::new(self.model.system_instruction.clone())
            .with_sampling(self.model.max_tokens, self.model.temperature)
    }

    /// Build the model provider. The API key only ever comes from the
    /// environment; model name and base URL env vars override the file.
    pub fn provider(&self) -> Result<HttpProvider, Error> {
        self.provider_with(|key| std::env::var(key).ok())
    }

    fn provider_with(&self, env: impl Fn(&str) -> Option<String>) -> Result<HttpProvider, Error> {
        let api_key = env(API_KEY_ENV)
            .or_else(|| env(FALLBACK_API_KEY_ENV))
            .filter(|k| !k.trim().is_empty())
            .ok_or(Error::MissingConfig("API key (set SCAM_GUARD_API_KEY)"))?;
        let model = env(MODEL_ENV).unwrap_or_else(|| self.model.name.clone());
        let base_url = env(BASE_URL_ENV).or_else(|| self.model.base_url.clone());

        let provider = HttpProvider::with_timeout(
            model,
            api_key,
            base_url,
            Duration::from_secs(self.model.timeout_secs),
        );
        tracing::info!(provider = ?provider.kind(), model = provider.model(), "model provider configured");
        Ok(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmProvider, ProviderKind};
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.thresholds, Thresholds::default());
        assert_eq!(config.dictionary, DictionarySource::default());
        assert_eq!(config.model.name, DEFAULT_MODEL);
    }

    #[test]
    fn partial_sections_override_fields() {
        let config: Config = toml::from_str(
            r#"
            [thresholds]
            emotion_peak = 2

            [dictionary]
            withdrawal_phrases = ["領錢"]

            [model]
            name = "claude-sonnet-4-5"
            temperature = 0.2
            "#,
        )
        .unwrap();
        assert_eq!(config.thresholds.emotion_peak, 2);
        assert_eq!(config.thresholds.money_heavy, 3);
        assert_eq!(config.dictionary.withdrawal_phrases, vec!["領錢".to_string()]);
        assert_eq!(config.model.name, "claude-sonnet-4-5");
        assert_eq!(config.model.max_tokens, DEFAULT_MAX_TOKENS);
        assert!(config.analyzer().is_ok());
    }

    #[test]
    fn missing_key_is_missing_config() {
        let err = Config::default().provider_with(env_of(&[])).unwrap_err();
        assert!(matches!(err, Error::MissingConfig(_)));
    }

    #[test]
    fn google_key_is_accepted_as_fallback() {
        let provider = Config::default()
            .provider_with(env_of(&[(FALLBACK_API_KEY_ENV, "g-key")]))
            .unwrap();
        assert_eq!(provider.kind(), ProviderKind::Google);
    }

    #[test]
    fn env_model_overrides_file() {
        let provider = Config::default()
            .provider_with(env_of(&[(API_KEY_ENV, "k"), (MODEL_ENV, "gpt-4o")]))
            .unwrap();
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.model(), "gpt-4o");
    }

    #[test]
    fn bad_dictionary_is_reported() {
        let config: Config = toml::from_str(
            r#"
            [dictionary]
            money = [""]
            "#,
        )
        .unwrap();
        assert!(matches!(config.analyzer(), Err(Error::InvalidDictionary(_))));
    }
}
