use anyhow::{Context, Result, bail};
use extract::{ExtractionMode, ExtractorConfig, LanguageModel, OllamaClient, OpenAiClient};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Runtime configuration, read from the process environment (and an optional `.env`)
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub neo4j: Neo4jConfig,
    pub llm: LlmConfig,
    pub extraction: ExtractionConfig,
    pub retry: RetryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone)]
pub struct Neo4jConfig {
    pub uri: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    OpenAi,
    Ollama,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    pub ollama_url: String,
    pub ollama_model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    pub mode: ExtractionMode,
    pub max_text_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub filter: String,
    pub format: LogFormat,
}

impl Default for Neo4jConfig {
    fn default() -> Self {
        Self {
            uri: None,
            username: None,
            password: None,
            database: "neo4j".to_string(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Ollama,
            openai_api_key: None,
            openai_model: "gpt-4o".to_string(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
            ollama_model: "llama3".to_string(),
            temperature: 0.1,
            timeout_secs: 120,
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        let defaults = ExtractorConfig::default();
        Self {
            mode: defaults.mode,
            max_text_chars: defaults.max_text_chars,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 5000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

impl FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(LlmProvider::OpenAi),
            "ollama" => Ok(LlmProvider::Ollama),
            other => Err(format!("unknown LLM provider '{}' (expected 'openai' or 'ollama')", other)),
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}' (expected 'text' or 'json')", other)),
        }
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid value for {}: {}", key, e)),
        None => Ok(default),
    }
}

impl AppConfig {
    /// Load `.env` if present, then read the process environment
    pub fn from_env(instance: Option<u32>) -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(instance, |key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup.
    ///
    /// With an instance number the Neo4j variables carry a suffix, e.g. `NEO4J_URI_1`.
    pub fn from_lookup<F>(instance: Option<u32>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let neo4j_key = |base: &str| match instance {
            Some(n) => format!("{}_{}", base, n),
            None => base.to_string(),
        };

        let defaults = AppConfig::default();

        let neo4j = Neo4jConfig {
            uri: non_empty(&neo4j_key("NEO4J_URI")),
            username: non_empty(&neo4j_key("NEO4J_USERNAME")),
            password: non_empty(&neo4j_key("NEO4J_PASSWORD")),
            database: non_empty(&neo4j_key("NEO4J_DATABASE")).unwrap_or(defaults.neo4j.database),
        };

        let openai_api_key = non_empty("OPENAI_API_KEY");
        let default_provider = if openai_api_key.is_some() {
            LlmProvider::OpenAi
        } else {
            LlmProvider::Ollama
        };
        let llm = LlmConfig {
            provider: parse_var(&lookup, "LLM_PROVIDER", default_provider)?,
            openai_model: non_empty("OPENAI_MODEL").unwrap_or(defaults.llm.openai_model),
            openai_base_url: non_empty("OPENAI_BASE_URL").unwrap_or(defaults.llm.openai_base_url),
            ollama_url: non_empty("OLLAMA_URL").unwrap_or(defaults.llm.ollama_url),
            ollama_model: non_empty("OLLAMA_MODEL").unwrap_or(defaults.llm.ollama_model),
            temperature: parse_var(&lookup, "LLM_TEMPERATURE", defaults.llm.temperature)?,
            timeout_secs: parse_var(&lookup, "LLM_TIMEOUT_SECS", defaults.llm.timeout_secs)?,
            openai_api_key,
        };
        if llm.provider == LlmProvider::OpenAi && llm.openai_api_key.is_none() {
            bail!("LLM_PROVIDER is openai but OPENAI_API_KEY is not set");
        }

        let extraction = ExtractionConfig {
            mode: parse_var(&lookup, "EXTRACTION_MODE", defaults.extraction.mode)?,
            max_text_chars: parse_var(&lookup, "MAX_TEXT_CHARS", defaults.extraction.max_text_chars)?,
        };
        if extraction.max_text_chars == 0 {
            bail!("MAX_TEXT_CHARS must be greater than zero");
        }

        let retry = RetryConfig {
            max_attempts: parse_var(&lookup, "QUERY_MAX_ATTEMPTS", defaults.retry.max_attempts)?,
            initial_backoff_ms: parse_var(&lookup, "QUERY_BACKOFF_MS", defaults.retry.initial_backoff_ms)?,
            max_backoff_ms: defaults.retry.max_backoff_ms,
        };
        if retry.max_attempts == 0 {
            bail!("QUERY_MAX_ATTEMPTS must be at least 1");
        }

        let logging = LoggingConfig {
            filter: non_empty("RUST_LOG").unwrap_or(defaults.logging.filter),
            format: parse_var(&lookup, "LOG_FORMAT", defaults.logging.format)?,
        };

        Ok(Self {
            neo4j,
            llm,
            extraction,
            retry,
            logging,
        })
    }

    /// URI, user and password; all three are needed to reach a live database
    pub fn neo4j_credentials(&self) -> Result<(&str, &str, &str)> {
        let uri = self.neo4j.uri.as_deref().context("NEO4J_URI is not set")?;
        let user = self.neo4j.username.as_deref().context("NEO4J_USERNAME is not set")?;
        let password = self.neo4j.password.as_deref().context("NEO4J_PASSWORD is not set")?;
        Ok((uri, user, password))
    }

    pub fn extractor_config(&self) -> ExtractorConfig {
        ExtractorConfig {
            mode: self.extraction.mode,
            max_text_chars: self.extraction.max_text_chars,
        }
    }

    pub fn retry_policy(&self) -> query::RetryPolicy {
        query::RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_millis(self.retry.initial_backoff_ms),
            Duration::from_millis(self.retry.max_backoff_ms),
        )
    }

    /// Construct the configured language model client
    pub fn build_model(&self) -> Result<Box<dyn LanguageModel>> {
        let timeout = Duration::from_secs(self.llm.timeout_secs);
        let model: Box<dyn LanguageModel> = match self.llm.provider {
            LlmProvider::OpenAi => Box::new(OpenAiClient::new(
                self.llm.openai_base_url.clone(),
                self.llm.openai_api_key.clone().unwrap_or_default(),
                self.llm.openai_model.clone(),
                self.llm.temperature,
                timeout,
            )?),
            LlmProvider::Ollama => Box::new(OllamaClient::new(
                self.llm.ollama_url.clone(),
                self.llm.ollama_model.clone(),
                self.llm.temperature,
                timeout,
            )?),
        };
        Ok(model)
    }
}
