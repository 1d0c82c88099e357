use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;

const ENV_PREFIX: &str = "APP";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub catalog_path: String,
    pub history_path: String,
    pub default_top_n: usize,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    pub huggingface_api_key: Option<String>,
    pub huggingface_model: String,
    pub huggingface_base_url: String,
    pub embedding_dimension: usize,
    pub embedding_retries: u32,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            catalog_path: "products.json".to_string(),
            history_path: "recommendations.json".to_string(),
            default_top_n: 5,
            openai_api_key: None,
            openai_model: "gpt-4-turbo".to_string(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            huggingface_api_key: None,
            huggingface_model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            huggingface_base_url: "https://api-inference.huggingface.co".to_string(),
            embedding_dimension: 384,
            embedding_retries: 1,
            request_timeout_secs: 30,
        }
    }
}

impl Config {
    /// Load configuration from defaults overlaid with `APP_*` environment variables.
    pub fn load() -> Result<Self> {
        let source = config::Environment::with_prefix(ENV_PREFIX).try_parsing(true);
        let mut config = Self::build(source)?;

        // The OpenAI SDK convention is a bare OPENAI_API_KEY
        if config.openai_api_key.is_none() {
            config.openai_api_key = env::var("OPENAI_API_KEY").ok();
        }
        config.openai_api_key = non_empty(config.openai_api_key);
        config.huggingface_api_key = non_empty(config.huggingface_api_key);

        config.validate()?;
        Ok(config)
    }

    fn build<S>(source: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let defaults = Config::default();
        config::Config::builder()
            .set_default("host", defaults.host)?
            .set_default("port", defaults.port as i64)?
            .set_default("catalog_path", defaults.catalog_path)?
            .set_default("history_path", defaults.history_path)?
            .set_default("default_top_n", defaults.default_top_n as i64)?
            .set_default("openai_model", defaults.openai_model)?
            .set_default("openai_base_url", defaults.openai_base_url)?
            .set_default("huggingface_model", defaults.huggingface_model)?
            .set_default("huggingface_base_url", defaults.huggingface_base_url)?
            .set_default("embedding_dimension", defaults.embedding_dimension as i64)?
            .set_default("embedding_retries", defaults.embedding_retries as i64)?
            .set_default("request_timeout_secs", defaults.request_timeout_secs as i64)?
            .add_source(source)
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")
    }

    fn validate(&self) -> Result<()> {
        if self.default_top_n == 0 {
            anyhow::bail!("APP_DEFAULT_TOP_N must be at least 1");
        }
        if self.embedding_dimension == 0 {
            anyhow::bail!("APP_EMBEDDING_DIMENSION must be at least 1");
        }
        if self.embedding_retries == 0 {
            anyhow::bail!("APP_EMBEDDING_RETRIES must be at least 1");
        }
        Ok(())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
