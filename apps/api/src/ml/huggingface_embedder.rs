use super::EmbeddingProvider;
use crate::{
    config::Config,
    error::{ApiError, Result},
};
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

const DEFAULT_CONNECTION_TIMEOUT_SECONDS: u64 = 15;
const DEFAULT_RETRY_DELAY_MS: u64 = 500;
const MAX_TEXT_PREVIEW_LENGTH: usize = 100;

/// Sentence embeddings from the HuggingFace Inference API.
#[derive(Clone)]
pub struct HuggingFaceEmbedder {
    client: Client,
    api_key: String,
    model_url: String,
    model_name: String,
    dimension: usize,
    retry_attempts: u32,
}

impl HuggingFaceEmbedder {
    pub fn new(config: &Config, api_key: &str) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(ApiError::ModelError(
                "HuggingFace API key is empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECTION_TIMEOUT_SECONDS))
            .pool_max_idle_per_host(10)
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .build()
            .map_err(|e| ApiError::InternalError(format!("Failed to create HTTP client: {}", e)))?;

        let model_url = format!(
            "{}/models/{}",
            config.huggingface_base_url.trim_end_matches('/'),
            config.huggingface_model
        );

        info!(
            "Initializing HuggingFace embedder with model: {}, timeout: {}s",
            config.huggingface_model, config.request_timeout_secs
        );

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            model_url,
            model_name: config.huggingface_model.clone(),
            dimension: config.embedding_dimension,
            retry_attempts: config.embedding_retries.max(1),
        })
    }

    async fn make_api_request(&self, input: &str) -> Result<reqwest::Response> {
        #[derive(Serialize)]
        struct Request<'a> {
            inputs: &'a str,
            options: Options,
        }

        #[derive(Serialize)]
        struct Options {
            wait_for_model: bool,
            use_cache: bool,
        }

        let request = Request {
            inputs: input,
            options: Options {
                wait_for_model: true,
                use_cache: true,
            },
        };

        self.client
            .post(&self.model_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| ApiError::ModelError(format!("Failed to send request to model API: {}", e)))
    }

    async fn process_api_response(&self, response: reqwest::Response) -> Result<Vec<f32>> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();

            return Err(match status.as_u16() {
                404 => ApiError::ModelError(format!(
                    "Model not found: {}. Please check the model name in your configuration.",
                    self.model_name
                )),
                401 | 403 => ApiError::ModelError(
                    "Authentication failed. Please check your HuggingFace API key.".to_string(),
                ),
                429 => ApiError::ModelError("HuggingFace rate limit exceeded".to_string()),
                _ => ApiError::ModelError(format!(
                    "HuggingFace API returned non-success status: {} - {}",
                    status, text
                )),
            });
        }

        let response_json: Value = response
            .json()
            .await
            .map_err(|e| ApiError::ModelError(format!("Failed to parse response as JSON: {}", e)))?;

        let embedding = extract_embedding(&response_json).ok_or_else(|| {
            ApiError::ModelError("Failed to extract embedding from response".to_string())
        })?;

        if embedding.len() != self.dimension {
            return Err(ApiError::ModelError(format!(
                "Model returned {} dimensions, expected {}",
                embedding.len(),
                self.dimension
            )));
        }

        debug!("Got embedding of size {} from HuggingFace API", embedding.len());
        Ok(normalize_vector(&embedding))
    }
}

#[async_trait]
impl EmbeddingProvider for HuggingFaceEmbedder {
    async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let input = text.trim();
        debug!(
            "Encoding text (length: {}): {}",
            input.len(),
            input.chars().take(MAX_TEXT_PREVIEW_LENGTH).collect::<String>()
        );

        let mut last_error = None;
        for attempt in 1..=self.retry_attempts {
            let result = match self.make_api_request(input).await {
                Ok(response) => self.process_api_response(response).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(embedding) => return Ok(embedding),
                Err(e) => {
                    if attempt < self.retry_attempts {
                        let delay_ms = DEFAULT_RETRY_DELAY_MS * 2u64.pow(attempt - 1);
                        warn!(
                            "Embedding request failed (attempt {}/{}): {}. Retrying in {}ms",
                            attempt, self.retry_attempts, e, delay_ms
                        );
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ApiError::ModelError("All retry attempts failed when encoding text".to_string())
        }))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model_name
    }
}

/// Accepts `[f, ...]`, `[[f, ...], ...]` (mean-pooled over rows),
/// `{"embedding": [...]}` and `{"embeddings": [[...]]}`.
fn extract_embedding(value: &Value) -> Option<Vec<f32>> {
    let embedding = match value {
        Value::Array(items) if items.first().is_some_and(Value::is_array) => {
            let rows: Vec<Vec<f32>> = items.iter().filter_map(as_float_vec).collect();
            mean_pool(&rows)
        }
        Value::Array(_) => as_float_vec(value),
        Value::Object(map) => map
            .get("embedding")
            .and_then(as_float_vec)
            .or_else(|| map.get("embeddings").and_then(extract_embedding)),
        _ => None,
    };
    embedding.filter(|embedding| !embedding.is_empty())
}

fn as_float_vec(value: &Value) -> Option<Vec<f32>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32))
        .collect()
}

fn mean_pool(rows: &[Vec<f32>]) -> Option<Vec<f32>> {
    let width = rows.first()?.len();
    if rows.iter().any(|row| row.len() != width) {
        return None;
    }

    let mut pooled = vec![0.0f32; width];
    for row in rows {
        for (acc, x) in pooled.iter_mut().zip(row) {
            *acc += x;
        }
    }
    let count = rows.len() as f32;
    pooled.iter_mut().for_each(|x| *x /= count);
    Some(pooled)
}

/// Normalize a vector to unit length
fn normalize_vector(vector: &[f32]) -> Vec<f32> {
    let magnitude = vector.iter().map(|&x| x * x).sum::<f32>().sqrt();

    if magnitude > 0.0 {
        vector.iter().map(|&x| x / magnitude).collect()
    } else {
        vec![0.0; vector.len()]
    }
}
