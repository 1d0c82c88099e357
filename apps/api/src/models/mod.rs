use serde::{Deserialize, Serialize};

pub use history::HistoryEntry;
pub use intent::{Budget, Intent};
pub use product::{Product, ProductRecord, Recommendation};

mod history;
mod intent;
mod product;

/// Request body for `POST /recommend`.
///
/// `query` is optional here so that a missing field produces the same
/// "No query provided" error as an empty one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecommendationRequest {
    #[serde(default)]
    pub query: Option<String>,
    /// Number of recommendations to return (defaults to the configured value)
    #[serde(default)]
    pub top_n: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub query: String,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryRequest {
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub catalog_size: usize,
}
