//! Text embedding providers and vector similarity.

pub mod hashing_embedder;
pub mod huggingface_embedder;
pub mod similarity;

use crate::error::Result;
use async_trait::async_trait;

pub use hashing_embedder::HashingEmbedder;
pub use huggingface_embedder::HuggingFaceEmbedder;
pub use similarity::cosine_similarity;

/// Maps text to a fixed-length vector. Identical input yields identical output.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn encode(&self, text: &str) -> Result<Vec<f32>>;

    /// Length of every vector returned by `encode`.
    fn dimension(&self) -> usize;

    fn name(&self) -> &str;
}
