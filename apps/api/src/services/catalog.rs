use crate::{
    ml::EmbeddingProvider,
    models::{Product, ProductRecord},
};
use anyhow::{anyhow, Context, Result};
use futures::{stream, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::path::Path;
use tracing::{info, warn};

/// Descriptions embedded concurrently during catalog load.
const EMBEDDING_CONCURRENCY: usize = 4;

/// In-memory product table. Products and their embeddings never change after load.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    products: Vec<Product>,
    dimension: usize,
}

impl Catalog {
    /// Build a catalog from products whose embeddings are already computed.
    pub fn from_products(products: Vec<Product>) -> Result<Self> {
        let dimension = products.first().map_or(0, |p| p.embedding.len());
        if let Some(bad) = products.iter().find(|p| p.embedding.len() != dimension) {
            return Err(anyhow!(
                "Product '{}' has a {}-dimensional embedding, expected {}",
                bad.title,
                bad.embedding.len(),
                dimension
            ));
        }

        Ok(Self {
            products,
            dimension,
        })
    }

    /// Read the catalog file and embed every product description.
    pub async fn load(path: impl AsRef<Path>, embedder: &dyn EmbeddingProvider) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading product catalog from {}", path.display());

        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read catalog file {}", path.display()))?;
        let records = parse_records(&contents)?;

        Self::from_records(records, embedder).await
    }

    /// Embed the descriptions of validated records, preserving their order.
    pub async fn from_records(
        records: Vec<ProductRecord>,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<Self> {
        let dimension = embedder.dimension();
        let progress = progress_bar(records.len() as u64);

        let embeddings: Vec<Result<Vec<f32>>> = stream::iter(records.iter())
            .map(|record| embed_description(embedder, record.description.as_deref(), dimension))
            .buffered(EMBEDDING_CONCURRENCY)
            .inspect(|_| progress.inc(1))
            .collect()
            .await;
        progress.finish_and_clear();

        let products = records
            .into_iter()
            .zip(embeddings)
            .map(|(record, embedding)| {
                let title = record.title.clone();
                embedding
                    .map(|embedding| Product::from_record(record, embedding))
                    .with_context(|| format!("Failed to embed description of '{}'", title))
            })
            .collect::<Result<Vec<_>>>()?;

        info!(
            "Catalog ready: {} products, {}-dimensional embeddings from {}",
            products.len(),
            dimension,
            embedder.name()
        );

        Ok(Self {
            products,
            dimension,
        })
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Parse a JSON array of product records, skipping rows that are malformed
/// or out of range.
pub fn parse_records(contents: &str) -> Result<Vec<ProductRecord>> {
    let rows: Vec<Value> =
        serde_json::from_str(contents).context("Catalog must be a JSON array of records")?;
    let total = rows.len();

    let records: Vec<ProductRecord> = rows
        .into_iter()
        .enumerate()
        .filter_map(|(idx, row)| {
            let record = match serde_json::from_value::<ProductRecord>(row) {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping catalog row {}: {}", idx, e);
                    return None;
                }
            };
            match record.validate() {
                Ok(()) => Some(record),
                Err(reason) => {
                    warn!("Skipping catalog row {} ('{}'): {}", idx, record.title, reason);
                    None
                }
            }
        })
        .collect();

    if records.len() < total {
        warn!("Loaded {} of {} catalog rows", records.len(), total);
    }

    Ok(records)
}

/// Products without a usable description get a zero vector, which scores a
/// similarity of 0.0 against any query.
async fn embed_description(
    embedder: &dyn EmbeddingProvider,
    description: Option<&str>,
    dimension: usize,
) -> Result<Vec<f32>> {
    let Some(text) = description.filter(|d| !d.trim().is_empty()) else {
        return Ok(vec![0.0; dimension]);
    };

    let embedding = embedder.encode(text).await?;
    if embedding.len() != dimension {
        return Err(anyhow!(
            "{} returned {} dimensions, expected {}",
            embedder.name(),
            embedding.len(),
            dimension
        ));
    }
    Ok(embedding)
}

fn progress_bar(len: u64) -> ProgressBar {
    if !console::Term::stderr().is_term() {
        return ProgressBar::hidden();
    }

    let progress = ProgressBar::new(len);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Embedding catalog [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .progress_chars("=>-"),
    );
    progress
}
