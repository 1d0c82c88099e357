use crate::{
    error::RecommendationError,
    ml::{cosine_similarity, EmbeddingProvider},
    models::{Intent, Product, Recommendation},
    services::{Catalog, IntentExtractor},
};
use std::{cmp::Ordering, sync::Arc};
use tracing::{debug, info, warn};

pub const SIMILARITY_WEIGHT: f64 = 0.6;
pub const RATING_WEIGHT: f64 = 0.3;
pub const POPULARITY_WEIGHT: f64 = 0.1;

/// Blend of relevance, quality and log-dampened popularity.
pub fn final_score(similarity: f64, rating: f64, review_count: u64) -> f64 {
    SIMILARITY_WEIGHT * similarity
        + RATING_WEIGHT * rating
        + POPULARITY_WEIGHT * (review_count as f64).ln_1p()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate<'a> {
    pub product: &'a Product,
    pub similarity_score: f64,
    pub final_score: f64,
}

/// Result of a ranking pass that did not fail.
#[derive(Debug)]
enum RankOutcome<'a> {
    Ranked(Vec<ScoredCandidate<'a>>),
    /// The intent filters left nothing to rank.
    NoCandidates,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FallbackReason {
    NoCandidates,
    EngineError(RecommendationError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecommendationSource {
    Ranked,
    Fallback(FallbackReason),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recommendations {
    pub items: Vec<Recommendation>,
    pub source: RecommendationSource,
}

/// Recommendation engine over one catalog and one pair of providers.
#[derive(Clone)]
pub struct RecommendationService {
    catalog: Arc<Catalog>,
    embedder: Arc<dyn EmbeddingProvider>,
    extractor: Arc<dyn IntentExtractor>,
}

impl RecommendationService {
    pub fn new(
        catalog: Arc<Catalog>,
        embedder: Arc<dyn EmbeddingProvider>,
        extractor: Arc<dyn IntentExtractor>,
    ) -> Self {
        Self {
            catalog,
            embedder,
            extractor,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Rank catalog products for a query, returning at most `top_n` of them.
    ///
    /// An empty result means the extracted filters matched nothing.
    pub async fn rank(
        &self,
        query: &str,
        top_n: usize,
    ) -> Result<Vec<Recommendation>, RecommendationError> {
        Ok(match self.rank_candidates(query, top_n).await? {
            RankOutcome::Ranked(candidates) => candidates
                .iter()
                .map(|c| c.product.to_recommendation())
                .collect(),
            RankOutcome::NoCandidates => Vec::new(),
        })
    }

    /// Rank, substituting the most popular products when ranking yields
    /// nothing or fails. Only an empty catalog produces an empty result.
    pub async fn recommend_with_fallback(&self, query: &str, top_n: usize) -> Recommendations {
        let reason = match self.rank_candidates(query, top_n).await {
            Ok(RankOutcome::Ranked(candidates)) if !candidates.is_empty() => {
                return Recommendations {
                    items: candidates
                        .iter()
                        .map(|c| c.product.to_recommendation())
                        .collect(),
                    source: RecommendationSource::Ranked,
                };
            }
            Ok(_) => {
                warn!("No valid recommendations for '{}', using fallback", query);
                FallbackReason::NoCandidates
            }
            Err(e) => {
                warn!("Error in recommendation engine for '{}': {}. Using fallback", query, e);
                FallbackReason::EngineError(e)
            }
        };

        Recommendations {
            items: self.popular_products(top_n),
            source: RecommendationSource::Fallback(reason),
        }
    }

    /// The `top_n` products by rating, then review count, ignoring any query.
    pub fn popular_products(&self, top_n: usize) -> Vec<Recommendation> {
        rank_by_popularity(self.catalog.products(), top_n)
            .into_iter()
            .map(Product::to_recommendation)
            .collect()
    }

    async fn rank_candidates(
        &self,
        query: &str,
        top_n: usize,
    ) -> Result<RankOutcome<'_>, RecommendationError> {
        let intent = self.extract_intent(query).await;
        info!(?intent, "Extracted query intent");

        let candidates = filter_candidates(self.catalog.products(), &intent);
        debug!(
            "{} of {} products match the extracted filters",
            candidates.len(),
            self.catalog.len()
        );
        if candidates.is_empty() {
            return Ok(RankOutcome::NoCandidates);
        }

        let query_embedding = self
            .embedder
            .encode(query)
            .await
            .map_err(|e| RecommendationError::EmbeddingFailed(e.to_string()))?;

        let mut scored = score_candidates(&query_embedding, candidates)?;
        sort_by_final_score(&mut scored);

        if tracing::enabled!(tracing::Level::DEBUG) {
            for (i, c) in scored.iter().take(10).enumerate() {
                debug!(
                    "#{} {} similarity={:.4} final={:.4}",
                    i + 1,
                    c.product.title,
                    c.similarity_score,
                    c.final_score
                );
            }
        }

        scored.truncate(top_n);
        Ok(RankOutcome::Ranked(scored))
    }

    /// Extraction problems never abort ranking; they only drop the filters.
    async fn extract_intent(&self, query: &str) -> Intent {
        match self.extractor.extract(query).await {
            Ok(intent) => intent,
            Err(e) => {
                warn!("Ranking '{}' without constraints: {}", query, e);
                Intent::default()
            }
        }
    }
}

/// Keep products matching the intent's category (case-insensitive) and
/// inclusive budget. Catalog order is preserved.
pub fn filter_candidates<'a>(products: &'a [Product], intent: &Intent) -> Vec<&'a Product> {
    let category = intent.category.as_deref().map(|c| c.trim().to_lowercase());

    products
        .iter()
        .filter(|product| {
            category
                .as_deref()
                .map_or(true, |c| product.category.trim().to_lowercase() == c)
        })
        .filter(|product| {
            intent
                .budget
                .map_or(true, |budget| budget.contains(product.price))
        })
        .collect()
}

pub fn score_candidates<'a>(
    query_embedding: &[f32],
    candidates: Vec<&'a Product>,
) -> Result<Vec<ScoredCandidate<'a>>, RecommendationError> {
    candidates
        .into_iter()
        .map(|product| {
            let similarity_score = cosine_similarity(query_embedding, &product.embedding)
                .ok_or_else(|| {
                    RecommendationError::EmbeddingFailed(format!(
                        "Query embedding has {} dimensions, catalog has {}",
                        query_embedding.len(),
                        product.embedding.len()
                    ))
                })?;

            Ok(ScoredCandidate {
                product,
                similarity_score,
                final_score: final_score(similarity_score, product.rating, product.review_count),
            })
        })
        .collect()
}

/// Descending by final score; equal scores keep catalog order.
fn sort_by_final_score(candidates: &mut [ScoredCandidate<'_>]) {
    candidates.sort_by(|a, b| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(Ordering::Equal)
    });
}

pub fn rank_by_popularity(products: &[Product], top_n: usize) -> Vec<&Product> {
    let mut ranked: Vec<&Product> = products.iter().collect();
    ranked.sort_by(|a, b| {
        b.rating
            .partial_cmp(&a.rating)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.review_count.cmp(&a.review_count))
    });
    ranked.truncate(top_n);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::{ApiError, Result as ApiResult},
        models::Budget,
        services::intent_extractor::parse_intent,
    };
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Returns a fixed vector per known text, `[0, 0, 1]` for anything else.
    struct StubEmbedder {
        vectors: HashMap<String, Vec<f32>>,
    }

    #[async_trait]
    impl EmbeddingProvider for StubEmbedder {
        async fn encode(&self, text: &str) -> ApiResult<Vec<f32>> {
            Ok(self
                .vectors
                .get(text)
                .cloned()
                .unwrap_or_else(|| vec![0.0, 0.0, 1.0]))
        }

        fn dimension(&self) -> usize {
            3
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FailingEmbedder {
        async fn encode(&self, _text: &str) -> ApiResult<Vec<f32>> {
            Err(ApiError::ModelError("service unavailable".into()))
        }

        fn dimension(&self) -> usize {
            3
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    enum StubExtractor {
        Fixed(Intent),
        Failing(RecommendationError),
        /// Parses a canned language model reply.
        Reply(&'static str),
    }

    #[async_trait]
    impl IntentExtractor for StubExtractor {
        async fn extract(&self, _query: &str) -> Result<Intent, RecommendationError> {
            match self {
                StubExtractor::Fixed(intent) => Ok(intent.clone()),
                StubExtractor::Failing(e) => Err(e.clone()),
                StubExtractor::Reply(content) => parse_intent(content),
            }
        }
    }

    fn product(
        title: &str,
        category: &str,
        price: f64,
        rating: f64,
        review_count: u64,
        embedding: Vec<f32>,
    ) -> Product {
        Product {
            title: title.to_string(),
            description: Some(format!("{} description", title)),
            category: category.to_string(),
            price,
            rating,
            review_count,
            embedding,
        }
    }

    fn test_catalog() -> Vec<Product> {
        vec![
            product("Trail Runner", "shoes", 120.0, 4.0, 300, vec![1.0, 0.0, 0.0]),
            product("Rain Boot", "Shoes", 60.0, 4.4, 80, vec![0.8, 0.6, 0.0]),
            product("Gaming Laptop", "electronics", 1400.0, 4.7, 900, vec![0.0, 1.0, 0.0]),
            product("Budget Sneaker", "shoes", 49.99, 3.9, 15, vec![0.9, 0.1, 0.0]),
            product("Top Sneaker", "shoes", 200.0, 4.1, 500, vec![0.7, 0.0, 0.7]),
            product("Headphones", "electronics", 150.0, 4.7, 1200, vec![0.0, 0.6, 0.8]),
        ]
    }

    fn service(
        products: Vec<Product>,
        embedder: impl EmbeddingProvider + 'static,
        extractor: StubExtractor,
    ) -> RecommendationService {
        RecommendationService::new(
            Arc::new(Catalog::from_products(products).unwrap()),
            Arc::new(embedder),
            Arc::new(extractor),
        )
    }

    fn stub_embedder(query: &str, vector: Vec<f32>) -> StubEmbedder {
        StubEmbedder {
            vectors: HashMap::from([(query.to_string(), vector)]),
        }
    }

    fn titles(items: &[Recommendation]) -> Vec<&str> {
        items.iter().map(|r| r.title.as_str()).collect()
    }

    #[test]
    fn test_final_score_weights() {
        let score = final_score(0.5, 4.0, 0);
        assert!((score - (0.3 + 1.2)).abs() < 1e-12);

        let score = final_score(1.0, 5.0, 99);
        assert!((score - (0.6 + 1.5 + 0.1 * 100f64.ln())).abs() < 1e-12);
    }

    #[test]
    fn test_more_reviews_score_strictly_higher() {
        assert!(final_score(0.7, 4.2, 100) > final_score(0.7, 4.2, 0));
        assert!(final_score(0.7, 4.2, 1) > final_score(0.7, 4.2, 0));
    }

    #[test]
    fn test_category_filter_is_case_insensitive() {
        let products = test_catalog();
        let intent = Intent {
            category: Some("SHOES".to_string()),
            ..Intent::default()
        };
        let filtered = filter_candidates(&products, &intent);
        let names: Vec<_> = filtered.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(
            names,
            vec!["Trail Runner", "Rain Boot", "Budget Sneaker", "Top Sneaker"]
        );
    }

    #[test]
    fn test_budget_filter_is_inclusive() {
        let products = test_catalog();
        let intent = Intent {
            budget: Some(Budget {
                min: 50.0,
                max: 200.0,
            }),
            ..Intent::default()
        };
        let filtered = filter_candidates(&products, &intent);
        let names: Vec<_> = filtered.iter().map(|p| p.title.as_str()).collect();

        assert!(!names.contains(&"Budget Sneaker")); // 49.99
        assert!(names.contains(&"Top Sneaker")); // 200.00
        assert!(!names.contains(&"Gaming Laptop"));
    }

    #[test]
    fn test_features_do_not_filter() {
        let products = test_catalog();
        let intent = Intent {
            features: Some(vec!["waterproof".to_string()]),
            ..Intent::default()
        };
        assert_eq!(filter_candidates(&products, &intent).len(), products.len());
    }

    #[test]
    fn test_rank_by_popularity_orders_by_rating_then_reviews() {
        let products = test_catalog();
        let ranked = rank_by_popularity(&products, 3);
        let names: Vec<_> = ranked.iter().map(|p| p.title.as_str()).collect();
        // Headphones and Gaming Laptop tie on rating; more reviews wins
        assert_eq!(names, vec!["Headphones", "Gaming Laptop", "Rain Boot"]);
    }

    #[test]
    fn test_rank_by_popularity_empty_catalog() {
        assert!(rank_by_popularity(&[], 5).is_empty());
    }

    #[tokio::test]
    async fn test_rank_returns_at_most_top_n_in_score_order() {
        let service = service(
            test_catalog(),
            stub_embedder("comfortable shoes", vec![1.0, 0.0, 0.0]),
            StubExtractor::Fixed(Intent::default()),
        );

        for top_n in 1..=8 {
            let outcome = service.rank_candidates("comfortable shoes", top_n).await.unwrap();
            let RankOutcome::Ranked(scored) = outcome else {
                panic!("expected ranked candidates");
            };
            assert!(scored.len() <= top_n);
            assert!(scored
                .windows(2)
                .all(|pair| pair[0].final_score >= pair[1].final_score));
            assert!(scored.iter().all(|c| service
                .catalog()
                .products()
                .iter()
                .any(|p| std::ptr::eq(p, c.product))));
        }

        let items = service.rank("comfortable shoes", 3).await.unwrap();
        assert_eq!(items.len(), 3);
    }

    #[tokio::test]
    async fn test_rank_ties_keep_catalog_order() {
        let products = vec![
            product("First", "misc", 10.0, 4.0, 10, vec![1.0, 0.0, 0.0]),
            product("Second", "misc", 10.0, 4.0, 10, vec![1.0, 0.0, 0.0]),
            product("Third", "misc", 10.0, 4.0, 10, vec![1.0, 0.0, 0.0]),
        ];
        let service = service(
            products,
            stub_embedder("anything", vec![1.0, 0.0, 0.0]),
            StubExtractor::Fixed(Intent::default()),
        );

        let items = service.rank("anything", 5).await.unwrap();
        assert_eq!(titles(&items), vec!["First", "Second", "Third"]);
    }

    #[tokio::test]
    async fn test_budget_excludes_higher_rated_product() {
        let products = vec![
            product("A", "misc", 100.0, 4.0, 10, vec![1.0, 0.0, 0.0]),
            product("B", "misc", 300.0, 5.0, 1000, vec![1.0, 0.0, 0.0]),
        ];
        let intent = Intent {
            budget: Some(Budget {
                min: 0.0,
                max: 150.0,
            }),
            ..Intent::default()
        };
        let service = service(
            products,
            stub_embedder("cheap thing", vec![1.0, 0.0, 0.0]),
            StubExtractor::Fixed(intent),
        );

        let items = service.rank("cheap thing", 5).await.unwrap();
        assert_eq!(titles(&items), vec!["A"]);

        let result = service.recommend_with_fallback("cheap thing", 5).await;
        assert_eq!(result.source, RecommendationSource::Ranked);
        assert_eq!(titles(&result.items), vec!["A"]);
    }

    #[tokio::test]
    async fn test_similarity_dominates_between_equal_products() {
        let products = vec![
            product("Laptop", "electronics", 900.0, 4.5, 100, vec![0.0, 1.0, 0.0]),
            product("Boots", "shoes", 90.0, 4.5, 100, vec![1.0, 0.0, 0.0]),
        ];
        let service = service(
            products,
            stub_embedder("hiking boots", vec![1.0, 0.0, 0.0]),
            StubExtractor::Fixed(Intent::default()),
        );

        let items = service.rank("hiking boots", 2).await.unwrap();
        assert_eq!(titles(&items), vec!["Boots", "Laptop"]);
    }

    #[tokio::test]
    async fn test_extraction_failure_ranks_unconstrained() {
        let service = service(
            test_catalog(),
            stub_embedder("gadgets", vec![0.0, 1.0, 0.0]),
            StubExtractor::Failing(RecommendationError::ExtractionFailed("timeout".into())),
        );

        let result = service.recommend_with_fallback("gadgets", 2).await;
        assert_eq!(result.source, RecommendationSource::Ranked);
        assert_eq!(titles(&result.items), vec!["Gaming Laptop", "Headphones"]);
    }

    #[tokio::test]
    async fn test_malformed_intent_ranks_unconstrained() {
        let service = service(
            test_catalog(),
            stub_embedder("gadgets", vec![0.0, 1.0, 0.0]),
            StubExtractor::Failing(RecommendationError::MalformedIntent("not json".into())),
        );

        let items = service.rank("gadgets", 10).await.unwrap();
        assert_eq!(items.len(), test_catalog().len());
    }

    #[tokio::test]
    async fn test_non_numeric_budget_drops_category_too() {
        let service = service(
            test_catalog(),
            stub_embedder("cheap sofa", vec![0.0, 1.0, 0.0]),
            StubExtractor::Reply(r#"{"category": "furniture", "budget": ["a", "b"]}"#),
        );

        let result = service.recommend_with_fallback("cheap sofa", 10).await;
        assert_eq!(result.source, RecommendationSource::Ranked);
        assert_eq!(result.items.len(), test_catalog().len());
        assert_eq!(result.items[0].title, "Gaming Laptop");
    }

    #[tokio::test]
    async fn test_no_candidates_falls_back_to_popular() {
        let intent = Intent {
            category: Some("furniture".to_string()),
            ..Intent::default()
        };
        let service = service(
            test_catalog(),
            stub_embedder("sofa", vec![1.0, 0.0, 0.0]),
            StubExtractor::Fixed(intent),
        );

        assert!(service.rank("sofa", 3).await.unwrap().is_empty());

        let result = service.recommend_with_fallback("sofa", 3).await;
        assert_eq!(
            result.source,
            RecommendationSource::Fallback(FallbackReason::NoCandidates)
        );
        assert_eq!(result.items, service.popular_products(3));
        assert_eq!(
            titles(&result.items),
            vec!["Headphones", "Gaming Laptop", "Rain Boot"]
        );
    }

    #[tokio::test]
    async fn test_embedding_failure_falls_back_to_popular() {
        let service = service(
            test_catalog(),
            FailingEmbedder,
            StubExtractor::Fixed(Intent::default()),
        );

        let err = service.rank("anything", 3).await.unwrap_err();
        assert!(matches!(err, RecommendationError::EmbeddingFailed(_)));

        let result = service.recommend_with_fallback("anything", 3).await;
        assert!(matches!(
            result.source,
            RecommendationSource::Fallback(FallbackReason::EngineError(
                RecommendationError::EmbeddingFailed(_)
            ))
        ));
        let expected: Vec<Recommendation> = rank_by_popularity(&test_catalog(), 3)
            .into_iter()
            .map(Product::to_recommendation)
            .collect();
        assert_eq!(result.items, expected);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_embedding_failure() {
        let service = service(
            test_catalog(),
            stub_embedder("odd", vec![1.0, 0.0]),
            StubExtractor::Fixed(Intent::default()),
        );

        let err = service.rank("odd", 3).await.unwrap_err();
        assert!(matches!(err, RecommendationError::EmbeddingFailed(_)));
    }

    #[tokio::test]
    async fn test_empty_catalog_returns_nothing() {
        let service = service(
            Vec::new(),
            stub_embedder("anything", vec![1.0, 0.0, 0.0]),
            StubExtractor::Fixed(Intent::default()),
        );

        let result = service.recommend_with_fallback("anything", 5).await;
        assert!(result.items.is_empty());
    }

    #[tokio::test]
    async fn test_rank_uses_loaded_embeddings() {
        let mut products = test_catalog();
        let service_before = service(
            products.clone(),
            stub_embedder("q", vec![0.0, 1.0, 0.0]),
            StubExtractor::Fixed(Intent::default()),
        );
        // Same titles, swapped embeddings: a new catalog must rank by its own vectors
        products[0].embedding = vec![0.0, 1.0, 0.0];
        products[2].embedding = vec![1.0, 0.0, 0.0];
        let service_after = service(
            products,
            stub_embedder("q", vec![0.0, 1.0, 0.0]),
            StubExtractor::Fixed(Intent::default()),
        );

        let before = service_before.rank("q", 1).await.unwrap();
        let after = service_after.rank("q", 6).await.unwrap();
        assert_eq!(before[0].title, "Gaming Laptop");
        assert!(titles(&after)
            .iter()
            .position(|t| *t == "Trail Runner")
            < titles(&after).iter().position(|t| *t == "Gaming Laptop"));
    }
}
