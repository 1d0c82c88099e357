pub mod catalog;
pub mod intent_extractor;
pub mod recommendation;
pub mod search_history;

// Re-export public types
pub use catalog::Catalog;
pub use intent_extractor::{IntentExtractor, OpenAiIntentExtractor};
pub use recommendation::{
    FallbackReason, RecommendationService, RecommendationSource, Recommendations,
};
pub use search_history::SearchHistoryService;
