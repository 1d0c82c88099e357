use crate::{
    config::Config,
    error::ApiError,
    models::{HistoryEntry, RecommendationRequest, RecommendationResponse},
    services::{RecommendationService, RecommendationSource, SearchHistoryService},
};
use actix_web::{
    web::{self, Json},
    HttpResponse,
};
use log::{error, info};

pub const MAX_TOP_N: usize = 50;

pub fn recommendations_config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/recommend").route(web::post().to(recommend)));
}

/// Recommend catalog products for a free-text shopping query
pub async fn recommend(
    request: Json<RecommendationRequest>,
    config: web::Data<Config>,
    recommendation_service: web::Data<RecommendationService>,
    search_history_service: web::Data<SearchHistoryService>,
) -> Result<HttpResponse, ApiError> {
    let request = request.into_inner();
    let query = request
        .query
        .filter(|q| !q.is_empty())
        .ok_or(ApiError::EmptyQuery)?;

    let top_n = request.top_n.unwrap_or(config.default_top_n);
    if !(1..=MAX_TOP_N).contains(&top_n) {
        return Err(ApiError::InvalidInput(format!(
            "top_n must be between 1 and {}",
            MAX_TOP_N
        )));
    }

    let result = recommendation_service
        .recommend_with_fallback(&query, top_n)
        .await;

    if let RecommendationSource::Fallback(reason) = &result.source {
        info!("Served fallback recommendations for '{}': {:?}", query, reason);
    }

    if !result.items.is_empty() {
        let entry = HistoryEntry::new(query.clone(), result.items.clone());
        // Don't fail the request if history saving fails
        if let Err(e) = search_history_service.append(entry).await {
            error!("Failed to save search history: {}", e);
        }
    }

    Ok(HttpResponse::Ok().json(RecommendationResponse {
        query,
        recommendations: result.items,
    }))
}
