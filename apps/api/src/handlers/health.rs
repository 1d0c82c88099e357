use crate::{models::HealthResponse, services::RecommendationService};
use actix_web::{get, web, HttpResponse};

#[get("/")]
pub async fn home() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "message": "API is running"
    }))
}

#[get("/health")]
pub async fn health_check(
    recommendation_service: web::Data<RecommendationService>,
) -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        catalog_size: recommendation_service.catalog().len(),
    })
}
