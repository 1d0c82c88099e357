use crate::{
    models::{HistoryRequest, HistoryResponse},
    services::SearchHistoryService,
};
use actix_web::{get, web, HttpResponse};

/// Saved searches, newest first
#[get("/history")]
pub async fn get_search_history(
    params: web::Query<HistoryRequest>,
    search_history_service: web::Data<SearchHistoryService>,
) -> HttpResponse {
    let history = search_history_service.recent(params.limit).await;
    HttpResponse::Ok().json(HistoryResponse { history })
}
