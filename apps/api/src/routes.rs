use actix_web::web;

use crate::error::ApiError;
use crate::handlers::{get_search_history, health_check, home, recommendations_config};

/// Configure all routes for the API
pub fn api_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .service(home)
        .service(health_check)
        .service(get_search_history)
        .configure(recommendations_config);
}

/// Malformed JSON bodies get the same `{"error": ...}` shape as other client errors.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        ApiError::InvalidInput(format!("Invalid JSON body: {}", err)).into()
    })
}
