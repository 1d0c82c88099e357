use crate::{
    config::Config,
    ml::{EmbeddingProvider, HashingEmbedder, HuggingFaceEmbedder},
    routes::api_routes,
    services::{Catalog, OpenAiIntentExtractor, RecommendationService, SearchHistoryService},
};
use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::{Context, Result};
use log::{info, warn};
use std::{net::TcpListener, sync::Arc};

/// Shared state handed to every worker.
#[derive(Clone)]
pub struct AppState {
    pub config: web::Data<Config>,
    pub recommendation_service: web::Data<RecommendationService>,
    pub search_history_service: web::Data<SearchHistoryService>,
}

impl AppState {
    pub fn new(
        config: Config,
        recommendation_service: RecommendationService,
        search_history_service: SearchHistoryService,
    ) -> Self {
        Self {
            config: web::Data::new(config),
            recommendation_service: web::Data::new(recommendation_service),
            search_history_service: web::Data::new(search_history_service),
        }
    }

    /// Initialize providers and load the catalog described by `config`.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let embedder = build_embedder(config)?;

        let catalog = Catalog::load(&config.catalog_path, embedder.as_ref())
            .await
            .context("Failed to load product catalog")?;
        if catalog.is_empty() {
            warn!("Product catalog is empty; every request will return no recommendations");
        }

        if config.openai_api_key.is_none() {
            warn!("No OpenAI API key configured; queries will be ranked without extracted filters");
        }
        let extractor =
            OpenAiIntentExtractor::new(config).context("Failed to initialize intent extractor")?;

        let recommendation_service =
            RecommendationService::new(Arc::new(catalog), embedder, Arc::new(extractor));
        let search_history_service = SearchHistoryService::new(&config.history_path);

        Ok(Self::new(
            config.clone(),
            recommendation_service,
            search_history_service,
        ))
    }

    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(self.config.clone())
            .app_data(self.recommendation_service.clone())
            .app_data(self.search_history_service.clone())
            .configure(api_routes);
    }
}

fn build_embedder(config: &Config) -> Result<Arc<dyn EmbeddingProvider>> {
    match &config.huggingface_api_key {
        Some(api_key) => {
            let embedder = HuggingFaceEmbedder::new(config, api_key)
                .context("Failed to initialize sentence encoder")?;
            Ok(Arc::new(embedder))
        }
        None => {
            warn!(
                "No HuggingFace API key configured; using the local hashing embedder ({} dims)",
                config.embedding_dimension
            );
            Ok(Arc::new(HashingEmbedder::new(config.embedding_dimension)))
        }
    }
}

pub struct Application {
    port: u16,
    host: String,
    config: Config,
}

impl Application {
    /// Create a new application instance
    pub fn new(config: &Config) -> Self {
        Self {
            port: config.port,
            host: config.host.clone(),
            config: config.clone(),
        }
    }

    /// Build and run the server
    pub async fn run(&self) -> Result<()> {
        let bind_address = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&bind_address)
            .with_context(|| format!("Failed to bind {}", bind_address))?;
        info!("Starting server at http://{}", bind_address);

        self.run_with_listener(listener).await
    }

    /// Run the server with a specific TCP listener
    /// This is useful for testing where we want to use a random port
    pub async fn run_with_listener(&self, listener: TcpListener) -> Result<()> {
        let state = AppState::from_config(&self.config).await?;

        HttpServer::new(move || {
            let cors = Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header();
            let state = state.clone();

            App::new()
                .wrap(cors)
                .wrap(Logger::default())
                .configure(move |cfg| state.configure(cfg))
        })
        .listen(listener)?
        .run()
        .await?;

        Ok(())
    }
}
