//! CLI command implementations, one module per subcommand.
//!
//! Shared wiring lives here: the pipeline builder picks the provider and
//! store the config names, and the store builder gives read-only commands
//! a path that never needs an API key.

use std::sync::Arc;

use fableforge_config::AppConfig;
use fableforge_core::provider::{EmbeddingModel, LanguageModel};
use fableforge_core::{StoryId, StoryStore};
use fableforge_engine::{FixedWindowQuota, PipelineConfig, StoryPipeline};
use fableforge_memory::{InMemoryStore, SqliteStore};
use fableforge_providers::{
    GeminiEmbedder, GeminiProvider, OpenAiCompatEmbedder, OpenAiCompatProvider,
};

pub mod create;
pub mod delete;
pub mod feedback;
pub mod generate;
pub mod init;
pub mod list;
pub mod read;
pub mod status;
pub mod summary;
pub mod validate;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

pub(crate) fn parse_story_id(id: &str) -> CliResult<StoryId> {
    let uuid = uuid::Uuid::parse_str(id).map_err(|_| format!("not a story id: {id}"))?;
    Ok(StoryId(uuid))
}

pub(crate) async fn build_store(config: &AppConfig) -> CliResult<Arc<dyn StoryStore>> {
    match config.store.backend.as_str() {
        "memory" => Ok(Arc::new(InMemoryStore::new())),
        _ => {
            let path = config.store_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let path = path.to_string_lossy().to_string();
            Ok(Arc::new(SqliteStore::new(&path).await?))
        }
    }
}

pub(crate) async fn build_pipeline(config: &AppConfig) -> CliResult<StoryPipeline> {
    let provider_name = config.default_provider.as_str();
    let api_key = config.api_key_for(provider_name).ok_or(
        "no API key configured; set FABLEFORGE_API_KEY or run `fableforge init` and edit the config",
    )?;
    let section = config.providers.get(provider_name);
    let model_name = section
        .and_then(|s| s.default_model.clone())
        .unwrap_or_else(|| config.generation.model.clone());

    let (model, embedder): (Arc<dyn LanguageModel>, Arc<dyn EmbeddingModel>) =
        match provider_name {
            "openai" => {
                let mut provider =
                    OpenAiCompatProvider::new(&api_key).with_model(model_name);
                let mut embedder = OpenAiCompatEmbedder::new(&api_key);
                if let Some(url) = section.and_then(|s| s.api_url.clone()) {
                    provider = provider.with_base_url(url.clone());
                    embedder = embedder.with_base_url(url);
                }
                (Arc::new(provider), Arc::new(embedder))
            }
            _ => {
                let provider = GeminiProvider::new(&api_key).with_model(model_name);
                let embedder = GeminiEmbedder::new(&api_key)
                    .with_model(config.retrieval.embedding_model.clone());
                (Arc::new(provider), Arc::new(embedder))
            }
        };

    let store = build_store(config).await?;
    let gate = Arc::new(FixedWindowQuota::new(
        config.limits.daily_episodes,
        config.limits.monthly_episodes,
    ));

    Ok(StoryPipeline::with_config(
        model,
        embedder,
        store,
        gate,
        PipelineConfig::from_app(config),
    ))
}
