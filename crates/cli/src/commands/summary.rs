//! `fableforge summary`: Refresh the story's spoiler-free teaser.

use fableforge_config::AppConfig;
use fableforge_core::OwnerId;

pub async fn run(owner: &OwnerId, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    let pipeline = super::build_pipeline(&config).await?;
    let story_id = super::parse_story_id(id)?;

    let teaser = pipeline.refresh_summary(owner, story_id).await?;
    println!("{teaser}");
    Ok(())
}
