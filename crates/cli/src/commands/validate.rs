//! `fableforge validate`: Commit the pending batch.

use fableforge_config::AppConfig;
use fableforge_core::OwnerId;

pub async fn run(owner: &OwnerId, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    let pipeline = super::build_pipeline(&config).await?;
    let story_id = super::parse_story_id(id)?;

    let report = pipeline.validate_batch(owner, story_id).await?;
    println!("Committed {} episode(s):", report.episodes.len());
    for episode in &report.episodes {
        println!("  Episode {}: {}", episode.number, episode.title);
    }

    let story = pipeline.get_story(owner, story_id).await?;
    if story.is_completed {
        println!("\nThe story is complete.");
    } else {
        println!("\nNext: fableforge generate {id}");
    }
    Ok(())
}
