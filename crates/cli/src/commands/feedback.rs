//! `fableforge feedback`: Send feedback on one pending episode.

use fableforge_config::AppConfig;
use fableforge_core::{FeedbackItem, OwnerId};

pub async fn run(
    owner: &OwnerId,
    id: &str,
    episode: u32,
    instruction: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    let pipeline = super::build_pipeline(&config).await?;
    let story_id = super::parse_story_id(id)?;

    let items = vec![FeedbackItem { episode_number: episode, instruction: instruction.into() }];
    let story = pipeline.apply_feedback(owner, story_id, &items).await?;

    if let Some(updated) = story.pending_batch.iter().find(|e| e.number == episode) {
        println!("Applied to episode {}: {}", updated.number, updated.title);
        println!("  {}", updated.summary);
    }
    println!("\nWhen the batch looks right: fableforge validate {id}");
    Ok(())
}
