//! `fableforge list`: List stories.

use fableforge_config::AppConfig;
use fableforge_core::OwnerId;

pub async fn run(owner: &OwnerId) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    let store = super::build_store(&config).await?;

    let stories = store.list_stories(owner).await?;
    if stories.is_empty() {
        println!("No stories yet. Start one with: fableforge create \"a premise\"");
        return Ok(());
    }

    for story in &stories {
        let committed = story.current_episode.saturating_sub(1);
        let state = if story.is_completed {
            "complete".to_string()
        } else if !story.pending_batch.is_empty() {
            "pending review".to_string()
        } else {
            format!("{committed}/{}", story.num_episodes)
        };
        println!("{}  {:<14} {}", story.id, state, story.title);
    }
    Ok(())
}
