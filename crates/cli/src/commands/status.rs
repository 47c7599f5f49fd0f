//! `fableforge status`: Show one story's progress.

use fableforge_config::AppConfig;
use fableforge_core::OwnerId;

pub async fn run(owner: &OwnerId, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    let store = super::build_store(&config).await?;
    let story_id = super::parse_story_id(id)?;

    let story = store.get_story(owner, story_id).await?;
    let committed = story.current_episode.saturating_sub(1);

    println!("\"{}\" ({})", story.title, story.genre);
    println!("  id:        {}", story.id);
    println!("  progress:  {committed}/{} episodes committed", story.num_episodes);
    if story.is_completed {
        println!("  state:     complete");
    } else if !story.pending_batch.is_empty() {
        println!(
            "  state:     {} episode(s) awaiting validation",
            story.pending_batch.len()
        );
    } else {
        println!(
            "  state:     next episode {} ({})",
            story.current_episode,
            story.phase_for(story.current_episode).label()
        );
    }
    if let Some(summary) = &story.summary {
        println!("  teaser:    {summary}");
    }

    println!("\nOutline:");
    for segment in &story.outline {
        let marker = if committed >= segment.end {
            "done"
        } else if story.segment_for(story.current_episode).map(|s| s.start) == Some(segment.start)
            && !story.is_completed
        {
            "<-- here"
        } else {
            ""
        };
        let range = if segment.start == segment.end {
            format!("{}", segment.start)
        } else {
            format!("{}-{}", segment.start, segment.end)
        };
        println!("  {:>5}  {:<18} {}", range, segment.phase.label(), marker);
    }

    let characters = store.characters(owner, story_id).await?;
    if !characters.is_empty() {
        println!("\nCharacters:");
        for c in &characters {
            let state = if c.active { &c.emotional_state } else { "absent" };
            println!("  {:<20} {:<12} {}", c.name, c.role, state);
        }
    }
    Ok(())
}
