//! `fableforge create`: Plan a new story from a premise.

use fableforge_config::AppConfig;
use fableforge_core::{Language, OwnerId, RefinementMode};

pub async fn run(
    owner: &OwnerId,
    premise: &str,
    episodes: u32,
    language: Language,
    human: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    let pipeline = super::build_pipeline(&config).await?;

    let refinement = if human { RefinementMode::Human } else { RefinementMode::Automatic };
    let story = pipeline
        .create_story(owner, premise, episodes, language, refinement)
        .await?;

    println!("Created \"{}\" ({})", story.title, story.genre);
    println!("  id:       {}", story.id);
    println!("  episodes: {}", story.num_episodes);
    if !story.theme.is_empty() {
        println!("  theme:    {}", story.theme);
    }
    println!("\nOutline:");
    for segment in &story.outline {
        let range = if segment.start == segment.end {
            format!("{}", segment.start)
        } else {
            format!("{}-{}", segment.start, segment.end)
        };
        println!("  {:>5}  {:<18} {}", range, segment.phase.label(), segment.description);
    }
    println!("\nNext: fableforge generate {}", story.id);
    Ok(())
}
