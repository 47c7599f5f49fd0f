//! `fableforge generate`: Generate the next batch of episodes.

use fableforge_config::AppConfig;
use fableforge_core::OwnerId;
use fableforge_engine::{BatchState, BatchWarning};

pub async fn run(
    owner: &OwnerId,
    id: &str,
    batch: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    let pipeline = super::build_pipeline(&config).await?;
    let story_id = super::parse_story_id(id)?;

    let report = pipeline.generate_batch(owner, story_id, batch).await?;

    match report.state {
        BatchState::Committed if report.episodes.is_empty() => {
            println!("Story is already complete.");
            return Ok(());
        }
        BatchState::Committed => println!("Committed {} episode(s):", report.episodes.len()),
        BatchState::Generated => {
            println!("Generated {} episode(s), parked for review:", report.episodes.len())
        }
        BatchState::NeedsRefinement => {
            println!("A batch is already awaiting validation:")
        }
        BatchState::Validating => println!("Batch is validating:"),
    }

    for episode in &report.episodes {
        println!("\nEpisode {}: {}", episode.number, episode.title);
        println!("  {}", episode.summary);
    }

    for warning in &report.warnings {
        match warning {
            BatchWarning::RetryBudgetExhausted { attempts, episodes } => println!(
                "\nWarning: episodes {episodes:?} were still flagged after {attempts} validation round(s); committed as-is."
            ),
        }
    }

    if report.state == BatchState::Generated || report.state == BatchState::NeedsRefinement {
        println!("\nReview, then either:");
        println!("  fableforge feedback {id} --episode N \"what to change\"");
        println!("  fableforge validate {id}");
    }
    Ok(())
}
