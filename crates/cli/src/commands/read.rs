//! `fableforge read`: Print a committed episode.

use fableforge_config::AppConfig;
use fableforge_core::OwnerId;

pub async fn run(
    owner: &OwnerId,
    id: &str,
    episode: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    let store = super::build_store(&config).await?;
    let story_id = super::parse_story_id(id)?;

    let episodes = store.episodes_in_range(owner, story_id, episode, episode).await?;
    match episodes.first() {
        Some(found) => {
            println!("Episode {}: {}\n", found.number, found.title);
            println!("{}", found.content);
        }
        None => println!("Episode {episode} is not committed yet."),
    }
    Ok(())
}
