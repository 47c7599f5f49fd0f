//! `fableforge delete`: Delete a story and everything attached to it.

use fableforge_config::AppConfig;
use fableforge_core::OwnerId;

pub async fn run(owner: &OwnerId, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    let store = super::build_store(&config).await?;
    let story_id = super::parse_story_id(id)?;

    let story = store.get_story(owner, story_id).await?;
    store.delete_story(owner, story_id).await?;
    println!("Deleted \"{}\" ({})", story.title, story.id);
    Ok(())
}
