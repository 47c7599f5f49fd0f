//! `fableforge init`: Write a default config file.

use fableforge_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("Created config directory: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("Config file already exists: {}", config_path.display());
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("Created config file: {}", config_path.display());
    }

    println!("\nNext steps:");
    println!("  1. Set an API key: export FABLEFORGE_API_KEY=... (or edit the config)");
    println!("  2. Create a story: fableforge create \"a lighthouse keeper's last season\"");
    Ok(())
}
