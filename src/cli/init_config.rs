use super::config::{default_config_path, default_data_file, AppConfig};
use std::path::PathBuf;

/// Write a commented default configuration file
///
/// Refuses to replace an existing file unless `force` is set.
pub fn execute(output: Option<String>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = output.map(PathBuf::from).unwrap_or_else(default_config_path);

    if path.exists() && !force {
        return Err(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )
        .into());
    }

    AppConfig::create_default(&path, &default_data_file())?;

    println!("📝 Created {}", path.display());
    println!("   Set [telegram] token (or BOT_TOKEN) before running the bot.");
    Ok(())
}
