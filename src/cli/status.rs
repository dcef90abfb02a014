use super::config::AppConfig;
use std::path::PathBuf;
use timegate::clock::{Clock, SystemClock};
use timegate::store::{JsonFileBackend, Store};

/// Summarize the persisted document
///
/// Reads the data file named by the configuration (after environment
/// overrides) and prints one line per channel. Never writes the file.
pub async fn execute(config_path: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = config_path.map(PathBuf::from);
    let mut config = AppConfig::load_or_default(config_path.as_deref())?;
    config.apply_env()?;

    let now = SystemClock.now();
    let data_file = config.storage.data_file.clone();
    let store = Store::new(JsonFileBackend::new(&data_file), config.document_seed(now));
    let doc = store.load().await?;

    println!("📊 Timegate Status");
    println!();
    println!("Data file: {}", data_file.display());
    if !data_file.exists() {
        println!("  (not created yet, showing configured seed)");
    }
    println!("Global admins: {}", doc.global_admins.len());
    println!(
        "Channels: {}  Members: {}  Pending: {}",
        doc.channels.len(),
        doc.member_count(),
        doc.pending_count()
    );

    for channel in doc.channels.values() {
        let next_expiry = channel
            .members
            .values()
            .map(|grant| grant.expires_at())
            .min()
            .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
            .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "-".to_string());

        println!();
        println!("  {} ({})", channel.name, channel.id);
        println!(
            "    members: {}  pending: {}  admins: {}  next expiry: {}",
            channel.members.len(),
            channel.pending.len(),
            channel.admins.len(),
            next_expiry
        );
    }

    Ok(())
}
