//! CLI mode
//!
//! One-shot commands: `download`, `lookup` and `config generate`.

use std::net::IpAddr;

use anyhow::{Context, Result, bail};
use colored::Colorize;

use crate::config::StaticConfig;
use crate::database::{DatabaseKind, MaxMindDatabase, ReloadManager, ReloadOptions};
use crate::services::GeoLocator;
use crate::updater::{RefreshOutcome, Updater};

/// Run one update cycle; fails if any database failed to update
pub async fn run_download(config: &StaticConfig, names: Vec<String>) -> Result<()> {
    let names = if names.is_empty() {
        config.updater.editions.clone()
    } else {
        names
    };
    for name in &names {
        name.parse::<DatabaseKind>()
            .map_err(crate::errors::GeoKeeperError::validation)?;
    }

    let updater = Updater::from_config(&config.updater, config.geoip.data_dir.clone())?;
    let report = tokio::task::spawn_blocking(move || updater.refresh(&names[..]))
        .await
        .context("Update cycle panicked")?;

    for (name, outcome) in &report.entries {
        let line = match outcome {
            RefreshOutcome::Updated { build, .. } => {
                format!("{} {} (build {})", "updated".green().bold(), name, build)
            }
            RefreshOutcome::UpToDate { local } => {
                format!("{} {} (local build {})", "up-to-date".cyan(), name, local)
            }
            RefreshOutcome::InProgress => format!("{} {}", "in-progress".yellow(), name),
            RefreshOutcome::Failed(e) => format!("{} {}: {}", "failed".red().bold(), name, e),
        };
        println!("{}", line);
    }

    let failed = report.failed().len();
    if failed > 0 {
        bail!("{} of {} database(s) failed to update", failed, report.entries.len());
    }
    Ok(())
}

/// Open the local databases once and print the lookup result as JSON
pub async fn run_lookup(config: &StaticConfig, ip: IpAddr) -> Result<()> {
    let manager = ReloadManager::<MaxMindDatabase>::start(
        config.geoip.data_dir.clone(),
        ReloadOptions::from_config(&config.geoip),
    )
    .with_context(|| {
        format!(
            "Failed to open GeoIP databases in {}",
            config.geoip.data_dir.display()
        )
    })?;

    let info = manager.locate(ip);
    manager.stop().await;

    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

/// Print or write a sample configuration file
pub fn run_config_generate(output: Option<&str>) -> Result<()> {
    match output {
        Some(path) => {
            StaticConfig::default()
                .save_to_file(path)
                .with_context(|| format!("Failed to write {}", path))?;
            println!("{} Sample configuration written to {}", "✓".green(), path);
        }
        None => print!("{}", StaticConfig::generate_sample_config()),
    }
    Ok(())
}
