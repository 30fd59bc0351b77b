use std::path::Path;

use anyhow::{Context, Result};
use brewpair_core::{BrewPair, RunConfig, SlackGateway};
use serde::Serialize;

use crate::cli::Commands;

pub(crate) fn run(config_path: &Path, dry_run: bool, command: Commands) -> Result<()> {
    let mut config = RunConfig::load(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    if dry_run {
        config.run.dry_run = true;
    }
    if config.run.dry_run {
        tracing::warn!("dry run: no messages will be sent");
    }

    let gateway = SlackGateway::new(
        &config.slack.api_token,
        config.slack.timeout_ms,
        config.run.dry_run,
    )?;
    let app = BrewPair::new(config, gateway);

    match command {
        Commands::Invitation => {
            let outcome = app.run_invitation().context("invitation run failed")?;
            print_json(&outcome)?;
        }
        Commands::Reminder => {
            let outcome = app.run_reminder().context("reminder run failed")?;
            print_json(&outcome)?;
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
