//! Index command - Create the configured vector index

use anyhow::Result;
use colored::Colorize;

use resume_match::{with_retry, Settings};

/// Run index command
pub async fn run(settings: &Settings, json: bool) -> Result<()> {
    let handle = settings.build_index_handle()?;
    let config = handle.config().clone();

    if !json {
        println!(
            "{} Creating index {} at {}...",
            "→".dimmed(),
            config.name.cyan(),
            settings.index_service.url
        );
    }

    with_retry(&settings.retry, "create_index", || handle.ensure_created()).await?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "index": config.name,
                "dimension": config.dimension,
                "metric": config.metric,
                "write_mode": config.write_mode,
                "status": "ready",
            })
        );
    } else {
        println!(
            "{} Index {} ready ({} dims, {})",
            "✓".green().bold(),
            config.name.cyan(),
            config.dimension,
            config.metric
        );
    }

    Ok(())
}
