//! Ingest command - Load a directory of documents into the index

use std::path::PathBuf;

use anyhow::Result;
use colored::Colorize;

use resume_match::{DocumentKind, Settings};

/// Run ingest command
pub async fn run(
    settings: &Settings,
    kind: DocumentKind,
    source: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let source = source.unwrap_or_else(|| settings.source_dir(kind));
    let pipeline = settings.build_pipeline()?;

    if !json {
        println!(
            "{} Ingesting {} documents from {}...",
            "→".dimmed(),
            kind.to_string().cyan(),
            source.display()
        );
    }

    // Missing source or an unreachable index is fatal; per-file errors are not
    let report = pipeline.ingest(&source, kind).await?;

    if json {
        let failed: Vec<_> = report
            .failed
            .iter()
            .map(|f| {
                serde_json::json!({
                    "filename": f.filename,
                    "error": f.error.kind(),
                    "message": f.error.to_string(),
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "kind": kind,
                "source": source.display().to_string(),
                "succeeded": report.succeeded,
                "failed": failed,
                "duration_ms": report.duration_ms,
            }))?
        );
        return Ok(());
    }

    println!();
    println!(
        "{} Ingested {} of {} documents in {:.2}s",
        "✓".green().bold(),
        report.succeeded.to_string().cyan(),
        report.total(),
        report.duration_ms as f64 / 1000.0
    );

    if !report.failed.is_empty() {
        println!("  {} {} documents failed", "✗".red(), report.failed.len());
        for failure in &report.failed {
            println!(
                "    {} {}: {}",
                "→".dimmed(),
                failure.filename,
                failure.error.to_string().dimmed()
            );
        }
    }

    println!(
        "  {} Index: {}",
        "→".dimmed(),
        settings.index.name.cyan()
    );

    Ok(())
}
