//! Match command - Rank indexed documents against a query text

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use colored::Colorize;

use resume_match::search::index::SearchResult;
use resume_match::{with_retry, DocumentKind, Settings};

/// Run match command
pub async fn run(
    settings: &Settings,
    text: Option<String>,
    file: Option<PathBuf>,
    kind: Option<DocumentKind>,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let query = match (text, file) {
        (_, Some(path)) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?,
        (Some(text), None) => text,
        (None, None) => bail!("Provide query text or --file"),
    };
    let limit = limit.unwrap_or(settings.matching.default_top_k);

    let matcher = settings.build_matcher()?;
    let results = with_retry(&settings.retry, "match", || {
        matcher.find_matches(&query, limit, kind)
    })
    .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        print_results(&query, kind, &results);
    }

    Ok(())
}

fn print_results(query: &str, kind: Option<DocumentKind>, results: &SearchResult) {
    let label = kind.map(|k| format!("{k}s")).unwrap_or_else(|| "documents".to_string());

    // Truncate the query for display (char-aware for Unicode)
    let shown = if query.chars().count() > 60 {
        format!("{}...", query.chars().take(60).collect::<String>())
    } else {
        query.trim().to_string()
    };

    if results.is_empty() {
        println!("{} No {} found for: {}", "→".dimmed(), label, shown.cyan());
        return;
    }

    println!(
        "{} {} {} for: {}",
        "→".dimmed(),
        results.len(),
        label,
        shown.cyan()
    );
    println!();

    for (i, result) in results.results.iter().enumerate() {
        let score_str = format!("{:.2}", result.score);
        let score_colored = if result.score > 0.5 {
            score_str.green()
        } else if result.score > 0.2 {
            score_str.yellow()
        } else {
            score_str.dimmed()
        };

        println!(
            "{}. [{}] {} {}",
            (i + 1).to_string().bold(),
            score_colored,
            result.id.cyan(),
            format!("({})", result.metadata.kind).dimmed()
        );
    }
}
