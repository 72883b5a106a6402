mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use resume_match::logging::init_logging;
use resume_match::{DocumentKind, Settings};

#[derive(Parser)]
#[command(name = "resume-match")]
#[command(about = "Semantic matching between job descriptions and resumes", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(long, global = true, env = "RESUME_MATCH_CONFIG", help = "Config file (YAML)")]
    config: Option<PathBuf>,

    #[arg(long, global = true, help = "Log level (trace, debug, info, warn, error)")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    // ===== Index =====
    /// Create the configured index (idempotent)
    Index {
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Ingest a directory of jobs or resumes
    Ingest {
        #[arg(long, value_enum, help = "Document kind")]
        kind: DocumentKind,
        #[arg(long, help = "Source directory (default: data/jobs or data/resumes)")]
        source: Option<PathBuf>,
        #[arg(long, help = "JSON output")]
        json: bool,
    },

    // ===== Matching =====
    /// Rank indexed documents against a query
    #[command(alias = "m")]
    Match {
        #[arg(required_unless_present = "file")]
        text: Option<String>,
        #[arg(long, short, help = "Read the query from a file")]
        file: Option<PathBuf>,
        #[arg(long, short, value_enum, help = "Only return documents of this kind")]
        kind: Option<DocumentKind>,
        #[arg(long, short, help = "Limit results")]
        limit: Option<usize>,
        #[arg(long, help = "JSON output")]
        json: bool,
    },

    // ===== Servers =====
    /// Start the matching HTTP API
    #[cfg(feature = "server")]
    Serve {
        #[arg(long, help = "Bind address")]
        host: Option<String>,
        #[arg(long, short, help = "Port")]
        port: Option<u16>,
    },
    /// Start a local index service backed by SQLite
    #[cfg(feature = "server")]
    #[command(name = "index-server")]
    IndexServer {
        #[arg(long, help = "Database file (default: data/index.db)")]
        db: Option<PathBuf>,
        #[arg(long, short, default_value_t = 8080, help = "Port")]
        port: u16,
        #[arg(long, help = "Keep every write instead of overwriting by id")]
        append: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        settings.log_level = Some(level);
    }
    init_logging(settings.log_level())?;

    match cli.command {
        Commands::Index { json } => commands::index::run(&settings, json).await,
        Commands::Ingest { kind, source, json } => {
            commands::ingest::run(&settings, kind, source, json).await
        }
        Commands::Match {
            text,
            file,
            kind,
            limit,
            json,
        } => commands::matching::run(&settings, text, file, kind, limit, json).await,

        #[cfg(feature = "server")]
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                settings.server.host = host;
            }
            if let Some(port) = port {
                settings.server.port = port;
            }
            commands::serve::run_api(&settings).await
        }
        #[cfg(feature = "server")]
        Commands::IndexServer { db, port, append } => {
            let write_mode = if append {
                resume_match::search::index::WriteMode::Append
            } else {
                settings.index.write_mode
            };
            commands::serve::run_index_server(&settings, db, port, write_mode).await
        }
    }
}
