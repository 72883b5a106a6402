use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{MatchError, Result};

/// Which side of the match a document sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Resume,
    Job,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resume => "resume",
            Self::Job => "job",
        }
    }

    /// File extensions picked up when ingesting a directory of this kind.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Job => &["txt"],
            Self::Resume => &["pdf", "txt"],
        }
    }

    /// The kind a query of this kind is usually matched against.
    pub fn counterpart(&self) -> Self {
        match self {
            Self::Resume => Self::Job,
            Self::Job => Self::Resume,
        }
    }

    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions().iter().any(|x| e.eq_ignore_ascii_case(x)))
            .unwrap_or(false)
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentKind {
    type Err = MatchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "resume" => Ok(Self::Resume),
            "job" => Ok(Self::Job),
            other => Err(MatchError::InvalidInput(format!(
                "unknown document kind '{}' (must be: resume|job)",
                other
            ))),
        }
    }
}

/// A source document with its extracted text.
#[derive(Debug, Clone)]
pub struct Document {
    /// Filename including extension; doubles as the index record id.
    pub id: String,
    pub kind: DocumentKind,
    pub raw_text: String,
    pub path: PathBuf,
}

impl Document {
    pub async fn load(path: &Path, kind: DocumentKind) -> Result<Self> {
        let id = file_name(path)?;
        let is_pdf = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);

        let raw_text = if is_pdf {
            extract_pdf_text(path).await?
        } else {
            read_plain_text(path).await?
        };

        debug!(id = %id, kind = %kind, chars = raw_text.len(), "Loaded document");

        Ok(Self {
            id,
            kind,
            raw_text,
            path: path.to_path_buf(),
        })
    }

    pub fn filename(&self) -> &str {
        &self.id
    }
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(String::from)
        .ok_or_else(|| MatchError::Extraction {
            path: path.display().to_string(),
            reason: "file name is not valid UTF-8".to_string(),
        })
}

async fn read_plain_text(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| extraction_error(path, e))?;
    String::from_utf8(bytes).map_err(|e| extraction_error(path, e))
}

async fn extract_pdf_text(path: &Path) -> Result<String> {
    let owned = path.to_path_buf();
    // pdf-extract is synchronous and may panic on malformed files
    let joined = tokio::task::spawn_blocking(move || pdf_extract::extract_text(&owned)).await;

    match joined {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(extraction_error(path, e)),
        Err(e) => Err(extraction_error(path, format!("extractor aborted: {}", e))),
    }
}

fn extraction_error(path: &Path, reason: impl fmt::Display) -> MatchError {
    MatchError::Extraction {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

/// List the documents of `kind` directly inside `source`, sorted by filename.
pub fn discover_documents(source: &Path, kind: DocumentKind) -> Result<Vec<PathBuf>> {
    if !source.is_dir() {
        return Err(MatchError::SourceNotFound(source.to_path_buf()));
    }

    let mut paths = Vec::new();
    for entry in WalkDir::new(source)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            // depth 0 errors mean the directory itself could not be read
            Err(e) if e.depth() == 0 => {
                return Err(MatchError::SourceNotFound(source.to_path_buf()))
            }
            Err(_) => continue,
        };

        if entry.file_type().is_file() && kind.accepts(entry.path()) {
            paths.push(entry.into_path());
        }
    }

    Ok(paths)
}
