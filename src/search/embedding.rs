//! Embeddings and the provider contract.
//!
//! The local provider is a Harmonic Token Projection (HTP) embedder:
//! "Harmonic Token Projection: A Vocabulary-Free, Training-Free,
//!  Deterministic, and Reversible Embedding Methodology"
//! https://arxiv.org/html/2511.20665
//!
//! Key properties:
//! - No neural network or model download
//! - Deterministic (same input → same output)
//! - Unicode-based (multilingual support)
//! - Fast enough to embed whole resumes inline

use std::f64::consts::PI;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{MatchError, Result};

/// Embedding dimension (2 * number of coprime moduli)
pub const EMBEDDING_DIM: usize = 384;

/// Number of coprime moduli for harmonic projection
const NUM_MODULI: usize = EMBEDDING_DIM / 2;

/// Maximum token length (Unicode code points)
const MAX_TOKEN_LENGTH: usize = 64;

/// Bump when tokenization or projection changes.
pub const HTP_VERSION: &str = "htp-v1";

/// First NUM_MODULI primes, pairwise coprime by construction
static COPRIME_MODULI: &[u64] = &[
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71,
    73, 79, 83, 89, 97, 101, 103, 107, 109, 113, 127, 131, 137, 139, 149, 151,
    157, 163, 167, 173, 179, 181, 191, 193, 197, 199, 211, 223, 227, 229, 233,
    239, 241, 251, 257, 263, 269, 271, 277, 281, 283, 293, 307, 311, 313, 317,
    331, 337, 347, 349, 353, 359, 367, 373, 379, 383, 389, 397, 401, 409, 419,
    421, 431, 433, 439, 443, 449, 457, 461, 463, 467, 479, 487, 491, 499, 503,
    509, 521, 523, 541, 547, 557, 563, 569, 571, 577, 587, 593, 599, 601, 607,
    613, 617, 619, 631, 641, 643, 647, 653, 659, 661, 673, 677, 683, 691, 701,
    709, 719, 727, 733, 739, 743, 751, 757, 761, 769, 773, 787, 797, 809, 811,
    821, 823, 827, 829, 839, 853, 857, 859, 863, 877, 881, 883, 887, 907, 911,
    919, 929, 937, 941, 947, 953, 967, 971, 977, 983, 991, 997, 1009, 1013,
    1019, 1021, 1031, 1033, 1039, 1049, 1051, 1061, 1063, 1069, 1087, 1091,
    1093, 1097, 1103, 1109, 1117, 1123, 1129, 1151, 1153, 1163, 1171, 1181,
];

lazy_static! {
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").unwrap();
}

/// Collapse whitespace runs and trim. `None` when nothing is left.
pub fn normalize_text(text: &str) -> Option<String> {
    let collapsed = WHITESPACE_RE.replace_all(text.trim(), " ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed.into_owned())
    }
}

/// Normalized text or `InvalidInput` for blank input.
pub fn require_text(text: &str) -> Result<String> {
    normalize_text(text)
        .ok_or_else(|| MatchError::InvalidInput("text is empty after normalization".to_string()))
}

/// Fixed-length vector representing a document's content.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f32> {
        self.values
    }

    pub fn cosine_similarity(&self, other: &Embedding) -> f32 {
        cosine_similarity(&self.values, &other.values)
    }
}

/// Maps text to a fixed-dimension vector.
///
/// Implementations must be deterministic for identical input under the same
/// [`version`](EmbeddingProvider::version), reject blank text with
/// `InvalidInput`, and report an unreachable backend as `ProviderUnavailable`
/// rather than returning a placeholder vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn dimension(&self) -> usize;

    /// Model and preprocessing version the vectors were produced with.
    fn version(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Embedding>;
}

/// Local HTP embedder
pub struct HtpEmbedder {
    moduli: Vec<u64>,
}

impl HtpEmbedder {
    pub fn new() -> Self {
        Self {
            moduli: COPRIME_MODULI[..NUM_MODULI].to_vec(),
        }
    }

    /// Synchronous embedding.
    ///
    /// 1. Tokenize into lowercase words
    /// 2. Project each token onto one unit circle per modulus
    /// 3. Mean-pool token vectors
    /// 4. L2 normalize
    pub fn embed_sync(&self, text: &str) -> Result<Embedding> {
        let normalized = require_text(text)?;
        let tokens = tokenize(&normalized);
        if tokens.is_empty() {
            return Err(MatchError::InvalidInput(
                "text contains no tokens".to_string(),
            ));
        }

        let mut pooled = vec![0.0f64; EMBEDDING_DIM];
        for token in &tokens {
            for (slot, val) in pooled.iter_mut().zip(self.project_token(token)) {
                *slot += val;
            }
        }

        let count = tokens.len() as f64;
        pooled.iter_mut().for_each(|v| *v /= count);

        let norm = pooled.iter().map(|x| x * x).sum::<f64>().sqrt();
        // Mean of unit-circle points only vanishes for contrived inputs
        if norm == 0.0 {
            return Err(MatchError::InvalidInput(
                "text produced a degenerate embedding".to_string(),
            ));
        }

        Ok(Embedding::new(
            pooled.iter().map(|x| (x / norm) as f32).collect(),
        ))
    }

    /// E_i = [sin(2πr_i/m_i), cos(2πr_i/m_i)] with r_i = N mod m_i
    fn project_token(&self, token: &str) -> Vec<f64> {
        let n = token_to_integer(token);
        let mut projected = Vec::with_capacity(EMBEDDING_DIM);

        for &m in &self.moduli {
            let theta = 2.0 * PI * ((n % m) as f64) / (m as f64);
            projected.push(theta.sin());
            projected.push(theta.cos());
        }

        projected
    }
}

impl Default for HtpEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for HtpEmbedder {
    fn dimension(&self) -> usize {
        EMBEDDING_DIM
    }

    fn version(&self) -> &str {
        HTP_VERSION
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        self.embed_sync(text)
    }
}

/// N = Σ u_j * B^(L-j) with B = 2^16, wrapping on overflow
fn token_to_integer(token: &str) -> u64 {
    token
        .chars()
        .take(MAX_TOKEN_LENGTH)
        .fold(0u64, |n, c| n.wrapping_mul(65536).wrapping_add(c as u64))
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
        .collect()
}

/// Cosine similarity; 0.0 for mismatched lengths or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a > 0.0 && norm_b > 0.0 {
        dot / (norm_a * norm_b)
    } else {
        0.0
    }
}
