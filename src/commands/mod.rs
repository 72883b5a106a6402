pub mod index;
pub mod ingest;
pub mod matching;
#[cfg(feature = "server")]
pub mod serve;
