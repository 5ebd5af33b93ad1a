pub mod engine;
pub mod matcher;
pub mod result_aggregator;
pub mod runner;
pub mod semaphore;

use serde::{Deserialize, Serialize};

/// Outcome of evaluating one module against one concrete URL.
///
/// A finding is produced for every evaluated path whether or not it hit;
/// consumers filter on `hit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub module: String,
    pub url: String,
    /// Number of positive rules that matched.
    pub matches: usize,
    pub hit: bool,
    pub message: String,
}

impl std::fmt::Display for Finding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}
