//! Leaderboard Persistence
//!
//! The leaderboard is a single pretty-printed JSON array kept sorted by
//! descending score. Every write rewrites the whole document through a
//! temporary file and a rename, and writers are serialized by a mutex, so
//! concurrent saves never lose entries and readers never see a torn file.

use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::{
    cmp::Ordering,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Name recorded when the player leaves it blank.
pub const ANONYMOUS_NAME: &str = "名無し";

/// One leaderboard row.
///
/// Rows are kept exactly as stored. Older boards may hold a `null` name or a
/// non-numeric score; those rows are listed unchanged and rank as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingEntry {
    pub name: Option<String>,
    /// Kept as the JSON number the client sent, integer or float.
    pub score: Value,
    /// ISO-8601 local time of the save.
    pub timestamp: String,
}

impl RankingEntry {
    fn score_value(&self) -> f64 {
        self.score.as_f64().unwrap_or(0.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RankingError {
    #[error("ranking storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("ranking storage is not a valid leaderboard: {0}")]
    Json(#[from] serde_json::Error),
}

/// A file-backed leaderboard.
pub struct RankingStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl RankingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records a score and returns the stored entry.
    pub async fn add_entry(
        &self,
        name: Option<String>,
        score: Option<Number>,
    ) -> Result<RankingEntry, RankingError> {
        let _guard = self.write_lock.lock().await;

        let entry = RankingEntry {
            name: Some(name.unwrap_or_else(|| ANONYMOUS_NAME.to_string())),
            score: Value::Number(score.unwrap_or_else(|| Number::from(0))),
            timestamp: Local::now().to_rfc3339(),
        };

        let mut ranking = self.load().await?;
        ranking.push(entry.clone());
        // Stable, so equal scores keep their insertion order.
        ranking.sort_by(|a, b| {
            b.score_value()
                .partial_cmp(&a.score_value())
                .unwrap_or(Ordering::Equal)
        });
        self.persist(&ranking).await?;

        info!(name = ?entry.name, score = %entry.score, total = ranking.len(), "Saved ranking entry");
        Ok(entry)
    }

    /// Returns the leaderboard as stored; a missing file is an empty board.
    pub async fn list_all(&self) -> Result<Vec<RankingEntry>, RankingError> {
        self.load().await
    }

    async fn load(&self) -> Result<Vec<RankingEntry>, RankingError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No ranking file yet");
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn persist(&self, ranking: &[RankingEntry]) -> Result<(), RankingError> {
        let json = serde_json::to_vec_pretty(ranking)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
