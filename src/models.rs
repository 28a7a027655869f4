
use chrono::{DateTime, Local};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::FetchError;

/// Message shown in place of the table whenever the latest fetch failed.
pub const CONNECTION_ERROR_MESSAGE: &str = "Could not connect to API Server. Is it running?";

/// One row of `GET /api/downloads`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRecord {
    pub id: i64,
    pub filename: String,
    #[serde(default)]
    pub hash: Option<String>,
    pub remote_location: String,
    #[serde(default)]
    pub status: DownloadStatus,
    #[serde(default)]
    pub downloaded_at: Option<String>,
}

/// Outcome of a download as reported by the consumer.</br>
/// Any tag the dashboard does not know about is kept as [`DownloadStatus::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DownloadStatus {
    Completed,
    Failed,
    Missing,
    Other(String),
}

impl DownloadStatus {
    pub fn as_str(&self) -> &str {
        return match self {
            DownloadStatus::Completed => "COMPLETED",
            DownloadStatus::Failed => "FAILED",
            DownloadStatus::Missing => "MISSING",
            DownloadStatus::Other(tag) => tag,
        };
    }
}

impl From<String> for DownloadStatus {
    fn from(tag: String) -> Self {
        return match tag.as_str() {
            "COMPLETED" => DownloadStatus::Completed,
            "FAILED" => DownloadStatus::Failed,
            "MISSING" => DownloadStatus::Missing,
            _ => DownloadStatus::Other(tag),
        };
    }
}

/// An absent status is an unknown one.
impl Default for DownloadStatus {
    fn default() -> Self {
        return DownloadStatus::Other(String::new());
    }
}

impl Serialize for DownloadStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        return serializer.serialize_str(self.as_str());
    }
}

impl<'de> Deserialize<'de> for DownloadStatus {
    /// `null` is accepted so one bad row cannot fail the whole response.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = Option::<String>::deserialize(deserializer)?;
        return Ok(tag.map(DownloadStatus::from).unwrap_or_default());
    }
}

impl std::fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        return f.write_str(self.as_str());
    }
}

/// Everything the dashboard draws from.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub records: Vec<DownloadRecord>,
    /// True until the first fetch attempt has been applied.
    pub is_loading: bool,
    pub last_error: Option<String>,
    pub last_updated: DateTime<Local>,
    applied_seq: u64,
}

impl ViewState {
    pub fn new(now: DateTime<Local>) -> Self {
        return Self {
            records: vec![],
            is_loading: true,
            last_error: None,
            last_updated: now,
            applied_seq: 0,
        };
    }

    /// Sequence number of the fetch currently reflected in this state.
    pub fn applied_seq(&self) -> u64 {
        return self.applied_seq;
    }

    /// Applies the outcome of fetch `seq`.</br>
    /// Returns `false` and leaves the state untouched if a newer fetch has already been applied.
    pub fn apply(
        &mut self,
        seq: u64,
        outcome: &Result<Vec<DownloadRecord>, FetchError>,
        now: DateTime<Local>,
    ) -> bool {
        if seq <= self.applied_seq {
            return false;
        }

        match outcome {
            Ok(records) => {
                self.records = records.clone();
                self.last_error = None;
            }
            Err(_) => {
                self.last_error = Some(CONNECTION_ERROR_MESSAGE.to_owned());
            }
        }
        self.is_loading = false;
        self.last_updated = now;
        self.applied_seq = seq;
        return true;
    }
}

impl Default for ViewState {
    fn default() -> Self {
        return Self::new(Local::now());
    }
}
