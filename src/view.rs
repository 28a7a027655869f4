//! Pure projection of a [`ViewState`] into what the terminal draws.
//!
//! Nothing here does I/O or reads the clock; the same state always yields the
//! same [`DashboardView`].

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};

use crate::models::{DownloadRecord, DownloadStatus, ViewState};

pub const TITLE: &str = "KafkaSync";
pub const SUBTITLE: &str = "Real-time file synchronization monitor";
pub const ONLINE_LABEL: &str = "System Online";
pub const ERROR_TITLE: &str = "Connection Error";
pub const RETRY_LABEL: &str = "Retry Connection";
pub const LOADING_MESSAGE: &str = "Loading download history...";
pub const EMPTY_MESSAGE: &str = "No downloads found in database.";
pub const NOT_AVAILABLE: &str = "N/A";
pub const FILE_ICON: &str = "\u{1F4C4}";

const HASH_PREFIX_CHARS: usize = 8;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const CLOCK_FORMAT: &str = "%H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardView {
    pub header: Header,
    pub body: Body,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub title: &'static str,
    pub subtitle: &'static str,
    pub online_label: &'static str,
    pub record_count: usize,
    /// `"Last updated: HH:MM:SS"`
    pub last_updated: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Error {
        title: &'static str,
        message: String,
        retry_label: &'static str,
    },
    Loading(&'static str),
    Empty(&'static str),
    Table(Vec<Row>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub id: String,
    pub icon: &'static str,
    pub filename: String,
    pub hash: String,
    pub remote_location: String,
    pub status: String,
    pub badge: BadgeStyle,
    pub timestamp: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BadgeStyle {
    Green,
    Red,
    Yellow,
    Gray,
}

impl DashboardView {
    pub fn is_error(&self) -> bool {
        return matches!(self.body, Body::Error { .. });
    }
}

impl Header {
    pub fn files_processed(&self) -> String {
        return format!("{} Files Processed", self.record_count);
    }
}

/// Renders `state` with timestamps in the local time zone.
pub fn render(state: &ViewState) -> DashboardView {
    return render_in(state, &Local);
}

/// Renders `state` with timestamps converted to `tz`.
pub fn render_in<Tz>(state: &ViewState, tz: &Tz) -> DashboardView
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let header = Header {
        title: TITLE,
        subtitle: SUBTITLE,
        online_label: ONLINE_LABEL,
        record_count: state.records.len(),
        last_updated: format!(
            "Last updated: {}",
            state.last_updated.with_timezone(tz).format(CLOCK_FORMAT)
        ),
    };

    let body = if let Some(message) = &state.last_error {
        Body::Error { title: ERROR_TITLE, message: message.clone(), retry_label: RETRY_LABEL }
    } else if state.records.is_empty() && state.is_loading {
        Body::Loading(LOADING_MESSAGE)
    } else if state.records.is_empty() {
        Body::Empty(EMPTY_MESSAGE)
    } else {
        Body::Table(state.records.iter().map(|record| render_row(record, tz)).collect())
    };

    return DashboardView { header, body };
}

fn render_row<Tz>(record: &DownloadRecord, tz: &Tz) -> Row
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    return Row {
        id: format!("#{}", record.id),
        icon: FILE_ICON,
        filename: record.filename.clone(),
        hash: hash_display(record.hash.as_deref()),
        remote_location: record.remote_location.clone(),
        status: record.status.to_string(),
        badge: badge_style(&record.status),
        timestamp: timestamp_display(record.downloaded_at.as_deref(), tz),
    };
}

/// Every status maps to a badge; unknown tags are gray.
pub fn badge_style(status: &DownloadStatus) -> BadgeStyle {
    return match status {
        DownloadStatus::Completed => BadgeStyle::Green,
        DownloadStatus::Failed => BadgeStyle::Red,
        DownloadStatus::Missing => BadgeStyle::Yellow,
        DownloadStatus::Other(_) => BadgeStyle::Gray,
    };
}

/// First eight characters and an ellipsis. Short hashes are shown whole,
/// absent or blank ones as `N/A`.
pub fn hash_display(hash: Option<&str>) -> String {
    let hash = match hash.map(str::trim) {
        Some(hash) if !hash.is_empty() => hash,
        _ => return NOT_AVAILABLE.to_string(),
    };

    return match hash.char_indices().nth(HASH_PREFIX_CHARS) {
        Some((cut, _)) => format!("{}...", &hash[..cut]),
        None => hash.to_string(),
    };
}

/// Formats a server timestamp in `tz`. Empty or missing values are `N/A`;
/// values that cannot be parsed are shown as sent.
pub fn timestamp_display<Tz>(raw: Option<&str>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let raw = match raw.map(str::trim) {
        Some(raw) if !raw.is_empty() => raw,
        _ => return NOT_AVAILABLE.to_string(),
    };

    return match parse_timestamp(raw) {
        Some(at) => at.with_timezone(tz).format(TIMESTAMP_FORMAT).to_string(),
        None => raw.to_string(),
    };
}

/// Accepts RFC 3339 and the text forms Postgres produces for `timestamp`/`timestamptz`.
/// Timestamps without an offset are taken as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<chrono::FixedOffset>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at);
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"] {
        if let Ok(at) = DateTime::parse_from_str(raw, format) {
            return Some(at);
        }
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc().fixed_offset());
        }
    }
    return None;
}
