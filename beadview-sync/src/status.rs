//! Status line state: counts, last refresh time and the last fetch error.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshStatus {
    last_refresh: Option<DateTime<Utc>>,
    last_error: Option<String>,
    refreshing: bool,
    filtered: bool,
    shown: usize,
    total: usize,
}

impl RefreshStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_refresh(&mut self) {
        self.refreshing = true;
    }

    /// A fetch landed. Clears any previous error.
    pub fn record_success(&mut self, at: DateTime<Utc>, shown: usize, total: usize) {
        self.last_refresh = Some(at);
        self.last_error = None;
        self.refreshing = false;
        self.shown = shown;
        self.total = total;
    }

    /// A fetch failed. Counts and refresh time keep describing the rows
    /// still on screen.
    pub fn record_failure(&mut self, detail: impl Into<String>) {
        self.last_error = Some(detail.into());
        self.refreshing = false;
    }

    /// Counts changed without a fetch (filter edits).
    pub fn set_counts(&mut self, shown: usize, total: usize) {
        self.shown = shown;
        self.total = total;
    }

    pub fn set_filtered(&mut self, filtered: bool) {
        self.filtered = filtered;
    }

    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.last_refresh
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_filtered(&self) -> bool {
        self.filtered
    }

    /// `"Showing 3 of 10 issues"` when rows are hidden, else `"10 issues"`.
    pub fn counts_line(&self) -> String {
        if self.total > 0 && self.shown != self.total {
            format!("Showing {} of {} issues", self.shown, self.total)
        } else {
            format!("{} issues", self.shown)
        }
    }

    pub fn refresh_line(&self, now: DateTime<Utc>) -> String {
        if self.refreshing {
            return "Refreshing...".to_string();
        }
        match self.last_refresh {
            Some(at) => format!("Last refresh: {} ago", format_age(at, now)),
            None => "Last refresh: never".to_string(),
        }
    }

    /// Full one-line summary, error last.
    pub fn line(&self, now: DateTime<Utc>) -> String {
        let mut parts = vec![self.counts_line()];
        if self.filtered {
            parts.push("filtered".to_string());
        }
        parts.push(self.refresh_line(now));
        if let Some(err) = &self.last_error {
            parts.push(format!("error: {err}"));
        }
        parts.join("  |  ")
    }
}

/// Compact age between two instants; future timestamps read as `0s`.
pub fn format_age(since: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let age = now.signed_duration_since(since).num_seconds().max(0) as u64;
    format_seconds(age)
}

pub fn format_seconds(seconds: u64) -> String {
    if seconds < 60 {
        return format!("{seconds}s");
    }
    if seconds < 60 * 60 {
        return format!("{}m", seconds / 60);
    }
    if seconds < 60 * 60 * 24 {
        return format!("{}h", seconds / (60 * 60));
    }
    format!("{}d", seconds / (60 * 60 * 24))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn seconds_buckets() {
        assert_eq!(format_seconds(0), "0s");
        assert_eq!(format_seconds(59), "59s");
        assert_eq!(format_seconds(60), "1m");
        assert_eq!(format_seconds(3_599), "59m");
        assert_eq!(format_seconds(3_600), "1h");
        assert_eq!(format_seconds(86_400 * 3 + 5), "3d");
    }

    #[test]
    fn future_timestamp_is_zero() {
        assert_eq!(format_age(t0() + Duration::seconds(30), t0()), "0s");
    }

    #[test]
    fn counts_line_mentions_hidden_rows() {
        let mut status = RefreshStatus::new();
        status.record_success(t0(), 3, 10);
        assert_eq!(status.counts_line(), "Showing 3 of 10 issues");
        status.set_counts(10, 10);
        assert_eq!(status.counts_line(), "10 issues");
        status.set_counts(0, 0);
        assert_eq!(status.counts_line(), "0 issues");
    }

    #[test]
    fn refresh_line_tracks_state() {
        let mut status = RefreshStatus::new();
        assert_eq!(status.refresh_line(t0()), "Last refresh: never");
        status.begin_refresh();
        assert_eq!(status.refresh_line(t0()), "Refreshing...");
        status.record_success(t0(), 1, 1);
        assert_eq!(
            status.refresh_line(t0() + Duration::seconds(12)),
            "Last refresh: 12s ago"
        );
    }

    #[test]
    fn failure_keeps_counts_and_is_cleared_by_success() {
        let mut status = RefreshStatus::new();
        status.record_success(t0(), 2, 4);
        status.record_failure("bd exited with status 1");
        assert_eq!(status.last_error(), Some("bd exited with status 1"));
        assert_eq!(status.counts_line(), "Showing 2 of 4 issues");
        assert!(status.line(t0()).ends_with("error: bd exited with status 1"));
        status.record_success(t0(), 2, 4);
        assert!(status.last_error().is_none());
    }
}
