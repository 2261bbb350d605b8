//! Presentation helpers for app listings.
use crate::types::App;
use chrono::{DateTime, NaiveDateTime, Utc};
use clap::ValueEnum;

/// The two app groups shown by the listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AppStateFilter {
    Deployed,
    Stopped,
}

impl AppStateFilter {
    pub fn matches(&self, app: &App) -> bool {
        let wanted = match self {
            AppStateFilter::Deployed => "deployed",
            AppStateFilter::Stopped => "stopped",
        };
        app.state.eq_ignore_ascii_case(wanted)
    }
}

pub fn filter_apps(apps: &[App], filter: AppStateFilter) -> Vec<&App> {
    apps.iter().filter(|app| filter.matches(app)).collect()
}

/// The time shown next to an app: when it stopped, or when it was created if still running.
pub fn reference_time(app: &App) -> &str {
    if app.state.eq_ignore_ascii_case("stopped") {
        app.stopped_at.as_deref().unwrap_or(&app.created_at)
    } else {
        &app.created_at
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

/// Renders `raw` relative to `now`, e.g. "5 minutes ago". Unparseable input is returned as is.
pub fn format_relative_time(raw: &str, now: DateTime<Utc>) -> String {
    let Some(then) = parse_timestamp(raw) else {
        return raw.to_string();
    };

    let seconds = (now - then).num_seconds();
    if seconds < 0 {
        return "just now".to_string();
    }

    let units = [
        (365 * 24 * 3600, "year"),
        (30 * 24 * 3600, "month"),
        (7 * 24 * 3600, "week"),
        (24 * 3600, "day"),
        (3600, "hour"),
        (60, "minute"),
    ];
    for (size, name) in units {
        let count = seconds / size;
        if count >= 1 {
            let plural = if count == 1 { "" } else { "s" };
            return format!("{} {}{} ago", count, name, plural);
        }
    }
    "just now".to_string()
}
