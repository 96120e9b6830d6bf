//! Due-date status derivation shared by assignments, track assignments and
//! deficiency boards.
//!
//! A record is `completed` when its raw status says so, `on_track` when it
//! has no usable due date, and otherwise classified by whole days between
//! `today` and the due date: negative is `overdue`, `0..=window` is
//! `due_soon`, anything later is `on_track`.

use crate::types::{normalize_token, DueStatus};
use chrono::NaiveDate;

/// Default width of the due-soon window, in days.
pub const DUE_SOON_DAYS: i64 = 30;

/// True when `raw` normalizes to a completion word.
pub fn is_completed_status(raw: &str) -> bool {
    matches!(
        normalize_token(raw).as_str(),
        "completed" | "complete" | "done" | "resolved"
    )
}

/// Parse a date-only or timestamp string into a calendar date.
///
/// Timestamps are cut to their `YYYY-MM-DD` prefix so the comparison is made
/// on the calendar day written in the record, not on a time-zone shifted
/// instant. Returns `None` for empty or malformed input.
pub fn parse_due_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let date_part = raw.get(..10)?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// Classify a record from its raw status and raw due date.
pub fn derive_status(status: Option<&str>, due_date: Option<&str>, today: NaiveDate) -> DueStatus {
    derive_status_with_window(status, due_date, today, DUE_SOON_DAYS)
}

pub fn derive_status_with_window(
    status: Option<&str>,
    due_date: Option<&str>,
    today: NaiveDate,
    window_days: i64,
) -> DueStatus {
    let completed = status.is_some_and(is_completed_status);
    let due = due_date.and_then(parse_due_date);
    classify(completed, due, today, window_days)
}

/// Typed variant used by the store, where due dates are already parsed.
pub fn derive_for_date(
    completed: bool,
    due: Option<NaiveDate>,
    today: NaiveDate,
    window_days: i64,
) -> DueStatus {
    classify(completed, due, today, window_days)
}

fn classify(completed: bool, due: Option<NaiveDate>, today: NaiveDate, window_days: i64) -> DueStatus {
    if completed {
        return DueStatus::Completed;
    }
    let Some(due) = due else {
        return DueStatus::OnTrack;
    };
    let days = (due - today).num_days();
    if days < 0 {
        DueStatus::Overdue
    } else if days <= window_days {
        DueStatus::DueSoon
    } else {
        DueStatus::OnTrack
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
