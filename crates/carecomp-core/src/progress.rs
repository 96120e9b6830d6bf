use crate::status::{derive_for_date, is_completed_status, parse_due_date, DUE_SOON_DAYS};
use crate::types::{AssignmentStatus, DueStatus};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Anything that carries a raw status and a due date.
pub trait StatusSource {
    fn raw_status(&self) -> Option<&str>;
    fn due_date(&self) -> Option<NaiveDate>;
}

/// Raw `(status, due_date)` string pairs, as read from loosely typed input.
impl StatusSource for (Option<String>, Option<String>) {
    fn raw_status(&self) -> Option<&str> {
        self.0.as_deref()
    }

    fn due_date(&self) -> Option<NaiveDate> {
        self.1.as_deref().and_then(parse_due_date)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub assigned: usize,
    pub in_progress: usize,
    pub completed: usize,
    /// Non-completed items past due. Overlaps the buckets above.
    pub overdue: usize,
    /// Non-completed items inside the due-soon window. Overlaps the buckets above.
    pub due_soon: usize,
    pub total: usize,
    pub completion_ratio: f64,
}

impl Progress {
    fn record(&mut self, status: Option<&str>, due: Option<NaiveDate>, today: NaiveDate, window: i64) {
        self.total += 1;
        match AssignmentStatus::bucket(status) {
            AssignmentStatus::Assigned => self.assigned += 1,
            AssignmentStatus::InProgress => self.in_progress += 1,
            AssignmentStatus::Completed => self.completed += 1,
        }
        let completed = status.is_some_and(is_completed_status);
        match derive_for_date(completed, due, today, window) {
            DueStatus::Overdue => self.overdue += 1,
            DueStatus::DueSoon => self.due_soon += 1,
            DueStatus::OnTrack | DueStatus::Completed => {}
        }
    }

    fn finish(mut self) -> Self {
        self.completion_ratio = if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64
        };
        self
    }

    /// Sum two aggregates, recomputing the ratio.
    pub fn merge(&self, other: &Progress) -> Progress {
        Progress {
            assigned: self.assigned + other.assigned,
            in_progress: self.in_progress + other.in_progress,
            completed: self.completed + other.completed,
            overdue: self.overdue + other.overdue,
            due_soon: self.due_soon + other.due_soon,
            total: self.total + other.total,
            completion_ratio: 0.0,
        }
        .finish()
    }
}

/// Aggregate a collection using the default due-soon window.
pub fn aggregate<T: StatusSource>(items: &[T], today: NaiveDate) -> Progress {
    aggregate_with_window(items, today, DUE_SOON_DAYS)
}

pub fn aggregate_with_window<T: StatusSource>(items: &[T], today: NaiveDate, window: i64) -> Progress {
    let mut p = Progress::default();
    for item in items {
        p.record(item.raw_status(), item.due_date(), today, window);
    }
    p.finish()
}

/// Aggregate per key (staff id, facility id, ...), keeping key order stable.
pub fn aggregate_by<T, K, F>(items: &[T], today: NaiveDate, window: i64, key: F) -> BTreeMap<K, Progress>
where
    T: StatusSource,
    K: Ord,
    F: Fn(&T) -> K,
{
    let mut out: BTreeMap<K, Progress> = BTreeMap::new();
    for item in items {
        out.entry(key(item)).or_default().record(
            item.raw_status(),
            item.due_date(),
            today,
            window,
        );
    }
    out.into_iter().map(|(k, p)| (k, p.finish())).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn item(status: &str, due: Option<&str>) -> (Option<String>, Option<String>) {
        (Some(status.to_string()), due.map(str::to_string))
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, 15).unwrap()
    }

    #[test]
    fn empty_input_has_zero_ratio() {
        let items: Vec<(Option<String>, Option<String>)> = Vec::new();
        let p = aggregate(&items, today());
        assert_eq!(p.total, 0);
        assert_eq!(p.completion_ratio, 0.0);
    }

    #[test]
    fn buckets_sum_to_total() {
        let items = vec![
            item("assigned", Some("2025-10-01")),
            item("in_progress", Some("2025-11-20")),
            item("completed", Some("2025-10-01")),
            item("done", None),
            item("weird", None),
        ];
        let p = aggregate(&items, today());
        assert_eq!(p.assigned + p.in_progress + p.completed, p.total);
        assert_eq!(p.total, 5);
        assert_eq!(p.completed, 2);
        assert_eq!(p.assigned, 2);
        assert_eq!(p.overdue, 1);
        assert_eq!(p.due_soon, 1);
        assert!((p.completion_ratio - 0.4).abs() < 1e-9);
    }

    #[test]
    fn ratio_stays_in_unit_interval() {
        let all_done = vec![item("completed", None), item("completed", None)];
        assert_eq!(aggregate(&all_done, today()).completion_ratio, 1.0);
        let none_done = vec![item("assigned", None)];
        assert_eq!(aggregate(&none_done, today()).completion_ratio, 0.0);
    }

    #[test]
    fn completed_items_are_never_overdue() {
        let items = vec![item("completed", Some("2000-01-01"))];
        assert_eq!(aggregate(&items, today()).overdue, 0);
    }

    #[test]
    fn aggregate_by_groups_and_merge_adds_up() {
        let items = vec![
            (Some("completed".to_string()), Some("a".to_string())),
            (Some("assigned".to_string()), Some("b".to_string())),
            (Some("assigned".to_string()), Some("a".to_string())),
        ];
        let grouped = aggregate_by(&items, today(), DUE_SOON_DAYS, |i| i.1.clone());
        assert_eq!(grouped.len(), 2);
        let a = &grouped[&Some("a".to_string())];
        assert_eq!(a.total, 2);
        assert_eq!(a.completion_ratio, 0.5);
        let b = &grouped[&Some("b".to_string())];
        let merged = a.merge(b);
        assert_eq!(merged.total, 3);
        assert!((merged.completion_ratio - 1.0 / 3.0).abs() < 1e-9);
    }
}
