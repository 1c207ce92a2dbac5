//! Metric aggregators
//!
//! Each aggregator turns calendar buckets plus the shared employment and org
//! indexes into one result table. Buckets carry no data dependency on each
//! other, except month-over-month retention which walks months in order.

pub mod activity;
pub mod cohort;
pub mod coverage;
pub mod messages;

pub use activity::ActivityAggregator;
pub use cohort::CohortAnalyzer;
pub use coverage::CoverageAggregator;
pub use messages::MessageAggregator;

use crate::types::ActivationEvent;
use chrono::NaiveDate;
use std::collections::HashMap;

/// Earliest activation date per employee.
pub fn first_activation_dates(events: &[ActivationEvent]) -> HashMap<String, NaiveDate> {
    let mut first: HashMap<String, NaiveDate> = HashMap::new();
    for event in events {
        let date = event.activated_at.date();
        first
            .entry(event.emp_id.clone())
            .and_modify(|existing| {
                if date < *existing {
                    *existing = date;
                }
            })
            .or_insert(date);
    }
    first
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::types::{ActivationEvent, EmploymentRecord, MessageEvent};
    use chrono::NaiveDate;

    pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    pub fn hire(
        emp: &str,
        hired: NaiveDate,
        terminated: Option<NaiveDate>,
        unit: &str,
    ) -> EmploymentRecord {
        EmploymentRecord {
            emp_id: emp.to_string(),
            hire_date: hired,
            termination_date: terminated,
            unit_id: Some(unit.to_string()),
        }
    }

    pub fn activation(emp: &str, date: NaiveDate) -> ActivationEvent {
        ActivationEvent {
            emp_id: emp.to_string(),
            activated_at: date.and_hms_opt(9, 0, 0).unwrap(),
        }
    }

    pub fn message(sender: &str, date: NaiveDate) -> MessageEvent {
        MessageEvent {
            sender_emp_id: sender.to_string(),
            sent_at: date.and_hms_opt(14, 30, 0).unwrap(),
        }
    }

    /// `count` messages from `sender` on `date`.
    pub fn messages(sender: &str, date: NaiveDate, count: usize) -> Vec<MessageEvent> {
        (0..count).map(|_| message(sender, date)).collect()
    }
}
