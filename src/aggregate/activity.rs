//! Daily active rate over working days

use crate::employment::EmploymentIndex;
use crate::rate::safe_percentage;
use crate::types::{ActivationEvent, ActiveRateRow, DayBucket};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

/// Aggregator for the daily active rate table
pub struct ActivityAggregator;

impl ActivityAggregator {
    /// One row per day in `days`.
    ///
    /// `active_users` counts distinct employees with at least one event that
    /// day who are also employed that day, so it never exceeds
    /// `total_employees`. Days with nobody employed still produce a row.
    pub fn daily(
        days: &[DayBucket],
        index: &EmploymentIndex,
        events: &[ActivationEvent],
    ) -> Vec<ActiveRateRow> {
        let mut by_day: BTreeMap<NaiveDate, BTreeSet<&str>> = BTreeMap::new();
        for event in events {
            by_day
                .entry(event.activated_at.date())
                .or_default()
                .insert(event.emp_id.as_str());
        }

        days.iter()
            .map(|day| {
                let date = day.calendar_date;
                let total = index.employed_during(date, date).len();
                let active = by_day
                    .get(&date)
                    .map(|emps| emps.iter().filter(|emp| index.is_employed(emp, date)).count())
                    .unwrap_or(0);

                ActiveRateRow {
                    calendar_date: date,
                    active_users: active,
                    total_employees: total,
                    active_rate_percent: safe_percentage(active as u64, total as u64),
                }
            })
            .collect()
    }
}
