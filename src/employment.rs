//! Employment interval index
//!
//! Answers "who is employed when" from hire/termination records. Every
//! employment test in the engine goes through this index so the half-open
//! `[hire_date, termination_date)` boundary is applied the same way for
//! every metric.

use crate::types::EmploymentRecord;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

/// A single half-open employment interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Interval {
    hire_date: NaiveDate,
    termination_date: Option<NaiveDate>,
}

impl Interval {
    /// Employed on at least one day of `[window_start, window_end]`.
    fn overlaps(&self, window_start: NaiveDate, window_end: NaiveDate) -> bool {
        self.hire_date <= window_end
            && self
                .termination_date
                .map_or(true, |terminated| terminated > window_start)
    }
}

/// Per-employee employment intervals, keyed by employee id.
#[derive(Debug, Clone, Default)]
pub struct EmploymentIndex {
    intervals: BTreeMap<String, Vec<Interval>>,
    /// Unit of the most recent hire per employee
    units: BTreeMap<String, Option<String>>,
}

impl EmploymentIndex {
    /// Build the index. Rehires contribute additional intervals; the unit of
    /// the latest hire wins.
    pub fn build(records: &[EmploymentRecord]) -> Self {
        let mut intervals: BTreeMap<String, Vec<Interval>> = BTreeMap::new();
        let mut latest_hire: BTreeMap<String, (NaiveDate, Option<String>)> = BTreeMap::new();

        for record in records {
            intervals
                .entry(record.emp_id.clone())
                .or_default()
                .push(Interval {
                    hire_date: record.hire_date,
                    termination_date: record.termination_date,
                });

            let replace = latest_hire
                .get(&record.emp_id)
                .map_or(true, |(hired, _)| record.hire_date >= *hired);
            if replace {
                latest_hire.insert(
                    record.emp_id.clone(),
                    (record.hire_date, record.unit_id.clone()),
                );
            }
        }

        for list in intervals.values_mut() {
            list.sort_by_key(|i| (i.hire_date, i.termination_date));
        }

        let units = latest_hire
            .into_iter()
            .map(|(emp_id, (_, unit))| (emp_id, unit))
            .collect();

        Self { intervals, units }
    }

    /// Employed on `at_date`.
    pub fn is_employed(&self, emp_id: &str, at_date: NaiveDate) -> bool {
        self.is_employed_during(emp_id, at_date, at_date)
    }

    /// Employed on at least one day of `[window_start, window_end]`.
    pub fn is_employed_during(
        &self,
        emp_id: &str,
        window_start: NaiveDate,
        window_end: NaiveDate,
    ) -> bool {
        self.intervals
            .get(emp_id)
            .is_some_and(|list| list.iter().any(|i| i.overlaps(window_start, window_end)))
    }

    /// Everyone employed on at least one day of `[window_start, window_end]`:
    /// `hire_date <= window_end && (termination_date is null || termination_date > window_start)`.
    pub fn employed_during(
        &self,
        window_start: NaiveDate,
        window_end: NaiveDate,
    ) -> BTreeSet<&str> {
        self.intervals
            .iter()
            .filter(|(_, list)| list.iter().any(|i| i.overlaps(window_start, window_end)))
            .map(|(emp_id, _)| emp_id.as_str())
            .collect()
    }

    /// Unit of the employee's latest hire.
    pub fn unit_of(&self, emp_id: &str) -> Option<&str> {
        self.units.get(emp_id).and_then(|unit| unit.as_deref())
    }

    pub fn contains(&self, emp_id: &str) -> bool {
        self.intervals.contains_key(emp_id)
    }

    /// All known employee ids, ascending.
    pub fn employees(&self) -> impl Iterator<Item = &str> {
        self.intervals.keys().map(String::as_str)
    }

    /// Earliest hire date and latest hire or termination date.
    pub fn span(&self) -> Option<(NaiveDate, NaiveDate)> {
        let all = self.intervals.values().flatten();
        let min = all.clone().map(|i| i.hire_date).min()?;
        let max = all
            .map(|i| i.termination_date.map_or(i.hire_date, |t| t.max(i.hire_date)))
            .max()?;
        Some((min, max))
    }

    /// Earliest hire date per employee.
    pub fn first_hire_dates(&self) -> impl Iterator<Item = (&str, NaiveDate)> {
        self.intervals
            .iter()
            .filter_map(|(emp_id, list)| list.first().map(|i| (emp_id.as_str(), i.hire_date)))
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }
}
