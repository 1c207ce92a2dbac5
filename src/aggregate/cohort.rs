//! Activation and retention cohorts
//!
//! Activation cohorts group employees by hire month. Retention cohorts group
//! employees by the month they were active in and compare each month with
//! the one immediately before it, so months are processed in order.

use crate::calendar::{month_end_of, month_label, month_start_of, previous_month_start};
use crate::employment::EmploymentIndex;
use crate::org::{OrgHierarchyResolver, RootOrg};
use crate::rate::safe_percentage;
use crate::types::{
    ActivationCohortRow, ActivationEvent, OrgActivationCohortRow, OrgRetentionCohortRow,
    RetentionCohortRow,
};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Analyzer for monthly cohort tables
pub struct CohortAnalyzer;

impl CohortAnalyzer {
    /// Activation-within-hire-month rate for each month in `months` that has
    /// at least one hire. An employee's cohort is the month of their first hire.
    pub fn activation(
        months: &[NaiveDate],
        index: &EmploymentIndex,
        first_activation: &HashMap<String, NaiveDate>,
    ) -> Vec<ActivationCohortRow> {
        // hire month -> (new hires, activated within month)
        let mut cohorts: BTreeMap<NaiveDate, (usize, usize)> = BTreeMap::new();
        for (_, cohort, activated) in hire_cohorts(months, index, first_activation) {
            let entry = cohorts.entry(cohort).or_insert((0, 0));
            entry.0 += 1;
            entry.1 += usize::from(activated);
        }

        cohorts
            .into_iter()
            .map(|(month, (hires, activated))| ActivationCohortRow {
                hire_month: month,
                month_label: month_label(month),
                new_hires: hires,
                activated_within_month: activated,
                activation_rate_percent: safe_percentage(activated as u64, hires as u64),
            })
            .collect()
    }

    /// Activation cohorts split by the hire's root organization.
    ///
    /// Only (month, root) pairs with at least one hire produce a row.
    pub fn activation_by_org(
        months: &[NaiveDate],
        index: &EmploymentIndex,
        first_activation: &HashMap<String, NaiveDate>,
        resolver: &OrgHierarchyResolver,
    ) -> Vec<OrgActivationCohortRow> {
        let mut cohorts: BTreeMap<(NaiveDate, RootOrg), (usize, usize)> = BTreeMap::new();
        for (emp, cohort, activated) in hire_cohorts(months, index, first_activation) {
            let root = resolver.root_of(index.unit_of(emp));
            let entry = cohorts.entry((cohort, root)).or_insert((0, 0));
            entry.0 += 1;
            entry.1 += usize::from(activated);
        }

        cohorts
            .into_iter()
            .map(|((month, root), (hires, activated))| OrgActivationCohortRow {
                hire_month: month,
                month_label: month_label(month),
                root_org_id: root.root_org_id,
                root_org_name: root.root_org_name,
                new_hires: hires,
                activated_within_month: activated,
                activation_rate_percent: safe_percentage(activated as u64, hires as u64),
            })
            .collect()
    }

    /// Month-over-month retention for each month in `months`, in order.
    ///
    /// A user is active in a month with at least one event on a day they
    /// were employed. `events` must include the month before the first entry
    /// of `months`; when that month has no active users the first row reports
    /// a zero denominator and a null rate.
    pub fn retention(
        months: &[NaiveDate],
        index: &EmploymentIndex,
        events: &[ActivationEvent],
    ) -> Vec<RetentionCohortRow> {
        let active_by_month = active_users_by_month(index, events);
        let empty = BTreeSet::new();
        let mut rows = Vec::with_capacity(months.len());

        for month in months.iter().map(|m| month_start_of(*m)) {
            let current = active_by_month.get(&month).unwrap_or(&empty);
            let previous = active_by_month
                .get(&previous_month_start(month))
                .unwrap_or(&empty);
            let retained = current.intersection(previous).count();

            rows.push(RetentionCohortRow {
                activity_month: month,
                month_label: month_label(month),
                active_users: current.len(),
                previous_month_active_users: previous.len(),
                retained_users: retained,
                retention_rate_percent: safe_percentage(retained as u64, previous.len() as u64),
            });
        }

        rows
    }

    /// Retention per root organization.
    ///
    /// Emits every month for every root org with someone employed during
    /// the months, so an org with no activity in a month still gets a row.
    pub fn retention_by_org(
        months: &[NaiveDate],
        index: &EmploymentIndex,
        events: &[ActivationEvent],
        resolver: &OrgHierarchyResolver,
    ) -> Vec<OrgRetentionCohortRow> {
        let (Some(first), Some(last)) = (months.first(), months.last()) else {
            return Vec::new();
        };

        let roots: HashMap<&str, RootOrg> = index
            .employees()
            .map(|emp| (emp, resolver.root_of(index.unit_of(emp))))
            .collect();
        let observed: BTreeSet<&RootOrg> = index
            .employed_during(month_start_of(*first), month_end_of(*last))
            .into_iter()
            .filter_map(|emp| roots.get(emp))
            .collect();

        let active_by_month = active_users_by_month(index, events);
        let empty = BTreeSet::new();
        let mut rows = Vec::with_capacity(months.len() * observed.len());

        for month in months.iter().map(|m| month_start_of(*m)) {
            let current = active_by_month.get(&month).unwrap_or(&empty);
            let previous = active_by_month
                .get(&previous_month_start(month))
                .unwrap_or(&empty);

            for &root in &observed {
                let in_root = |emp: &&str| roots.get(emp) == Some(root);
                let current: BTreeSet<&str> = current.iter().copied().filter(in_root).collect();
                let previous: BTreeSet<&str> = previous.iter().copied().filter(in_root).collect();
                let retained = current.intersection(&previous).count();

                rows.push(OrgRetentionCohortRow {
                    activity_month: month,
                    month_label: month_label(month),
                    root_org_id: root.root_org_id.clone(),
                    root_org_name: root.root_org_name.clone(),
                    active_users: current.len(),
                    previous_month_active_users: previous.len(),
                    retained_users: retained,
                    retention_rate_percent: safe_percentage(
                        retained as u64,
                        previous.len() as u64,
                    ),
                });
            }
        }

        rows
    }
}

/// `(employee, hire month, activated within that month)` for every employee
/// whose first hire falls in one of `months`.
fn hire_cohorts<'a>(
    months: &[NaiveDate],
    index: &'a EmploymentIndex,
    first_activation: &HashMap<String, NaiveDate>,
) -> Vec<(&'a str, NaiveDate, bool)> {
    let wanted: BTreeSet<NaiveDate> = months.iter().map(|m| month_start_of(*m)).collect();

    index
        .first_hire_dates()
        .filter_map(|(emp, hired)| {
            let cohort = month_start_of(hired);
            if !wanted.contains(&cohort) {
                return None;
            }
            let month_end = month_end_of(cohort);
            let activated = first_activation
                .get(emp)
                .is_some_and(|first| cohort <= *first && *first <= month_end);
            Some((emp, cohort, activated))
        })
        .collect()
}

/// Users with at least one event on an employed day, by month.
fn active_users_by_month<'a>(
    index: &EmploymentIndex,
    events: &'a [ActivationEvent],
) -> BTreeMap<NaiveDate, BTreeSet<&'a str>> {
    let mut active: BTreeMap<NaiveDate, BTreeSet<&str>> = BTreeMap::new();
    for event in events {
        let date = event.activated_at.date();
        if index.is_employed(&event.emp_id, date) {
            active
                .entry(month_start_of(date))
                .or_default()
                .insert(event.emp_id.as_str());
        }
    }
    active
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::first_activation_dates;
    use crate::aggregate::test_support::*;
    use crate::calendar::{CalendarGenerator, DateSpan};
    use crate::config::OrgConfig;
    use crate::types::OrgUnit;
    use pretty_assertions::assert_eq;

    fn two_root_resolver() -> OrgHierarchyResolver {
        let units = vec![
            OrgUnit {
                org_id: "10000".to_string(),
                org_name: "Sales".to_string(),
                parent_org_id: None,
            },
            OrgUnit {
                org_id: "10020".to_string(),
                org_name: "Sales West".to_string(),
                parent_org_id: Some("10000".to_string()),
            },
            OrgUnit {
                org_id: "20000".to_string(),
                org_name: "Support".to_string(),
                parent_org_id: None,
            },
        ];
        OrgHierarchyResolver::build(&units, &OrgConfig::default())
    }

    #[test]
    fn test_activation_within_hire_month() {
        let index = EmploymentIndex::build(&[
            hire("A", d(2024, 1, 3), None, "U1"),
            hire("B", d(2024, 1, 20), None, "U1"),
            hire("C", d(2024, 1, 25), None, "U1"),
            hire("D", d(2024, 2, 5), None, "U1"),
        ]);
        let first = first_activation_dates(&[
            activation("A", d(2024, 1, 31)),
            activation("B", d(2024, 2, 1)),
            activation("D", d(2024, 2, 6)),
        ]);
        let months = CalendarGenerator::months(&DateSpan::new(d(2024, 1, 1), d(2024, 2, 28)));

        let rows = CohortAnalyzer::activation(&months, &index, &first);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].month_label, "2024-01");
        assert_eq!(rows[0].new_hires, 3);
        assert_eq!(rows[0].activated_within_month, 1);
        assert_eq!(rows[0].activation_rate_percent, Some(33.33));
        assert_eq!(rows[1].new_hires, 1);
        assert_eq!(rows[1].activation_rate_percent, Some(100.0));
    }

    #[test]
    fn test_activation_cohort_outside_months_skipped() {
        let index = EmploymentIndex::build(&[hire("A", d(2023, 6, 1), None, "U1")]);
        let rows = CohortAnalyzer::activation(&[d(2024, 1, 1)], &index, &HashMap::new());
        assert!(rows.is_empty());
    }

    #[test]
    fn test_retention_first_month_is_null() {
        let index = EmploymentIndex::build(&[
            hire("A", d(2024, 1, 1), None, "U1"),
            hire("B", d(2024, 1, 1), None, "U1"),
            hire("C", d(2024, 1, 1), None, "U1"),
        ]);
        let events = vec![
            activation("A", d(2024, 1, 5)),
            activation("B", d(2024, 1, 9)),
            activation("A", d(2024, 2, 7)),
            activation("C", d(2024, 2, 8)),
            activation("C", d(2024, 3, 4)),
        ];
        let months = CalendarGenerator::months(&DateSpan::new(d(2024, 1, 5), d(2024, 3, 4)));

        let rows = CohortAnalyzer::retention(&months, &index, &events);
        assert_eq!(rows.len(), 3);

        assert_eq!(rows[0].active_users, 2);
        assert_eq!(rows[0].previous_month_active_users, 0);
        assert_eq!(rows[0].retention_rate_percent, None);

        assert_eq!(rows[1].active_users, 2);
        assert_eq!(rows[1].previous_month_active_users, 2);
        assert_eq!(rows[1].retained_users, 1);
        assert_eq!(rows[1].retention_rate_percent, Some(50.0));

        assert_eq!(rows[2].retained_users, 1);
        assert_eq!(rows[2].retention_rate_percent, Some(50.0));
    }

    #[test]
    fn test_retention_gap_month() {
        let index = EmploymentIndex::build(&[hire("A", d(2024, 1, 1), None, "U1")]);
        let events = vec![activation("A", d(2024, 1, 5)), activation("A", d(2024, 3, 5))];
        let months = CalendarGenerator::months(&DateSpan::new(d(2024, 1, 1), d(2024, 3, 31)));

        let rows = CohortAnalyzer::retention(&months, &index, &events);
        assert_eq!(rows[1].active_users, 0);
        assert_eq!(rows[1].retention_rate_percent, Some(0.0));
        assert_eq!(rows[2].previous_month_active_users, 0);
        assert_eq!(rows[2].retention_rate_percent, None);
    }

    #[test]
    fn test_retention_ignores_events_outside_employment() {
        let index = EmploymentIndex::build(&[hire("A", d(2024, 1, 1), Some(d(2024, 2, 1)), "U1")]);
        let events = vec![activation("A", d(2024, 1, 10)), activation("A", d(2024, 2, 10))];
        let rows = CohortAnalyzer::retention(&[d(2024, 2, 1)], &index, &events);

        assert_eq!(rows[0].active_users, 0);
        assert_eq!(rows[0].previous_month_active_users, 1);
        assert_eq!(rows[0].retention_rate_percent, Some(0.0));
    }

    #[test]
    fn test_activation_by_org_splits_hire_months() {
        let resolver = two_root_resolver();
        let index = EmploymentIndex::build(&[
            hire("A", d(2024, 1, 3), None, "10020"),
            hire("B", d(2024, 1, 8), None, "10000"),
            hire("C", d(2024, 1, 9), None, "20000"),
            hire("D", d(2024, 1, 10), None, "77777"),
            hire("E", d(2024, 2, 1), None, "20000"),
        ]);
        let first = first_activation_dates(&[
            activation("A", d(2024, 1, 4)),
            activation("C", d(2024, 2, 2)),
            activation("D", d(2024, 1, 11)),
            activation("E", d(2024, 2, 1)),
        ]);
        let months = CalendarGenerator::months(&DateSpan::new(d(2024, 1, 1), d(2024, 2, 29)));

        let rows = CohortAnalyzer::activation_by_org(&months, &index, &first, &resolver);
        let keys: Vec<(&str, &str)> = rows
            .iter()
            .map(|r| (r.month_label.as_str(), r.root_org_id.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("2024-01", "10000"),
                ("2024-01", "20000"),
                ("2024-01", "UNASSIGNED"),
                ("2024-02", "20000"),
            ]
        );

        assert_eq!(rows[0].root_org_name, "Sales");
        assert_eq!(rows[0].new_hires, 2);
        assert_eq!(rows[0].activated_within_month, 1);
        assert_eq!(rows[0].activation_rate_percent, Some(50.0));
        assert_eq!(rows[1].activation_rate_percent, Some(0.0));
        assert_eq!(rows[2].root_org_name, "undefined");
        assert_eq!(rows[2].activation_rate_percent, Some(100.0));

        // Per-org rows add up to the company-wide cohort
        let company = CohortAnalyzer::activation(&months, &index, &first);
        let january: usize = rows
            .iter()
            .filter(|r| r.month_label == "2024-01")
            .map(|r| r.new_hires)
            .sum();
        assert_eq!(january, company[0].new_hires);
    }

    #[test]
    fn test_retention_by_org_compares_within_org() {
        let resolver = two_root_resolver();
        let index = EmploymentIndex::build(&[
            hire("A", d(2024, 1, 1), None, "10020"),
            hire("B", d(2024, 1, 1), None, "10000"),
            hire("C", d(2024, 1, 1), None, "20000"),
        ]);
        let events = vec![
            activation("A", d(2024, 1, 5)),
            activation("B", d(2024, 1, 6)),
            activation("A", d(2024, 2, 5)),
        ];
        let months = CalendarGenerator::months(&DateSpan::new(d(2024, 1, 1), d(2024, 2, 29)));

        let rows = CohortAnalyzer::retention_by_org(&months, &index, &events, &resolver);

        // 2 months x {10000, 20000}
        assert_eq!(rows.len(), 4);
        let sales_feb = rows
            .iter()
            .find(|r| r.month_label == "2024-02" && r.root_org_id == "10000")
            .unwrap();
        assert_eq!(sales_feb.active_users, 1);
        assert_eq!(sales_feb.previous_month_active_users, 2);
        assert_eq!(sales_feb.retained_users, 1);
        assert_eq!(sales_feb.retention_rate_percent, Some(50.0));

        let support_feb = rows
            .iter()
            .find(|r| r.month_label == "2024-02" && r.root_org_id == "20000")
            .unwrap();
        assert_eq!(support_feb.active_users, 0);
        assert_eq!(support_feb.previous_month_active_users, 0);
        assert_eq!(support_feb.retention_rate_percent, None);
    }

    #[test]
    fn test_retention_by_org_without_months_is_empty() {
        let resolver = two_root_resolver();
        let index = EmploymentIndex::build(&[hire("A", d(2024, 1, 1), None, "10000")]);
        let rows = CohortAnalyzer::retention_by_org(&[], &index, &[], &resolver);
        assert!(rows.is_empty());
    }
}
