//! Weekly coverage
//!
//! Coverage is the share of employees employed during a week who have ever
//! activated by the end of that week.

use crate::employment::EmploymentIndex;
use crate::org::{OrgHierarchyResolver, RootOrg};
use crate::rate::safe_percentage;
use crate::types::{CoverageRow, OrgCoverageRow, WeekBucket};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Aggregator for weekly coverage tables
pub struct CoverageAggregator;

impl CoverageAggregator {
    /// Company-wide coverage, one row per week.
    pub fn weekly(
        weeks: &[WeekBucket],
        index: &EmploymentIndex,
        first_activation: &HashMap<String, NaiveDate>,
    ) -> Vec<CoverageRow> {
        weeks
            .iter()
            .map(|week| {
                let employed = index.employed_during(week.week_start, week.week_end);
                let covered = employed
                    .iter()
                    .filter(|emp| activated_by(first_activation, emp, week.week_end))
                    .count();

                CoverageRow {
                    week_start: week.week_start,
                    week_end: week.week_end,
                    iso_year: week.iso_year,
                    iso_week: week.iso_week,
                    week_label: week.label.clone(),
                    total_employees: employed.len(),
                    covered_employees: covered,
                    coverage_rate_percent: safe_percentage(covered as u64, employed.len() as u64),
                }
            })
            .collect()
    }

    /// Coverage per root organization.
    ///
    /// Emits the full cartesian product of weeks and observed root orgs, so an
    /// org with nobody employed in a given week still gets a zero row.
    pub fn weekly_by_org(
        weeks: &[WeekBucket],
        index: &EmploymentIndex,
        first_activation: &HashMap<String, NaiveDate>,
        resolver: &OrgHierarchyResolver,
    ) -> Vec<OrgCoverageRow> {
        let (Some(first), Some(last)) = (weeks.first(), weeks.last()) else {
            return Vec::new();
        };

        let roots: HashMap<&str, RootOrg> = index
            .employees()
            .map(|emp| (emp, resolver.root_of(index.unit_of(emp))))
            .collect();

        let observed: BTreeSet<&RootOrg> = index
            .employed_during(first.week_start, last.week_end)
            .into_iter()
            .filter_map(|emp| roots.get(emp))
            .collect();

        let mut rows = Vec::with_capacity(weeks.len() * observed.len());

        for week in weeks {
            // root -> (total, covered)
            let mut counts: BTreeMap<&RootOrg, (usize, usize)> =
                observed.iter().map(|root| (*root, (0, 0))).collect();

            for emp in index.employed_during(week.week_start, week.week_end) {
                let Some(root) = roots.get(emp) else { continue };
                let entry = counts.entry(root).or_insert((0, 0));
                entry.0 += 1;
                if activated_by(first_activation, emp, week.week_end) {
                    entry.1 += 1;
                }
            }

            for (root, (total, covered)) in counts {
                rows.push(OrgCoverageRow {
                    week_start: week.week_start,
                    week_end: week.week_end,
                    iso_year: week.iso_year,
                    iso_week: week.iso_week,
                    week_label: week.label.clone(),
                    root_org_id: root.root_org_id.clone(),
                    root_org_name: root.root_org_name.clone(),
                    total_employees: total,
                    covered_employees: covered,
                    coverage_rate_percent: safe_percentage(covered as u64, total as u64),
                });
            }
        }

        rows
    }
}

fn activated_by(
    first_activation: &HashMap<String, NaiveDate>,
    emp: &str,
    cutoff: NaiveDate,
) -> bool {
    first_activation
        .get(emp)
        .is_some_and(|first| *first <= cutoff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::first_activation_dates;
    use crate::aggregate::test_support::*;
    use crate::calendar::{week_bucket, week_start_of, CalendarGenerator, DateSpan};
    use crate::config::OrgConfig;
    use crate::types::OrgUnit;

    #[test]
    fn test_two_employees_one_activated() {
        let index = EmploymentIndex::build(&[
            hire("A", d(2024, 1, 1), None, "U1"),
            hire("B", d(2024, 1, 1), None, "U1"),
        ]);
        let first = first_activation_dates(&[activation("B", d(2024, 1, 15))]);
        let week = week_bucket(week_start_of(d(2024, 1, 15)));

        let rows = CoverageAggregator::weekly(&[week], &index, &first);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].total_employees, 2);
        assert_eq!(rows[0].covered_employees, 1);
        assert_eq!(rows[0].coverage_rate_percent, Some(50.0));
    }

    #[test]
    fn test_activation_counts_from_week_end_onward() {
        let index = EmploymentIndex::build(&[hire("A", d(2024, 1, 1), None, "U1")]);
        // Sunday of the week starting 2024-01-08
        let first = first_activation_dates(&[activation("A", d(2024, 1, 14))]);
        let weeks = CalendarGenerator::weeks(&DateSpan::new(d(2024, 1, 1), d(2024, 1, 15)));

        let rows = CoverageAggregator::weekly(&weeks, &index, &first);
        let covered: Vec<usize> = rows.iter().map(|r| r.covered_employees).collect();
        assert_eq!(covered, vec![0, 1, 1]);
    }

    #[test]
    fn test_empty_week_rate_is_null() {
        let index = EmploymentIndex::build(&[hire("A", d(2024, 2, 1), None, "U1")]);
        let week = week_bucket(d(2024, 1, 8));
        let rows = CoverageAggregator::weekly(&[week], &index, &HashMap::new());
        assert_eq!(rows[0].total_employees, 0);
        assert_eq!(rows[0].coverage_rate_percent, None);
    }

    #[test]
    fn test_by_org_cartesian_product() {
        let units = vec![
            OrgUnit {
                org_id: "10000".to_string(),
                org_name: "Sales".to_string(),
                parent_org_id: None,
            },
            OrgUnit {
                org_id: "20000".to_string(),
                org_name: "Ops".to_string(),
                parent_org_id: None,
            },
            OrgUnit {
                org_id: "20010".to_string(),
                org_name: "Ops Floor".to_string(),
                parent_org_id: Some("20000".to_string()),
            },
        ];
        let resolver = OrgHierarchyResolver::build(&units, &OrgConfig::default());
        let index = EmploymentIndex::build(&[
            hire("A", d(2024, 1, 1), Some(d(2024, 1, 10)), "10000"),
            hire("B", d(2024, 1, 1), None, "20010"),
            hire("C", d(2024, 1, 1), None, "99999"),
        ]);
        let first = first_activation_dates(&[activation("B", d(2024, 1, 2))]);
        let weeks = CalendarGenerator::weeks(&DateSpan::new(d(2024, 1, 1), d(2024, 1, 15)));

        let rows = CoverageAggregator::weekly_by_org(&weeks, &index, &first, &resolver);

        // 3 weeks x {10000, 20000, UNASSIGNED}
        assert_eq!(rows.len(), 9);
        let sales_week3 = rows
            .iter()
            .find(|r| r.root_org_id == "10000" && r.week_start == d(2024, 1, 15))
            .unwrap();
        assert_eq!(sales_week3.total_employees, 0);
        assert_eq!(sales_week3.coverage_rate_percent, None);

        let ops_week1 = rows
            .iter()
            .find(|r| r.root_org_id == "20000" && r.week_start == d(2024, 1, 1))
            .unwrap();
        assert_eq!(ops_week1.root_org_name, "Ops");
        assert_eq!(ops_week1.coverage_rate_percent, Some(100.0));

        assert!(rows.iter().any(|r| r.root_org_id == "UNASSIGNED" && r.total_employees == 1));
        for row in &rows {
            assert!(row.covered_employees <= row.total_employees);
        }
    }
}
