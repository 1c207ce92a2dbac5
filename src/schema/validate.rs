//! Source integrity checks
//!
//! Aggregation tolerates every fault found here; these checks only report
//! records that will be dropped or rolled up to `UNASSIGNED`.

use crate::config::OrgConfig;
use crate::employment::EmploymentIndex;
use crate::org::{OrgFlag, OrgHierarchyResolver};
use crate::types::SourceSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityIssue {
    EmptyId,
    TerminationBeforeHire,
    UnknownUnit,
    UnknownEmployee,
    UnresolvedRoot,
}

/// A single integrity finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityWarning {
    pub source: String,
    pub issue: IntegrityIssue,
    /// Offending record id, or position for records with no id
    pub subject: String,
    pub detail: String,
}

/// Validator for a loaded source snapshot
pub struct SourceValidator;

impl SourceValidator {
    pub fn check(snapshot: &SourceSnapshot, org: &OrgConfig) -> Vec<IntegrityWarning> {
        let mut warnings = Vec::new();
        let index = EmploymentIndex::build(&snapshot.employment);
        let resolver = OrgHierarchyResolver::build(&snapshot.org_units, org);

        for (pos, record) in snapshot.employment.iter().enumerate() {
            if record.emp_id.trim().is_empty() {
                warnings.push(warning(
                    "employees",
                    IntegrityIssue::EmptyId,
                    format!("#{}", pos + 1),
                    "employment record has an empty emp_id",
                ));
                continue;
            }
            if let Some(terminated) = record.termination_date {
                if terminated <= record.hire_date {
                    warnings.push(warning(
                        "employees",
                        IntegrityIssue::TerminationBeforeHire,
                        record.emp_id.clone(),
                        format!(
                            "termination {} is not after hire {}; interval is empty",
                            terminated, record.hire_date
                        ),
                    ));
                }
            }
            if let Some(unit) = record.unit_id.as_deref() {
                if !resolver.knows(unit) {
                    warnings.push(warning(
                        "employees",
                        IntegrityIssue::UnknownUnit,
                        record.emp_id.clone(),
                        format!("unit {} is not in the org source", unit),
                    ));
                }
            }
        }

        // One warning per unknown id, not per event
        let unknown_activators: BTreeSet<&str> = snapshot
            .activations
            .iter()
            .map(|e| e.emp_id.as_str())
            .filter(|emp| !index.contains(emp))
            .collect();
        for emp in unknown_activators {
            warnings.push(warning(
                "activations",
                IntegrityIssue::UnknownEmployee,
                emp.to_string(),
                "activation events for an employee with no employment record",
            ));
        }

        let unknown_senders: BTreeSet<&str> = snapshot
            .messages
            .iter()
            .map(|m| m.sender_emp_id.as_str())
            .filter(|emp| !index.contains(emp))
            .collect();
        for emp in unknown_senders {
            warnings.push(warning(
                "messages",
                IntegrityIssue::UnknownEmployee,
                emp.to_string(),
                "messages from a sender with no employment record",
            ));
        }

        for flagged in resolver.flagged() {
            let detail = match flagged.flag {
                OrgFlag::NoRoot => "no ancestor is a root unit",
                OrgFlag::MissingParent => "parent chain references a unit that does not exist",
                OrgFlag::Cycle => "parent chain contains a cycle",
                OrgFlag::DepthExceeded => "parent chain exceeds the depth limit",
            };
            warnings.push(warning(
                "org_units",
                IntegrityIssue::UnresolvedRoot,
                flagged.org_id.clone(),
                detail,
            ));
        }

        warnings
    }
}

fn warning(
    source: &str,
    issue: IntegrityIssue,
    subject: String,
    detail: impl Into<String>,
) -> IntegrityWarning {
    IntegrityWarning {
        source: source.to_string(),
        issue,
        subject,
        detail: detail.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActivationEvent, EmploymentRecord, MessageEvent, OrgUnit};
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn snapshot() -> SourceSnapshot {
        SourceSnapshot {
            employment: vec![
                EmploymentRecord {
                    emp_id: "E1".to_string(),
                    hire_date: d(2024, 1, 1),
                    termination_date: None,
                    unit_id: Some("10000".to_string()),
                },
                EmploymentRecord {
                    emp_id: "E2".to_string(),
                    hire_date: d(2024, 3, 1),
                    termination_date: Some(d(2024, 2, 1)),
                    unit_id: Some("55555".to_string()),
                },
                EmploymentRecord {
                    emp_id: " ".to_string(),
                    hire_date: d(2024, 3, 1),
                    termination_date: None,
                    unit_id: None,
                },
            ],
            activations: vec![
                ActivationEvent {
                    emp_id: "GHOST".to_string(),
                    activated_at: d(2024, 1, 5).and_hms_opt(9, 0, 0).unwrap(),
                },
                ActivationEvent {
                    emp_id: "GHOST".to_string(),
                    activated_at: d(2024, 1, 6).and_hms_opt(9, 0, 0).unwrap(),
                },
            ],
            messages: vec![MessageEvent {
                sender_emp_id: "E1".to_string(),
                sent_at: d(2024, 1, 5).and_hms_opt(9, 0, 0).unwrap(),
            }],
            org_units: vec![
                OrgUnit {
                    org_id: "10000".to_string(),
                    org_name: "Sales".to_string(),
                    parent_org_id: None,
                },
                OrgUnit {
                    org_id: "20010".to_string(),
                    org_name: "Loop".to_string(),
                    parent_org_id: Some("20020".to_string()),
                },
                OrgUnit {
                    org_id: "20020".to_string(),
                    org_name: "Loop back".to_string(),
                    parent_org_id: Some("20010".to_string()),
                },
            ],
        }
    }

    #[test]
    fn test_check_reports_each_issue() {
        let warnings = SourceValidator::check(&snapshot(), &OrgConfig::default());
        let issues: Vec<(IntegrityIssue, &str)> =
            warnings.iter().map(|w| (w.issue, w.subject.as_str())).collect();

        assert!(issues.contains(&(IntegrityIssue::EmptyId, "#3")));
        assert!(issues.contains(&(IntegrityIssue::TerminationBeforeHire, "E2")));
        assert!(issues.contains(&(IntegrityIssue::UnknownUnit, "E2")));
        assert!(issues.contains(&(IntegrityIssue::UnresolvedRoot, "20010")));
        assert!(issues.contains(&(IntegrityIssue::UnresolvedRoot, "20020")));

        let ghosts = issues
            .iter()
            .filter(|(issue, subject)| {
                *issue == IntegrityIssue::UnknownEmployee && *subject == "GHOST"
            })
            .count();
        assert_eq!(ghosts, 1);
        assert!(!issues.iter().any(|(_, subject)| *subject == "E1"));
    }

    #[test]
    fn test_clean_snapshot_has_no_warnings() {
        let warnings = SourceValidator::check(&SourceSnapshot::default(), &OrgConfig::default());
        assert!(warnings.is_empty());
    }
}
