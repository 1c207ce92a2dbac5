//! Core data types for Usage Pulse
//!
//! This module defines the source records read from upstream systems, the
//! derived calendar buckets, and the result rows that flow out of each
//! aggregator.

use crate::schema::timestamp::{de_date, de_opt_date, de_timestamp};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ============================================================================
// Source records
// ============================================================================

/// One employment interval from the HR source.
///
/// The interval is half-open: `[hire_date, termination_date)`. A missing
/// termination date means the employee is still employed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmploymentRecord {
    /// Employee identifier
    pub emp_id: String,
    /// First employed day
    #[serde(deserialize_with = "de_date")]
    pub hire_date: NaiveDate,
    /// First day no longer employed
    #[serde(default, deserialize_with = "de_opt_date")]
    pub termination_date: Option<NaiveDate>,
    /// Organizational unit the employee belongs to
    #[serde(default)]
    pub unit_id: Option<String>,
}

/// One activation/usage instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationEvent {
    pub emp_id: String,
    #[serde(deserialize_with = "de_timestamp")]
    pub activated_at: NaiveDateTime,
}

/// One sent message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEvent {
    pub sender_emp_id: String,
    #[serde(deserialize_with = "de_timestamp")]
    pub sent_at: NaiveDateTime,
}

/// A node of the organization forest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgUnit {
    pub org_id: String,
    #[serde(default)]
    pub org_name: String,
    #[serde(default)]
    pub parent_org_id: Option<String>,
}

/// All four sources for a single run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceSnapshot {
    pub employment: Vec<EmploymentRecord>,
    pub activations: Vec<ActivationEvent>,
    pub messages: Vec<MessageEvent>,
    pub org_units: Vec<OrgUnit>,
}

// ============================================================================
// Calendar buckets
// ============================================================================

/// An ISO week, Monday through Sunday inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekBucket {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub iso_year: i32,
    pub iso_week: u32,
    /// `YYYY-Www`
    pub label: String,
}

/// A single calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DayBucket {
    pub calendar_date: NaiveDate,
}

// ============================================================================
// Result rows
// ============================================================================

/// Company-wide weekly coverage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageRow {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub iso_year: i32,
    pub iso_week: u32,
    pub week_label: String,
    pub total_employees: usize,
    pub covered_employees: usize,
    pub coverage_rate_percent: Option<f64>,
}

/// Weekly coverage for a single root organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrgCoverageRow {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub iso_year: i32,
    pub iso_week: u32,
    pub week_label: String,
    pub root_org_id: String,
    pub root_org_name: String,
    pub total_employees: usize,
    pub covered_employees: usize,
    pub coverage_rate_percent: Option<f64>,
}

/// Daily active rate for a working day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveRateRow {
    pub calendar_date: NaiveDate,
    pub active_users: usize,
    pub total_employees: usize,
    pub active_rate_percent: Option<f64>,
}

/// Weekly message volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageVolumeRow {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub iso_year: i32,
    pub iso_week: u32,
    pub week_label: String,
    pub total_messages: u64,
    pub total_employees: usize,
    pub messages_per_capita: Option<f64>,
}

/// Sender population band in the 20/60/20 split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Segment {
    /// Ranked position below 0.2
    #[serde(rename = "top_20")]
    Top20,
    /// Ranked position in `[0.2, 0.8)`
    #[serde(rename = "middle_60")]
    Middle60,
    /// Ranked position at or above 0.8
    #[serde(rename = "bottom_20")]
    Bottom20,
}

impl Segment {
    /// Segments in report order.
    pub const ALL: [Segment; 3] = [Segment::Top20, Segment::Middle60, Segment::Bottom20];
}

/// One band of the weekly 20/60/20 sender distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionRow {
    pub week_start: NaiveDate,
    pub iso_year: i32,
    pub iso_week: u32,
    pub week_label: String,
    pub segment: Segment,
    pub users_in_segment: usize,
    pub message_count: u64,
    pub message_share_percent: Option<f64>,
    pub user_share_percent: Option<f64>,
}

/// One entry of the top-senders leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardRow {
    pub rank: usize,
    pub emp_id: String,
    pub root_org_id: String,
    pub root_org_name: String,
    pub total_messages: u64,
}

/// Activation within the hire month, per hire month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationCohortRow {
    pub hire_month: NaiveDate,
    /// `YYYY-MM`
    pub month_label: String,
    pub new_hires: usize,
    pub activated_within_month: usize,
    pub activation_rate_percent: Option<f64>,
}

/// Month-over-month retention of active users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionCohortRow {
    pub activity_month: NaiveDate,
    /// `YYYY-MM`
    pub month_label: String,
    pub active_users: usize,
    pub previous_month_active_users: usize,
    pub retained_users: usize,
    pub retention_rate_percent: Option<f64>,
}

/// Activation within the hire month, per hire month and root organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrgActivationCohortRow {
    pub hire_month: NaiveDate,
    pub month_label: String,
    pub root_org_id: String,
    pub root_org_name: String,
    pub new_hires: usize,
    pub activated_within_month: usize,
    pub activation_rate_percent: Option<f64>,
}

/// Month-over-month retention within one root organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrgRetentionCohortRow {
    pub activity_month: NaiveDate,
    pub month_label: String,
    pub root_org_id: String,
    pub root_org_name: String,
    pub active_users: usize,
    pub previous_month_active_users: usize,
    pub retained_users: usize,
    pub retention_rate_percent: Option<f64>,
}

/// Every table produced by one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultTables {
    pub coverage_weekly: Vec<CoverageRow>,
    pub coverage_weekly_by_org: Vec<OrgCoverageRow>,
    pub active_rate_daily: Vec<ActiveRateRow>,
    pub message_volume_weekly: Vec<MessageVolumeRow>,
    pub message_distribution_weekly: Vec<DistributionRow>,
    pub message_leaderboard: Vec<LeaderboardRow>,
    pub activation_cohort_monthly: Vec<ActivationCohortRow>,
    pub activation_cohort_monthly_by_org: Vec<OrgActivationCohortRow>,
    pub retention_cohort_monthly: Vec<RetentionCohortRow>,
    pub retention_cohort_monthly_by_org: Vec<OrgRetentionCohortRow>,
}

impl ResultTables {
    /// Table names in output order
    pub const TABLE_NAMES: [&'static str; 10] = [
        "coverage_weekly",
        "coverage_weekly_by_org",
        "active_rate_daily",
        "message_volume_weekly",
        "message_distribution_weekly",
        "message_leaderboard",
        "activation_cohort_monthly",
        "activation_cohort_monthly_by_org",
        "retention_cohort_monthly",
        "retention_cohort_monthly_by_org",
    ];

    /// Row count per table, in `TABLE_NAMES` order.
    pub fn row_counts(&self) -> [(&'static str, usize); 10] {
        [
            (Self::TABLE_NAMES[0], self.coverage_weekly.len()),
            (Self::TABLE_NAMES[1], self.coverage_weekly_by_org.len()),
            (Self::TABLE_NAMES[2], self.active_rate_daily.len()),
            (Self::TABLE_NAMES[3], self.message_volume_weekly.len()),
            (Self::TABLE_NAMES[4], self.message_distribution_weekly.len()),
            (Self::TABLE_NAMES[5], self.message_leaderboard.len()),
            (Self::TABLE_NAMES[6], self.activation_cohort_monthly.len()),
            (Self::TABLE_NAMES[7], self.activation_cohort_monthly_by_org.len()),
            (Self::TABLE_NAMES[8], self.retention_cohort_monthly.len()),
            (Self::TABLE_NAMES[9], self.retention_cohort_monthly_by_org.len()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_employment_record_null_termination() {
        let json =
            r#"{"emp_id":"E1","hire_date":"2024-01-10","termination_date":null,"unit_id":"U1"}"#;
        let record: EmploymentRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.termination_date, None);
        assert_eq!(record.unit_id.as_deref(), Some("U1"));

        let blank = r#"{"emp_id":"E1","hire_date":"2024-01-10 00:00:00","termination_date":""}"#;
        let record: EmploymentRecord = serde_json::from_str(blank).unwrap();
        assert_eq!(record.termination_date, None);
        assert_eq!(record.unit_id, None);
        assert_eq!(record.hire_date, NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());
    }

    #[test]
    fn test_segment_serialization() {
        assert_eq!(serde_json::to_string(&Segment::Top20).unwrap(), "\"top_20\"");
        assert_eq!(serde_json::to_string(&Segment::Middle60).unwrap(), "\"middle_60\"");
        assert_eq!(serde_json::to_string(&Segment::Bottom20).unwrap(), "\"bottom_20\"");
    }

    #[test]
    fn test_null_rate_serializes_as_null() {
        let row = ActiveRateRow {
            calendar_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            active_users: 0,
            total_employees: 0,
            active_rate_percent: None,
        };
        let value = serde_json::to_value(&row).unwrap();
        assert!(value["active_rate_percent"].is_null());
        assert_eq!(value["calendar_date"], "2024-01-01");
    }

    #[test]
    fn test_table_names_match_serialized_tables() {
        let value = serde_json::to_value(ResultTables::default()).unwrap();
        let mut fields: Vec<&str> = value
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        let mut names = ResultTables::TABLE_NAMES.to_vec();
        fields.sort_unstable();
        names.sort_unstable();
        assert_eq!(fields, names);

        let counted: Vec<&str> = ResultTables::default()
            .row_counts()
            .iter()
            .map(|(name, _)| *name)
            .collect();
        assert_eq!(counted, ResultTables::TABLE_NAMES.to_vec());
        assert!(names.contains(&"activation_cohort_monthly_by_org"));
        assert!(names.contains(&"retention_cohort_monthly_by_org"));
    }
}
