//! Pipeline orchestration
//!
//! This module provides the public API for Usage Pulse. A run takes a source
//! snapshot and run parameters and recomputes every result table from
//! scratch:
//!
//! 1. EmploymentIndex / OrgHierarchyResolver - build the shared indexes
//! 2. RunWindow - resolve the emitted window and the widened event floor
//! 3. CalendarGenerator - derive week, weekday and month buckets
//! 4. Aggregators - coverage, activity, messages, cohorts
//!
//! Runs carry no state between calls, so re-running with the same
//! parameters over the same snapshot reproduces identical tables.

use crate::aggregate::{
    first_activation_dates, ActivityAggregator, CohortAnalyzer, CoverageAggregator,
    MessageAggregator,
};
use crate::calendar::{previous_month_start, week_start_of, CalendarGenerator, DateSpan};
use crate::config::Config;
use crate::employment::EmploymentIndex;
use crate::error::ComputeError;
use crate::org::{FlaggedUnit, OrgHierarchyResolver};
use crate::types::{ActivationEvent, MessageEvent, ResultTables, SourceSnapshot};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// How much history a run recomputes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum RunMode {
    /// Everything up to the target date
    Full,
    /// The last `lookback_days` days up to the target date
    Incremental { lookback_days: u32 },
}

/// Parameters of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunParams {
    /// The run's "current date"; later events are ignored.
    pub target_date: NaiveDate,
    #[serde(flatten)]
    pub mode: RunMode,
}

impl RunParams {
    pub fn full(target_date: NaiveDate) -> Self {
        Self {
            target_date,
            mode: RunMode::Full,
        }
    }

    pub fn incremental(target_date: NaiveDate, lookback_days: u32) -> Self {
        Self {
            target_date,
            mode: RunMode::Incremental { lookback_days },
        }
    }

    pub fn validate(&self) -> Result<(), ComputeError> {
        match self.mode {
            RunMode::Full => Ok(()),
            RunMode::Incremental { lookback_days: 0 } => Err(ComputeError::InvalidRunParams(
                "lookback_days must be at least 1".to_string(),
            )),
            RunMode::Incremental { lookback_days } => match self.window_start() {
                Some(_) => Ok(()),
                None => Err(ComputeError::InvalidRunParams(format!(
                    "lookback_days {lookback_days} reaches before the earliest representable date"
                ))),
            },
        }
    }

    /// First day whose buckets are emitted. `None` for a full refresh, and
    /// for a lookback that runs past the calendar's lower bound.
    pub fn window_start(&self) -> Option<NaiveDate> {
        match self.mode {
            RunMode::Full => None,
            RunMode::Incremental { lookback_days } => self
                .target_date
                .checked_sub_days(Days::new(u64::from(lookback_days))),
        }
    }
}

/// The resolved date ranges of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunWindow {
    /// Emitted range for activation-driven tables
    pub activity_span: DateSpan,
    /// Emitted range for message-driven tables
    pub message_span: DateSpan,
    /// Hire months covered by the activation cohort tables
    pub cohort_span: DateSpan,
    /// Earliest event date read. Lies before the emitted range when a bucket
    /// needs history outside it: the first partial week and the month before
    /// the first retention month.
    pub event_floor: Option<NaiveDate>,
}

/// Tables plus the run metadata needed to interpret them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutput {
    pub params: RunParams,
    pub window: RunWindow,
    pub flagged_units: Vec<FlaggedUnit>,
    pub tables: ResultTables,
}

/// Compute every table with the default configuration.
///
/// # Example
/// ```ignore
/// let output = compute_tables(&snapshot, &RunParams::full(target_date))?;
/// println!("{} weeks", output.tables.coverage_weekly.len());
/// ```
pub fn compute_tables(
    snapshot: &SourceSnapshot,
    params: &RunParams,
) -> Result<RunOutput, ComputeError> {
    MetricsEngine::new(Config::default()).run(snapshot, params)
}

/// Engine holding the configuration shared by successive runs.
pub struct MetricsEngine {
    config: Config,
}

impl Default for MetricsEngine {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl MetricsEngine {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Recompute all result tables for `params` from `snapshot`.
    pub fn run(
        &self,
        snapshot: &SourceSnapshot,
        params: &RunParams,
    ) -> Result<RunOutput, ComputeError> {
        params.validate()?;
        let target = params.target_date;

        info!(
            target_date = %target,
            mode = ?params.mode,
            employees = snapshot.employment.len(),
            activations = snapshot.activations.len(),
            messages = snapshot.messages.len(),
            "starting aggregation run"
        );

        // Stage 1: shared indexes
        let index = EmploymentIndex::build(&snapshot.employment);
        if index.is_empty() {
            warn!("no employment records; every headcount will be zero");
        }
        let resolver = OrgHierarchyResolver::build(&snapshot.org_units, &self.config.org);

        // First activation is cumulative, so it reads everything up to the
        // target date regardless of the window.
        let activations_to_date: Vec<ActivationEvent> = snapshot
            .activations
            .iter()
            .filter(|e| e.activated_at.date() <= target)
            .cloned()
            .collect();
        let messages_to_date: Vec<MessageEvent> = snapshot
            .messages
            .iter()
            .filter(|m| m.sent_at.date() <= target)
            .cloned()
            .collect();
        let first_activation = first_activation_dates(&activations_to_date);

        // Stage 2: window
        let window =
            self.resolve_window(params, &index, &activations_to_date, &messages_to_date);
        let activations: Vec<ActivationEvent> = match window.event_floor {
            Some(floor) => activations_to_date
                .iter()
                .filter(|e| e.activated_at.date() >= floor)
                .cloned()
                .collect(),
            None => activations_to_date.clone(),
        };
        let messages: Vec<MessageEvent> = match window.event_floor {
            Some(floor) => messages_to_date
                .into_iter()
                .filter(|m| m.sent_at.date() >= floor)
                .collect(),
            None => messages_to_date,
        };

        // Stage 3: buckets
        let activity_weeks = CalendarGenerator::weeks(&window.activity_span);
        let activity_days = CalendarGenerator::weekdays(&window.activity_span);
        let months = CalendarGenerator::months(&window.activity_span);
        let hire_months = CalendarGenerator::months(&window.cohort_span);
        let message_weeks = CalendarGenerator::weeks(&window.message_span);

        debug!(
            activity_span = ?window.activity_span,
            message_span = ?window.message_span,
            weeks = activity_weeks.len(),
            weekdays = activity_days.len(),
            months = months.len(),
            hire_months = hire_months.len(),
            "calendar buckets generated"
        );

        // Stage 4: aggregators
        let tables = ResultTables {
            coverage_weekly: CoverageAggregator::weekly(
                &activity_weeks,
                &index,
                &first_activation,
            ),
            coverage_weekly_by_org: CoverageAggregator::weekly_by_org(
                &activity_weeks,
                &index,
                &first_activation,
                &resolver,
            ),
            active_rate_daily: ActivityAggregator::daily(&activity_days, &index, &activations),
            message_volume_weekly: MessageAggregator::weekly_volume(
                &message_weeks,
                &index,
                &messages,
            ),
            message_distribution_weekly: MessageAggregator::weekly_distribution(
                &message_weeks,
                &index,
                &messages,
            ),
            message_leaderboard: MessageAggregator::leaderboard(
                &window.message_span,
                &index,
                &resolver,
                &messages,
                self.config.run.leaderboard_size,
            ),
            activation_cohort_monthly: CohortAnalyzer::activation(
                &hire_months,
                &index,
                &first_activation,
            ),
            activation_cohort_monthly_by_org: CohortAnalyzer::activation_by_org(
                &hire_months,
                &index,
                &first_activation,
                &resolver,
            ),
            retention_cohort_monthly: CohortAnalyzer::retention(&months, &index, &activations),
            retention_cohort_monthly_by_org: CohortAnalyzer::retention_by_org(
                &months,
                &index,
                &activations,
                &resolver,
            ),
        };

        for (table, rows) in tables.row_counts() {
            debug!(table, rows, "table computed");
        }
        info!(
            weeks = activity_weeks.len(),
            flagged_units = resolver.flagged().len(),
            "aggregation run complete"
        );

        Ok(RunOutput {
            params: *params,
            window,
            flagged_units: resolver.flagged().to_vec(),
            tables,
        })
    }

    /// Resolve emitted spans and the event floor.
    ///
    /// Each span's bounds come from the first available source in preference
    /// order (events, then employment, then the target date), clamped to
    /// `[window_start, target_date]`. The cohort span also reaches back to the
    /// earliest hire, so hire months before the first activation get a row.
    fn resolve_window(
        &self,
        params: &RunParams,
        index: &EmploymentIndex,
        activations: &[ActivationEvent],
        messages: &[MessageEvent],
    ) -> RunWindow {
        let target = params.target_date;
        let employment = index.span();
        let employment_min = employment.map(|(min, _)| min);
        let employment_max = employment.map(|(_, max)| max);

        let activation_min = activations.iter().map(|e| e.activated_at.date()).min();
        let activation_max = activations.iter().map(|e| e.activated_at.date()).max();
        let message_min = messages.iter().map(|m| m.sent_at.date()).min();
        let message_max = messages.iter().map(|m| m.sent_at.date()).max();

        let activity_span = DateSpan::first_available(
            &[activation_min, employment_min],
            &[activation_max, employment_max],
            target,
        );
        let message_span = DateSpan::first_available(
            &[message_min, employment_min],
            &[message_max, employment_max],
            target,
        );

        let cohort_span = DateSpan::new(
            employment_min.map_or(activity_span.start, |min| min.min(activity_span.start)),
            employment_max.map_or(activity_span.end, |max| max.max(activity_span.end)),
        );

        let window_start = params.window_start();
        let clamp_start = window_start
            .unwrap_or_else(|| cohort_span.start.min(message_span.start));
        let activity_span = activity_span.clamp_to(clamp_start, target);
        let message_span = message_span.clamp_to(clamp_start, target);
        let cohort_span = cohort_span.clamp_to(clamp_start, target);

        let event_floor = window_start.map(|_| {
            let earliest = activity_span.start.min(message_span.start);
            let floor = previous_month_start(earliest).min(week_start_of(earliest));
            debug!(
                window_start = %clamp_start,
                event_floor = %floor,
                "widened event range to cover partial week and prior retention month"
            );
            floor
        });

        RunWindow {
            activity_span,
            message_span,
            cohort_span,
            event_floor,
        }
    }
}
