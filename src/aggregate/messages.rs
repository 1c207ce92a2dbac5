//! Message volume and sender concentration
//!
//! Only weekday messages sent by senders employed on the send date are
//! counted. Volume, the 20/60/20 split and the leaderboard all share that
//! filter, so segment sums always reconcile with the weekly total.

use crate::calendar::{is_weekday, week_start_of, DateSpan};
use crate::employment::EmploymentIndex;
use crate::org::OrgHierarchyResolver;
use crate::rate::{safe_percentage, safe_ratio};
use crate::types::{
    DistributionRow, LeaderboardRow, MessageEvent, MessageVolumeRow, Segment, WeekBucket,
};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Per-sender message counts, keyed by sender id.
type SenderCounts<'a> = BTreeMap<&'a str, u64>;

/// Aggregator for message tables
pub struct MessageAggregator;

impl MessageAggregator {
    /// Weekly totals and per-capita volume.
    pub fn weekly_volume(
        weeks: &[WeekBucket],
        index: &EmploymentIndex,
        messages: &[MessageEvent],
    ) -> Vec<MessageVolumeRow> {
        let by_week = counts_by_week(index, messages);

        weeks
            .iter()
            .map(|week| {
                let total: u64 = by_week
                    .get(&week.week_start)
                    .map(|senders| senders.values().sum())
                    .unwrap_or(0);
                let employed = index.employed_during(week.week_start, week.week_end).len();

                MessageVolumeRow {
                    week_start: week.week_start,
                    week_end: week.week_end,
                    iso_year: week.iso_year,
                    iso_week: week.iso_week,
                    week_label: week.label.clone(),
                    total_messages: total,
                    total_employees: employed,
                    messages_per_capita: safe_ratio(total, employed as u64),
                }
            })
            .collect()
    }

    /// 20/60/20 sender concentration, exactly three rows per week that has
    /// at least one counted message.
    pub fn weekly_distribution(
        weeks: &[WeekBucket],
        index: &EmploymentIndex,
        messages: &[MessageEvent],
    ) -> Vec<DistributionRow> {
        let by_week = counts_by_week(index, messages);
        let mut rows = Vec::new();

        for week in weeks {
            let Some(senders) = by_week.get(&week.week_start) else {
                continue;
            };
            let ranked = rank_senders(senders);
            let week_total: u64 = ranked.iter().map(|(_, count)| count).sum();
            if ranked.is_empty() || week_total == 0 {
                continue;
            }

            let mut bands: BTreeMap<Segment, (usize, u64)> =
                Segment::ALL.iter().map(|s| (*s, (0, 0))).collect();
            for (position, (_, count)) in ranked.iter().enumerate() {
                let band = bands
                    .entry(segment_for(position, ranked.len()))
                    .or_insert((0, 0));
                band.0 += 1;
                band.1 += count;
            }

            for segment in Segment::ALL {
                let (users, count) = bands.get(&segment).copied().unwrap_or((0, 0));
                rows.push(DistributionRow {
                    week_start: week.week_start,
                    iso_year: week.iso_year,
                    iso_week: week.iso_week,
                    week_label: week.label.clone(),
                    segment,
                    users_in_segment: users,
                    message_count: count,
                    message_share_percent: safe_percentage(count, week_total),
                    user_share_percent: safe_percentage(users as u64, ranked.len() as u64),
                });
            }
        }

        rows
    }

    /// Top `size` senders over `span`.
    pub fn leaderboard(
        span: &DateSpan,
        index: &EmploymentIndex,
        resolver: &OrgHierarchyResolver,
        messages: &[MessageEvent],
        size: usize,
    ) -> Vec<LeaderboardRow> {
        let mut totals: SenderCounts = BTreeMap::new();
        for message in messages.iter().filter(|m| is_counted(index, m)) {
            if span.contains(message.sent_at.date()) {
                *totals.entry(message.sender_emp_id.as_str()).or_insert(0) += 1;
            }
        }

        rank_senders(&totals)
            .into_iter()
            .take(size)
            .enumerate()
            .map(|(position, (emp_id, total))| {
                let root = resolver.root_of(index.unit_of(emp_id));
                LeaderboardRow {
                    rank: position + 1,
                    emp_id: emp_id.to_string(),
                    root_org_id: root.root_org_id,
                    root_org_name: root.root_org_name,
                    total_messages: total,
                }
            })
            .collect()
    }
}

/// Weekday message from a sender employed on the send date.
fn is_counted(index: &EmploymentIndex, message: &MessageEvent) -> bool {
    let date = message.sent_at.date();
    is_weekday(date) && index.is_employed(&message.sender_emp_id, date)
}

fn counts_by_week<'a>(
    index: &EmploymentIndex,
    messages: &'a [MessageEvent],
) -> BTreeMap<NaiveDate, SenderCounts<'a>> {
    let mut by_week: BTreeMap<NaiveDate, SenderCounts<'a>> = BTreeMap::new();
    for message in messages.iter().filter(|m| is_counted(index, m)) {
        *by_week
            .entry(week_start_of(message.sent_at.date()))
            .or_default()
            .entry(message.sender_emp_id.as_str())
            .or_insert(0) += 1;
    }
    by_week
}

/// Senders by count descending; equal counts are ordered by sender id
/// ascending so the ranking is deterministic.
fn rank_senders<'a>(senders: &SenderCounts<'a>) -> Vec<(&'a str, u64)> {
    let mut ranked: Vec<(&str, u64)> = senders.iter().map(|(emp, count)| (*emp, *count)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
}

/// Band for the sender at zero-based `position` among `user_count` senders,
/// using the percentile `position / user_count`:
/// top below 0.2, middle below 0.8, bottom otherwise.
pub fn segment_for(position: usize, user_count: usize) -> Segment {
    // integer form of position/user_count < 0.2 and < 0.8
    if position * 5 < user_count {
        Segment::Top20
    } else if position * 5 < user_count * 4 {
        Segment::Middle60
    } else {
        Segment::Bottom20
    }
}
