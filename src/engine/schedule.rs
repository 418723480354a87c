//! Greedy court/time-slot assignment.
//!
//! Candidates are queued (group matches in waves across groups, then
//! knockout matches by round) and drained slot by slot, lane by lane.
//! Lanes double as court numbers. When a day's window is used up the
//! next day opens with the same window.

use std::collections::{BTreeSet, HashSet};

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::standings::group_sort_key;
use super::{Engine, EngineError};
use crate::config::{parse_clock, SchedulingDefaults};
use crate::models::{CategoryId, Match, MatchId, MatchStatus, RoundKey, Stage, TournamentId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleOptions {
    pub start_day: Option<NaiveDate>,
    pub day_start: NaiveTime,
    pub day_end: NaiveTime,
    pub courts: u32,
    pub referees: u32,
    pub duration_min: u32,
    pub include_groups: bool,
    pub include_ko: bool,
    pub overwrite_existing: bool,
    pub place_bronze_before_final: bool,
}

fn default_true() -> bool {
    true
}

/// Schedule options as callers send them. Omitted fields fall back to
/// the configured [`SchedulingDefaults`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRequest {
    #[serde(default)]
    pub start_day: Option<NaiveDate>,
    #[serde(default)]
    pub day_start: Option<String>,
    #[serde(default)]
    pub day_end: Option<String>,
    #[serde(default)]
    pub courts: Option<u32>,
    #[serde(default)]
    pub referees: Option<u32>,
    #[serde(default)]
    pub duration_min: Option<u32>,
    #[serde(default = "default_true")]
    pub include_groups: bool,
    #[serde(default = "default_true")]
    pub include_ko: bool,
    #[serde(default)]
    pub overwrite_existing: bool,
    #[serde(default)]
    pub place_bronze_before_final: bool,
}

impl Default for ScheduleRequest {
    fn default() -> Self {
        Self {
            start_day: None,
            day_start: None,
            day_end: None,
            courts: None,
            referees: None,
            duration_min: None,
            include_groups: true,
            include_ko: true,
            overwrite_existing: false,
            place_bronze_before_final: false,
        }
    }
}

impl ScheduleRequest {
    pub fn resolve(self, defaults: &SchedulingDefaults) -> Result<ScheduleOptions, EngineError> {
        let clock = |field: &str, value: Option<String>, fallback: &str| {
            let raw = value.unwrap_or_else(|| fallback.to_string());
            parse_clock(&raw).ok_or_else(|| {
                EngineError::InvalidInput(format!("{field} must be HH:MM, got {raw:?}"))
            })
        };
        Ok(ScheduleOptions {
            start_day: self.start_day,
            day_start: clock("day_start", self.day_start, &defaults.day_start)?,
            day_end: clock("day_end", self.day_end, &defaults.day_end)?,
            courts: self.courts.unwrap_or(defaults.courts),
            referees: self.referees.unwrap_or(defaults.referees),
            duration_min: self.duration_min.unwrap_or(defaults.duration_min),
            include_groups: self.include_groups,
            include_ko: self.include_ko,
            overwrite_existing: self.overwrite_existing,
            place_bronze_before_final: self.place_bronze_before_final,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleOutcome {
    pub scheduled: usize,
    pub days_used: usize,
    pub slot_minutes: u32,
    pub courts: u32,
    pub referees: u32,
    /// Concurrent lanes per slot
    pub capacity: u32,
}

/// Start times of every slot that fits entirely inside the window.
fn slot_starts(day_start: NaiveTime, day_end: NaiveTime, duration_min: u32) -> Vec<NaiveTime> {
    let step = Duration::minutes(i64::from(duration_min));
    let mut out = Vec::new();
    let mut t = day_start;
    loop {
        let (end, wrapped) = t.overflowing_add_signed(step);
        if wrapped != 0 || end > day_end {
            break;
        }
        out.push(t);
        t = end;
    }
    out
}

fn is_candidate(m: &Match, options: &ScheduleOptions) -> bool {
    if m.is_header() || m.winner_id.is_some() || m.is_bye() {
        return false;
    }
    if !matches!(m.status, MatchStatus::Scheduled | MatchStatus::InProgress) {
        return false;
    }
    let stage_included = match m.stage {
        Stage::Group => options.include_groups,
        Stage::Knockout => options.include_ko,
    };
    stage_included && (options.overwrite_existing || !m.is_scheduled())
}

/// Group matches interleaved one per group per wave, then knockout
/// matches by round with the 3rd-place match beside the final.
fn build_queue(candidates: &[&Match], bronze_before_final: bool) -> Vec<MatchId> {
    let mut groups: Vec<(&CategoryId, &str, Vec<&Match>)> = Vec::new();
    for m in candidates.iter().copied().filter(|m| m.stage == Stage::Group) {
        match groups
            .iter_mut()
            .find(|(c, g, _)| *c == &m.category_id && *g == m.round.as_str())
        {
            Some((_, _, list)) => list.push(m),
            None => groups.push((&m.category_id, m.round.as_str(), vec![m])),
        }
    }
    groups.sort_by(|a, b| a.0.cmp(b.0).then_with(|| group_sort_key(a.1).cmp(&group_sort_key(b.1))));
    for (_, _, list) in &mut groups {
        list.sort_by(|a, b| a.round_order.cmp(&b.round_order).then_with(|| a.id.cmp(&b.id)));
    }

    let mut queue = Vec::with_capacity(candidates.len());
    let longest = groups.iter().map(|(_, _, l)| l.len()).max().unwrap_or(0);
    for wave in 0..longest {
        for (_, _, list) in &groups {
            if let Some(m) = list.get(wave) {
                queue.push(m.id.clone());
            }
        }
    }

    let final_order = RoundKey::F.round_order();
    let mut knockout: Vec<&Match> = candidates
        .iter()
        .copied()
        .filter(|m| m.stage == Stage::Knockout)
        .collect();
    let bronze_rank = |m: &Match| -> u8 {
        match (m.is_bronze(), bronze_before_final) {
            (true, true) => 0,
            (true, false) => 2,
            (false, _) => 1,
        }
    };
    knockout.sort_by(|a, b| {
        a.round_order
            .cmp(&b.round_order)
            .then_with(|| {
                if a.round_order == final_order && b.round_order == final_order {
                    bronze_rank(*a).cmp(&bronze_rank(*b))
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .then_with(|| a.slot_index().cmp(&b.slot_index()))
            .then_with(|| a.category_id.cmp(&b.category_id))
            .then_with(|| a.id.cmp(&b.id))
    });
    queue.extend(knockout.into_iter().map(|m| m.id.clone()));
    queue
}

impl Engine {
    /// Assign start time, court and duration to every unscheduled match
    /// of the tournament, in one transaction.
    pub fn auto_schedule(
        &self,
        tournament_id: &TournamentId,
        options: ScheduleOptions,
    ) -> Result<ScheduleOutcome, EngineError> {
        let start_day = options
            .start_day
            .ok_or_else(|| EngineError::InvalidInput("start_day is required".to_string()))?;
        let capacity = options.courts.min(options.referees);
        if capacity == 0 {
            return Err(EngineError::InvalidInput(
                "at least one court and one referee are required".to_string(),
            ));
        }
        if options.duration_min == 0 {
            return Err(EngineError::InvalidInput(
                "duration_min must be positive".to_string(),
            ));
        }
        let starts = slot_starts(options.day_start, options.day_end, options.duration_min);
        if starts.is_empty() {
            return Err(EngineError::InvalidInput(format!(
                "day window {}-{} does not fit one {}-minute slot",
                options.day_start, options.day_end, options.duration_min
            )));
        }

        let outcome = self.store.transaction(|tables| -> Result<ScheduleOutcome, EngineError> {
            if tables.tournament(tournament_id).is_none() {
                return Err(EngineError::TournamentNotFound(tournament_id.clone()));
            }

            let (candidates, others): (Vec<&Match>, Vec<&Match>) = tables
                .matches
                .iter()
                .filter(|m| &m.tournament_id == tournament_id)
                .partition(|m| is_candidate(m, &options));
            let occupied: HashSet<(NaiveDateTime, String)> = others
                .iter()
                .filter_map(|m| Some((m.scheduled_at?, m.court.clone()?)))
                .collect();
            let queue = build_queue(&candidates, options.place_bronze_before_final);
            debug!(
                "Scheduling {} candidates around {} occupied lanes",
                queue.len(),
                occupied.len()
            );

            let mut placements: Vec<(MatchId, NaiveDateTime, String)> = Vec::new();
            let mut pending = queue.into_iter();
            let mut next = pending.next();
            let mut day = start_day;
            'days: while next.is_some() {
                for start in &starts {
                    let at = day.and_time(*start);
                    for lane in 1..=capacity {
                        let court = lane.to_string();
                        if occupied.contains(&(at, court.clone())) {
                            continue;
                        }
                        let Some(id) = next.take() else {
                            break 'days;
                        };
                        placements.push((id, at, court));
                        next = pending.next();
                    }
                }
                day = day
                    .succ_opt()
                    .ok_or_else(|| EngineError::InvalidInput("calendar overflow".to_string()))?;
            }

            let days: BTreeSet<NaiveDate> = placements.iter().map(|(_, at, _)| at.date()).collect();
            for (id, at, court) in &placements {
                if let Some(m) = tables.match_mut(id) {
                    m.scheduled_at = Some(*at);
                    m.court = Some(court.clone());
                    m.duration_min = Some(options.duration_min);
                }
            }

            Ok(ScheduleOutcome {
                scheduled: placements.len(),
                days_used: days.len(),
                slot_minutes: options.duration_min,
                courts: options.courts,
                referees: options.referees,
                capacity,
            })
        })?;

        info!(
            "Scheduled {} matches of {} over {} day(s), {} lanes per slot",
            outcome.scheduled, tournament_id, outcome.days_used, outcome.capacity
        );
        Ok(outcome)
    }
}
