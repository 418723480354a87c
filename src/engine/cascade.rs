//! Advancement cascade.
//!
//! Once both matches of a sibling pair are finished, their winners are
//! written into the next round's match (the odd slot's winner becomes
//! player 1). Semifinal losers go into the 3rd-place match. A changed
//! pairing clears whatever the old one had already fed forward. The
//! cascade is idempotent and never fails: anything it cannot do is
//! reported, not raised.

use serde::Serialize;
use tracing::{debug, warn};

use super::bracket::locate_round_match;
use crate::models::{
    CategoryId, Match, MatchId, MatchStatus, ResultType, RoundKey, Stage, TournamentId, UserId,
};
use crate::storage::Tables;

/// What happened to one advancement target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Advance {
    /// The source match does not exist
    Missing,
    /// Not a finished knockout match with a known slot
    NotApplicable,
    /// Final or 3rd-place match; nothing follows
    Terminal,
    /// The sibling match has no winner yet
    Waiting,
    Filled { target: MatchId },
    Unchanged { target: MatchId },
    SkippedLocked { target: MatchId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CascadeOutcome {
    pub next: Advance,
    /// Set only when a semifinal pair completes
    pub bronze: Option<Advance>,
}

impl CascadeOutcome {
    fn only(next: Advance) -> Self {
        Self { next, bronze: None }
    }
}

/// Slot paired with `slot` in the same round.
pub fn sibling_slot(slot: u32) -> u32 {
    if slot % 2 == 1 {
        slot + 1
    } else {
        slot - 1
    }
}

/// Propagate the result of `match_id` one round forward.
pub fn cascade(tables: &mut Tables, match_id: &MatchId) -> CascadeOutcome {
    let Some(source) = tables.match_by_id(match_id).cloned() else {
        return CascadeOutcome::only(Advance::Missing);
    };
    if source.stage != Stage::Knockout || !source.is_finished() || source.winner_id.is_none() {
        return CascadeOutcome::only(Advance::NotApplicable);
    }
    if source.is_bronze() {
        return CascadeOutcome::only(Advance::Terminal);
    }
    let Some(key) = source.round_key() else {
        warn!("Cannot place {} ({:?}) in the knockout chain", source.id, source.round);
        return CascadeOutcome::only(Advance::NotApplicable);
    };
    let Some(next_key) = key.next() else {
        return CascadeOutcome::only(Advance::Terminal);
    };
    let Some(slot) = source.slot_index() else {
        warn!("Knockout match {} has no slot", source.id);
        return CascadeOutcome::only(Advance::NotApplicable);
    };

    let t = &source.tournament_id;
    let c = &source.category_id;
    let Some(sibling) = locate_round_match(tables, t, c, key, sibling_slot(slot))
        .map(|i| tables.matches[i].clone())
        .filter(|m| m.is_finished() && m.winner_id.is_some())
    else {
        return CascadeOutcome::only(Advance::Waiting);
    };

    let (odd, even) = if slot % 2 == 1 {
        (&source, &sibling)
    } else {
        (&sibling, &source)
    };

    let target_slot = (slot + 1) / 2;
    let idx = match locate_round_match(tables, t, c, next_key, target_slot) {
        Some(idx) => idx,
        None => {
            tables.matches.push(Match::knockout_placeholder(t, c, next_key, target_slot));
            tables.matches.len() - 1
        }
    };
    let next = place(tables, idx, odd.winner_id.clone(), even.winner_id.clone());
    debug!("{} {} -> {} {}: {:?}", key, slot, next_key, target_slot, next);

    let bronze = (key == RoundKey::SF).then(|| {
        let idx = bronze_index(tables, t, c);
        place(tables, idx, odd.loser_id().cloned(), even.loser_id().cloned())
    });

    CascadeOutcome { next, bronze }
}

fn bronze_index(tables: &mut Tables, tournament_id: &TournamentId, category_id: &CategoryId) -> usize {
    let existing = tables.matches.iter().position(|m| {
        &m.tournament_id == tournament_id && &m.category_id == category_id && m.is_bronze()
    });
    match existing {
        Some(idx) => idx,
        None => {
            tables
                .matches
                .push(Match::bronze_placeholder(tournament_id, category_id));
            tables.matches.len() - 1
        }
    }
}

/// Write a pairing into `tables.matches[idx]`, resetting any result the
/// previous pairing had along with everything that result fed forward.
/// A pairing with a single entrant is resolved as a BYE walkover.
fn place(tables: &mut Tables, idx: usize, player1: Option<UserId>, player2: Option<UserId>) -> Advance {
    let target = &mut tables.matches[idx];
    let id = target.id.clone();
    if target.locked {
        return Advance::SkippedLocked { target: id };
    }
    if target.player1_id == player1 && target.player2_id == player2 {
        return Advance::Unchanged { target: id };
    }

    target.player1_id = player1;
    target.player2_id = player2;
    target.clear_result();
    if target.is_bye() {
        target.winner_id = target.player1_id.clone().or_else(|| target.player2_id.clone());
        target.result_type = ResultType::Walkover;
        target.status = MatchStatus::Finished;
    }
    tables.replace_sets(&id, Vec::new());
    clear_downstream(tables, &id);
    Advance::Filled { target: id }
}

/// Empty the side of `tables.matches[idx]` fed from `from_slot` and drop
/// its result. Returns false when the row is locked or had nothing to
/// lose, which ends the walk.
fn vacate(tables: &mut Tables, idx: usize, from_slot: u32) -> bool {
    let target = &mut tables.matches[idx];
    if target.locked {
        debug!("Stopping downstream clear at locked match {}", target.id);
        return false;
    }
    let side = if from_slot % 2 == 1 {
        &mut target.player1_id
    } else {
        &mut target.player2_id
    };
    if side.is_none() && target.winner_id.is_none() {
        return false;
    }
    *side = None;
    target.clear_result();
    let id = target.id.clone();
    tables.replace_sets(&id, Vec::new());
    true
}

/// Undo what `match_id` fed forward after its pairing or result changed:
/// its side of the next-round match, that match's result, and so on up
/// to the final. Semifinals also vacate their side of the 3rd-place
/// match. Locked rows are left alone and stop the walk. Returns the
/// number of rows touched.
pub fn clear_downstream(tables: &mut Tables, match_id: &MatchId) -> usize {
    let Some(mut current) = tables.match_by_id(match_id).cloned() else {
        return 0;
    };
    let mut touched = 0;
    loop {
        if current.stage != Stage::Knockout || current.is_bronze() {
            break;
        }
        let (Some(key), Some(slot)) = (current.round_key(), current.slot_index()) else {
            break;
        };
        let t = &current.tournament_id;
        let c = &current.category_id;

        if key == RoundKey::SF {
            let bronze = tables.matches.iter().position(|m| {
                &m.tournament_id == t && &m.category_id == c && m.is_bronze()
            });
            if let Some(idx) = bronze {
                if vacate(tables, idx, slot) {
                    touched += 1;
                }
            }
        }

        let Some(next_key) = key.next() else {
            break;
        };
        let Some(idx) = locate_round_match(tables, t, c, next_key, (slot + 1) / 2) else {
            break;
        };
        if !vacate(tables, idx, slot) {
            break;
        }
        touched += 1;
        current = tables.matches[idx].clone();
    }
    if touched > 0 {
        debug!("Cleared {} rows downstream of {}", touched, match_id);
    }
    touched
}
