//! Tournament progression and scheduling engine.
//!
//! - **standings**: per-group rankings derived from finished group matches
//! - **seeding**: seed-position tables and qualifier cross-pairing
//! - **bracket**: group/knockout generation and knockout seeding
//! - **cascade**: winner propagation and the 3rd-place match
//! - **results**: score entry (triggers the cascade)
//! - **pairing**: manual pairing, lock flag, eligible lists
//! - **reset**: group/knockout teardown
//! - **schedule**: greedy court/time-slot assignment
//! - **roster**: import of the read-only tournament/registration records
//!
//! Every mutating operation runs inside one [`Store::transaction`], so a
//! failure leaves no partial state behind.

pub mod bracket;
pub mod cascade;
pub mod pairing;
pub mod reset;
pub mod results;
pub mod roster;
pub mod schedule;
pub mod seeding;
pub mod standings;

use std::sync::Arc;

use thiserror::Error;

use crate::models::{CategoryId, Match, MatchId, Stage, Tournament, TournamentId};
use crate::storage::{StorageError, Store, Tables};

/// Errors surfaced to callers. Best-effort cascade outcomes are not
/// errors and never appear here.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Tournament not found: {0}")]
    TournamentNotFound(TournamentId),

    #[error("Match not found: {0}")]
    MatchNotFound(MatchId),

    #[error("Tournament {0} has no category")]
    NoCategory(TournamentId),

    #[error("Not enough entrants: need at least 2, got {0}")]
    NotEnoughEntrants(usize),

    #[error("{0} entrants do not fill a power-of-two bracket and BYEs are disabled")]
    ByesDisabled(usize),

    #[error("Bracket too large: {0} entrants exceed 128 slots")]
    BracketTooLarge(usize),

    #[error("No group standings to seed the knockout stage from")]
    NoGroupData,

    #[error("Unknown round: {0}")]
    InvalidRound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Match {0} is locked")]
    Locked(MatchId),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Entry point for all engine operations. Cheap to clone.
#[derive(Clone)]
pub struct Engine {
    store: Arc<Store>,
}

impl Engine {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// All matches of a tournament ordered by stage, round order and slot.
    pub fn list_matches(&self, tournament_id: &TournamentId) -> Result<Vec<Match>, EngineError> {
        let matches = self.store.read(|tables| {
            tables.tournament(tournament_id)?;
            let mut out: Vec<Match> = tables
                .matches
                .iter()
                .filter(|m| &m.tournament_id == tournament_id)
                .cloned()
                .collect();
            out.sort_by(|a, b| {
                stage_rank(a.stage)
                    .cmp(&stage_rank(b.stage))
                    .then_with(|| a.round_order.cmp(&b.round_order))
                    .then_with(|| a.round.cmp(&b.round))
                    .then_with(|| a.slot.cmp(&b.slot))
                    .then_with(|| a.id.cmp(&b.id))
            });
            Some(out)
        })?;
        matches.ok_or_else(|| EngineError::TournamentNotFound(tournament_id.clone()))
    }
}

fn stage_rank(stage: Stage) -> u8 {
    match stage {
        Stage::Group => 0,
        Stage::Knockout => 1,
    }
}

/// Tournament record plus the category generation works in.
pub(crate) fn context(
    tables: &Tables,
    tournament_id: &TournamentId,
) -> Result<(Tournament, CategoryId), EngineError> {
    let tournament = tables
        .tournament(tournament_id)
        .cloned()
        .ok_or_else(|| EngineError::TournamentNotFound(tournament_id.clone()))?;
    let category = tables
        .active_category(tournament_id)
        .map(|c| c.id.clone())
        .ok_or_else(|| EngineError::NoCategory(tournament_id.clone()))?;
    Ok((tournament, category))
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn test_context_requires_category() {
        let mut tables = tables_with(ko_settings(true), 4);
        tables.categories.clear();

        let err = context(&tables, &tid()).unwrap_err();
        assert!(matches!(err, EngineError::NoCategory(_)));
    }

    #[test]
    fn test_context_unknown_tournament() {
        let tables = tables_with(ko_settings(true), 4);
        let err = context(&tables, &"missing".into()).unwrap_err();
        assert!(matches!(err, EngineError::TournamentNotFound(_)));
    }

    #[test]
    fn test_list_matches_unknown_tournament() {
        let engine = engine_with(Tables::default());
        assert!(matches!(
            engine.list_matches(&tid()),
            Err(EngineError::TournamentNotFound(_))
        ));
    }
}
