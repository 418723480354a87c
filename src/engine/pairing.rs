//! Manual pairing edits, the lock flag and per-round eligibility.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::cascade::clear_downstream;
use super::seeding::qualifiers;
use super::standings::group_standings;
use super::{context, Engine, EngineError};
use crate::models::{
    parse_round, CategoryId, Format, Match, MatchId, RoundKey, RoundRef, Stage, Tournament,
    TournamentId, UserId,
};
use crate::storage::Tables;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PairingInput {
    #[serde(default)]
    pub player1_id: Option<UserId>,
    #[serde(default)]
    pub player2_id: Option<UserId>,
    #[serde(default)]
    pub referee_id: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibleEntrant {
    pub user_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Already paired in some match of the round
    pub assigned: bool,
}

/// Entrants feeding the knockout base round.
pub(crate) fn knockout_pool(
    tables: &Tables,
    tournament: &Tournament,
    category_id: &CategoryId,
) -> Result<Vec<UserId>, EngineError> {
    match tournament.settings.format {
        Format::KoOnly => Ok(tables.accepted_entrants(&tournament.id, category_id)),
        Format::GroupsKo => {
            let standings = group_standings(
                tables.matches_in(&tournament.id, category_id),
                &tables.match_sets,
            );
            if standings.is_empty() {
                return Err(EngineError::NoGroupData);
            }
            let (winners, runners_up) =
                qualifiers(&standings, tournament.settings.qualifiers_per_group);
            Ok(winners
                .into_iter()
                .chain(runners_up)
                .map(|q| q.user_id)
                .collect())
        }
    }
}

fn earliest_round(tables: &Tables, tournament_id: &TournamentId, category_id: &CategoryId) -> Option<RoundKey> {
    tables
        .matches_in(tournament_id, category_id)
        .filter_map(Match::round_key)
        .min()
}

/// Who may be placed into `round`: the pool for the base round, the
/// previous round's winners after it, semifinal losers for the
/// 3rd-place match.
fn eligible_ids(
    tables: &Tables,
    tournament: &Tournament,
    category_id: &CategoryId,
    round: RoundRef,
) -> Result<Vec<UserId>, EngineError> {
    let in_round = move |key: RoundKey| {
        tables
            .matches_in(&tournament.id, category_id)
            .filter(move |m| m.round_key() == Some(key))
    };

    match round {
        RoundRef::Bronze => Ok(in_round(RoundKey::SF)
            .filter_map(|m| m.loser_id().cloned())
            .collect()),
        RoundRef::Knockout(key) => {
            let base = earliest_round(tables, &tournament.id, category_id);
            let previous = key.previous().filter(|_| base.is_some_and(|b| b < key));
            match previous {
                Some(prev) => {
                    let mut prior: Vec<&Match> = in_round(prev).collect();
                    prior.sort_by_key(|m| m.slot_index());
                    Ok(prior.into_iter().filter_map(|m| m.winner_id.clone()).collect())
                }
                None => knockout_pool(tables, tournament, category_id),
            }
        }
    }
}

impl Engine {
    /// Entrants that may be placed into `round` of the tournament.
    pub fn eligible_players(
        &self,
        tournament_id: &TournamentId,
        round: &str,
    ) -> Result<Vec<EligibleEntrant>, EngineError> {
        let round_ref =
            parse_round(round).ok_or_else(|| EngineError::InvalidRound(round.to_string()))?;

        self.store.read(|tables| -> Result<Vec<EligibleEntrant>, EngineError> {
            let (tournament, category_id) = context(tables, tournament_id)?;
            let ids = eligible_ids(tables, &tournament, &category_id, round_ref)?;
            let round_matches: Vec<&Match> = tables
                .matches_in(tournament_id, &category_id)
                .filter(|m| match round_ref {
                    RoundRef::Knockout(key) => m.round_key() == Some(key),
                    RoundRef::Bronze => m.is_bronze(),
                })
                .collect();

            Ok(ids
                .into_iter()
                .map(|user_id| EligibleEntrant {
                    display_name: tables.display_name(&user_id).map(str::to_string),
                    assigned: round_matches.iter().any(|m| m.involves(&user_id)),
                    user_id,
                })
                .collect())
        })?
    }

    /// Replace a match's players and referee by hand.
    ///
    /// Knockout players must be eligible for the round and may appear in
    /// only one of its matches. Changing the players clears any result.
    pub fn assign_pairing(
        &self,
        match_id: &MatchId,
        input: PairingInput,
    ) -> Result<Match, EngineError> {
        let updated = self.store.transaction(|tables| -> Result<Match, EngineError> {
            let m = tables
                .match_by_id(match_id)
                .cloned()
                .ok_or_else(|| EngineError::MatchNotFound(match_id.clone()))?;
            if m.is_header() {
                return Err(EngineError::InvalidInput(
                    "group header rows take no players".to_string(),
                ));
            }
            if m.locked {
                return Err(EngineError::Locked(m.id));
            }
            if input.player1_id.is_some() && input.player1_id == input.player2_id {
                return Err(EngineError::InvalidInput(
                    "a player cannot meet themselves".to_string(),
                ));
            }
            if let Some(referee) = &input.referee_id {
                if input.player1_id.as_ref() == Some(referee)
                    || input.player2_id.as_ref() == Some(referee)
                {
                    return Err(EngineError::InvalidInput(
                        "the referee cannot play in the match".to_string(),
                    ));
                }
            }

            let players: Vec<&UserId> =
                [&input.player1_id, &input.player2_id].into_iter().flatten().collect();
            check_players(tables, &m, &players)?;

            let players_changed =
                m.player1_id != input.player1_id || m.player2_id != input.player2_id;
            let target = tables
                .match_mut(match_id)
                .ok_or_else(|| EngineError::MatchNotFound(match_id.clone()))?;
            target.player1_id = input.player1_id.clone();
            target.player2_id = input.player2_id.clone();
            target.referee_id = input.referee_id.clone();
            if players_changed {
                target.clear_result();
            }
            let out = target.clone();
            if players_changed {
                tables.replace_sets(match_id, Vec::new());
                clear_downstream(tables, match_id);
            }
            Ok(out)
        })?;

        info!(
            "Paired {}: {:?} vs {:?}",
            match_id, updated.player1_id, updated.player2_id
        );
        Ok(updated)
    }

    /// Freeze or release a match against pairing edits.
    pub fn set_locked(&self, match_id: &MatchId, locked: bool) -> Result<Match, EngineError> {
        self.store.transaction(|tables| -> Result<Match, EngineError> {
            let m = tables
                .match_mut(match_id)
                .ok_or_else(|| EngineError::MatchNotFound(match_id.clone()))?;
            m.locked = locked;
            info!("Match {} locked = {}", match_id, locked);
            Ok(m.clone())
        })
    }
}

fn check_players(tables: &Tables, m: &Match, players: &[&UserId]) -> Result<(), EngineError> {
    if players.is_empty() {
        return Ok(());
    }

    if m.stage == Stage::Group {
        let entrants = tables.accepted_entrants(&m.tournament_id, &m.category_id);
        return match players.iter().find(|p| !entrants.contains(**p)) {
            Some(p) => Err(EngineError::Conflict(format!("{p} is not an accepted entrant"))),
            None => Ok(()),
        };
    }

    let round = if m.is_bronze() {
        RoundRef::Bronze
    } else {
        let key = m
            .round_key()
            .ok_or_else(|| EngineError::InvalidRound(m.round.clone()))?;
        RoundRef::Knockout(key)
    };

    let tournament = tables
        .tournament(&m.tournament_id)
        .cloned()
        .ok_or_else(|| EngineError::TournamentNotFound(m.tournament_id.clone()))?;
    let eligible = eligible_ids(tables, &tournament, &m.category_id, round)?;
    if let Some(p) = players.iter().find(|p| !eligible.contains(**p)) {
        return Err(EngineError::Conflict(format!(
            "{p} is not eligible for {}",
            m.round
        )));
    }

    if let RoundRef::Knockout(key) = round {
        let clash = tables
            .matches_in(&m.tournament_id, &m.category_id)
            .filter(|other| other.id != m.id && other.round_key() == Some(key))
            .find_map(|other| players.iter().find(|p| other.involves(p)).map(|p| (other, p)));
        if let Some((other, p)) = clash {
            return Err(EngineError::Conflict(format!(
                "{p} already plays in {}",
                other.round
            )));
        }
    }

    Ok(())
}
