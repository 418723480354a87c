//! Teardown of the group phase and of knockout rounds.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{Engine, EngineError};
use crate::models::{parse_round, Format, Match, RoundKey, RoundRef, Stage, TournamentId};
use crate::storage::Tables;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupResetOutcome {
    /// Rows touched in total
    pub cleared: usize,
    /// Group rows (headers included) deleted
    pub groups: usize,
    /// Knockout rows deleted
    pub ko: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetMode {
    /// Rows removed; `KO_ONLY` brackets are regenerated from scratch
    Deleted,
    /// Rows kept as empty placeholders; the `GROUPS_KO` skeleton survives
    Reset,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnockoutResetOutcome {
    pub cleared: usize,
    pub mode: ResetMode,
    /// Canonical label of the first round reset
    pub from: String,
}

/// Empty a match in place and drop its sets.
fn clear_in_place(tables: &mut Tables, predicate: impl Fn(&Match) -> bool) -> usize {
    let mut cleared = Vec::new();
    for m in tables.matches.iter_mut().filter(|m| predicate(m)) {
        m.clear_all();
        cleared.push(m.id.clone());
    }
    tables.match_sets.retain(|s| !cleared.contains(&s.match_id));
    cleared.len()
}

/// Whether `m` lies at or after `from` in the knockout chain. The
/// 3rd-place match counts as part of the semifinal's successors.
fn from_round(m: &Match, from: RoundRef) -> bool {
    if m.stage != Stage::Knockout {
        return false;
    }
    match from {
        RoundRef::Bronze => m.is_bronze(),
        RoundRef::Knockout(key) => {
            if m.is_bronze() {
                return key <= RoundKey::SF;
            }
            m.round_key().is_some_and(|k| k >= key)
        }
    }
}

impl Engine {
    /// Delete every group row of the tournament, and with
    /// `also_knockout` every knockout row as well. Sets go with them.
    pub fn reset_group_phase(
        &self,
        tournament_id: &TournamentId,
        also_knockout: bool,
    ) -> Result<GroupResetOutcome, EngineError> {
        let outcome = self.store.transaction(|tables| -> Result<GroupResetOutcome, EngineError> {
            if tables.tournament(tournament_id).is_none() {
                return Err(EngineError::TournamentNotFound(tournament_id.clone()));
            }
            let groups = tables.delete_matches(|m| {
                &m.tournament_id == tournament_id && m.stage == Stage::Group
            });
            let ko = if also_knockout {
                tables.delete_matches(|m| {
                    &m.tournament_id == tournament_id && m.stage == Stage::Knockout
                })
            } else {
                0
            };
            Ok(GroupResetOutcome {
                cleared: groups + ko,
                groups,
                ko,
            })
        })?;

        info!(
            "Reset group phase of {}: {} group rows and {} knockout rows deleted",
            tournament_id, outcome.groups, outcome.ko
        );
        Ok(outcome)
    }

    /// Reset `round` and every later knockout round.
    ///
    /// `KO_ONLY` tournaments lose the rows; `GROUPS_KO` tournaments keep
    /// them as empty placeholders, lock flag included.
    pub fn reset_knockout_from_round(
        &self,
        tournament_id: &TournamentId,
        round: &str,
    ) -> Result<KnockoutResetOutcome, EngineError> {
        let from =
            parse_round(round).ok_or_else(|| EngineError::InvalidRound(round.to_string()))?;
        let label = match from {
            RoundRef::Knockout(key) => key.label().to_string(),
            RoundRef::Bronze => crate::models::BRONZE_LABEL.to_string(),
        };

        let outcome = self.store.transaction(|tables| -> Result<KnockoutResetOutcome, EngineError> {
            let format = tables
                .tournament(tournament_id)
                .map(|t| t.settings.format)
                .ok_or_else(|| EngineError::TournamentNotFound(tournament_id.clone()))?;
            let targets = |m: &Match| &m.tournament_id == tournament_id && from_round(m, from);

            let (cleared, mode) = match format {
                Format::KoOnly => (tables.delete_matches(targets), ResetMode::Deleted),
                Format::GroupsKo => (clear_in_place(tables, targets), ResetMode::Reset),
            };
            Ok(KnockoutResetOutcome {
                cleared,
                mode,
                from: label,
            })
        })?;

        info!(
            "Reset knockout of {} from {}: {} rows ({:?})",
            tournament_id, outcome.from, outcome.cleared, outcome.mode
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::bracket::SeedOptions;
    use crate::engine::testing::*;
    use crate::models::MatchStatus;
    use pretty_assertions::assert_eq;

    fn knockout_rows(engine: &Engine) -> usize {
        engine
            .store()
            .read(|t| t.matches.iter().filter(|m| m.stage == Stage::Knockout).count())
            .unwrap()
    }

    /// Eight-entrant bracket with all quarterfinals and semifinals played.
    fn played_to_final(settings_groups: bool) -> Engine {
        let engine = if settings_groups {
            let mut tables = tables_with(groups_settings(4, 2), 0);
            crate::engine::bracket::ensure_placeholders(&mut tables, &tid(), &cid(), RoundKey::QF);
            let mut entrants = (1..=8).map(|i| user(&format!("p{i}")));
            for slot in 1..=4 {
                let id = find_round_match(&tables, RoundKey::QF, slot).id;
                let m = tables.match_mut(&id).unwrap();
                m.player1_id = entrants.next();
                m.player2_id = entrants.next();
            }
            engine_with(tables)
        } else {
            let engine = engine_with(tables_with(ko_settings(true), 8));
            engine.seed_knockout(&tid(), SeedOptions::default()).unwrap();
            engine
        };

        for key in [RoundKey::QF, RoundKey::SF] {
            for slot in 1..=key.pair_count() {
                let (id, winner) = engine
                    .store()
                    .read(|t| {
                        let m = find_round_match(t, key, slot);
                        (m.id.clone(), m.player1_id.clone().unwrap())
                    })
                    .unwrap();
                engine
                    .store()
                    .transaction(|t| {
                        finish(t, &id, &winner);
                        Ok::<_, EngineError>(crate::engine::cascade::cascade(t, &id))
                    })
                    .unwrap();
            }
        }
        engine
    }

    #[test]
    fn test_ko_only_reset_deletes_rows() {
        let engine = played_to_final(false);
        // 4 QF + 2 SF + F + bronze
        assert_eq!(knockout_rows(&engine), 8);

        let outcome = engine.reset_knockout_from_round(&tid(), "Półfinał").unwrap();

        assert_eq!(outcome.mode, ResetMode::Deleted);
        assert_eq!(outcome.from, "Półfinał");
        assert_eq!(outcome.cleared, 4);
        assert_eq!(knockout_rows(&engine), 4);
    }

    #[test]
    fn test_groups_ko_reset_keeps_rows() {
        let engine = played_to_final(true);
        let before = knockout_rows(&engine);

        let outcome = engine.reset_knockout_from_round(&tid(), "sf").unwrap();

        assert_eq!(outcome.mode, ResetMode::Reset);
        assert_eq!(outcome.cleared, 4);
        assert_eq!(knockout_rows(&engine), before);
        engine
            .store()
            .read(|t| {
                let semis = round_matches(t, RoundKey::SF);
                assert!(semis.iter().all(|m| m.has_no_players()));
                assert!(semis.iter().all(|m| m.status == MatchStatus::Scheduled));
                assert!(semis.iter().all(|m| t.sets_for(&m.id).is_empty()));
                // Quarterfinal results stay.
                assert!(round_matches(t, RoundKey::QF).iter().all(|m| m.is_finished()));
            })
            .unwrap();
    }

    #[test]
    fn test_final_reset_leaves_bronze() {
        let engine = played_to_final(true);

        let outcome = engine.reset_knockout_from_round(&tid(), "Finał").unwrap();

        assert_eq!(outcome.cleared, 1);
        let bronze_paired = engine
            .store()
            .read(|t| t.matches.iter().any(|m| m.is_bronze() && !m.has_no_players()))
            .unwrap();
        assert!(bronze_paired);
    }

    #[test]
    fn test_unknown_round_is_rejected() {
        let engine = played_to_final(false);
        assert!(matches!(
            engine.reset_knockout_from_round(&tid(), "warm-up"),
            Err(EngineError::InvalidRound(_))
        ));
    }

    #[test]
    fn test_group_reset_allows_regeneration() {
        let engine = engine_with(tables_with(groups_settings(4, 2), 8));
        engine.generate_groups_and_knockout_skeleton(&tid()).unwrap();

        let outcome = engine.reset_group_phase(&tid(), false).unwrap();

        assert_eq!(outcome.groups, 2 + 12);
        assert_eq!(outcome.ko, 0);
        assert_eq!(knockout_rows(&engine), 3);
        assert!(engine.generate_groups_and_knockout_skeleton(&tid()).is_ok());
    }

    #[test]
    fn test_group_reset_with_knockout_deletes_everything() {
        let mut tables = tables_with(groups_settings(4, 2), 8);
        tables.tournaments.push(crate::models::Tournament {
            id: "t-2".into(),
            name: "Other".to_string(),
            settings: groups_settings(4, 2),
        });
        tables
            .matches
            .push(Match::knockout_placeholder(&"t-2".into(), &cid(), RoundKey::F, 1));
        let engine = engine_with(tables);
        engine.generate_groups_and_knockout_skeleton(&tid()).unwrap();

        let outcome = engine.reset_group_phase(&tid(), true).unwrap();

        assert_eq!(outcome.ko, 3);
        assert_eq!(outcome.cleared, 2 + 12 + 3);
        // Only the other tournament's row is left.
        assert_eq!(engine.store().read(|t| t.matches.len()).unwrap(), 1);
    }

    #[test]
    fn test_group_reset_unknown_tournament() {
        let engine = engine_with(tables_with(groups_settings(4, 2), 0));
        assert!(matches!(
            engine.reset_group_phase(&"nope".into(), false),
            Err(EngineError::TournamentNotFound(_))
        ));
    }
}
