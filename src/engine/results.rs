//! Score entry.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::cascade::cascade;
use super::{Engine, EngineError};
use crate::models::{Match, MatchId, MatchSet, MatchStatus, ResultType, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetScore {
    pub player1_games: u32,
    pub player2_games: u32,
}

/// A result submitted for one match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultInput {
    #[serde(default)]
    pub sets: Vec<SetScore>,

    /// Decides the match without a score
    #[serde(default)]
    pub walkover_winner_id: Option<UserId>,

    #[serde(default)]
    pub result_type: ResultType,
}

/// Winner and result type implied by `input` for `m`.
fn decide(m: &Match, input: &ResultInput) -> Result<(UserId, ResultType), EngineError> {
    let (Some(p1), Some(p2)) = (&m.player1_id, &m.player2_id) else {
        return Err(EngineError::InvalidInput(format!(
            "match {} does not have two players",
            m.id
        )));
    };

    if let Some(winner) = &input.walkover_winner_id {
        if winner != p1 && winner != p2 {
            return Err(EngineError::InvalidInput(format!(
                "{} does not play in match {}",
                winner, m.id
            )));
        }
        let result_type = match input.result_type {
            ResultType::Normal => ResultType::Walkover,
            other => other,
        };
        return Ok((winner.clone(), result_type));
    }

    if input.result_type.is_shortcut() {
        return Err(EngineError::InvalidInput(
            "a walkover-style result needs walkover_winner_id".to_string(),
        ));
    }
    if input.sets.is_empty() {
        return Err(EngineError::InvalidInput("no sets given".to_string()));
    }

    let mut p1_sets = 0;
    let mut p2_sets = 0;
    for (i, set) in input.sets.iter().enumerate() {
        match set.player1_games.cmp(&set.player2_games) {
            std::cmp::Ordering::Greater => p1_sets += 1,
            std::cmp::Ordering::Less => p2_sets += 1,
            std::cmp::Ordering::Equal => {
                return Err(EngineError::InvalidInput(format!("set {} is level", i + 1)));
            }
        }
    }
    if p1_sets == p2_sets {
        return Err(EngineError::InvalidInput(
            "sets are split evenly; no winner".to_string(),
        ));
    }

    let winner = if p1_sets > p2_sets { p1 } else { p2 };
    Ok((winner.clone(), ResultType::Normal))
}

impl Engine {
    /// Store a result and run the advancement cascade.
    ///
    /// The result is committed first; the cascade runs in its own
    /// transaction and a failure there only logs a warning.
    pub fn record_match_result(
        &self,
        match_id: &MatchId,
        input: ResultInput,
    ) -> Result<Match, EngineError> {
        let updated = self.store.transaction(|tables| -> Result<Match, EngineError> {
            let m = tables
                .match_by_id(match_id)
                .ok_or_else(|| EngineError::MatchNotFound(match_id.clone()))?;
            if m.is_header() {
                return Err(EngineError::InvalidInput(
                    "group header rows take no result".to_string(),
                ));
            }
            let (winner, result_type) = decide(m, &input)?;

            let sets: Vec<MatchSet> = input
                .sets
                .iter()
                .enumerate()
                .map(|(i, s)| {
                    MatchSet::new(match_id.clone(), i as u32 + 1, s.player1_games, s.player2_games)
                })
                .collect();
            tables.replace_sets(match_id, sets);

            let m = tables
                .match_mut(match_id)
                .ok_or_else(|| EngineError::MatchNotFound(match_id.clone()))?;
            m.winner_id = Some(winner);
            m.result_type = result_type;
            m.status = MatchStatus::Finished;
            Ok(m.clone())
        })?;

        info!(
            "Recorded result for {} ({:?}, winner {:?})",
            match_id, updated.result_type, updated.winner_id
        );

        let cascaded = self.store.transaction(|tables| {
            Ok::<_, EngineError>(cascade(tables, match_id))
        });
        match cascaded {
            Ok(outcome) => info!("Cascade after {}: {:?}", match_id, outcome),
            Err(e) => warn!("Cascade after {} failed: {}", match_id, e),
        }

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::bracket::SeedOptions;
    use crate::engine::testing::*;
    use crate::models::RoundKey;
    use pretty_assertions::assert_eq;

    fn score(sets: &[(u32, u32)]) -> ResultInput {
        ResultInput {
            sets: sets
                .iter()
                .map(|&(a, b)| SetScore {
                    player1_games: a,
                    player2_games: b,
                })
                .collect(),
            ..Default::default()
        }
    }

    fn seeded_four() -> (Engine, MatchId, MatchId) {
        let engine = engine_with(tables_with(ko_settings(false), 4));
        engine.seed_knockout(&tid(), SeedOptions::default()).unwrap();
        let (sf1, sf2) = engine
            .store()
            .read(|t| {
                (
                    find_round_match(t, RoundKey::SF, 1).id,
                    find_round_match(t, RoundKey::SF, 2).id,
                )
            })
            .unwrap();
        (engine, sf1, sf2)
    }

    #[test]
    fn test_scored_result_finishes_match() {
        let (engine, sf1, _) = seeded_four();

        let m = engine
            .record_match_result(&sf1, score(&[(6, 4), (3, 6), (7, 5)]))
            .unwrap();

        assert_eq!(m.status, MatchStatus::Finished);
        assert_eq!(m.winner_id, Some(user("p1")));
        assert_eq!(m.result_type, ResultType::Normal);
        let sets = engine.store().read(|t| t.sets_for(&sf1).len()).unwrap();
        assert_eq!(sets, 3);
    }

    #[test]
    fn test_both_semis_fill_final() {
        let (engine, sf1, sf2) = seeded_four();

        engine.record_match_result(&sf1, score(&[(6, 1), (6, 1)])).unwrap();
        engine.record_match_result(&sf2, score(&[(1, 6), (1, 6)])).unwrap();

        engine
            .store()
            .read(|t| {
                let fin = find_round_match(t, RoundKey::F, 1);
                assert_eq!(fin.player1_id, Some(user("p1")));
                assert_eq!(fin.player2_id, Some(user("p2")));
                assert!(t.matches.iter().any(|m| m.is_bronze()));
            })
            .unwrap();
    }

    #[test]
    fn test_walkover_needs_participant() {
        let (engine, sf1, _) = seeded_four();

        let bad = ResultInput {
            walkover_winner_id: Some(user("p2")),
            ..Default::default()
        };
        assert!(matches!(
            engine.record_match_result(&sf1, bad),
            Err(EngineError::InvalidInput(_))
        ));

        let ok = ResultInput {
            walkover_winner_id: Some(user("p4")),
            ..Default::default()
        };
        let m = engine.record_match_result(&sf1, ok).unwrap();
        assert_eq!(m.result_type, ResultType::Walkover);
        assert_eq!(m.winner_id, Some(user("p4")));
    }

    #[test]
    fn test_retirement_keeps_type() {
        let (engine, sf1, _) = seeded_four();
        let input = ResultInput {
            sets: vec![SetScore {
                player1_games: 3,
                player2_games: 1,
            }],
            walkover_winner_id: Some(user("p1")),
            result_type: ResultType::Retirement,
        };

        let m = engine.record_match_result(&sf1, input).unwrap();
        assert_eq!(m.result_type, ResultType::Retirement);
    }

    #[test]
    fn test_invalid_scores_rejected() {
        let (engine, sf1, _) = seeded_four();

        for input in [
            score(&[]),
            score(&[(6, 6)]),
            score(&[(6, 1), (1, 6)]),
            ResultInput {
                result_type: ResultType::Disqualification,
                ..score(&[(6, 1)])
            },
        ] {
            assert!(matches!(
                engine.record_match_result(&sf1, input),
                Err(EngineError::InvalidInput(_))
            ));
        }
        let untouched = engine
            .store()
            .read(|t| t.match_by_id(&sf1).cloned())
            .unwrap()
            .unwrap();
        assert_eq!(untouched.status, MatchStatus::Scheduled);
    }

    #[test]
    fn test_unpaired_and_missing_matches() {
        let (engine, _, _) = seeded_four();
        let fin = engine
            .store()
            .read(|t| find_round_match(t, RoundKey::F, 1).id)
            .unwrap();

        assert!(matches!(
            engine.record_match_result(&fin, score(&[(6, 0)])),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(matches!(
            engine.record_match_result(&"missing".into(), score(&[(6, 0)])),
            Err(EngineError::MatchNotFound(_))
        ));
    }
}
