//! Group standings.
//!
//! Rows are derived from finished group matches on every call. Ordering:
//! points, set differential, game differential (all descending), then
//! entrant id. When exactly two adjacent rows tie on all three numbers,
//! their direct match decides.

use std::collections::BTreeMap;

use tracing::debug;

use super::{context, Engine, EngineError};
use crate::models::{GroupStandingRow, GroupStandings, Match, MatchSet, Stage, TournamentId, UserId};

/// Sort key putting groups in creation order.
///
/// Group letters run A..Z, AA, AB, ..., so a shorter name always comes
/// first and equal lengths compare lexically: "Grupa Z" sorts before
/// "Grupa AA". Plain lexical order would put "Grupa AA" between "Grupa A"
/// and "Grupa B".
pub fn group_sort_key(name: &str) -> (usize, &str) {
    (name.chars().count(), name)
}

fn row_mut<'a>(rows: &'a mut Vec<GroupStandingRow>, user: &UserId) -> &'a mut GroupStandingRow {
    match rows.iter().position(|r| &r.user_id == user) {
        Some(idx) => &mut rows[idx],
        None => {
            rows.push(GroupStandingRow::new(user.clone()));
            let last = rows.len() - 1;
            &mut rows[last]
        }
    }
}

fn direct_winner<'a>(matches: &[&'a Match], a: &UserId, b: &UserId) -> Option<&'a UserId> {
    matches
        .iter()
        .filter(|m| m.is_finished() && m.involves(a) && m.involves(b))
        .find_map(|m| m.winner_id.as_ref())
}

/// Compute standings for every group present in `matches`.
///
/// Entrants appear as soon as they are paired in a group match, before
/// any result exists. Returns an empty list when there are no group
/// matches.
pub fn group_standings<'a, I>(matches: I, sets: &[MatchSet]) -> Vec<GroupStandings>
where
    I: IntoIterator<Item = &'a Match>,
{
    let mut groups: BTreeMap<(usize, String), Vec<&Match>> = BTreeMap::new();
    for m in matches {
        if m.stage != Stage::Group || m.is_header() {
            continue;
        }
        let (len, name) = group_sort_key(&m.round);
        groups.entry((len, name.to_string())).or_default().push(m);
    }

    groups
        .into_iter()
        .map(|((_, name), group_matches)| GroupStandings {
            standings: rank_group(&group_matches, sets),
            group: name,
        })
        .collect()
}

fn rank_group(matches: &[&Match], sets: &[MatchSet]) -> Vec<GroupStandingRow> {
    let mut rows: Vec<GroupStandingRow> = Vec::new();

    for m in matches {
        for player in [&m.player1_id, &m.player2_id].into_iter().flatten() {
            row_mut(&mut rows, player);
        }
    }

    for m in matches.iter().filter(|m| m.is_finished()) {
        let (Some(p1), Some(p2), Some(winner)) = (&m.player1_id, &m.player2_id, &m.winner_id)
        else {
            continue;
        };

        let mut p1_sets = 0;
        let mut p2_sets = 0;
        let mut p1_games = 0;
        let mut p2_games = 0;
        for set in sets.iter().filter(|s| s.match_id == m.id) {
            p1_games += set.player1_games;
            p2_games += set.player2_games;
            match set.set_winner() {
                Some(1) => p1_sets += 1,
                Some(_) => p2_sets += 1,
                None => {}
            }
        }

        let p1_won = winner == p1;
        for (player, won, sets_for, sets_against, games_for, games_against) in [
            (p1, p1_won, p1_sets, p2_sets, p1_games, p2_games),
            (p2, !p1_won, p2_sets, p1_sets, p2_games, p1_games),
        ] {
            let row = row_mut(&mut rows, player);
            row.played += 1;
            if won {
                row.won += 1;
                row.points += 1;
            } else {
                row.lost += 1;
            }
            row.sets_won += sets_for;
            row.sets_lost += sets_against;
            row.games_won += games_for;
            row.games_lost += games_against;
        }
    }

    rows.sort_by(|a, b| {
        b.ranking_key()
            .cmp(&a.ranking_key())
            .then_with(|| a.user_id.cmp(&b.user_id))
    });

    apply_head_to_head(&mut rows, matches);
    rows
}

/// Swap two-way ties whose direct match went the other way. Ties of
/// three or more keep the id order.
fn apply_head_to_head(rows: &mut [GroupStandingRow], matches: &[&Match]) {
    let mut start = 0;
    while start < rows.len() {
        let key = rows[start].ranking_key();
        let mut end = start + 1;
        while end < rows.len() && rows[end].ranking_key() == key {
            end += 1;
        }

        if end - start == 2 {
            let upper = rows[start].user_id.clone();
            let lower = rows[start + 1].user_id.clone();
            if direct_winner(matches, &upper, &lower) == Some(&lower) {
                debug!("Head-to-head puts {} above {}", lower, upper);
                rows.swap(start, start + 1);
            }
        }

        start = end;
    }
}

impl Engine {
    /// Standings for every group of the tournament's active category.
    pub fn compute_standings(
        &self,
        tournament_id: &TournamentId,
    ) -> Result<Vec<GroupStandings>, EngineError> {
        self.store.read(|tables| -> Result<Vec<GroupStandings>, EngineError> {
            let (_, category_id) = context(tables, tournament_id)?;
            let mut standings = group_standings(
                tables.matches_in(tournament_id, &category_id),
                &tables.match_sets,
            );
            for group in &mut standings {
                for row in &mut group.standings {
                    row.display_name = tables.display_name(&row.user_id).map(str::to_string);
                }
            }
            Ok(standings)
        })?
    }
}
