//! Group and knockout generation.
//!
//! Knockout rounds from the base round to the final are materialized as
//! empty placeholders up front. Seeding then writes base-round pairings
//! into those placeholders, resolving BYEs immediately.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::cascade::{cascade, clear_downstream};
use super::seeding::{qualifier_pairs, qualifiers, seeded_pairs, Pair};
use super::standings::group_standings;
use super::{context, Engine, EngineError};
use crate::models::{
    smallest_pow2_ge, CategoryId, Format, Match, MatchId, MatchStatus, ResultType, RoundKey,
    Stage, Tournament, TournamentId, UserId,
};
use crate::storage::Tables;

/// Result of [`Engine::generate_direct_knockout`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateOutcome {
    /// Placeholder matches created
    pub created: usize,
    pub base_round: RoundKey,
}

/// Result of [`Engine::generate_groups_and_knockout_skeleton`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkeletonOutcome {
    /// Rows created: group headers, group matches and knockout placeholders
    pub count: usize,
    pub groups: usize,
}

fn default_skip_locked() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeedOptions {
    /// Replace pairings already present in the base round
    #[serde(default)]
    pub overwrite: bool,

    /// Skip locked targets; otherwise a locked target fails the call
    #[serde(default = "default_skip_locked")]
    pub skip_locked: bool,
}

impl Default for SeedOptions {
    fn default() -> Self {
        Self {
            overwrite: false,
            skip_locked: default_skip_locked(),
        }
    }
}

/// Result of [`Engine::seed_knockout`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedOutcome {
    /// Base-round matches whose pairing was written
    pub updated: usize,
    pub base_round: RoundKey,
    /// Pairings resolved as BYE walkovers
    pub byes: usize,
}

/// Check the entrant count against the bracket rules and pick the base round.
pub fn base_round_for(entrants: usize, allow_byes: bool) -> Result<RoundKey, EngineError> {
    if entrants < 2 {
        return Err(EngineError::NotEnoughEntrants(entrants));
    }
    if !allow_byes && !entrants.is_power_of_two() {
        return Err(EngineError::ByesDisabled(entrants));
    }
    RoundKey::base_for(entrants).ok_or(EngineError::BracketTooLarge(entrants))
}

fn round_indices(
    tables: &Tables,
    tournament_id: &TournamentId,
    category_id: &CategoryId,
    key: RoundKey,
) -> Vec<usize> {
    let mut idx: Vec<usize> = tables
        .matches
        .iter()
        .enumerate()
        .filter(|(_, m)| {
            &m.tournament_id == tournament_id
                && &m.category_id == category_id
                && m.round_key() == Some(key)
        })
        .map(|(i, _)| i)
        .collect();
    idx.sort_by_key(|&i| (tables.matches[i].slot_index().unwrap_or(u32::MAX), i));
    idx
}

/// Index of the `slot`-th match of a knockout round, if it exists.
pub(crate) fn locate_round_match(
    tables: &Tables,
    tournament_id: &TournamentId,
    category_id: &CategoryId,
    key: RoundKey,
    slot: u32,
) -> Option<usize> {
    round_indices(tables, tournament_id, category_id, key)
        .into_iter()
        .find(|&i| tables.matches[i].slot_index() == Some(slot))
}

/// Make sure every round from `base` to the final has its placeholders.
///
/// Existing rows are renumbered and relabelled in place; only the
/// shortfall is created. Returns the number of rows created.
pub fn ensure_placeholders(
    tables: &mut Tables,
    tournament_id: &TournamentId,
    category_id: &CategoryId,
    base: RoundKey,
) -> usize {
    let mut created = 0;
    for key in base.chain_from() {
        let existing = round_indices(tables, tournament_id, category_id, key);
        for (n, &i) in existing.iter().enumerate() {
            let slot = n as u32 + 1;
            let m = &mut tables.matches[i];
            m.slot = Some(slot);
            m.round = key.match_label(slot);
        }

        let target = key.pair_count() as usize;
        for slot in existing.len() + 1..=target {
            let placeholder =
                Match::knockout_placeholder(tournament_id, category_id, key, slot as u32);
            tables.upsert_match(placeholder);
            created += 1;
        }
    }
    debug!("Ensured placeholders from {}: {} created", base, created);
    created
}

/// Write base-round pairings and resolve BYEs.
///
/// Returns `(updated, bye_matches)`; the caller cascades the BYE matches.
fn write_pairings(
    tables: &mut Tables,
    tournament_id: &TournamentId,
    category_id: &CategoryId,
    base: RoundKey,
    pairs: Vec<Pair>,
    options: SeedOptions,
) -> Result<(usize, Vec<MatchId>), EngineError> {
    let mut updated = 0;
    let mut byes = Vec::new();

    for (i, (p1, p2)) in pairs.into_iter().enumerate() {
        let slot = i as u32 + 1;
        let Some(idx) = locate_round_match(tables, tournament_id, category_id, base, slot) else {
            warn!("No {} placeholder for slot {}", base, slot);
            continue;
        };

        let target = &tables.matches[idx];
        if target.locked {
            if options.skip_locked {
                debug!("Skipping locked match {}", target.id);
                continue;
            }
            return Err(EngineError::Locked(target.id.clone()));
        }
        if target.player1_id == p1 && target.player2_id == p2 {
            continue;
        }
        if !target.has_no_players() && !options.overwrite {
            continue;
        }

        let match_id = target.id.clone();
        let m = &mut tables.matches[idx];
        m.player1_id = p1;
        m.player2_id = p2;
        m.clear_result();

        if m.is_bye() {
            m.winner_id = m.player1_id.clone().or_else(|| m.player2_id.clone());
            m.result_type = ResultType::Walkover;
            m.status = MatchStatus::Finished;
            byes.push(match_id.clone());
        }

        tables.replace_sets(&match_id, Vec::new());
        clear_downstream(tables, &match_id);
        updated += 1;
    }

    Ok((updated, byes))
}

/// Base-round pairs for the tournament's format.
fn knockout_pairs<R: Rng + ?Sized>(
    tables: &Tables,
    tournament: &Tournament,
    category_id: &CategoryId,
    rng: &mut R,
) -> Result<(RoundKey, Vec<Pair>), EngineError> {
    let settings = &tournament.settings;
    match settings.format {
        Format::KoOnly => {
            let pool = tables.accepted_entrants(&tournament.id, category_id);
            let base = base_round_for(pool.len(), settings.allow_byes)?;
            Ok((base, seeded_pairs(&pool, smallest_pow2_ge(pool.len()))))
        }
        Format::GroupsKo => {
            let standings = group_standings(
                tables.matches_in(&tournament.id, category_id),
                &tables.match_sets,
            );
            if standings.is_empty() {
                return Err(EngineError::NoGroupData);
            }
            let unfinished = tables
                .matches_in(&tournament.id, category_id)
                .filter(|m| m.stage == Stage::Group && !m.is_header() && !m.is_finished())
                .count();
            if unfinished > 0 {
                warn!(
                    "Seeding {} from groups with {} unfinished group matches",
                    tournament.id, unfinished
                );
            }

            let (winners, runners_up) = qualifiers(&standings, settings.qualifiers_per_group);
            let base = base_round_for(winners.len() + runners_up.len(), settings.allow_byes)?;
            Ok((base, qualifier_pairs(settings, &winners, &runners_up, rng)))
        }
    }
}

/// Seed the base round inside an open transaction.
pub fn seed_in<R: Rng + ?Sized>(
    tables: &mut Tables,
    tournament_id: &TournamentId,
    options: SeedOptions,
    rng: &mut R,
) -> Result<SeedOutcome, EngineError> {
    let (tournament, category_id) = context(tables, tournament_id)?;
    let (base, pairs) = knockout_pairs(tables, &tournament, &category_id, rng)?;

    ensure_placeholders(tables, tournament_id, &category_id, base);
    let (updated, byes) =
        write_pairings(tables, tournament_id, &category_id, base, pairs, options)?;

    for id in &byes {
        let report = cascade(tables, id);
        debug!("BYE {} cascade: {:?}", id, report);
    }

    Ok(SeedOutcome {
        updated,
        base_round: base,
        byes: byes.len(),
    })
}

/// Group name for the `index`-th group: "Grupa A" .. "Grupa Z", "Grupa AA", ...
pub fn group_name(index: usize) -> String {
    let mut letters = Vec::new();
    let mut n = index + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.reverse();
    format!("Grupa {}", letters.into_iter().collect::<String>())
}

/// Deal entrants round-robin into `ceil(n / group_size)` groups.
pub fn build_groups(entrants: &[UserId], group_size: usize) -> Vec<Vec<UserId>> {
    let count = entrants.len().div_ceil(group_size.max(1));
    let mut groups: Vec<Vec<UserId>> = vec![Vec::new(); count];
    for (i, user) in entrants.iter().enumerate() {
        groups[i % count].push(user.clone());
    }
    groups
}

/// Single round-robin by the circle method. Element `d` holds the
/// pairings of matchday `d + 1`.
pub fn round_robin(members: &[UserId]) -> Vec<Vec<(UserId, UserId)>> {
    let mut ring: Vec<Option<UserId>> = members.iter().cloned().map(Some).collect();
    if ring.len() % 2 == 1 {
        ring.push(None);
    }
    let n = ring.len();
    if n < 2 {
        return Vec::new();
    }

    let mut days = Vec::with_capacity(n - 1);
    for _ in 0..n - 1 {
        let day: Vec<(UserId, UserId)> = (0..n / 2)
            .filter_map(|i| match (&ring[i], &ring[n - 1 - i]) {
                (Some(a), Some(b)) => Some((a.clone(), b.clone())),
                _ => None,
            })
            .collect();
        days.push(day);
        ring[1..].rotate_right(1);
    }
    days
}

impl Engine {
    /// Build a knockout bracket straight from the accepted entrants of a
    /// `KO_ONLY` tournament and seed its base round.
    pub fn generate_direct_knockout(
        &self,
        tournament_id: &TournamentId,
    ) -> Result<GenerateOutcome, EngineError> {
        let mut rng = rand::thread_rng();
        self.store.transaction(|tables| -> Result<GenerateOutcome, EngineError> {
            let (tournament, category_id) = context(tables, tournament_id)?;
            if tournament.settings.format != Format::KoOnly {
                return Err(EngineError::InvalidInput(
                    "direct knockout requires KO_ONLY format".to_string(),
                ));
            }

            let entrants = tables.accepted_entrants(tournament_id, &category_id).len();
            let base = base_round_for(entrants, tournament.settings.allow_byes)?;
            let created = ensure_placeholders(tables, tournament_id, &category_id, base);
            let seeded = seed_in(tables, tournament_id, SeedOptions::default(), &mut rng)?;

            info!(
                "Generated knockout for {}: {} entrants, base {}, {} placeholders, {} pairings",
                tournament_id, entrants, base, created, seeded.updated
            );
            Ok(GenerateOutcome {
                created,
                base_round: base,
            })
        })
    }

    /// Create the group stage (header rows plus round-robin matches) and
    /// the empty knockout chain its qualifiers will be seeded into.
    pub fn generate_groups_and_knockout_skeleton(
        &self,
        tournament_id: &TournamentId,
    ) -> Result<SkeletonOutcome, EngineError> {
        self.store.transaction(|tables| -> Result<SkeletonOutcome, EngineError> {
            let (tournament, category_id) = context(tables, tournament_id)?;
            let settings = &tournament.settings;
            if settings.format != Format::GroupsKo {
                return Err(EngineError::InvalidInput(
                    "group stage requires GROUPS_KO format".to_string(),
                ));
            }
            settings.validate().map_err(EngineError::InvalidInput)?;

            if tables
                .matches_in(tournament_id, &category_id)
                .any(|m| m.stage == Stage::Group)
            {
                return Err(EngineError::Conflict(
                    "group stage already generated; reset it first".to_string(),
                ));
            }

            let entrants = tables.accepted_entrants(tournament_id, &category_id);
            if entrants.len() < 2 {
                return Err(EngineError::NotEnoughEntrants(entrants.len()));
            }

            let groups = build_groups(&entrants, settings.group_size as usize);
            let qualifier_count: usize = groups
                .iter()
                .map(|g| g.len().min(settings.qualifiers_per_group as usize))
                .sum();
            let base = if qualifier_count >= 2 {
                Some(base_round_for(qualifier_count, settings.allow_byes)?)
            } else {
                None
            };

            let mut count = 0;
            for (gi, members) in groups.iter().enumerate() {
                let name = group_name(gi);
                tables.upsert_match(Match::group_header(tournament_id, &category_id, &name));
                count += 1;
                for (day, pairings) in round_robin(members).into_iter().enumerate() {
                    for (a, b) in pairings {
                        tables.upsert_match(Match::group_match(
                            tournament_id,
                            &category_id,
                            &name,
                            day as i32 + 1,
                            a,
                            b,
                        ));
                        count += 1;
                    }
                }
            }

            if let Some(base) = base {
                count += ensure_placeholders(tables, tournament_id, &category_id, base);
            }

            info!(
                "Generated {} groups for {} ({} rows, {} qualifiers)",
                groups.len(),
                tournament_id,
                count,
                qualifier_count
            );
            Ok(SkeletonOutcome {
                count,
                groups: groups.len(),
            })
        })
    }

    /// Seed the knockout base round from the entrant pool (`KO_ONLY`) or
    /// from the group qualifiers (`GROUPS_KO`).
    pub fn seed_knockout(
        &self,
        tournament_id: &TournamentId,
        options: SeedOptions,
    ) -> Result<SeedOutcome, EngineError> {
        let mut rng = rand::thread_rng();
        let outcome = self
            .store
            .transaction(|tables| seed_in(tables, tournament_id, options, &mut rng))?;
        info!(
            "Seeded {} base round {}: {} updated, {} byes",
            tournament_id, outcome.base_round, outcome.updated, outcome.byes
        );
        Ok(outcome)
    }
}
