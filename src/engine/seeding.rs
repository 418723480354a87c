//! Seed placement and qualifier pairing.
//!
//! Pure functions: they turn an ordered entrant pool into base-round
//! pairs. Slots are paired (0,1), (2,3), ... and pair `i` goes into base
//! round match `i + 1`.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::models::{smallest_pow2_ge, GroupStandings, KoSeedingPolicy, TournamentSettings, UserId};

/// A base-round pairing. `None` is a BYE.
pub type Pair = (Option<UserId>, Option<UserId>);

const SEEDS_2: [usize; 2] = [1, 2];
const SEEDS_4: [usize; 4] = [1, 4, 3, 2];
const SEEDS_8: [usize; 8] = [1, 8, 5, 4, 3, 6, 7, 2];
const SEEDS_16: [usize; 16] = [1, 16, 9, 8, 5, 12, 13, 4, 3, 14, 11, 6, 7, 10, 15, 2];

/// Attempts at reshuffling runners-up before accepting a same-group pair.
const AVOIDANCE_ATTEMPTS: usize = 32;

/// Double a seed chart: each seed `s` is joined by its mirror
/// `2n + 1 - s`, alternating which one comes first.
fn expand_seed_order(order: &[usize]) -> Vec<usize> {
    let size = order.len() * 2;
    order
        .iter()
        .enumerate()
        .flat_map(|(i, &seed)| {
            let mirror = size + 1 - seed;
            if i % 2 == 0 {
                [seed, mirror]
            } else {
                [mirror, seed]
            }
        })
        .collect()
}

/// Seed number held by each bracket slot, for a power-of-two `size`.
pub fn seed_positions(size: usize) -> Vec<usize> {
    match size {
        0 | 1 => vec![1],
        2 => SEEDS_2.to_vec(),
        4 => SEEDS_4.to_vec(),
        8 => SEEDS_8.to_vec(),
        16 => SEEDS_16.to_vec(),
        _ => expand_seed_order(&seed_positions(size / 2)),
    }
}

/// Place `pool` (best seed first) into a bracket of `size` slots.
/// Seeds past the end of the pool become BYEs.
pub fn seeded_pairs(pool: &[UserId], size: usize) -> Vec<Pair> {
    let slots: Vec<Option<UserId>> = seed_positions(size)
        .into_iter()
        .map(|seed| pool.get(seed - 1).cloned())
        .collect();
    slots
        .chunks(2)
        .map(|pair| (pair[0].clone(), pair.get(1).cloned().flatten()))
        .collect()
}

/// An entrant advancing from a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Qualifier {
    pub user_id: UserId,
    pub group: String,
}

/// Group winners, then runners-up when two qualify per group, each in
/// group order.
pub fn qualifiers(
    standings: &[GroupStandings],
    per_group: u8,
) -> (Vec<Qualifier>, Vec<Qualifier>) {
    let pick = |rank: usize| -> Vec<Qualifier> {
        standings
            .iter()
            .filter_map(|g| {
                g.at_rank(rank).map(|user| Qualifier {
                    user_id: user.clone(),
                    group: g.group.clone(),
                })
            })
            .collect()
    };

    let winners = pick(1);
    let runners_up = if per_group >= 2 { pick(2) } else { Vec::new() };
    (winners, runners_up)
}

/// Winner of group `i` meets the runner-up of group `n - 1 - i`, which
/// also puts each group's two qualifiers in opposite bracket halves.
pub fn structured_cross(winners: &[Qualifier], runners_up: &[Qualifier]) -> Vec<Pair> {
    let n = winners.len().min(runners_up.len());
    (0..n)
        .map(|i| {
            (
                Some(winners[i].user_id.clone()),
                Some(runners_up[n - 1 - i].user_id.clone()),
            )
        })
        .collect()
}

fn same_group(a: &Qualifier, b: &Qualifier) -> bool {
    a.group == b.group
}

/// Swap runners-up until no pair shares a group. Returns false when a
/// clash is left that no single swap fixes.
fn repair_same_group(winners: &[Qualifier], runners_up: &mut [Qualifier]) -> bool {
    for i in 0..winners.len() {
        if !same_group(&winners[i], &runners_up[i]) {
            continue;
        }
        let swap_with = (0..runners_up.len()).find(|&j| {
            j != i
                && !same_group(&winners[i], &runners_up[j])
                && !same_group(&winners[j], &runners_up[i])
        });
        match swap_with {
            Some(j) => runners_up.swap(i, j),
            None => return false,
        }
    }
    true
}

/// Shuffle winners and runners-up independently and pair them by
/// position. With `avoid_same_group`, reshuffle/repair until no pair
/// shares a group, falling back to the last shuffle when that is not
/// possible.
pub fn random_cross<R: Rng + ?Sized>(
    winners: &[Qualifier],
    runners_up: &[Qualifier],
    avoid_same_group: bool,
    rng: &mut R,
) -> Vec<Pair> {
    let mut w = winners.to_vec();
    let mut r = runners_up.to_vec();
    let n = w.len().min(r.len());
    w.truncate(n);
    r.truncate(n);

    w.shuffle(rng);
    r.shuffle(rng);

    if avoid_same_group {
        let mut attempt = 0;
        while !repair_same_group(&w, &mut r) {
            attempt += 1;
            if attempt >= AVOIDANCE_ATTEMPTS {
                debug!("Same-group avoidance infeasible; keeping arbitrary pairing");
                break;
            }
            r.shuffle(rng);
        }
    }

    w.into_iter()
        .zip(r)
        .map(|(a, b)| (Some(a.user_id), Some(b.user_id)))
        .collect()
}

/// Base-round pairs for the qualifiers of a group stage.
///
/// Cross-pairing needs one runner-up per winner and a power-of-two
/// number of groups; otherwise winners then runners-up go through the
/// seed chart, so winners take the top seeds and any BYEs. Under the
/// structured policy, or with same-group avoidance on, the chart is then
/// repaired so group-mates do not meet in the base round.
pub fn qualifier_pairs<R: Rng + ?Sized>(
    settings: &TournamentSettings,
    winners: &[Qualifier],
    runners_up: &[Qualifier],
    rng: &mut R,
) -> Vec<Pair> {
    let crossable = !runners_up.is_empty()
        && winners.len() == runners_up.len()
        && winners.len().is_power_of_two();

    if crossable {
        return match settings.ko_seeding_policy {
            KoSeedingPolicy::Structured => structured_cross(winners, runners_up),
            KoSeedingPolicy::RandomCross => {
                random_cross(winners, runners_up, settings.avoid_same_group_in_r1, rng)
            }
        };
    }

    let mut w = winners.to_vec();
    let mut r = runners_up.to_vec();
    if settings.ko_seeding_policy == KoSeedingPolicy::RandomCross && !r.is_empty() {
        w.shuffle(rng);
        r.shuffle(rng);
    }
    w.extend(r);

    let keep_apart = settings.avoid_same_group_in_r1
        || settings.ko_seeding_policy == KoSeedingPolicy::Structured;
    if keep_apart {
        return seeded_apart(&w);
    }
    let pool: Vec<UserId> = w.into_iter().map(|q| q.user_id).collect();
    seeded_pairs(&pool, smallest_pow2_ge(pool.len()))
}

/// A seed-chart slot: seed number and occupant. `None` is a BYE.
type Seat<'a> = Option<(usize, &'a Qualifier)>;

fn pair_clashes(slots: &[Seat<'_>], pair: usize) -> bool {
    matches!(
        (slots[2 * pair], slots[2 * pair + 1]),
        (Some((_, a)), Some((_, b))) if same_group(a, b)
    )
}

/// Seed-chart placement of `pool` (best first) that keeps group-mates
/// apart in the base round. The weaker entrant of a clashing pair swaps
/// with the nearest-seeded entrant whose move clears the clash without
/// creating another. BYE slots never move.
fn seeded_apart(pool: &[Qualifier]) -> Vec<Pair> {
    let size = smallest_pow2_ge(pool.len());
    let mut slots: Vec<Seat<'_>> = seed_positions(size)
        .into_iter()
        .map(|seed| pool.get(seed - 1).map(|q| (seed, q)))
        .collect();

    for pair in 0..slots.len() / 2 {
        if !pair_clashes(&slots, pair) {
            continue;
        }
        let (a, b) = (2 * pair, 2 * pair + 1);
        let seed_of = |i: usize| slots[i].map_or(0, |(seed, _)| seed);
        let weaker = if seed_of(a) > seed_of(b) { a } else { b };
        let weaker_seed = seed_of(weaker);

        let mut candidates: Vec<usize> = (0..slots.len())
            .filter(|&j| j / 2 != pair && slots[j].is_some())
            .collect();
        candidates.sort_by_key(|&j| (seed_of(j).abs_diff(weaker_seed), j));

        let swap_with = candidates.into_iter().find(|&j| {
            let mut trial = slots.clone();
            trial.swap(weaker, j);
            !pair_clashes(&trial, pair) && !pair_clashes(&trial, j / 2)
        });
        match swap_with {
            Some(j) => slots.swap(weaker, j),
            None => debug!("No swap separates base-round pair {}", pair + 1),
        }
    }

    slots
        .chunks(2)
        .map(|pair| {
            let id = |seat: Seat<'_>| seat.map(|(_, q)| q.user_id.clone());
            (id(pair[0]), id(pair.get(1).copied().flatten()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntityId, GroupStandingRow};
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn pool(n: usize) -> Vec<UserId> {
        (1..=n).map(|i| EntityId::from(format!("s{i}"))).collect()
    }

    fn q(user: &str, group: &str) -> Qualifier {
        Qualifier {
            user_id: EntityId::from(user),
            group: group.to_string(),
        }
    }

    fn names(pairs: &[Pair]) -> Vec<(Option<&str>, Option<&str>)> {
        pairs
            .iter()
            .map(|(a, b)| (a.as_ref().map(|x| x.as_str()), b.as_ref().map(|x| x.as_str())))
            .collect()
    }

    #[test]
    fn test_expansion_reproduces_fixed_charts() {
        assert_eq!(expand_seed_order(&SEEDS_2), SEEDS_4.to_vec());
        assert_eq!(expand_seed_order(&SEEDS_4), SEEDS_8.to_vec());
        assert_eq!(expand_seed_order(&SEEDS_8), SEEDS_16.to_vec());
    }

    #[test]
    fn test_seed_positions_are_permutations() {
        for size in [2, 4, 8, 16, 32, 64, 128] {
            let mut positions = seed_positions(size);
            assert_eq!(positions[0], 1);
            assert_eq!(positions[size - 1], 2);
            positions.sort();
            assert_eq!(positions, (1..=size).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_paired_seeds_sum_to_size_plus_one() {
        for size in [4, 8, 16, 32] {
            for pair in seed_positions(size).chunks(2) {
                assert_eq!(pair[0] + pair[1], size + 1);
            }
        }
    }

    #[test]
    fn test_top_two_seeds_in_opposite_halves() {
        for size in [4, 8, 16, 32, 64] {
            let positions = seed_positions(size);
            let slot_of = |seed| positions.iter().position(|&s| s == seed).unwrap();
            assert!(slot_of(1) < size / 2);
            assert!(slot_of(2) >= size / 2);
        }
    }

    #[test]
    fn test_four_entrants() {
        let pairs = seeded_pairs(&pool(4), 4);
        assert_eq!(
            names(&pairs),
            vec![(Some("s1"), Some("s4")), (Some("s3"), Some("s2"))]
        );
    }

    #[test]
    fn test_byes_go_to_top_seeds() {
        let pairs = seeded_pairs(&pool(5), 8);
        assert_eq!(
            names(&pairs),
            vec![
                (Some("s1"), None),
                (Some("s5"), Some("s4")),
                (Some("s3"), None),
                (None, Some("s2")),
            ]
        );
        assert!(pairs.iter().all(|(a, b)| a.is_some() || b.is_some()));
    }

    #[test]
    fn test_qualifiers_from_standings() {
        let group = |name: &str, users: &[&str]| GroupStandings {
            group: name.to_string(),
            standings: users
                .iter()
                .map(|u| GroupStandingRow::new(EntityId::from(*u)))
                .collect(),
        };
        let standings = vec![group("Grupa A", &["a1", "a2", "a3"]), group("Grupa B", &["b1"])];

        let (winners, runners_up) = qualifiers(&standings, 2);
        assert_eq!(winners, vec![q("a1", "Grupa A"), q("b1", "Grupa B")]);
        assert_eq!(runners_up, vec![q("a2", "Grupa A")]);

        let (_, none) = qualifiers(&standings, 1);
        assert!(none.is_empty());
    }

    #[test]
    fn test_structured_cross_pairs_farthest_group() {
        let winners = vec![q("wa", "A"), q("wb", "B"), q("wc", "C"), q("wd", "D")];
        let runners = vec![q("ra", "A"), q("rb", "B"), q("rc", "C"), q("rd", "D")];

        let pairs = structured_cross(&winners, &runners);

        assert_eq!(
            names(&pairs),
            vec![
                (Some("wa"), Some("rd")),
                (Some("wb"), Some("rc")),
                (Some("wc"), Some("rb")),
                (Some("wd"), Some("ra")),
            ]
        );
    }

    #[test]
    fn test_random_cross_avoids_same_group() {
        let winners = vec![q("wa", "A"), q("wb", "B"), q("wc", "C"), q("wd", "D")];
        let runners = vec![q("ra", "A"), q("rb", "B"), q("rc", "C"), q("rd", "D")];

        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let pairs = random_cross(&winners, &runners, true, &mut rng);
            assert_eq!(pairs.len(), 4);
            for (a, b) in &pairs {
                let a = a.as_ref().unwrap().as_str();
                let b = b.as_ref().unwrap().as_str();
                assert_ne!(a[1..], b[1..], "seed {seed} paired {a} with {b}");
            }
        }
    }

    #[test]
    fn test_random_cross_falls_back_when_infeasible() {
        let winners = vec![q("wa", "A")];
        let runners = vec![q("ra", "A")];
        let mut rng = StdRng::seed_from_u64(7);

        let pairs = random_cross(&winners, &runners, true, &mut rng);
        assert_eq!(names(&pairs), vec![(Some("wa"), Some("ra"))]);
    }

    #[test]
    fn test_qualifier_pairs_uneven_groups_use_seed_chart() {
        let settings = TournamentSettings::default();
        let winners = vec![q("wa", "A"), q("wb", "B"), q("wc", "C")];
        let runners = vec![q("ra", "A"), q("rb", "B"), q("rc", "C")];
        let mut rng = StdRng::seed_from_u64(1);

        let pairs = qualifier_pairs(&settings, &winners, &runners, &mut rng);

        assert_eq!(pairs.len(), 4);
        assert_eq!(names(&pairs)[0], (Some("wa"), None));
        assert_eq!(names(&pairs)[3], (None, Some("wb")));
    }

    #[test]
    fn test_three_groups_keep_group_mates_apart() {
        let settings = TournamentSettings {
            avoid_same_group_in_r1: true,
            ..TournamentSettings::default()
        };
        let winners = vec![q("wa", "A"), q("wb", "B"), q("wc", "C")];
        let runners = vec![q("ra", "A"), q("rb", "B"), q("rc", "C")];
        let mut rng = StdRng::seed_from_u64(1);

        let pairs = qualifier_pairs(&settings, &winners, &runners, &mut rng);

        // Plain chart would give (rb, ra) and (wc, rc).
        assert_eq!(
            names(&pairs),
            vec![
                (Some("wa"), None),
                (Some("rc"), Some("ra")),
                (Some("wc"), Some("rb")),
                (None, Some("wb")),
            ]
        );
    }

    #[test]
    fn test_random_policy_without_avoidance_keeps_plain_chart() {
        let settings = TournamentSettings {
            ko_seeding_policy: KoSeedingPolicy::RandomCross,
            ..TournamentSettings::default()
        };
        let winners = vec![q("wa", "A"), q("wb", "B"), q("wc", "C")];
        let runners = vec![q("ra", "A"), q("rb", "B"), q("rc", "C")];
        let mut rng = StdRng::seed_from_u64(3);

        let pairs = qualifier_pairs(&settings, &winners, &runners, &mut rng);

        let seated: usize = pairs
            .iter()
            .map(|(a, b)| a.is_some() as usize + b.is_some() as usize)
            .sum();
        assert_eq!(pairs.len(), 4);
        assert_eq!(seated, 6);
    }
}
