//! Knockout round keys.
//!
//! All round arithmetic (pair counts, chain successors, base-round choice)
//! lives on [`RoundKey`]. Display labels are derived from the key, and
//! [`parse_round`] maps free-text spellings back onto it.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Round order assigned to knockout rounds starts here so that every
/// knockout match sorts after every group matchday.
pub const KNOCKOUT_ORDER_BASE: i32 = 100;

/// Display label of the 3rd-place match.
pub const BRONZE_LABEL: &str = "Mecz o 3. miejsce";

/// A knockout round, earliest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RoundKey {
    R128,
    R64,
    R32,
    R16,
    QF,
    SF,
    F,
}

impl RoundKey {
    /// The whole chain, earliest round first.
    pub const ALL: [RoundKey; 7] = [
        RoundKey::R128,
        RoundKey::R64,
        RoundKey::R32,
        RoundKey::R16,
        RoundKey::QF,
        RoundKey::SF,
        RoundKey::F,
    ];

    /// Number of matches in this round.
    pub fn pair_count(self) -> u32 {
        match self {
            RoundKey::R128 => 64,
            RoundKey::R64 => 32,
            RoundKey::R32 => 16,
            RoundKey::R16 => 8,
            RoundKey::QF => 4,
            RoundKey::SF => 2,
            RoundKey::F => 1,
        }
    }

    /// The round winners of this round advance into. `None` for the final.
    pub fn next(self) -> Option<RoundKey> {
        match self {
            RoundKey::R128 => Some(RoundKey::R64),
            RoundKey::R64 => Some(RoundKey::R32),
            RoundKey::R32 => Some(RoundKey::R16),
            RoundKey::R16 => Some(RoundKey::QF),
            RoundKey::QF => Some(RoundKey::SF),
            RoundKey::SF => Some(RoundKey::F),
            RoundKey::F => None,
        }
    }

    /// The round feeding into this one. `None` for the earliest round.
    pub fn previous(self) -> Option<RoundKey> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.next() == Some(self))
    }

    /// Position in the chain (R128 = 0, F = 6).
    pub fn chain_index(self) -> i32 {
        match self {
            RoundKey::R128 => 0,
            RoundKey::R64 => 1,
            RoundKey::R32 => 2,
            RoundKey::R16 => 3,
            RoundKey::QF => 4,
            RoundKey::SF => 5,
            RoundKey::F => 6,
        }
    }

    /// Round order stored on knockout matches of this round.
    pub fn round_order(self) -> i32 {
        KNOCKOUT_ORDER_BASE + self.chain_index()
    }

    /// Short code, e.g. "QF".
    pub fn code(self) -> &'static str {
        match self {
            RoundKey::R128 => "R128",
            RoundKey::R64 => "R64",
            RoundKey::R32 => "R32",
            RoundKey::R16 => "R16",
            RoundKey::QF => "QF",
            RoundKey::SF => "SF",
            RoundKey::F => "F",
        }
    }

    /// Canonical human round label.
    pub fn label(self) -> &'static str {
        match self {
            RoundKey::R128 => "1/64 finału",
            RoundKey::R64 => "1/32 finału",
            RoundKey::R32 => "1/16 finału",
            RoundKey::R16 => "1/8 finału",
            RoundKey::QF => "Ćwierćfinał",
            RoundKey::SF => "Półfinał",
            RoundKey::F => "Finał",
        }
    }

    /// Label of the `slot`-th match (1-based) of this round.
    pub fn match_label(self, slot: u32) -> String {
        if self.pair_count() == 1 {
            self.label().to_string()
        } else {
            format!("{} – Mecz {}", self.label(), slot)
        }
    }

    /// First populated round for a bracket holding `entrants` entrants.
    ///
    /// `None` when the bracket would need more than 128 slots.
    pub fn base_for(entrants: usize) -> Option<RoundKey> {
        let pairs = (smallest_pow2_ge(entrants) / 2).max(1) as u32;
        Self::ALL
            .iter()
            .rev()
            .copied()
            .find(|k| k.pair_count() >= pairs)
    }

    /// This round and every later one up to the final.
    pub fn chain_from(self) -> impl Iterator<Item = RoundKey> {
        Self::ALL
            .into_iter()
            .filter(move |k| k.chain_index() >= self.chain_index())
    }

    /// Map a free-text round spelling ("QF", "ćwierćfinał", "1/4", ...)
    /// to a key. Match-number suffixes such as " – Mecz 2" are ignored.
    pub fn normalize(input: &str) -> Option<RoundKey> {
        match parse_round(input)? {
            RoundRef::Knockout(key) => Some(key),
            RoundRef::Bronze => None,
        }
    }
}

impl fmt::Display for RoundKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Smallest power of two that is `>= n` (1 for n = 0).
pub fn smallest_pow2_ge(n: usize) -> usize {
    n.max(1).next_power_of_two()
}

/// What a knockout round label refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundRef {
    Knockout(RoundKey),
    Bronze,
}

fn match_suffix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\s*[–—-]?\s*(?:mecz|match|game)\s*#?\s*(\d+)\s*$")
            .expect("match suffix pattern is valid")
    })
}

fn fraction_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^1\s*/\s*(\d+)(?:\s*finalu)?$").expect("fraction pattern is valid")
    })
}

fn field_size_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:r|round of |last |top )(\d+)$").expect("field size pattern is valid")
    })
}

/// Extract the match number from a label like "Półfinał – Mecz 2".
pub fn match_number(label: &str) -> Option<u32> {
    match_suffix_re()
        .captures(label)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn fold(input: &str) -> String {
    let stripped = match_suffix_re().replace(input, "");
    let lowered: String = stripped
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'ą' => 'a',
            'ć' => 'c',
            'ę' => 'e',
            'ł' => 'l',
            'ń' => 'n',
            'ó' => 'o',
            'ś' => 's',
            'ź' | 'ż' => 'z',
            '_' => ' ',
            other => other,
        })
        .collect();
    lowered
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(['.', ':'])
        .to_string()
}

fn key_for_field_size(size: u32) -> Option<RoundKey> {
    RoundKey::ALL
        .iter()
        .copied()
        .find(|k| k.pair_count() * 2 == size)
}

/// Classify a knockout round label.
pub fn parse_round(label: &str) -> Option<RoundRef> {
    let folded = fold(label);
    if folded.is_empty() {
        return None;
    }

    let compact: String = folded.chars().filter(|c| *c != ' ' && *c != '-').collect();

    if compact.contains("braz")
        || compact.contains("bronze")
        || compact.contains("3rd")
        || compact.contains("thirdplace")
        || (compact.contains('3') && compact.contains("miejsce"))
    {
        return Some(RoundRef::Bronze);
    }

    if let Some(caps) = fraction_re().captures(&folded) {
        let denominator: u32 = caps[1].parse().ok()?;
        return key_for_field_size(denominator * 2).map(RoundRef::Knockout);
    }

    if let Some(caps) = field_size_re().captures(&folded) {
        let size: u32 = caps[1].parse().ok()?;
        return key_for_field_size(size).map(RoundRef::Knockout);
    }

    let key = match compact.as_str() {
        "qf" | "cwiercfinal" | "cwiercfinaly" | "quarterfinal" | "quarterfinals" => RoundKey::QF,
        "sf" | "polfinal" | "polfinaly" | "semifinal" | "semifinals" => RoundKey::SF,
        "f" | "final" | "finaly" | "finals" | "wielkifinal" | "grandfinal" => RoundKey::F,
        other => {
            return RoundKey::ALL
                .iter()
                .copied()
                .find(|k| k.code().eq_ignore_ascii_case(other))
                .map(RoundRef::Knockout)
        }
    };

    Some(RoundRef::Knockout(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_counts_halve_along_chain() {
        for key in RoundKey::ALL {
            if let Some(next) = key.next() {
                assert_eq!(key.pair_count(), next.pair_count() * 2);
                assert_eq!(next.previous(), Some(key));
            }
        }
        assert_eq!(RoundKey::F.next(), None);
        assert_eq!(RoundKey::R128.previous(), None);
    }

    #[test]
    fn test_smallest_pow2_ge() {
        assert_eq!(smallest_pow2_ge(0), 1);
        assert_eq!(smallest_pow2_ge(2), 2);
        assert_eq!(smallest_pow2_ge(3), 4);
        assert_eq!(smallest_pow2_ge(8), 8);
        assert_eq!(smallest_pow2_ge(9), 16);
        assert_eq!(smallest_pow2_ge(100), 128);
    }

    #[test]
    fn test_base_round_selection() {
        assert_eq!(RoundKey::base_for(2), Some(RoundKey::F));
        assert_eq!(RoundKey::base_for(3), Some(RoundKey::SF));
        assert_eq!(RoundKey::base_for(4), Some(RoundKey::SF));
        assert_eq!(RoundKey::base_for(5), Some(RoundKey::QF));
        assert_eq!(RoundKey::base_for(16), Some(RoundKey::R16));
        assert_eq!(RoundKey::base_for(17), Some(RoundKey::R32));
        assert_eq!(RoundKey::base_for(128), Some(RoundKey::R128));
        assert_eq!(RoundKey::base_for(129), None);
    }

    #[test]
    fn test_chain_from_ends_at_final() {
        let chain: Vec<_> = RoundKey::QF.chain_from().collect();
        assert_eq!(chain, vec![RoundKey::QF, RoundKey::SF, RoundKey::F]);
    }

    #[test]
    fn test_match_labels() {
        assert_eq!(RoundKey::QF.match_label(2), "Ćwierćfinał – Mecz 2");
        assert_eq!(RoundKey::F.match_label(1), "Finał");
    }

    #[test]
    fn test_normalize_equivalent_spellings() {
        for spelling in ["QF", "qf", "ćwierćfinał", "Ćwierćfinały", "1/4", "1/4 finału", "Quarter-final", "R8"] {
            assert_eq!(RoundKey::normalize(spelling), Some(RoundKey::QF), "{spelling}");
        }
        for spelling in ["SF", "Półfinał", "1/2", "semi-finals", "Półfinał – Mecz 2"] {
            assert_eq!(RoundKey::normalize(spelling), Some(RoundKey::SF), "{spelling}");
        }
        assert_eq!(RoundKey::normalize("Finał"), Some(RoundKey::F));
        assert_eq!(RoundKey::normalize("final"), Some(RoundKey::F));
        assert_eq!(RoundKey::normalize("1/8 finału – Mecz 3"), Some(RoundKey::R16));
        assert_eq!(RoundKey::normalize("round of 32"), Some(RoundKey::R32));
        assert_eq!(RoundKey::normalize("R128"), Some(RoundKey::R128));
        assert_eq!(RoundKey::normalize("1/64"), Some(RoundKey::R128));
    }

    #[test]
    fn test_normalize_rejects_unknown_and_bronze() {
        assert_eq!(RoundKey::normalize("Grupa A"), None);
        assert_eq!(RoundKey::normalize(""), None);
        assert_eq!(RoundKey::normalize("1/3"), None);
        assert_eq!(RoundKey::normalize(BRONZE_LABEL), None);
        assert_eq!(parse_round(BRONZE_LABEL), Some(RoundRef::Bronze));
        assert_eq!(parse_round("3rd place"), Some(RoundRef::Bronze));
    }

    #[test]
    fn test_canonical_labels_round_trip() {
        for key in RoundKey::ALL {
            assert_eq!(RoundKey::normalize(key.label()), Some(key));
            assert_eq!(RoundKey::normalize(&key.match_label(3)), Some(key));
        }
    }

    #[test]
    fn test_match_number() {
        assert_eq!(match_number("Ćwierćfinał – Mecz 2"), Some(2));
        assert_eq!(match_number("Finał"), None);
    }
}
