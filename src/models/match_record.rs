//! Match and set records.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::round::{parse_round, RoundKey, RoundRef, BRONZE_LABEL};
use super::{CategoryId, EntityId, MatchId, MatchSetId, TournamentId, UserId};

/// Which phase of the tournament a match belongs to. Never changes after
/// the match is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Group,
    Knockout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// Group-name banner row; never played.
    Header,
    #[default]
    Scheduled,
    InProgress,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultType {
    #[default]
    Normal,
    Walkover,
    Disqualification,
    Retirement,
}

impl ResultType {
    /// Result types that decide a match without a full score.
    pub fn is_shortcut(&self) -> bool {
        !matches!(self, ResultType::Normal)
    }
}

/// The central mutable entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,

    pub tournament_id: TournamentId,

    pub category_id: CategoryId,

    /// Human-readable round label, e.g. "Ćwierćfinał – Mecz 2" or "Grupa A"
    pub round: String,

    pub stage: Stage,

    /// Chronological rank: matchday for group matches, knockout rounds
    /// start at [`super::KNOCKOUT_ORDER_BASE`]
    pub round_order: i32,

    /// 1-based position within a knockout round
    #[serde(default)]
    pub slot: Option<u32>,

    /// `None` means TBD, or BYE once the opponent is known
    pub player1_id: Option<UserId>,

    pub player2_id: Option<UserId>,

    pub referee_id: Option<UserId>,

    pub winner_id: Option<UserId>,

    pub status: MatchStatus,

    pub result_type: ResultType,

    /// Freezes pairing and referee edits
    #[serde(default)]
    pub locked: bool,

    pub scheduled_at: Option<NaiveDateTime>,

    pub court: Option<String>,

    pub duration_min: Option<u32>,
}

impl Match {
    fn blank(
        id: MatchId,
        tournament_id: TournamentId,
        category_id: CategoryId,
        round: String,
        stage: Stage,
        round_order: i32,
    ) -> Self {
        Self {
            id,
            tournament_id,
            category_id,
            round,
            stage,
            round_order,
            slot: None,
            player1_id: None,
            player2_id: None,
            referee_id: None,
            winner_id: None,
            status: MatchStatus::Scheduled,
            result_type: ResultType::Normal,
            locked: false,
            scheduled_at: None,
            court: None,
            duration_min: None,
        }
    }

    /// Empty knockout placeholder for `slot` (1-based) of `key`.
    pub fn knockout_placeholder(
        tournament_id: &TournamentId,
        category_id: &CategoryId,
        key: RoundKey,
        slot: u32,
    ) -> Self {
        let id = EntityId::generate(&[
            tournament_id.as_str(),
            category_id.as_str(),
            key.code(),
            &slot.to_string(),
        ]);
        let mut m = Self::blank(
            id,
            tournament_id.clone(),
            category_id.clone(),
            key.match_label(slot),
            Stage::Knockout,
            key.round_order(),
        );
        m.slot = Some(slot);
        m
    }

    /// Empty 3rd-place match. Shares the final's round order.
    pub fn bronze_placeholder(tournament_id: &TournamentId, category_id: &CategoryId) -> Self {
        let id = EntityId::generate(&[tournament_id.as_str(), category_id.as_str(), "bronze"]);
        let mut m = Self::blank(
            id,
            tournament_id.clone(),
            category_id.clone(),
            BRONZE_LABEL.to_string(),
            Stage::Knockout,
            RoundKey::F.round_order(),
        );
        m.slot = Some(1);
        m
    }

    /// Banner row announcing a group.
    pub fn group_header(
        tournament_id: &TournamentId,
        category_id: &CategoryId,
        group_name: &str,
    ) -> Self {
        let id = EntityId::generate(&[
            tournament_id.as_str(),
            category_id.as_str(),
            group_name,
            "header",
        ]);
        let mut m = Self::blank(
            id,
            tournament_id.clone(),
            category_id.clone(),
            group_name.to_string(),
            Stage::Group,
            0,
        );
        m.status = MatchStatus::Header;
        m
    }

    /// Round-robin match between two group members on `matchday`.
    pub fn group_match(
        tournament_id: &TournamentId,
        category_id: &CategoryId,
        group_name: &str,
        matchday: i32,
        player1: UserId,
        player2: UserId,
    ) -> Self {
        let id = EntityId::generate(&[
            tournament_id.as_str(),
            category_id.as_str(),
            group_name,
            player1.as_str(),
            player2.as_str(),
        ]);
        let mut m = Self::blank(
            id,
            tournament_id.clone(),
            category_id.clone(),
            group_name.to_string(),
            Stage::Group,
            matchday,
        );
        m.player1_id = Some(player1);
        m.player2_id = Some(player2);
        m
    }

    pub fn is_header(&self) -> bool {
        self.status == MatchStatus::Header
    }

    pub fn is_finished(&self) -> bool {
        self.status == MatchStatus::Finished
    }

    /// Knockout round this match belongs to. `None` for group matches
    /// and for the 3rd-place match.
    pub fn round_key(&self) -> Option<RoundKey> {
        if self.stage != Stage::Knockout {
            return None;
        }
        match parse_round(&self.round)? {
            RoundRef::Knockout(key) => Some(key),
            RoundRef::Bronze => None,
        }
    }

    pub fn is_bronze(&self) -> bool {
        self.stage == Stage::Knockout && parse_round(&self.round) == Some(RoundRef::Bronze)
    }

    /// Position within the round, falling back to the "Mecz N" label suffix.
    pub fn slot_index(&self) -> Option<u32> {
        self.slot.or_else(|| super::round::match_number(&self.round))
    }

    pub fn has_no_players(&self) -> bool {
        self.player1_id.is_none() && self.player2_id.is_none()
    }

    /// Exactly one entrant present.
    pub fn is_bye(&self) -> bool {
        self.player1_id.is_some() != self.player2_id.is_some()
    }

    pub fn involves(&self, user: &UserId) -> bool {
        self.player1_id.as_ref() == Some(user) || self.player2_id.as_ref() == Some(user)
    }

    /// The finished match's other participant.
    pub fn loser_id(&self) -> Option<&UserId> {
        let winner = self.winner_id.as_ref()?;
        if self.player1_id.as_ref() == Some(winner) {
            self.player2_id.as_ref()
        } else if self.player2_id.as_ref() == Some(winner) {
            self.player1_id.as_ref()
        } else {
            None
        }
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduled_at.is_some()
    }

    /// Drop the result but keep pairing and schedule.
    pub fn clear_result(&mut self) {
        self.winner_id = None;
        self.result_type = ResultType::Normal;
        self.status = MatchStatus::Scheduled;
    }

    /// Return the row to an empty placeholder. The lock flag is kept.
    pub fn clear_all(&mut self) {
        self.clear_result();
        self.player1_id = None;
        self.player2_id = None;
        self.referee_id = None;
        self.scheduled_at = None;
        self.court = None;
        self.duration_min = None;
    }
}

/// One set's game score, owned by its match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSet {
    pub id: MatchSetId,

    pub match_id: MatchId,

    /// 1-based
    pub set_number: u32,

    pub player1_games: u32,

    pub player2_games: u32,
}

impl MatchSet {
    pub fn new(match_id: MatchId, set_number: u32, player1_games: u32, player2_games: u32) -> Self {
        let id = EntityId::generate(&[match_id.as_str(), "set", &set_number.to_string()]);
        Self {
            id,
            match_id,
            set_number,
            player1_games,
            player2_games,
        }
    }

    /// 1 or 2 for the player who took the set, `None` on level games.
    pub fn set_winner(&self) -> Option<u8> {
        match self.player1_games.cmp(&self.player2_games) {
            std::cmp::Ordering::Greater => Some(1),
            std::cmp::Ordering::Less => Some(2),
            std::cmp::Ordering::Equal => None,
        }
    }
}
