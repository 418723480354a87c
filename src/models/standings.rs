//! Derived group standings. Never persisted.

use serde::{Deserialize, Serialize};

use super::UserId;

/// One entrant's totals within a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupStandingRow {
    pub user_id: UserId,

    /// Filled in from the user directory by callers that have one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    pub played: u32,
    pub won: u32,
    pub lost: u32,
    pub sets_won: u32,
    pub sets_lost: u32,
    pub games_won: u32,
    pub games_lost: u32,

    /// One point per win
    pub points: u32,
}

impl GroupStandingRow {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            display_name: None,
            played: 0,
            won: 0,
            lost: 0,
            sets_won: 0,
            sets_lost: 0,
            games_won: 0,
            games_lost: 0,
            points: 0,
        }
    }

    pub fn set_diff(&self) -> i64 {
        self.sets_won as i64 - self.sets_lost as i64
    }

    pub fn game_diff(&self) -> i64 {
        self.games_won as i64 - self.games_lost as i64
    }

    /// Points, set differential, game differential.
    pub fn ranking_key(&self) -> (u32, i64, i64) {
        (self.points, self.set_diff(), self.game_diff())
    }
}

/// Ordered rows of one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupStandings {
    pub group: String,
    pub standings: Vec<GroupStandingRow>,
}

impl GroupStandings {
    /// Entrant at 1-based `rank`.
    pub fn at_rank(&self, rank: usize) -> Option<&UserId> {
        rank.checked_sub(1)
            .and_then(|i| self.standings.get(i))
            .map(|row| &row.user_id)
    }
}
