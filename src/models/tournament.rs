//! Tournament, category, registration and directory records.
//!
//! These are owned by the surrounding CRUD services; the engine only
//! reads them.

use serde::{Deserialize, Serialize};

use super::{CategoryId, TournamentId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Format {
    /// Round-robin groups feeding a knockout bracket
    GroupsKo,
    #[default]
    KoOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KoSeedingPolicy {
    RandomCross,
    #[default]
    Structured,
}

fn default_group_size() -> u8 {
    4
}

fn default_qualifiers_per_group() -> u8 {
    2
}

fn default_allow_byes() -> bool {
    true
}

/// Settings the engine reads when generating and seeding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TournamentSettings {
    #[serde(default)]
    pub format: Format,

    /// 3 or 4
    #[serde(default = "default_group_size")]
    pub group_size: u8,

    /// 1 or 2
    #[serde(default = "default_qualifiers_per_group")]
    pub qualifiers_per_group: u8,

    #[serde(default = "default_allow_byes")]
    pub allow_byes: bool,

    #[serde(default)]
    pub ko_seeding_policy: KoSeedingPolicy,

    #[serde(default)]
    pub avoid_same_group_in_r1: bool,
}

impl Default for TournamentSettings {
    fn default() -> Self {
        Self {
            format: Format::default(),
            group_size: default_group_size(),
            qualifiers_per_group: default_qualifiers_per_group(),
            allow_byes: default_allow_byes(),
            ko_seeding_policy: KoSeedingPolicy::default(),
            avoid_same_group_in_r1: false,
        }
    }
}

impl TournamentSettings {
    /// Check the enumerated ranges. Returns a human-readable reason.
    pub fn validate(&self) -> Result<(), String> {
        if !matches!(self.group_size, 3 | 4) {
            return Err(format!("group_size must be 3 or 4, got {}", self.group_size));
        }
        if !matches!(self.qualifiers_per_group, 1 | 2) {
            return Err(format!(
                "qualifiers_per_group must be 1 or 2, got {}",
                self.qualifiers_per_group
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tournament {
    pub id: TournamentId,
    pub name: String,
    #[serde(default)]
    pub settings: TournamentSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub tournament_id: TournamentId,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
}

/// An entry request. Registration order is the entrant ranking used
/// for seeding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    pub tournament_id: TournamentId,
    pub category_id: CategoryId,
    pub user_id: UserId,
    #[serde(default)]
    pub status: RegistrationStatus,
}

/// Directory entry for display names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub display_name: String,
}
