//! Import of tournament, category, registration and user records.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{Engine, EngineError};
use crate::models::{Category, Registration, Tournament, TournamentId, User};

/// One tournament with everything the engine reads about it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterImport {
    pub tournament: Tournament,
    #[serde(default)]
    pub categories: Vec<Category>,
    /// Registration order is the seeding order.
    #[serde(default)]
    pub registrations: Vec<Registration>,
    #[serde(default)]
    pub users: Vec<User>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterOutcome {
    pub tournament_id: TournamentId,
    pub categories: usize,
    pub registrations: usize,
    pub users: usize,
}

impl RosterImport {
    fn validate(&self) -> Result<(), EngineError> {
        let id = &self.tournament.id;
        self.tournament
            .settings
            .validate()
            .map_err(EngineError::InvalidInput)?;

        if let Some(c) = self.categories.iter().find(|c| &c.tournament_id != id) {
            return Err(EngineError::InvalidInput(format!(
                "category {} belongs to tournament {}",
                c.id, c.tournament_id
            )));
        }
        for reg in &self.registrations {
            if &reg.tournament_id != id {
                return Err(EngineError::InvalidInput(format!(
                    "registration of {} belongs to tournament {}",
                    reg.user_id, reg.tournament_id
                )));
            }
            if !self.categories.iter().any(|c| c.id == reg.category_id) {
                return Err(EngineError::InvalidInput(format!(
                    "registration of {} names unknown category {}",
                    reg.user_id, reg.category_id
                )));
            }
        }
        Ok(())
    }
}

impl Engine {
    /// Upsert a tournament and replace its categories and registrations.
    /// Users are upserted by id. Matches are left alone.
    pub fn import_roster(&self, roster: RosterImport) -> Result<RosterOutcome, EngineError> {
        roster.validate()?;
        let id = roster.tournament.id.clone();

        let outcome = self.store.transaction(|tables| -> Result<RosterOutcome, EngineError> {
            let outcome = RosterOutcome {
                tournament_id: id.clone(),
                categories: roster.categories.len(),
                registrations: roster.registrations.len(),
                users: roster.users.len(),
            };

            match tables.tournaments.iter_mut().find(|t| t.id == id) {
                Some(existing) => *existing = roster.tournament,
                None => tables.tournaments.push(roster.tournament),
            }

            tables.categories.retain(|c| c.tournament_id != id);
            tables.categories.extend(roster.categories);
            tables.registrations.retain(|r| r.tournament_id != id);
            tables.registrations.extend(roster.registrations);

            for user in roster.users {
                match tables.users.iter_mut().find(|u| u.id == user.id) {
                    Some(existing) => *existing = user,
                    None => tables.users.push(user),
                }
            }
            Ok(outcome)
        })?;

        info!(
            "Imported {}: {} categories, {} registrations, {} users",
            outcome.tournament_id, outcome.categories, outcome.registrations, outcome.users
        );
        Ok(outcome)
    }
}
