//! Transactional table store.
//!
//! All tables live in memory. Writers run against a working copy inside
//! [`Store::transaction`]; the copy replaces the committed tables (and is
//! flushed to disk when a data dir is configured) only if the closure
//! succeeds. Readers always see the last committed state.

use std::sync::{Mutex, RwLock};

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use super::{JsonlReader, JsonlWriter, StagedFile, StorageConfig, StorageError, Table};
use crate::models::{
    Category, CategoryId, Match, MatchId, MatchSet, Registration, RegistrationStatus, Tournament,
    TournamentId, User, UserId,
};

/// Every row the engine reads or writes.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    pub tournaments: Vec<Tournament>,
    pub categories: Vec<Category>,
    pub registrations: Vec<Registration>,
    pub users: Vec<User>,
    pub matches: Vec<Match>,
    pub match_sets: Vec<MatchSet>,
}

impl Tables {
    pub fn tournament(&self, id: &TournamentId) -> Option<&Tournament> {
        self.tournaments.iter().find(|t| &t.id == id)
    }

    /// The category generation works in: the first one registered for
    /// the tournament.
    pub fn active_category(&self, tournament_id: &TournamentId) -> Option<&Category> {
        self.categories
            .iter()
            .find(|c| &c.tournament_id == tournament_id)
    }

    /// Accepted entrants in registration order, without duplicates.
    pub fn accepted_entrants(
        &self,
        tournament_id: &TournamentId,
        category_id: &CategoryId,
    ) -> Vec<UserId> {
        let mut out: Vec<UserId> = Vec::new();
        for reg in self.registrations.iter().filter(|r| {
            &r.tournament_id == tournament_id
                && &r.category_id == category_id
                && r.status == RegistrationStatus::Accepted
        }) {
            if !out.contains(&reg.user_id) {
                out.push(reg.user_id.clone());
            }
        }
        out
    }

    pub fn display_name(&self, user_id: &UserId) -> Option<&str> {
        self.users
            .iter()
            .find(|u| &u.id == user_id)
            .map(|u| u.display_name.as_str())
    }

    pub fn match_by_id(&self, id: &MatchId) -> Option<&Match> {
        self.matches.iter().find(|m| &m.id == id)
    }

    pub fn match_mut(&mut self, id: &MatchId) -> Option<&mut Match> {
        self.matches.iter_mut().find(|m| &m.id == id)
    }

    /// Matches of one tournament/category.
    pub fn matches_in<'a>(
        &'a self,
        tournament_id: &'a TournamentId,
        category_id: &'a CategoryId,
    ) -> impl Iterator<Item = &'a Match> + 'a {
        self.matches
            .iter()
            .filter(move |m| &m.tournament_id == tournament_id && &m.category_id == category_id)
    }

    /// Sets of a match ordered by set number.
    pub fn sets_for(&self, match_id: &MatchId) -> Vec<&MatchSet> {
        let mut sets: Vec<&MatchSet> = self
            .match_sets
            .iter()
            .filter(|s| &s.match_id == match_id)
            .collect();
        sets.sort_by_key(|s| s.set_number);
        sets
    }

    /// Drop a match's sets and store `sets` in their place.
    pub fn replace_sets(&mut self, match_id: &MatchId, sets: Vec<MatchSet>) {
        self.match_sets.retain(|s| &s.match_id != match_id);
        self.match_sets.extend(sets);
    }

    /// Insert a match, or replace the row with the same ID.
    pub fn upsert_match(&mut self, m: Match) {
        match self.matches.iter_mut().find(|existing| existing.id == m.id) {
            Some(existing) => *existing = m,
            None => self.matches.push(m),
        }
    }

    /// Delete matching rows together with their sets. Returns the number
    /// of matches removed.
    pub fn delete_matches<F>(&mut self, predicate: F) -> usize
    where
        F: Fn(&Match) -> bool,
    {
        let doomed: Vec<MatchId> = self
            .matches
            .iter()
            .filter(|m| predicate(m))
            .map(|m| m.id.clone())
            .collect();
        self.matches.retain(|m| !doomed.contains(&m.id));
        self.match_sets.retain(|s| !doomed.contains(&s.match_id));
        doomed.len()
    }
}

/// Shared store handle.
pub struct Store {
    config: Option<StorageConfig>,
    committed: RwLock<Tables>,
    writer: Mutex<()>,
}

impl Store {
    /// A store that never touches disk.
    pub fn in_memory() -> Self {
        Self::with_tables(Tables::default())
    }

    pub fn with_tables(tables: Tables) -> Self {
        Self {
            config: None,
            committed: RwLock::new(tables),
            writer: Mutex::new(()),
        }
    }

    /// Load all tables from the data dir. Missing files read as empty.
    pub fn open(config: StorageConfig) -> Result<Self, StorageError> {
        let tables = Tables {
            tournaments: load(&config, Table::Tournaments)?,
            categories: load(&config, Table::Categories)?,
            registrations: load(&config, Table::Registrations)?,
            users: load(&config, Table::Users)?,
            matches: load(&config, Table::Matches)?,
            match_sets: load(&config, Table::MatchSets)?,
        };
        info!(
            "Opened store at {:?}: {} tournaments, {} matches",
            config.tables_dir(),
            tables.tournaments.len(),
            tables.matches.len()
        );
        Ok(Self {
            config: Some(config),
            committed: RwLock::new(tables),
            writer: Mutex::new(()),
        })
    }

    /// Run `f` against the committed tables.
    pub fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> Result<T, StorageError> {
        let tables = self.committed.read().map_err(|_| StorageError::Poisoned)?;
        Ok(f(&tables))
    }

    /// Run `f` against a working copy and commit it only on success.
    ///
    /// Writers are serialized; readers keep seeing the previous state
    /// until the commit swaps the tables in.
    pub fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Tables) -> Result<T, E>,
        E: From<StorageError>,
    {
        let _guard = self.writer.lock().map_err(|_| StorageError::Poisoned)?;

        let mut working = self
            .committed
            .read()
            .map_err(|_| StorageError::Poisoned)?
            .clone();

        let out = f(&mut working)?;

        if let Some(config) = &self.config {
            persist(config, &working)?;
        }

        *self.committed.write().map_err(|_| StorageError::Poisoned)? = working;
        debug!("Committed transaction");
        Ok(out)
    }
}

fn load<T: DeserializeOwned>(config: &StorageConfig, table: Table) -> Result<Vec<T>, StorageError> {
    JsonlReader::for_table(config, table).read_all()
}

fn stage<T: Serialize>(
    config: &StorageConfig,
    table: Table,
    rows: &[T],
    staged: &mut Vec<StagedFile>,
) -> Result<(), StorageError> {
    staged.push(JsonlWriter::for_table(config, table).stage(rows)?);
    Ok(())
}

fn stage_all(
    config: &StorageConfig,
    tables: &Tables,
    staged: &mut Vec<StagedFile>,
) -> Result<(), StorageError> {
    stage(config, Table::Tournaments, &tables.tournaments, staged)?;
    stage(config, Table::Categories, &tables.categories, staged)?;
    stage(config, Table::Registrations, &tables.registrations, staged)?;
    stage(config, Table::Users, &tables.users, staged)?;
    stage(config, Table::Matches, &tables.matches, staged)?;
    stage(config, Table::MatchSets, &tables.match_sets, staged)
}

/// Write every table to its temp file, then rename them all. A failure
/// while staging leaves the table files as they were.
fn persist(config: &StorageConfig, tables: &Tables) -> Result<(), StorageError> {
    let mut staged = Vec::with_capacity(6);
    if let Err(e) = stage_all(config, tables, &mut staged) {
        warn!("Persist aborted before commit: {}", e);
        for file in staged {
            file.discard();
        }
        return Err(e);
    }

    for file in staged {
        file.commit()?;
    }
    Ok(())
}
