use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::config::AppConfig;
use crate::engine::Engine;
use crate::models::TournamentId;

/// Buffered updates per subscriber before the slowest one starts lagging.
const UPDATE_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    Roster,
    Bracket,
    Seeding,
    Result,
    Pairing,
    Reset,
    Schedule,
}

/// Published after every successful mutating call so live views can
/// refresh standings and the bracket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BracketUpdate {
    pub tournament_id: TournamentId,
    pub kind: UpdateKind,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
    pub config: Arc<AppConfig>,
    pub updates: broadcast::Sender<BracketUpdate>,
}

impl AppState {
    pub fn new(engine: Engine, config: AppConfig) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            engine,
            config: Arc::new(config),
            updates,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BracketUpdate> {
        self.updates.subscribe()
    }

    /// Publish an update. Having no subscribers is not an error.
    pub fn notify(&self, tournament_id: &TournamentId, kind: UpdateKind) {
        let update = BracketUpdate {
            tournament_id: tournament_id.clone(),
            kind,
        };
        if self.updates.send(update).is_err() {
            debug!("No subscribers for {:?} update of {}", kind, tournament_id);
        }
    }
}
