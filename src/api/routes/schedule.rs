use axum::extract::{Path, State};
use axum::Json;

use crate::api::state::{AppState, UpdateKind};
use crate::api::ApiError;
use crate::engine::schedule::{ScheduleOutcome, ScheduleRequest};
use crate::models::TournamentId;

/// Fields left out of the request fall back to `[scheduling]` in the
/// server config.
pub async fn auto_schedule(
    State(state): State<AppState>,
    Path(id): Path<String>,
    request: Option<Json<ScheduleRequest>>,
) -> Result<Json<ScheduleOutcome>, ApiError> {
    let tournament_id = TournamentId::from(id);
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let options = request.resolve(&state.config.scheduling)?;
    let outcome = state.engine.auto_schedule(&tournament_id, options)?;
    state.notify(&tournament_id, UpdateKind::Schedule);
    Ok(Json(outcome))
}
