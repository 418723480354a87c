use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use crate::api::state::{AppState, UpdateKind};
use crate::api::ApiError;
use crate::engine::bracket::{GenerateOutcome, SeedOptions, SeedOutcome, SkeletonOutcome};
use crate::engine::reset::{GroupResetOutcome, KnockoutResetOutcome};
use crate::models::TournamentId;

pub async fn generate_knockout(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<GenerateOutcome>, ApiError> {
    let tournament_id = TournamentId::from(id);
    let outcome = state.engine.generate_direct_knockout(&tournament_id)?;
    state.notify(&tournament_id, UpdateKind::Bracket);
    Ok(Json(outcome))
}

pub async fn generate_groups(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SkeletonOutcome>, ApiError> {
    let tournament_id = TournamentId::from(id);
    let outcome = state
        .engine
        .generate_groups_and_knockout_skeleton(&tournament_id)?;
    state.notify(&tournament_id, UpdateKind::Bracket);
    Ok(Json(outcome))
}

/// Body is optional; an empty request uses the default options.
pub async fn seed(
    State(state): State<AppState>,
    Path(id): Path<String>,
    options: Option<Json<SeedOptions>>,
) -> Result<Json<SeedOutcome>, ApiError> {
    let tournament_id = TournamentId::from(id);
    let options = options.map(|Json(o)| o).unwrap_or_default();
    let outcome = state.engine.seed_knockout(&tournament_id, options)?;
    state.notify(&tournament_id, UpdateKind::Seeding);
    Ok(Json(outcome))
}

#[derive(Debug, Default, Deserialize)]
pub struct ResetGroupsBody {
    #[serde(default)]
    pub also_ko: bool,
}

pub async fn reset_groups(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<ResetGroupsBody>>,
) -> Result<Json<GroupResetOutcome>, ApiError> {
    let tournament_id = TournamentId::from(id);
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let outcome = state
        .engine
        .reset_group_phase(&tournament_id, body.also_ko)?;
    state.notify(&tournament_id, UpdateKind::Reset);
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
pub struct ResetKnockoutBody {
    /// Any accepted round spelling ("SF", "Półfinał", "1/2", ...)
    pub round: String,
}

pub async fn reset_knockout(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ResetKnockoutBody>,
) -> Result<Json<KnockoutResetOutcome>, ApiError> {
    let tournament_id = TournamentId::from(id);
    let outcome = state
        .engine
        .reset_knockout_from_round(&tournament_id, &body.round)?;
    state.notify(&tournament_id, UpdateKind::Reset);
    Ok(Json(outcome))
}
