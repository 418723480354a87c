use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::api::state::{AppState, UpdateKind};
use crate::api::ApiError;
use crate::engine::pairing::EligibleEntrant;
use crate::engine::roster::{RosterImport, RosterOutcome};
use crate::models::{GroupStandings, Match, TournamentId};

pub async fn import_roster(
    State(state): State<AppState>,
    Json(roster): Json<RosterImport>,
) -> Result<(StatusCode, Json<RosterOutcome>), ApiError> {
    let outcome = state.engine.import_roster(roster)?;
    state.notify(&outcome.tournament_id, UpdateKind::Roster);
    Ok((StatusCode::CREATED, Json(outcome)))
}

#[derive(Debug, Serialize)]
pub struct MatchListResponse {
    pub matches: Vec<Match>,
    pub total: usize,
}

pub async fn list_matches(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MatchListResponse>, ApiError> {
    let matches = state.engine.list_matches(&TournamentId::from(id))?;
    Ok(Json(MatchListResponse {
        total: matches.len(),
        matches,
    }))
}

pub async fn standings(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<GroupStandings>>, ApiError> {
    let standings = state.engine.compute_standings(&TournamentId::from(id))?;
    Ok(Json(standings))
}

#[derive(Debug, Serialize)]
pub struct EligibleResponse {
    pub round: String,
    pub entrants: Vec<EligibleEntrant>,
}

pub async fn eligible(
    State(state): State<AppState>,
    Path((id, round)): Path<(String, String)>,
) -> Result<Json<EligibleResponse>, ApiError> {
    let entrants = state
        .engine
        .eligible_players(&TournamentId::from(id), &round)?;
    Ok(Json(EligibleResponse { round, entrants }))
}

#[cfg(test)]
mod tests {
    use crate::api::build_router;
    use crate::api::state::UpdateKind;
    use crate::api::testing::{get_json, send_json, state_with};
    use crate::engine::testing::{groups_settings, ko_settings, tables_with};
    use crate::models::{Match, EntityId};
    use crate::storage::Tables;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_import_roster_then_list() {
        let state = state_with(Tables::default());
        let mut updates = state.subscribe();
        let app = build_router(state.clone());

        let body = json!({
            "tournament": { "id": "t-9", "name": "Spring Open", "settings": { "format": "KO_ONLY" } },
            "categories": [{ "id": "c-9", "tournament_id": "t-9", "name": "Singles" }],
            "registrations": [
                { "tournament_id": "t-9", "category_id": "c-9", "user_id": "ann", "status": "accepted" },
                { "tournament_id": "t-9", "category_id": "c-9", "user_id": "bob", "status": "accepted" }
            ],
            "users": [{ "id": "ann", "display_name": "Ann" }]
        });
        let (status, json) = send_json(app, "POST", "/api/tournaments", body).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["registrations"], 2);
        let update = updates.try_recv().unwrap();
        assert_eq!(update.kind, UpdateKind::Roster);
        assert_eq!(update.tournament_id, EntityId::from("t-9"));

        let app = build_router(state);
        let (status, json) = get_json(app, "/api/tournaments/t-9/matches").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["total"], 0);
    }

    #[tokio::test]
    async fn test_unknown_tournament_is_404() {
        let app = build_router(state_with(Tables::default()));

        let (status, json) = get_json(app, "/api/tournaments/nope/matches").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_standings_endpoint() {
        let mut tables = tables_with(groups_settings(4, 2), 0);
        tables.matches.push(Match::group_match(
            &"t-1".into(),
            &"cat-1".into(),
            "Grupa A",
            1,
            "a".into(),
            "b".into(),
        ));
        let app = build_router(state_with(tables));

        let (status, json) = get_json(app, "/api/tournaments/t-1/standings").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json[0]["group"], "Grupa A");
        assert_eq!(json[0]["standings"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_eligible_endpoint() {
        let app = build_router(state_with(tables_with(ko_settings(true), 3)));

        let (status, json) = get_json(app.clone(), "/api/tournaments/t-1/rounds/QF/eligible").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["entrants"].as_array().unwrap().len(), 3);

        let (status, _) = get_json(app, "/api/tournaments/t-1/rounds/whatever/eligible").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
