use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use crate::api::state::{AppState, UpdateKind};
use crate::api::ApiError;
use crate::engine::pairing::PairingInput;
use crate::engine::results::ResultInput;
use crate::models::{Match, MatchId};

pub async fn record_result(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<ResultInput>,
) -> Result<Json<Match>, ApiError> {
    let updated = state
        .engine
        .record_match_result(&MatchId::from(id), input)?;
    state.notify(&updated.tournament_id, UpdateKind::Result);
    Ok(Json(updated))
}

pub async fn assign_pairing(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<PairingInput>,
) -> Result<Json<Match>, ApiError> {
    let updated = state.engine.assign_pairing(&MatchId::from(id), input)?;
    state.notify(&updated.tournament_id, UpdateKind::Pairing);
    Ok(Json(updated))
}

#[derive(Debug, Deserialize)]
pub struct LockBody {
    pub locked: bool,
}

pub async fn set_lock(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<LockBody>,
) -> Result<Json<Match>, ApiError> {
    let updated = state.engine.set_locked(&MatchId::from(id), body.locked)?;
    state.notify(&updated.tournament_id, UpdateKind::Pairing);
    Ok(Json(updated))
}

#[cfg(test)]
mod tests {
    use crate::api::build_router;
    use crate::api::state::{AppState, UpdateKind};
    use crate::api::testing::{send_json, state_with};
    use crate::engine::testing::{ko_settings, tables_with, tid};
    use crate::models::{Match, RoundKey};
    use axum::http::StatusCode;
    use serde_json::json;

    fn round(state: &AppState, key: RoundKey) -> Vec<Match> {
        let mut out: Vec<Match> = state
            .engine
            .list_matches(&tid())
            .unwrap()
            .into_iter()
            .filter(|m| m.round_key() == Some(key))
            .collect();
        out.sort_by_key(|m| m.slot_index());
        out
    }

    async fn generated(n: usize) -> AppState {
        let state = state_with(tables_with(ko_settings(true), n));
        let app = build_router(state.clone());
        let (status, _) =
            send_json(app, "POST", "/api/tournaments/t-1/knockout/generate", json!({})).await;
        assert_eq!(status, StatusCode::OK);
        state
    }

    #[tokio::test]
    async fn test_results_advance_into_final() {
        let state = generated(4).await;
        let mut updates = state.subscribe();
        let app = build_router(state.clone());
        let semis = round(&state, RoundKey::SF);

        for sf in &semis {
            let (status, json) = send_json(
                app.clone(),
                "PUT",
                &format!("/api/matches/{}/result", sf.id),
                json!({ "sets": [
                    { "player1_games": 6, "player2_games": 2 },
                    { "player1_games": 6, "player2_games": 4 }
                ] }),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(json["winner_id"], json["player1_id"]);
        }

        let update = updates.try_recv().unwrap();
        assert_eq!(update.kind, UpdateKind::Result);
        assert_eq!(update.tournament_id, tid());

        let final_match = &round(&state, RoundKey::F)[0];
        assert_eq!(final_match.player1_id, semis[0].player1_id);
        assert_eq!(final_match.player2_id, semis[1].player1_id);
    }

    #[tokio::test]
    async fn test_result_validation() {
        let state = generated(4).await;
        let app = build_router(state.clone());
        let sf = &round(&state, RoundKey::SF)[0];

        let (status, _) = send_json(
            app.clone(),
            "PUT",
            &format!("/api/matches/{}/result", sf.id),
            json!({ "sets": [{ "player1_games": 6, "player2_games": 6 }] }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send_json(
            app,
            "PUT",
            "/api/matches/nope/result",
            json!({ "walkover_winner_id": "p1" }),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_lock_blocks_pairing() {
        let state = generated(4).await;
        let app = build_router(state.clone());
        let sf = &round(&state, RoundKey::SF)[0];

        let (status, json) = send_json(
            app.clone(),
            "PUT",
            &format!("/api/matches/{}/lock", sf.id),
            json!({ "locked": true }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["locked"], true);

        let (status, _) = send_json(
            app,
            "PUT",
            &format!("/api/matches/{}/pairing", sf.id),
            json!({ "player1_id": "p1", "player2_id": "p2" }),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_pairing_rejects_player_already_in_round() {
        let state = generated(4).await;
        let app = build_router(state.clone());
        let semis = round(&state, RoundKey::SF);
        let other = semis[1].player1_id.clone().unwrap();

        let (status, _) = send_json(
            app,
            "PUT",
            &format!("/api/matches/{}/pairing", semis[0].id),
            json!({ "player1_id": semis[0].player1_id, "player2_id": other }),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }
}
