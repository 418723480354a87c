//! REST API endpoints.
//!
//! Axum-based HTTP API over the engine: roster import, bracket
//! generation and seeding, results, manual pairing, resets and the
//! auto-scheduler. Every mutating call publishes a [`state::BracketUpdate`].

pub mod routes;
pub mod state;

use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Serialize;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::engine::EngineError;
use state::AppState;

/// API error types.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let message = err.to_string();
        match err {
            EngineError::TournamentNotFound(_) | EngineError::MatchNotFound(_) => {
                ApiError::NotFound(message)
            }
            EngineError::NotEnoughEntrants(_)
            | EngineError::ByesDisabled(_)
            | EngineError::BracketTooLarge(_)
            | EngineError::InvalidRound(_)
            | EngineError::InvalidInput(_) => ApiError::BadRequest(message),
            EngineError::NoCategory(_)
            | EngineError::NoGroupData
            | EngineError::Locked(_)
            | EngineError::Conflict(_) => ApiError::Conflict(message),
            EngineError::Storage(_) => ApiError::Internal(message),
        }
    }
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origin == "*" {
        return layer.allow_origin(Any);
    }
    match HeaderValue::from_str(origin) {
        Ok(value) => layer.allow_origin(value),
        Err(_) => {
            warn!("Ignoring invalid CORS origin {:?}", origin);
            layer
        }
    }
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    use routes::{bracket, matches, schedule, tournaments};

    let cors = cors_layer(&state.config.server.cors_origin);

    Router::new()
        // Roster and read models
        .route("/api/tournaments", post(tournaments::import_roster))
        .route("/api/tournaments/:id/matches", get(tournaments::list_matches))
        .route("/api/tournaments/:id/standings", get(tournaments::standings))
        .route(
            "/api/tournaments/:id/rounds/:round/eligible",
            get(tournaments::eligible),
        )
        // Generation and seeding
        .route(
            "/api/tournaments/:id/knockout/generate",
            post(bracket::generate_knockout),
        )
        .route(
            "/api/tournaments/:id/groups/generate",
            post(bracket::generate_groups),
        )
        .route("/api/tournaments/:id/knockout/seed", post(bracket::seed))
        // Teardown
        .route("/api/tournaments/:id/groups/reset", post(bracket::reset_groups))
        .route(
            "/api/tournaments/:id/knockout/reset",
            post(bracket::reset_knockout),
        )
        // Scheduling
        .route("/api/tournaments/:id/schedule", post(schedule::auto_schedule))
        // Match edits
        .route("/api/matches/:id/result", put(matches::record_result))
        .route("/api/matches/:id/pairing", put(matches::assign_pairing))
        .route("/api/matches/:id/lock", put(matches::set_lock))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod testing {
    //! Router test helpers.

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::util::ServiceExt;

    use super::state::AppState;
    use crate::config::AppConfig;
    use crate::engine::testing::engine_with;
    use crate::storage::Tables;

    pub fn state_with(tables: Tables) -> AppState {
        AppState::new(engine_with(tables), AppConfig::default())
    }

    async fn send(app: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
        let resp = app.oneshot(request).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, Value) {
        send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn send_json(
        app: axum::Router,
        method: &str,
        uri: &str,
        body: Value,
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        send(app, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntityId;

    #[test]
    fn test_engine_error_status_mapping() {
        let cases = [
            (EngineError::MatchNotFound(EntityId::from("m")), StatusCode::NOT_FOUND),
            (EngineError::ByesDisabled(6), StatusCode::BAD_REQUEST),
            (EngineError::InvalidRound("x".into()), StatusCode::BAD_REQUEST),
            (EngineError::NoGroupData, StatusCode::CONFLICT),
            (EngineError::Locked(EntityId::from("m")), StatusCode::CONFLICT),
        ];
        for (err, status) in cases {
            let resp = ApiError::from(err).into_response();
            assert_eq!(resp.status(), status);
        }
    }

    #[test]
    fn test_cors_layer_accepts_wildcard_and_origin() {
        // Construction must not panic for either form.
        let _ = cors_layer("*");
        let _ = cors_layer("http://localhost:3000");
        let _ = cors_layer("bad\norigin");
    }
}
