use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    response::Response,
};
use serde_json::{json, Value};
use tower::ServiceExt; // for `oneshot`

use super::setup::TestSetup;

// ============================================================================
// Action Helpers
// ============================================================================

impl TestSetup {
    /// Send a raw request through the full router
    pub async fn send(&self, request: Request<Body>) -> Response {
        self.app.clone().oneshot(request).await.unwrap()
    }

    /// Send a JSON request as the seeded admin and decode the JSON reply
    pub async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("Authorization", format!("Bearer {}", self.admin_token));
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.send(request).await;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.call(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, Some(body)).await
    }

    pub async fn put(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::PUT, uri, Some(body)).await
    }

    /// Move the server clock forward
    pub fn advance_secs(&self, seconds: i64) {
        self.clock.advance(chrono::Duration::seconds(seconds));
    }

    // ============================================================================
    // Convenience Action Methods
    // ============================================================================

    pub async fn create_deck(&self, name: &str) -> i64 {
        let (status, deck) = self.post("/api/decks", json!({ "name": name })).await;
        assert_eq!(status, StatusCode::CREATED, "{}", deck);
        deck["id"].as_i64().unwrap()
    }

    /// Start a game seating `seats` as (user id, deck id) pairs
    pub async fn start_game(&self, first_move_team: i64, seats: &[(i64, i64)]) -> Value {
        let players: Vec<Value> = seats
            .iter()
            .map(|(user_id, deck_id)| json!({ "user_id": user_id, "deck_id": deck_id }))
            .collect();
        let (status, game) = self
            .post(
                "/api/games",
                json!({
                    "turn_limit_seconds": 60,
                    "team_time_limit_seconds": 0,
                    "first_move_team": first_move_team,
                    "players": players,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", game);
        game
    }

    pub async fn finish_active(&self, winning_team: i64) -> Value {
        let (status, game) = self
            .post(
                "/api/games/active/finish",
                json!({ "winning_team": winning_team }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", game);
        game
    }
}
