mod utils;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::json;
use utils::{TestSetupBuilder, ADMIN_NAME, ADMIN_PASSWORD, API_TOKEN};

#[tokio::test]
async fn test_full_game_feeds_player_and_deck_stats() {
    let setup = TestSetupBuilder::new().with_four_players().build().await;
    let p = &setup.players;
    let elves = setup.create_deck("Elves").await;
    let goblins = setup.create_deck("Goblins").await;

    // seats 0 and 1 form team 1, seats 2 and 3 team 2
    let game = setup
        .start_game(
            1,
            &[(p[0], elves), (p[2], elves), (p[1], goblins), (p[3], goblins)],
        )
        .await;
    assert_eq!(game["players"][1]["team"], 1);
    assert_eq!(game["players"][2]["team"], 2);
    assert_eq!(game["players"][0]["deck_name"], "Elves");

    let (status, updated) = setup
        .put(
            "/api/games/active",
            json!({
                "current_turn_team": 2,
                "current_turn_start": "2024-05-01T18:01:00Z",
                "turns": [
                    {"team_number": 1, "duration_sec": 30},
                    {"team_number": 2, "duration_sec": 45},
                    {"team_number": 1, "duration_sec": 20}
                ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", updated);
    assert_eq!(updated["turns"].as_array().unwrap().len(), 3);
    assert_eq!(updated["current_turn_team"], 2);

    let finished = setup.finish_active(1).await;
    assert_eq!(finished["winning_team"], 1);
    assert!(finished["end_time"].is_string());

    let (status, stats) = setup.get("/api/stats/players").await;
    assert_eq!(status, StatusCode::OK);
    let rows = stats.as_array().unwrap();
    // the admin never played, so only the four seated players appear
    assert_eq!(rows.len(), 4);

    let alice = rows.iter().find(|r| r["player_id"] == p[0]).unwrap();
    assert_eq!(alice["games_count"], 1);
    assert_eq!(alice["wins_count"], 1);
    assert_eq!(alice["win_percent"], 100.0);
    assert_eq!(alice["first_move_games"], 1);
    assert_eq!(alice["avg_turn_duration_sec"], 25);
    assert_eq!(alice["max_turn_duration_sec"], 30);
    assert_eq!(alice["best_deck_name"], "Elves");

    let bob = rows.iter().find(|r| r["player_id"] == p[1]).unwrap();
    assert_eq!(bob["wins_count"], 0);
    assert_eq!(bob["win_percent"], 0.0);
    assert_eq!(bob["first_move_games"], 0);
    assert_eq!(bob["avg_turn_duration_sec"], 45);

    let (_, decks) = setup.get("/api/stats/decks").await;
    let decks = decks.as_array().unwrap();
    assert_eq!(decks.len(), 2);
    assert_eq!(decks[0]["deck_id"], elves);
    assert_eq!(decks[0]["games_count"], 2);
    assert_eq!(decks[0]["wins_count"], 2);
    assert_eq!(decks[1]["deck_id"], goblins);
    assert_eq!(decks[1]["wins_count"], 0);
}

#[tokio::test]
async fn test_pause_shifts_running_turn() {
    let setup = TestSetupBuilder::new()
        .with_players(vec!["ann", "ben"])
        .build()
        .await;
    let p = &setup.players;
    setup.start_game(1, &[(p[0], 0), (p[1], 0)]).await;

    let (_, started) = setup.post("/api/games/active/start-turn", json!({})).await;
    let anchor = started["current_turn_start"].as_str().unwrap().to_string();

    setup.advance_secs(10);
    let (_, paused) = setup.post("/api/games/active/pause", json!({})).await;
    assert_eq!(paused["is_paused"], true);
    assert_eq!(paused["current_turn_elapsed_seconds"], 10);

    setup.advance_secs(90);
    let (_, still_paused) = setup.get("/api/games/active").await;
    assert_eq!(still_paused["current_turn_elapsed_seconds"], 10);

    let (_, resumed) = setup.post("/api/games/active/resume", json!({})).await;
    assert_eq!(resumed["is_paused"], false);
    assert_eq!(resumed["total_pause_duration_seconds"], 90);
    assert_eq!(resumed["current_turn_elapsed_seconds"], 10);
    assert_ne!(resumed["current_turn_start"].as_str().unwrap(), anchor);

    setup.advance_secs(5);
    let (_, later) = setup.get("/api/games/active").await;
    assert_eq!(later["current_turn_elapsed_seconds"], 15);
}

#[tokio::test]
async fn test_only_one_active_game() {
    let setup = TestSetupBuilder::new()
        .with_players(vec!["ann", "ben"])
        .build()
        .await;
    let p = &setup.players;
    setup.start_game(1, &[(p[0], 0), (p[1], 0)]).await;

    let (status, body) = setup
        .post(
            "/api/games",
            json!({
                "first_move_team": 2,
                "players": [{"user_id": p[0]}, {"user_id": p[1]}]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["category"], "conflict");

    setup.finish_active(2).await;
    let (status, _) = setup.get("/api/games/active").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // a finished game frees the slot
    setup.start_game(2, &[(p[1], 0), (p[0], 0)]).await;
}

#[tokio::test]
async fn test_unknown_player_rejected() {
    let setup = TestSetupBuilder::new()
        .with_players(vec!["ann"])
        .build()
        .await;

    let (status, _) = setup
        .post(
            "/api/games",
            json!({
                "first_move_team": 1,
                "players": [{"user_id": setup.players[0]}, {"user_id": 9999}]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = setup.get("/api/games/active").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_omitted_turns_keep_ledger() {
    let setup = TestSetupBuilder::new()
        .with_players(vec!["ann", "ben"])
        .build()
        .await;
    let p = &setup.players;
    setup.start_game(1, &[(p[0], 0), (p[1], 0)]).await;

    setup
        .put(
            "/api/games/active",
            json!({
                "current_turn_team": 2,
                "turns": [{"team_number": 1, "duration_sec": 12}]
            }),
        )
        .await;

    let (_, kept) = setup
        .put("/api/games/active", json!({ "current_turn_team": 1 }))
        .await;
    assert_eq!(kept["turns"].as_array().unwrap().len(), 1);
    assert!(kept["current_turn_start"].is_null());

    let (_, emptied) = setup
        .put(
            "/api/games/active",
            json!({ "current_turn_team": 2, "turns": [] }),
        )
        .await;
    assert!(emptied["turns"].as_array().unwrap().is_empty());

    let (status, _) = setup
        .put(
            "/api/games/active",
            json!({ "current_turn_team": 3, "turns": [] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_and_api_token_access() {
    let setup = TestSetupBuilder::new().build().await;

    let response = setup
        .send(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    json!({ "name": ADMIN_NAME, "password": ADMIN_PASSWORD }).to_string(),
                ))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = setup
        .send(
            Request::builder()
                .uri("/api/decks")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = setup
        .send(
            Request::builder()
                .uri("/api/decks")
                .header("Authorization", format!("Bearer {}", API_TOKEN))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // the static token carries no identity, so admin routes stay closed
    let response = setup
        .send(
            Request::builder()
                .method("DELETE")
                .uri("/api/games")
                .header("Authorization", format!("Bearer {}", API_TOKEN))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health_is_open() {
    let setup = TestSetupBuilder::new().build().await;
    let response = setup
        .send(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}
