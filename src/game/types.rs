use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::models::{GameModel, GamePlayerModel, GameTurnModel};
use super::team::Team;
use super::timer;

/// Nested user reference accepted in player entries
#[derive(Debug, Deserialize)]
pub struct PlayerUserRef {
    pub id: i64,
}

/// One seat of a game being created; either `user_id` or `user.id` must be given
#[derive(Debug, Deserialize)]
pub struct GamePlayerRequest {
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub user: Option<PlayerUserRef>,
    #[serde(default)]
    pub deck_id: Option<i64>,
    #[serde(default)]
    pub deck_name: Option<String>,
}

impl GamePlayerRequest {
    pub fn resolved_user_id(&self) -> Option<i64> {
        self.user
            .as_ref()
            .map(|u| u.id)
            .filter(|&id| id > 0)
            .or(self.user_id.filter(|&id| id > 0))
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateGameRequest {
    #[serde(default)]
    pub turn_limit_seconds: i32,
    #[serde(default)]
    pub team_time_limit_seconds: i32,
    pub first_move_team: i64,
    #[serde(default)]
    pub team1_name: Option<String>,
    #[serde(default)]
    pub team2_name: Option<String>,
    pub players: Vec<GamePlayerRequest>,
}

/// Ledger entry sent by the client; any `id` it carries is ignored
#[derive(Debug, Deserialize)]
pub struct TurnRequest {
    pub team_number: i64,
    #[serde(default)]
    pub duration_sec: i32,
    #[serde(default)]
    pub overtime_sec: i32,
}

/// Body of `PUT /api/games/active`.
/// `current_turn_start` only signals whether a turn is running; its value is
/// validated but the anchor always comes from the server clock.
/// `turns` omitted keeps the ledger, `turns: []` empties it.
#[derive(Debug, Deserialize)]
pub struct UpdateActiveGameRequest {
    pub current_turn_team: i64,
    #[serde(default)]
    pub current_turn_start: Option<String>,
    #[serde(default)]
    pub turns: Option<Vec<TurnRequest>>,
}

#[derive(Debug, Deserialize)]
pub struct FinishGameRequest {
    pub winning_team: i64,
    #[serde(default)]
    pub is_technical_defeat: bool,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PlayerUserResponse {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct GamePlayerResponse {
    pub id: i64,
    pub seat: i16,
    pub team: Team,
    pub user: PlayerUserResponse,
    pub deck_id: i64,
    pub deck_name: String,
}

/// Game as returned by the API
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct GameResponse {
    pub id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub turn_limit_seconds: i32,
    pub team_time_limit_seconds: i32,
    pub first_move_team: Team,
    pub team1_name: String,
    pub team2_name: String,
    pub current_turn_team: Team,
    pub current_turn_start: Option<DateTime<Utc>>,
    pub current_turn_elapsed_seconds: Option<i64>,
    pub is_paused: bool,
    pub pause_started_at: Option<DateTime<Utc>>,
    pub total_pause_duration_seconds: i64,
    pub winning_team: Option<Team>,
    pub is_technical_defeat: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub players: Vec<GamePlayerResponse>,
    pub turns: Vec<GameTurnModel>,
}

impl GamePlayerResponse {
    fn from_model(player: GamePlayerModel, team: Team) -> Self {
        Self {
            id: player.id,
            seat: player.seat,
            team,
            user: PlayerUserResponse {
                id: player.user_id,
                name: player.user_name,
            },
            deck_id: player.deck_id,
            deck_name: player.deck_name,
        }
    }
}

impl GameResponse {
    /// `now` feeds the derived `current_turn_elapsed_seconds`
    pub fn new(game: GameModel, now: DateTime<Utc>) -> Self {
        let elapsed = timer::current_turn_elapsed(&game, now);
        let players = game
            .players
            .into_iter()
            .enumerate()
            .map(|(index, p)| GamePlayerResponse::from_model(p, Team::for_seat(index)))
            .collect();

        Self {
            id: game.id,
            start_time: game.start_time,
            end_time: game.end_time,
            turn_limit_seconds: game.turn_limit_seconds,
            team_time_limit_seconds: game.team_time_limit_seconds,
            first_move_team: game.first_move_team,
            team1_name: game.team1_name,
            team2_name: game.team2_name,
            current_turn_team: game.current_turn_team,
            current_turn_start: game.current_turn_start,
            current_turn_elapsed_seconds: elapsed,
            is_paused: game.is_paused,
            pause_started_at: game.pause_started_at,
            total_pause_duration_seconds: game.total_pause_duration_seconds,
            winning_team: game.winning_team,
            is_technical_defeat: game.is_technical_defeat,
            created_at: game.created_at,
            updated_at: game.updated_at,
            players,
            turns: game.turns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_user_id_wins_over_flat_field() {
        let player: GamePlayerRequest =
            serde_json::from_str(r#"{"user_id": 3, "user": {"id": 5}, "deck_id": 1}"#).unwrap();
        assert_eq!(player.resolved_user_id(), Some(5));

        let player: GamePlayerRequest =
            serde_json::from_str(r#"{"user_id": 3, "user": {"id": 0}}"#).unwrap();
        assert_eq!(player.resolved_user_id(), Some(3));

        let player: GamePlayerRequest = serde_json::from_str(r#"{"deck_id": 1}"#).unwrap();
        assert_eq!(player.resolved_user_id(), None);
    }

    #[test]
    fn omitted_and_empty_turns_are_distinct() {
        let omitted: UpdateActiveGameRequest =
            serde_json::from_str(r#"{"current_turn_team": 1}"#).unwrap();
        assert!(omitted.turns.is_none());

        let empty: UpdateActiveGameRequest =
            serde_json::from_str(r#"{"current_turn_team": 1, "turns": []}"#).unwrap();
        assert_eq!(empty.turns.map(|t| t.len()), Some(0));
    }

    #[test]
    fn turn_request_ignores_client_ids() {
        let turn: TurnRequest =
            serde_json::from_str(r#"{"id": 77, "team_number": 2, "duration_sec": 40}"#).unwrap();
        assert_eq!(turn.team_number, 2);
        assert_eq!(turn.duration_sec, 40);
        assert_eq!(turn.overtime_sec, 0);
    }
}
