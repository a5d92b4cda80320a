use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::team::Team;

/// Database model for games table, with its players and turn ledger loaded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameModel {
    pub id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>, // None while the game is active
    pub turn_limit_seconds: i32,
    pub team_time_limit_seconds: i32,
    pub first_move_team: Team,
    #[serde(default)]
    pub team1_name: String,
    #[serde(default)]
    pub team2_name: String,
    pub current_turn_team: Team,
    pub current_turn_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_paused: bool,
    #[serde(default)]
    pub pause_started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_pause_duration_seconds: i64,
    pub winning_team: Option<Team>,
    #[serde(default)]
    pub is_technical_defeat: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub players: Vec<GamePlayerModel>, // ordered by seat
    #[serde(default)]
    pub turns: Vec<GameTurnModel>, // insertion order
}

/// Database model for game_players table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GamePlayerModel {
    pub id: i64,
    pub seat: i16,
    pub user_id: i64,
    #[serde(default)]
    pub user_name: String, // joined from users on read
    pub deck_id: i64,
    #[serde(default)]
    pub deck_name: String, // snapshot taken when the game was created
}

/// Database model for game_turns table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameTurnModel {
    pub id: i64,
    #[serde(rename = "team_number")]
    pub team: Team,
    pub duration_sec: i32,
    #[serde(default)]
    pub overtime_sec: i32,
}

/// Values for inserting a new active game
#[derive(Debug, Clone)]
pub struct NewGame {
    pub turn_limit_seconds: i32,
    pub team_time_limit_seconds: i32,
    pub first_move_team: Team,
    pub team1_name: String,
    pub team2_name: String,
    pub players: Vec<NewGamePlayer>, // seat = position
}

#[derive(Debug, Clone)]
pub struct NewGamePlayer {
    pub user_id: i64,
    pub deck_id: i64,
    pub deck_name: String,
}

/// A turn to append to the ledger; row identity is always assigned by storage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewTurn {
    pub team: Team,
    pub duration_sec: i32,
    pub overtime_sec: i32,
}

impl GameModel {
    pub fn is_active(&self) -> bool {
        self.end_time.is_none()
    }

    /// Builds the row for a freshly started game; the first-move team has the turn
    pub fn from_new(id: i64, game: &NewGame, now: DateTime<Utc>) -> Self {
        Self {
            id,
            start_time: now,
            end_time: None,
            turn_limit_seconds: game.turn_limit_seconds,
            team_time_limit_seconds: game.team_time_limit_seconds,
            first_move_team: game.first_move_team,
            team1_name: game.team1_name.clone(),
            team2_name: game.team2_name.clone(),
            current_turn_team: game.first_move_team,
            current_turn_start: None,
            is_paused: false,
            pause_started_at: None,
            total_pause_duration_seconds: 0,
            winning_team: None,
            is_technical_defeat: false,
            created_at: now,
            updated_at: now,
            players: Vec::new(),
            turns: Vec::new(),
        }
    }

    /// Team of the player sitting at `seat`
    pub fn team_of_seat(&self, seat: i16) -> Team {
        Team::for_seat(usize::try_from(seat).unwrap_or(0))
    }
}

impl GameTurnModel {
    pub fn from_new(id: i64, turn: &NewTurn) -> Self {
        Self {
            id,
            team: turn.team,
            duration_sec: turn.duration_sec,
            overtime_sec: turn.overtime_sec,
        }
    }
}
