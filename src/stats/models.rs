use serde::{Deserialize, Serialize};

/// Aggregate over every decided game a player sat in
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub player_id: i64,
    pub player_name: String,
    pub games_count: u32,
    pub wins_count: u32,
    pub win_percent: f64,
    pub first_move_games: u32,
    pub first_move_wins: u32,
    pub first_move_win_percent: f64,
    /// Integer-truncated mean over the turns of the player's team
    pub avg_turn_duration_sec: i64,
    pub max_turn_duration_sec: i64,
    pub best_deck_id: Option<i64>,
    pub best_deck_name: String,
    pub best_deck_wins: u32,
    pub best_deck_games: u32,
}

/// Aggregate over every seat that played a deck
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeckStats {
    pub deck_id: i64,
    pub deck_name: String,
    pub games_count: u32,
    pub wins_count: u32,
    pub win_percent: f64,
}

/// wins / games * 100, or 0 when there are no games
pub fn percent(wins: u32, games: u32) -> f64 {
    if games == 0 {
        0.0
    } else {
        f64::from(wins) / f64::from(games) * 100.0
    }
}
