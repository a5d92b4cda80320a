//! Clock accounting for the active game.
//!
//! Elapsed time is never ticked by the server. It is derived on demand as
//! `now - current_turn_start`, which stays correct only because every resume
//! shifts `current_turn_start` forward by the length of the pause.

use chrono::{DateTime, Duration, Utc};

use super::models::GameModel;
use super::team::Team;

/// Records the pause anchor. Returns false (state untouched) if already paused.
pub fn pause(game: &mut GameModel, now: DateTime<Utc>) -> bool {
    if game.is_paused {
        return false;
    }
    game.is_paused = true;
    game.pause_started_at = Some(now);
    true
}

/// Closes the open pause. Returns false (state untouched) if not paused.
///
/// The pause length is added to the running total in whole seconds, while
/// the turn anchor moves by the exact interval. A pause anchor in the future
/// (clock went backwards) counts as a zero-length pause.
pub fn resume(game: &mut GameModel, now: DateTime<Utc>) -> bool {
    if !game.is_paused {
        return false;
    }

    let paused_for = game
        .pause_started_at
        .map(|started| (now - started).max(Duration::zero()))
        .unwrap_or_else(Duration::zero);

    game.total_pause_duration_seconds += paused_for.num_seconds();
    if let Some(turn_start) = game.current_turn_start {
        game.current_turn_start = Some(turn_start + paused_for);
    }
    game.is_paused = false;
    game.pause_started_at = None;
    true
}

/// Re-anchors the current turn at server time
pub fn start_turn(game: &mut GameModel, now: DateTime<Utc>) {
    game.current_turn_start = Some(now);
}

/// Hands the turn to `team`. When `turn_in_progress` the anchor is set to
/// server time, otherwise it is cleared.
pub fn set_turn(game: &mut GameModel, team: Team, turn_in_progress: bool, now: DateTime<Utc>) {
    game.current_turn_team = team;
    game.current_turn_start = turn_in_progress.then_some(now);
}

/// Seconds spent in the current turn, excluding pauses. Frozen at the pause
/// anchor while paused; `None` when no turn is running.
pub fn current_turn_elapsed(game: &GameModel, now: DateTime<Utc>) -> Option<i64> {
    let started = game.current_turn_start?;
    let reference = if game.is_paused {
        game.pause_started_at.unwrap_or(now)
    } else {
        now
    };
    Some((reference - started).num_seconds().max(0))
}
