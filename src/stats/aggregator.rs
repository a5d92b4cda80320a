//! Win-rate statistics, recomputed from the finished games on every call.
//!
//! Only games with a winning team count. A player's team comes from their
//! position in the game's player list (see `Team::for_seat`).

use std::collections::BTreeMap;

use super::models::{percent, DeckStats, PlayerStats};
use crate::game::models::GameModel;
use crate::game::Team;

#[derive(Debug, Default)]
struct DeckRecord {
    name: String,
    games: u32,
    wins: u32,
}

#[derive(Debug, Default)]
struct PlayerTally {
    name: String,
    games: u32,
    wins: u32,
    first_move_games: u32,
    first_move_wins: u32,
    turn_durations: Vec<i64>,
    decks: BTreeMap<i64, DeckRecord>,
}

impl PlayerTally {
    /// Highest win ratio; ties keep the lowest deck id
    fn best_deck(&self) -> Option<(i64, &DeckRecord)> {
        let mut best: Option<(i64, &DeckRecord)> = None;
        for (&deck_id, record) in &self.decks {
            if record.games == 0 {
                continue;
            }
            let better = match best {
                None => true,
                // wins/games > best_wins/best_games, without floats
                Some((_, b)) => {
                    u64::from(record.wins) * u64::from(b.games)
                        > u64::from(b.wins) * u64::from(record.games)
                }
            };
            if better {
                best = Some((deck_id, record));
            }
        }
        best
    }

    fn into_stats(self, player_id: i64) -> PlayerStats {
        let (best_deck_id, best_deck_name, best_deck_wins, best_deck_games) =
            match self.best_deck() {
                Some((id, record)) => (Some(id), record.name.clone(), record.wins, record.games),
                None => (None, String::new(), 0, 0),
            };

        let turn_count = self.turn_durations.len() as i64;
        let avg_turn_duration_sec = if turn_count == 0 {
            0
        } else {
            self.turn_durations.iter().sum::<i64>() / turn_count
        };

        PlayerStats {
            player_id,
            player_name: self.name,
            games_count: self.games,
            wins_count: self.wins,
            win_percent: percent(self.wins, self.games),
            first_move_games: self.first_move_games,
            first_move_wins: self.first_move_wins,
            first_move_win_percent: percent(self.first_move_wins, self.first_move_games),
            avg_turn_duration_sec,
            max_turn_duration_sec: self.turn_durations.iter().copied().max().unwrap_or(0),
            best_deck_id,
            best_deck_name,
            best_deck_wins,
            best_deck_games,
        }
    }
}

/// Per-player aggregates, one row per player seen in a decided game, by player id
pub fn player_stats(games: &[GameModel]) -> Vec<PlayerStats> {
    let mut tallies: BTreeMap<i64, PlayerTally> = BTreeMap::new();

    for game in games.iter().filter(|g| !g.is_active()) {
        let Some(winning_team) = game.winning_team else {
            continue;
        };

        for (index, player) in game.players.iter().enumerate() {
            let team = Team::for_seat(index);
            let won = team == winning_team;
            let tally = tallies.entry(player.user_id).or_default();

            tally.name = player.user_name.clone();
            tally.games += 1;
            tally.wins += u32::from(won);
            if team == game.first_move_team {
                tally.first_move_games += 1;
                tally.first_move_wins += u32::from(won);
            }

            let deck = tally.decks.entry(player.deck_id).or_default();
            deck.name = player.deck_name.clone();
            deck.games += 1;
            deck.wins += u32::from(won);

            tally.turn_durations.extend(
                game.turns
                    .iter()
                    .filter(|t| t.team == team)
                    .map(|t| i64::from(t.duration_sec)),
            );
        }
    }

    tallies
        .into_iter()
        .map(|(player_id, tally)| tally.into_stats(player_id))
        .collect()
}

/// Per-deck aggregates keyed by deck id, by deck id. The name is the first
/// snapshot seen for that id.
pub fn deck_stats(games: &[GameModel]) -> Vec<DeckStats> {
    let mut decks: BTreeMap<i64, DeckRecord> = BTreeMap::new();

    for game in games.iter().filter(|g| !g.is_active()) {
        let Some(winning_team) = game.winning_team else {
            continue;
        };
        for (index, player) in game.players.iter().enumerate() {
            let record = decks.entry(player.deck_id).or_insert_with(|| DeckRecord {
                name: player.deck_name.clone(),
                ..DeckRecord::default()
            });
            record.games += 1;
            record.wins += u32::from(Team::for_seat(index) == winning_team);
        }
    }

    decks
        .into_iter()
        .map(|(deck_id, record)| DeckStats {
            deck_id,
            deck_name: record.name,
            games_count: record.games,
            wins_count: record.wins,
            win_percent: percent(record.wins, record.games),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::models::{GamePlayerModel, GameTurnModel, NewGame};
    use chrono::{Duration, TimeZone, Utc};

    /// `seats` are (user_id, deck_id, deck_name); `turns` are (team, duration)
    fn finished(
        id: i64,
        first_move: Team,
        winner: Option<Team>,
        seats: &[(i64, i64, &str)],
        turns: &[(Team, i32)],
    ) -> GameModel {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0).unwrap();
        let mut game = GameModel::from_new(
            id,
            &NewGame {
                turn_limit_seconds: 0,
                team_time_limit_seconds: 0,
                first_move_team: first_move,
                team1_name: String::new(),
                team2_name: String::new(),
                players: Vec::new(),
            },
            start,
        );
        game.end_time = Some(start + Duration::minutes(40));
        game.winning_team = winner;
        game.players = seats
            .iter()
            .enumerate()
            .map(|(seat, &(user_id, deck_id, deck_name))| GamePlayerModel {
                id: id * 10 + seat as i64,
                seat: seat as i16,
                user_id,
                user_name: format!("user-{}", user_id),
                deck_id,
                deck_name: deck_name.to_string(),
            })
            .collect();
        game.turns = turns
            .iter()
            .enumerate()
            .map(|(i, &(team, duration_sec))| GameTurnModel {
                id: id * 100 + i as i64,
                team,
                duration_sec,
                overtime_sec: 0,
            })
            .collect();
        game
    }

    fn four_seats() -> Vec<(i64, i64, &'static str)> {
        vec![(1, 11, "Elves"), (2, 12, "Burn"), (3, 13, "Control"), (4, 14, "Tron")]
    }

    #[test]
    fn test_empty_history_yields_no_rows() {
        assert!(player_stats(&[]).is_empty());
        assert!(deck_stats(&[]).is_empty());
    }

    #[test]
    fn test_team_turns_only_count_for_own_team() {
        let game = finished(
            1,
            Team::One,
            Some(Team::One),
            &four_seats(),
            &[(Team::One, 30), (Team::Two, 45), (Team::One, 20)],
        );
        let stats = player_stats(&[game]);
        assert_eq!(stats.len(), 4);

        for row in &stats[..2] {
            assert_eq!(row.games_count, 1);
            assert_eq!(row.wins_count, 1);
            assert_eq!(row.win_percent, 100.0);
            assert_eq!(row.avg_turn_duration_sec, 25);
            assert_eq!(row.max_turn_duration_sec, 30);
            assert_eq!(row.first_move_games, 1);
            assert_eq!(row.first_move_wins, 1);
        }
        for row in &stats[2..] {
            assert_eq!(row.wins_count, 0);
            assert_eq!(row.win_percent, 0.0);
            assert_eq!(row.avg_turn_duration_sec, 45);
            assert_eq!(row.first_move_games, 0);
            assert_eq!(row.first_move_win_percent, 0.0);
        }
    }

    #[test]
    fn test_undecided_and_active_games_are_skipped() {
        let undecided = finished(1, Team::One, None, &four_seats(), &[(Team::One, 10)]);
        let mut active = finished(2, Team::One, Some(Team::One), &four_seats(), &[]);
        active.end_time = None;

        assert!(player_stats(&[undecided.clone(), active.clone()]).is_empty());
        assert!(deck_stats(&[undecided, active]).is_empty());
    }

    #[test]
    fn test_three_player_game_seat_two_is_alone() {
        let seats = [(1, 11, "Elves"), (2, 12, "Burn"), (3, 13, "Control")];
        let game = finished(1, Team::Two, Some(Team::Two), &seats, &[(Team::Two, 50)]);
        let stats = player_stats(&[game]);

        let solo = stats.iter().find(|s| s.player_id == 3).unwrap();
        assert_eq!(solo.wins_count, 1);
        assert_eq!(solo.first_move_wins, 1);
        assert_eq!(solo.avg_turn_duration_sec, 50);
        assert!(stats.iter().filter(|s| s.player_id != 3).all(|s| s.wins_count == 0));
    }

    #[test]
    fn test_average_turn_is_truncated() {
        let game = finished(
            1,
            Team::One,
            Some(Team::Two),
            &four_seats(),
            &[(Team::One, 10), (Team::One, 11)],
        );
        let stats = player_stats(&[game]);
        assert_eq!(stats[0].avg_turn_duration_sec, 10);
        assert_eq!(stats[0].max_turn_duration_sec, 11);
        assert_eq!(stats[3].avg_turn_duration_sec, 0);
        assert_eq!(stats[3].max_turn_duration_sec, 0);
    }

    #[test]
    fn test_best_deck_ratio_and_lowest_id_tie_break() {
        // player 1: deck 20 wins 1/1, deck 10 wins 1/1, deck 30 wins 1/2
        let games = vec![
            finished(1, Team::One, Some(Team::One), &[(1, 20, "B"), (2, 0, ""), (3, 0, ""), (4, 0, "")], &[]),
            finished(2, Team::One, Some(Team::One), &[(1, 10, "A"), (2, 0, ""), (3, 0, ""), (4, 0, "")], &[]),
            finished(3, Team::One, Some(Team::One), &[(1, 30, "C"), (2, 0, ""), (3, 0, ""), (4, 0, "")], &[]),
            finished(4, Team::One, Some(Team::Two), &[(1, 30, "C"), (2, 0, ""), (3, 0, ""), (4, 0, "")], &[]),
        ];
        let stats = player_stats(&games);
        let p1 = stats.iter().find(|s| s.player_id == 1).unwrap();

        assert_eq!(p1.best_deck_id, Some(10));
        assert_eq!(p1.best_deck_name, "A");
        assert_eq!((p1.best_deck_wins, p1.best_deck_games), (1, 1));
        assert_eq!(p1.games_count, 4);
        assert_eq!(p1.win_percent, 75.0);
    }

    #[test]
    fn test_best_deck_exists_without_wins() {
        let game = finished(1, Team::One, Some(Team::One), &four_seats(), &[]);
        let stats = player_stats(&[game]);
        let loser = stats.iter().find(|s| s.player_id == 4).unwrap();

        assert_eq!(loser.best_deck_id, Some(14));
        assert_eq!(loser.best_deck_name, "Tron");
        assert_eq!((loser.best_deck_wins, loser.best_deck_games), (0, 1));
    }

    #[test]
    fn test_player_best_deck_uses_latest_name_snapshot() {
        let games = vec![
            finished(1, Team::One, Some(Team::One), &[(1, 10, "Old"), (2, 0, "")], &[]),
            finished(2, Team::One, Some(Team::One), &[(1, 10, "New"), (2, 0, "")], &[]),
        ];
        let stats = player_stats(&games);
        assert_eq!(stats[0].best_deck_name, "New");

        let decks = deck_stats(&games);
        let deck = decks.iter().find(|d| d.deck_id == 10).unwrap();
        assert_eq!(deck.deck_name, "Old");
    }

    #[test]
    fn test_deck_stats_tally_per_seat() {
        let games = vec![
            finished(1, Team::One, Some(Team::One), &[(1, 7, "Elves"), (2, 7, "Elves"), (3, 8, "Burn"), (4, 9, "Tron")], &[]),
            finished(2, Team::Two, Some(Team::Two), &[(1, 7, "Elves"), (2, 8, "Burn"), (3, 9, "Tron"), (4, 9, "Tron")], &[]),
        ];
        let decks = deck_stats(&games);
        let ids: Vec<i64> = decks.iter().map(|d| d.deck_id).collect();
        assert_eq!(ids, vec![7, 8, 9]);

        assert_eq!((decks[0].games_count, decks[0].wins_count), (3, 2));
        assert_eq!((decks[1].games_count, decks[1].wins_count), (2, 0));
        assert_eq!((decks[2].games_count, decks[2].wins_count), (3, 2));
        assert_eq!(decks[1].win_percent, 0.0);
        assert!((decks[0].win_percent - 66.666).abs() < 0.01);
    }
}
