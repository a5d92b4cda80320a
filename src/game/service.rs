use chrono::DateTime;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::{
    models::{GameModel, NewGame, NewGamePlayer, NewTurn},
    repository::GameRepository,
    team::Team,
    timer,
    types::{
        CreateGameRequest, FinishGameRequest, GamePlayerRequest, GameResponse, TurnRequest,
        UpdateActiveGameRequest,
    },
};
use crate::clock::Clock;
use crate::deck::repository::DeckRepository;
use crate::shared::AppError;
use crate::user::repository::UserRepository;

const MIN_PLAYERS: usize = 2;
const MAX_PLAYERS: usize = 4;
const TEAM_NAME_MAX_CHARS: usize = 100;

/// Service for the game lifecycle: creation, clock actions, ledger updates, finishing
pub struct GameService {
    games: Arc<dyn GameRepository + Send + Sync>,
    users: Arc<dyn UserRepository + Send + Sync>,
    decks: Arc<dyn DeckRepository + Send + Sync>,
    clock: Arc<dyn Clock>,
}

fn team_name(raw: Option<&str>) -> Result<String, AppError> {
    let name = raw.unwrap_or_default().trim();
    if name.chars().count() > TEAM_NAME_MAX_CHARS {
        return Err(AppError::InvalidInput(format!(
            "Team name must be at most {} characters",
            TEAM_NAME_MAX_CHARS
        )));
    }
    Ok(name.to_string())
}

fn non_negative(value: i32, field: &str) -> Result<i32, AppError> {
    if value < 0 {
        return Err(AppError::InvalidInput(format!(
            "{} must not be negative",
            field
        )));
    }
    Ok(value)
}

/// Validates a client ledger into storage-ready turns
pub fn parse_turns(turns: &[TurnRequest]) -> Result<Vec<NewTurn>, AppError> {
    turns
        .iter()
        .map(|t| {
            Ok(NewTurn {
                team: Team::from_number(t.team_number, "team_number")?,
                duration_sec: non_negative(t.duration_sec, "duration_sec")?,
                overtime_sec: non_negative(t.overtime_sec, "overtime_sec")?,
            })
        })
        .collect()
}

/// A present timestamp means "a turn is running". Only its format is checked.
fn turn_in_progress(current_turn_start: Option<&str>) -> Result<bool, AppError> {
    match current_turn_start.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(false),
        Some(raw) => DateTime::parse_from_rfc3339(raw).map(|_| true).map_err(|e| {
            AppError::InvalidInput(format!("current_turn_start is not RFC 3339: {}", e))
        }),
    }
}

impl GameService {
    pub fn new(
        games: Arc<dyn GameRepository + Send + Sync>,
        users: Arc<dyn UserRepository + Send + Sync>,
        decks: Arc<dyn DeckRepository + Send + Sync>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            games,
            users,
            decks,
            clock,
        }
    }

    fn respond(&self, game: GameModel) -> GameResponse {
        GameResponse::new(game, self.clock.now())
    }

    async fn load_active(&self) -> Result<GameModel, AppError> {
        self.games
            .find_active_game()
            .await?
            .ok_or_else(|| AppError::NotFound("No active game".to_string()))
    }

    pub async fn list_games(&self) -> Result<Vec<GameResponse>, AppError> {
        let games = self.games.list_games().await?;
        debug!(game_count = games.len(), "Games listed");
        let now = self.clock.now();
        Ok(games.into_iter().map(|g| GameResponse::new(g, now)).collect())
    }

    pub async fn get_game(&self, game_id: i64) -> Result<GameResponse, AppError> {
        let game = self
            .games
            .get_game(game_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Game not found".to_string()))?;
        Ok(self.respond(game))
    }

    pub async fn active_game(&self) -> Result<GameResponse, AppError> {
        let game = self.load_active().await?;
        Ok(self.respond(game))
    }

    /// Starts a new active game. The first-move team holds the first turn.
    #[instrument(skip(self, request), fields(players = request.players.len()))]
    pub async fn create_game(&self, request: CreateGameRequest) -> Result<GameResponse, AppError> {
        let first_move_team = Team::from_number(request.first_move_team, "first_move_team")?;
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&request.players.len()) {
            return Err(AppError::InvalidInput(format!(
                "A game needs {} to {} players",
                MIN_PLAYERS, MAX_PLAYERS
            )));
        }

        let mut seen = HashSet::new();
        let mut players = Vec::with_capacity(request.players.len());
        for player in &request.players {
            let resolved = self.resolve_player(player).await?;
            if !seen.insert(resolved.user_id) {
                return Err(AppError::InvalidInput(format!(
                    "User {} is seated twice",
                    resolved.user_id
                )));
            }
            players.push(resolved);
        }

        let new_game = NewGame {
            turn_limit_seconds: non_negative(request.turn_limit_seconds, "turn_limit_seconds")?,
            team_time_limit_seconds: non_negative(
                request.team_time_limit_seconds,
                "team_time_limit_seconds",
            )?,
            first_move_team,
            team1_name: team_name(request.team1_name.as_deref())?,
            team2_name: team_name(request.team2_name.as_deref())?,
            players,
        };

        let game = self
            .games
            .create_active_game(&new_game, self.clock.now())
            .await?;

        info!(game_id = game.id, first_move_team = %first_move_team, "Game started");
        Ok(self.respond(game))
    }

    /// Checks the user exists and snapshots the deck name. The stored deck
    /// name wins over the client's when the deck still exists.
    async fn resolve_player(&self, player: &GamePlayerRequest) -> Result<NewGamePlayer, AppError> {
        let user_id = player.resolved_user_id().ok_or_else(|| {
            AppError::InvalidInput("Every player needs a user_id or user.id".to_string())
        })?;
        if self.users.get_user(user_id).await?.is_none() {
            return Err(AppError::InvalidInput(format!(
                "Player refers to unknown user {}",
                user_id
            )));
        }

        let deck_id = player.deck_id.unwrap_or(0);
        let stored_name = if deck_id > 0 {
            self.decks.get_deck(deck_id).await?.map(|d| d.name)
        } else {
            None
        };
        let deck_name = stored_name.unwrap_or_else(|| {
            player
                .deck_name
                .as_deref()
                .unwrap_or_default()
                .trim()
                .to_string()
        });

        Ok(NewGamePlayer {
            user_id,
            deck_id,
            deck_name,
        })
    }

    /// Pauses the active game; pausing twice returns the game unchanged
    #[instrument(skip(self))]
    pub async fn pause(&self) -> Result<GameResponse, AppError> {
        let mut game = self.load_active().await?;
        let now = self.clock.now();
        if timer::pause(&mut game, now) {
            game.updated_at = now;
            self.games.save_clock(&game).await?;
            info!(game_id = game.id, "Game paused");
        }
        Ok(self.respond(game))
    }

    /// Resumes the active game, excluding the pause from the running turn
    #[instrument(skip(self))]
    pub async fn resume(&self) -> Result<GameResponse, AppError> {
        let mut game = self.load_active().await?;
        let now = self.clock.now();
        if timer::resume(&mut game, now) {
            game.updated_at = now;
            self.games.save_clock(&game).await?;
            info!(
                game_id = game.id,
                total_pause_seconds = game.total_pause_duration_seconds,
                "Game resumed"
            );
        }
        Ok(self.respond(game))
    }

    /// Anchors the current turn at server time
    #[instrument(skip(self))]
    pub async fn start_turn(&self) -> Result<GameResponse, AppError> {
        let mut game = self.load_active().await?;
        let now = self.clock.now();
        timer::start_turn(&mut game, now);
        game.updated_at = now;
        self.games.save_clock(&game).await?;
        Ok(self.respond(game))
    }

    /// Sets the turn owner and anchor and, when given, replaces the ledger.
    /// Everything is validated before anything is written.
    #[instrument(skip(self, request), fields(team = request.current_turn_team))]
    pub async fn update_active(
        &self,
        request: UpdateActiveGameRequest,
    ) -> Result<GameResponse, AppError> {
        let team = Team::from_number(request.current_turn_team, "current_turn_team")?;
        let in_progress = turn_in_progress(request.current_turn_start.as_deref())?;
        let turns = request.turns.as_deref().map(parse_turns).transpose()?;

        let mut game = self.load_active().await?;
        let now = self.clock.now();
        timer::set_turn(&mut game, team, in_progress, now);
        game.updated_at = now;

        let updated = self.games.update_turn_state(&game, turns.as_deref()).await?;
        debug!(
            game_id = updated.id,
            turn_count = updated.turns.len(),
            "Active game updated"
        );
        Ok(self.respond(updated))
    }

    /// Finishes the active game. An open pause is closed first so the total
    /// pause time is complete.
    #[instrument(skip(self, request), fields(winning_team = request.winning_team))]
    pub async fn finish(&self, request: FinishGameRequest) -> Result<GameResponse, AppError> {
        let winning_team = Team::from_number(request.winning_team, "winning_team")?;

        let mut game = self.load_active().await?;
        let now = self.clock.now();
        timer::resume(&mut game, now);
        game.end_time = Some(now);
        game.winning_team = Some(winning_team);
        game.is_technical_defeat = request.is_technical_defeat;
        game.updated_at = now;
        self.games.finish_game(&game).await?;

        info!(
            game_id = game.id,
            winning_team = %winning_team,
            technical = game.is_technical_defeat,
            "Game finished"
        );
        Ok(self.respond(game))
    }

    /// Deletes every game, player seat and turn
    #[instrument(skip(self))]
    pub async fn clear_games(&self) -> Result<u64, AppError> {
        let deleted = self.games.clear_games().await?;
        info!(deleted, "All games cleared");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::db::Repositories;
    use crate::game::types::{GamePlayerRequest, PlayerUserRef};
    use crate::user::models::NewUser;
    use chrono::{Duration, TimeZone, Utc};
    use rstest::rstest;

    struct Fixture {
        service: GameService,
        repos: Repositories,
        clock: Arc<ManualClock>,
        user_ids: Vec<i64>,
    }

    async fn fixture() -> Fixture {
        let repos = Repositories::in_memory();
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 19, 0, 0).unwrap(),
        ));
        let mut user_ids = Vec::new();
        for name in ["ann", "ben", "cat", "dan"] {
            let user = repos
                .users
                .create_user(
                    &NewUser {
                        name: name.to_string(),
                        password_hash: None,
                        is_admin: false,
                    },
                    clock.now(),
                )
                .await
                .unwrap();
            user_ids.push(user.id);
        }
        let service = GameService::new(
            repos.games.clone(),
            repos.users.clone(),
            repos.decks.clone(),
            clock.clone(),
        );
        Fixture {
            service,
            repos,
            clock,
            user_ids,
        }
    }

    fn player(user_id: i64, deck_id: i64, deck_name: &str) -> GamePlayerRequest {
        GamePlayerRequest {
            user_id: Some(user_id),
            user: None,
            deck_id: Some(deck_id),
            deck_name: Some(deck_name.to_string()),
        }
    }

    fn create_request(user_ids: &[i64]) -> CreateGameRequest {
        CreateGameRequest {
            turn_limit_seconds: 120,
            team_time_limit_seconds: 0,
            first_move_team: 1,
            team1_name: Some("Red".to_string()),
            team2_name: None,
            players: user_ids
                .iter()
                .map(|&id| player(id, 0, "Homebrew"))
                .collect(),
        }
    }

    fn update(team: i64, start: Option<&str>, turns: Option<Vec<(i64, i32)>>) -> UpdateActiveGameRequest {
        UpdateActiveGameRequest {
            current_turn_team: team,
            current_turn_start: start.map(str::to_string),
            turns: turns.map(|ts| {
                ts.into_iter()
                    .map(|(team_number, duration_sec)| TurnRequest {
                        team_number,
                        duration_sec,
                        overtime_sec: 0,
                    })
                    .collect()
            }),
        }
    }

    #[rstest]
    #[case(0, 4)]
    #[case(3, 4)]
    #[case(1, 1)]
    #[case(1, 5)]
    #[tokio::test]
    async fn test_create_rejects_invalid_setup(#[case] first_move_team: i64, #[case] players: usize) {
        let f = fixture().await;
        let mut ids = f.user_ids.clone();
        ids.push(f.user_ids[0]);
        let mut request = create_request(&ids[..players]);
        request.first_move_team = first_move_team;

        let result = f.service.create_game(request).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_user_and_missing_id() {
        let f = fixture().await;
        let result = f
            .service
            .create_game(create_request(&[f.user_ids[0], 404]))
            .await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));

        let mut request = create_request(&f.user_ids[..2]);
        request.players[1].user_id = None;
        let result = f.service.create_game(request).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_create_snapshots_stored_deck_name() {
        let f = fixture().await;
        let deck = f.repos.decks.create_deck("Burn", f.clock.now()).await.unwrap();
        let mut request = create_request(&f.user_ids[..2]);
        request.players[0] = GamePlayerRequest {
            user_id: None,
            user: Some(PlayerUserRef { id: f.user_ids[0] }),
            deck_id: Some(deck.id),
            deck_name: Some("stale name".to_string()),
        };

        let game = f.service.create_game(request).await.unwrap();
        assert_eq!(game.players[0].deck_name, "Burn");
        assert_eq!(game.players[1].deck_name, "Homebrew");
        assert_eq!(game.current_turn_team, Team::One);
    }

    #[tokio::test]
    async fn test_only_one_active_game_until_finished() {
        let f = fixture().await;
        f.service.create_game(create_request(&f.user_ids)).await.unwrap();

        let second = f.service.create_game(create_request(&f.user_ids)).await;
        assert!(matches!(second, Err(AppError::Conflict(_))));

        f.service
            .finish(FinishGameRequest {
                winning_team: 2,
                is_technical_defeat: false,
            })
            .await
            .unwrap();
        f.service.create_game(create_request(&f.user_ids)).await.unwrap();
    }

    #[tokio::test]
    async fn test_actions_without_active_game_are_not_found() {
        let f = fixture().await;
        assert!(matches!(f.service.pause().await, Err(AppError::NotFound(_))));
        assert!(matches!(f.service.resume().await, Err(AppError::NotFound(_))));
        assert!(matches!(f.service.start_turn().await, Err(AppError::NotFound(_))));
        assert!(matches!(
            f.service.update_active(update(1, None, None)).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_pause_resume_shifts_turn_anchor() {
        let f = fixture().await;
        f.service.create_game(create_request(&f.user_ids)).await.unwrap();

        f.service.start_turn().await.unwrap();
        let turn_started = f.clock.now();
        f.clock.advance(Duration::seconds(5));
        f.service.pause().await.unwrap();
        f.clock.advance(Duration::seconds(10));

        let resumed = f.service.resume().await.unwrap();
        assert_eq!(resumed.total_pause_duration_seconds, 10);
        assert_eq!(
            resumed.current_turn_start,
            Some(turn_started + Duration::seconds(10))
        );
        assert_eq!(resumed.current_turn_elapsed_seconds, Some(5));

        let stored = f.service.active_game().await.unwrap();
        assert_eq!(stored.current_turn_start, resumed.current_turn_start);
        assert!(!stored.is_paused);
    }

    #[tokio::test]
    async fn test_update_uses_server_time_and_validates_first() {
        let f = fixture().await;
        f.service.create_game(create_request(&f.user_ids)).await.unwrap();

        let bad_turn = f
            .service
            .update_active(update(2, None, Some(vec![(1, 10), (3, 10)])))
            .await;
        assert!(matches!(bad_turn, Err(AppError::InvalidInput(_))));
        let bad_time = f
            .service
            .update_active(update(2, Some("yesterday"), None))
            .await;
        assert!(matches!(bad_time, Err(AppError::InvalidInput(_))));
        assert_eq!(f.service.active_game().await.unwrap().current_turn_team, Team::One);

        let updated = f
            .service
            .update_active(update(
                2,
                Some("1999-01-01T00:00:00Z"),
                Some(vec![(1, 30), (2, 45)]),
            ))
            .await
            .unwrap();
        assert_eq!(updated.current_turn_team, Team::Two);
        assert_eq!(updated.current_turn_start, Some(f.clock.now()));
        assert_eq!(updated.turns.len(), 2);

        let cleared = f.service.update_active(update(1, None, None)).await.unwrap();
        assert_eq!(cleared.current_turn_start, None);
        assert_eq!(cleared.turns.len(), 2);
    }

    #[tokio::test]
    async fn test_finish_closes_open_pause() {
        let f = fixture().await;
        f.service.create_game(create_request(&f.user_ids)).await.unwrap();
        f.service.pause().await.unwrap();
        f.clock.advance(Duration::seconds(8));

        let finished = f
            .service
            .finish(FinishGameRequest {
                winning_team: 1,
                is_technical_defeat: true,
            })
            .await
            .unwrap();
        assert_eq!(finished.end_time, Some(f.clock.now()));
        assert_eq!(finished.winning_team, Some(Team::One));
        assert!(finished.is_technical_defeat);
        assert!(!finished.is_paused);
        assert_eq!(finished.total_pause_duration_seconds, 8);

        let bad = f
            .service
            .finish(FinishGameRequest {
                winning_team: 0,
                is_technical_defeat: false,
            })
            .await;
        assert!(matches!(bad, Err(AppError::InvalidInput(_))));
    }
}
