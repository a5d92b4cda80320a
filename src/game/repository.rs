use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgConnection, PgPool, Row};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, instrument, warn};

use super::models::{GameModel, GamePlayerModel, GameTurnModel, NewGame, NewTurn};
use super::team::Team;
use crate::db::{is_foreign_key_violation, is_unique_violation, storage_error, MemoryDb, Sequences};
use crate::shared::AppError;
use crate::user::models::UserModel;

/// Trait for game repository operations
#[async_trait]
pub trait GameRepository {
    /// Inserts a new active game with its players. Fails with `Conflict`
    /// while another game is active and with `InvalidInput` when a player
    /// refers to a missing user.
    async fn create_active_game(
        &self,
        game: &NewGame,
        now: DateTime<Utc>,
    ) -> Result<GameModel, AppError>;

    async fn get_game(&self, game_id: i64) -> Result<Option<GameModel>, AppError>;
    async fn find_active_game(&self) -> Result<Option<GameModel>, AppError>;

    /// Every game, most recently updated first
    async fn list_games(&self) -> Result<Vec<GameModel>, AppError>;
    /// Games with an end time, by id
    async fn list_finished_games(&self) -> Result<Vec<GameModel>, AppError>;

    /// Persists the turn anchor and pause fields of an active game
    async fn save_clock(&self, game: &GameModel) -> Result<(), AppError>;

    /// Replaces the whole turn ledger of an active game atomically. Input ids
    /// are never reused; storage assigns fresh ones. A finished game yields
    /// `Conflict`.
    async fn replace_turns(
        &self,
        game_id: i64,
        turns: &[NewTurn],
    ) -> Result<Vec<GameTurnModel>, AppError>;

    /// Persists the turn owner and turn anchor plus an optional
    /// `replace_turns`, in one transaction. Pause fields are left alone so a
    /// concurrent pause or resume survives.
    async fn update_turn_state(
        &self,
        game: &GameModel,
        turns: Option<&[NewTurn]>,
    ) -> Result<GameModel, AppError>;

    /// Persists end time, result and final clock fields of the active game
    async fn finish_game(&self, game: &GameModel) -> Result<(), AppError>;

    /// Deletes every game with its players and turns; returns the game count
    async fn clear_games(&self) -> Result<u64, AppError>;

    /// Round-trips the storage layer
    async fn ping(&self) -> Result<(), AppError>;
}

fn no_active_game() -> AppError {
    AppError::NotFound("No active game".to_string())
}

fn active_game_exists() -> AppError {
    AppError::Conflict("An active game already exists".to_string())
}

fn game_finished() -> AppError {
    AppError::Conflict("Game is finished".to_string())
}

/// In-memory implementation of GameRepository for development and testing
pub struct InMemoryGameRepository {
    db: MemoryDb,
}

impl Default for InMemoryGameRepository {
    fn default() -> Self {
        Self::new(MemoryDb::new())
    }
}

impl InMemoryGameRepository {
    pub fn new(db: MemoryDb) -> Self {
        Self { db }
    }
}

/// Resolves player user names from the users table
fn hydrate(mut game: GameModel, users: &BTreeMap<i64, UserModel>) -> GameModel {
    for player in &mut game.players {
        player.user_name = users
            .get(&player.user_id)
            .map(|u| u.name.clone())
            .unwrap_or_default();
    }
    game
}

fn assign_turn_ids(sequences: &mut Sequences, turns: &[NewTurn]) -> Vec<GameTurnModel> {
    turns
        .iter()
        .map(|t| GameTurnModel::from_new(Sequences::next(&mut sequences.game_turns), t))
        .collect()
}

fn copy_clock(target: &mut GameModel, source: &GameModel) {
    target.current_turn_start = source.current_turn_start;
    target.is_paused = source.is_paused;
    target.pause_started_at = source.pause_started_at;
    target.total_pause_duration_seconds = source.total_pause_duration_seconds;
    target.updated_at = source.updated_at;
}

fn copy_turn_owner(target: &mut GameModel, source: &GameModel) {
    target.current_turn_team = source.current_turn_team;
    target.current_turn_start = source.current_turn_start;
    target.updated_at = source.updated_at;
}

#[async_trait]
impl GameRepository for InMemoryGameRepository {
    #[instrument(skip(self, game), fields(players = game.players.len()))]
    async fn create_active_game(
        &self,
        game: &NewGame,
        now: DateTime<Utc>,
    ) -> Result<GameModel, AppError> {
        let mut guard = self.db.write().await;
        let tables = &mut *guard;

        if tables.data.games.values().any(GameModel::is_active) {
            warn!("Active game already exists in memory");
            return Err(active_game_exists());
        }
        if let Some(missing) = game
            .players
            .iter()
            .find(|p| !tables.data.users.contains_key(&p.user_id))
        {
            return Err(AppError::InvalidInput(format!(
                "Player refers to unknown user {}",
                missing.user_id
            )));
        }

        let id = Sequences::next(&mut tables.sequences.games);
        let mut model = GameModel::from_new(id, game, now);
        for (seat, player) in game.players.iter().enumerate() {
            model.players.push(GamePlayerModel {
                id: Sequences::next(&mut tables.sequences.game_players),
                seat: seat as i16,
                user_id: player.user_id,
                user_name: String::new(),
                deck_id: player.deck_id,
                deck_name: player.deck_name.clone(),
            });
        }
        tables.data.games.insert(id, model.clone());

        debug!(game_id = id, "Game created in memory");
        Ok(hydrate(model, &tables.data.users))
    }

    async fn get_game(&self, game_id: i64) -> Result<Option<GameModel>, AppError> {
        let tables = self.db.read().await;
        Ok(tables
            .data
            .games
            .get(&game_id)
            .cloned()
            .map(|g| hydrate(g, &tables.data.users)))
    }

    async fn find_active_game(&self) -> Result<Option<GameModel>, AppError> {
        let tables = self.db.read().await;
        Ok(tables
            .data
            .games
            .values()
            .find(|g| g.is_active())
            .cloned()
            .map(|g| hydrate(g, &tables.data.users)))
    }

    async fn list_games(&self) -> Result<Vec<GameModel>, AppError> {
        let tables = self.db.read().await;
        let mut games: Vec<GameModel> = tables
            .data
            .games
            .values()
            .cloned()
            .map(|g| hydrate(g, &tables.data.users))
            .collect();
        games.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        Ok(games)
    }

    async fn list_finished_games(&self) -> Result<Vec<GameModel>, AppError> {
        let tables = self.db.read().await;
        Ok(tables
            .data
            .games
            .values()
            .filter(|g| !g.is_active())
            .cloned()
            .map(|g| hydrate(g, &tables.data.users))
            .collect())
    }

    #[instrument(skip(self, game), fields(game_id = game.id))]
    async fn save_clock(&self, game: &GameModel) -> Result<(), AppError> {
        let mut tables = self.db.write().await;
        let stored = tables
            .data
            .games
            .get_mut(&game.id)
            .filter(|g| g.is_active())
            .ok_or_else(no_active_game)?;
        copy_clock(stored, game);
        Ok(())
    }

    #[instrument(skip(self, turns), fields(turn_count = turns.len()))]
    async fn replace_turns(
        &self,
        game_id: i64,
        turns: &[NewTurn],
    ) -> Result<Vec<GameTurnModel>, AppError> {
        let mut guard = self.db.write().await;
        let tables = &mut *guard;
        match tables.data.games.get(&game_id) {
            None => return Err(AppError::NotFound("Game not found".to_string())),
            Some(game) if !game.is_active() => return Err(game_finished()),
            Some(_) => {}
        }

        let ledger = assign_turn_ids(&mut tables.sequences, turns);
        if let Some(stored) = tables.data.games.get_mut(&game_id) {
            stored.turns = ledger.clone();
        }
        Ok(ledger)
    }

    #[instrument(skip(self, game, turns), fields(game_id = game.id))]
    async fn update_turn_state(
        &self,
        game: &GameModel,
        turns: Option<&[NewTurn]>,
    ) -> Result<GameModel, AppError> {
        let mut guard = self.db.write().await;
        let tables = &mut *guard;
        if !tables.data.games.get(&game.id).is_some_and(GameModel::is_active) {
            return Err(no_active_game());
        }

        let ledger = turns.map(|t| assign_turn_ids(&mut tables.sequences, t));
        let stored = tables
            .data
            .games
            .get_mut(&game.id)
            .ok_or_else(no_active_game)?;
        copy_turn_owner(stored, game);
        if let Some(ledger) = ledger {
            stored.turns = ledger;
        }
        let updated = stored.clone();
        Ok(hydrate(updated, &tables.data.users))
    }

    #[instrument(skip(self, game), fields(game_id = game.id))]
    async fn finish_game(&self, game: &GameModel) -> Result<(), AppError> {
        let mut tables = self.db.write().await;
        let stored = tables
            .data
            .games
            .get_mut(&game.id)
            .filter(|g| g.is_active())
            .ok_or_else(no_active_game)?;
        copy_clock(stored, game);
        stored.end_time = game.end_time;
        stored.winning_team = game.winning_team;
        stored.is_technical_defeat = game.is_technical_defeat;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn clear_games(&self) -> Result<u64, AppError> {
        let mut tables = self.db.write().await;
        let count = tables.data.games.len() as u64;
        tables.data.games.clear();
        Ok(count)
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

/// PostgreSQL implementation of game repository
pub struct PostgresGameRepository {
    pool: PgPool,
}

impl PostgresGameRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub(crate) const GAME_COLUMNS: &str = "id, start_time, end_time, turn_limit_seconds, \
    team_time_limit_seconds, first_move_team, team1_name, team2_name, current_turn_team, \
    current_turn_start, is_paused, pause_started_at, total_pause_duration_seconds, \
    winning_team, is_technical_defeat, created_at, updated_at";

fn team_column(row: &PgRow, column: &str) -> Result<Team, AppError> {
    Team::try_from(row.get::<i16, _>(column)).map_err(|e| {
        warn!(column, error = %e, "Stored team number out of range");
        AppError::StorageFailure(e.to_string())
    })
}

fn game_from_row(row: &PgRow) -> Result<GameModel, AppError> {
    let winning_team = row
        .get::<Option<i16>, _>("winning_team")
        .map(Team::try_from)
        .transpose()
        .map_err(|e| AppError::StorageFailure(e.to_string()))?;

    Ok(GameModel {
        id: row.get("id"),
        start_time: row.get("start_time"),
        end_time: row.get("end_time"),
        turn_limit_seconds: row.get("turn_limit_seconds"),
        team_time_limit_seconds: row.get("team_time_limit_seconds"),
        first_move_team: team_column(row, "first_move_team")?,
        team1_name: row.get("team1_name"),
        team2_name: row.get("team2_name"),
        current_turn_team: team_column(row, "current_turn_team")?,
        current_turn_start: row.get("current_turn_start"),
        is_paused: row.get("is_paused"),
        pause_started_at: row.get("pause_started_at"),
        total_pause_duration_seconds: row.get("total_pause_duration_seconds"),
        winning_team,
        is_technical_defeat: row.get("is_technical_defeat"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        players: Vec::new(),
        turns: Vec::new(),
    })
}

fn turn_from_row(row: &PgRow) -> Result<GameTurnModel, AppError> {
    Ok(GameTurnModel {
        id: row.get("id"),
        team: team_column(row, "team_number")?,
        duration_sec: row.get("duration_sec"),
        overtime_sec: row.get("overtime_sec"),
    })
}

/// Deletes the ledger of `game_id` and inserts `turns` in order
async fn write_turns(
    conn: &mut PgConnection,
    game_id: i64,
    turns: &[NewTurn],
) -> Result<Vec<GameTurnModel>, sqlx::Error> {
    sqlx::query("DELETE FROM game_turns WHERE game_id = $1")
        .bind(game_id)
        .execute(&mut *conn)
        .await?;

    let mut ledger = Vec::with_capacity(turns.len());
    for turn in turns {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO game_turns (game_id, team_number, duration_sec, overtime_sec) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(game_id)
        .bind(turn.team.number())
        .bind(turn.duration_sec)
        .bind(turn.overtime_sec)
        .fetch_one(&mut *conn)
        .await?;
        ledger.push(GameTurnModel::from_new(id, turn));
    }
    Ok(ledger)
}

async fn write_clock(conn: &mut PgConnection, game: &GameModel) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE games SET current_turn_start = $2, is_paused = $3, pause_started_at = $4, \
         total_pause_duration_seconds = $5, updated_at = $6 \
         WHERE id = $1 AND end_time IS NULL",
    )
    .bind(game.id)
    .bind(game.current_turn_start)
    .bind(game.is_paused)
    .bind(game.pause_started_at)
    .bind(game.total_pause_duration_seconds)
    .bind(game.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

async fn write_turn_owner(conn: &mut PgConnection, game: &GameModel) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE games SET current_turn_team = $2, current_turn_start = $3, updated_at = $4 \
         WHERE id = $1 AND end_time IS NULL",
    )
    .bind(game.id)
    .bind(game.current_turn_team.number())
    .bind(game.current_turn_start)
    .bind(game.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

impl PostgresGameRepository {
    /// Loads players and turns for the given game rows, preserving row order
    async fn assemble(&self, rows: Vec<PgRow>) -> Result<Vec<GameModel>, AppError> {
        let mut games = rows.iter().map(game_from_row).collect::<Result<Vec<_>, _>>()?;
        if games.is_empty() {
            return Ok(games);
        }
        let ids: Vec<i64> = games.iter().map(|g| g.id).collect();

        let player_rows = sqlx::query(
            "SELECT gp.id, gp.game_id, gp.seat, gp.user_id, u.name AS user_name, \
             gp.deck_id, gp.deck_name \
             FROM game_players gp JOIN users u ON u.id = gp.user_id \
             WHERE gp.game_id = ANY($1) ORDER BY gp.game_id, gp.seat, gp.id",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error("load game players"))?;

        let turn_rows = sqlx::query(
            "SELECT id, game_id, team_number, duration_sec, overtime_sec \
             FROM game_turns WHERE game_id = ANY($1) ORDER BY game_id, id",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error("load game turns"))?;

        let mut players: HashMap<i64, Vec<GamePlayerModel>> = HashMap::new();
        for row in &player_rows {
            players
                .entry(row.get("game_id"))
                .or_default()
                .push(GamePlayerModel {
                    id: row.get("id"),
                    seat: row.get("seat"),
                    user_id: row.get("user_id"),
                    user_name: row.get("user_name"),
                    deck_id: row.get("deck_id"),
                    deck_name: row.get("deck_name"),
                });
        }
        let mut turns: HashMap<i64, Vec<GameTurnModel>> = HashMap::new();
        for row in &turn_rows {
            turns
                .entry(row.get("game_id"))
                .or_default()
                .push(turn_from_row(row)?);
        }

        for game in &mut games {
            game.players = players.remove(&game.id).unwrap_or_default();
            game.turns = turns.remove(&game.id).unwrap_or_default();
        }
        Ok(games)
    }

    async fn fetch_one_game(&self, rows: Vec<PgRow>) -> Result<Option<GameModel>, AppError> {
        Ok(self.assemble(rows).await?.into_iter().next())
    }
}

#[async_trait]
impl GameRepository for PostgresGameRepository {
    #[instrument(skip(self, game), fields(players = game.players.len()))]
    async fn create_active_game(
        &self,
        game: &NewGame,
        now: DateTime<Utc>,
    ) -> Result<GameModel, AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(storage_error("begin create game"))?;

        let active: Option<i64> =
            sqlx::query_scalar("SELECT id FROM games WHERE end_time IS NULL LIMIT 1")
                .fetch_optional(&mut *tx)
                .await
                .map_err(storage_error("check active game"))?;
        if active.is_some() {
            warn!("Active game already exists");
            return Err(active_game_exists());
        }

        let game_id: i64 = sqlx::query_scalar(
            "INSERT INTO games (start_time, turn_limit_seconds, team_time_limit_seconds, \
             first_move_team, team1_name, team2_name, current_turn_team, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $4, $1, $1) RETURNING id",
        )
        .bind(now)
        .bind(game.turn_limit_seconds)
        .bind(game.team_time_limit_seconds)
        .bind(game.first_move_team.number())
        .bind(&game.team1_name)
        .bind(&game.team2_name)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            // a concurrent create that won the race trips the single-active index
            if is_unique_violation(&e) {
                warn!("Concurrent active game creation rejected");
                active_game_exists()
            } else {
                storage_error("insert game")(e)
            }
        })?;

        for (seat, player) in game.players.iter().enumerate() {
            sqlx::query(
                "INSERT INTO game_players (game_id, seat, user_id, deck_id, deck_name) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(game_id)
            .bind(seat as i16)
            .bind(player.user_id)
            .bind(player.deck_id)
            .bind(&player.deck_name)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    AppError::InvalidInput(format!(
                        "Player refers to unknown user {}",
                        player.user_id
                    ))
                } else {
                    storage_error("insert game player")(e)
                }
            })?;
        }

        tx.commit()
            .await
            .map_err(storage_error("commit create game"))?;
        debug!(game_id, "Game created in database");

        self.get_game(game_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Game not found".to_string()))
    }

    #[instrument(skip(self))]
    async fn get_game(&self, game_id: i64) -> Result<Option<GameModel>, AppError> {
        let rows = sqlx::query(&format!("SELECT {} FROM games WHERE id = $1", GAME_COLUMNS))
            .bind(game_id)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error("get game"))?;
        self.fetch_one_game(rows).await
    }

    #[instrument(skip(self))]
    async fn find_active_game(&self) -> Result<Option<GameModel>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM games WHERE end_time IS NULL ORDER BY id LIMIT 1",
            GAME_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error("find active game"))?;
        self.fetch_one_game(rows).await
    }

    #[instrument(skip(self))]
    async fn list_games(&self) -> Result<Vec<GameModel>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM games ORDER BY updated_at DESC, id DESC",
            GAME_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error("list games"))?;
        self.assemble(rows).await
    }

    #[instrument(skip(self))]
    async fn list_finished_games(&self) -> Result<Vec<GameModel>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM games WHERE end_time IS NOT NULL ORDER BY id",
            GAME_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error("list finished games"))?;
        self.assemble(rows).await
    }

    #[instrument(skip(self, game), fields(game_id = game.id))]
    async fn save_clock(&self, game: &GameModel) -> Result<(), AppError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(storage_error("acquire connection"))?;
        let affected = write_clock(&mut *conn, game)
            .await
            .map_err(storage_error("save game clock"))?;
        if affected == 0 {
            return Err(no_active_game());
        }
        Ok(())
    }

    #[instrument(skip(self, turns), fields(turn_count = turns.len()))]
    async fn replace_turns(
        &self,
        game_id: i64,
        turns: &[NewTurn],
    ) -> Result<Vec<GameTurnModel>, AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(storage_error("begin replace turns"))?;

        let active: Option<bool> =
            sqlx::query_scalar("SELECT end_time IS NULL FROM games WHERE id = $1 FOR UPDATE")
                .bind(game_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(storage_error("check game"))?;
        match active {
            None => return Err(AppError::NotFound("Game not found".to_string())),
            Some(false) => return Err(game_finished()),
            Some(true) => {}
        }

        // dropping `tx` on an error path rolls the ledger back
        let ledger = write_turns(&mut *tx, game_id, turns)
            .await
            .map_err(storage_error("replace turns"))?;
        tx.commit()
            .await
            .map_err(storage_error("commit replace turns"))?;

        info!(game_id, turn_count = ledger.len(), "Turn ledger replaced");
        Ok(ledger)
    }

    #[instrument(skip(self, game, turns), fields(game_id = game.id))]
    async fn update_turn_state(
        &self,
        game: &GameModel,
        turns: Option<&[NewTurn]>,
    ) -> Result<GameModel, AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(storage_error("begin update turn state"))?;

        let affected = write_turn_owner(&mut *tx, game)
            .await
            .map_err(storage_error("save turn owner"))?;
        if affected == 0 {
            return Err(no_active_game());
        }
        if let Some(turns) = turns {
            write_turns(&mut *tx, game.id, turns)
                .await
                .map_err(storage_error("replace turns"))?;
        }
        tx.commit()
            .await
            .map_err(storage_error("commit update turn state"))?;

        self.get_game(game.id)
            .await?
            .ok_or_else(|| AppError::NotFound("Game not found".to_string()))
    }

    #[instrument(skip(self, game), fields(game_id = game.id))]
    async fn finish_game(&self, game: &GameModel) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE games SET end_time = $2, winning_team = $3, is_technical_defeat = $4, \
             current_turn_start = $5, is_paused = $6, pause_started_at = $7, \
             total_pause_duration_seconds = $8, updated_at = $9 \
             WHERE id = $1 AND end_time IS NULL",
        )
        .bind(game.id)
        .bind(game.end_time)
        .bind(game.winning_team.map(Team::number))
        .bind(game.is_technical_defeat)
        .bind(game.current_turn_start)
        .bind(game.is_paused)
        .bind(game.pause_started_at)
        .bind(game.total_pause_duration_seconds)
        .bind(game.updated_at)
        .execute(&self.pool)
        .await
        .map_err(storage_error("finish game"))?;

        if result.rows_affected() == 0 {
            return Err(no_active_game());
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn clear_games(&self) -> Result<u64, AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(storage_error("begin clear games"))?;
        for table in ["game_turns", "game_players"] {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await
                .map_err(storage_error("clear game rows"))?;
        }
        let deleted = sqlx::query("DELETE FROM games")
            .execute(&mut *tx)
            .await
            .map_err(storage_error("clear games"))?
            .rows_affected();
        tx.commit()
            .await
            .map_err(storage_error("commit clear games"))?;
        Ok(deleted)
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(storage_error("ping"))?;
        Ok(())
    }
}
