use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Row};
use tracing::{debug, info, instrument};

use crate::db::{storage_error, MemoryDb, TableData};
use crate::deck::repository::{deck_from_row, DECK_COLUMNS};
use crate::game::repository::{GameRepository, PostgresGameRepository};
use crate::shared::AppError;
use crate::user::repository::{user_from_row, USER_COLUMNS};

/// Whole-dataset access for export and import
#[async_trait]
pub trait BackupRepository {
    /// Every user, deck and game (players and turns loaded)
    async fn snapshot(&self) -> Result<TableData, AppError>;

    /// Replaces every table with `data` in one transaction, keeping row ids.
    /// Id sequences continue after the highest restored id.
    async fn restore(&self, data: &TableData) -> Result<(), AppError>;
}

/// In-memory implementation of BackupRepository for development and testing
pub struct InMemoryBackupRepository {
    db: MemoryDb,
}

impl Default for InMemoryBackupRepository {
    fn default() -> Self {
        Self::new(MemoryDb::new())
    }
}

impl InMemoryBackupRepository {
    pub fn new(db: MemoryDb) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BackupRepository for InMemoryBackupRepository {
    async fn snapshot(&self) -> Result<TableData, AppError> {
        let tables = self.db.read().await;
        let mut data = tables.data.clone();
        for game in data.games.values_mut() {
            for player in &mut game.players {
                player.user_name = tables
                    .data
                    .users
                    .get(&player.user_id)
                    .map(|u| u.name.clone())
                    .unwrap_or_default();
            }
        }
        Ok(data)
    }

    #[instrument(skip(self, data))]
    async fn restore(&self, data: &TableData) -> Result<(), AppError> {
        let mut tables = self.db.write().await;
        tables.data = data.clone();
        let mut sequences = tables.sequences.clone();
        sequences.advance_past(data);
        tables.sequences = sequences;

        debug!(
            users = data.users.len(),
            decks = data.decks.len(),
            games = data.games.len(),
            "Tables restored in memory"
        );
        Ok(())
    }
}

/// PostgreSQL implementation of backup repository
pub struct PostgresBackupRepository {
    pool: PgPool,
    games: PostgresGameRepository,
}

impl PostgresBackupRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            games: PostgresGameRepository::new(pool.clone()),
            pool,
        }
    }
}

const SEQUENCED_TABLES: [&str; 5] = ["users", "decks", "games", "game_players", "game_turns"];

async fn insert_rows(conn: &mut PgConnection, data: &TableData) -> Result<(), sqlx::Error> {
    for user in data.users.values() {
        sqlx::query(
            "INSERT INTO users (id, name, password_hash, is_admin, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.is_admin)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&mut *conn)
        .await?;
    }

    for deck in data.decks.values() {
        sqlx::query(
            "INSERT INTO decks (id, name, image_url, avatar_url, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(deck.id)
        .bind(&deck.name)
        .bind(&deck.image_url)
        .bind(&deck.avatar_url)
        .bind(deck.created_at)
        .bind(deck.updated_at)
        .execute(&mut *conn)
        .await?;
    }

    for game in data.games.values() {
        sqlx::query(
            "INSERT INTO games (id, start_time, end_time, turn_limit_seconds, \
             team_time_limit_seconds, first_move_team, team1_name, team2_name, \
             current_turn_team, current_turn_start, is_paused, pause_started_at, \
             total_pause_duration_seconds, winning_team, is_technical_defeat, created_at, \
             updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)",
        )
        .bind(game.id)
        .bind(game.start_time)
        .bind(game.end_time)
        .bind(game.turn_limit_seconds)
        .bind(game.team_time_limit_seconds)
        .bind(game.first_move_team.number())
        .bind(&game.team1_name)
        .bind(&game.team2_name)
        .bind(game.current_turn_team.number())
        .bind(game.current_turn_start)
        .bind(game.is_paused)
        .bind(game.pause_started_at)
        .bind(game.total_pause_duration_seconds)
        .bind(game.winning_team.map(|t| t.number()))
        .bind(game.is_technical_defeat)
        .bind(game.created_at)
        .bind(game.updated_at)
        .execute(&mut *conn)
        .await?;

        for player in &game.players {
            sqlx::query(
                "INSERT INTO game_players (id, game_id, seat, user_id, deck_id, deck_name) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(player.id)
            .bind(game.id)
            .bind(player.seat)
            .bind(player.user_id)
            .bind(player.deck_id)
            .bind(&player.deck_name)
            .execute(&mut *conn)
            .await?;
        }

        for turn in &game.turns {
            sqlx::query(
                "INSERT INTO game_turns (id, game_id, team_number, duration_sec, overtime_sec) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(turn.id)
            .bind(game.id)
            .bind(turn.team.number())
            .bind(turn.duration_sec)
            .bind(turn.overtime_sec)
            .execute(&mut *conn)
            .await?;
        }
    }
    Ok(())
}

#[async_trait]
impl BackupRepository for PostgresBackupRepository {
    #[instrument(skip(self))]
    async fn snapshot(&self) -> Result<TableData, AppError> {
        let mut data = TableData::default();

        let rows = sqlx::query(&format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS))
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error("export users"))?;
        for row in &rows {
            let user = user_from_row(row);
            data.users.insert(user.id, user);
        }

        let rows = sqlx::query(&format!("SELECT {} FROM decks ORDER BY id", DECK_COLUMNS))
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error("export decks"))?;
        for row in &rows {
            let deck = deck_from_row(row);
            data.decks.insert(deck.id, deck);
        }

        for game in self.games.list_games().await? {
            data.games.insert(game.id, game);
        }
        Ok(data)
    }

    #[instrument(skip(self, data))]
    async fn restore(&self, data: &TableData) -> Result<(), AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(storage_error("begin import"))?;

        // children first, foreign keys point upwards
        for table in ["game_turns", "game_players", "games", "decks", "users"] {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await
                .map_err(storage_error("clear table for import"))?;
        }

        insert_rows(&mut *tx, data)
            .await
            .map_err(storage_error("insert imported rows"))?;

        for table in SEQUENCED_TABLES {
            let row = sqlx::query(&format!(
                "SELECT setval(pg_get_serial_sequence('{table}', 'id'), \
                 GREATEST((SELECT COALESCE(MAX(id), 0) FROM {table}), 1), \
                 (SELECT COUNT(*) > 0 FROM {table})) AS value",
                table = table
            ))
            .fetch_one(&mut *tx)
            .await
            .map_err(storage_error("advance id sequence"))?;
            debug!(table, value = row.get::<i64, _>("value"), "Sequence advanced");
        }

        tx.commit()
            .await
            .map_err(storage_error("commit import"))?;

        info!(
            users = data.users.len(),
            decks = data.decks.len(),
            games = data.games.len(),
            "Database restored from import"
        );
        Ok(())
    }
}
