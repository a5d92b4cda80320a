use sqlx::{postgres::PgPoolOptions, PgPool};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::backup::repository::{
    BackupRepository, InMemoryBackupRepository, PostgresBackupRepository,
};
use crate::deck::models::DeckModel;
use crate::deck::repository::{DeckRepository, InMemoryDeckRepository, PostgresDeckRepository};
use crate::game::models::GameModel;
use crate::game::repository::{GameRepository, InMemoryGameRepository, PostgresGameRepository};
use crate::shared::AppError;
use crate::user::models::UserModel;
use crate::user::repository::{InMemoryUserRepository, PostgresUserRepository, UserRepository};

/// Row id counters for the in-memory tables, mirroring BIGSERIAL sequences
#[derive(Debug, Default, Clone)]
pub struct Sequences {
    pub users: i64,
    pub decks: i64,
    pub games: i64,
    pub game_players: i64,
    pub game_turns: i64,
}

impl Sequences {
    pub fn next(counter: &mut i64) -> i64 {
        *counter += 1;
        *counter
    }

    /// Moves every counter past the highest id currently stored
    pub fn advance_past(&mut self, tables: &TableData) {
        self.users = self.users.max(tables.users.keys().max().copied().unwrap_or(0));
        self.decks = self.decks.max(tables.decks.keys().max().copied().unwrap_or(0));
        self.games = self.games.max(tables.games.keys().max().copied().unwrap_or(0));
        let max_player = tables
            .games
            .values()
            .flat_map(|g| g.players.iter().map(|p| p.id))
            .max()
            .unwrap_or(0);
        let max_turn = tables
            .games
            .values()
            .flat_map(|g| g.turns.iter().map(|t| t.id))
            .max()
            .unwrap_or(0);
        self.game_players = self.game_players.max(max_player);
        self.game_turns = self.game_turns.max(max_turn);
    }
}

/// Row storage shared by every in-memory repository. Games are stored with
/// their players and turns; player user names are resolved on read.
#[derive(Debug, Default, Clone)]
pub struct TableData {
    pub users: BTreeMap<i64, UserModel>,
    pub decks: BTreeMap<i64, DeckModel>,
    pub games: BTreeMap<i64, GameModel>,
}

#[derive(Debug, Default)]
pub struct Tables {
    pub data: TableData,
    pub sequences: Sequences,
}

/// Handle to the in-memory database. Cloning shares the same tables, so a
/// single write lock makes multi-table operations atomic.
#[derive(Debug, Clone, Default)]
pub struct MemoryDb {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn read(&self) -> tokio::sync::RwLockReadGuard<'_, Tables> {
        self.tables.read().await
    }

    pub async fn write(&self) -> tokio::sync::RwLockWriteGuard<'_, Tables> {
        self.tables.write().await
    }
}

/// The full set of storage collaborators handed to `AppState`
pub struct Repositories {
    pub users: Arc<dyn UserRepository + Send + Sync>,
    pub decks: Arc<dyn DeckRepository + Send + Sync>,
    pub games: Arc<dyn GameRepository + Send + Sync>,
    pub backup: Arc<dyn BackupRepository + Send + Sync>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        Self::in_memory_with(MemoryDb::new())
    }

    pub fn in_memory_with(db: MemoryDb) -> Self {
        Self {
            users: Arc::new(InMemoryUserRepository::new(db.clone())),
            decks: Arc::new(InMemoryDeckRepository::new(db.clone())),
            games: Arc::new(InMemoryGameRepository::new(db.clone())),
            backup: Arc::new(InMemoryBackupRepository::new(db)),
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        Self {
            users: Arc::new(PostgresUserRepository::new(pool.clone())),
            decks: Arc::new(PostgresDeckRepository::new(pool.clone())),
            games: Arc::new(PostgresGameRepository::new(pool.clone())),
            backup: Arc::new(PostgresBackupRepository::new(pool)),
        }
    }
}

/// Opens the PostgreSQL pool and applies the embedded migrations
pub async fn connect_postgres(database_url: &str) -> Result<PgPool, AppError> {
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(1)
        .connect(database_url)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to connect to PostgreSQL");
            AppError::StorageFailure(e.to_string())
        })?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to apply database migrations");
            AppError::StorageFailure(e.to_string())
        })?;

    info!("PostgreSQL connected and migrations applied");
    Ok(pool)
}

/// Wraps a sqlx error into `StorageFailure`, logging the failed operation
pub fn storage_error(operation: &'static str) -> impl Fn(sqlx::Error) -> AppError {
    move |e| {
        warn!(error = %e, operation, "Database operation failed");
        AppError::StorageFailure(e.to_string())
    }
}

pub fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

pub fn is_foreign_key_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}
