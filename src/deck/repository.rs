use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::{debug, instrument, warn};

use super::models::DeckModel;
use crate::db::{storage_error, MemoryDb, Sequences};
use crate::shared::AppError;

/// Trait for deck repository operations
#[async_trait]
pub trait DeckRepository {
    /// All decks, newest id first
    async fn list_decks(&self) -> Result<Vec<DeckModel>, AppError>;
    async fn get_deck(&self, deck_id: i64) -> Result<Option<DeckModel>, AppError>;
    async fn create_deck(&self, name: &str, now: DateTime<Utc>) -> Result<DeckModel, AppError>;
    /// Persists name and image references; `NotFound` if the row is gone
    async fn update_deck(&self, deck: &DeckModel) -> Result<(), AppError>;
    /// Returns false when no such deck exists
    async fn delete_deck(&self, deck_id: i64) -> Result<bool, AppError>;
}

/// In-memory implementation of DeckRepository for development and testing
pub struct InMemoryDeckRepository {
    db: MemoryDb,
}

impl Default for InMemoryDeckRepository {
    fn default() -> Self {
        Self::new(MemoryDb::new())
    }
}

impl InMemoryDeckRepository {
    pub fn new(db: MemoryDb) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DeckRepository for InMemoryDeckRepository {
    async fn list_decks(&self) -> Result<Vec<DeckModel>, AppError> {
        let tables = self.db.read().await;
        Ok(tables.data.decks.values().rev().cloned().collect())
    }

    async fn get_deck(&self, deck_id: i64) -> Result<Option<DeckModel>, AppError> {
        let tables = self.db.read().await;
        Ok(tables.data.decks.get(&deck_id).cloned())
    }

    #[instrument(skip(self))]
    async fn create_deck(&self, name: &str, now: DateTime<Utc>) -> Result<DeckModel, AppError> {
        let mut tables = self.db.write().await;
        let id = Sequences::next(&mut tables.sequences.decks);
        let deck = DeckModel::new(id, name.to_string(), now);
        tables.data.decks.insert(id, deck.clone());

        debug!(deck_id = id, "Deck created in memory");
        Ok(deck)
    }

    #[instrument(skip(self, deck), fields(deck_id = deck.id))]
    async fn update_deck(&self, deck: &DeckModel) -> Result<(), AppError> {
        let mut tables = self.db.write().await;
        match tables.data.decks.get_mut(&deck.id) {
            Some(existing) => {
                *existing = deck.clone();
                Ok(())
            }
            None => Err(AppError::NotFound("Deck not found".to_string())),
        }
    }

    #[instrument(skip(self))]
    async fn delete_deck(&self, deck_id: i64) -> Result<bool, AppError> {
        let mut tables = self.db.write().await;
        Ok(tables.data.decks.remove(&deck_id).is_some())
    }
}

/// PostgreSQL implementation of deck repository
pub struct PostgresDeckRepository {
    pool: PgPool,
}

impl PostgresDeckRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub(crate) const DECK_COLUMNS: &str = "id, name, image_url, avatar_url, created_at, updated_at";

pub(crate) fn deck_from_row(row: &PgRow) -> DeckModel {
    DeckModel {
        id: row.get("id"),
        name: row.get("name"),
        image_url: row.get("image_url"),
        avatar_url: row.get("avatar_url"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl DeckRepository for PostgresDeckRepository {
    #[instrument(skip(self))]
    async fn list_decks(&self) -> Result<Vec<DeckModel>, AppError> {
        let rows = sqlx::query(&format!("SELECT {} FROM decks ORDER BY id DESC", DECK_COLUMNS))
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error("list decks"))?;
        Ok(rows.iter().map(deck_from_row).collect())
    }

    #[instrument(skip(self))]
    async fn get_deck(&self, deck_id: i64) -> Result<Option<DeckModel>, AppError> {
        let row = sqlx::query(&format!("SELECT {} FROM decks WHERE id = $1", DECK_COLUMNS))
            .bind(deck_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error("get deck"))?;
        Ok(row.as_ref().map(deck_from_row))
    }

    #[instrument(skip(self))]
    async fn create_deck(&self, name: &str, now: DateTime<Utc>) -> Result<DeckModel, AppError> {
        let row = sqlx::query(&format!(
            "INSERT INTO decks (name, created_at, updated_at) VALUES ($1, $2, $2) RETURNING {}",
            DECK_COLUMNS
        ))
        .bind(name)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_error("create deck"))?;

        let deck = deck_from_row(&row);
        debug!(deck_id = deck.id, "Deck created in database");
        Ok(deck)
    }

    #[instrument(skip(self, deck), fields(deck_id = deck.id))]
    async fn update_deck(&self, deck: &DeckModel) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE decks SET name = $2, image_url = $3, avatar_url = $4, updated_at = $5 WHERE id = $1",
        )
        .bind(deck.id)
        .bind(&deck.name)
        .bind(&deck.image_url)
        .bind(&deck.avatar_url)
        .bind(deck.updated_at)
        .execute(&self.pool)
        .await
        .map_err(storage_error("update deck"))?;

        if result.rows_affected() == 0 {
            warn!(deck_id = deck.id, "Deck not found for update");
            return Err(AppError::NotFound("Deck not found".to_string()));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_deck(&self, deck_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM decks WHERE id = $1")
            .bind(deck_id)
            .execute(&self.pool)
            .await
            .map_err(storage_error("delete deck"))?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_list_and_delete() {
        let repo = InMemoryDeckRepository::default();
        let a = repo.create_deck("Goblins", Utc::now()).await.unwrap();
        let b = repo.create_deck("Merfolk", Utc::now()).await.unwrap();

        let ids: Vec<i64> = repo.list_decks().await.unwrap().iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![b.id, a.id]);

        assert!(repo.delete_deck(a.id).await.unwrap());
        assert!(!repo.delete_deck(a.id).await.unwrap());
        assert!(repo.get_deck(a.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_missing_deck() {
        let repo = InMemoryDeckRepository::default();
        let ghost = DeckModel::new(9, "Ghost".to_string(), Utc::now());
        let result = repo.update_deck(&ghost).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
