use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::{
    models::DeckModel,
    repository::DeckRepository,
    types::{DeckRequest, DeckResponse},
};
use crate::clock::Clock;
use crate::files::FileStore;
use crate::shared::AppError;

const NAME_MIN_CHARS: usize = 2;
const NAME_MAX_CHARS: usize = 150;

/// Service for deck business logic and image cleanup
pub struct DeckService {
    repository: Arc<dyn DeckRepository + Send + Sync>,
    file_store: Arc<dyn FileStore + Send + Sync>,
    clock: Arc<dyn Clock>,
}

fn normalize_name(raw: &str) -> Result<String, AppError> {
    let name = raw.trim();
    let len = name.chars().count();
    if !(NAME_MIN_CHARS..=NAME_MAX_CHARS).contains(&len) {
        return Err(AppError::InvalidInput(format!(
            "Deck name must be {} to {} characters",
            NAME_MIN_CHARS, NAME_MAX_CHARS
        )));
    }
    Ok(name.to_string())
}

impl DeckService {
    pub fn new(
        repository: Arc<dyn DeckRepository + Send + Sync>,
        file_store: Arc<dyn FileStore + Send + Sync>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            file_store,
            clock,
        }
    }

    pub async fn list_decks(&self) -> Result<Vec<DeckResponse>, AppError> {
        let decks = self.repository.list_decks().await?;
        Ok(decks.iter().map(DeckResponse::from).collect())
    }

    pub async fn get_deck(&self, deck_id: i64) -> Result<DeckResponse, AppError> {
        let deck = self.load(deck_id).await?;
        Ok(DeckResponse::from(&deck))
    }

    #[instrument(skip(self, request))]
    pub async fn create_deck(&self, request: DeckRequest) -> Result<DeckResponse, AppError> {
        let name = normalize_name(&request.name)?;
        let deck = self.repository.create_deck(&name, self.clock.now()).await?;

        info!(deck_id = deck.id, name = %deck.name, "Deck created");
        Ok(DeckResponse::from(&deck))
    }

    #[instrument(skip(self, request))]
    pub async fn rename_deck(
        &self,
        deck_id: i64,
        request: DeckRequest,
    ) -> Result<DeckResponse, AppError> {
        let name = normalize_name(&request.name)?;
        let mut deck = self.load(deck_id).await?;

        deck.name = name;
        deck.updated_at = self.clock.now();
        self.repository.update_deck(&deck).await?;

        info!(deck_id, "Deck renamed");
        Ok(DeckResponse::from(&deck))
    }

    /// Deletes image and avatar files and clears both references
    #[instrument(skip(self))]
    pub async fn remove_images(&self, deck_id: i64) -> Result<DeckResponse, AppError> {
        let mut deck = self.load(deck_id).await?;
        if !deck.has_images() {
            return Ok(DeckResponse::from(&deck));
        }

        self.remove_files(&deck).await;
        deck.image_url = None;
        deck.avatar_url = None;
        deck.updated_at = self.clock.now();
        self.repository.update_deck(&deck).await?;

        info!(deck_id, "Deck images removed");
        Ok(DeckResponse::from(&deck))
    }

    /// Deletes the deck row and its image files. Games keep their deck name snapshot.
    #[instrument(skip(self))]
    pub async fn delete_deck(&self, deck_id: i64) -> Result<(), AppError> {
        let deck = self.load(deck_id).await?;
        self.remove_files(&deck).await;

        if !self.repository.delete_deck(deck_id).await? {
            return Err(AppError::NotFound("Deck not found".to_string()));
        }
        info!(deck_id, "Deck deleted");
        Ok(())
    }

    async fn load(&self, deck_id: i64) -> Result<DeckModel, AppError> {
        self.repository
            .get_deck(deck_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Deck not found".to_string()))
    }

    // File cleanup is best effort; a stale file must not block the row change.
    async fn remove_files(&self, deck: &DeckModel) {
        for reference in deck.image_references() {
            if let Err(e) = self.file_store.remove(reference).await {
                warn!(deck_id = deck.id, reference, error = %e, "Failed to remove deck image");
            }
        }
    }
}
