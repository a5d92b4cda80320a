use base64::{engine::general_purpose::STANDARD, Engine as _};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use std::collections::{BTreeMap, HashSet};
use std::io::{Read, Write};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::{
    repository::BackupRepository,
    types::{ExportDeck, ExportPayload, ImportSummary},
};
use crate::db::TableData;
use crate::files::{relative_path, FileStore};
use crate::shared::AppError;

/// Suggested file name for the export attachment
pub const EXPORT_FILE_NAME: &str = "mtg_stats_export.json.gz";
/// Upper bound on the decompressed archive JSON
const MAX_IMPORT_JSON_BYTES: u64 = 256 * 1024 * 1024;

/// Image file decoded from an import, written after the tables are restored
struct PendingFile {
    reference: String,
    bytes: Vec<u8>,
}

/// Export and import of the whole dataset as gzip-compressed JSON
pub struct BackupService {
    repository: Arc<dyn BackupRepository + Send + Sync>,
    file_store: Arc<dyn FileStore + Send + Sync>,
}

fn encode_failure(e: impl std::fmt::Display) -> AppError {
    warn!(error = %e, "Failed to encode export");
    AppError::Internal
}

fn decode_image(
    deck_id: i64,
    reference: Option<&str>,
    data: Option<&str>,
) -> Result<Option<PendingFile>, AppError> {
    let Some(data) = data.filter(|d| !d.is_empty()) else {
        return Ok(None);
    };
    let Some(reference) = reference.filter(|r| relative_path(r).is_some()) else {
        return Err(AppError::InvalidInput(format!(
            "Deck {} carries image data without a valid /uploads/ reference",
            deck_id
        )));
    };
    let bytes = STANDARD.decode(data).map_err(|e| {
        AppError::InvalidInput(format!("Deck {} image is not valid base64: {}", deck_id, e))
    })?;
    Ok(Some(PendingFile {
        reference: reference.to_string(),
        bytes,
    }))
}

/// Checks ids and references of an import before anything is written
fn validate(payload: &ExportPayload) -> Result<(), AppError> {
    let mut names = HashSet::new();
    let mut user_ids = HashSet::new();
    for user in &payload.users {
        if !user_ids.insert(user.id) {
            return Err(AppError::InvalidInput(format!("Duplicate user id {}", user.id)));
        }
        if !names.insert(user.name.as_str()) {
            return Err(AppError::InvalidInput(format!(
                "Duplicate user name {}",
                user.name
            )));
        }
    }

    let mut deck_ids = HashSet::new();
    for deck in &payload.decks {
        if !deck_ids.insert(deck.deck.id) {
            return Err(AppError::InvalidInput(format!(
                "Duplicate deck id {}",
                deck.deck.id
            )));
        }
    }

    let mut game_ids = HashSet::new();
    let mut player_ids = HashSet::new();
    let mut turn_ids = HashSet::new();
    let mut active_games = 0;
    for game in &payload.games {
        if !game_ids.insert(game.id) {
            return Err(AppError::InvalidInput(format!("Duplicate game id {}", game.id)));
        }
        if game.is_active() {
            active_games += 1;
        }
        for player in &game.players {
            if !player_ids.insert(player.id) {
                return Err(AppError::InvalidInput(format!(
                    "Duplicate game player id {}",
                    player.id
                )));
            }
            if !user_ids.contains(&player.user_id) {
                return Err(AppError::InvalidInput(format!(
                    "Game {} refers to unknown user {}",
                    game.id, player.user_id
                )));
            }
        }
        for turn in &game.turns {
            if !turn_ids.insert(turn.id) {
                return Err(AppError::InvalidInput(format!(
                    "Duplicate game turn id {}",
                    turn.id
                )));
            }
        }
    }
    if active_games > 1 {
        return Err(AppError::InvalidInput(
            "Import contains more than one active game".to_string(),
        ));
    }
    Ok(())
}

impl BackupService {
    pub fn new(
        repository: Arc<dyn BackupRepository + Send + Sync>,
        file_store: Arc<dyn FileStore + Send + Sync>,
    ) -> Self {
        Self {
            repository,
            file_store,
        }
    }

    /// Builds the payload with deck images inlined. Missing files are left out.
    #[instrument(skip(self))]
    pub async fn export_payload(&self) -> Result<ExportPayload, AppError> {
        let data = self.repository.snapshot().await?;

        let mut decks = Vec::with_capacity(data.decks.len());
        for deck in data.decks.into_values() {
            let image_base64 = self.inline(deck.image_url.as_deref()).await?;
            let avatar_base64 = self.inline(deck.avatar_url.as_deref()).await?;
            decks.push(ExportDeck {
                deck,
                image_base64,
                avatar_base64,
            });
        }

        Ok(ExportPayload {
            users: data.users.into_values().collect(),
            decks,
            games: data.games.into_values().collect(),
        })
    }

    async fn inline(&self, reference: Option<&str>) -> Result<Option<String>, AppError> {
        let Some(reference) = reference.filter(|r| !r.is_empty()) else {
            return Ok(None);
        };
        let bytes = self.file_store.read(reference).await?;
        if bytes.is_none() {
            warn!(reference, "Deck image missing on disk, exported without data");
        }
        Ok(bytes.map(|b| STANDARD.encode(b)))
    }

    /// Gzip-compressed JSON of `export_payload`
    #[instrument(skip(self))]
    pub async fn export_archive(&self) -> Result<Vec<u8>, AppError> {
        let payload = self.export_payload().await?;
        let json = serde_json::to_vec(&payload).map_err(encode_failure)?;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&json).map_err(encode_failure)?;
        let archive = encoder.finish().map_err(encode_failure)?;

        info!(
            users = payload.users.len(),
            decks = payload.decks.len(),
            games = payload.games.len(),
            bytes = archive.len(),
            "Export archive built"
        );
        Ok(archive)
    }

    /// Replaces all data from a gzip archive produced by `export_archive`
    #[instrument(skip(self, archive), fields(bytes = archive.len()))]
    pub async fn import_archive(&self, archive: &[u8]) -> Result<ImportSummary, AppError> {
        let json = decompress(archive, MAX_IMPORT_JSON_BYTES)?;
        let payload: ExportPayload = serde_json::from_slice(&json)
            .map_err(|e| AppError::InvalidInput(format!("Archive JSON is invalid: {}", e)))?;

        self.import_payload(payload).await
    }

    /// Validates and decodes everything, restores the tables, then rewrites
    /// the deck image directory.
    pub async fn import_payload(&self, payload: ExportPayload) -> Result<ImportSummary, AppError> {
        validate(&payload)?;

        let mut files = Vec::new();
        for d in &payload.decks {
            files.extend(decode_image(
                d.deck.id,
                d.deck.image_url.as_deref(),
                d.image_base64.as_deref(),
            )?);
            files.extend(decode_image(
                d.deck.id,
                d.deck.avatar_url.as_deref(),
                d.avatar_base64.as_deref(),
            )?);
        }

        let summary = ImportSummary {
            users: payload.users.len(),
            decks: payload.decks.len(),
            games: payload.games.len(),
            images: files.len(),
        };

        let data = TableData {
            users: payload.users.into_iter().map(|u| (u.id, u)).collect(),
            decks: payload
                .decks
                .into_iter()
                .map(|d| (d.deck.id, d.deck))
                .collect(),
            games: payload
                .games
                .into_iter()
                .map(|g| (g.id, g))
                .collect::<BTreeMap<_, _>>(),
        };
        self.repository.restore(&data).await?;

        self.restore_files(&files).await.map_err(|e| {
            warn!(error = %e, "Tables restored but deck images failed");
            AppError::StorageFailure(format!(
                "Data restored, but deck images could not be written: {}",
                e
            ))
        })?;

        info!(
            users = summary.users,
            decks = summary.decks,
            games = summary.games,
            images = summary.images,
            "Import complete"
        );
        Ok(summary)
    }

    async fn restore_files(&self, files: &[PendingFile]) -> Result<(), AppError> {
        self.file_store.reset_deck_images().await?;
        for file in files {
            self.file_store.write(&file.reference, &file.bytes).await?;
        }
        Ok(())
    }
}

/// Gunzips `archive`, refusing output larger than `limit` bytes
fn decompress(archive: &[u8], limit: u64) -> Result<Vec<u8>, AppError> {
    let mut json = Vec::new();
    GzDecoder::new(archive)
        .take(limit + 1)
        .read_to_end(&mut json)
        .map_err(|e| AppError::InvalidInput(format!("Not a gzip archive: {}", e)))?;
    if json.len() as u64 > limit {
        return Err(AppError::InvalidInput(format!(
            "Archive expands beyond {} bytes",
            limit
        )));
    }
    Ok(json)
}
