use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::models::DeckModel;

/// Request payload for creating or renaming a deck
#[derive(Debug, Deserialize)]
pub struct DeckRequest {
    pub name: String,
}

/// Deck as returned by the API, image references carrying a cache-busting suffix
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct DeckResponse {
    pub id: i64,
    pub name: String,
    pub image_url: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Appends `t=<unix seconds>` so browsers refetch an image after the deck changes
pub fn with_cache_bust(reference: &str, updated_at: DateTime<Utc>) -> String {
    let separator = if reference.contains('?') { '&' } else { '?' };
    format!("{}{}t={}", reference, separator, updated_at.timestamp())
}

impl From<&DeckModel> for DeckResponse {
    fn from(deck: &DeckModel) -> Self {
        let bust = |r: &Option<String>| {
            r.as_deref()
                .filter(|r| !r.is_empty())
                .map(|r| with_cache_bust(r, deck.updated_at))
        };
        Self {
            id: deck.id,
            name: deck.name.clone(),
            image_url: bust(&deck.image_url),
            avatar_url: bust(&deck.avatar_url),
            created_at: deck.created_at,
            updated_at: deck.updated_at,
        }
    }
}
