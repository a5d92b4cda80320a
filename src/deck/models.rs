use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Database model for decks table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeckModel {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub image_url: Option<String>, // e.g. /uploads/decks/7.png
    #[serde(default)]
    pub avatar_url: Option<String>, // e.g. /uploads/decks/7_avatar.png
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeckModel {
    pub fn new(id: i64, name: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name,
            image_url: None,
            avatar_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Image references that point at stored files
    pub fn image_references(&self) -> impl Iterator<Item = &str> {
        [self.image_url.as_deref(), self.avatar_url.as_deref()]
            .into_iter()
            .flatten()
            .filter(|r| !r.is_empty())
    }

    pub fn has_images(&self) -> bool {
        self.image_references().next().is_some()
    }
}
