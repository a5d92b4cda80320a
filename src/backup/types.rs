use serde::{Deserialize, Serialize};

use crate::deck::models::DeckModel;
use crate::game::models::GameModel;
use crate::user::models::UserModel;

/// Deck row with its image files inlined as standard base64
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDeck {
    #[serde(flatten)]
    pub deck: DeckModel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_base64: Option<String>,
}

/// Full dump: users (with credential hashes), decks, games with players and turns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportPayload {
    #[serde(default)]
    pub users: Vec<UserModel>,
    #[serde(default)]
    pub decks: Vec<ExportDeck>,
    #[serde(default)]
    pub games: Vec<GameModel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub users: usize,
    pub decks: usize,
    pub games: usize,
    pub images: usize,
}
