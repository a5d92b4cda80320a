use std::sync::Arc;
use tracing::{debug, instrument};

use super::{
    aggregator,
    models::{DeckStats, PlayerStats},
};
use crate::game::repository::GameRepository;
use crate::shared::AppError;

/// Reads finished games and hands them to the aggregator. Nothing is cached.
pub struct StatsService {
    games: Arc<dyn GameRepository + Send + Sync>,
}

impl StatsService {
    pub fn new(games: Arc<dyn GameRepository + Send + Sync>) -> Self {
        Self { games }
    }

    #[instrument(skip(self))]
    pub async fn player_stats(&self) -> Result<Vec<PlayerStats>, AppError> {
        let games = self.games.list_finished_games().await?;
        let stats = aggregator::player_stats(&games);
        debug!(games = games.len(), players = stats.len(), "Player stats computed");
        Ok(stats)
    }

    #[instrument(skip(self))]
    pub async fn deck_stats(&self) -> Result<Vec<DeckStats>, AppError> {
        let games = self.games.list_finished_games().await?;
        let stats = aggregator::deck_stats(&games);
        debug!(games = games.len(), decks = stats.len(), "Deck stats computed");
        Ok(stats)
    }
}
