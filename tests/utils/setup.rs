use axum::Router;
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use tempfile::TempDir;

use mtg_stats::{
    auth::{password::hash_password, AuthConfig, TokenConfig},
    build_router,
    db::{MemoryDb, Repositories},
    files::LocalFileStore,
    user::{models::NewUser, repository::UserRepository},
    AppState, Clock, ManualClock,
};

pub const ADMIN_NAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "correct horse";
pub const API_TOKEN: &str = "static-api-token";

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub struct TestSetup {
    pub app: Router,
    pub state: AppState,
    pub db: MemoryDb,
    pub clock: Arc<ManualClock>,
    pub upload_dir: TempDir,
    /// Bearer token of the seeded admin user
    pub admin_token: String,
    /// Ids of the seeded players, in the order given to the builder
    pub players: Vec<i64>,
}

pub struct TestSetupBuilder {
    players: Vec<String>,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self { players: vec![] }
    }

    pub fn with_players(mut self, players: Vec<&str>) -> Self {
        self.players = players.into_iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_four_players(self) -> Self {
        self.with_players(vec!["alice", "bob", "charlie", "david"])
    }

    pub async fn build(self) -> TestSetup {
        let db = MemoryDb::new();
        let upload_dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0).unwrap(),
        ));
        let tokens = TokenConfig::new("integration-secret", 1);
        let auth = AuthConfig {
            api_token: Some(API_TOKEN.to_string()),
            tokens: Some(tokens.clone()),
        };

        let state = AppState::new(
            Repositories::in_memory_with(db.clone()),
            Arc::new(LocalFileStore::new(upload_dir.path())),
            clock.clone(),
            auth,
        );

        let admin = state
            .user_repository
            .create_user(
                &NewUser {
                    name: ADMIN_NAME.to_string(),
                    password_hash: Some(hash_password(ADMIN_PASSWORD).unwrap()),
                    is_admin: true,
                },
                clock.now(),
            )
            .await
            .unwrap();
        let admin_token = tokens.create_token(&admin).unwrap();

        let mut players = Vec::new();
        for name in &self.players {
            let user = state
                .user_repository
                .create_user(
                    &NewUser {
                        name: name.clone(),
                        password_hash: None,
                        is_admin: false,
                    },
                    clock.now(),
                )
                .await
                .unwrap();
            players.push(user.id);
        }

        let app = build_router(state.clone(), upload_dir.path());

        TestSetup {
            app,
            state,
            db,
            clock,
            upload_dir,
            admin_token,
            players,
        }
    }
}
