use axum::{
    body::Bytes,
    extract::State,
    http::header,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, instrument};

use super::service::{BackupService, EXPORT_FILE_NAME};
use crate::auth::RequireAdmin;
use crate::shared::{AppError, AppState};

fn service(state: &AppState) -> BackupService {
    BackupService::new(
        Arc::clone(&state.backup_repository),
        Arc::clone(&state.file_store),
    )
}

/// GET /api/export/all
#[instrument(name = "export_all", skip(state, admin), fields(admin_id = admin.id))]
pub async fn export_all(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
) -> Result<impl IntoResponse, AppError> {
    let archive = service(&state).export_archive().await?;
    let disposition = format!("attachment; filename=\"{}\"", EXPORT_FILE_NAME);
    Ok((
        [
            (header::CONTENT_TYPE, "application/gzip".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        archive,
    ))
}

/// POST /api/import/all
#[instrument(name = "import_all", skip(state, admin, body), fields(admin_id = admin.id))]
pub async fn import_all(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    if body.is_empty() {
        return Err(AppError::InvalidInput("Import body is empty".to_string()));
    }
    let summary = service(&state).import_archive(&body).await?;
    info!(admin_id = admin.id, "Data replaced from import");
    Ok(Json(json!({ "message": "Import complete", "imported": summary })))
}
