use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use tracing::{debug, instrument, warn};

use super::types::Caller;
use crate::shared::{AppError, AppState};

/// Authentication middleware for `/api/*`.
/// Accepts either the static API token (no identity attached) or a user JWT
/// (a `Caller` is inserted into the request extensions).
/// Usage: .layer(middleware::from_fn_with_state(app_state.clone(), auth::authenticate))
#[instrument(skip(state, req, next), fields(uri = %req.uri()))]
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !state.auth.is_enabled() {
        return Ok(next.run(req).await);
    }

    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|header| header.to_str().ok())
        .ok_or_else(|| {
            warn!("Missing Authorization header in request");
            AppError::Unauthorized("Missing authorization header".to_string())
        })?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .ok_or_else(|| {
            warn!("Invalid Authorization header format (expected Bearer token)");
            AppError::Unauthorized("Use the format: Authorization: Bearer <token>".to_string())
        })?;

    if token.is_empty() {
        return Err(AppError::Unauthorized("Empty bearer token".to_string()));
    }

    if state.auth.api_token.as_deref() == Some(token) {
        debug!("Request authenticated with static API token");
        return Ok(next.run(req).await);
    }

    if let Some(tokens) = &state.auth.tokens {
        if let Ok(claims) = tokens.validate_token(token) {
            debug!(user_id = claims.user_id, "Request authenticated with user token");
            req.extensions_mut().insert(Caller::from(claims));
            return Ok(next.run(req).await);
        }
    }

    warn!("Bearer token rejected");
    Err(AppError::Unauthorized("Invalid token".to_string()))
}

/// Optional caller identity; anonymous requests yield `MaybeCaller(None)`
#[derive(Debug, Clone)]
pub struct MaybeCaller(pub Option<Caller>);

impl MaybeCaller {
    pub fn caller(&self) -> Option<&Caller> {
        self.0.as_ref()
    }
}

/// Requires a user identity (JWT), rejecting with 401 otherwise
#[derive(Debug, Clone)]
pub struct RequireUser(pub Caller);

/// Requires a caller with the admin flag; 401 without identity, 403 without the flag
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub Caller);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeCaller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeCaller(parts.extensions.get::<Caller>().cloned()))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Caller>()
            .cloned()
            .map(RequireUser)
            .ok_or_else(|| {
                AppError::Unauthorized(
                    "Sign in with a user account (POST /api/auth/login)".to_string(),
                )
            })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireUser(caller) = RequireUser::from_request_parts(parts, state).await?;
        if !caller.is_admin {
            warn!(user_id = caller.id, "Admin rights required");
            return Err(AppError::Forbidden("Administrator rights required".to_string()));
        }
        Ok(RequireAdmin(caller))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthConfig, TokenConfig};
    use crate::shared::test_utils::AppStateBuilder;
    use crate::user::models::UserModel;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use chrono::Utc;
    use tower::ServiceExt; // for `oneshot`

    async fn whoami(MaybeCaller(caller): MaybeCaller) -> String {
        caller.map(|c| c.name).unwrap_or_else(|| "anonymous".to_string())
    }

    async fn admin_only(RequireAdmin(caller): RequireAdmin) -> String {
        caller.name
    }

    fn app(auth: AuthConfig) -> Router {
        let state = AppStateBuilder::new().with_auth(auth).build();
        Router::new()
            .route("/whoami", get(whoami))
            .route("/admin", get(admin_only))
            .layer(middleware::from_fn_with_state(state.clone(), authenticate))
            .with_state(state)
    }

    fn token_for(config: &TokenConfig, is_admin: bool) -> String {
        let now = Utc::now();
        config
            .create_token(&UserModel {
                id: 3,
                name: "carol".to_string(),
                password_hash: None,
                is_admin,
                created_at: now,
                updated_at: now,
            })
            .unwrap()
    }

    fn enabled_auth() -> (AuthConfig, TokenConfig) {
        let tokens = TokenConfig::new("secret", 1);
        (
            AuthConfig {
                api_token: Some("static".to_string()),
                tokens: Some(tokens.clone()),
            },
            tokens,
        )
    }

    async fn call(app: Router, uri: &str, bearer: Option<&str>) -> (StatusCode, String) {
        let mut builder = HttpRequest::builder().uri(uri);
        if let Some(token) = bearer {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let response = app
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8_lossy(&body).to_string())
    }

    #[tokio::test]
    async fn test_open_api_when_auth_disabled() {
        let (status, body) = call(app(AuthConfig::disabled()), "/whoami", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "anonymous");
    }

    #[tokio::test]
    async fn test_missing_header_rejected() {
        let (auth, _) = enabled_auth();
        let (status, _) = call(app(auth), "/whoami", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_static_token_passes_without_identity() {
        let (auth, _) = enabled_auth();
        let (status, body) = call(app(auth.clone()), "/whoami", Some("static")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "anonymous");

        let (status, _) = call(app(auth), "/admin", Some("static")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_user_token_attaches_caller() {
        let (auth, tokens) = enabled_auth();
        let token = token_for(&tokens, false);
        let (status, body) = call(app(auth.clone()), "/whoami", Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "carol");

        let (status, _) = call(app(auth), "/admin", Some(&token)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_admin_token_reaches_admin_route() {
        let (auth, tokens) = enabled_auth();
        let token = token_for(&tokens, true);
        let (status, body) = call(app(auth), "/admin", Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "carol");
    }

    #[tokio::test]
    async fn test_garbage_token_rejected() {
        let (auth, _) = enabled_auth();
        let (status, _) = call(app(auth), "/whoami", Some("nope")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
