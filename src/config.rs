use std::path::PathBuf;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_UPLOAD_DIR: &str = "./uploads";
const DEFAULT_TOKEN_EXPIRATION_HOURS: i64 = 24 * 7;
const DEFAULT_ADMIN_NAME: &str = "admin";

/// Process configuration, read once from the environment at startup
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// PostgreSQL DSN. `None` runs the server on in-memory repositories.
    pub database_url: Option<String>,
    pub bind_addr: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    pub api_token: Option<String>,
    pub jwt_secret: Option<String>,
    pub token_expiration_hours: i64,
    /// Administrator created at startup when `ADMIN_PASSWORD` is set
    pub admin_name: String,
    pub admin_password: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_token = get("API_TOKEN");
        // JWT_SECRET falls back to API_TOKEN so a single secret is enough
        let jwt_secret = get("JWT_SECRET").or_else(|| api_token.clone());

        Self {
            database_url: get("DATABASE_URL"),
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: get("PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            upload_dir: get("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR)),
            api_token,
            jwt_secret,
            token_expiration_hours: get("TOKEN_EXPIRATION_HOURS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_TOKEN_EXPIRATION_HOURS),
            admin_name: get("ADMIN_NAME").unwrap_or_else(|| DEFAULT_ADMIN_NAME.to_string()),
            admin_password: get("ADMIN_PASSWORD"),
        }
    }

    /// Name and password of the administrator to seed, if one is configured
    pub fn bootstrap_admin(&self) -> Option<(&str, &str)> {
        self.admin_password
            .as_deref()
            .map(|password| (self.admin_name.as_str(), password))
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}
