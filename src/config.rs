use crate::error::AppError;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub routing: String,
    pub remote_store: Option<RemoteStoreConfig>,
}

/// GitHub-backed cache store settings. Present only when both a token and a
/// target repository are configured.
#[derive(Debug, Clone)]
pub struct RemoteStoreConfig {
    pub token: String,
    pub repo: String,
    pub path: String,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let api_key = env::var("RIOT_API_KEY").map_err(|_| {
            AppError::ConfigError("RIOT_API_KEY not found in .env file".to_string())
        })?;

        let routing = env::var("RIOT_ROUTING").unwrap_or_else(|_| "europe".to_string());

        let remote_store = match (env::var("GITHUB_TOKEN"), env::var("GITHUB_REPO")) {
            (Ok(token), Ok(repo)) => Some(RemoteStoreConfig {
                token,
                repo,
                path: env::var("CACHE_FILE_PATH")
                    .unwrap_or_else(|_| "synergy_cache.json".to_string()),
            }),
            _ => None,
        };

        Ok(Config {
            api_key,
            routing,
            remote_store,
        })
    }
}
