use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid Riot ID format. Use format: Name#TAG")]
    InvalidRiotId,

    #[error("Player not found: {0}")]
    PlayerNotFound(String),

    #[error("No ranked games found for this player")]
    NoRankedGames,

    #[error("API key rejected (HTTP 403) - check RIOT_API_KEY")]
    ApiKeyRejected,

    #[error("Rate limit retries exhausted")]
    RateLimited,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Cache store error: {0}")]
    StoreError(String),
}
