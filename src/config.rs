use crate::playlist::CurationConfig;
use anyhow::{Context, Result};

const DEFAULT_PLAYLIST_NAME: &str = "Daily Random Playlist";

/// Configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub server_url: String,
    pub user_name: String,
    pub playlist_hours: Option<f64>, // unset keeps the curation config's target
    pub playlist_name: String,
    pub recency_days: Option<u32>,
}

impl Config {
    /// Apply the length and recency overrides that were actually given; `hours` is the CLI flag
    pub fn apply_overrides(&self, curation: CurationConfig, hours: Option<f64>) -> CurationConfig {
        let mut curation = match hours.or(self.playlist_hours) {
            Some(hours) => curation.with_target_hours(hours),
            None => curation,
        };
        if let Some(days) = self.recency_days {
            curation.recent_window_days = days;
        }
        curation
    }
}

/// Load configuration from `.env` and environment
pub fn load_config() -> Result<Config> {
    // Load `.env` file if present
    dotenv::dotenv().ok();
    from_lookup(|key| std::env::var(key).ok())
}

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    lookup(key).filter(|v| !v.is_empty()).with_context(|| {
        format!(
            "{key} is not set. Copy .example.env to .env and fill in API_KEY, JELLYFIN_IP and USER_NAME"
        )
    })
}

/// Build the configuration from any key lookup, environment or otherwise
pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Config> {
    let api_key = required(&lookup, "API_KEY")?;
    let server_url = required(&lookup, "JELLYFIN_IP")?
        .trim_end_matches('/')
        .to_string();
    let user_name = required(&lookup, "USER_NAME")?;

    let playlist_hours = match lookup("PLAYLIST_LENGTH") {
        Some(raw) => Some(
            raw.trim()
                .parse()
                .with_context(|| format!("PLAYLIST_LENGTH must be a number of hours, got '{raw}'"))?,
        ),
        None => None,
    };
    let recency_days = match lookup("RECENCY_DAYS") {
        Some(raw) => Some(raw.trim().parse().with_context(|| {
            format!("RECENCY_DAYS must be a whole number of days, got '{raw}'")
        })?),
        None => None,
    };
    let playlist_name = lookup("PLAYLIST_NAME")
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_PLAYLIST_NAME.to_string());

    Ok(Config {
        api_key,
        server_url,
        user_name,
        playlist_hours,
        playlist_name,
        recency_days,
    })
}
