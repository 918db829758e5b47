use crate::config::Config;
use crate::models::{
    Catalog, CreatePlaylistResponse, CustomQueryResponse, ItemsResponse, ListenEvent, Track,
    UserInfo,
};
use crate::playlist::MediaSource;
use anyhow::{Context, Result};
use serde_json::json;
use ureq::Agent;
use urlencoding::encode;

const CLIENT_NAME: &str = "DailyPlaylistCreator";
const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A blocking Jellyfin API client authenticated with an API key
pub struct JellyfinClient {
    agent: Agent,
    base_url: String,
    auth_header: String,
    user_id: String,
}

impl JellyfinClient {
    /// Create a client and resolve the configured user name to its id
    pub fn connect(config: &Config) -> Result<Self> {
        let mut client = JellyfinClient {
            agent: Agent::new(),
            base_url: config.server_url.clone(),
            auth_header: Self::auth_header(&config.api_key),
            user_id: String::new(),
        };
        client.user_id = client.resolve_user_id(&config.user_name)?;
        log::debug!("Resolved user '{}' to {}", config.user_name, client.user_id);
        Ok(client)
    }

    fn auth_header(api_key: &str) -> String {
        format!(
            "MediaBrowser Client=\"{CLIENT_NAME}\", Device=\"{CLIENT_NAME}\", Version=\"{CLIENT_VERSION}\", Token=\"{api_key}\""
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get(&self, path: &str) -> ureq::Request {
        self.agent
            .get(&self.url(path))
            .set("Authorization", &self.auth_header)
    }

    /// Look up a user id by name; an unknown name lists the users the server knows
    pub fn resolve_user_id(&self, user_name: &str) -> Result<String> {
        let users: Vec<UserInfo> = self
            .get("/Users")
            .call()
            .map_err(|e| anyhow::anyhow!("Failed to list users: {}", e))?
            .into_json()
            .context("Failed to parse user list")?;

        if let Some(user) = users.iter().find(|u| u.name == user_name) {
            return Ok(user.id.clone());
        }
        let known: Vec<&str> = users.iter().map(|u| u.name.as_str()).collect();
        Err(anyhow::anyhow!(
            "User '{}' not found. Available users: {}",
            user_name,
            known.join(", ")
        ))
    }

    /// Replace any playlist with the same name by a new one holding `track_ids`
    pub fn create_playlist(&self, name: &str, track_ids: &[String]) -> Result<String> {
        let existing: ItemsResponse = self
            .get(&format!(
                "/Users/{}/Items?IncludeItemTypes=Playlist&Recursive=true",
                encode(&self.user_id)
            ))
            .call()
            .map_err(|e| anyhow::anyhow!("Failed to list playlists: {}", e))?
            .into_json()
            .context("Failed to parse playlist list")?;

        for playlist in existing.items.iter().filter(|p| p.name == name) {
            log::info!("Playlist '{}' exists (ID: {}), deleting it", name, playlist.id);
            self.delete_item(&playlist.id)?;
        }

        log::info!("Creating playlist '{}' with {} tracks", name, track_ids.len());
        let created: CreatePlaylistResponse = self
            .agent
            .post(&self.url("/Playlists"))
            .set("Authorization", &self.auth_header)
            .send_json(json!({
                "Name": name,
                "Ids": track_ids,
                "UserId": self.user_id,
            }))
            .map_err(|e| anyhow::anyhow!("Failed to create playlist '{}': {}", name, e))?
            .into_json()
            .context("Failed to parse create playlist response")?;

        Ok(created.id)
    }

    fn delete_item(&self, item_id: &str) -> Result<()> {
        self.agent
            .delete(&self.url(&format!("/Items/{}", encode(item_id))))
            .set("Authorization", &self.auth_header)
            .call()
            .map_err(|e| anyhow::anyhow!("Failed to delete item {}: {}", item_id, e))?;
        Ok(())
    }

    fn listen_query(&self, window_days: Option<u32>) -> String {
        let window = window_days
            .map(|days| format!("AND DateCreated >= DATE(\"now\", \"-{days} days\") "))
            .unwrap_or_default();
        format!(
            "SELECT DateCreated, ItemId, PlayDuration FROM PlaybackActivity \
             WHERE UserId=\"{}\" AND ItemType=\"Audio\" {}ORDER BY DateCreated DESC",
            self.user_id.replace('"', ""),
            window
        )
    }
}

impl MediaSource for JellyfinClient {
    fn fetch_catalog(&self) -> Result<Catalog> {
        let response: ItemsResponse = self
            .get(&format!(
                "/Users/{}/Items?SortBy=Album,SortName&SortOrder=Ascending&IncludeItemTypes=Audio\
                 &Recursive=true&Fields=AudioInfo,ParentId,Path,Genres&StartIndex=0&ImageTypeLimit=1",
                encode(&self.user_id)
            ))
            .call()
            .map_err(|e| anyhow::anyhow!("Failed to fetch library items: {}", e))?
            .into_json()
            .context("Failed to parse library items")?;

        let missing_album = response.items.iter().filter(|i| i.album_id.is_none()).count();
        if missing_album > 0 {
            log::warn!("{missing_album} library items have no album id");
        }

        Ok(Catalog::new(
            response.items.into_iter().map(Track::from_item).collect(),
        ))
    }

    fn fetch_listen_events(&self, window_days: Option<u32>) -> Result<Vec<ListenEvent>> {
        let result = self
            .agent
            .post(&self.url("/user_usage_stats/submit_custom_query"))
            .set("Authorization", &self.auth_header)
            .send_json(json!({
                "CustomQueryString": self.listen_query(window_days),
                "ReplaceUserId": false,
            }));

        let response = match result {
            Ok(response) => response,
            Err(ureq::Error::Status(code, _)) => {
                log::warn!("Playback Reporting not available (HTTP {code}), skipping listen history");
                return Ok(Vec::new());
            }
            Err(e) => return Err(anyhow::anyhow!("Failed to query listen history: {}", e)),
        };

        let parsed: CustomQueryResponse = response
            .into_json()
            .context("Failed to parse listen history")?;
        let total = parsed.results.len();
        let events: Vec<ListenEvent> = parsed
            .results
            .iter()
            .filter_map(|row| ListenEvent::from_row(row))
            .collect();
        if events.len() < total {
            log::debug!("Skipped {} malformed listen rows", total - events.len());
        }
        Ok(events)
    }

    fn fetch_similar(&self, track_id: &str) -> Result<Vec<String>> {
        let response: ItemsResponse = self
            .get(&format!("/Items/{}/similar", encode(track_id)))
            .call()
            .map_err(|e| anyhow::anyhow!("Similar lookup failed: {}", e))?
            .into_json()
            .context("Failed to parse similar items")?;
        Ok(response.items.into_iter().map(|item| item.id).collect())
    }
}
