use crate::models::{Catalog, ListenEvent};
use anyhow::Result;

/// Data the curator pulls from the media server.
///
/// Implemented by the Jellyfin client; tests substitute fixtures or mocks.
#[cfg_attr(test, mockall::automock)]
pub trait MediaSource {
    /// Full track catalog for the current user
    fn fetch_catalog(&self) -> Result<Catalog>;

    /// Listen events newest first; `None` returns the whole history
    fn fetch_listen_events(&self, window_days: Option<u32>) -> Result<Vec<ListenEvent>>;

    /// Ids the server considers similar to `track_id`, in server order
    fn fetch_similar(&self, track_id: &str) -> Result<Vec<String>>;
}
