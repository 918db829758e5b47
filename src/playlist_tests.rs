// End-to-end curation runs against an in-memory library
// Each scenario builds a small catalog and listen log and checks the finished playlist

use crate::models::{Catalog, ListenEvent, Track};
use crate::playlist::source::MockMediaSource;
use crate::playlist::{CurationConfig, CurationError, Degradation, MediaSource, PlaylistCurator};

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    /// A library whose similar-track lookup returns an unknown id, then the next few tracks in listing order
    struct Library {
        tracks: Vec<Track>,
        events: Vec<ListenEvent>,
        history_fails: bool,
        neighbours: usize,
    }

    impl Library {
        fn new(tracks: Vec<Track>) -> Self {
            Library {
                tracks,
                events: Vec::new(),
                history_fails: false,
                neighbours: 0,
            }
        }
    }

    impl MediaSource for Library {
        fn fetch_catalog(&self) -> Result<Catalog> {
            Ok(Catalog::new(self.tracks.clone()))
        }

        fn fetch_listen_events(&self, _window_days: Option<u32>) -> Result<Vec<ListenEvent>> {
            if self.history_fails {
                return Err(anyhow::anyhow!("Playback Reporting returned HTTP 500"));
            }
            Ok(self.events.clone())
        }

        fn fetch_similar(&self, track_id: &str) -> Result<Vec<String>> {
            let Some(pos) = self.tracks.iter().position(|t| t.id == track_id) else {
                return Ok(Vec::new());
            };
            let mut similar = vec!["not-in-library".to_string()];
            similar.extend(
                (1..=self.neighbours)
                    .map(|offset| self.tracks[(pos + offset) % self.tracks.len()].id.clone()),
            );
            Ok(similar)
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn create_track(id: &str, duration_secs: f64, play_count: u32) -> Track {
        Track {
            id: id.to_string(),
            name: id.to_uppercase(),
            duration_secs,
            play_count,
            ..Default::default()
        }
    }

    fn event(track_id: &str, hours_ago: i64, played_secs: f64) -> ListenEvent {
        ListenEvent {
            timestamp: (now() - Duration::hours(hours_ago)).naive_utc(),
            track_id: track_id.to_string(),
            played_secs,
        }
    }

    /// Sixty tracks over six artists and twelve albums with a week of listening
    fn rich_library() -> Library {
        let tracks: Vec<Track> = (0..60)
            .map(|i| Track {
                album_id: Some(format!("album-{}", i / 5)),
                album_artist: Some(format!("Artist {}", i / 10)),
                is_favorite: i % 7 == 0,
                genres: vec!["Rock".to_string()],
                last_played: (i % 3 != 0).then(|| now() - Duration::hours(i64::from(i) * 5)),
                ..create_track(&format!("t{i:02}"), 150.0 + f64::from(i % 6) * 25.0, i % 12)
            })
            .collect();

        let mut events = Vec::new();
        for i in 0..40u32 {
            let track = &tracks[(i as usize * 7) % tracks.len()];
            let played = if i % 4 == 0 { 15.0 } else { track.duration_secs };
            events.push(event(&track.id, i64::from(i) * 3, played));
        }

        Library {
            tracks,
            events,
            history_fails: false,
            neighbours: 6,
        }
    }

    fn config_for(target_duration_secs: f64) -> CurationConfig {
        CurationConfig {
            target_duration_secs,
            ..Default::default()
        }
    }

    fn curate(
        library: &dyn MediaSource,
        config: CurationConfig,
        seed: u64,
    ) -> std::result::Result<crate::playlist::CuratedPlaylist, CurationError> {
        let mut rng = StdRng::seed_from_u64(seed);
        PlaylistCurator::new(config).curate_at(library, &mut rng, now())
    }

    #[test]
    fn test_playlist_has_no_duplicates() {
        let library = rich_library();
        for seed in 0..5 {
            let playlist = curate(&library, config_for(3600.0), seed).unwrap();
            let ids = playlist.track_ids();
            let unique: HashSet<&String> = ids.iter().collect();
            assert_eq!(unique.len(), ids.len(), "seed {seed} produced duplicates");
        }
    }

    #[test]
    fn test_playlist_fits_target_duration() {
        let library = rich_library();
        let target = 2700.0;
        for seed in 0..5 {
            let playlist = curate(&library, config_for(target), seed).unwrap();
            assert!(!playlist.tracks.is_empty());
            assert!(playlist.total_duration_secs() <= target);
            assert_eq!(playlist.report.final_len, playlist.tracks.len());
        }
    }

    #[test]
    fn test_playlist_tracks_come_from_catalog() {
        let library = rich_library();
        let known: HashSet<&str> = library.tracks.iter().map(|t| t.id.as_str()).collect();

        let playlist = curate(&library, config_for(3600.0), 11).unwrap();
        assert!(playlist.track_ids().iter().all(|id| known.contains(id.as_str())));
        assert!(playlist.report.degradations.iter().any(|d| matches!(
            d,
            Degradation::UnknownTrackIds { .. }
        )));
    }

    #[test]
    fn test_same_seed_same_playlist() {
        let library = rich_library();
        let first = curate(&library, config_for(3600.0), 42).unwrap();
        let second = curate(&library, config_for(3600.0), 42).unwrap();
        assert_eq!(first.track_ids(), second.track_ids());
    }

    #[test]
    fn test_history_drives_activity_ranking() {
        let library = rich_library();
        let playlist = curate(&library, config_for(3600.0), 3).unwrap();
        assert!(!playlist.report.used_fallback_ranking);
        assert!(!playlist.report.has(&Degradation::MissingHistory));
        assert!(playlist.report.shortlist_size > 0);
    }

    #[test]
    fn test_three_track_library_without_history() {
        let library = Library::new(vec![
            create_track("a", 180.0, 0),
            create_track("b", 200.0, 0),
            create_track("c", 220.0, 0),
        ]);

        let playlist = curate(&library, config_for(400.0), 9).unwrap();

        assert!(playlist.report.has(&Degradation::MissingHistory));
        assert!(playlist.report.used_fallback_ranking);
        let allowed: HashSet<&str> = ["a", "b", "c"].into_iter().collect();
        assert!(playlist.track_ids().iter().all(|id| allowed.contains(id.as_str())));
        assert!(!playlist.tracks.is_empty());
        assert!(playlist.total_duration_secs() <= 400.0);
    }

    #[test]
    fn test_skip_history_shapes_the_playlist() {
        // One small album, so album expansion pulls every track into the pool
        let tracks = [("finished", 1), ("skipped", 5), ("new-1", 0), ("new-2", 0)]
            .into_iter()
            .map(|(id, plays)| Track {
                album_id: Some("album-1".to_string()),
                album_artist: Some("Band".to_string()),
                ..create_track(id, 200.0, plays)
            })
            .collect();
        let mut library = Library::new(tracks);
        library.events = vec![
            event("skipped", 1, 20.0),
            event("finished", 2, 180.0),
            event("skipped", 3, 35.0),
            event("skipped", 4, 10.0),
            event("skipped", 30, 200.0),
        ];

        let playlist = curate(&library, config_for(10_000.0), 5).unwrap();
        let ids = playlist.track_ids();

        // One finished play is enough to keep a rarely played track
        assert!(ids.contains(&"finished".to_string()));
        // Three recent skips reject a track with several plays, older listens notwithstanding
        assert!(!ids.contains(&"skipped".to_string()));
        assert_eq!(playlist.report.skipped_in_head, 1);
        // Nothing similar to stuff with, so the playlist stays short
        assert!(playlist.report.degradations.iter().any(|d| matches!(
            d,
            Degradation::NonConvergence { .. }
        )));
    }

    #[test]
    fn test_empty_catalog_is_an_error() {
        let library = Library::new(Vec::new());
        let result = curate(&library, config_for(3600.0), 1);
        assert!(matches!(result, Err(CurationError::EmptyCatalog)));
    }

    #[test]
    fn test_catalog_failure_is_an_error() {
        let mut source = MockMediaSource::new();
        source
            .expect_fetch_catalog()
            .returning(|| Err(anyhow::anyhow!("connection refused")));

        let result = curate(&source, config_for(3600.0), 1);
        assert!(matches!(result, Err(CurationError::Catalog(_))));
    }

    #[test]
    fn test_failed_history_fetch_degrades() {
        let mut library = rich_library();
        library.history_fails = true;

        let playlist = curate(&library, config_for(1800.0), 8).unwrap();
        assert!(playlist.report.has(&Degradation::MissingHistory));
        assert!(playlist.report.used_fallback_ranking);
        assert_eq!(playlist.report.skipped_in_head, 0);
        assert!(!playlist.tracks.is_empty());
        assert!(playlist.total_duration_secs() <= 1800.0);
    }
}
