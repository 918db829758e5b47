use super::config::CurationConfig;
use super::scoring::ActivityScoring;
use crate::models::{Catalog, ListenEvent, Track};
use chrono::{DateTime, Utc};

/// A catalog track with its derived rank
#[derive(Debug, Clone, Copy)]
pub struct ScoredTrack<'a> {
    pub track: &'a Track,
    pub rank: f64,
}

/// The top-ranked recently played tracks that seed candidate generation
#[derive(Debug, Clone, Default)]
pub struct Shortlist<'a> {
    pub entries: Vec<ScoredTrack<'a>>,
    pub used_fallback: bool,
}

impl<'a> Shortlist<'a> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn tracks(&self) -> impl Iterator<Item = &'a Track> + '_ {
        self.entries.iter().map(|entry| entry.track)
    }
}

/// Ranking of the catalog into the shortlist
pub struct CandidateRanking;

impl CandidateRanking {
    /// The `limit` most recently played tracks, never-played tracks last, ties in catalog order
    pub fn most_recently_played(catalog: &Catalog, limit: usize) -> Vec<&Track> {
        let mut tracks: Vec<&Track> = catalog.tracks().iter().collect();
        // None sorts below Some, so descending order puts unplayed tracks last
        tracks.sort_by(|a, b| b.last_played.cmp(&a.last_played));
        tracks.truncate(limit);
        tracks
    }

    /// Score the candidate window and keep the best `shortlist_size` entries.
    ///
    /// With no recent events the artist-share fallback rank is used instead of
    /// the activity score.
    pub fn rank<'a>(
        catalog: &'a Catalog,
        recent: &[ListenEvent],
        config: &CurationConfig,
        now: DateTime<Utc>,
    ) -> Shortlist<'a> {
        let candidates = Self::most_recently_played(catalog, config.candidate_window);
        let used_fallback = recent.is_empty();

        let ranks = if used_fallback {
            ActivityScoring::fallback_ranks(&candidates)
        } else {
            ActivityScoring::activity_ranks(&candidates, recent, config, now)
        };

        let mut entries: Vec<ScoredTrack<'a>> = candidates
            .into_iter()
            .zip(ranks)
            .map(|(track, rank)| ScoredTrack { track, rank })
            .collect();

        // Stable, so equal ranks keep recency order
        entries.sort_by(|a, b| {
            b.rank
                .partial_cmp(&a.rank)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        entries.truncate(config.shortlist_size);

        log::debug!(
            "Shortlisted {} tracks ({} with a positive rank){}",
            entries.len(),
            entries.iter().filter(|entry| entry.rank > 0.0).count(),
            if used_fallback { " using fallback ranking" } else { "" }
        );

        Shortlist {
            entries,
            used_fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn played_track(id: usize, days_ago: Option<i64>, play_count: u32) -> Track {
        Track {
            id: format!("t{id}"),
            album_artist: Some(format!("Artist {}", id % 7)),
            play_count,
            duration_secs: 200.0,
            last_played: days_ago.map(|d| now() - Duration::days(d)),
            ..Default::default()
        }
    }

    #[test]
    fn test_most_recent_window_puts_unplayed_last() {
        let catalog = Catalog::new(vec![
            played_track(0, None, 0),
            played_track(1, Some(5), 3),
            played_track(2, Some(1), 3),
            played_track(3, None, 0),
        ]);
        let ids: Vec<_> = CandidateRanking::most_recently_played(&catalog, 10)
            .iter()
            .map(|t| t.id.clone())
            .collect();
        assert_eq!(ids, vec!["t2", "t1", "t0", "t3"]);
    }

    #[test]
    fn test_shortlist_capped_and_restricted_to_recent_window() {
        // 150 tracks; the oldest 50 have huge play counts but fall outside the window
        let tracks: Vec<_> = (0..150)
            .map(|i| played_track(i, Some(i as i64), if i >= 100 { 1000 } else { 5 }))
            .collect();
        let catalog = Catalog::new(tracks);
        let config = CurationConfig::default();

        let shortlist = CandidateRanking::rank(&catalog, &[], &config, now());
        assert!(shortlist.used_fallback);
        assert_eq!(shortlist.len(), 50);
        assert!(shortlist.tracks().all(|t| t.play_count == 5));
    }

    #[test]
    fn test_activity_ranking_prefers_recent_engagement() {
        let catalog = Catalog::new(vec![
            played_track(0, Some(1), 10),
            played_track(1, Some(1), 10),
            played_track(2, Some(1), 1),
        ]);
        let recent: Vec<_> = (0..4)
            .map(|i| ListenEvent {
                timestamp: (now() - Duration::hours(i + 1)).naive_utc(),
                track_id: "t1".to_string(),
                played_secs: 200.0,
            })
            .collect();

        let shortlist = CandidateRanking::rank(&catalog, &recent, &CurationConfig::default(), now());
        assert!(!shortlist.used_fallback);
        assert_eq!(shortlist.entries[0].track.id, "t1");
        // Below the play-count threshold
        let low = shortlist.entries.iter().find(|e| e.track.id == "t2").unwrap();
        assert_eq!(low.rank, 0.0);
    }

    #[test]
    fn test_ranking_is_deterministic() {
        let tracks: Vec<_> = (0..80).map(|i| played_track(i, Some((i % 9) as i64), (i % 13) as u32)).collect();
        let catalog = Catalog::new(tracks);
        let config = CurationConfig::default();
        let first: Vec<_> = CandidateRanking::rank(&catalog, &[], &config, now())
            .tracks()
            .map(|t| t.id.clone())
            .collect();
        let second: Vec<_> = CandidateRanking::rank(&catalog, &[], &config, now())
            .tracks()
            .map(|t| t.id.clone())
            .collect();
        assert_eq!(first, second);
    }
}
