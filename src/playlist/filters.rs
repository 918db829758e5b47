use super::config::SkipRules;
use crate::models::{ListenEvent, Track};

/// How a single playback ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenOutcome {
    Listen,
    Skip,
}

/// Skip detection from the playback log using static helper functions
pub struct SkipFilter;

impl SkipFilter {
    /// A playback counts as a listen when it covered at least `listen_fraction` of the track
    pub fn classify(duration_secs: f64, played_secs: f64, rules: &SkipRules) -> ListenOutcome {
        if duration_secs.min(played_secs) >= duration_secs * rules.listen_fraction {
            ListenOutcome::Listen
        } else {
            ListenOutcome::Skip
        }
    }

    /// Decide whether the user actually listens to a track.
    ///
    /// `events` must be ordered newest first. Returns `false` when the track
    /// looks habitually skipped.
    pub fn is_listened(
        track_id: &str,
        play_count: u32,
        duration_secs: f64,
        events: &[ListenEvent],
        rules: &SkipRules,
    ) -> bool {
        // Without any history there is nothing to judge by
        if events.is_empty() {
            return true;
        }

        let outcomes: Vec<ListenOutcome> = events
            .iter()
            .filter(|event| event.track_id == track_id)
            .map(|event| Self::classify(duration_secs, event.played_secs, rules))
            .collect();

        // No matching plays: only forgiven while the lifetime count is too low to judge
        let Some(latest) = outcomes.first() else {
            return play_count < rules.low_evidence_play_count;
        };

        // Listened last time: probably liked, at worst a false positive
        if *latest == ListenOutcome::Listen {
            return true;
        }

        if outcomes
            .iter()
            .take(rules.skip_streak.max(1))
            .all(|outcome| *outcome == ListenOutcome::Skip)
        {
            return false;
        }

        // Majority of all plays, ties go to listened
        let listens = outcomes
            .iter()
            .filter(|outcome| **outcome == ListenOutcome::Listen)
            .count();
        listens * 2 >= outcomes.len()
    }

    /// Convenience wrapper over [`SkipFilter::is_listened`] for catalog tracks
    pub fn keeps(track: &Track, events: &[ListenEvent], rules: &SkipRules) -> bool {
        Self::is_listened(
            &track.id,
            track.play_count,
            track.duration_secs,
            events,
            rules,
        )
    }
}
