use super::config::{CurationConfig, ScoringWeights};
use crate::models::{ListenEvent, Track};
use chrono::{DateTime, Duration, Local, NaiveDateTime, Utc};
use std::collections::HashMap;

/// Recent-activity scoring over the listen log
pub struct ActivityScoring;

impl ActivityScoring {
    /// Events newer than `days` before `now`, or the newest `fallback` events when that window is empty
    pub fn recent_window(
        events: &[ListenEvent],
        days: u32,
        fallback: usize,
        now: NaiveDateTime,
    ) -> Vec<ListenEvent> {
        let cutoff = now - Duration::days(i64::from(days));
        let recent: Vec<ListenEvent> = events
            .iter()
            .filter(|event| event.timestamp > cutoff)
            .cloned()
            .collect();

        if !recent.is_empty() {
            return recent;
        }
        if !events.is_empty() {
            log::info!(
                "No plays in the last {days} days, falling back to the latest {} events",
                fallback.min(events.len())
            );
        }
        events.iter().take(fallback).cloned().collect()
    }

    /// Whole days between the last play and `now`; `None` when never played
    pub fn days_since_played(last_played: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<f64> {
        last_played.map(|played| now.signed_duration_since(played).num_days().max(0) as f64)
    }

    /// Logistic decay: 0.5 for a play today, approaching 0 as days grow
    pub fn recency(days_since_played: Option<f64>, decay_rate: f64) -> f64 {
        match days_since_played {
            Some(days) => 1.0 / (1.0 + (decay_rate * days).exp()),
            None => 0.0,
        }
    }

    /// Discount for tracks that are already heavily played
    pub fn popularity_decay(play_count: u32) -> f64 {
        1.0 / (1.0 + (1.0 + f64::from(play_count)).log2())
    }

    /// Weighted activity score; tracks under the play-count threshold score 0
    pub fn score(
        frequency: f64,
        play_count: u32,
        days_since_played: Option<f64>,
        weights: &ScoringWeights,
    ) -> f64 {
        if play_count < weights.min_play_count {
            return 0.0;
        }
        weights.frequency * frequency
            + weights.recency * Self::recency(days_since_played, weights.decay_rate)
            + weights.popularity_decay * Self::popularity_decay(play_count)
    }

    /// Recent event count per candidate divided by the largest count among them, in candidate order
    pub fn play_frequency(candidates: &[&Track], recent: &[ListenEvent]) -> Vec<f64> {
        let mut counts: HashMap<&str, u32> = candidates
            .iter()
            .map(|&track| (track.id.as_str(), 0))
            .collect();
        for event in recent {
            if let Some(count) = counts.get_mut(event.track_id.as_str()) {
                *count += 1;
            }
        }
        let max_count = counts.values().copied().max().unwrap_or(0);

        candidates
            .iter()
            .map(|track| match max_count {
                0 => 0.0,
                max => f64::from(counts[track.id.as_str()]) / f64::from(max),
            })
            .collect()
    }

    /// Activity-based ranks for `candidates`, in the same order
    pub fn activity_ranks(
        candidates: &[&Track],
        recent: &[ListenEvent],
        config: &CurationConfig,
        now: DateTime<Utc>,
    ) -> Vec<f64> {
        let frequencies = Self::play_frequency(candidates, recent);

        candidates
            .iter()
            .zip(frequencies)
            .map(|(track, frequency)| {
                let days = Self::days_since_played(track.last_played, now);
                Self::score(frequency, track.play_count, days, &config.scoring)
            })
            .collect()
    }

    /// The run clock as the server's local wall time, which is how Playback Reporting stamps events
    pub fn server_clock(now: DateTime<Utc>) -> NaiveDateTime {
        now.with_timezone(&Local).naive_local()
    }

    /// Ranks without any listen history: artist share of plays times the track's own plays
    pub fn fallback_ranks(candidates: &[&Track]) -> Vec<f64> {
        let mut artist_plays: HashMap<&str, u64> = HashMap::new();
        for track in candidates {
            if let Some(artist) = track.album_artist.as_deref() {
                *artist_plays.entry(artist).or_insert(0) += u64::from(track.play_count);
            }
        }
        let total: u64 = artist_plays.values().sum();

        candidates
            .iter()
            .map(|track| {
                let share = match track.album_artist.as_deref() {
                    Some(artist) if total > 0 => {
                        artist_plays.get(artist).copied().unwrap_or(0) as f64 / total as f64
                    }
                    _ => 0.0,
                };
                share * f64::from(track.play_count)
            })
            .collect()
    }
}
