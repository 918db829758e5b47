use anyhow::{Context, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Tunable constants for one curation run.
/// Every field has a default, so a JSON file only needs the values it overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CurationConfig {
    pub target_duration_secs: f64,
    pub recent_window_days: u32,
    pub fallback_event_count: usize, // events used when the recent window is empty
    pub candidate_window: usize,     // most recently played tracks considered for ranking
    pub shortlist_size: usize,
    pub scoring: ScoringWeights,
    pub sampling: SamplingRules,
    pub skip: SkipRules,
    pub extension: ExtensionRules,
}

/// Weights and constants of the activity score
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub frequency: f64,
    pub recency: f64,
    pub popularity_decay: f64,
    pub decay_rate: f64,     // k in 1 / (1 + e^(k * days))
    pub min_play_count: u32, // tracks below this score 0
}

/// Inclusive range for a random draw count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountRange {
    pub min: usize,
    pub max: usize,
}

impl CountRange {
    pub const fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    /// Draw a count uniformly from `min..=max`; an inverted range yields `min`
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        if self.max <= self.min {
            return self.min;
        }
        rng.gen_range(self.min..=self.max)
    }
}

/// Play-count band with exclusive bounds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayCountBand {
    pub above: i64,
    pub below: i64,
    pub draws: CountRange,
}

impl PlayCountBand {
    pub fn contains(&self, play_count: u32) -> bool {
        let play_count = i64::from(play_count);
        play_count > self.above && play_count < self.below
    }
}

/// Sizes of the candidate generation stages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingRules {
    pub weighted_sample_size: usize,
    pub similar_per_track: usize,
    pub top_artist_count: usize,
    pub top_artist_draws: CountRange,
    pub shortlist_draws: CountRange,
    pub max_favorite_draws: usize,
    pub attribute_draws: CountRange, // per artist and per album found in the pool
    pub established_band: PlayCountBand,
    pub fresh_band: PlayCountBand,
    pub protected_prefix: usize, // entries kept in generation order
}

/// Listen/skip classification thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SkipRules {
    pub listen_fraction: f64,        // share of the track that counts as a listen
    pub min_play_count: u32,         // head tracks below this are never checked
    pub skip_streak: usize,          // unanimous recent skips that reject a track
    pub low_evidence_play_count: u32, // below this, a track absent from the log is kept
}

/// Similar-track stuffing used to reach the target duration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtensionRules {
    pub seed_prefix: usize,   // seeds are drawn from this many leading entries
    pub initial_take: usize,  // similar tracks taken in the first round
    pub filter_skipped: bool, // apply the skip heuristic to stuffed tracks
    pub max_stalled_rounds: usize,
}

impl Default for CurationConfig {
    fn default() -> Self {
        Self {
            target_duration_secs: 6.0 * 60.0 * 60.0,
            recent_window_days: 7,
            fallback_event_count: 100,
            candidate_window: 100,
            shortlist_size: 50,
            scoring: ScoringWeights::default(),
            sampling: SamplingRules::default(),
            skip: SkipRules::default(),
            extension: ExtensionRules::default(),
        }
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            frequency: 0.60,
            recency: 0.25,
            popularity_decay: 0.15,
            decay_rate: 0.5,
            min_play_count: 3,
        }
    }
}

impl Default for SamplingRules {
    fn default() -> Self {
        Self {
            weighted_sample_size: 20,
            similar_per_track: 3,
            top_artist_count: 5,
            top_artist_draws: CountRange::new(3, 5),
            shortlist_draws: CountRange::new(5, 8),
            max_favorite_draws: 5,
            attribute_draws: CountRange::new(7, 10),
            established_band: PlayCountBand {
                above: 3,
                below: 99,
                draws: CountRange::new(10, 15),
            },
            fresh_band: PlayCountBand {
                above: -1,
                below: 5,
                draws: CountRange::new(5, 10),
            },
            protected_prefix: 20,
        }
    }
}

impl Default for SkipRules {
    fn default() -> Self {
        Self {
            listen_fraction: 0.8,
            min_play_count: 1,
            skip_streak: 3,
            low_evidence_play_count: 3,
        }
    }
}

impl Default for ExtensionRules {
    fn default() -> Self {
        Self {
            seed_prefix: 10,
            initial_take: 5,
            filter_skipped: true,
            max_stalled_rounds: 25,
        }
    }
}

impl CurationConfig {
    /// Load a configuration from a JSON file
    pub fn load_from_file(path: &str) -> Result<CurationConfig> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read curation config '{path}'"))?;
        let config: CurationConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse curation config '{path}'"))?;
        Ok(config)
    }

    /// Target expressed in hours, as `PLAYLIST_LENGTH` is
    pub fn with_target_hours(mut self, hours: f64) -> Self {
        self.target_duration_secs = hours * 60.0 * 60.0;
        self
    }
}
