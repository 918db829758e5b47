use crate::models::Track;
use std::fmt;

/// Pool-building stage, used to attribute degradations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingStage {
    WeightedShortlist,
    Similar,
    TopArtists,
    ShortlistDraws,
    Favorites,
    ArtistExpansion,
    AlbumExpansion,
    EstablishedBand,
    FreshBand,
    Stuffing,
}

impl fmt::Display for SamplingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SamplingStage::WeightedShortlist => "weighted shortlist sample",
            SamplingStage::Similar => "similar tracks",
            SamplingStage::TopArtists => "top artists",
            SamplingStage::ShortlistDraws => "shortlist draws",
            SamplingStage::Favorites => "favorites",
            SamplingStage::ArtistExpansion => "artist expansion",
            SamplingStage::AlbumExpansion => "album expansion",
            SamplingStage::EstablishedBand => "established play-count band",
            SamplingStage::FreshBand => "fresh play-count band",
            SamplingStage::Stuffing => "similar-track stuffing",
        };
        f.write_str(name)
    }
}

/// A recoverable condition that made the playlist less rich without aborting the run
#[derive(Debug, Clone, PartialEq)]
pub enum Degradation {
    /// No listen events at all; fallback ranking used and skip filtering disabled
    MissingHistory,
    /// A stage's source set was empty
    EmptySubset(SamplingStage),
    /// Ids returned by a lookup were absent from the catalog and dropped
    UnknownTrackIds { stage: SamplingStage, count: usize },
    /// A similar-track lookup failed and contributed nothing
    SimilarLookupFailed { track_id: String },
    /// Stuffing gave up before reaching the target
    NonConvergence { shortfall_secs: f64 },
}

impl fmt::Display for Degradation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Degradation::MissingHistory => write!(f, "no listen history available"),
            Degradation::EmptySubset(stage) => write!(f, "{stage}: nothing to draw from"),
            Degradation::UnknownTrackIds { stage, count } => {
                write!(f, "{stage}: dropped {count} ids unknown to the catalog")
            }
            Degradation::SimilarLookupFailed { track_id } => {
                write!(f, "similar-track lookup failed for {track_id}")
            }
            Degradation::NonConvergence { shortfall_secs } => {
                write!(f, "playlist stays {:.0}s short of the target", shortfall_secs)
            }
        }
    }
}

/// Diagnostic counts for one curation run
#[derive(Debug, Clone, Default)]
pub struct CurationReport {
    pub used_fallback_ranking: bool,
    pub shortlist_size: usize,
    pub pool_size: usize,
    pub deduped_size: usize,
    pub skipped_in_head: usize,
    pub extension_rounds: usize,
    pub stuffed: usize,
    pub trimmed: usize,
    pub final_len: usize,
    pub final_duration_secs: f64,
    pub degradations: Vec<Degradation>,
}

impl CurationReport {
    pub fn record(&mut self, degradation: Degradation) {
        log::warn!("{degradation}");
        self.degradations.push(degradation);
    }

    pub fn has(&self, degradation: &Degradation) -> bool {
        self.degradations.contains(degradation)
    }
}

/// Final ordered playlist plus how it was produced
#[derive(Debug, Clone)]
pub struct CuratedPlaylist {
    pub tracks: Vec<Track>,
    pub report: CurationReport,
}

impl CuratedPlaylist {
    pub fn track_ids(&self) -> Vec<String> {
        self.tracks.iter().map(|track| track.id.clone()).collect()
    }

    pub fn total_duration_secs(&self) -> f64 {
        self.tracks.iter().map(|track| track.duration_secs).sum()
    }
}
