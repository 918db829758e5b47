use super::candidates::CandidateGenerator;
use super::config::CurationConfig;
use super::metadata::{CuratedPlaylist, CurationReport, Degradation};
use super::pruning::PlaylistPruner;
use super::ranking::CandidateRanking;
use super::scoring::ActivityScoring;
use super::source::MediaSource;
use chrono::{DateTime, Utc};
use rand::Rng;
use thiserror::Error;

/// Conditions that abort a curation run
#[derive(Debug, Error)]
pub enum CurationError {
    #[error("failed to fetch the track catalog")]
    Catalog(#[source] anyhow::Error),

    #[error("the track catalog is empty")]
    EmptyCatalog,
}

/// Main playlist curator
pub struct PlaylistCurator {
    config: CurationConfig,
}

impl PlaylistCurator {
    pub fn new(config: CurationConfig) -> Self {
        Self { config }
    }

    /// Curate a playlist with the wall clock as "now"
    pub fn curate<S, R>(&self, source: &S, rng: &mut R) -> Result<CuratedPlaylist, CurationError>
    where
        S: MediaSource + ?Sized,
        R: Rng + ?Sized,
    {
        self.curate_at(source, rng, Utc::now())
    }

    /// Run the full pipeline: rank, generate candidates, prune and fit to the target duration
    pub fn curate_at<S, R>(
        &self,
        source: &S,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Result<CuratedPlaylist, CurationError>
    where
        S: MediaSource + ?Sized,
        R: Rng + ?Sized,
    {
        let catalog = source.fetch_catalog().map_err(CurationError::Catalog)?;
        if catalog.is_empty() {
            return Err(CurationError::EmptyCatalog);
        }
        log::info!("Loaded {} tracks", catalog.len());

        let mut report = CurationReport::default();

        let mut history = match source.fetch_listen_events(None) {
            Ok(events) => events,
            Err(e) => {
                log::warn!("Listen history unavailable: {e:#}");
                Vec::new()
            }
        };
        history.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        if history.is_empty() {
            report.record(Degradation::MissingHistory);
        } else {
            log::info!("Loaded {} listen events", history.len());
        }

        let recent = ActivityScoring::recent_window(
            &history,
            self.config.recent_window_days,
            self.config.fallback_event_count,
            ActivityScoring::server_clock(now),
        );

        let shortlist = CandidateRanking::rank(&catalog, &recent, &self.config, now);
        report.used_fallback_ranking = shortlist.used_fallback;
        report.shortlist_size = shortlist.len();

        let generator = CandidateGenerator::new(&catalog, source, &self.config.sampling);
        let pool = generator.generate(&shortlist, rng, &mut report);
        report.pool_size = pool.len();

        let pruner = PlaylistPruner::new(&catalog, source, &history, &self.config);
        let ids = pruner.prune(pool, rng, &mut report);

        let tracks: Vec<_> = ids
            .iter()
            .filter_map(|id| catalog.get(id))
            .cloned()
            .collect();
        report.final_len = tracks.len();
        report.final_duration_secs = tracks.iter().map(|t| t.duration_secs).sum();

        log::info!(
            "Final playlist has {} items and is {:.2} hours long",
            report.final_len,
            report.final_duration_secs / 3600.0
        );

        Ok(CuratedPlaylist { tracks, report })
    }
}
