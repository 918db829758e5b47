use super::candidates::CandidatePool;
use super::config::CurationConfig;
use super::filters::SkipFilter;
use super::metadata::{CurationReport, Degradation, SamplingStage};
use super::source::MediaSource;
use super::utils::dedupe_preserving_order;
use crate::models::{Catalog, ListenEvent};
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::HashSet;

/// Turns the candidate pool into a duplicate-free playlist of the target duration
pub struct PlaylistPruner<'a, S: MediaSource + ?Sized> {
    catalog: &'a Catalog,
    source: &'a S,
    history: &'a [ListenEvent],
    config: &'a CurationConfig,
}

impl<'a, S: MediaSource + ?Sized> PlaylistPruner<'a, S> {
    /// `history` is the full listen log, newest first; empty disables skip filtering
    pub fn new(
        catalog: &'a Catalog,
        source: &'a S,
        history: &'a [ListenEvent],
        config: &'a CurationConfig,
    ) -> Self {
        Self {
            catalog,
            source,
            history,
            config,
        }
    }

    pub fn prune<R: Rng + ?Sized>(
        &self,
        pool: CandidatePool,
        rng: &mut R,
        report: &mut CurationReport,
    ) -> Vec<String> {
        let mut ids = dedupe_preserving_order(pool.into_ids().as_slice());
        ids.retain(|id| self.catalog.contains(id));
        report.deduped_size = ids.len();

        self.drop_skipped_head(&mut ids, report);
        self.extend_to_target(&mut ids, rng, report);
        self.trim_to_target(&mut ids, report);
        ids
    }

    /// Remove head tracks the listen log says are habitually skipped
    pub fn drop_skipped_head(&self, ids: &mut Vec<String>, report: &mut CurationReport) {
        if self.history.is_empty() {
            return;
        }
        let rules = &self.config.skip;
        let head = self.config.sampling.protected_prefix.min(ids.len());

        let skipped: HashSet<String> = ids[..head]
            .iter()
            .filter_map(|id| self.catalog.get(id))
            .filter(|track| track.play_count >= rules.min_play_count)
            .filter(|track| !SkipFilter::keeps(track, self.history, rules))
            .map(|track| track.id.clone())
            .collect();

        if !skipped.is_empty() {
            log::debug!("Dropping {} skipped tracks from the playlist head", skipped.len());
            ids.retain(|id| !skipped.contains(id));
        }
        report.skipped_in_head = skipped.len();
    }

    /// Stuff with tracks similar to the leading entries until the target is reached.
    ///
    /// Each round takes one more similar track than the last. Stops early when
    /// the playlist is empty or too many consecutive rounds add nothing.
    pub fn extend_to_target<R: Rng + ?Sized>(
        &self,
        ids: &mut Vec<String>,
        rng: &mut R,
        report: &mut CurationReport,
    ) {
        let rules = &self.config.extension;
        let target = self.config.target_duration_secs;
        let filter_skipped = rules.filter_skipped && !self.history.is_empty();
        let max_stalled = rules.max_stalled_rounds.max(1);

        let mut present: HashSet<String> = ids.iter().cloned().collect();
        let mut total = self.catalog.total_duration(ids.as_slice());
        let mut take = rules.initial_take;
        let mut stalled = 0;
        let mut unknown = 0;

        while total < target {
            let seeds = &ids[..ids.len().min(rules.seed_prefix)];
            let Some(seed) = seeds.choose(rng).cloned() else {
                report.record(Degradation::NonConvergence {
                    shortfall_secs: target - total,
                });
                break;
            };
            report.extension_rounds += 1;

            let similar = match self.source.fetch_similar(&seed) {
                Ok(similar) => similar,
                Err(e) => {
                    log::debug!("Similar lookup for {seed} failed: {e:#}");
                    report.record(Degradation::SimilarLookupFailed { track_id: seed });
                    Vec::new()
                }
            };

            let mut added = Vec::new();
            for id in similar.into_iter().take(take) {
                if present.contains(&id) {
                    continue;
                }
                let Some(track) = self.catalog.get(&id) else {
                    unknown += 1;
                    continue;
                };
                if filter_skipped && !SkipFilter::keeps(track, self.history, &self.config.skip) {
                    continue;
                }
                present.insert(id.clone());
                total += track.duration_secs;
                added.push(id);
            }

            if added.is_empty() {
                stalled += 1;
                if stalled >= max_stalled {
                    report.record(Degradation::NonConvergence {
                        shortfall_secs: target - total,
                    });
                    break;
                }
            } else {
                stalled = 0;
                report.stuffed += added.len();
                ids.extend(added);
            }
            take += 1;
        }

        if unknown > 0 {
            report.record(Degradation::UnknownTrackIds {
                stage: SamplingStage::Stuffing,
                count: unknown,
            });
        }
        log::debug!(
            "Stuffed {} similar tracks over {} rounds",
            report.stuffed,
            report.extension_rounds
        );
    }

    /// Pop from the end until the playlist fits the target
    pub fn trim_to_target(&self, ids: &mut Vec<String>, report: &mut CurationReport) {
        let target = self.config.target_duration_secs;
        while self.catalog.total_duration(ids.as_slice()) > target {
            if ids.pop().is_none() {
                break;
            }
            report.trimmed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Track;
    use crate::playlist::source::MockMediaSource;
    use chrono::NaiveDate;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn track(id: &str, duration_secs: f64, play_count: u32) -> Track {
        Track {
            id: id.to_string(),
            duration_secs,
            play_count,
            ..Default::default()
        }
    }

    fn skip_event(track_id: &str, day: u32) -> ListenEvent {
        ListenEvent {
            timestamp: NaiveDate::from_ymd_opt(2024, 5, day)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            track_id: track_id.to_string(),
            played_secs: 5.0,
        }
    }

    fn config_with_target(target_duration_secs: f64) -> CurationConfig {
        CurationConfig {
            target_duration_secs,
            ..Default::default()
        }
    }

    fn pool(ids: &[&str]) -> CandidatePool {
        CandidatePool::new(ids.iter().map(|s| s.to_string()).collect(), 20)
    }

    #[test]
    fn test_dedupes_and_trims_from_the_end() {
        let catalog = Catalog::new(vec![track("a", 100.0, 0), track("b", 100.0, 0), track("c", 100.0, 0)]);
        let source = MockMediaSource::new();
        let config = config_with_target(250.0);
        let pruner = PlaylistPruner::new(&catalog, &source, &[], &config);

        let mut rng = StdRng::seed_from_u64(1);
        let mut report = CurationReport::default();
        let ids = pruner.prune(pool(&["a", "b", "a", "c", "b"]), &mut rng, &mut report);
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(report.deduped_size, 3);
        assert_eq!(report.trimmed, 1);
    }

    #[test]
    fn test_skipped_head_tracks_are_dropped() {
        let catalog = Catalog::new(vec![track("a", 100.0, 5), track("b", 100.0, 5), track("c", 100.0, 0)]);
        let history = vec![skip_event("a", 3), skip_event("a", 2), skip_event("a", 1)];
        let source = MockMediaSource::new();
        let config = config_with_target(200.0);
        let pruner = PlaylistPruner::new(&catalog, &source, &history, &config);

        let mut ids = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let mut report = CurationReport::default();
        pruner.drop_skipped_head(&mut ids, &mut report);
        // "b" has no events and five plays: also rejected; "c" has never been played
        assert_eq!(ids, vec!["c"]);
        assert_eq!(report.skipped_in_head, 2);
    }

    #[test]
    fn test_stuffing_reaches_target_without_duplicates() {
        let mut tracks = vec![track("seed", 100.0, 0)];
        tracks.extend((0..30).map(|i| track(&format!("s{i}"), 100.0, 0)));
        let catalog = Catalog::new(tracks);

        let mut source = MockMediaSource::new();
        source.expect_fetch_similar().returning(|_| {
            let mut ids = vec!["seed".to_string(), "unknown".to_string()];
            ids.extend((0..30).map(|i| format!("s{i}")));
            Ok(ids)
        });
        let config = config_with_target(1000.0);
        let pruner = PlaylistPruner::new(&catalog, &source, &[], &config);

        let mut rng = StdRng::seed_from_u64(2);
        let mut report = CurationReport::default();
        let ids = pruner.prune(pool(&["seed"]), &mut rng, &mut report);

        assert_eq!(catalog.total_duration(&ids), 1000.0);
        let unique: HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
        assert!(report.extension_rounds >= 1);
        assert!(!report
            .degradations
            .iter()
            .any(|d| matches!(d, Degradation::NonConvergence { .. })));
        assert!(report.degradations.iter().any(|d| matches!(
            d,
            Degradation::UnknownTrackIds { stage: SamplingStage::Stuffing, .. }
        )));
    }

    #[test]
    fn test_exhausted_similarity_terminates_under_length() {
        let catalog = Catalog::new(vec![track("a", 100.0, 0), track("b", 100.0, 0)]);
        let mut source = MockMediaSource::new();
        source
            .expect_fetch_similar()
            .returning(|_| Ok(vec!["b".to_string(), "a".to_string()]));
        let config = config_with_target(10_000.0);
        let pruner = PlaylistPruner::new(&catalog, &source, &[], &config);

        let mut rng = StdRng::seed_from_u64(3);
        let mut report = CurationReport::default();
        let ids = pruner.prune(pool(&["a"]), &mut rng, &mut report);

        assert_eq!(ids, vec!["a", "b"]);
        assert!(report.degradations.iter().any(|d| matches!(
            d,
            Degradation::NonConvergence { shortfall_secs } if (*shortfall_secs - 9_800.0).abs() < 1e-9
        )));
        assert!(report.extension_rounds <= 1 + config.extension.max_stalled_rounds);
    }

    #[test]
    fn test_failing_similarity_source_terminates() {
        let catalog = Catalog::new(vec![track("a", 100.0, 0)]);
        let mut source = MockMediaSource::new();
        source
            .expect_fetch_similar()
            .returning(|_| Err(anyhow::anyhow!("connection refused")));
        let config = config_with_target(500.0);
        let pruner = PlaylistPruner::new(&catalog, &source, &[], &config);

        let mut rng = StdRng::seed_from_u64(4);
        let mut report = CurationReport::default();
        let ids = pruner.prune(pool(&["a"]), &mut rng, &mut report);
        assert_eq!(ids, vec!["a"]);
        assert_eq!(report.extension_rounds, config.extension.max_stalled_rounds);
    }

    #[test]
    fn test_empty_pool_gives_empty_playlist() {
        let catalog = Catalog::new(vec![track("a", 100.0, 0)]);
        let source = MockMediaSource::new();
        let config = config_with_target(500.0);
        let pruner = PlaylistPruner::new(&catalog, &source, &[], &config);

        let mut rng = StdRng::seed_from_u64(5);
        let mut report = CurationReport::default();
        let ids = pruner.prune(pool(&[]), &mut rng, &mut report);
        assert!(ids.is_empty());
        assert!(matches!(report.degradations[..], [Degradation::NonConvergence { .. }]));
    }

    fn skipped_neighbour_setup() -> (Catalog, Vec<ListenEvent>, MockMediaSource) {
        let catalog = Catalog::new(vec![
            track("seed", 100.0, 0),
            track("skippy", 100.0, 5),
            track("ok", 100.0, 0),
        ]);
        let history = vec![skip_event("skippy", 3), skip_event("skippy", 2), skip_event("skippy", 1)];
        let mut source = MockMediaSource::new();
        source
            .expect_fetch_similar()
            .returning(|_| Ok(vec!["skippy".to_string(), "ok".to_string()]));
        (catalog, history, source)
    }

    #[test]
    fn test_stuffing_rejects_habitually_skipped_tracks() {
        let (catalog, history, source) = skipped_neighbour_setup();
        let config = config_with_target(300.0);
        let pruner = PlaylistPruner::new(&catalog, &source, &history, &config);

        let mut rng = StdRng::seed_from_u64(6);
        let mut report = CurationReport::default();
        let ids = pruner.prune(pool(&["seed"]), &mut rng, &mut report);

        assert_eq!(ids, vec!["seed", "ok"]);
        assert_eq!(report.stuffed, 1);
        assert!(report
            .degradations
            .iter()
            .any(|d| matches!(d, Degradation::NonConvergence { .. })));
    }

    #[test]
    fn test_stuffing_keeps_skipped_tracks_when_filter_disabled() {
        let (catalog, history, source) = skipped_neighbour_setup();
        let mut config = config_with_target(300.0);
        config.extension.filter_skipped = false;
        let pruner = PlaylistPruner::new(&catalog, &source, &history, &config);

        let mut rng = StdRng::seed_from_u64(6);
        let mut report = CurationReport::default();
        let ids = pruner.prune(pool(&["seed"]), &mut rng, &mut report);

        assert_eq!(ids, vec!["seed", "skippy", "ok"]);
        assert_eq!(report.stuffed, 2);
        assert!(report.degradations.is_empty());
    }
}
