use super::config::{PlayCountBand, SamplingRules};
use super::metadata::{CurationReport, Degradation, SamplingStage};
use super::ranking::{ScoredTrack, Shortlist};
use super::source::MediaSource;
use super::utils::{Sampling, unique_in_order};
use crate::models::{Catalog, Track};
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::HashMap;

/// Oversized, ordered candidate list; the first `protected` ids keep generation order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidatePool {
    ids: Vec<String>,
    protected: usize,
}

impl CandidatePool {
    pub fn new(ids: Vec<String>, protected: usize) -> Self {
        Self { ids, protected }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn head(&self) -> &[String] {
        &self.ids[..self.protected.min(self.ids.len())]
    }

    /// Shuffle the unprotected tail; pools no longer than the head are left alone
    pub fn shuffle_tail<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        Sampling::shuffle_after(&mut self.ids, self.protected, rng);
    }

    pub fn into_ids(self) -> Vec<String> {
        self.ids
    }
}

/// Expands the shortlist into a candidate pool with several independent sampling stages
pub struct CandidateGenerator<'a, S: MediaSource + ?Sized> {
    catalog: &'a Catalog,
    source: &'a S,
    rules: &'a SamplingRules,
    by_artist: HashMap<&'a str, Vec<&'a Track>>,
    by_album: HashMap<&'a str, Vec<&'a Track>>,
    favorites: Vec<&'a Track>,
}

impl<'a, S: MediaSource + ?Sized> CandidateGenerator<'a, S> {
    pub fn new(catalog: &'a Catalog, source: &'a S, rules: &'a SamplingRules) -> Self {
        let mut by_artist: HashMap<&str, Vec<&Track>> = HashMap::new();
        let mut by_album: HashMap<&str, Vec<&Track>> = HashMap::new();
        for track in catalog.tracks() {
            if let Some(artist) = track.album_artist.as_deref() {
                by_artist.entry(artist).or_default().push(track);
            }
            if let Some(album) = track.album_id.as_deref() {
                by_album.entry(album).or_default().push(track);
            }
        }
        let favorites = catalog.tracks().iter().filter(|t| t.is_favorite).collect();

        Self {
            catalog,
            source,
            rules,
            by_artist,
            by_album,
            favorites,
        }
    }

    /// Build the pool stage by stage, then shuffle everything past the protected head
    pub fn generate<R: Rng + ?Sized>(
        &self,
        shortlist: &Shortlist<'_>,
        rng: &mut R,
        report: &mut CurationReport,
    ) -> CandidatePool {
        let mut ids = Vec::new();

        let weighted = self.weighted_sample(shortlist, rng, report);
        log::debug!("Weighted shortlist sample: {} tracks", weighted.len());
        ids.extend(weighted);

        let similar = self.similar_to_shortlist(shortlist, report);
        log::debug!("Similar to shortlist: {} tracks", similar.len());
        ids.extend(similar);

        let top_artists = self.top_artist_tracks(shortlist, rng, report);
        log::debug!("Top artist draws: {} tracks", top_artists.len());
        ids.extend(top_artists);

        let shortlist_draws = self.shortlist_draws(shortlist, rng, report);
        ids.extend(shortlist_draws);

        let favorites = self.favorite_draws(rng, report);
        log::debug!("Favorite draws: {} tracks", favorites.len());
        ids.extend(favorites);

        let expansion = self.attribute_expansion(&ids, rng, report);
        log::debug!("Artist and album expansion: {} tracks", expansion.len());
        ids.extend(expansion);

        let established = self.band_draws(
            &self.rules.established_band,
            SamplingStage::EstablishedBand,
            rng,
            report,
        );
        ids.extend(established);
        let fresh = self.band_draws(&self.rules.fresh_band, SamplingStage::FreshBand, rng, report);
        ids.extend(fresh);

        let mut pool = CandidatePool::new(ids, self.rules.protected_prefix);
        pool.shuffle_tail(rng);
        log::info!(
            "Candidate pool has {} items before pruning ({} in generation order)",
            pool.len(),
            pool.head().len()
        );
        pool
    }

    /// Rank-weighted sample without replacement from the positively ranked shortlist
    pub fn weighted_sample<R: Rng + ?Sized>(
        &self,
        shortlist: &Shortlist<'_>,
        rng: &mut R,
        report: &mut CurationReport,
    ) -> Vec<String> {
        let ranked: Vec<&ScoredTrack<'_>> = shortlist
            .entries
            .iter()
            .filter(|entry| entry.rank > 0.0)
            .collect();
        let size = self.rules.weighted_sample_size.min(ranked.len());
        if size == 0 {
            report.record(Degradation::EmptySubset(SamplingStage::WeightedShortlist));
            return Vec::new();
        }

        match ranked.choose_multiple_weighted(rng, size, |entry| entry.rank) {
            Ok(picked) => picked.map(|entry| entry.track.id.clone()).collect(),
            Err(e) => {
                log::warn!("Weighted shortlist sample failed: {e}");
                Vec::new()
            }
        }
    }

    /// The first few similar tracks of every shortlisted track, in server order
    pub fn similar_to_shortlist(
        &self,
        shortlist: &Shortlist<'_>,
        report: &mut CurationReport,
    ) -> Vec<String> {
        let mut similar = Vec::new();
        let mut unknown = 0;

        for track in shortlist.tracks() {
            match self.source.fetch_similar(&track.id) {
                Ok(found) => {
                    for id in found.into_iter().take(self.rules.similar_per_track) {
                        if self.catalog.contains(&id) {
                            similar.push(id);
                        } else {
                            unknown += 1;
                        }
                    }
                }
                Err(e) => {
                    log::debug!("Similar lookup for {} failed: {e:#}", track.id);
                    report.record(Degradation::SimilarLookupFailed {
                        track_id: track.id.clone(),
                    });
                }
            }
        }

        if unknown > 0 {
            report.record(Degradation::UnknownTrackIds {
                stage: SamplingStage::Similar,
                count: unknown,
            });
        }
        similar
    }

    /// Catalog draws for the artists that appear most often in the shortlist
    pub fn top_artist_tracks<R: Rng + ?Sized>(
        &self,
        shortlist: &Shortlist<'_>,
        rng: &mut R,
        report: &mut CurationReport,
    ) -> Vec<String> {
        let artists = unique_in_order(shortlist.tracks().filter_map(|t| t.album_artist.as_deref()));
        if artists.is_empty() {
            report.record(Degradation::EmptySubset(SamplingStage::TopArtists));
            return Vec::new();
        }

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for artist in shortlist.tracks().filter_map(|t| t.album_artist.as_deref()) {
            *counts.entry(artist).or_insert(0) += 1;
        }
        let mut ranked = artists;
        // Stable: equal counts stay in order of first appearance
        ranked.sort_by(|a, b| counts[b].cmp(&counts[a]));
        ranked.truncate(self.rules.top_artist_count);

        let mut picked = Vec::new();
        for artist in ranked {
            let tracks = self.artist_tracks(artist);
            let count = self.rules.top_artist_draws.sample(rng);
            picked.extend(Sampling::draw(tracks, count, rng).into_iter().map(|t| t.id.clone()));
        }
        picked
    }

    /// Plain uniform draws from the shortlist
    pub fn shortlist_draws<R: Rng + ?Sized>(
        &self,
        shortlist: &Shortlist<'_>,
        rng: &mut R,
        report: &mut CurationReport,
    ) -> Vec<String> {
        if shortlist.is_empty() {
            report.record(Degradation::EmptySubset(SamplingStage::ShortlistDraws));
            return Vec::new();
        }
        let count = self.rules.shortlist_draws.sample(rng);
        (0..count)
            .filter_map(|_| shortlist.entries.choose(rng))
            .map(|entry| entry.track.id.clone())
            .collect()
    }

    /// Up to `max_favorite_draws` draws from the user's favorites
    pub fn favorite_draws<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        report: &mut CurationReport,
    ) -> Vec<String> {
        if self.favorites.is_empty() {
            report.record(Degradation::EmptySubset(SamplingStage::Favorites));
            return Vec::new();
        }
        let count = rng.gen_range(0..=self.rules.max_favorite_draws.min(self.favorites.len()));
        Sampling::draw(&self.favorites, count, rng)
            .into_iter()
            .map(|t| t.id.clone())
            .collect()
    }

    /// For every artist and album already in the pool, more tracks from the same artist or album
    pub fn attribute_expansion<R: Rng + ?Sized>(
        &self,
        pool: &[String],
        rng: &mut R,
        report: &mut CurationReport,
    ) -> Vec<String> {
        let present: Vec<&Track> = unique_in_order(pool.iter().map(String::as_str))
            .into_iter()
            .filter_map(|id| self.catalog.get(id))
            .collect();

        let artists = unique_in_order(present.iter().filter_map(|t| t.album_artist.as_deref()));
        let albums = unique_in_order(present.iter().filter_map(|t| t.album_id.as_deref()));

        let mut picked = Vec::new();
        if artists.is_empty() {
            report.record(Degradation::EmptySubset(SamplingStage::ArtistExpansion));
        }
        for artist in artists {
            picked.extend(self.expand_group(self.artist_tracks(artist), rng));
        }
        if albums.is_empty() {
            report.record(Degradation::EmptySubset(SamplingStage::AlbumExpansion));
        }
        for album in albums {
            picked.extend(self.expand_group(self.album_tracks(album), rng));
        }
        picked
    }

    /// Draws from one play-count band of the whole catalog
    pub fn band_draws<R: Rng + ?Sized>(
        &self,
        band: &PlayCountBand,
        stage: SamplingStage,
        rng: &mut R,
        report: &mut CurationReport,
    ) -> Vec<String> {
        let eligible: Vec<&Track> = self
            .catalog
            .tracks()
            .iter()
            .filter(|t| band.contains(t.play_count))
            .collect();
        if eligible.is_empty() {
            report.record(Degradation::EmptySubset(stage));
            return Vec::new();
        }
        let count = band.draws.sample(rng);
        Sampling::draw(&eligible, count, rng)
            .into_iter()
            .map(|t| t.id.clone())
            .collect()
    }

    /// Small groups are taken whole, larger ones sampled
    fn expand_group<R: Rng + ?Sized>(&self, tracks: &[&Track], rng: &mut R) -> Vec<String> {
        let draws = self.rules.attribute_draws;
        if tracks.len() < draws.min {
            return tracks.iter().map(|t| t.id.clone()).collect();
        }
        let count = draws.sample(rng);
        Sampling::draw(tracks, count, rng)
            .into_iter()
            .map(|t| t.id.clone())
            .collect()
    }

    fn artist_tracks(&self, artist: &str) -> &[&'a Track] {
        self.by_artist.get(artist).map(Vec::as_slice).unwrap_or(&[])
    }

    fn album_tracks(&self, album: &str) -> &[&'a Track] {
        self.by_album.get(album).map(Vec::as_slice).unwrap_or(&[])
    }
}
