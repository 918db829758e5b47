use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::hash::Hash;

/// Random draw helpers shared by the pool stages
pub struct Sampling;

impl Sampling {
    /// `count` uniform draws with replacement; empty input yields nothing
    pub fn draw<T: Clone, R: Rng + ?Sized>(items: &[T], count: usize, rng: &mut R) -> Vec<T> {
        if items.is_empty() {
            return Vec::new();
        }
        (0..count)
            .filter_map(|_| items.choose(rng).cloned())
            .collect()
    }

    /// Shuffle everything after the first `protected` entries in place
    pub fn shuffle_after<T, R: Rng + ?Sized>(items: &mut [T], protected: usize, rng: &mut R) {
        if items.len() <= protected {
            return;
        }
        let (_head, tail) = items.split_at_mut(protected);
        tail.shuffle(rng);
    }
}

/// Drop repeats, keeping the first occurrence of each value
pub fn dedupe_preserving_order<T: Clone + Eq + Hash>(items: &[T]) -> Vec<T> {
    let mut seen = HashSet::new();
    items
        .iter()
        .filter(|item| seen.insert((*item).clone()))
        .cloned()
        .collect()
}

/// Distinct values in order of first appearance
pub fn unique_in_order<T: Eq + Hash + Copy>(items: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut seen = HashSet::new();
    items.into_iter().filter(|item| seen.insert(*item)).collect()
}
