//! Candidate grid sampling.
//!
//! The current node is cut into groups, each group is ranked, and every
//! output slot either takes the best remaining candidate or a uniformly
//! random one. The choice is driven by a generator seeded from
//! `(seed, path, group, slot)`, so a grid is a pure function of its inputs.

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::models::RecommendationParameters;

use super::{
    availability::AvailabilityCache,
    clustering::{ClusterTree, NodeId},
    graph::GraphSnapshot,
};

/// Id emitted for a slot whose group ran out of candidates
pub const PLACEHOLDER_ID: &str = "";

const SEED_SPACING: u64 = 0x9E37_79B9_7F4A_7C15;
const SPLITMIX_MULT_A: u64 = 0xBF58_476D_1CE4_E5B9;
const SPLITMIX_MULT_B: u64 = 0x94D0_49BB_1331_11EB;

fn splitmix64(mut state: u64) -> u64 {
    state = state.wrapping_add(SEED_SPACING);
    state = (state ^ (state >> 30)).wrapping_mul(SPLITMIX_MULT_A);
    state = (state ^ (state >> 27)).wrapping_mul(SPLITMIX_MULT_B);
    state ^ (state >> 31)
}

/// Folds the slot coordinates into one generator seed
///
/// The path length is mixed in first so `[1]` and `[1, 0]` never collide.
pub fn derive_seed(seed: u64, path: &[usize], group: usize, slot: usize) -> u64 {
    let mut state = splitmix64(seed ^ (path.len() as u64).wrapping_mul(SEED_SPACING));
    for &step in path {
        state = splitmix64(state ^ step as u64);
    }
    state = splitmix64(state ^ group as u64);
    splitmix64(state ^ slot as u64)
}

/// Mixes a per-call counter into the host's seed
pub fn mix_entropy(seed: u64, draw: u64) -> u64 {
    if draw == 0 {
        return seed;
    }
    splitmix64(seed ^ draw.wrapping_mul(SEED_SPACING))
}

pub struct Sampler<'a> {
    snapshot: &'a GraphSnapshot,
    tree: &'a ClusterTree,
}

impl<'a> Sampler<'a> {
    pub fn new(snapshot: &'a GraphSnapshot, tree: &'a ClusterTree) -> Self {
        Self { snapshot, tree }
    }

    /// Produces `num_of_groups * videos_in_group` ids, group 0's slots first
    ///
    /// `path` only feeds seed derivation; `node` is where sampling happens.
    pub fn sample(
        &self,
        node: NodeId,
        path: &[usize],
        params: &RecommendationParameters,
        availability: &AvailabilityCache,
        seed: u64,
    ) -> Vec<String> {
        let groups = self.tree.cut(node, params.num_of_groups);
        let mut grid = Vec::with_capacity(params.grid_len());

        for group_index in 0..params.num_of_groups {
            let candidates = groups
                .get(group_index)
                .map(|&group| self.candidates(group, params.hide_watched, availability))
                .unwrap_or_default();

            let picks = self.pick(candidates, params, path, group_index, seed);
            grid.extend(picks.into_iter().map(|pick| match pick {
                Some(video) => self.snapshot.node(video).id.clone(),
                None => PLACEHOLDER_ID.to_string(),
            }));
        }

        grid
    }

    /// Rank-ordered candidates of one group
    ///
    /// Videos already known to be down are skipped. With `hide_watched`,
    /// watched videos are dropped unless that would leave nothing.
    pub fn candidates(
        &self,
        group: NodeId,
        hide_watched: bool,
        availability: &AvailabilityCache,
    ) -> Vec<usize> {
        let mut candidates: Vec<usize> = self
            .tree
            .leaves(group)
            .into_iter()
            .filter(|&video| !availability.known_down(&self.snapshot.node(video).id))
            .collect();

        if hide_watched {
            let unwatched: Vec<usize> = candidates
                .iter()
                .copied()
                .filter(|&video| !self.snapshot.node(video).watched)
                .collect();
            if unwatched.is_empty() {
                tracing::debug!(group, "Every candidate is watched, showing them anyway");
            } else {
                candidates = unwatched;
            }
        }

        candidates.sort_by_key(|&video| self.snapshot.rank_of(video));
        candidates
    }

    fn pick(
        &self,
        mut remaining: Vec<usize>,
        params: &RecommendationParameters,
        path: &[usize],
        group: usize,
        seed: u64,
    ) -> Vec<Option<usize>> {
        let exploit_below = 1.0 - params.exploration;

        (0..params.videos_in_group)
            .map(|slot| {
                if remaining.is_empty() {
                    return None;
                }
                let mut rng = StdRng::seed_from_u64(derive_seed(seed, path, group, slot));
                let r: f64 = rng.gen();
                let position = if r < exploit_below {
                    0
                } else {
                    rng.gen_range(0..remaining.len())
                };
                Some(remaining.remove(position))
            })
            .collect()
    }
}
