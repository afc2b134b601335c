use std::{collections::HashSet, sync::Arc};

use tokio::{sync::Semaphore, task::JoinHandle, task::JoinSet};

use crate::models::RecommendationParameters;

use super::{
    availability::AvailabilityCache,
    clustering::{ClusterTree, NodeId},
    graph::GraphSnapshot,
    sampler::{Sampler, PLACEHOLDER_ID},
};

pub const DEFAULT_PREFETCH_CONCURRENCY: usize = 8;

/// Zero-argument hook the host registers to be told a redraw is worthwhile
pub type RedrawCallback = Arc<dyn Fn() + Send + Sync>;

/// What a finished prefetch learned
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefetchReport {
    pub probed: usize,
    /// Displayed ids discovered to be down by this prefetch
    pub newly_down: Vec<String>,
    pub redraw_requested: bool,
}

/// Warms the availability cache in the background
#[derive(Clone)]
pub struct Prefetcher {
    snapshot: Arc<GraphSnapshot>,
    tree: Arc<ClusterTree>,
    availability: Arc<AvailabilityCache>,
    concurrency: usize,
}

impl Prefetcher {
    pub fn new(
        snapshot: Arc<GraphSnapshot>,
        tree: Arc<ClusterTree>,
        availability: Arc<AvailabilityCache>,
        concurrency: usize,
    ) -> Self {
        Self {
            snapshot,
            tree,
            availability,
            concurrency: concurrency.max(1),
        }
    }

    /// Ids the user would see after descending into any group of `node`
    pub fn likely_next(
        &self,
        node: NodeId,
        path: &[usize],
        params: &RecommendationParameters,
        seed: u64,
    ) -> Vec<String> {
        let sampler = Sampler::new(&self.snapshot, &self.tree);
        let mut child_path = path.to_vec();
        let mut ids = Vec::new();

        for (index, group) in self
            .tree
            .cut(node, params.num_of_groups)
            .into_iter()
            .enumerate()
        {
            child_path.push(index);
            ids.extend(
                sampler
                    .sample(group, &child_path, params, &self.availability, seed)
                    .into_iter()
                    .filter(|id| id != PLACEHOLDER_ID),
            );
            child_path.pop();
        }

        ids
    }

    /// Probes `displayed` then `upcoming` without blocking the caller
    ///
    /// Once every probe has settled, `redraw` is invoked if any displayed id
    /// turned out to be down and was not known to be down before. Results
    /// stay cached even if the user navigated away in the meantime.
    pub fn spawn(
        &self,
        displayed: Vec<String>,
        upcoming: Vec<String>,
        redraw: Option<RedrawCallback>,
    ) -> JoinHandle<PrefetchReport> {
        let availability = self.availability.clone();
        let limit = Arc::new(Semaphore::new(self.concurrency));

        tokio::spawn(async move {
            let displayed: Vec<String> = displayed
                .into_iter()
                .filter(|id| id != PLACEHOLDER_ID)
                .collect();
            let already_down: HashSet<String> = displayed
                .iter()
                .filter(|id| availability.known_down(id))
                .cloned()
                .collect();

            let mut seen = HashSet::new();
            let pending: Vec<String> = displayed
                .iter()
                .chain(upcoming.iter())
                .filter(|id| id.as_str() != PLACEHOLDER_ID && availability.known(id).is_none())
                .filter(|id| seen.insert(id.to_string()))
                .cloned()
                .collect();

            tracing::debug!(
                displayed = displayed.len(),
                pending = pending.len(),
                "Prefetch started"
            );

            let probed = pending.len();
            let mut tasks = JoinSet::new();
            for id in pending {
                let availability = availability.clone();
                let limit = limit.clone();
                tasks.spawn(async move {
                    // the semaphore is never closed
                    let _permit = limit.acquire_owned().await.ok();
                    availability.availability(&id).await
                });
            }
            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    tracing::error!(error = %e, "Prefetch task join error");
                }
            }

            let newly_down: Vec<String> = displayed
                .iter()
                .filter(|id| availability.known_down(id) && !already_down.contains(*id))
                .cloned()
                .collect();

            let redraw_requested = match (&redraw, newly_down.is_empty()) {
                (Some(callback), false) => {
                    tracing::info!(
                        count = newly_down.len(),
                        "Displayed videos went down, requesting redraw"
                    );
                    callback();
                    true
                }
                _ => false,
            };

            tracing::debug!(probed, newly_down = newly_down.len(), "Prefetch finished");

            PrefetchReport {
                probed,
                newly_down,
                redraw_requested,
            }
        })
    }
}
