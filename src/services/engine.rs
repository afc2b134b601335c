use std::{sync::Arc, time::Duration};

use serde::Serialize;
use tokio::{
    sync::Semaphore,
    task::{JoinHandle, JoinSet},
};

use crate::{
    error::{AppError, AppResult},
    models::RecommendationParameters,
};

use super::{
    availability::{AvailabilityCache, DEFAULT_PROBE_TIMEOUT},
    clustering::{ClusterTree, Clusterer},
    graph::GraphSnapshot,
    navigator::{NavigationOutcome, Navigator},
    prefetch::{PrefetchReport, Prefetcher, RedrawCallback, DEFAULT_PREFETCH_CONCURRENCY},
    providers::{GraphProvider, StatusProbe},
    sampler::{mix_entropy, Sampler, PLACEHOLDER_ID},
};

/// Shown in place of empty or dead slots
pub const FILLER_VIDEO_ID: &str = "RqJVa0fl01w";
pub const FILLER_TEXT: &str = "-";

/// Runtime knobs that are not recommendation parameters
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub probe_timeout: Duration,
    pub prefetch_concurrency: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            prefetch_concurrency: DEFAULT_PREFETCH_CONCURRENCY,
        }
    }
}

/// One rendered grid slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridTile {
    pub id: String,
    pub text: String,
    /// True when the filler video stands in for an empty or dead slot
    pub placeholder: bool,
}

impl GridTile {
    fn filler() -> Self {
        Self {
            id: FILLER_VIDEO_ID.to_string(),
            text: FILLER_TEXT.to_string(),
            placeholder: true,
        }
    }
}

/// Snapshot and availability lookups detached from the engine
///
/// Lets callers release the engine lock before waiting on probes.
#[derive(Clone)]
pub struct GridResolver {
    snapshot: Arc<GraphSnapshot>,
    availability: Arc<AvailabilityCache>,
    concurrency: usize,
}

impl GridResolver {
    /// Ids outside the snapshot are rejected and never enter the cache
    pub async fn is_down(&self, id: &str) -> AppResult<bool> {
        if self.snapshot.index_of(id).is_none() {
            return Err(AppError::NotFound(format!("Video {} not found", id)));
        }
        Ok(self.availability.is_down(id).await)
    }

    /// Probes the grid's videos concurrently and keeps slot order
    pub async fn tiles(&self, ids: Vec<String>) -> Vec<GridTile> {
        let limit = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        for (slot, id) in ids.iter().enumerate() {
            if id == PLACEHOLDER_ID {
                continue;
            }
            let availability = self.availability.clone();
            let limit = limit.clone();
            let id = id.clone();
            tasks.spawn(async move {
                // the semaphore is never closed
                let _permit = limit.acquire_owned().await.ok();
                (slot, availability.is_down(&id).await)
            });
        }

        let mut down = vec![false; ids.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((slot, is_down)) => down[slot] = is_down,
                Err(e) => tracing::error!(error = %e, "Grid status task join error"),
            }
        }

        ids.into_iter()
            .zip(down)
            .map(|(id, down)| {
                if id == PLACEHOLDER_ID || down {
                    return GridTile::filler();
                }
                let text = self.snapshot.title(&id).unwrap_or_default().to_string();
                GridTile {
                    id,
                    text,
                    placeholder: false,
                }
            })
            .collect()
    }
}

/// One user's recommendation session
///
/// Owns an immutable snapshot and cluster tree, the navigation state and the
/// availability cache. Navigation and sampling are expected to be called one
/// at a time; only prefetches run in the background.
pub struct Engine {
    snapshot: Arc<GraphSnapshot>,
    tree: Arc<ClusterTree>,
    navigator: Navigator,
    availability: Arc<AvailabilityCache>,
    prefetcher: Prefetcher,
    defaults: RecommendationParameters,
    /// Ids of the grid most recently handed to the host
    displayed: Vec<String>,
    /// Group count of that grid, which is what column choices refer to
    displayed_groups: usize,
    draws: u64,
    redraw: Option<RedrawCallback>,
    concurrency: usize,
}

impl Engine {
    /// Clusters the snapshot and starts navigation at the root
    pub fn new(
        snapshot: GraphSnapshot,
        params: RecommendationParameters,
        probe: Arc<dyn StatusProbe>,
        options: &EngineOptions,
    ) -> AppResult<Self> {
        params.validate()?;
        let eligible = snapshot.eligible().len();
        if eligible < 2 {
            return Err(AppError::EmptyGraph { found: eligible });
        }

        let tree = Clusterer::new(params.clustering_balance_a, params.clustering_balance_b)
            .build(&snapshot)?;
        let availability = AvailabilityCache::with_timeout(probe, options.probe_timeout);

        Self::from_parts(snapshot, tree, params, availability, options)
    }

    /// Assembles an engine around a tree that was clustered elsewhere
    pub fn from_parts(
        snapshot: GraphSnapshot,
        tree: ClusterTree,
        params: RecommendationParameters,
        availability: AvailabilityCache,
        options: &EngineOptions,
    ) -> AppResult<Self> {
        params.validate()?;
        if tree.leaf_count() < 2 {
            return Err(AppError::EmptyGraph {
                found: tree.leaf_count(),
            });
        }

        let snapshot = Arc::new(snapshot);
        let tree = Arc::new(tree);
        let availability = Arc::new(availability);
        let prefetcher = Prefetcher::new(
            snapshot.clone(),
            tree.clone(),
            availability.clone(),
            options.prefetch_concurrency,
        );

        tracing::info!(
            videos = tree.leaf_count(),
            tree_height = tree.height(),
            "Recommendation engine ready"
        );

        Ok(Self {
            navigator: Navigator::new(&tree),
            snapshot,
            tree,
            availability,
            prefetcher,
            displayed_groups: params.num_of_groups,
            defaults: params,
            displayed: Vec::new(),
            draws: 0,
            redraw: None,
            concurrency: options.prefetch_concurrency.max(1),
        })
    }

    pub fn defaults(&self) -> &RecommendationParameters {
        &self.defaults
    }

    pub fn snapshot(&self) -> &GraphSnapshot {
        &self.snapshot
    }

    pub fn tree(&self) -> &ClusterTree {
        &self.tree
    }

    pub fn availability(&self) -> &AvailabilityCache {
        &self.availability
    }

    pub fn path(&self) -> &[usize] {
        self.navigator.path()
    }

    /// Samples the grid for the current position
    ///
    /// Each call mixes a fresh draw counter into the seed, so exploratory
    /// picks change between calls while pure rank order does not.
    pub fn get_video_ids(&mut self, params: &RecommendationParameters) -> AppResult<Vec<String>> {
        params.validate()?;
        self.check_balance(params)?;

        let seed = mix_entropy(params.seed, self.draws);
        self.draws += 1;

        let sampler = Sampler::new(&self.snapshot, &self.tree);
        let ids = sampler.sample(
            self.navigator.current(),
            self.navigator.path(),
            params,
            &self.availability,
            seed,
        );

        tracing::debug!(
            branch = %self.navigator.current_branch_label(),
            exploration = params.exploration,
            hide_watched = params.hide_watched,
            placeholders = ids.iter().filter(|id| id.as_str() == PLACEHOLDER_ID).count(),
            "Sampled video grid"
        );

        self.displayed = ids.clone();
        self.displayed_groups = params.num_of_groups;
        Ok(ids)
    }

    /// Samples a grid and resolves it into displayable tiles
    ///
    /// Empty slots and videos found to be down become the filler video.
    pub async fn render_grid(&mut self, params: &RecommendationParameters) -> AppResult<Vec<GridTile>> {
        let ids = self.get_video_ids(params)?;
        Ok(self.resolver().tiles(ids).await)
    }

    /// Lookup handle that stays valid after the engine borrow ends
    pub fn resolver(&self) -> GridResolver {
        GridResolver {
            snapshot: self.snapshot.clone(),
            availability: self.availability.clone(),
            concurrency: self.concurrency,
        }
    }

    pub fn get_title(&self, id: &str) -> Option<&str> {
        self.snapshot.title(id)
    }

    /// Memoized liveness of a video in the snapshot
    pub async fn is_down(&self, id: &str) -> AppResult<bool> {
        self.resolver().is_down(id).await
    }

    /// True when the user is on a single video and cannot descend further
    pub fn at_leaf(&self) -> bool {
        self.tree.is_leaf(self.navigator.current())
    }

    /// Descends into group `index` of the grid currently on screen
    pub fn choose_column(&mut self, index: usize) -> NavigationOutcome {
        let outcome = self
            .navigator
            .choose_column(&self.tree, index, self.displayed_groups);
        tracing::info!(
            index,
            outcome = ?outcome,
            branch = %self.navigator.current_branch_label(),
            "Choose column"
        );
        outcome
    }

    pub fn go_back(&mut self) -> NavigationOutcome {
        let outcome = self.navigator.go_back();
        tracing::info!(
            outcome = ?outcome,
            branch = %self.navigator.current_branch_label(),
            "Go back"
        );
        outcome
    }

    pub fn current_branch_label(&self) -> String {
        self.navigator.current_branch_label()
    }

    pub fn set_redraw_callback(&mut self, callback: RedrawCallback) {
        self.redraw = Some(callback);
    }

    /// Starts warming the cache for the displayed grid and the grids one level down
    ///
    /// Returns immediately; the handle may be dropped.
    pub fn fetch_videos(
        &self,
        params: &RecommendationParameters,
    ) -> AppResult<JoinHandle<PrefetchReport>> {
        params.validate()?;
        self.check_balance(params)?;

        let upcoming = self.prefetcher.likely_next(
            self.navigator.current(),
            self.navigator.path(),
            params,
            mix_entropy(params.seed, self.draws),
        );

        Ok(self
            .prefetcher
            .spawn(self.displayed.clone(), upcoming, self.redraw.clone()))
    }

    /// The tree was clustered with the construction-time balances; other values need a refresh
    fn check_balance(&self, params: &RecommendationParameters) -> AppResult<()> {
        let fixed = &self.defaults;
        if params.clustering_balance_a != fixed.clustering_balance_a
            || params.clustering_balance_b != fixed.clustering_balance_b
        {
            return Err(AppError::InvalidInput(format!(
                "clustering balances are fixed at a={}, b={} for this engine; refresh to recluster",
                fixed.clustering_balance_a, fixed.clustering_balance_b
            )));
        }
        Ok(())
    }
}

/// Produces a fresh engine per refresh
///
/// Each build reloads the graph and returns a brand-new snapshot, tree,
/// navigator and availability cache; nothing is shared with earlier engines.
pub struct EngineFactory {
    graph: Arc<dyn GraphProvider>,
    probe: Arc<dyn StatusProbe>,
    options: EngineOptions,
}

impl EngineFactory {
    pub fn new(
        graph: Arc<dyn GraphProvider>,
        probe: Arc<dyn StatusProbe>,
        options: EngineOptions,
    ) -> Self {
        Self {
            graph,
            probe,
            options,
        }
    }

    pub async fn build(&self, params: RecommendationParameters) -> AppResult<Engine> {
        params.validate()?;

        let started = std::time::Instant::now();
        let data = self.graph.load_graph().await?;
        tracing::info!(
            provider = self.graph.name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Graph loaded"
        );

        let probe = self.probe.clone();
        let options = self.options.clone();
        // clustering is quadratic in the number of videos; keep it off the async workers
        tokio::task::spawn_blocking(move || {
            let snapshot = GraphSnapshot::from_data(data)?;
            Engine::new(snapshot, params, probe, &options)
        })
        .await
        .map_err(|e| AppError::Internal(format!("engine build task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashSet,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use super::*;
    use crate::{
        models::{Availability, Edge, EdgeKind, GraphData, VideoNode},
        services::{
            clustering::{cluster, tests::two_group_rows, DistanceMatrix},
            providers::{MockStatusProbe, StaticGraphProvider},
        },
    };

    const VIEWS: [u64; 8] = [100, 500, 300, 50, 1000, 20, 700, 400];

    fn probe_with_down(down: &'static [&'static str]) -> MockStatusProbe {
        let mut probe = MockStatusProbe::new();
        probe.expect_probe().returning(move |id| {
            Ok(if down.iter().any(|d| *d == id) {
                Availability::Down
            } else {
                Availability::Up
            })
        });
        probe.expect_name().return_const("mock");
        probe
    }

    fn fixture_snapshot(watched: &[usize]) -> GraphSnapshot {
        let nodes = VIEWS
            .iter()
            .enumerate()
            .map(|(i, &views)| VideoNode {
                view_count: views,
                watched: watched.contains(&i),
                ..VideoNode::new(format!("v{}", i), format!("Video {}", i))
            })
            .collect();
        GraphSnapshot::from_data(GraphData {
            nodes,
            edges: vec![],
        })
        .unwrap()
    }

    /// Eight videos clustered from a fixed, hand-written distance matrix
    fn fixture_engine(watched: &[usize], probe: MockStatusProbe) -> Engine {
        let matrix = DistanceMatrix::from_rows(&two_group_rows()).unwrap();
        let tree = cluster((0..8).collect(), &matrix).unwrap();
        Engine::from_parts(
            fixture_snapshot(watched),
            tree,
            params(0.0),
            AvailabilityCache::new(Arc::new(probe)),
            &EngineOptions::default(),
        )
        .unwrap()
    }

    fn params(exploration: f64) -> RecommendationParameters {
        RecommendationParameters {
            exploration,
            hide_watched: false,
            num_of_groups: 2,
            videos_in_group: 2,
            seed: 1234,
            ..Default::default()
        }
    }

    #[test]
    fn test_fixed_matrix_scenario_grid() {
        let mut engine = fixture_engine(&[], probe_with_down(&[]));

        let ids = engine.get_video_ids(&params(0.0)).unwrap();

        assert_eq!(ids, vec!["v1", "v2", "v4", "v6"]);
    }

    #[test]
    fn test_exploration_zero_is_repeatable() {
        let mut engine = fixture_engine(&[], probe_with_down(&[]));
        let p = RecommendationParameters {
            num_of_groups: 3,
            videos_in_group: 3,
            ..params(0.0)
        };

        let first = engine.get_video_ids(&p).unwrap();
        let second = engine.get_video_ids(&p).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_full_exploration_varies_across_calls() {
        let mut engine = fixture_engine(&[], probe_with_down(&[]));
        let p = params(1.0);

        let grids: HashSet<Vec<String>> = (0..50)
            .map(|_| engine.get_video_ids(&p).unwrap())
            .collect();
        assert!(grids.len() >= 2);
    }

    #[test]
    fn test_grid_length_matches_parameters() {
        let mut engine = fixture_engine(&[], probe_with_down(&[]));

        for (groups, per_group) in [(2, 1), (3, 4), (10, 10), (5, 2)] {
            let p = RecommendationParameters {
                num_of_groups: groups,
                videos_in_group: per_group,
                ..params(0.3)
            };
            assert_eq!(engine.get_video_ids(&p).unwrap().len(), groups * per_group);
        }
    }

    #[test]
    fn test_hide_watched_falls_back_for_fully_watched_group() {
        let mut engine = fixture_engine(&[0, 1, 2, 3, 6], probe_with_down(&[]));
        let p = RecommendationParameters {
            hide_watched: true,
            ..params(0.0)
        };

        let ids = engine.get_video_ids(&p).unwrap();

        assert_eq!(ids, vec!["v1", "v2", "v4", "v7"]);
        let snapshot = engine.snapshot();
        assert!(ids[2..].iter().all(|id| !snapshot.get(id).unwrap().watched));
    }

    #[test]
    fn test_invalid_parameters_are_rejected_not_clamped() {
        let mut engine = fixture_engine(&[], probe_with_down(&[]));
        let p = RecommendationParameters {
            videos_in_group: 0,
            ..params(0.0)
        };

        let err = engine.get_video_ids(&p).unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[test]
    fn test_choose_column_follows_displayed_grid() {
        let mut engine = fixture_engine(&[], probe_with_down(&[]));
        engine
            .get_video_ids(&RecommendationParameters {
                num_of_groups: 3,
                ..params(0.0)
            })
            .unwrap();

        // three groups on screen, so index 2 is valid
        assert_eq!(engine.choose_column(2), NavigationOutcome::Success);
        assert_eq!(engine.current_branch_label(), "2");
        assert_eq!(engine.go_back(), NavigationOutcome::Success);
        assert_eq!(engine.current_branch_label(), "root");
    }

    #[test]
    fn test_navigation_boundaries() {
        let mut engine = fixture_engine(&[], probe_with_down(&[]));

        assert_eq!(engine.go_back(), NavigationOutcome::Boundary);
        assert_eq!(engine.choose_column(5), NavigationOutcome::Boundary);
        assert_eq!(engine.current_branch_label(), "root");

        for _ in 0..3 {
            assert_eq!(engine.choose_column(1), NavigationOutcome::Success);
        }
        assert_eq!(engine.current_branch_label(), "1.1.1");
        assert_eq!(engine.choose_column(0), NavigationOutcome::Boundary);
        assert_eq!(engine.path(), &[1, 1, 1]);
    }

    #[test]
    fn test_descended_grid_samples_subtree() {
        let mut engine = fixture_engine(&[], probe_with_down(&[]));
        engine.choose_column(1);

        let ids = engine.get_video_ids(&params(0.0)).unwrap();

        // node 13 splits into {v4,v5} and {v6,v7}
        assert_eq!(ids, vec!["v4", "v5", "v6", "v7"]);
    }

    #[tokio::test]
    async fn test_is_down_probes_once() {
        let mut probe = MockStatusProbe::new();
        probe
            .expect_probe()
            .times(1)
            .returning(|_| Ok(Availability::Down));
        probe.expect_name().return_const("mock");
        let engine = fixture_engine(&[], probe);

        assert!(engine.is_down("v3").await.unwrap());
        assert!(engine.is_down("v3").await.unwrap());
    }

    #[tokio::test]
    async fn test_is_down_rejects_ids_outside_snapshot() {
        let engine = fixture_engine(&[], MockStatusProbe::new());

        let err = engine.is_down("not-a-video").await.unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        assert!(engine.availability().known("not-a-video").is_none());
    }

    #[test]
    fn test_balance_change_needs_refresh() {
        let mut engine = fixture_engine(&[], probe_with_down(&[]));
        let p = RecommendationParameters {
            clustering_balance_b: 2.0,
            ..params(0.0)
        };

        let err = engine.get_video_ids(&p).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(ref msg) if msg.contains("refresh")));
        assert!(engine.fetch_videos(&p).is_err());
    }

    #[test]
    fn test_at_leaf_after_full_descent() {
        let mut engine = fixture_engine(&[], probe_with_down(&[]));
        assert!(!engine.at_leaf());

        for _ in 0..3 {
            engine.choose_column(0);
        }
        assert!(engine.at_leaf());
    }

    /// Answers after a fixed delay
    struct SlowProbe(Duration);

    #[async_trait::async_trait]
    impl StatusProbe for SlowProbe {
        async fn probe(&self, _id: &str) -> AppResult<Availability> {
            tokio::time::sleep(self.0).await;
            Ok(Availability::Up)
        }

        fn name(&self) -> &'static str {
            "slow"
        }
    }

    #[tokio::test]
    async fn test_tiles_resolve_concurrently_in_slot_order() {
        let matrix = DistanceMatrix::from_rows(&two_group_rows()).unwrap();
        let tree = cluster((0..8).collect(), &matrix).unwrap();
        let availability =
            AvailabilityCache::new(Arc::new(SlowProbe(Duration::from_millis(200))));
        let mut engine = Engine::from_parts(
            fixture_snapshot(&[]),
            tree,
            params(0.0),
            availability,
            &EngineOptions::default(),
        )
        .unwrap();
        let ids = engine.get_video_ids(&params(0.0)).unwrap();

        let started = std::time::Instant::now();
        let tiles = engine.resolver().tiles(ids.clone()).await;

        // four sequential probes would take 800ms
        assert!(started.elapsed() < Duration::from_millis(600));
        let tile_ids: Vec<String> = tiles.into_iter().map(|t| t.id).collect();
        assert_eq!(tile_ids, ids);
    }

    #[tokio::test]
    async fn test_render_grid_substitutes_filler() {
        let mut engine = fixture_engine(&[], probe_with_down(&["v2"]));
        let p = RecommendationParameters {
            num_of_groups: 2,
            videos_in_group: 2,
            ..params(0.0)
        };
        // descend to {v0, v1} so the second group is empty
        engine.choose_column(0);
        engine.get_video_ids(&p).unwrap();
        engine.choose_column(0);

        let tiles = engine.render_grid(&p).await.unwrap();

        assert_eq!(tiles.len(), 4);
        assert_eq!(tiles[0].id, "v0");
        assert_eq!(tiles[0].text, "Video 0");
        assert!(tiles[1].placeholder);
        assert_eq!(tiles[1].id, FILLER_VIDEO_ID);
        assert_eq!(tiles[2].id, "v1");
        assert_eq!(tiles[3].text, FILLER_TEXT);
    }

    #[tokio::test]
    async fn test_render_grid_replaces_down_video() {
        let mut engine = fixture_engine(&[], probe_with_down(&["v4"]));

        let tiles = engine.render_grid(&params(0.0)).await.unwrap();

        assert_eq!(tiles[2].id, FILLER_VIDEO_ID);
        // the next sample skips the video now known to be down
        let ids = engine.get_video_ids(&params(0.0)).unwrap();
        assert_eq!(ids, vec!["v1", "v2", "v6", "v7"]);
    }

    #[tokio::test]
    async fn test_fetch_videos_requests_redraw() {
        let mut engine = fixture_engine(&[], probe_with_down(&["v6"]));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        engine.set_redraw_callback(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        engine.get_video_ids(&params(0.0)).unwrap();

        let report = engine.fetch_videos(&params(0.0)).unwrap().await.unwrap();

        assert!(report.redraw_requested);
        assert_eq!(report.newly_down, vec!["v6".to_string()]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // every video sits one level below the root's two groups
        assert_eq!(engine.availability().len(), 8);
    }

    #[tokio::test]
    async fn test_stale_prefetch_results_stay_cached() {
        let mut engine = fixture_engine(&[], probe_with_down(&["v0"]));
        engine.get_video_ids(&params(0.0)).unwrap();

        let handle = engine.fetch_videos(&params(0.0)).unwrap();
        engine.choose_column(1);
        handle.await.unwrap();

        assert!(engine.availability().known_down("v0"));
        assert_eq!(engine.current_branch_label(), "1");
    }

    #[test]
    fn test_get_title_reads_snapshot() {
        let engine = fixture_engine(&[], MockStatusProbe::new());

        assert_eq!(engine.get_title("v5"), Some("Video 5"));
        assert_eq!(engine.get_title("nope"), None);
    }

    fn small_graph(count: usize) -> GraphData {
        GraphData {
            nodes: (0..count)
                .map(|i| VideoNode::new(format!("v{}", i), format!("Video {}", i)))
                .collect(),
            edges: (1..count)
                .map(|i| Edge::new(format!("v{}", i - 1), format!("v{}", i), EdgeKind::RecommendedFrom))
                .collect(),
        }
    }

    #[test]
    fn test_factory_rejects_graph_with_one_video() {
        let factory = EngineFactory::new(
            Arc::new(StaticGraphProvider::new(small_graph(1))),
            Arc::new(MockStatusProbe::new()),
            EngineOptions::default(),
        );

        let err = tokio_test::block_on(factory.build(params(0.0))).err().unwrap();
        assert!(matches!(err, AppError::EmptyGraph { found: 1 }));
    }

    #[tokio::test]
    async fn test_factory_builds_independent_engines() {
        let factory = EngineFactory::new(
            Arc::new(StaticGraphProvider::new(small_graph(6))),
            Arc::new(probe_with_down(&[])),
            EngineOptions::default(),
        );

        let mut first = factory.build(params(0.0)).await.unwrap();
        first.choose_column(0);
        assert!(!first.is_down("v0").await.unwrap());

        let second = factory.build(params(0.0)).await.unwrap();
        assert_eq!(second.current_branch_label(), "root");
        assert!(second.availability().is_empty());
        assert_eq!(second.tree().leaf_count(), 6);
    }

    #[test]
    fn test_factory_validates_before_loading() {
        let factory = EngineFactory::new(
            Arc::new(StaticGraphProvider::new(small_graph(6))),
            Arc::new(MockStatusProbe::new()),
            EngineOptions::default(),
        );
        let bad = RecommendationParameters {
            clustering_balance_a: 3.0,
            ..params(0.0)
        };

        let err = tokio_test::block_on(factory.build(bad)).err().unwrap();
        assert!(matches!(err, AppError::Configuration(_)));
    }
}
