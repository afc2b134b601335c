//! External collaborators of the recommendation engine
//!
//! Graph providers hand over the crawled watch graph once per engine build;
//! status probes answer whether a single video is still playable. Both are
//! pluggable so the server can read from a JSON dump or Postgres, and tests
//! can substitute in-memory or counting implementations.
use crate::{
    error::AppResult,
    models::{Availability, GraphData},
};

pub mod json_file;
pub mod postgres;
pub mod youtube;

pub use json_file::JsonGraphProvider;
pub use postgres::PostgresGraphProvider;
pub use youtube::YoutubeStatusProbe;

/// Source of the watch/relation graph
#[async_trait::async_trait]
pub trait GraphProvider: Send + Sync {
    /// Loads the full graph for the configured user
    async fn load_graph(&self) -> AppResult<GraphData>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}

/// Liveness check for a single video
///
/// May be slow or fail; callers decide how to recover.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait StatusProbe: Send + Sync {
    async fn probe(&self, id: &str) -> AppResult<Availability>;

    /// Probe name for logging and debugging
    fn name(&self) -> &'static str;
}

/// Serves a graph that is already in memory
#[derive(Debug, Clone, Default)]
pub struct StaticGraphProvider {
    graph: GraphData,
}

impl StaticGraphProvider {
    pub fn new(graph: GraphData) -> Self {
        Self { graph }
    }
}

#[async_trait::async_trait]
impl GraphProvider for StaticGraphProvider {
    async fn load_graph(&self) -> AppResult<GraphData> {
        Ok(self.graph.clone())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}
