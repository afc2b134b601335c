use std::path::PathBuf;

use crate::{
    error::{AppError, AppResult},
    models::GraphData,
    services::providers::GraphProvider,
};

/// Reads a `{ "nodes": [...], "edges": [...] }` dump written by the crawler
#[derive(Debug, Clone)]
pub struct JsonGraphProvider {
    path: PathBuf,
}

impl JsonGraphProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl GraphProvider for JsonGraphProvider {
    async fn load_graph(&self) -> AppResult<GraphData> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            AppError::GraphLoad(format!("cannot read {}: {}", self.path.display(), e))
        })?;

        let graph: GraphData = serde_json::from_str(&raw).map_err(|e| {
            AppError::GraphLoad(format!("cannot parse {}: {}", self.path.display(), e))
        })?;

        tracing::info!(
            path = %self.path.display(),
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "Loaded graph from JSON"
        );

        Ok(graph)
    }

    fn name(&self) -> &'static str {
        "json_file"
    }
}
