use std::time::Duration;

use rand::Rng;
use serde::Deserialize;

use crate::{models::RecommendationParameters, services::EngineOptions};

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// JSON graph snapshot; takes precedence over the database
    pub graph_path: Option<String>,

    /// PostgreSQL graph store connection URL
    pub database_url: Option<String>,

    /// Whose crawl to load from the graph store
    #[serde(default = "default_graph_user")]
    pub graph_user: String,

    /// oEmbed endpoint used to check whether videos still play
    #[serde(default = "default_probe_url")]
    pub probe_url: String,

    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    #[serde(default = "default_prefetch_concurrency")]
    pub prefetch_concurrency: usize,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    // Default recommendation parameters, overridable per request
    #[serde(default = "default_exploration")]
    pub exploration: f64,

    #[serde(default)]
    pub hide_watched: bool,

    #[serde(default = "default_num_of_groups")]
    pub num_of_groups: usize,

    #[serde(default = "default_videos_in_group")]
    pub videos_in_group: usize,

    #[serde(default = "default_clustering_balance_a")]
    pub clustering_balance_a: f64,

    #[serde(default = "default_clustering_balance_b")]
    pub clustering_balance_b: f64,

    /// Random in 1..=1_000_000 when unset
    pub seed: Option<u64>,
}

fn default_graph_user() -> String {
    "default".to_string()
}

fn default_probe_url() -> String {
    crate::services::providers::youtube::DEFAULT_OEMBED_URL.to_string()
}

fn default_probe_timeout_ms() -> u64 {
    5000
}

fn default_prefetch_concurrency() -> usize {
    8
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_exploration() -> f64 {
    0.1
}

fn default_num_of_groups() -> usize {
    3
}

fn default_videos_in_group() -> usize {
    5
}

fn default_clustering_balance_a() -> f64 {
    1.5
}

fn default_clustering_balance_b() -> f64 {
    1.0
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }

    /// Parameters used when a request leaves a field unspecified
    ///
    /// Not validated here; the engine rejects bad values when it is built.
    pub fn default_parameters(&self) -> RecommendationParameters {
        RecommendationParameters {
            exploration: self.exploration,
            hide_watched: self.hide_watched,
            num_of_groups: self.num_of_groups,
            videos_in_group: self.videos_in_group,
            clustering_balance_a: self.clustering_balance_a,
            clustering_balance_b: self.clustering_balance_b,
            seed: self
                .seed
                .unwrap_or_else(|| rand::thread_rng().gen_range(1..=1_000_000)),
        }
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            probe_timeout: self.probe_timeout(),
            prefetch_concurrency: self.prefetch_concurrency,
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        envy::from_iter::<_, Config>(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        )
        .unwrap()
    }

    #[test]
    fn test_defaults_match_recommendation_defaults() {
        let config = from_pairs(&[("SEED", "7")]);

        let params = config.default_parameters();
        assert_eq!(
            params,
            RecommendationParameters {
                seed: 7,
                ..Default::default()
            }
        );
        assert_eq!(config.port, 3000);
        assert_eq!(config.graph_user, "default");
        assert_eq!(config.probe_timeout(), Duration::from_secs(5));
        assert!(config.graph_path.is_none());
    }

    #[test]
    fn test_random_seed_when_unset() {
        let config = from_pairs(&[]);

        let seed = config.default_parameters().seed;
        assert!((1..=1_000_000).contains(&seed));
    }

    #[test]
    fn test_overrides_from_environment() {
        let config = from_pairs(&[
            ("GRAPH_PATH", "/tmp/graph.json"),
            ("EXPLORATION", "0.5"),
            ("NUM_OF_GROUPS", "4"),
            ("HIDE_WATCHED", "true"),
            ("PREFETCH_CONCURRENCY", "2"),
        ]);

        let params = config.default_parameters();
        assert_eq!(params.exploration, 0.5);
        assert_eq!(params.num_of_groups, 4);
        assert!(params.hide_watched);
        assert_eq!(config.engine_options().prefetch_concurrency, 2);
        assert_eq!(config.graph_path.as_deref(), Some("/tmp/graph.json"));
    }
}
