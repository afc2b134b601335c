pub mod availability;
pub mod clustering;
pub mod engine;
pub mod graph;
pub mod navigator;
pub mod prefetch;
pub mod providers;
pub mod sampler;

pub use availability::AvailabilityCache;
pub use clustering::{ClusterTree, Clusterer};
pub use engine::{Engine, EngineFactory, EngineOptions, GridResolver, GridTile};
pub use graph::GraphSnapshot;
pub use navigator::NavigationOutcome;
