mod parameters;
mod video;

pub use parameters::{
    ParameterError, ParameterOverrides, RecommendationParameters, CLUSTERING_BALANCE_RANGE,
    EXPLORATION_RANGE, NUM_OF_GROUPS_RANGE, VIDEOS_IN_GROUP_RANGE,
};
pub use video::{Availability, Edge, EdgeKind, GraphData, VideoNode};
