use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Whether a video can still be played at its source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    #[default]
    Unknown,
    Up,
    Down,
}

impl Availability {
    pub fn is_down(self) -> bool {
        self == Availability::Down
    }
}

impl Display for Availability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Availability::Unknown => write!(f, "unknown"),
            Availability::Up => write!(f, "up"),
            Availability::Down => write!(f, "down"),
        }
    }
}

/// A video as recorded by the crawler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoNode {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub view_count: u64,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub watched: bool,
    pub time_scraped: Option<DateTime<Utc>>,
    #[serde(default)]
    pub availability: Availability,
}

impl VideoNode {
    /// Creates an unwatched node with only an id and a title
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            view_count: 0,
            like_count: 0,
            channel_id: String::new(),
            watched: false,
            time_scraped: None,
            availability: Availability::Unknown,
        }
    }
}

/// Relation type carried by an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Target was recommended on the source's page
    RecommendedFrom,
    /// Both videos were published by the same channel
    SameChannel,
}

/// Directed relation between two videos
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>, kind: EdgeKind) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
        }
    }
}

/// Raw graph as handed over by a graph provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphData {
    pub nodes: Vec<VideoNode>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}
