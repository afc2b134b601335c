use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::{
    error::AppResult,
    models::{Availability, Edge, EdgeKind, GraphData, VideoNode},
    services::providers::GraphProvider,
};

/// Reads the crawler's tables for one user
///
/// Expects `videos(user_id, id, title, view_count, like_count, channel_id,
/// watched, time_scraped, is_down)` and `video_edges(user_id, source, target,
/// kind)`. `time_scraped` is epoch seconds; `is_down` is nullable.
#[derive(Clone)]
pub struct PostgresGraphProvider {
    pool: PgPool,
    user: String,
}

#[derive(Debug, sqlx::FromRow)]
struct VideoRow {
    id: String,
    title: Option<String>,
    view_count: Option<i64>,
    like_count: Option<i64>,
    channel_id: Option<String>,
    watched: bool,
    time_scraped: Option<f64>,
    is_down: Option<bool>,
}

#[derive(Debug, sqlx::FromRow)]
struct EdgeRow {
    source: String,
    target: String,
    kind: String,
}

impl From<VideoRow> for VideoNode {
    fn from(row: VideoRow) -> Self {
        let availability = match row.is_down {
            Some(true) => Availability::Down,
            Some(false) => Availability::Up,
            None => Availability::Unknown,
        };

        VideoNode {
            id: row.id,
            title: row.title.unwrap_or_default(),
            view_count: row.view_count.map_or(0, |v| v.max(0) as u64),
            like_count: row.like_count.map_or(0, |v| v.max(0) as u64),
            channel_id: row.channel_id.unwrap_or_default(),
            watched: row.watched,
            time_scraped: row.time_scraped.and_then(epoch_to_datetime),
            availability,
        }
    }
}

fn epoch_to_datetime(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9) as u32;
    DateTime::<Utc>::from_timestamp(whole as i64, nanos)
}

fn parse_edge_kind(kind: &str) -> Option<EdgeKind> {
    match kind.to_lowercase().as_str() {
        "recommended_from" | "recommended" => Some(EdgeKind::RecommendedFrom),
        "same_channel" => Some(EdgeKind::SameChannel),
        _ => None,
    }
}

impl PostgresGraphProvider {
    pub fn new(pool: PgPool, user: String) -> Self {
        Self { pool, user }
    }
}

#[async_trait::async_trait]
impl GraphProvider for PostgresGraphProvider {
    async fn load_graph(&self) -> AppResult<GraphData> {
        let videos: Vec<VideoRow> = sqlx::query_as(
            r#"
            SELECT id, title, view_count, like_count, channel_id, watched, time_scraped, is_down
            FROM videos
            WHERE user_id = $1
            ORDER BY id
            "#,
        )
        .bind(&self.user)
        .fetch_all(&self.pool)
        .await?;

        let edge_rows: Vec<EdgeRow> = sqlx::query_as(
            r#"
            SELECT source, target, kind
            FROM video_edges
            WHERE user_id = $1
            "#,
        )
        .bind(&self.user)
        .fetch_all(&self.pool)
        .await?;

        let mut edges = Vec::with_capacity(edge_rows.len());
        for row in edge_rows {
            match parse_edge_kind(&row.kind) {
                Some(kind) => edges.push(Edge::new(row.source, row.target, kind)),
                None => tracing::debug!(kind = %row.kind, "Skipping edge of unknown kind"),
            }
        }

        tracing::info!(
            user = %self.user,
            nodes = videos.len(),
            edges = edges.len(),
            "Loaded graph from Postgres"
        );

        Ok(GraphData {
            nodes: videos.into_iter().map(VideoNode::from).collect(),
            edges,
        })
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}
