use sqlx::{postgres::PgPoolOptions, PgPool};

/// Creates the pool the graph provider reads through
///
/// Graph loads happen once per refresh, so a handful of connections is plenty.
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url)
        .await?;

    tracing::info!("Connected to graph store");
    Ok(pool)
}
