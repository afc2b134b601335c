use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use yourtube_engine::{
    api::{create_router, AppState},
    config::Config,
    db,
    services::{
        providers::{GraphProvider, JsonGraphProvider, PostgresGraphProvider, YoutubeStatusProbe},
        EngineFactory,
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "yourtube_engine=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let graph: Arc<dyn GraphProvider> = match (&config.graph_path, &config.database_url) {
        (Some(path), _) => Arc::new(JsonGraphProvider::new(path)),
        (None, Some(url)) => {
            let pool = db::create_pool(url).await?;
            Arc::new(PostgresGraphProvider::new(pool, config.graph_user.clone()))
        }
        (None, None) => anyhow::bail!("Set GRAPH_PATH or DATABASE_URL to locate the watch graph"),
    };
    let probe = Arc::new(YoutubeStatusProbe::new(
        config.probe_url.clone(),
        config.probe_timeout(),
    )?);
    tracing::info!(graph = graph.name(), "Graph provider selected");

    let factory = EngineFactory::new(graph, probe, config.engine_options());
    let state = AppState::initialize(factory, config.default_parameters())
        .await
        .context("Failed to build the recommendation engine")?;

    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Server running");
    axum::serve(listener, app).await?;

    Ok(())
}
