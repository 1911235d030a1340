use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use kentgraph_common::Config;
use kentgraph_graph::{migrate, GraphClient, Repository};

mod rest;
mod routes;

pub struct AppState {
    pub repo: Repository,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("kentgraph=info".parse()?))
        .init();

    let config = Config::from_env()?;

    let client = GraphClient::connect(&config).await?;
    if config.apply_schema {
        migrate::migrate(&client).await?;
    }

    let state = Arc::new(AppState {
        repo: Repository::new(Arc::new(client)),
    });
    let app = routes::router(state);

    let addr = config.api_addr();
    info!("kentgraph API starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
