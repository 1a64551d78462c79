//! Pill Search - identification service
//!
//! HTTP front end over the pill search pipeline, backed by an embedded
//! Tantivy catalog or a remote Elasticsearch index.

use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pill_search::backend::Backend;
use pill_search::config::{load_config, BackendKind};
use pill_search::elastic::ElasticClient;
use pill_search::index::CatalogIndex;
use pill_search::server::{create_router, AppState};

const CONFIG_ENV: &str = "PILL_SEARCH_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "pill-search.toml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::var(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = load_config(&config_path)?;

    let backend = match config.backend {
        BackendKind::Local => {
            tracing::info!("Opening catalog index at {}", config.data_dir);
            Backend::local(CatalogIndex::new(&config.data_dir)?)
        }
        BackendKind::Elastic => {
            let client = ElasticClient::new(&config.elastic_url, &config.elastic_index);
            if client.ping().await {
                if client.ensure_index().await? {
                    tracing::info!("Created index {}", config.elastic_index);
                }
            } else {
                // searches degrade to empty results until the cluster is up
                tracing::warn!("Elasticsearch at {} is unreachable", config.elastic_url);
            }
            Backend::elastic(client)
        }
    };

    let addr = config.bind_addr();
    let state = Arc::new(AppState { backend, config });
    let app = create_router(state);

    tracing::info!("Starting pill search service on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
