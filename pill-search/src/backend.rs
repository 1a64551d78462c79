//! Search backends
//!
//! The engine that executes built queries: either the embedded catalog
//! index or a remote Elasticsearch cluster.

use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::catalog::{CatalogError, PillDocument};
use crate::elastic::ElasticClient;
use crate::index::{CatalogIndex, IndexError};
use crate::query::QueryDocument;
use crate::rank::RankedHit;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid search engine URL: {0}")]
    InvalidUrl(String),

    #[error("Search engine returned {status}: {body}")]
    Engine { status: u16, body: String },

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

pub enum Backend {
    Local(RwLock<CatalogIndex>),
    Elastic(ElasticClient),
}

impl Backend {
    pub fn local(index: CatalogIndex) -> Self {
        Backend::Local(RwLock::new(index))
    }

    pub fn elastic(client: ElasticClient) -> Self {
        Backend::Elastic(client)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Backend::Local(_) => "local",
            Backend::Elastic(_) => "elastic",
        }
    }

    /// Execute a query; hits come back sorted by descending score
    pub async fn search(&self, query: &QueryDocument) -> Result<Vec<RankedHit>, BackendError> {
        match self {
            Backend::Local(index) => Ok(index.read().await.search(query)?),
            Backend::Elastic(client) => client.search(query).await,
        }
    }

    /// Add or replace one catalog entry
    pub async fn upsert(&self, pill: &PillDocument) -> Result<(), BackendError> {
        self.upsert_batch(std::slice::from_ref(pill)).await
    }

    /// Add or replace several entries; the local index commits once
    pub async fn upsert_batch(&self, pills: &[PillDocument]) -> Result<(), BackendError> {
        match self {
            Backend::Local(index) => {
                let mut index = index.write().await;
                for pill in pills {
                    index.add_document(pill)?;
                }
                index.commit()?;
            }
            Backend::Elastic(client) => {
                for pill in pills {
                    client.upsert(pill).await?;
                }
            }
        }
        Ok(())
    }

    pub async fn get(&self, item_seq: &str) -> Result<Option<Value>, BackendError> {
        match self {
            Backend::Local(index) => Ok(index.read().await.get(item_seq)?),
            Backend::Elastic(client) => client.get(item_seq).await,
        }
    }

    /// Returns false when no such entry existed
    pub async fn delete(&self, item_seq: &str) -> Result<bool, BackendError> {
        match self {
            Backend::Local(index) => {
                let mut index = index.write().await;
                if index.get(item_seq)?.is_none() {
                    return Ok(false);
                }
                index.delete_document(item_seq)?;
                index.commit()?;
                Ok(true)
            }
            Backend::Elastic(client) => client.delete(item_seq).await,
        }
    }

    /// Number of indexed entries; fails when the engine is unreachable
    pub async fn doc_count(&self) -> Result<u64, BackendError> {
        match self {
            Backend::Local(index) => Ok(index.read().await.stats()?.num_docs),
            Backend::Elastic(client) => client.count().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pill(item_seq: &str) -> PillDocument {
        PillDocument::from_value(json!({
            "item_seq": item_seq,
            "print_front": "KP",
            "drug_shape": "원형",
            "color_classes": "하양",
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_local_crud() {
        let backend = Backend::local(CatalogIndex::in_memory().unwrap());
        assert_eq!(backend.name(), "local");

        backend.upsert_batch(&[pill("1"), pill("2")]).await.unwrap();
        assert_eq!(backend.doc_count().await.unwrap(), 2);
        assert!(backend.get("1").await.unwrap().is_some());

        assert!(backend.delete("1").await.unwrap());
        assert!(!backend.delete("1").await.unwrap());
        assert_eq!(backend.doc_count().await.unwrap(), 1);
    }
}
