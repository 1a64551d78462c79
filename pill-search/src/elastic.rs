//! Elasticsearch client
//!
//! Thin HTTP wrapper around the remote catalog index: search, single
//! document CRUD and index bootstrap.

use reqwest::{Client, StatusCode, Url};
use serde_json::{json, Value};

use crate::backend::BackendError;
use crate::catalog::PillDocument;
use crate::query::QueryDocument;
use crate::rank::RankedHit;

/// Index mapping matching the query-side field contract
pub fn index_mapping() -> Value {
    let print_field = json!({
        "type": "text",
        "fields": {
            "keyword": { "type": "keyword" },
            "english": { "type": "text", "analyzer": "english" }
        }
    });

    json!({
        "mappings": {
            "properties": {
                "item_seq": { "type": "keyword" },
                "print_front": print_field,
                "print_back": print_field,
                "drug_shape": { "type": "keyword" },
                "color_classes": { "type": "keyword" },
                "shape_group": { "type": "keyword" },
                "color_group": { "type": "keyword" },
                "mark_code_front_anal": { "type": "text" },
                "mark_code_back_anal": { "type": "text" }
            }
        }
    })
}

/// Extract `(score, _source)` pairs from a `_search` response body.
/// Hits without a numeric score count as 0.
pub fn parse_hits(body: &Value) -> Vec<RankedHit> {
    body["hits"]["hits"]
        .as_array()
        .map(|hits| {
            hits.iter()
                .map(|hit| RankedHit {
                    score: hit["_score"].as_f64().unwrap_or(0.0) as f32,
                    document: hit.get("_source").cloned().unwrap_or(Value::Null),
                })
                .collect()
        })
        .unwrap_or_default()
}

pub struct ElasticClient {
    client: Client,
    base_url: String,
    index: String,
}

impl ElasticClient {
    pub fn new(base_url: &str, index: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            index: index.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.index, path)
    }

    /// `{base}/{index}/_doc/{item_seq}` with every segment percent-encoded
    fn doc_url(&self, item_seq: &str) -> Result<Url, BackendError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| BackendError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| BackendError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend([self.index.as_str(), "_doc", item_seq]);
        Ok(url)
    }

    pub async fn ping(&self) -> bool {
        match self.client.get(&self.base_url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    /// Create the index with [`index_mapping`] unless it already exists.
    /// Returns true when the index was created.
    pub async fn ensure_index(&self) -> Result<bool, BackendError> {
        let index_url = format!("{}/{}", self.base_url, self.index);
        let exists = self.client.head(&index_url).send().await?;
        if exists.status().is_success() {
            return Ok(false);
        }

        let resp = self.client.put(&index_url).json(&index_mapping()).send().await?;
        check(resp).await?;
        Ok(true)
    }

    pub async fn search(&self, query: &QueryDocument) -> Result<Vec<RankedHit>, BackendError> {
        let resp = self
            .client
            .post(self.url("_search"))
            .json(&query.to_json())
            .send()
            .await?;

        let body: Value = check(resp).await?.json().await?;
        Ok(parse_hits(&body))
    }

    pub async fn upsert(&self, pill: &PillDocument) -> Result<(), BackendError> {
        let resp = self
            .client
            .put(self.doc_url(&pill.item_seq)?)
            .query(&[("refresh", "wait_for")])
            .json(&pill.to_source()?)
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    pub async fn get(&self, item_seq: &str) -> Result<Option<Value>, BackendError> {
        let resp = self
            .client
            .get(self.doc_url(item_seq)?)
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body: Value = check(resp).await?.json().await?;
        Ok(body.get("_source").cloned())
    }

    /// Returns false when no such entry existed
    pub async fn delete(&self, item_seq: &str) -> Result<bool, BackendError> {
        let resp = self
            .client
            .delete(self.doc_url(item_seq)?)
            .query(&[("refresh", "wait_for")])
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check(resp).await?;
        Ok(true)
    }

    pub async fn count(&self) -> Result<u64, BackendError> {
        let resp = self.client.get(self.url("_count")).send().await?;
        let body: Value = check(resp).await?.json().await?;
        Ok(body["count"].as_u64().unwrap_or(0))
    }
}

async fn check(resp: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(BackendError::Engine {
        status: status.as_u16(),
        body,
    })
}
