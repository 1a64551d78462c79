use anyhow::{Context, Result};
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;

/// Attributes for a text search
#[derive(Debug, Clone, Default)]
pub struct TextQuery {
    pub imprint: Option<String>,
    pub drug_shape: Option<String>,
    /// Comma separated, primary first
    pub color_classes: Option<String>,
    pub top_k: Option<usize>,
}

impl TextQuery {
    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(imprint) = &self.imprint {
            params.push(("imprint", imprint.clone()));
        }
        if let Some(shape) = &self.drug_shape {
            params.push(("drug_shape", shape.clone()));
        }
        if let Some(colors) = &self.color_classes {
            params.push(("color_classes", colors.clone()));
        }
        if let Some(top_k) = self.top_k {
            params.push(("top_k", top_k.to_string()));
        }
        params
    }
}

pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn health_check(&self) -> bool {
        match self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    pub async fn search(&self, query: &TextQuery) -> Result<Value> {
        let resp = self
            .client
            .get(format!("{}/medicine/text", self.base_url))
            .query(&query.params())
            .send()
            .await
            .context("Failed to reach search service")?;

        Ok(success(resp, "Search failed").await?.json().await?)
    }

    /// Upload a batch of catalog entries
    pub async fn upload(&self, entries: &[Value]) -> Result<Value> {
        let resp = self
            .client
            .post(format!("{}/upload/json", self.base_url))
            .json(entries)
            .send()
            .await
            .context("Failed to reach search service")?;

        Ok(success(resp, "Upload failed").await?.json().await?)
    }

    /// Returns None when the entry does not exist
    pub async fn get_pill(&self, item_seq: &str) -> Result<Option<Value>> {
        let resp = self
            .client
            .get(format!("{}/pill/{}", self.base_url, item_seq))
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        Ok(Some(success(resp, "Lookup failed").await?.json().await?))
    }

    /// Returns false when the entry does not exist
    pub async fn delete_pill(&self, item_seq: &str) -> Result<bool> {
        let resp = self
            .client
            .delete(format!("{}/pill/{}", self.base_url, item_seq))
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }

        success(resp, "Delete failed").await?;
        Ok(true)
    }
}

async fn success(resp: Response, what: &str) -> Result<Response> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("{}: {} {}", what, status, body);
    }
    Ok(resp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pill_search::backend::Backend;
    use pill_search::config::ServiceConfig;
    use pill_search::index::CatalogIndex;
    use pill_search::server::{create_router, AppState};
    use serde_json::json;
    use std::sync::Arc;

    async fn spawn_service() -> String {
        let state = Arc::new(AppState {
            backend: Backend::local(CatalogIndex::in_memory().unwrap()),
            config: ServiceConfig::default(),
        });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, create_router(state)).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_text_query_params() {
        let query = TextQuery {
            imprint: Some("8B".into()),
            color_classes: Some("하양,분홍".into()),
            top_k: Some(3),
            ..TextQuery::default()
        };
        assert_eq!(
            query.params(),
            vec![
                ("imprint", "8B".to_string()),
                ("color_classes", "하양,분홍".to_string()),
                ("top_k", "3".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_round_trip_against_service() {
        let client = ApiClient::new(&spawn_service().await);
        assert!(client.health_check().await);

        let report = client
            .upload(&[
                json!({ "item_seq": "1", "print_front": "KP", "drug_shape": "원형", "color_classes": "하양" }),
                json!({ "drug_shape": "원형" }),
            ])
            .await
            .unwrap();
        assert_eq!(report["inserted"], 1);

        let found = client
            .search(&TextQuery {
                imprint: Some("KP".into()),
                ..TextQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(found["results"][0]["item_seq"], "1");

        assert!(client.get_pill("1").await.unwrap().is_some());
        assert!(client.delete_pill("1").await.unwrap());
        assert!(client.get_pill("1").await.unwrap().is_none());
        assert!(!client.delete_pill("1").await.unwrap());
    }

    #[tokio::test]
    async fn test_search_error_is_reported() {
        let client = ApiClient::new(&spawn_service().await);
        // no attributes: the service answers 400
        let err = client.search(&TextQuery::default()).await.unwrap_err();
        assert!(err.to_string().contains("400"));
    }

    #[tokio::test]
    async fn test_unreachable_service() {
        let client = ApiClient::new("http://127.0.0.1:1/");
        assert!(!client.health_check().await);
    }
}
