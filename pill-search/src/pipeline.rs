//! Search pipeline: normalize, build, execute, rank-filter.

use serde::Serialize;

use crate::backend::Backend;
use crate::config::SearchSettings;
use crate::normalize::{normalize, NormalizedFeatures, RawFeatures};
use crate::query::{QueryBuilder, QueryDocument};
use crate::rank::{filter_with_config, RankedHit};

/// Result of one pill search
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub features: NormalizedFeatures,
    pub hits: Vec<RankedHit>,
    /// Hits returned by the engine before filtering
    pub total_hits: usize,
    pub cutoff: usize,
    pub gap_cutoff: usize,
    pub threshold_cutoff: usize,
}

/// Normalize `raw` and build the query for it
pub fn plan_search(
    raw: &RawFeatures,
    top_k: usize,
    settings: &SearchSettings,
) -> (NormalizedFeatures, QueryDocument) {
    let features = normalize(raw);
    let query = QueryBuilder::new(settings.boosts.clone()).build(&features, top_k.max(1));
    tracing::debug!(body = %query.to_json(), "pill query");
    (features, query)
}

/// Apply the rank filter to the engine's hits
pub fn rank_outcome(
    features: NormalizedFeatures,
    hits: Vec<RankedHit>,
    top_k: usize,
    settings: &SearchSettings,
) -> SearchOutcome {
    let total_hits = hits.len();
    let decision = filter_with_config(hits, top_k.max(1), &settings.ranking);

    SearchOutcome {
        features,
        hits: decision.hits,
        total_hits,
        cutoff: decision.cutoff,
        gap_cutoff: decision.gap_cutoff,
        threshold_cutoff: decision.threshold_cutoff,
    }
}

/// Run a full pill search against `backend`.
///
/// Engine failures degrade to zero hits and are logged, never returned.
pub async fn search_pills(
    backend: &Backend,
    raw: &RawFeatures,
    top_k: usize,
    settings: &SearchSettings,
) -> SearchOutcome {
    let (features, query) = plan_search(raw, top_k, settings);

    let hits = match backend.search(&query).await {
        Ok(hits) => hits,
        Err(e) => {
            tracing::warn!(
                backend = backend.name(),
                error = %e,
                "pill search failed, returning no hits"
            );
            Vec::new()
        }
    };

    rank_outcome(features, hits, top_k, settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PillDocument;
    use crate::elastic::ElasticClient;
    use crate::index::CatalogIndex;
    use crate::normalize::ColorClasses;
    use serde_json::json;

    async fn backend() -> Backend {
        let backend = Backend::local(CatalogIndex::in_memory().unwrap());
        let pills = [
            json!({"item_seq": "1", "print_front": "A10", "drug_shape": "원형", "color_classes": "하양"}),
            json!({"item_seq": "2", "print_front": "KP", "drug_shape": "원형", "color_classes": "하양"}),
            json!({"item_seq": "3", "print_front": "8B", "drug_shape": "타원형", "color_classes": ["하양", "분홍"]}),
        ];
        let pills: Vec<PillDocument> = pills
            .into_iter()
            .map(|p| PillDocument::from_value(p).unwrap())
            .collect();
        backend.upsert_batch(&pills).await.unwrap();
        backend
    }

    fn raw(shape: &str, color: &str, imprint: &str) -> RawFeatures {
        RawFeatures {
            drug_shape: Some(shape.to_string()),
            color_classes: Some(ColorClasses::One(color.to_string())),
            imprint: Some(imprint.to_string()),
        }
    }

    #[tokio::test]
    async fn test_exact_imprint_wins() {
        let backend = backend().await;
        let outcome =
            search_pills(&backend, &raw("원형", "하양", "A10"), 8, &SearchSettings::default()).await;

        assert_eq!(outcome.features.shape_group.as_deref(), Some("원형"));
        assert!(!outcome.hits.is_empty());
        assert_eq!(outcome.hits[0].document["item_seq"], "1");
        assert!(outcome.hits.len() <= outcome.total_hits);
        assert_eq!(outcome.cutoff, outcome.hits.len());
    }

    #[tokio::test]
    async fn test_confused_imprint_is_recovered() {
        let backend = backend().await;
        // "BB" is a single-substitution misread of "8B"
        let outcome =
            search_pills(&backend, &raw("타원형", "하양", "BB"), 8, &SearchSettings::default()).await;
        assert_eq!(outcome.hits[0].document["item_seq"], "3");
    }

    #[tokio::test]
    async fn test_top_k_caps_results() {
        let backend = backend().await;
        let raw = RawFeatures {
            drug_shape: Some("원형".to_string()),
            ..RawFeatures::default()
        };
        let outcome = search_pills(&backend, &raw, 1, &SearchSettings::default()).await;
        assert_eq!(outcome.hits.len(), 1);
    }

    #[tokio::test]
    async fn test_engine_failure_degrades_to_empty() {
        let backend = Backend::elastic(ElasticClient::new("http://127.0.0.1:1", "pills"));
        let outcome =
            search_pills(&backend, &raw("원형", "하양", "A10"), 8, &SearchSettings::default()).await;

        assert!(outcome.hits.is_empty());
        assert_eq!(outcome.total_hits, 0);
        assert_eq!(outcome.cutoff, 0);
    }

    #[test]
    fn test_plan_and_rank_without_engine() {
        let settings = SearchSettings::default();
        let (features, query) = plan_search(&raw("원형", "하양", "A10"), 0, &settings);
        assert_eq!(features.imprint, "A10");
        assert_eq!(query.size, 1);

        let outcome = rank_outcome(features, Vec::new(), 0, &settings);
        assert!(outcome.hits.is_empty());
        assert_eq!(outcome.total_hits, 0);
        assert_eq!(outcome.cutoff, 0);
    }
}
