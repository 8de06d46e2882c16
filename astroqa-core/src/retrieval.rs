//! Retrieval gateway over an external vector store.
//!
//! `VectorStore` is the capability trait for similarity search; `ChromaStore`
//! implements it against a Chroma-style REST endpoint. `Retriever` is the
//! policy layer: it validates inputs, applies wildcard filter handling, maps
//! the raw index-aligned response into `RetrievedPassage` values, and coerces
//! backend failures into an empty result so one bad retrieval never aborts a
//! batch run.

use crate::config::RetrievalConfig;
use crate::error::RetrievalError;
use crate::types::RetrievedPassage;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// Filter values treated as "no filter".
const WILDCARD_FILTERS: [&str; 2] = ["all", "any"];

/// Raw similarity-search response, index-aligned by position.
///
/// The nested shape mirrors the store's per-query batching: the outer list
/// has one row per query text, the inner list one entry per result.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub documents: Vec<Vec<String>>,
    #[serde(default)]
    pub metadatas: Vec<Vec<Map<String, Value>>>,
}

/// Trait for vector store backends.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Run a similarity search for `text`, returning up to `top_k` results.
    async fn query(
        &self,
        text: &str,
        top_k: usize,
        filter: Option<&Value>,
    ) -> Result<QueryResponse, RetrievalError>;
}

/// HTTP client for a Chroma-style vector store.
pub struct ChromaStore {
    client: Client,
    base_url: String,
    collection: String,
}

impl ChromaStore {
    pub fn new(config: &RetrievalConfig) -> Result<Self, RetrievalError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RetrievalError::Backend {
                message: format!("Failed to build HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            collection: config.collection.clone(),
        })
    }
}

#[async_trait]
impl VectorStore for ChromaStore {
    async fn query(
        &self,
        text: &str,
        top_k: usize,
        filter: Option<&Value>,
    ) -> Result<QueryResponse, RetrievalError> {
        let url = format!(
            "{}/api/v1/collections/{}/query",
            self.base_url, self.collection
        );

        let mut body = json!({
            "query_texts": [text],
            "n_results": top_k,
            "include": ["documents", "metadatas"],
        });
        if let Some(filter) = filter {
            body["where"] = filter.clone();
        }

        debug!(url = %url, top_k = top_k, "Querying vector store");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RetrievalError::Backend {
                message: format!("Query request failed: {}", e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Backend {
                message: format!("HTTP {}: {}", status, body_text),
            });
        }

        response
            .json::<QueryResponse>()
            .await
            .map_err(|e| RetrievalError::MalformedResponse {
                message: format!("Invalid query response: {}", e),
            })
    }
}

/// A mock vector store for testing.
///
/// Responses are queued and returned in order; received queries are recorded
/// so tests can assert that no call was issued (or what filter was sent).
pub struct MockVectorStore {
    responses: Mutex<Vec<Result<QueryResponse, RetrievalError>>>,
    queries: Mutex<Vec<(String, usize, Option<Value>)>>,
}

impl MockVectorStore {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Create a store that repeatedly returns the given documents with empty
    /// metadata.
    pub fn with_documents(docs: &[&str]) -> Self {
        let store = Self::new();
        for _ in 0..20 {
            store.queue_response(Ok(QueryResponse {
                documents: vec![docs.iter().map(|d| d.to_string()).collect()],
                metadatas: vec![docs.iter().map(|_| Map::new()).collect()],
            }));
        }
        store
    }

    pub fn queue_response(&self, response: Result<QueryResponse, RetrievalError>) {
        self.responses.lock().unwrap().push(response);
    }

    /// Queries received so far, in call order.
    pub fn queries(&self) -> Vec<(String, usize, Option<Value>)> {
        self.queries.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

impl Default for MockVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for MockVectorStore {
    async fn query(
        &self,
        text: &str,
        top_k: usize,
        filter: Option<&Value>,
    ) -> Result<QueryResponse, RetrievalError> {
        self.queries
            .lock()
            .unwrap()
            .push((text.to_string(), top_k, filter.cloned()));
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(QueryResponse::default())
        } else {
            responses.remove(0)
        }
    }
}

/// The retrieval gateway.
pub struct Retriever {
    store: Arc<dyn VectorStore>,
}

impl Retriever {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }

    /// Retrieve up to `top_k` passages for `query`, most relevant first.
    ///
    /// Backend and malformed-response failures are logged and coerced into an
    /// empty passage list; callers that need strict failure visibility should
    /// treat an empty result as a possible outage signal. Invalid inputs
    /// (empty query, zero `top_k`) are caller bugs and do error.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        mission_filter: Option<&str>,
    ) -> Result<Vec<RetrievedPassage>, RetrievalError> {
        if query.trim().is_empty() {
            return Err(RetrievalError::InvalidQuery {
                reason: "query must be non-empty".to_string(),
            });
        }
        if top_k == 0 {
            return Err(RetrievalError::InvalidQuery {
                reason: "top_k must be at least 1".to_string(),
            });
        }

        let filter = mission_filter
            .filter(|m| !is_wildcard(m))
            .map(|m| json!({ "mission": m }));

        match self.store.query(query, top_k, filter.as_ref()).await {
            Ok(response) => Ok(Self::into_passages(response)),
            Err(e) => {
                warn!(error = %e, "Document retrieval failed, continuing with empty context");
                Ok(Vec::new())
            }
        }
    }

    /// Map the first result row into passages, defending against absent
    /// containers and row-length mismatches.
    fn into_passages(response: QueryResponse) -> Vec<RetrievedPassage> {
        let documents = response.documents.into_iter().next().unwrap_or_default();
        let metadatas = response.metadatas.into_iter().next().unwrap_or_default();

        documents
            .into_iter()
            .enumerate()
            .map(|(i, text)| {
                let meta = metadatas.get(i);
                RetrievedPassage {
                    text,
                    source_id: meta.map(source_id_from_meta).unwrap_or_default(),
                    mission: meta.and_then(|m| string_field(m, "mission")),
                    category: meta.and_then(|m| string_field(m, "category")),
                }
            })
            .collect()
    }
}

/// Attribution identifier from passage metadata: `doc_id` first, then
/// `source`; empty when the metadata carries neither.
fn source_id_from_meta(meta: &Map<String, Value>) -> String {
    string_field(meta, "doc_id")
        .or_else(|| string_field(meta, "source"))
        .unwrap_or_default()
}

fn string_field(meta: &Map<String, Value>, key: &str) -> Option<String> {
    meta.get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn is_wildcard(filter: &str) -> bool {
    WILDCARD_FILTERS
        .iter()
        .any(|w| filter.eq_ignore_ascii_case(w))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn meta(pairs: &[(&str, &str)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect()
    }

    #[tokio::test]
    async fn test_retrieve_maps_documents_and_metadata() {
        let store = MockVectorStore::new();
        store.queue_response(Ok(QueryResponse {
            documents: vec![vec!["Apollo 11 text".into(), "Voyager text".into()]],
            metadatas: vec![vec![
                meta(&[("doc_id", "apollo_11"), ("mission", "apollo 11")]),
                meta(&[("source", "voyager_overview"), ("category", "probes")]),
            ]],
        }));

        let retriever = Retriever::new(Arc::new(store));
        let passages = retriever.retrieve("apollo", 2, None).await.unwrap();

        assert_eq!(passages.len(), 2);
        assert_eq!(passages[0].source_id, "apollo_11");
        assert_eq!(passages[0].mission.as_deref(), Some("apollo 11"));
        assert_eq!(passages[1].source_id, "voyager_overview");
        assert_eq!(passages[1].category.as_deref(), Some("probes"));
    }

    #[tokio::test]
    async fn test_retrieve_doc_id_takes_priority_over_source() {
        let store = MockVectorStore::new();
        store.queue_response(Ok(QueryResponse {
            documents: vec![vec!["text".into()]],
            metadatas: vec![vec![meta(&[("doc_id", "primary"), ("source", "fallback")])]],
        }));

        let retriever = Retriever::new(Arc::new(store));
        let passages = retriever.retrieve("q", 1, None).await.unwrap();
        assert_eq!(passages[0].source_id, "primary");
    }

    #[tokio::test]
    async fn test_retrieve_missing_metadata_row_yields_empty_source() {
        let store = MockVectorStore::new();
        store.queue_response(Ok(QueryResponse {
            documents: vec![vec!["a".into(), "b".into()]],
            metadatas: vec![vec![meta(&[("doc_id", "first")])]],
        }));

        let retriever = Retriever::new(Arc::new(store));
        let passages = retriever.retrieve("q", 2, None).await.unwrap();
        assert_eq!(passages[0].source_id, "first");
        assert_eq!(passages[1].source_id, "");
    }

    #[tokio::test]
    async fn test_retrieve_backend_error_coerced_to_empty() {
        let store = MockVectorStore::new();
        store.queue_response(Err(RetrievalError::Backend {
            message: "store unreachable".into(),
        }));

        let retriever = Retriever::new(Arc::new(store));
        let passages = retriever.retrieve("q", 3, None).await.unwrap();
        assert!(passages.is_empty());
    }

    #[tokio::test]
    async fn test_retrieve_absent_containers_yield_empty() {
        let store = MockVectorStore::new();
        store.queue_response(Ok(QueryResponse::default()));

        let retriever = Retriever::new(Arc::new(store));
        let passages = retriever.retrieve("q", 3, None).await.unwrap();
        assert!(passages.is_empty());
    }

    #[tokio::test]
    async fn test_retrieve_rejects_empty_query() {
        let retriever = Retriever::new(Arc::new(MockVectorStore::new()));
        let result = retriever.retrieve("   ", 3, None).await;
        assert!(matches!(result, Err(RetrievalError::InvalidQuery { .. })));
    }

    #[tokio::test]
    async fn test_retrieve_rejects_zero_top_k() {
        let retriever = Retriever::new(Arc::new(MockVectorStore::new()));
        let result = retriever.retrieve("q", 0, None).await;
        assert!(matches!(result, Err(RetrievalError::InvalidQuery { .. })));
    }

    #[tokio::test]
    async fn test_wildcard_filter_is_dropped() {
        let store = Arc::new(MockVectorStore::with_documents(&["doc"]));
        let retriever = Retriever::new(store.clone());

        retriever.retrieve("q", 1, Some("All")).await.unwrap();
        retriever.retrieve("q", 1, Some("any")).await.unwrap();

        let queries = store.queries();
        assert_eq!(queries.len(), 2);
        assert!(queries[0].2.is_none());
        assert!(queries[1].2.is_none());
    }

    #[tokio::test]
    async fn test_mission_filter_is_forwarded() {
        let store = Arc::new(MockVectorStore::with_documents(&["doc"]));
        let retriever = Retriever::new(store.clone());

        retriever.retrieve("q", 1, Some("Apollo 11")).await.unwrap();

        let queries = store.queries();
        assert_eq!(queries[0].2, Some(json!({ "mission": "Apollo 11" })));
    }

    #[test]
    fn test_query_response_tolerates_missing_fields() {
        let parsed: QueryResponse = serde_json::from_str(r#"{"documents": [["a"]]}"#).unwrap();
        assert_eq!(parsed.documents.len(), 1);
        assert!(parsed.metadatas.is_empty());

        let parsed: QueryResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.documents.is_empty());
    }
}
