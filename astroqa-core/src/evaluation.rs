//! Quality evaluation of generated answers.
//!
//! `Evaluator` is the boundary to an external scoring service that computes
//! quality metrics (faithfulness, relevance, ...) for a (question, answer,
//! contexts) triple. The contexts are the raw retrieved passage texts, not
//! the formatted context block. `MetricsOutcome` carries either real scores
//! or an error sentinel; the sentinel is excluded from aggregation.

use crate::config::EvalConfig;
use crate::error::EvalError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

/// Metric scores for one answer, or the error sentinel when scoring failed.
///
/// Serializes as either a plain `{metric: score}` object or `{"error": msg}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricsOutcome {
    Scored(BTreeMap<String, f64>),
    Failed { error: String },
}

impl MetricsOutcome {
    /// The numeric scores, when present.
    pub fn scores(&self) -> Option<&BTreeMap<String, f64>> {
        match self {
            MetricsOutcome::Scored(scores) => Some(scores),
            MetricsOutcome::Failed { .. } => None,
        }
    }
}

/// Trait for answer-quality evaluation backends.
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Score `answer` against `question` and the raw retrieved `contexts`.
    async fn evaluate(
        &self,
        question: &str,
        answer: &str,
        contexts: &[String],
    ) -> Result<BTreeMap<String, f64>, EvalError>;
}

/// HTTP client for an external evaluation service.
pub struct HttpEvaluator {
    client: Client,
    base_url: String,
}

impl HttpEvaluator {
    pub fn new(config: &EvalConfig) -> Result<Self, EvalError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EvalError::Service {
                message: format!("Failed to build HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    /// Keep numeric entries of the response object, dropping anything else.
    fn scores_from_response(body: &Value) -> Result<BTreeMap<String, f64>, EvalError> {
        let object = body.as_object().ok_or_else(|| EvalError::MalformedResponse {
            message: "expected a metric object".to_string(),
        })?;

        let mut scores = BTreeMap::new();
        for (name, value) in object {
            match value.as_f64() {
                Some(score) => {
                    scores.insert(name.clone(), score);
                }
                None => {
                    debug!(metric = %name, "Dropping non-numeric metric value");
                }
            }
        }
        Ok(scores)
    }
}

#[async_trait]
impl Evaluator for HttpEvaluator {
    async fn evaluate(
        &self,
        question: &str,
        answer: &str,
        contexts: &[String],
    ) -> Result<BTreeMap<String, f64>, EvalError> {
        let url = format!("{}/evaluate", self.base_url);
        let body = json!({
            "question": question,
            "answer": answer,
            "contexts": contexts,
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| EvalError::Service {
                message: format!("Evaluation request failed: {}", e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(EvalError::Service {
                message: format!("HTTP {}: {}", status, body_text),
            });
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| EvalError::MalformedResponse {
                message: format!("Invalid JSON: {}", e),
            })?;

        Self::scores_from_response(&json)
    }
}

/// A mock evaluator for testing.
pub struct MockEvaluator {
    responses: Mutex<Vec<Result<BTreeMap<String, f64>, EvalError>>>,
    calls: Mutex<Vec<(String, String, Vec<String>)>>,
}

impl MockEvaluator {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Create an evaluator that repeatedly returns the given scores.
    pub fn with_scores(scores: &[(&str, f64)]) -> Self {
        let evaluator = Self::new();
        for _ in 0..20 {
            evaluator.queue_response(Ok(scores
                .iter()
                .map(|(name, value)| (name.to_string(), *value))
                .collect()));
        }
        evaluator
    }

    pub fn queue_response(&self, response: Result<BTreeMap<String, f64>, EvalError>) {
        self.responses.lock().unwrap().push(response);
    }

    /// (question, answer, contexts) triples received so far.
    pub fn calls(&self) -> Vec<(String, String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Default for MockEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Evaluator for MockEvaluator {
    async fn evaluate(
        &self,
        question: &str,
        answer: &str,
        contexts: &[String],
    ) -> Result<BTreeMap<String, f64>, EvalError> {
        self.calls.lock().unwrap().push((
            question.to_string(),
            answer.to_string(),
            contexts.to_vec(),
        ));
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(BTreeMap::new())
        } else {
            responses.remove(0)
        }
    }
}
