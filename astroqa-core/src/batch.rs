//! Batch evaluation orchestrator.
//!
//! Drives the full retrieve -> assemble -> generate -> evaluate pipeline over
//! a fixed question set, collects per-question results while continuing past
//! individual failures, and folds the scores into aggregate means. The report
//! always holds exactly one entry per input question, so the aggregate
//! denominator is never ambiguous.

use crate::context::ContextAssembler;
use crate::error::BatchError;
use crate::evaluation::{Evaluator, MetricsOutcome};
use crate::generator::GroundedGenerator;
use crate::memory::ConversationMemory;
use crate::retrieval::Retriever;
use crate::types::Message;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Minimum number of questions required for a batch run.
pub const MIN_QUESTIONS: usize = 5;

/// One entry of the input question set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRecord {
    /// Optional identifier carried through logs (string or number in JSON).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    pub question: String,
}

impl QuestionRecord {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            id: None,
            question: question.into(),
        }
    }

    /// Display label: the record's id if present, else its 1-based position.
    fn label(&self, index: usize) -> String {
        match &self.id {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => (index + 1).to_string(),
        }
    }
}

/// Load a question set from a JSON array of `{id?, question}` records, or
/// from a plain-text file with one question per line (blank lines skipped).
pub fn load_questions(path: &Path) -> Result<Vec<QuestionRecord>, BatchError> {
    let content = std::fs::read_to_string(path).map_err(|e| BatchError::QuestionLoad {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    if content.trim_start().starts_with('[') {
        serde_json::from_str(&content).map_err(|e| BatchError::QuestionLoad {
            path: path.display().to_string(),
            message: format!("invalid JSON question set: {}", e),
        })
    } else {
        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(QuestionRecord::new)
            .collect())
    }
}

/// The outcome of one evaluated question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub question: String,
    pub answer: String,
    pub metrics: MetricsOutcome,
}

/// The full batch report: one entry per input question, in input order, plus
/// the mean of every metric across the results where it was scored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateReport {
    pub per_question: Vec<EvaluationResult>,
    pub aggregate: BTreeMap<String, f64>,
}

impl AggregateReport {
    /// Persist the report as a single pretty-printed JSON artifact.
    pub fn write_to(&self, path: &Path) -> Result<(), BatchError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| BatchError::ReportWrite {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        std::fs::write(path, json).map_err(|e| BatchError::ReportWrite {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}

/// Drives the pipeline over a question set.
pub struct BatchRunner {
    retriever: Retriever,
    assembler: ContextAssembler,
    generator: GroundedGenerator,
    evaluator: Arc<dyn Evaluator>,
    top_k: usize,
    max_history_turns: usize,
}

impl BatchRunner {
    pub fn new(
        retriever: Retriever,
        assembler: ContextAssembler,
        generator: GroundedGenerator,
        evaluator: Arc<dyn Evaluator>,
        top_k: usize,
        max_history_turns: usize,
    ) -> Self {
        Self {
            retriever,
            assembler,
            generator,
            evaluator,
            top_k,
            max_history_turns,
        }
    }

    /// Run the pipeline over every question, in input order.
    ///
    /// Fails fast when the question set is below `MIN_QUESTIONS`, before any
    /// external call. Afterwards every question produces exactly one result:
    /// retrieval outages degrade to empty context, generation failures are
    /// recorded as error-tagged entries, and evaluation failures become the
    /// `Failed` metrics sentinel. The run always terminates with a complete
    /// report.
    pub async fn run(&self, questions: &[QuestionRecord]) -> Result<AggregateReport, BatchError> {
        if questions.len() < MIN_QUESTIONS {
            return Err(BatchError::TooFewQuestions {
                found: questions.len(),
                required: MIN_QUESTIONS,
            });
        }

        info!(total = questions.len(), "Starting batch evaluation");
        let mut per_question = Vec::with_capacity(questions.len());

        for (index, record) in questions.iter().enumerate() {
            // Metric scoring assumes independence between questions, so each
            // one starts from a freshly reset conversation window.
            let memory = ConversationMemory::new(self.max_history_turns);
            let history: Vec<Message> = memory.window().cloned().collect();

            info!(
                id = %record.label(index),
                question = %record.question,
                "Processing question"
            );

            per_question.push(self.process_question(record, &history).await);
        }

        let aggregate = aggregate_metrics(&per_question);
        info!(
            questions = per_question.len(),
            metrics = aggregate.len(),
            "Batch evaluation complete"
        );

        Ok(AggregateReport {
            per_question,
            aggregate,
        })
    }

    /// One question through the full pipeline. Always returns a result entry.
    async fn process_question(
        &self,
        record: &QuestionRecord,
        history: &[Message],
    ) -> EvaluationResult {
        let passages = match self.retriever.retrieve(&record.question, self.top_k, None).await {
            Ok(passages) => passages,
            Err(e) => {
                warn!(error = %e, "Retrieval rejected question, continuing with empty context");
                Vec::new()
            }
        };
        if passages.is_empty() {
            warn!(question = %record.question, "No passages retrieved, generating from empty context");
        }

        let context = self.assembler.format(&passages);

        let answer = match self.generator.generate(&record.question, &context, history).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(error = %e, "Generation failed, recording error entry");
                return EvaluationResult {
                    question: record.question.clone(),
                    answer: String::new(),
                    metrics: MetricsOutcome::Failed {
                        error: format!("generation failed: {}", e),
                    },
                };
            }
        };

        let contexts: Vec<String> = passages.into_iter().map(|p| p.text).collect();
        let metrics = match self
            .evaluator
            .evaluate(&record.question, &answer, &contexts)
            .await
        {
            Ok(scores) => MetricsOutcome::Scored(scores),
            Err(e) => {
                warn!(error = %e, "Evaluation failed, recording error sentinel");
                MetricsOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        EvaluationResult {
            question: record.question.clone(),
            answer,
            metrics,
        }
    }
}

/// Mean score per metric name across all results where the metric was scored.
///
/// Error sentinels contribute nothing; a metric present in only some results
/// is averaged over those results only (no imputation).
pub fn aggregate_metrics(results: &[EvaluationResult]) -> BTreeMap<String, f64> {
    let mut values: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for result in results {
        if let Some(scores) = result.metrics.scores() {
            for (name, value) in scores {
                values.entry(name.clone()).or_default().push(*value);
            }
        }
    }

    values
        .into_iter()
        .map(|(name, scores)| {
            let mean = scores.iter().sum::<f64>() / scores.len() as f64;
            (name, mean)
        })
        .collect()
}
