//! AstroQA core library.
//!
//! Retrieval-grounded question answering over NASA mission documents:
//! a vector-store retrieval gateway, context assembly with source
//! attribution, bounded conversation memory, LLM-backed grounded
//! generation, and a batch evaluation orchestrator with aggregate
//! quality metrics.

pub mod batch;
pub mod brain;
pub mod config;
pub mod context;
pub mod error;
pub mod evaluation;
pub mod generator;
pub mod memory;
pub mod providers;
pub mod retrieval;
pub mod session;
pub mod types;

// Re-export commonly used types at the crate root
pub use batch::{AggregateReport, BatchRunner, EvaluationResult, QuestionRecord, load_questions};
pub use brain::{ChatCompleter, MockChatCompleter};
pub use config::{AppConfig, LlmConfig, MemoryConfig, RetrievalConfig, load_config, resolve_api_key};
pub use context::ContextAssembler;
pub use error::{AstroQaError, Result};
pub use evaluation::{Evaluator, HttpEvaluator, MetricsOutcome, MockEvaluator};
pub use generator::GroundedGenerator;
pub use memory::ConversationMemory;
pub use providers::OpenAiCompatibleProvider;
pub use retrieval::{ChromaStore, MockVectorStore, Retriever, VectorStore};
pub use session::{ChatSession, GroundedAnswer};
pub use types::{Message, RetrievedPassage, Role};
