//! Interactive question-answering session.
//!
//! Runs the retrieve -> assemble -> generate pipeline for one question at a
//! time while carrying bounded multi-turn history. The exchange is appended
//! to memory only after a successful generation, so a failed call never
//! leaves a half-recorded turn behind.

use crate::config::{MemoryConfig, RetrievalConfig};
use crate::context::ContextAssembler;
use crate::error::AstroQaError;
use crate::generator::GroundedGenerator;
use crate::memory::ConversationMemory;
use crate::retrieval::Retriever;
use crate::types::{Message, RetrievedPassage};

/// A grounded answer together with the passages it was grounded in.
#[derive(Debug, Clone)]
pub struct GroundedAnswer {
    pub answer: String,
    pub passages: Vec<RetrievedPassage>,
}

/// A multi-turn question-answering session.
pub struct ChatSession {
    retriever: Retriever,
    assembler: ContextAssembler,
    generator: GroundedGenerator,
    memory: ConversationMemory,
    top_k: usize,
    mission_filter: Option<String>,
}

impl ChatSession {
    pub fn new(
        retriever: Retriever,
        assembler: ContextAssembler,
        generator: GroundedGenerator,
        memory_config: &MemoryConfig,
        retrieval_config: &RetrievalConfig,
    ) -> Self {
        Self {
            retriever,
            assembler,
            generator,
            memory: ConversationMemory::new(memory_config.max_history_turns),
            top_k: retrieval_config.top_k,
            mission_filter: None,
        }
    }

    /// Restrict retrieval to a single mission (wildcards `all`/`any` mean
    /// unrestricted).
    pub fn set_mission_filter(&mut self, mission: Option<String>) {
        self.mission_filter = mission;
    }

    /// Answer one question, grounded in freshly retrieved passages, with the
    /// current history window as conversational context.
    pub async fn ask(&mut self, question: &str) -> Result<GroundedAnswer, AstroQaError> {
        let passages = self
            .retriever
            .retrieve(question, self.top_k, self.mission_filter.as_deref())
            .await?;
        let context = self.assembler.format(&passages);
        let history: Vec<Message> = self.memory.window().cloned().collect();

        let answer = self.generator.generate(question, &context, &history).await?;

        self.memory.append(Message::user(question));
        self.memory.append(Message::assistant(&answer));

        Ok(GroundedAnswer { answer, passages })
    }

    /// Forget all conversation history.
    pub fn reset(&mut self) {
        self.memory.reset();
    }

    /// Number of turns currently retained.
    pub fn history_len(&self) -> usize {
        self.memory.len()
    }
}
