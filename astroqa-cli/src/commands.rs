//! Command handlers for the AstroQA CLI.

use astroqa_core::batch::MIN_QUESTIONS;
use astroqa_core::context::attribution_label;
use astroqa_core::{
    AppConfig, BatchRunner, ChatSession, ChromaStore, ContextAssembler, GroundedGenerator,
    HttpEvaluator, OpenAiCompatibleProvider, Retriever, load_questions, resolve_api_key,
};
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Build the retrieval + generation pipeline pieces shared by all modes.
fn build_pipeline(
    config: &AppConfig,
) -> anyhow::Result<(Retriever, ContextAssembler, GroundedGenerator)> {
    // Credential check happens before any external call
    let api_key = resolve_api_key(&config.llm)?;
    let provider = Arc::new(OpenAiCompatibleProvider::new_with_key(
        &config.llm,
        api_key,
    )?);
    let store = Arc::new(ChromaStore::new(&config.retrieval)?);

    Ok((
        Retriever::new(store),
        ContextAssembler::new(config.retrieval.max_passage_chars),
        GroundedGenerator::new(provider, &config.llm),
    ))
}

fn build_session(config: &AppConfig, mission: Option<String>) -> anyhow::Result<ChatSession> {
    let (retriever, assembler, generator) = build_pipeline(config)?;
    let mut session = ChatSession::new(
        retriever,
        assembler,
        generator,
        &config.memory,
        &config.retrieval,
    );
    session.set_mission_filter(mission);
    Ok(session)
}

fn print_answer(result: &astroqa_core::GroundedAnswer) {
    println!("\n\x1b[32mAstroQA:\x1b[0m {}", result.answer);
    if !result.passages.is_empty() {
        let labels: Vec<String> = result
            .passages
            .iter()
            .enumerate()
            .map(|(i, p)| attribution_label(p, i + 1))
            .collect();
        println!("\x1b[90m  sources: {}\x1b[0m", labels.join(", "));
    }
}

/// Answer a single question and exit.
pub async fn run_ask(
    config: &AppConfig,
    question: &str,
    mission: Option<String>,
) -> anyhow::Result<()> {
    let mut session = build_session(config, mission)?;
    let result = session.ask(question).await?;
    print_answer(&result);
    Ok(())
}

/// Interactive multi-turn chat loop.
pub async fn run_chat(config: &AppConfig, mission: Option<String>) -> anyhow::Result<()> {
    let mut session = build_session(config, mission)?;

    println!("AstroQA interactive mode. Ask about NASA missions.");
    println!("Commands: /reset clears history, /quit exits.\n");

    let stdin = io::stdin();
    loop {
        print!("\x1b[36mYou >\x1b[0m ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }
        let input = line.trim();

        match input {
            "" => continue,
            "/quit" | "/exit" => break,
            "/reset" => {
                session.reset();
                println!("\x1b[90m  history cleared.\x1b[0m");
                continue;
            }
            question => match session.ask(question).await {
                Ok(result) => print_answer(&result),
                Err(e) => eprintln!("\x1b[31mError:\x1b[0m {}", e),
            },
        }
    }

    Ok(())
}

/// Batch evaluation over a question set, writing the report at the end.
pub async fn run_eval(
    config: &AppConfig,
    questions_path: &Path,
    output_path: &Path,
) -> anyhow::Result<()> {
    let questions = load_questions(questions_path)?;
    info!(
        count = questions.len(),
        path = %questions_path.display(),
        "Loaded question set"
    );
    if questions.len() < MIN_QUESTIONS {
        anyhow::bail!(
            "question set has {} entries, need at least {}",
            questions.len(),
            MIN_QUESTIONS
        );
    }

    let (retriever, assembler, generator) = build_pipeline(config)?;
    let evaluator = Arc::new(HttpEvaluator::new(&config.evaluation)?);
    let runner = BatchRunner::new(
        retriever,
        assembler,
        generator,
        evaluator,
        config.retrieval.top_k,
        config.memory.max_history_turns,
    );

    let report = runner.run(&questions).await?;

    println!("\nAggregate metrics:");
    if report.aggregate.is_empty() {
        println!("  (no successfully scored questions)");
    }
    for (metric, score) in &report.aggregate {
        println!("  {}: {:.4}", metric, score);
    }

    report.write_to(output_path)?;
    println!("\nReport written to {}", output_path.display());
    Ok(())
}
