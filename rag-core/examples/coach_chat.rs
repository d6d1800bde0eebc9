//! # Coach Chat Example
//!
//! Indexes a directory of `.txt` files and answers one question grounded in
//! them, falling back to the plain coach persona when nothing is retrieved.
//!
//! Requires `OPENAI_API_KEY`. Tuning comes from the `RAG_*` environment
//! variables (see [`RagConfig::from_env`]).
//!
//! Run: `cargo run -p rag-core --example coach_chat --features openai -- data/ "How do I handle stress?"`

use std::sync::Arc;

use rag_core::openai::{OpenAIChatProvider, OpenAIEmbeddingProvider};
use rag_core::{AnswerMode, GenerationParams, RagConfig, RagPipeline, TextFileLoader, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let mut args = std::env::args().skip(1);
    let data_dir = args.next().unwrap_or_else(|| "data".to_string());
    let question =
        args.next().unwrap_or_else(|| "How can I manage stress before a match?".to_string());

    let pipeline = Arc::new(
        RagPipeline::builder()
            .config(RagConfig::from_env()?)
            .corpus(Arc::new(TextFileLoader::new(&data_dir)))
            .embedding_provider(Arc::new(OpenAIEmbeddingProvider::from_env()?))
            .generation_provider(Arc::new(OpenAIChatProvider::from_env()?))
            .build()?,
    );

    // Build at startup; a failure here is retried on the first question.
    if let Err(e) = pipeline.initialize().await {
        eprintln!("index not built yet: {e}");
    }

    let params = GenerationParams { temperature: Some(0.7), ..Default::default() };
    let answer = pipeline.answer(&question, None, &params).await.inspect_err(|e| {
        if let Some(kind) = e.failure_kind() {
            eprintln!("{}", kind.user_message());
        }
    })?;

    println!("Q: {question}\n");
    println!("A: {}\n", answer.reply);

    if answer.mode == AnswerMode::Fallback {
        println!("(no matching context in {data_dir}, answered without retrieval)");
        return Ok(());
    }

    println!("Sources:");
    for (i, result) in answer.context.iter().enumerate() {
        let preview: String = result.chunk.text.chars().take(80).collect();
        let preview = preview.replace('\n', " ");
        println!("  [{}] {:.3} {} {}", i + 1, result.score, result.chunk.id, preview);
    }

    Ok(())
}
