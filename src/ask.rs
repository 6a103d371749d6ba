//! `scholar ask` and `scholar chat`: answer questions from the terminal.

use anyhow::{anyhow, Result};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

use scholar_rag_core::models::{Answer, SourceRef};
use scholar_rag_core::Error;

use crate::engine::RagEngine;

/// Shown when a provider call fails; details go to the log.
pub const ERROR_NOTICE: &str = "Sorry, something went wrong while answering. Please try again.";

pub async fn run_ask(
    engine: &RagEngine,
    question: &str,
    top_k: Option<usize>,
    show_prompt: bool,
) -> Result<()> {
    let prepared = engine
        .prepare(question, top_k)
        .await
        .map_err(answer_failed)?;
    if show_prompt {
        match &prepared.prompt {
            Some(prompt) => {
                println!("--- prompt ---");
                println!("{}", prompt);
                println!("--- end prompt ---");
            }
            None => println!("(no prompt: nothing retrieved)"),
        }
    }
    let answer = engine.complete(prepared).await.map_err(answer_failed)?;
    println!("{}", format_answer(&answer));
    Ok(())
}

/// Print the generic notice for a failed answer and return an error that
/// carries no provider details. Argument errors keep their message.
fn answer_failed(err: Error) -> anyhow::Error {
    if let Error::InvalidArgument(_) = err {
        return err.into();
    }
    tracing::error!(error = %err, "answer failed");
    println!("{}", ERROR_NOTICE);
    anyhow!("question could not be answered")
}

/// Read questions from stdin until EOF or `exit`.
pub async fn run_chat(engine: &RagEngine) -> Result<()> {
    println!(
        "Ask a question about the corpus ({} documents). Type `exit` to quit.",
        engine.corpus().len()
    );
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question == "exit" || question == "quit" {
            break;
        }
        match engine.answer(question).await {
            Ok(answer) => println!("{}\n", format_answer(&answer)),
            Err(e) => {
                tracing::error!(error = %e, "chat answer failed");
                println!("{}\n", ERROR_NOTICE);
            }
        }
    }
    Ok(())
}

fn format_answer(answer: &Answer) -> String {
    let mut out = answer.answer_text.trim_end().to_string();
    if !answer.sources.is_empty() {
        out.push_str("\n\nSources:");
        for source in &answer.sources {
            out.push_str(&format!("\n  - {}", format_source(source)));
        }
    }
    out
}

fn format_source(source: &SourceRef) -> String {
    let details: Vec<String> = source
        .provenance
        .iter()
        .filter(|(key, _)| key.as_str() != "file")
        .map(|(key, value)| match value {
            serde_json::Value::String(s) => format!("{}: {}", key, s),
            other => format!("{}: {}", key, other),
        })
        .collect();
    if details.is_empty() {
        source.identifier.clone()
    } else {
        format!("{} ({})", source.identifier, details.join(", "))
    }
}
