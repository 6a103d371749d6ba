//! `scholar search`: print ranked documents with their scores.
//!
//! Scores are shown for debugging retrieval; prompts never carry them.

use anyhow::Result;

use scholar_rag_core::models::ScoredDocument;

use crate::engine::RagEngine;

/// Longest text preview printed per result.
const PREVIEW_CHARS: usize = 160;

pub async fn run_search(engine: &RagEngine, query: &str, top_k: Option<usize>) -> Result<()> {
    let results = engine.search(query, top_k).await?;
    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for (rank, result) in results.iter().enumerate() {
        println!("{}", format_result(rank + 1, result));
    }
    Ok(())
}

fn format_result(rank: usize, result: &ScoredDocument) -> String {
    let doc = &result.document;
    let mut out = format!("{}. [{:.4}] {}", rank, result.score, doc.id);
    for (key, value) in &doc.source_metadata {
        let rendered = match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        out.push_str(&format!("\n    {}: {}", key, rendered));
    }
    out.push_str(&format!("\n    {}", preview(&doc.text)));
    out
}

/// Collapse whitespace and cut at a char boundary.
fn preview(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= PREVIEW_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
    format!("{}...", cut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scholar_rag_core::models::Document;
    use serde_json::json;

    #[test]
    fn result_line_has_rank_score_id_and_metadata() {
        let result = ScoredDocument {
            score: 0.91234,
            document: Document::new("lec.json#3", "some\n\ntext")
                .with_metadata("start", json!(12.0))
                .with_metadata("name", json!("Closures")),
        };
        let out = format_result(1, &result);
        assert!(out.starts_with("1. [0.9123] lec.json#3"));
        assert!(out.contains("name: Closures"));
        assert!(out.contains("start: 12.0"));
        assert!(out.ends_with("some text"));
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        let long = "ü".repeat(PREVIEW_CHARS + 10);
        let p = preview(&long);
        assert!(p.ends_with("..."));
        assert_eq!(p.chars().count(), PREVIEW_CHARS + 3);
    }
}
