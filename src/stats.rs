//! Corpus statistics overview.
//!
//! Summarizes the snapshot on disk: model, dimensionality, build time,
//! document and chunk counts, and a per-file breakdown. Used by
//! `scholar stats` to confirm a build worked as expected.

use anyhow::{Context, Result};
use std::collections::BTreeMap;

use scholar_rag_core::models::Corpus;
use scholar_rag_core::store::CorpusStore;

use crate::config::Config;
use crate::snapshot::FileCorpusStore;

/// Per-file document and chunk counts.
#[derive(Debug, PartialEq, Eq)]
struct FileStats {
    documents: usize,
    chunks: usize,
}

pub fn run_stats(config: &Config) -> Result<()> {
    let store = FileCorpusStore::new(&config.corpus.path);
    if !store.exists() {
        println!(
            "No corpus snapshot at {}. Run `scholar build` first.",
            store.path().display()
        );
        return Ok(());
    }
    let corpus = store.load().context("Failed to load corpus snapshot")?;
    let info = store.info()?;
    let size = std::fs::metadata(store.path()).map(|m| m.len()).unwrap_or(0);

    println!("Scholar RAG: Corpus Stats");
    println!("==========================");
    println!();
    println!("  Snapshot:    {}", store.path().display());
    println!("  Size:        {}", format_bytes(size));
    println!("  Built:       {}", format_ts_relative(info.built_at.timestamp()));
    println!("  Model:       {} ({} dims)", corpus.model, corpus.dims);
    println!();
    println!("  Documents:   {}", corpus.len());
    println!("  Chunks:      {}", corpus.chunk_count());

    let by_file = stats_by_file(&corpus);
    if !by_file.is_empty() {
        println!();
        println!("  By file:");
        println!("  {:<40} {:>6} {:>8}", "FILE", "DOCS", "CHUNKS");
        println!("  {}", "-".repeat(56));
        for (file, s) in &by_file {
            println!("  {:<40} {:>6} {:>8}", file, s.documents, s.chunks);
        }
    }
    println!();
    Ok(())
}

fn stats_by_file(corpus: &Corpus) -> BTreeMap<String, FileStats> {
    let mut map: BTreeMap<String, FileStats> = BTreeMap::new();
    for entry in &corpus.entries {
        let file = entry
            .document
            .source_metadata
            .get("file")
            .and_then(|v| v.as_str())
            .unwrap_or("(unknown)")
            .to_string();
        let s = map.entry(file).or_insert(FileStats {
            documents: 0,
            chunks: 0,
        });
        s.documents += 1;
        s.chunks += entry.chunks.len();
    }
    map
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;
    if delta < 0 {
        return format_ts_iso(ts);
    }
    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scholar_rag_core::models::{Chunk, CorpusEntry, Document, EmbeddedChunk};
    use serde_json::json;

    fn entry(id: &str, file: Option<&str>, chunks: usize) -> CorpusEntry {
        let mut document = Document::new(id, "t");
        if let Some(f) = file {
            document = document.with_metadata("file", json!(f));
        }
        CorpusEntry {
            chunks: (0..chunks)
                .map(|i| EmbeddedChunk {
                    chunk: Chunk {
                        parent_id: id.to_string(),
                        ordinal: i,
                        text: "t".into(),
                        hash: String::new(),
                    },
                    vector: vec![1.0],
                })
                .collect(),
            document,
        }
    }

    #[test]
    fn groups_by_file() {
        let corpus = Corpus {
            model: "m".into(),
            dims: 1,
            entries: vec![
                entry("a#0", Some("a.json"), 1),
                entry("a#1", Some("a.json"), 2),
                entry("x", None, 1),
            ],
        };
        let stats = stats_by_file(&corpus);
        assert_eq!(
            stats["a.json"],
            FileStats {
                documents: 2,
                chunks: 3
            }
        );
        assert_eq!(stats["(unknown)"].documents, 1);
    }

    #[test]
    fn bytes_and_relative_time() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_ts_relative(chrono::Utc::now().timestamp()), "just now");
        assert_eq!(
            format_ts_relative(chrono::Utc::now().timestamp() - 7200),
            "2 hours ago"
        );
    }
}
