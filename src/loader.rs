//! Filesystem document loader.
//!
//! Walks `[corpus].documents` and turns matching files into core
//! [`Document`]s. Three file shapes are understood:
//!
//! | File | Documents |
//! |------|-----------|
//! | `*.json` object with a `chunks` array (transcript) | one per segment, id `"{file}#{i}"` |
//! | `*.json` array of objects (scraped posts) | one per post, text from `content` or `text` |
//! | `*.txt`, `*.md` | one per file, id = relative path |
//!
//! Scalar fields other than the text become `source_metadata`. Transcript
//! segments also get `file`. Files are visited in sorted relative-path
//! order so document ids and corpus order are deterministic.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::Path;
use walkdir::WalkDir;

use scholar_rag_core::models::{Document, Metadata};

use crate::config::CorpusConfig;

/// Load every document under the configured directory.
///
/// # Errors
///
/// Fails when the directory is missing, a glob is invalid, a JSON file does
/// not match a known shape, or two documents share an id.
pub fn load_documents(config: &CorpusConfig) -> Result<Vec<Document>> {
    let root = &config.documents;
    if !root.exists() {
        bail!("Documents directory does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.include_globs)?;
    let mut excludes = vec!["**/.git/**".to_string()];
    excludes.extend(config.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    // The snapshot may live inside the documents directory.
    let snapshot = config.path.canonicalize().ok();

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if snapshot.is_some() && path.canonicalize().ok() == snapshot {
            continue;
        }
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");
        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }
        files.push((rel_str, path.to_path_buf()));
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));

    let mut documents = Vec::new();
    for (rel, path) in &files {
        let loaded = load_file(path, rel).with_context(|| format!("Failed to load {}", rel))?;
        tracing::debug!(file = %rel, documents = loaded.len(), "loaded file");
        documents.extend(loaded);
    }

    let mut seen = HashSet::new();
    for doc in &documents {
        if !seen.insert(doc.id.as_str()) {
            bail!("Duplicate document id: {}", doc.id);
        }
    }

    tracing::info!(
        files = files.len(),
        documents = documents.len(),
        root = %root.display(),
        "documents loaded"
    );
    Ok(documents)
}

fn load_file(path: &Path, rel: &str) -> Result<Vec<Document>> {
    let content = std::fs::read_to_string(path)?;
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if extension == "json" {
        let value: Value = serde_json::from_str(&content).context("Invalid JSON")?;
        parse_json_documents(rel, value)
    } else {
        Ok(vec![Document::new(rel, content).with_metadata("file", Value::from(rel))])
    }
}

/// Turn a parsed JSON file into documents.
pub fn parse_json_documents(rel: &str, value: Value) -> Result<Vec<Document>> {
    match value {
        Value::Object(mut obj) => match obj.remove("chunks") {
            Some(Value::Array(segments)) => transcript_documents(rel, segments),
            _ => bail!("JSON object has no \"chunks\" array"),
        },
        Value::Array(items) => post_documents(rel, items),
        _ => bail!("Expected a JSON object with \"chunks\" or an array of posts"),
    }
}

fn transcript_documents(rel: &str, segments: Vec<Value>) -> Result<Vec<Document>> {
    segments
        .into_iter()
        .enumerate()
        .map(|(i, segment)| {
            let Value::Object(mut fields) = segment else {
                bail!("Segment {} is not an object", i);
            };
            let text = take_text(&mut fields, &["text"])
                .with_context(|| format!("Segment {} has no text", i))?;
            let mut metadata = scalar_metadata(fields);
            metadata.insert("file".to_string(), Value::from(rel));
            Ok(Document {
                id: format!("{}#{}", rel, i),
                text,
                source_metadata: metadata,
            })
        })
        .collect()
}

fn post_documents(rel: &str, items: Vec<Value>) -> Result<Vec<Document>> {
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            let Value::Object(mut fields) = item else {
                bail!("Post {} is not an object", i);
            };
            let text = take_text(&mut fields, &["content", "text"])
                .with_context(|| format!("Post {} has no content or text", i))?;
            let id = ["post", "id"]
                .iter()
                .find_map(|key| fields.get(*key).and_then(scalar_string))
                .map(|id| format!("{}#{}", rel, id))
                .unwrap_or_else(|| format!("{}#{}", rel, i));
            let mut metadata = scalar_metadata(fields);
            metadata.insert("file".to_string(), Value::from(rel));
            Ok(Document {
                id,
                text,
                source_metadata: metadata,
            })
        })
        .collect()
}

/// Remove the first string field found under `keys`.
fn take_text(fields: &mut Map<String, Value>, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(Value::String(_)) = fields.get(*key) {
            if let Some(Value::String(s)) = fields.remove(*key) {
                return Some(s);
            }
        }
    }
    None
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Keep strings, numbers and booleans; drop nulls, arrays and objects.
fn scalar_metadata(fields: Map<String, Value>) -> Metadata {
    fields
        .into_iter()
        .filter(|(_, v)| matches!(v, Value::String(_) | Value::Number(_) | Value::Bool(_)))
        .collect()
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn corpus_config(dir: &Path) -> CorpusConfig {
        CorpusConfig {
            path: dir.join("corpus.json"),
            documents: dir.to_path_buf(),
            include_globs: vec![
                "**/*.json".to_string(),
                "**/*.md".to_string(),
                "**/*.txt".to_string(),
            ],
            exclude_globs: vec![],
        }
    }

    #[test]
    fn transcript_segments_become_documents() {
        let value = json!({
            "chunks": [
                {"number": "1", "name": "Intro", "start": 0.0, "end": 4.5, "text": "Welcome"},
                {"number": "1", "name": "Intro", "start": 4.5, "end": 9.0, "text": "Closures"}
            ],
            "text": "Welcome Closures"
        });
        let docs = parse_json_documents("lec1.json", value).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, "lec1.json#0");
        assert_eq!(docs[1].text, "Closures");
        assert_eq!(docs[1].source_metadata["start"], json!(4.5));
        assert_eq!(docs[1].source_metadata["name"], json!("Intro"));
        assert_eq!(docs[1].source_metadata["file"], json!("lec1.json"));
        assert!(!docs[1].source_metadata.contains_key("text"));
    }

    #[test]
    fn posts_use_content_and_post_id() {
        let value = json!([
            {"post": 7, "content": "first post", "likes": 3},
            {"text": "second post", "tags": ["x"]},
        ]);
        let docs = parse_json_documents("posts.json", value).unwrap();
        assert_eq!(docs[0].id, "posts.json#7");
        assert_eq!(docs[0].text, "first post");
        assert_eq!(docs[0].source_metadata["likes"], json!(3));
        assert_eq!(docs[1].id, "posts.json#1");
        assert!(!docs[1].source_metadata.contains_key("tags"));
    }

    #[test]
    fn unknown_json_shape_rejected() {
        assert!(parse_json_documents("x.json", json!({"items": []})).is_err());
        assert!(parse_json_documents("x.json", json!("text")).is_err());
        assert!(parse_json_documents("x.json", json!([{"title": "no text"}])).is_err());
    }

    #[test]
    fn walks_directory_sorted_with_globs() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        std::fs::create_dir_all(dir.join("notes")).unwrap();
        std::fs::write(dir.join("notes/b.md"), "bee").unwrap();
        std::fs::write(dir.join("a.txt"), "ay").unwrap();
        std::fs::write(dir.join("skip.rs"), "fn main() {}").unwrap();
        std::fs::write(
            dir.join("lec.json"),
            r#"{"chunks":[{"text":"one"},{"text":"two"}]}"#,
        )
        .unwrap();

        let docs = load_documents(&corpus_config(dir)).unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a.txt", "lec.json#0", "lec.json#1", "notes/b.md"]);
    }

    #[test]
    fn exclude_globs_and_snapshot_skipped() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        std::fs::write(dir.join("keep.txt"), "keep").unwrap();
        std::fs::write(dir.join("drop.txt"), "drop").unwrap();
        std::fs::write(dir.join("corpus.json"), r#"{"format_version":1}"#).unwrap();
        let mut config = corpus_config(dir);
        config.exclude_globs = vec!["drop.*".to_string()];

        let docs = load_documents(&config).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "keep.txt");
    }

    #[test]
    fn duplicate_ids_fail() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("posts.json"),
            r#"[{"post":"x","content":"a"},{"post":"x","content":"b"}]"#,
        )
        .unwrap();
        let err = load_documents(&corpus_config(tmp.path())).unwrap_err();
        assert!(format!("{:#}", err).contains("Duplicate document id"));
    }

    #[test]
    fn missing_directory_fails() {
        let config = corpus_config(&PathBuf::from("/definitely/not/here"));
        assert!(load_documents(&config).is_err());
    }
}
