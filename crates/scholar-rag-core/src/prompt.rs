//! Prompt construction from retrieved documents.
//!
//! A [`PromptTemplate`] is plain text with three slots:
//!
//! | Slot | Filled with |
//! |------|-------------|
//! | `{context}` | retrieved documents, ranked order (required) |
//! | `{question}` | the user's question (required) |
//! | `{instructions}` | the template's instruction text (optional) |
//!
//! Each document becomes a block of `key: value` provenance lines (sorted by
//! key) followed by its text; blocks are separated by `\n---\n`. Scores and
//! document ids never reach the prompt.
//!
//! Slots are filled in a single pass, so a `{question}` appearing inside a
//! document's text is left as-is.

use crate::models::{Metadata, ScoredDocument};
use crate::{Error, Result};

/// Separator between document blocks in `{context}`.
pub const CONTEXT_SEPARATOR: &str = "\n---\n";

/// Names accepted by [`PromptTemplate::preset`].
pub const PRESETS: &[&str] = &["default", "lecture", "urdu"];

const DEFAULT_TEMPLATE: &str = concat!(
    "{instructions}\n\n",
    "Context:\n{context}\n\n",
    "Question: {question}\n\n",
    "Answer:"
);

const DEFAULT_INSTRUCTIONS: &str = concat!(
    "You are a helpful assistant that answers questions using only the provided context. ",
    "If the answer cannot be found in the context, say that you can only answer questions ",
    "about the provided material."
);

const LECTURE_INSTRUCTIONS: &str = concat!(
    "You are a teaching assistant for a lecture series. The context below is a set of ",
    "transcript segments, each with the video name, video number and start/end ",
    "timestamps in seconds. Answer the question in a human way and tell the user which ",
    "video and at what timestamp the topic is taught. Do not mention the segment format ",
    "itself. If the question is unrelated to the lectures, say that you can only answer ",
    "questions about the course."
);

const URDU_TEMPLATE: &str = concat!(
    "Context:\n{context}\n\n",
    "Question:\n{question}\n\n",
    "{instructions}"
);

const URDU_INSTRUCTIONS: &str = "Answer in simple Urdu.";

/// A prompt layout plus the instruction text for its `{instructions}` slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
    instructions: String,
}

impl PromptTemplate {
    /// Build a custom template.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when `{context}` or `{question}` is missing.
    pub fn new(template: impl Into<String>, instructions: impl Into<String>) -> Result<Self> {
        let template = template.into();
        for slot in ["{context}", "{question}"] {
            if !template.contains(slot) {
                return Err(Error::InvalidArgument(format!(
                    "prompt template must contain {}",
                    slot
                )));
            }
        }
        Ok(Self {
            template,
            instructions: instructions.into(),
        })
    }

    /// Look up a built-in preset by name.
    pub fn preset(name: &str) -> Option<Self> {
        let (template, instructions) = match name {
            "default" => (DEFAULT_TEMPLATE, DEFAULT_INSTRUCTIONS),
            "lecture" => (DEFAULT_TEMPLATE, LECTURE_INSTRUCTIONS),
            "urdu" => (URDU_TEMPLATE, URDU_INSTRUCTIONS),
            _ => return None,
        };
        Some(Self {
            template: template.to_string(),
            instructions: instructions.to_string(),
        })
    }

    /// Replace the instruction text, keeping the layout.
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
        }
    }
}

/// Render the retrieved documents and `question` into `template`.
pub fn build_prompt(results: &[ScoredDocument], question: &str, template: &PromptTemplate) -> String {
    let context = format_context(results);
    render(&template.template, |slot| match slot {
        "context" => Some(context.as_str()),
        "question" => Some(question),
        "instructions" => Some(template.instructions.as_str()),
        _ => None,
    })
}

/// Format ranked documents as provenance-plus-text blocks.
pub fn format_context(results: &[ScoredDocument]) -> String {
    results
        .iter()
        .map(|r| format_block(&r.document.source_metadata, &r.document.text))
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

fn format_block(metadata: &Metadata, text: &str) -> String {
    let mut block = String::new();
    for (key, value) in metadata {
        block.push_str(key);
        block.push_str(": ");
        match value {
            serde_json::Value::String(s) => block.push_str(s),
            other => block.push_str(&other.to_string()),
        }
        block.push('\n');
    }
    block.push_str(text);
    block
}

/// Single-pass `{slot}` substitution. Unknown slots are kept verbatim.
fn render<'a>(template: &str, lookup: impl Fn(&str) -> Option<&'a str>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => match lookup(&after[..close]) {
                Some(value) => {
                    out.push_str(value);
                    rest = &after[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            },
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
