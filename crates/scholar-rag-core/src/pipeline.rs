//! The front-door contract: question in, answer with sources out.
//!
//! ```text
//! question → search → build_prompt → generate → Answer
//! ```
//!
//! When retrieval finds nothing the generator is not called and
//! [`NO_RESULTS_NOTICE`] is returned with an empty source list.

use crate::embedding::Embedder;
use crate::generation::Generator;
use crate::models::{Answer, Corpus, RetrievalResult, SourceRef};
use crate::prompt::{build_prompt, PromptTemplate};
use crate::search::{search, SearchParams};
use crate::tokenize::Tokenizer;
use crate::Result;

/// Answer text used when no document is relevant to the question.
pub const NO_RESULTS_NOTICE: &str = "No relevant source was found for this question.";

/// Everything the pipeline needs besides the corpus and the question.
#[derive(Clone, Copy)]
pub struct Pipeline<'a> {
    pub embedder: &'a dyn Embedder,
    pub tokenizer: &'a dyn Tokenizer,
    pub generator: &'a dyn Generator,
    pub template: &'a PromptTemplate,
    pub params: SearchParams,
}

/// Retrieval output together with the prompt that was (or would be) sent.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub results: RetrievalResult,
    /// `None` when nothing was retrieved.
    pub prompt: Option<String>,
}

impl<'a> Pipeline<'a> {
    /// Run retrieval and build the prompt without calling the generator.
    pub async fn prepare(&self, corpus: &Corpus, question: &str) -> Result<Prepared> {
        let results = search(corpus, self.embedder, self.tokenizer, question, &self.params).await?;
        let prompt = if results.is_empty() {
            None
        } else {
            Some(build_prompt(&results, question, self.template))
        };
        Ok(Prepared { results, prompt })
    }

    /// Answer `question` from `corpus`.
    ///
    /// # Errors
    ///
    /// Provider failures propagate unchanged.
    pub async fn answer(&self, corpus: &Corpus, question: &str) -> Result<Answer> {
        let prepared = self.prepare(corpus, question).await?;
        self.complete(prepared).await
    }

    /// Generate the answer for an already prepared request.
    pub async fn complete(&self, prepared: Prepared) -> Result<Answer> {
        let Some(prompt) = prepared.prompt else {
            return Ok(Answer {
                answer_text: NO_RESULTS_NOTICE.to_string(),
                sources: Vec::new(),
            });
        };
        let answer_text = self.generator.generate(&prompt).await?;
        Ok(Answer {
            answer_text,
            sources: prepared
                .results
                .iter()
                .map(|r| SourceRef::from(&r.document))
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{build_corpus, BuildOptions};
    use crate::models::Document;
    use crate::tokenize::ByteTokenizer;
    use crate::Error;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// "fox" text embeds near x, "learning" text near y.
    struct TopicEmbedder;

    #[async_trait]
    impl Embedder for TopicEmbedder {
        fn model_name(&self) -> &str {
            "topic"
        }
        fn dims(&self) -> usize {
            2
        }
        fn max_input_tokens(&self) -> usize {
            8191
        }
        async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let t = t.to_lowercase();
                    if t.contains("fox") {
                        vec![0.95, 0.05]
                    } else if t.contains("learning") {
                        vec![0.05, 0.95]
                    } else {
                        vec![0.5, 0.5]
                    }
                })
                .collect())
        }
    }

    /// Records prompts and echoes a fixed reply.
    #[derive(Default)]
    struct RecordingGenerator {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Generator for RecordingGenerator {
        fn model_name(&self) -> &str {
            "recording"
        }
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok("generated".to_string())
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl Generator for FailingGenerator {
        fn model_name(&self) -> &str {
            "failing"
        }
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Err(Error::GenerationProvider("503".into()))
        }
    }

    async fn fox_corpus() -> Corpus {
        let docs = vec![
            Document::new("A", "the quick brown fox").with_metadata("name", json!("Animals")),
            Document::new("B", "machine learning basics"),
        ];
        let options = BuildOptions {
            max_tokens: 700,
            batch_size: 16,
        };
        build_corpus(&docs, &ByteTokenizer, &TopicEmbedder, options, None, &|_| {})
            .await
            .unwrap()
            .0
    }

    fn params(top_k: usize) -> SearchParams {
        SearchParams {
            top_k,
            max_tokens: 700,
            min_score: None,
        }
    }

    #[tokio::test]
    async fn fox_question_retrieves_fox_document() {
        let corpus = fox_corpus().await;
        let generator = RecordingGenerator::default();
        let template = PromptTemplate::default();
        let pipeline = Pipeline {
            embedder: &TopicEmbedder,
            tokenizer: &ByteTokenizer,
            generator: &generator,
            template: &template,
            params: params(1),
        };

        let answer = pipeline.answer(&corpus, "fox").await.unwrap();
        assert_eq!(answer.answer_text, "generated");
        assert_eq!(answer.sources.len(), 1);
        assert_eq!(answer.sources[0].identifier, "A");
        assert_eq!(answer.sources[0].provenance.get("name"), Some(&json!("Animals")));

        let prompts = generator.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("the quick brown fox"));
        assert!(!prompts[0].contains("machine learning"));
        assert!(prompts[0].contains("Question: fox"));
    }

    /// Fixed vectors for the two-document fox/learning corpus.
    struct FixedEmbedder;

    #[async_trait]
    impl Embedder for FixedEmbedder {
        fn model_name(&self) -> &str {
            "fixed"
        }
        fn dims(&self) -> usize {
            2
        }
        fn max_input_tokens(&self) -> usize {
            8191
        }
        async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| match t.as_str() {
                    "the quick brown fox" => vec![1.0, 0.0],
                    "machine learning is fun" => vec![0.0, 1.0],
                    "brown fox" => vec![0.9, 0.1],
                    _ => vec![0.0, 0.0],
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn brown_fox_query_returns_document_a_only() {
        let docs = vec![
            Document::new("A", "the quick brown fox"),
            Document::new("B", "machine learning is fun"),
        ];
        let options = BuildOptions {
            max_tokens: 700,
            batch_size: 16,
        };
        let (corpus, _) = build_corpus(&docs, &ByteTokenizer, &FixedEmbedder, options, None, &|_| {})
            .await
            .unwrap();
        let generator = RecordingGenerator::default();
        let template = PromptTemplate::default();
        let pipeline = Pipeline {
            embedder: &FixedEmbedder,
            tokenizer: &ByteTokenizer,
            generator: &generator,
            template: &template,
            params: params(1),
        };

        let prepared = pipeline.prepare(&corpus, "brown fox").await.unwrap();
        assert_eq!(prepared.results.len(), 1);
        assert_eq!(prepared.results[0].document.id, "A");

        let answer = pipeline.complete(prepared).await.unwrap();
        let sources: Vec<&str> = answer.sources.iter().map(|s| s.identifier.as_str()).collect();
        assert_eq!(sources, vec!["A"]);
    }

    #[tokio::test]
    async fn both_documents_ranked_with_top_two() {
        let corpus = fox_corpus().await;
        let generator = RecordingGenerator::default();
        let template = PromptTemplate::default();
        let pipeline = Pipeline {
            embedder: &TopicEmbedder,
            tokenizer: &ByteTokenizer,
            generator: &generator,
            template: &template,
            params: params(2),
        };
        let prepared = pipeline.prepare(&corpus, "learning").await.unwrap();
        let ids: Vec<&str> = prepared.results.iter().map(|r| r.document.id.as_str()).collect();
        assert_eq!(ids, vec!["B", "A"]);
        let prompt = prepared.prompt.unwrap();
        assert!(prompt.find("machine learning").unwrap() < prompt.find("brown fox").unwrap());
    }

    #[tokio::test]
    async fn empty_corpus_returns_notice_without_generating() {
        let corpus = Corpus::empty("topic", 2);
        let template = PromptTemplate::default();
        let pipeline = Pipeline {
            embedder: &TopicEmbedder,
            tokenizer: &ByteTokenizer,
            generator: &FailingGenerator,
            template: &template,
            params: params(3),
        };
        let answer = pipeline.answer(&corpus, "fox").await.unwrap();
        assert_eq!(answer.answer_text, NO_RESULTS_NOTICE);
        assert!(answer.sources.is_empty());
    }

    #[tokio::test]
    async fn generator_errors_propagate() {
        let corpus = fox_corpus().await;
        let template = PromptTemplate::default();
        let pipeline = Pipeline {
            embedder: &TopicEmbedder,
            tokenizer: &ByteTokenizer,
            generator: &FailingGenerator,
            template: &template,
            params: params(1),
        };
        let err = pipeline.answer(&corpus, "fox").await.unwrap_err();
        assert!(matches!(err, Error::GenerationProvider(_)));
    }

    #[tokio::test]
    async fn min_score_can_exclude_everything() {
        let corpus = fox_corpus().await;
        let template = PromptTemplate::default();
        let pipeline = Pipeline {
            embedder: &TopicEmbedder,
            tokenizer: &ByteTokenizer,
            generator: &FailingGenerator,
            template: &template,
            params: SearchParams {
                top_k: 2,
                max_tokens: 700,
                min_score: Some(1.01),
            },
        };
        let answer = pipeline.answer(&corpus, "fox").await.unwrap();
        assert_eq!(answer.answer_text, NO_RESULTS_NOTICE);
    }
}
