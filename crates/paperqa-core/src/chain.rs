//! The answer chain: retrieve → render persona prompt → generate.
//!
//! [`AnswerChain`] borrows the store, embedder, and language model for
//! one question and owns no state of its own. A failed or empty model
//! response is reported as [`PipelineError::Generation`]; an empty
//! answer is never returned.

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info};

use crate::embedding::Embedder;
use crate::error::{PipelineError, PipelineResult};
use crate::index::IndexHandle;
use crate::models::{Answer, RetrievableUnit};
use crate::prompt::{build_prompt, Persona};
use crate::retrieve::{retrieve, RetrievalParams};
use crate::store::Store;

/// A text-generation service with a request/response contract.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn model_name(&self) -> &str;
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Serialize retrieved units into the prompt's context block.
///
/// Each unit becomes a `[section | source]` header line followed by its
/// content; units are separated by a blank line.
pub fn serialize_context(units: &[RetrievableUnit]) -> String {
    units
        .iter()
        .map(|u| {
            format!(
                "[{} | {}]\n{}",
                u.metadata.section,
                u.metadata.source,
                u.content.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// A prompt ready for submission, with the units it was built from.
#[derive(Debug, Clone)]
pub struct RenderedPrompt {
    pub persona: Persona,
    pub text: String,
    pub units: Vec<RetrievableUnit>,
}

pub struct AnswerChain<'a, S: ?Sized, E: ?Sized, L: ?Sized> {
    store: &'a S,
    embedder: &'a E,
    llm: &'a L,
    params: RetrievalParams,
}

impl<'a, S, E, L> AnswerChain<'a, S, E, L>
where
    S: Store + ?Sized,
    E: Embedder + ?Sized,
    L: LanguageModel + ?Sized,
{
    pub fn new(store: &'a S, embedder: &'a E, llm: &'a L, params: RetrievalParams) -> Self {
        Self {
            store,
            embedder,
            llm,
            params,
        }
    }

    /// Retrieve context for `question` and render the persona prompt
    /// without calling the model.
    pub async fn render(
        &self,
        index: &IndexHandle,
        question: &str,
        persona: &str,
    ) -> PipelineResult<RenderedPrompt> {
        let units = retrieve(self.store, self.embedder, index, question, &self.params).await?;
        let template = build_prompt(persona);
        let text = template.render(&serialize_context(&units), question);
        debug!(
            persona = %template.persona,
            units = units.len(),
            prompt_chars = text.len(),
            "prompt rendered"
        );
        Ok(RenderedPrompt {
            persona: template.persona,
            text,
            units,
        })
    }

    /// Answer `question` against `index` in the style of `persona`.
    pub async fn answer(
        &self,
        index: &IndexHandle,
        question: &str,
        persona: &str,
    ) -> PipelineResult<Answer> {
        let prompt = self.render(index, question, persona).await?;
        let text = self
            .llm
            .generate(&prompt.text)
            .await
            .map_err(|e| PipelineError::Generation(format!("{:#}", e)))?;
        if text.trim().is_empty() {
            return Err(PipelineError::Generation(format!(
                "model '{}' returned an empty response",
                self.llm.model_name()
            )));
        }
        info!(
            model = self.llm.model_name(),
            persona = %prompt.persona,
            answer_chars = text.len(),
            "answer generated"
        );
        Ok(Answer {
            text,
            persona: prompt.persona,
            sources: prompt.units.into_iter().map(|u| u.metadata).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::index::build_or_load;
    use crate::index::testing::HashEmbedder;
    use crate::prompt::Persona;
    use crate::store::memory::InMemoryStore;

    /// Captures every prompt it receives and replies with a fixed text.
    struct RecordingModel {
        reply: Result<String, String>,
        prompts: Mutex<Vec<String>>,
    }

    impl RecordingModel {
        fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn failing(msg: &str) -> Self {
            Self {
                reply: Err(msg.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LanguageModel for RecordingModel {
        fn model_name(&self) -> &str {
            "recording"
        }
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply.clone().map_err(|e| anyhow::anyhow!(e))
        }
    }

    async fn fixture(store: &InMemoryStore, embedder: &HashEmbedder) -> IndexHandle {
        let units = vec![
            RetrievableUnit::new(
                "We used a convolutional network trained with dropout.",
                "METHOD",
                "paper.pdf",
            ),
            RetrievableUnit::new(
                "The network reached ninety percent accuracy on the test set.",
                "RESULTS",
                "paper.pdf",
            ),
        ];
        build_or_load(store, embedder, "c", &units, 8).await.unwrap()
    }

    #[tokio::test]
    async fn student_prompt_reaches_the_model() {
        let store = InMemoryStore::new();
        let embedder = HashEmbedder::new(32);
        let index = fixture(&store, &embedder).await;
        let llm = RecordingModel::replying("1. They used a CNN.");
        let chain = AnswerChain::new(&store, &embedder, &llm, RetrievalParams::default());

        let answer = chain
            .answer(&index, "What method was used?", "student")
            .await
            .unwrap();
        assert_eq!(answer.text, "1. They used a CNN.");
        assert_eq!(answer.persona, Persona::Student);
        assert_eq!(answer.sources.len(), 2);

        let prompts = llm.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].starts_with(Persona::Student.instruction()));
        assert!(prompts[0].contains("[METHOD | paper.pdf]"));
        assert!(prompts[0].contains("Question: What method was used?\nAnswer:"));
    }

    #[tokio::test]
    async fn model_failure_is_generation_error() {
        let store = InMemoryStore::new();
        let embedder = HashEmbedder::new(32);
        let index = fixture(&store, &embedder).await;
        let llm = RecordingModel::failing("quota exceeded");
        let chain = AnswerChain::new(&store, &embedder, &llm, RetrievalParams::default());

        let err = chain.answer(&index, "q", "default").await.unwrap_err();
        match err {
            PipelineError::Generation(msg) => assert!(msg.contains("quota exceeded")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn blank_model_reply_is_generation_error() {
        let store = InMemoryStore::new();
        let embedder = HashEmbedder::new(32);
        let index = fixture(&store, &embedder).await;
        let llm = RecordingModel::replying("  \n");
        let chain = AnswerChain::new(&store, &embedder, &llm, RetrievalParams::default());

        let err = chain.answer(&index, "q", "professor").await.unwrap_err();
        assert!(matches!(err, PipelineError::Generation(_)));
    }

    #[test]
    fn context_serialization_format() {
        let units = vec![
            RetrievableUnit::new(" alpha ", "INTRO", "a.pdf"),
            RetrievableUnit::new("beta", "METHOD", "b.pdf"),
        ];
        assert_eq!(
            serialize_context(&units),
            "[INTRO | a.pdf]\nalpha\n\n[METHOD | b.pdf]\nbeta"
        );
        assert_eq!(serialize_context(&[]), "");
    }
}
