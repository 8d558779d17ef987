//! Prompt construction and answer generation from retrieved context.
//!
//! The composer only instructs the model to stay within the retrieved
//! context; it does not check the returned text against that context.

use std::time::Duration;

use tracing::{debug, error, info};

use crate::completion::{CompletionProvider, CompletionRequest};
use crate::config::RagConfig;
use crate::document::{Answer, NOT_FOUND_ANSWER, SearchResult};
use crate::error::{RagError, Result};
use crate::retry::{RetryPolicy, Service, call_with_retry};

/// Separator placed between chunk texts in the rendered context.
pub const CONTEXT_DELIMITER: &str = "\n\n---\n\n";

const CONTEXT_PLACEHOLDER: &str = "{context}";
const QUESTION_PLACEHOLDER: &str = "{question}";

/// The default prompt. `{context}` and `{question}` are substituted once.
pub const DEFAULT_TEMPLATE: &str = "Answer the question using ONLY the context below.
If the answer is not present in the context, reply with exactly: \"Answer not found in the document.\"

Context:
{context}

Question:
{question}

Answer:";

/// Builds a context-constrained prompt and asks a [`CompletionProvider`] for the answer.
#[derive(Debug, Clone)]
pub struct AnswerComposer {
    template: String,
    max_tokens: Option<u32>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl Default for AnswerComposer {
    fn default() -> Self {
        Self::from_config(&RagConfig::default())
    }
}

impl AnswerComposer {
    /// Use the default template with limits taken from `config`.
    pub fn from_config(config: &RagConfig) -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
            max_tokens: config.max_answer_tokens,
            timeout: config.request_timeout(),
            retry: config.retry,
        }
    }

    /// Replace the prompt template.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] unless the template contains both
    /// `{context}` and `{question}`.
    pub fn with_template(mut self, template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        for placeholder in [CONTEXT_PLACEHOLDER, QUESTION_PLACEHOLDER] {
            if !template.contains(placeholder) {
                return Err(RagError::ConfigError(format!(
                    "prompt template must contain {placeholder}"
                )));
            }
        }
        self.template = template;
        Ok(self)
    }

    /// The active template.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Render the prompt for `question` over `results` in their given order.
    pub fn render_prompt(&self, question: &str, results: &[SearchResult]) -> String {
        let context =
            results.iter().map(|r| r.chunk.text.as_str()).collect::<Vec<_>>().join(CONTEXT_DELIMITER);
        render(&self.template, &context, question)
    }

    /// Answer `question` from `results`.
    ///
    /// An empty `results` short-circuits to [`Answer::not_found`] without
    /// calling `completion`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::CompletionService`] if the call fails after retries
    /// or the model returns an empty response.
    pub async fn compose(
        &self,
        question: &str,
        results: &[SearchResult],
        completion: &dyn CompletionProvider,
    ) -> Result<Answer> {
        if results.is_empty() {
            info!("no context retrieved, answering with the not-found sentinel");
            return Ok(Answer::not_found());
        }

        let provider = completion.name();
        let request =
            CompletionRequest::new(self.render_prompt(question, results)).with_max_tokens(self.max_tokens);
        debug!(provider, prompt_len = request.prompt.len(), context_chunks = results.len(), "requesting completion");

        let raw = call_with_retry(
            &self.retry,
            self.timeout,
            Service::Completion,
            provider,
            "complete",
            || completion.complete(&request),
        )
        .await
        .inspect_err(|e| error!(provider, error = %e, "completion failed"))?;

        let text = raw.trim();
        if text.is_empty() {
            error!(provider, "completion service returned an empty answer");
            return Err(RagError::completion(provider, "empty response", false));
        }

        let answer = if is_not_found_reply(text) { Answer::not_found() } else { Answer::new(text) };
        info!(provider, not_found = answer.is_not_found(), answer_len = answer.text.len(), "answer composed");
        Ok(answer)
    }
}

/// Substitute placeholders in a single pass over `template`.
///
/// Placeholder-looking text inside `context` or `question` is left alone.
fn render(template: &str, context: &str, question: &str) -> String {
    let mut out = String::with_capacity(template.len() + context.len() + question.len());
    let mut rest = template;

    while let Some(pos) = rest.find('{') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if let Some(after) = tail.strip_prefix(CONTEXT_PLACEHOLDER) {
            out.push_str(context);
            rest = after;
        } else if let Some(after) = tail.strip_prefix(QUESTION_PLACEHOLDER) {
            out.push_str(question);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

/// Whether `text` is the sentinel, ignoring case, quotes and the final period.
fn is_not_found_reply(text: &str) -> bool {
    let normalize =
        |s: &str| s.trim().trim_matches(|c| c == '"' || c == '\'').trim_end_matches('.').to_lowercase();
    normalize(text) == normalize(NOT_FOUND_ANSWER)
}
