//! Deterministic test doubles shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use pdfchat_rag::{
    CompletionProvider, CompletionRequest, EmbeddingProvider, NOT_FOUND_ANSWER, RagError, Result,
};

pub const DIM: usize = 64;

const STOPWORDS: &[&str] =
    &["a", "an", "and", "are", "does", "in", "is", "of", "on", "the", "to", "was", "what", "who"];

/// Lowercased alphanumeric words of `text`, stopwords removed.
pub fn keywords(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// Bag-of-words embedding: every keyword adds 1.0 to a hashed bucket.
///
/// Texts sharing words get positive cosine similarity, so retrieval
/// behaves sensibly without a model.
pub fn keyword_embedding(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIM];
    for word in keywords(text) {
        let hash = word.bytes().fold(0xcbf29ce484222325u64, |acc, b| {
            (acc ^ b as u64).wrapping_mul(0x100000001b3)
        });
        v[(hash % DIM as u64) as usize] += 1.0;
    }
    v
}

/// A scripted failure returned by [`KeywordEmbedder`] before it starts succeeding.
#[derive(Debug, Clone, Copy)]
pub struct Failure {
    pub retryable: bool,
}

#[derive(Default)]
pub struct KeywordEmbedder {
    pub embed_calls: AtomicUsize,
    pub batch_calls: AtomicUsize,
    pub embedded_texts: AtomicUsize,
    failures: Mutex<VecDeque<Failure>>,
    delay: Option<Duration>,
}

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next calls with the given failures, in order.
    pub fn failing(failures: impl IntoIterator<Item = Failure>) -> Self {
        Self { failures: Mutex::new(failures.into_iter().collect()), ..Self::default() }
    }

    /// Sleep this long inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn total_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst) + self.batch_calls.load(Ordering::SeqCst)
    }

    async fn before_call(&self) -> Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let failure = self.failures.lock().unwrap().pop_front();
        match failure {
            Some(f) => Err(RagError::EmbeddingService {
                provider: "keyword".into(),
                message: "scripted failure".into(),
                retryable: f.retryable,
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        self.before_call().await?;
        Ok(keyword_embedding(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        self.before_call().await?;
        self.embedded_texts.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| keyword_embedding(t)).collect())
    }

    fn dimensions(&self) -> usize {
        DIM
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

type Responder = Box<dyn Fn(&CompletionRequest) -> Result<String> + Send + Sync>;

/// A completion double that records requests and answers through a closure.
pub struct ScriptedCompletion {
    pub calls: AtomicUsize,
    pub requests: Mutex<Vec<CompletionRequest>>,
    respond: Responder,
    delay: Option<Duration>,
}

impl ScriptedCompletion {
    pub fn new(respond: impl Fn(&CompletionRequest) -> Result<String> + Send + Sync + 'static) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            respond: Box::new(respond),
            delay: None,
        }
    }

    /// Always reply with `text`.
    pub fn replying(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_| Ok(text.clone()))
    }

    /// Answer like an obedient model: quote the context sentence that mentions
    /// every keyword of the question, or reply with the sentinel.
    pub fn grounded() -> Self {
        Self::new(|request| Ok(grounded_reply(&request.prompt)))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedCompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.respond)(request)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Pull the context and question back out of a prompt rendered with the default template.
pub fn prompt_sections(prompt: &str) -> (String, String) {
    let context = prompt
        .split_once("Context:\n")
        .and_then(|(_, rest)| rest.split_once("\n\nQuestion:\n"))
        .map(|(context, _)| context.to_string())
        .unwrap_or_default();
    let question = prompt
        .split_once("Question:\n")
        .and_then(|(_, rest)| rest.split_once("\n\nAnswer:"))
        .map(|(question, _)| question.to_string())
        .unwrap_or_default();
    (context, question)
}

fn grounded_reply(prompt: &str) -> String {
    let (context, question) = prompt_sections(prompt);
    let wanted = keywords(&question);
    context
        .split_inclusive(['.', '!', '?'])
        .map(str::trim)
        .find(|sentence| {
            let have = keywords(sentence);
            !wanted.is_empty() && wanted.iter().all(|w| have.contains(w))
        })
        .map(str::to_string)
        .unwrap_or_else(|| NOT_FOUND_ANSWER.to_string())
}
