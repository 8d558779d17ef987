//! Prompt rendering and answer normalisation.

mod common;

use std::collections::HashMap;
use std::time::Duration;

use common::{ScriptedCompletion, prompt_sections};
use pdfchat_rag::{
    AnswerComposer, CONTEXT_DELIMITER, Chunk, NOT_FOUND_ANSWER, RagConfig, RagError, RetryPolicy,
    SearchResult,
};

fn result(text: &str, score: f32) -> SearchResult {
    SearchResult {
        chunk: Chunk {
            id: format!("doc_{}", text.len()),
            document_id: "doc".into(),
            text: text.into(),
            start: 0,
            end: text.chars().count(),
            source_name: None,
            page_number: None,
            metadata: HashMap::new(),
        },
        score,
    }
}

fn quick_composer(retry: RetryPolicy) -> AnswerComposer {
    let config = RagConfig::builder()
        .retry(retry)
        .request_timeout(Duration::from_millis(200))
        .build()
        .unwrap();
    AnswerComposer::from_config(&config)
}

#[tokio::test]
async fn no_context_answers_not_found_without_calling_the_model() {
    let completion = ScriptedCompletion::replying("Paris");
    let answer = AnswerComposer::default().compose("Where?", &[], &completion).await.unwrap();

    assert!(answer.is_not_found());
    assert_eq!(answer.as_str(), NOT_FOUND_ANSWER);
    assert_eq!(completion.call_count(), 0);
}

#[tokio::test]
async fn prompt_keeps_retrieval_order_and_delimiter() {
    let completion = ScriptedCompletion::replying("ok");
    let results = [result("best match", 0.9), result("second match", 0.5), result("third", 0.1)];

    AnswerComposer::default().compose("Which?", &results, &completion).await.unwrap();

    let request = completion.last_request().unwrap();
    let (context, question) = prompt_sections(&request.prompt);
    assert_eq!(context, ["best match", "second match", "third"].join(CONTEXT_DELIMITER));
    assert_eq!(question, "Which?");
    assert!(request.prompt.contains(NOT_FOUND_ANSWER));
}

#[tokio::test]
async fn requests_are_deterministic_and_carry_the_token_cap() {
    let completion = ScriptedCompletion::replying("ok");
    let config = RagConfig::builder().max_answer_tokens(128).build().unwrap();

    AnswerComposer::from_config(&config)
        .compose("q", &[result("ctx", 1.0)], &completion)
        .await
        .unwrap();

    let request = completion.last_request().unwrap();
    assert_eq!(request.temperature, 0.0);
    assert_eq!(request.max_tokens, Some(128));
}

#[tokio::test]
async fn model_answer_is_trimmed() {
    let completion = ScriptedCompletion::replying("  The capital is Paris.\n");
    let answer =
        AnswerComposer::default().compose("q", &[result("ctx", 1.0)], &completion).await.unwrap();
    assert_eq!(answer.as_str(), "The capital is Paris.");
    assert!(!answer.is_not_found());
}

#[tokio::test]
async fn sentinel_variants_are_normalised() {
    for reply in [
        "Answer not found in the document",
        "\"Answer not found in the document.\"",
        "answer not found in the document.",
    ] {
        let completion = ScriptedCompletion::replying(reply);
        let answer =
            AnswerComposer::default().compose("q", &[result("ctx", 1.0)], &completion).await.unwrap();
        assert_eq!(answer.as_str(), NOT_FOUND_ANSWER, "reply {reply:?}");
    }
}

#[tokio::test]
async fn empty_model_response_is_an_error() {
    let completion = ScriptedCompletion::replying("   \n");
    let err =
        AnswerComposer::default().compose("q", &[result("ctx", 1.0)], &completion).await.unwrap_err();
    assert!(matches!(err, RagError::CompletionService { retryable: false, .. }));
}

#[tokio::test]
async fn permanent_failure_is_not_retried() {
    let completion = ScriptedCompletion::new(|_| {
        Err(RagError::CompletionService {
            provider: "scripted".into(),
            message: "invalid api key".into(),
            retryable: false,
        })
    });
    let err = AnswerComposer::default()
        .compose("q", &[result("ctx", 1.0)], &completion)
        .await
        .unwrap_err();

    assert!(!err.is_retryable());
    assert_eq!(completion.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_use_every_attempt() {
    let completion = ScriptedCompletion::new(|_| {
        Err(RagError::CompletionService {
            provider: "scripted".into(),
            message: "rate limited".into(),
            retryable: true,
        })
    });
    let err = AnswerComposer::default()
        .compose("q", &[result("ctx", 1.0)], &completion)
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(completion.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn slow_model_times_out() {
    let completion = ScriptedCompletion::replying("too late").with_delay(Duration::from_secs(5));
    let err = quick_composer(RetryPolicy::none())
        .compose("q", &[result("ctx", 1.0)], &completion)
        .await
        .unwrap_err();

    match err {
        RagError::CompletionService { retryable, message, .. } => {
            assert!(retryable);
            assert!(message.contains("timed out"), "message was {message}");
        }
        other => panic!("expected a completion error, got {other:?}"),
    }
}

#[test]
fn template_must_name_both_placeholders() {
    assert!(matches!(
        AnswerComposer::default().with_template("Only {question}"),
        Err(RagError::ConfigError(_))
    ));
    assert!(matches!(
        AnswerComposer::default().with_template("Only {context}"),
        Err(RagError::ConfigError(_))
    ));

    let composer = AnswerComposer::default().with_template("Q: {question}\nC: {context}").unwrap();
    let prompt = composer.render_prompt("why?", &[result("because", 1.0)]);
    assert_eq!(prompt, "Q: why?\nC: because");
}
