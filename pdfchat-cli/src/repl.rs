//! Interactive question prompt.

use anyhow::Result;
use pdfchat_rag::{RagError, RagPipeline};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::error;

use crate::interrupt::{ctrl_c, or_interrupt};

const PROMPT: &str = "question> ";

/// Read questions until EOF, Ctrl-C or `exit`; print one answer per question.
///
/// A failed question is reported and the loop continues with the same document.
pub async fn run(pipeline: &RagPipeline) -> Result<()> {
    let mut editor = DefaultEditor::new()?;
    eprintln!("Ask a question about the document (Ctrl-D or `exit` to quit).");

    loop {
        let line = match on_blocking_thread(|| editor.readline(PROMPT)) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question, "exit" | "quit") {
            break;
        }
        editor.add_history_entry(question)?;

        match or_interrupt(pipeline.ask(question), ctrl_c()).await {
            None => eprintln!("Interrupted."),
            Some(Ok(answer)) => println!("{answer}\n"),
            Some(Err(RagError::InvalidInput(message))) => eprintln!("{message}"),
            Some(Err(e)) => {
                error!(error = %e, "question failed");
                eprintln!("Error: {e}");
            }
        }
    }
    Ok(())
}

/// Run a blocking terminal read without stalling the runtime worker it is called from.
///
/// Requires the multi-threaded runtime.
fn on_blocking_thread<T>(read: impl FnOnce() -> T) -> T {
    tokio::task::block_in_place(read)
}
