//! Interactive question prompt.

use anyhow::Result;
use docqa_rag::RagAssistant;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

/// Inputs that end the prompt loop, compared case-insensitively.
pub const EXIT_COMMANDS: &[&str] = &["exit", "quit", "q"];

/// Whether `input` asks to leave the prompt.
pub fn is_exit_command(input: &str) -> bool {
    let input = input.trim();
    EXIT_COMMANDS.iter().any(|cmd| input.eq_ignore_ascii_case(cmd))
}

/// Answer a single question and print the reply.
pub async fn ask_once(assistant: &RagAssistant, question: &str) -> Result<()> {
    let answer = assistant.ask(question).await?;
    println!("{}", answer.text);
    Ok(())
}

/// Read questions until an exit command, Ctrl-C, or end of input.
///
/// A failed question prints its error and the loop keeps going.
pub async fn run_console(assistant: &RagAssistant) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    println!("Ask a question (type 'exit' to quit).");

    loop {
        let line = match rl.readline("question> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };

        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if is_exit_command(question) {
            break;
        }
        let _ = rl.add_history_entry(question);

        match assistant.ask(question).await {
            Ok(answer) => println!("\n{}\n", answer.text),
            Err(e) => {
                tracing::error!(error = %e, "question failed");
                eprintln!("Error: {e}");
            }
        }
    }

    println!("Goodbye.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_exit_commands() {
        for input in ["exit", "quit", "q", "EXIT", " Quit ", "Q"] {
            assert!(is_exit_command(input), "{input:?}");
        }
    }

    #[test]
    fn questions_are_not_exit_commands() {
        for input in ["", "question", "quit now", "exit?", "what is q"] {
            assert!(!is_exit_command(input), "{input:?}");
        }
    }
}
