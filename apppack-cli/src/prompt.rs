//! Terminal prompts backed by inquire

use apppack_core::{Choice, EngineError, EngineResult, Prompter, Question};
use inquire::{Confirm, InquireError, Select, Text};

pub struct InquirePrompter;

fn prompt_error(e: InquireError) -> EngineError {
    match e {
        InquireError::OperationCanceled | InquireError::OperationInterrupted => {
            EngineError::aborted("cancelled by user")
        }
        other => EngineError::user_input(format!("prompt failed: {}", other)),
    }
}

fn help_text(question: &Question) -> Option<&str> {
    Some(question.help.as_str()).filter(|help| !help.is_empty())
}

/// Split a list answer on commas or whitespace
fn split_answer(answer: &str) -> Vec<String> {
    answer
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

impl Prompter for InquirePrompter {
    fn text(&self, question: &Question, default: &str) -> EngineResult<String> {
        let mut prompt = Text::new(&question.verbose);
        if !default.is_empty() {
            prompt = prompt.with_default(default);
        }
        if let Some(help) = help_text(question) {
            prompt = prompt.with_help_message(help);
        }
        prompt.prompt().map_err(prompt_error)
    }

    fn yes_no(&self, question: &Question, default: bool) -> EngineResult<bool> {
        let mut prompt = Confirm::new(&question.verbose).with_default(default);
        if let Some(help) = help_text(question) {
            prompt = prompt.with_help_message(help);
        }
        prompt.prompt().map_err(prompt_error)
    }

    fn select(
        &self,
        question: &Question,
        choices: &[Choice],
        default: Option<&str>,
    ) -> EngineResult<String> {
        let labels: Vec<&str> = choices.iter().map(|c| c.label.as_str()).collect();
        let cursor = default
            .and_then(|value| choices.iter().position(|c| c.value == value))
            .unwrap_or(0);
        let mut prompt = Select::new(&question.verbose, labels).with_starting_cursor(cursor);
        if let Some(help) = help_text(question) {
            prompt = prompt.with_help_message(help);
        }
        let picked = prompt.raw_prompt().map_err(prompt_error)?;
        choices
            .get(picked.index)
            .map(|c| c.value.clone())
            .ok_or_else(|| EngineError::user_input("selection out of range"))
    }

    fn list(&self, question: &Question, default: &[String]) -> EngineResult<Vec<String>> {
        let joined = default.join(", ");
        let help = match help_text(question) {
            Some(help) => format!("{} (separate entries with commas)", help),
            None => "separate entries with commas".to_string(),
        };
        let mut prompt = Text::new(&question.verbose).with_help_message(&help);
        if !joined.is_empty() {
            prompt = prompt.with_default(&joined);
        }
        let answer = prompt.prompt().map_err(prompt_error)?;
        Ok(split_answer(&answer))
    }

    fn input(&self, message: &str) -> EngineResult<String> {
        Text::new(message).prompt().map_err(prompt_error)
    }

    fn pause(&self, message: &str) -> EngineResult<()> {
        Text::new(message)
            .with_help_message("press ENTER to continue")
            .prompt()
            .map(|_| ())
            .map_err(prompt_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_answer() {
        assert_eq!(
            split_answer("alice@example.com, bob@example.com\ncarol@example.com,,"),
            vec!["alice@example.com", "bob@example.com", "carol@example.com"]
        );
        assert!(split_answer("  ").is_empty());
    }

    #[test]
    fn test_cancel_aborts() {
        assert!(matches!(
            prompt_error(InquireError::OperationCanceled),
            EngineError::ConfirmationAborted(_)
        ));
        assert!(matches!(
            prompt_error(InquireError::NotTTY),
            EngineError::UserInput(_)
        ));
    }
}
