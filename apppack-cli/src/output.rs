//! Rendering of listings and verb outcomes

use std::collections::BTreeMap;

use apppack_core::{Stack, StackStatus, StackType};
use apppack_stacks::Outcome;
use colored::Colorize;

fn status_text(status: &StackStatus) -> String {
    let text = status.as_str();
    if status.is_in_progress() {
        text.yellow().to_string()
    } else if status.is_success() {
        text.green().to_string()
    } else {
        text.red().to_string()
    }
}

/// Stacks grouped by kind, names padded to one column
pub fn format_stacks(groups: &BTreeMap<StackType, Vec<Stack>>) -> String {
    if groups.is_empty() {
        return "No AppPack stacks found".dimmed().to_string();
    }
    let width = groups
        .values()
        .flatten()
        .map(|s| s.stack_name.len())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for (stack_type, stacks) in groups {
        out.push_str(&format!("{}\n", stack_type.as_str().bold()));
        for stack in stacks {
            out.push_str(&format!(
                "  {:<width$}  {}\n",
                stack.stack_name,
                status_text(&stack.status),
                width = width
            ));
        }
    }
    out
}

pub fn format_outcome(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Applied(stack) => {
            let mut out = format!("{}  {}", stack.stack_name.bold(), status_text(&stack.status));
            if let Some(reason) = &stack.status_reason {
                out.push_str(&format!("\n  {}", reason.dimmed()));
            }
            out
        }
        Outcome::Unchanged(stack_name) => {
            format!("{} is already up to date", stack_name.bold())
        }
        Outcome::Preview(preview) => format!(
            "Changeset {} created. Review it before applying:\n  {}",
            preview.name.bold(),
            preview.url.cyan()
        ),
        Outcome::Destroyed(stack_name) => format!("{} deleted", stack_name.bold()),
    }
}
