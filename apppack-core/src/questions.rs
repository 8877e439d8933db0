//! Questionnaire - Fill unset record fields by asking the user
//!
//! Terminal interaction lives behind [`Prompter`]; the walker only decides
//! which questions to ask and how answers land in the record.

use std::sync::Arc;

use crate::error::{EngineError, EngineResult};
use crate::params::{FieldKind, FieldValue, ParameterRecord};
use crate::stack::Stack;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub label: String,
    pub value: String,
}

impl Choice {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Widget {
    Text,
    YesNo,
    Select(Vec<Choice>),
    /// One entry per line
    List,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Record key the answer is written to
    pub key: &'static str,
    pub verbose: String,
    pub help: String,
    pub widget: Widget,
    pub required: bool,
}

impl Question {
    pub fn new(key: &'static str, verbose: impl Into<String>, widget: Widget) -> Self {
        Self {
            key,
            verbose: verbose.into(),
            help: String::new(),
            widget,
            required: false,
        }
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Terminal seam for prompts
pub trait Prompter: Send + Sync {
    fn text(&self, question: &Question, default: &str) -> EngineResult<String>;

    fn yes_no(&self, question: &Question, default: bool) -> EngineResult<bool>;

    fn select(
        &self,
        question: &Question,
        choices: &[Choice],
        default: Option<&str>,
    ) -> EngineResult<String>;

    fn list(&self, question: &Question, default: &[String]) -> EngineResult<Vec<String>>;

    /// Free-form line of input, used for confirmations
    fn input(&self, message: &str) -> EngineResult<String>;

    /// Show a message and wait for ENTER
    fn pause(&self, message: &str) -> EngineResult<()>;
}

/// Walks questions for a parameter record
#[derive(Clone)]
pub struct Questionnaire {
    prompter: Arc<dyn Prompter>,
    interactive: bool,
}

impl Questionnaire {
    pub fn new(prompter: Arc<dyn Prompter>, interactive: bool) -> Self {
        Self {
            prompter,
            interactive,
        }
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn prompter(&self) -> &dyn Prompter {
        self.prompter.as_ref()
    }

    /// Ask every question in order
    ///
    /// `bound` lists keys already set from flags; they are never asked.
    pub fn run<R: ParameterRecord>(
        &self,
        record: &mut R,
        questions: &[Question],
        bound: &[&str],
        current: Option<&Stack>,
    ) -> EngineResult<()> {
        for question in questions {
            self.ask_one(record, question, bound, current)?;
        }
        Ok(())
    }

    pub fn ask_one<R: ParameterRecord>(
        &self,
        record: &mut R,
        question: &Question,
        bound: &[&str],
        current: Option<&Stack>,
    ) -> EngineResult<()> {
        if bound.contains(&question.key) {
            return Ok(());
        }
        let spec = R::field(question.key).ok_or_else(|| {
            EngineError::user_input(format!("no field {} to ask about", question.key))
        })?;

        // Once the stack holds a stateful value it is never offered again.
        if spec.stateful
            && current
                .and_then(|stack| stack.parameter(spec.key))
                .is_some_and(|v| !v.is_empty())
        {
            return Ok(());
        }

        let existing = record.get(spec.key);

        if !self.interactive {
            let unset = existing.as_ref().is_none_or(FieldValue::is_empty);
            if question.required && unset {
                let hint = spec
                    .flag
                    .as_ref()
                    .map(|b| format!("--{}", b.flag))
                    .unwrap_or_else(|| spec.key.to_string());
                return Err(EngineError::user_input(format!(
                    "{} is required in non-interactive mode",
                    hint
                )));
            }
            return Ok(());
        }

        let answer = match (&question.widget, spec.kind) {
            (Widget::YesNo, FieldKind::Bool) => {
                let default = matches!(existing, Some(FieldValue::Bool(true)));
                FieldValue::Bool(self.prompter.yes_no(question, default)?)
            }
            (Widget::Select(choices), FieldKind::String) => {
                if choices.is_empty() {
                    return Err(EngineError::DirectoryEmpty(format!(
                        "nothing to choose for {}",
                        question.verbose
                    )));
                }
                let mut sorted = choices.clone();
                sorted.sort_by(|a, b| a.label.cmp(&b.label));
                let default = match &existing {
                    Some(FieldValue::String(s)) if !s.is_empty() => Some(s.as_str()),
                    _ => None,
                };
                FieldValue::String(self.prompter.select(question, &sorted, default)?)
            }
            (Widget::List, FieldKind::List) => {
                let default = match &existing {
                    Some(FieldValue::List(items)) => items.clone(),
                    _ => Vec::new(),
                };
                let items = self
                    .prompter
                    .list(question, &default)?
                    .into_iter()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                FieldValue::List(items)
            }
            (Widget::Text, FieldKind::String) => {
                let default = existing.map(|v| v.encode(spec.bool_style)).unwrap_or_default();
                FieldValue::String(self.prompter.text(question, &default)?.trim().to_string())
            }
            (Widget::Text, FieldKind::Int) => {
                let default = existing.map(|v| v.encode(spec.bool_style)).unwrap_or_default();
                let raw = self.prompter.text(question, &default)?;
                let n = raw.trim().parse().map_err(|_| {
                    EngineError::user_input(format!("{}: '{}' is not a number", spec.key, raw))
                })?;
                FieldValue::Int(n)
            }
            (widget, kind) => {
                return Err(EngineError::user_input(format!(
                    "{}: cannot ask a {:?} question for a {} field",
                    spec.key, widget, kind
                )));
            }
        };

        if question.required && answer.is_empty() {
            return Err(EngineError::user_input(format!(
                "{} is required",
                question.verbose
            )));
        }
        record.set(spec.key, answer)?;
        Ok(())
    }

    /// Require the literal answer `yes`
    pub fn confirm_yes(&self, message: &str) -> EngineResult<()> {
        self.confirm_echo(message, "yes")
    }

    /// Require the user to type `expected` exactly
    pub fn confirm_echo(&self, message: &str, expected: &str) -> EngineResult<()> {
        if !self.interactive {
            return Err(EngineError::aborted(format!(
                "confirmation required but running non-interactively ({})",
                message
            )));
        }
        let answer = self.prompter.input(message)?;
        if answer.trim() == expected {
            Ok(())
        } else {
            Err(EngineError::aborted(format!(
                "expected '{}', got '{}'",
                expected,
                answer.trim()
            )))
        }
    }

    pub fn pause(&self, message: &str) -> EngineResult<()> {
        if !self.interactive {
            return Err(EngineError::precondition(message.to_string()));
        }
        self.prompter.pause(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter_record;
    use crate::stack::StackStatus;
    use crate::testing::ScriptedPrompter;

    parameter_record! {
        struct Sample {
            cluster: String => "ClusterStackName"
                .flag_format("cluster", "apppack-cluster-{}")
                .stateful(),
            branch: String => "Branch".flag("branch"),
            domains: Vec<String> => "Domains",
            sqs: bool => "SQSQueueEnabled",
            storage: i64 => "AllocatedStorage",
        }
    }

    fn questions() -> Vec<Question> {
        vec![
            Question::new(
                "ClusterStackName",
                "Cluster",
                Widget::Select(vec![
                    Choice::new("zeta", "apppack-cluster-zeta"),
                    Choice::new("alpha", "apppack-cluster-alpha"),
                ]),
            )
            .required(),
            Question::new("Branch", "Branch", Widget::Text).required(),
            Question::new("Domains", "Domains", Widget::List),
            Question::new("SQSQueueEnabled", "SQS queue", Widget::YesNo),
            Question::new("AllocatedStorage", "Storage (GB)", Widget::Text),
        ]
    }

    #[test]
    fn test_answers_land_in_record() {
        let prompter = Arc::new(
            ScriptedPrompter::new()
                .answer("apppack-cluster-alpha")
                .answer("develop")
                .answer_list(&["a.example.com", ""])
                .answer_bool(true)
                .answer("20"),
        );
        let q = Questionnaire::new(prompter.clone(), true);
        let mut record = Sample::default();
        q.run(&mut record, &questions(), &[], None).unwrap();

        assert_eq!(record.cluster, "apppack-cluster-alpha");
        assert_eq!(record.branch, "develop");
        assert_eq!(record.domains, vec!["a.example.com"]);
        assert!(record.sqs);
        assert_eq!(record.storage, 20);
        assert_eq!(
            prompter.seen_choices(),
            vec![vec!["alpha".to_string(), "zeta".to_string()]]
        );
    }

    #[test]
    fn test_flag_bound_keys_are_skipped() {
        let prompter = Arc::new(
            ScriptedPrompter::new()
                .answer_list(&[])
                .answer_bool(false)
                .answer("10"),
        );
        let q = Questionnaire::new(prompter, true);
        let mut record = Sample {
            cluster: "apppack-cluster-x".to_string(),
            branch: "main".to_string(),
            ..Default::default()
        };
        q.run(
            &mut record,
            &questions(),
            &["ClusterStackName", "Branch"],
            None,
        )
        .unwrap();
        assert_eq!(record.cluster, "apppack-cluster-x");
        assert_eq!(record.branch, "main");
    }

    #[test]
    fn test_stateful_field_not_asked_when_set_on_stack() {
        let prompter = Arc::new(ScriptedPrompter::new().answer("main"));
        let q = Questionnaire::new(prompter, true);
        let stack = Stack {
            stack_id: "id".to_string(),
            stack_name: "apppack-app-x".to_string(),
            status: StackStatus::CreateComplete,
            status_reason: None,
            parameters: vec![crate::params::Parameter::new(
                "ClusterStackName",
                "apppack-cluster-zeta",
            )],
            outputs: vec![],
            tags: vec![],
            capabilities: vec![],
        };
        let mut record = Sample {
            cluster: "apppack-cluster-zeta".to_string(),
            ..Default::default()
        };
        let qs = questions();
        q.run(&mut record, &qs[..2], &[], Some(&stack)).unwrap();
        assert_eq!(record.cluster, "apppack-cluster-zeta");
        assert_eq!(record.branch, "main");
    }

    #[test]
    fn test_non_interactive_missing_required() {
        let q = Questionnaire::new(Arc::new(ScriptedPrompter::new()), false);
        let mut record = Sample::default();
        let err = q.run(&mut record, &questions(), &[], None).unwrap_err();
        assert!(matches!(err, EngineError::UserInput(ref m) if m.contains("--cluster")));
    }

    #[test]
    fn test_empty_select_is_directory_empty() {
        let q = Questionnaire::new(Arc::new(ScriptedPrompter::new()), true);
        let mut record = Sample::default();
        let question = Question::new("ClusterStackName", "Cluster", Widget::Select(vec![]));
        let err = q.ask_one(&mut record, &question, &[], None).unwrap_err();
        assert!(matches!(err, EngineError::DirectoryEmpty(_)));
    }

    #[test]
    fn test_confirm_echo() {
        let q = Questionnaire::new(
            Arc::new(ScriptedPrompter::new().answer("apppack-app-x").answer("nope")),
            true,
        );
        assert!(q.confirm_echo("type the name", "apppack-app-x").is_ok());
        assert!(matches!(
            q.confirm_yes("sure?"),
            Err(EngineError::ConfirmationAborted(_))
        ));

        let batch = Questionnaire::new(Arc::new(ScriptedPrompter::new()), false);
        assert!(matches!(
            batch.confirm_yes("sure?"),
            Err(EngineError::ConfirmationAborted(_))
        ));
    }
}
