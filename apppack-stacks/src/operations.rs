//! Operations - The create, modify, upgrade and destroy verbs plus the stack listing
//!
//! Each verb resolves a resource kind, runs its questionnaire and hooks in a
//! fixed order and hands the result to the stack driver.

use std::collections::BTreeMap;
use std::fmt;

use apppack_core::{
    ChangeSetPreview, CreateRetry, EngineError, EngineResult, FlagValues, Stack, StackKind,
    StackType, TemplateSource, UpdateOutcome,
};
use log::info;

use crate::kinds::{Resource, new_resource};
use crate::session::Session;

/// Mutating verbs of the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Create,
    Modify,
    Upgrade,
    Destroy,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Create => "create",
            Verb::Modify => "modify",
            Verb::Upgrade => "upgrade",
            Verb::Destroy => "destroy",
        }
    }

    /// Resource kinds the verb applies to
    pub fn nouns(&self) -> &'static [StackType] {
        match self {
            Verb::Create | Verb::Destroy => &StackType::ALL,
            Verb::Modify => &[
                StackType::Cluster,
                StackType::App,
                StackType::Pipeline,
                StackType::Database,
                StackType::Redis,
            ],
            Verb::Upgrade => &[
                StackType::Account,
                StackType::Region,
                StackType::Cluster,
                StackType::App,
                StackType::Pipeline,
                StackType::Database,
                StackType::Redis,
                StackType::CustomDomain,
            ],
        }
    }

    pub fn supports(&self, stack_type: StackType) -> bool {
        self.nouns().contains(&stack_type)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a verb did
#[derive(Debug, Clone)]
pub enum Outcome {
    Applied(Stack),
    /// An update found nothing to change
    Unchanged(String),
    Preview(ChangeSetPreview),
    Destroyed(String),
}

impl From<UpdateOutcome> for Outcome {
    fn from(outcome: UpdateOutcome) -> Self {
        match outcome {
            UpdateOutcome::Updated(stack) => Outcome::Applied(stack),
            UpdateOutcome::Unchanged(stack) => Outcome::Unchanged(stack.stack_name),
        }
    }
}

fn ensure_supported(verb: Verb, stack_type: StackType) -> EngineResult<()> {
    if verb.supports(stack_type) {
        Ok(())
    } else {
        Err(EngineError::user_input(format!(
            "{} is not supported for {}",
            verb, stack_type
        )))
    }
}

fn release_template(session: &Session, resource: &dyn Resource) -> TemplateSource {
    TemplateSource::Url(resource.template_url(
        &session.settings.template_bucket,
        &session.context.release,
    ))
}

/// Create a new stack for `stack_type` named `name`
pub async fn create(
    session: &Session,
    stack_type: StackType,
    name: &str,
    flags: &FlagValues,
) -> EngineResult<Outcome> {
    ensure_supported(Verb::Create, stack_type)?;
    let mut resource = new_resource(stack_type, name, session)?;
    let driver = session.driver();

    let stack_name = resource.stack_name();
    if driver.load_for_create(&stack_name).await?.is_some() {
        return Err(EngineError::precondition(format!(
            "{} already exists",
            stack_name
        )));
    }

    let bound = resource.update_from_flags(flags)?;
    resource.ask_questions(session, &bound, None).await?;
    resource.set_internal_fields(session, None).await?;
    resource.preflight(session, None).await?;

    if session.context.check {
        let template = release_template(session, resource.as_ref());
        let preview = driver.preview(resource.as_ref(), None, template).await?;
        return Ok(Outcome::Preview(preview));
    }
    let stack = driver.create(resource.as_ref(), CreateRetry::Once).await?;
    Ok(Outcome::Applied(stack))
}

/// Change parameters of an existing stack, keeping its template
pub async fn modify(
    session: &Session,
    stack_type: StackType,
    name: &str,
    flags: &FlagValues,
) -> EngineResult<Outcome> {
    ensure_supported(Verb::Modify, stack_type)?;
    let mut resource = new_resource(stack_type, name, session)?;
    let driver = session.driver();

    let current = driver.load_owned(&resource.stack_name()).await?;
    resource.import_parameters(&current.parameters)?;

    let bound = resource.update_from_flags(flags)?;
    resource.ask_questions(session, &bound, Some(&current)).await?;
    resource.set_internal_fields(session, Some(&current)).await?;
    resource.preflight(session, Some(&current)).await?;

    if session.context.check {
        let preview = driver
            .preview(resource.as_ref(), Some(&current), TemplateSource::Previous)
            .await?;
        return Ok(Outcome::Preview(preview));
    }
    let outcome = driver
        .modify(resource.as_ref(), &current, TemplateSource::Previous)
        .await?;
    Ok(outcome.into())
}

/// Move an existing stack to the template of the selected release
pub async fn upgrade(session: &Session, stack_type: StackType, name: &str) -> EngineResult<Outcome> {
    ensure_supported(Verb::Upgrade, stack_type)?;
    let mut resource = new_resource(stack_type, name, session)?;
    let driver = session.driver();

    let current = driver.load_owned(&resource.stack_name()).await?;
    resource.import_parameters(&current.parameters)?;
    let template = release_template(session, resource.as_ref());
    info!(
        "upgrading {} to release {}",
        current.stack_name, session.context.release
    );

    if session.context.check {
        let preview = driver
            .preview(resource.as_ref(), Some(&current), template)
            .await?;
        return Ok(Outcome::Preview(preview));
    }
    let outcome = driver.modify(resource.as_ref(), &current, template).await?;
    Ok(outcome.into())
}

/// Delete a stack after the user types its name back
pub async fn destroy(session: &Session, stack_type: StackType, name: &str) -> EngineResult<Outcome> {
    ensure_supported(Verb::Destroy, stack_type)?;
    if session.context.check {
        return Err(EngineError::user_input("--check is not supported for destroy"));
    }
    let mut resource = new_resource(stack_type, name, session)?;
    resource.prepare_destroy(session).await?;

    let stack_name = resource.stack_name();
    session.questionnaire.confirm_echo(
        &format!(
            "This permanently deletes {} and its data. Type the stack name to continue",
            stack_name
        ),
        &stack_name,
    )?;
    session.driver().delete(resource.as_ref()).await?;
    Ok(Outcome::Destroyed(stack_name))
}

/// Owned stacks grouped by kind, each group sorted by name
pub async fn list_stacks(session: &Session) -> EngineResult<BTreeMap<StackType, Vec<Stack>>> {
    let mut groups: BTreeMap<StackType, Vec<Stack>> = BTreeMap::new();
    for stack in session.gateway.stacks.describe_stacks().await? {
        if !stack.is_owned() {
            continue;
        }
        if let Some((stack_type, _)) = StackType::from_stack_name(&stack.stack_name) {
            groups.entry(stack_type).or_default().push(stack);
        }
    }
    for stacks in groups.values_mut() {
        stacks.sort_by(|a, b| a.stack_name.cmp(&b.stack_name));
    }
    Ok(groups)
}
