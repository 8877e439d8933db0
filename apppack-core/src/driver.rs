//! Driver - Walks a stack through create, modify, preview and delete
//!
//! Every mutation is followed by polling until the stack reaches a terminal
//! status. Resource-level progress is forwarded to a [`ProgressReporter`].

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use crate::error::{EngineError, EngineResult};
use crate::kind::{OWNERSHIP_TAG, Release, StackKind};
use crate::provider::{
    ChangeSetInput, ChangeSetType, Gateway, ProviderError, StackRequest, TemplateSource,
};
use crate::stack::{
    ChangeSetStatus, ResourceProgress, Stack, StackResource, StackStatus,
    change_set_console_url, first_failure, stack_console_url,
};

/// Receives progress while the driver waits
pub trait ProgressReporter: Send + Sync {
    fn start(&self, message: &str);

    /// Replace the current progress summary
    fn update(&self, message: &str);

    /// First failed resource of a wait; called at most once per wait
    fn failure(&self, resource: &StackResource);

    fn finish(&self, message: &str);
}

/// Reporter that only writes to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl ProgressReporter for LogReporter {
    fn start(&self, message: &str) {
        info!("{}", message);
    }

    fn update(&self, message: &str) {
        debug!("{}", message);
    }

    fn failure(&self, resource: &StackResource) {
        warn!(
            "{} failed: {}",
            resource.logical_id,
            resource.reason.as_deref().unwrap_or("no reason given")
        );
    }

    fn finish(&self, message: &str) {
        info!("{}", message);
    }
}

/// Whether a create that rolls back is deleted and attempted again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CreateRetry {
    Never,
    #[default]
    Once,
}

#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub template_bucket: String,
    pub release: Release,
    pub poll_interval: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            template_bucket: "apppack-cloudformations".to_string(),
            release: Release::Latest,
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// A changeset created for review, not applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSetPreview {
    pub name: String,
    pub id: String,
    pub stack_id: String,
    pub url: String,
}

/// What an update did to the stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated(Stack),
    /// The provider found nothing to change; the stack is as it was
    Unchanged(Stack),
}

/// Terminal stack plus the first failed resource seen while waiting
struct Settled {
    stack: Stack,
    failure: Option<StackResource>,
}

pub struct StackDriver {
    gateway: Gateway,
    config: DriverConfig,
    reporter: Arc<dyn ProgressReporter>,
}

impl StackDriver {
    pub fn new(gateway: Gateway, config: DriverConfig, reporter: Arc<dyn ProgressReporter>) -> Self {
        Self {
            gateway,
            config,
            reporter,
        }
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// The live stack with this name, if any
    pub async fn load(&self, stack_name: &str) -> EngineResult<Option<Stack>> {
        let stack = self.gateway.stacks.describe_stack(stack_name).await?;
        Ok(stack.filter(|s| s.status != StackStatus::DeleteComplete))
    }

    /// The live stack blocking a create of `stack_name`, if any
    ///
    /// A create preview leaves an empty owned stack in `REVIEW_IN_PROGRESS`.
    /// That stack holds no resources and is deleted here instead of blocking.
    pub async fn load_for_create(&self, stack_name: &str) -> EngineResult<Option<Stack>> {
        let Some(stack) = self.load(stack_name).await? else {
            return Ok(None);
        };
        if stack.status != StackStatus::ReviewInProgress || !stack.is_owned() {
            return Ok(Some(stack));
        }

        info!("discarding {} left in review by a changeset preview", stack_name);
        self.gateway
            .stacks
            .delete_stack(&stack.stack_id, None)
            .await
            .map_err(|e| e.for_stack(stack_name))?;
        self.reporter
            .start(&format!("discarding review stack {}", stack_name));
        let settled = self.wait_settled(&stack.stack_id).await?;
        if settled.stack.status != StackStatus::DeleteComplete {
            return Err(self.failure(settled));
        }
        self.reporter
            .finish(&format!("review stack {} discarded", stack_name));
        Ok(None)
    }

    /// The live stack with this name, refusing anything the engine does not own
    pub async fn load_owned(&self, stack_name: &str) -> EngineResult<Stack> {
        let stack = self
            .load(stack_name)
            .await?
            .ok_or_else(|| EngineError::precondition(format!("no such stack {}", stack_name)))?;
        ensure_owned(&stack)?;
        Ok(stack)
    }

    /// Create the stack for `kind` and wait for it
    ///
    /// With [`CreateRetry::Once`], a create that ends in `ROLLBACK_COMPLETE` is
    /// deleted and attempted exactly one more time with the same request.
    pub async fn create<K: StackKind + ?Sized>(
        &self,
        kind: &K,
        retry: CreateRetry,
    ) -> EngineResult<Stack> {
        let stack_name = kind.stack_name();
        if self.load_for_create(&stack_name).await?.is_some() {
            return Err(EngineError::precondition(format!(
                "{} already exists",
                stack_name
            )));
        }

        let template = TemplateSource::Url(
            kind.template_url(&self.config.template_bucket, &self.config.release),
        );
        let request = self.request(kind, template);
        let mut retried = false;

        loop {
            info!("creating stack {}", stack_name);
            let stack_id = self
                .gateway
                .stacks
                .create_stack(&request)
                .await
                .map_err(|e| e.for_stack(&stack_name))?;
            self.reporter.start(&format!("creating {}", stack_name));
            let settled = self.wait_settled(&stack_id).await?;

            if settled.stack.status.is_success() {
                self.reporter.finish(&format!("{} created", stack_name));
                if let Some(protected) = kind.protected_resource() {
                    protected.set(&self.gateway, &settled.stack, true).await?;
                }
                kind.post_create(&self.gateway, &settled.stack).await?;
                return Ok(settled.stack);
            }

            if settled.stack.status == StackStatus::RollbackComplete
                && retry == CreateRetry::Once
                && !retried
            {
                warn!("{} rolled back, deleting and retrying once", stack_name);
                retried = true;
                self.gateway
                    .stacks
                    .delete_stack(&settled.stack.stack_id, request.role_arn.as_deref())
                    .await
                    .map_err(|e| e.for_stack(&stack_name))?;
                self.reporter.start(&format!("deleting failed {}", stack_name));
                let deleted = self.wait_settled(&settled.stack.stack_id).await?;
                if deleted.stack.status != StackStatus::DeleteComplete {
                    return Err(self.failure(deleted));
                }
                continue;
            }

            return Err(self.failure(settled));
        }
    }

    /// Update an existing stack with the kind's parameters
    pub async fn modify<K: StackKind + ?Sized>(
        &self,
        kind: &K,
        current: &Stack,
        template: TemplateSource,
    ) -> EngineResult<UpdateOutcome> {
        ensure_owned(current)?;
        let mut request = self.request(kind, template);
        request.stack_name = current.stack_name.clone();

        info!("updating stack {}", current.stack_name);
        match self.gateway.stacks.update_stack(&request).await {
            Ok(_) => {}
            Err(e) if e.is_no_change() => {
                info!("{} is already up to date", current.stack_name);
                return Ok(UpdateOutcome::Unchanged(current.clone()));
            }
            Err(e) => return Err(e.for_stack(&current.stack_name).into()),
        }
        self.reporter.start(&format!("updating {}", current.stack_name));
        let settled = self.wait_settled(&current.stack_id).await?;

        if settled.stack.status.is_success() {
            self.reporter
                .finish(&format!("{} updated", current.stack_name));
            Ok(UpdateOutcome::Updated(settled.stack))
        } else {
            Err(self.failure(settled))
        }
    }

    /// Route a create or update through a changeset without applying it
    pub async fn preview<K: StackKind + ?Sized>(
        &self,
        kind: &K,
        current: Option<&Stack>,
        template: TemplateSource,
    ) -> EngineResult<ChangeSetPreview> {
        let change_set_type = match current {
            Some(stack) => {
                ensure_owned(stack)?;
                ChangeSetType::Update
            }
            None => ChangeSetType::Create,
        };
        let name = format!(
            "{}-{}",
            change_set_type.as_str(),
            chrono::Utc::now().timestamp()
        );
        let request = self.request(kind, template);
        let stack_name = request.stack_name.clone();

        info!("creating changeset {} for {}", name, stack_name);
        let created = self
            .gateway
            .stacks
            .create_change_set(&ChangeSetInput {
                name: name.clone(),
                change_set_type,
                request,
            })
            .await
            .map_err(|e| e.for_stack(&stack_name))?;

        self.reporter.start(&format!("creating changeset {}", name));
        let url = change_set_console_url(&self.gateway.region, &created.stack_id, &created.id);
        loop {
            let description = self.gateway.stacks.describe_change_set(&created.id).await?;
            debug!("changeset {}: {}", name, description.status);
            if description.status.is_settled() {
                if description.status != ChangeSetStatus::CreateComplete {
                    return Err(EngineError::StackFailure {
                        stack: stack_name,
                        status: description.status.to_string(),
                        reason: description.reason,
                        console_url: url,
                    });
                }
                break;
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
        self.reporter.finish(&format!("changeset {} ready", name));

        Ok(ChangeSetPreview {
            name,
            id: created.id,
            stack_id: created.stack_id,
            url,
        })
    }

    /// Delete the stack for `kind`
    ///
    /// When the stack is already gone, `post_delete` still runs so secondary
    /// effects are cleaned up, and the call fails with "no such stack".
    pub async fn delete<K: StackKind + ?Sized>(&self, kind: &K) -> EngineResult<()> {
        let stack_name = kind.stack_name();
        let Some(stack) = self.load(&stack_name).await? else {
            kind.post_delete(&self.gateway, None).await?;
            return Err(EngineError::precondition(format!(
                "no such stack {}",
                stack_name
            )));
        };
        ensure_owned(&stack)?;

        if let Some(protected) = kind.protected_resource() {
            protected.set(&self.gateway, &stack, false).await?;
        }
        kind.pre_delete(&self.gateway, &stack).await?;

        let role_arn = kind.role_arn();
        let mut retried = false;
        loop {
            info!("deleting stack {}", stack_name);
            self.gateway
                .stacks
                .delete_stack(&stack.stack_id, role_arn.as_deref())
                .await
                .map_err(|e| e.for_stack(&stack_name))?;
            self.reporter.start(&format!("deleting {}", stack_name));
            let settled = self.wait_settled(&stack.stack_id).await?;

            match settled.stack.status {
                StackStatus::DeleteComplete => break,
                StackStatus::DeleteFailed if kind.retry_failed_delete() && !retried => {
                    warn!("{} failed to delete, retrying once", stack_name);
                    retried = true;
                }
                _ => return Err(self.failure(settled)),
            }
        }

        self.reporter.finish(&format!("{} deleted", stack_name));
        kind.post_delete(&self.gateway, Some(&stack)).await?;
        Ok(())
    }

    /// Poll until the stack reaches a terminal status
    pub async fn wait(&self, stack_id: &str) -> EngineResult<Stack> {
        Ok(self.wait_settled(stack_id).await?.stack)
    }

    async fn wait_settled(&self, stack_id: &str) -> EngineResult<Settled> {
        let mut failure: Option<StackResource> = None;
        loop {
            let stack = self
                .gateway
                .stacks
                .describe_stack(stack_id)
                .await?
                .ok_or_else(|| ProviderError::not_found(format!("stack {} disappeared", stack_id)))?;

            match self.gateway.stacks.describe_stack_resources(stack_id).await {
                Ok(resources) => {
                    let progress = ResourceProgress::tally(&resources);
                    self.reporter
                        .update(&format!("{} ({})", stack.status, progress));
                    if failure.is_none() {
                        if let Some(failed) = first_failure(&resources) {
                            self.reporter.failure(failed);
                            failure = Some(failed.clone());
                        }
                    }
                }
                Err(e) => debug!("describe resources for {}: {}", stack.stack_name, e),
            }

            if stack.status.is_terminal() {
                debug!("{} settled at {}", stack.stack_name, stack.status);
                return Ok(Settled { stack, failure });
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    fn failure(&self, settled: Settled) -> EngineError {
        let reason = settled
            .failure
            .map(|r| match r.reason {
                Some(reason) => format!("{}: {}", r.logical_id, reason),
                None => r.logical_id,
            })
            .or(settled.stack.status_reason.clone());
        EngineError::StackFailure {
            console_url: stack_console_url(&self.gateway.region, &settled.stack.stack_id),
            stack: settled.stack.stack_name,
            status: settled.stack.status.to_string(),
            reason,
        }
    }

    fn request<K: StackKind + ?Sized>(&self, kind: &K, template: TemplateSource) -> StackRequest {
        let mut tags: Vec<(String, String)> = kind
            .tags()
            .into_iter()
            .filter(|(k, _)| k != OWNERSHIP_TAG)
            .collect();
        tags.push((OWNERSHIP_TAG.to_string(), "true".to_string()));

        StackRequest {
            stack_name: kind.stack_name(),
            template,
            parameters: kind.parameters(),
            capabilities: kind.capabilities(),
            tags,
            role_arn: kind.role_arn(),
        }
    }
}

fn ensure_owned(stack: &Stack) -> EngineResult<()> {
    if stack.is_owned() {
        Ok(())
    } else {
        Err(EngineError::precondition(format!(
            "{} is not managed by AppPack (missing {}=true tag)",
            stack.stack_name, OWNERSHIP_TAG
        )))
    }
}
