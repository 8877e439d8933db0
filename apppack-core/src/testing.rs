//! In-memory implementations of the gateway and prompter seams for tests

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{EngineError, EngineResult};
use crate::params::Parameter;
use crate::provider::{
    BuildService, CacheAdmin, ChangeSetDescription, ChangeSetInput, ChangeSetRef, ChangeSetType,
    DatabaseAdmin, DnsService, EngineVersion, Gateway, HostedZone, LoadBalancerAdmin,
    ParameterStore, ParameterType, ProviderError, ProviderResult, StackRequest, StackService,
    TemplateSource,
};
use crate::questions::{Choice, Prompter, Question};
use crate::stack::{ChangeSetStatus, Stack, StackResource, StackStatus};

/// A side-effecting call observed by the fake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateStack(StackRequest),
    UpdateStack(StackRequest),
    DeleteStack {
        stack_id: String,
        role_arn: Option<String>,
    },
    CreateChangeSet(ChangeSetInput),
    PutParameter {
        name: String,
        kind: ParameterType,
    },
    DeleteParameter(String),
    LoadBalancerProtection {
        arn: String,
        enabled: bool,
    },
    InstanceProtection {
        id: String,
        enabled: bool,
    },
    ClusterProtection {
        id: String,
        enabled: bool,
    },
}

struct FakeStack {
    stack: Stack,
    template: Option<String>,
    /// Status the stack moves to on its next describe
    settle: Option<StackStatus>,
    resources: Vec<StackResource>,
}

struct FakeParameter {
    value: String,
    tags: Vec<(String, String)>,
}

#[derive(Default)]
struct CloudState {
    next_id: u64,
    stacks: Vec<FakeStack>,
    scripts: HashMap<String, VecDeque<StackStatus>>,
    outputs: HashMap<String, Vec<(String, String)>>,
    change_sets: HashMap<String, (ChangeSetStatus, bool)>,
    unchanged: HashSet<String>,
    parameters: BTreeMap<String, FakeParameter>,
    lb_protection: HashMap<String, bool>,
    db_protection: HashMap<String, bool>,
    zones: Vec<HostedZone>,
    source_credentials: Vec<String>,
    pending_credentials: Option<(String, usize)>,
    engine_versions: HashMap<String, Vec<EngineVersion>>,
    instance_classes: HashMap<String, Vec<String>>,
    node_types: Vec<String>,
    calls: Vec<Call>,
}

impl CloudState {
    fn live_mut(&mut self, name: &str) -> Option<&mut FakeStack> {
        self.stacks
            .iter_mut()
            .rev()
            .find(|s| s.stack.stack_name == name && s.stack.status != StackStatus::DeleteComplete)
    }

    fn by_id_mut(&mut self, id: &str) -> Option<&mut FakeStack> {
        self.stacks.iter_mut().find(|s| s.stack.stack_id == id)
    }

    fn outcome(&mut self, name: &str, default: StackStatus) -> StackStatus {
        self.scripts
            .get_mut(name)
            .and_then(VecDeque::pop_front)
            .unwrap_or(default)
    }

    fn id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

fn resources_for(status: &StackStatus, verb: &str) -> Vec<StackResource> {
    if status.is_success() {
        vec![StackResource {
            logical_id: "Resource".to_string(),
            status: format!("{}_COMPLETE", verb),
            reason: None,
        }]
    } else {
        vec![StackResource {
            logical_id: "Resource".to_string(),
            status: format!("{}_FAILED", verb),
            reason: Some("scripted failure".to_string()),
        }]
    }
}

/// In-memory cloud implementing every gateway trait
///
/// Mutations move a stack to an in-progress status; the next describe moves
/// it to the scripted outcome (success unless [`FakeCloud::script`] says
/// otherwise).
pub struct FakeCloud {
    region: String,
    state: Mutex<CloudState>,
}

impl FakeCloud {
    pub fn new(region: &str) -> Self {
        Self {
            region: region.to_string(),
            state: Mutex::new(CloudState::default()),
        }
    }

    pub fn gateway(self: &Arc<Self>) -> Gateway {
        Gateway {
            region: self.region.clone(),
            stacks: self.clone(),
            parameters: self.clone(),
            load_balancers: self.clone(),
            databases: self.clone(),
            caches: self.clone(),
            dns: self.clone(),
            builds: self.clone(),
        }
    }

    fn state(&self) -> MutexGuard<'_, CloudState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Queue the terminal status of the next mutation on `stack_name`
    pub fn script(&self, stack_name: &str, status: StackStatus) {
        self.state()
            .scripts
            .entry(stack_name.to_string())
            .or_default()
            .push_back(status);
    }

    /// Make the next update of `stack_name` find nothing to change
    pub fn reject_next_update_unchanged(&self, stack_name: &str) {
        self.state().unchanged.insert(stack_name.to_string());
    }

    /// Outputs attached to `stack_name` when it is created or seeded
    pub fn set_outputs(&self, stack_name: &str, outputs: Vec<(String, String)>) {
        self.state()
            .outputs
            .insert(stack_name.to_string(), outputs);
    }

    /// Insert a completed stack directly
    pub fn seed_stack(
        &self,
        stack_name: &str,
        parameters: Vec<Parameter>,
        tags: Vec<(String, String)>,
    ) -> Stack {
        let mut state = self.state();
        let n = state.id();
        let stack = Stack {
            stack_id: format!(
                "arn:aws:cloudformation:{}:000000000000:stack/{}/{}",
                self.region, stack_name, n
            ),
            stack_name: stack_name.to_string(),
            status: StackStatus::CreateComplete,
            status_reason: None,
            parameters,
            outputs: state.outputs.get(stack_name).cloned().unwrap_or_default(),
            tags,
            capabilities: vec![],
        };
        state.stacks.push(FakeStack {
            stack: stack.clone(),
            template: None,
            settle: None,
            resources: vec![],
        });
        stack
    }

    /// Seed a stack carrying the ownership tag
    pub fn seed_owned_stack(&self, stack_name: &str, parameters: Vec<Parameter>) -> Stack {
        self.seed_stack(
            stack_name,
            parameters,
            vec![("apppack".to_string(), "true".to_string())],
        )
    }

    /// Force the status of a live stack without a mutation
    pub fn set_status(&self, stack_name: &str, status: StackStatus) {
        if let Some(stack) = self.state().live_mut(stack_name) {
            stack.stack.status = status;
            stack.settle = None;
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.state().calls.iter().filter(|c| predicate(c)).count()
    }

    pub fn create_requests(&self) -> Vec<StackRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::CreateStack(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    /// Current live stack by name
    pub fn stack(&self, stack_name: &str) -> Option<Stack> {
        self.state().live_mut(stack_name).map(|s| s.stack.clone())
    }

    /// Template URL last used for a live stack
    pub fn template_of(&self, stack_name: &str) -> Option<String> {
        self.state()
            .live_mut(stack_name)
            .and_then(|s| s.template.clone())
    }

    pub fn parameter(&self, name: &str) -> Option<String> {
        self.state().parameters.get(name).map(|p| p.value.clone())
    }

    pub fn put_parameter(&self, name: &str, value: &str, tags: Vec<(String, String)>) {
        self.state().parameters.insert(
            name.to_string(),
            FakeParameter {
                value: value.to_string(),
                tags,
            },
        );
    }

    pub fn load_balancer_protection(&self, arn: &str) -> Option<bool> {
        self.state().lb_protection.get(arn).copied()
    }

    pub fn database_protection(&self, id: &str) -> Option<bool> {
        self.state().db_protection.get(id).copied()
    }

    pub fn add_hosted_zone(&self, zone: HostedZone) {
        self.state().zones.push(zone);
    }

    pub fn set_source_credentials(&self, servers: &[&str]) {
        self.state().source_credentials = servers.iter().map(|s| s.to_string()).collect();
    }

    /// Make `server` appear after `checks` credential lookups
    pub fn connect_source_credentials_after(&self, server: &str, checks: usize) {
        self.state().pending_credentials = Some((server.to_string(), checks));
    }

    pub fn set_engine_versions(&self, engine: &str, versions: Vec<EngineVersion>) {
        self.state()
            .engine_versions
            .insert(engine.to_string(), versions);
    }

    pub fn set_instance_classes(&self, engine: &str, classes: &[&str]) {
        self.state().instance_classes.insert(
            engine.to_string(),
            classes.iter().map(|s| s.to_string()).collect(),
        );
    }

    pub fn set_node_types(&self, node_types: &[&str]) {
        self.state().node_types = node_types.iter().map(|s| s.to_string()).collect();
    }
}

#[async_trait]
impl StackService for FakeCloud {
    async fn create_stack(&self, request: &StackRequest) -> ProviderResult<String> {
        let mut state = self.state();
        state.calls.push(Call::CreateStack(request.clone()));
        if state.live_mut(&request.stack_name).is_some() {
            return Err(ProviderError::already_exists(format!(
                "Stack [{}] already exists",
                request.stack_name
            )));
        }
        let n = state.id();
        let outcome = state.outcome(&request.stack_name, StackStatus::CreateComplete);
        let stack_id = format!(
            "arn:aws:cloudformation:{}:000000000000:stack/{}/{}",
            self.region, request.stack_name, n
        );
        let template = match &request.template {
            TemplateSource::Url(url) => Some(url.clone()),
            TemplateSource::Previous => None,
        };
        let outputs = state
            .outputs
            .get(&request.stack_name)
            .cloned()
            .unwrap_or_default();
        state.stacks.push(FakeStack {
            stack: Stack {
                stack_id: stack_id.clone(),
                stack_name: request.stack_name.clone(),
                status: StackStatus::CreateInProgress,
                status_reason: None,
                parameters: request.parameters.clone(),
                outputs,
                tags: request.tags.clone(),
                capabilities: request.capabilities.clone(),
            },
            template,
            resources: resources_for(&outcome, "CREATE"),
            settle: Some(outcome),
        });
        Ok(stack_id)
    }

    async fn update_stack(&self, request: &StackRequest) -> ProviderResult<String> {
        let mut state = self.state();
        state.calls.push(Call::UpdateStack(request.clone()));
        if state.unchanged.remove(&request.stack_name) {
            return Err(ProviderError::no_change("No updates are to be performed."));
        }
        let outcome = state.outcome(&request.stack_name, StackStatus::UpdateComplete);
        let stack = state.live_mut(&request.stack_name).ok_or_else(|| {
            ProviderError::not_found(format!("Stack [{}] does not exist", request.stack_name))
        })?;
        if stack.settle.is_some() {
            return Err(ProviderError::in_progress(format!(
                "Stack [{}] is in {} state and can not be updated",
                request.stack_name, stack.stack.status
            )));
        }
        if let TemplateSource::Url(url) = &request.template {
            stack.template = Some(url.clone());
        }
        stack.stack.parameters = request.parameters.clone();
        stack.stack.tags = request.tags.clone();
        stack.stack.status = StackStatus::UpdateInProgress;
        stack.resources = resources_for(&outcome, "UPDATE");
        stack.settle = Some(outcome);
        Ok(stack.stack.stack_id.clone())
    }

    async fn delete_stack(&self, stack_id: &str, role_arn: Option<&str>) -> ProviderResult<()> {
        let mut state = self.state();
        state.calls.push(Call::DeleteStack {
            stack_id: stack_id.to_string(),
            role_arn: role_arn.map(str::to_string),
        });
        let name = state
            .by_id_mut(stack_id)
            .map(|s| s.stack.stack_name.clone())
            .ok_or_else(|| ProviderError::not_found(format!("Stack [{}] does not exist", stack_id)))?;
        let outcome = state.outcome(&name, StackStatus::DeleteComplete);
        if let Some(stack) = state.by_id_mut(stack_id) {
            stack.stack.status = StackStatus::DeleteInProgress;
            stack.resources = resources_for(&outcome, "DELETE");
            stack.settle = Some(outcome);
        }
        Ok(())
    }

    async fn describe_stack(&self, name_or_id: &str) -> ProviderResult<Option<Stack>> {
        let mut state = self.state();
        let found = if name_or_id.starts_with("arn:") {
            state.by_id_mut(name_or_id)
        } else {
            state.live_mut(name_or_id)
        };
        Ok(found.map(|s| {
            let seen = s.stack.clone();
            if let Some(status) = s.settle.take() {
                s.stack.status = status;
            }
            seen
        }))
    }

    async fn describe_stacks(&self) -> ProviderResult<Vec<Stack>> {
        Ok(self
            .state()
            .stacks
            .iter()
            .filter(|s| s.stack.status != StackStatus::DeleteComplete)
            .map(|s| s.stack.clone())
            .collect())
    }

    async fn describe_stack_resources(&self, stack_id: &str) -> ProviderResult<Vec<StackResource>> {
        let mut state = self.state();
        Ok(state
            .by_id_mut(stack_id)
            .map(|s| s.resources.clone())
            .unwrap_or_default())
    }

    async fn create_change_set(&self, input: &ChangeSetInput) -> ProviderResult<ChangeSetRef> {
        let mut state = self.state();
        state.calls.push(Call::CreateChangeSet(input.clone()));
        let n = state.id();
        let stack_name = input.request.stack_name.clone();
        let stack_id = match input.change_set_type {
            ChangeSetType::Update => state
                .live_mut(&stack_name)
                .map(|s| s.stack.stack_id.clone())
                .ok_or_else(|| {
                    ProviderError::not_found(format!("Stack [{}] does not exist", stack_name))
                })?,
            ChangeSetType::Create => match state.live_mut(&stack_name) {
                Some(s) if s.stack.status == StackStatus::ReviewInProgress => {
                    s.stack.stack_id.clone()
                }
                Some(_) => {
                    return Err(ProviderError::already_exists(format!(
                        "Stack [{}] already exists",
                        stack_name
                    )));
                }
                None => {
                    // an empty stack stays in review until the changeset is executed
                    let stack_id = format!(
                        "arn:aws:cloudformation:{}:000000000000:stack/{}/{}",
                        self.region, stack_name, n
                    );
                    state.stacks.push(FakeStack {
                        stack: Stack {
                            stack_id: stack_id.clone(),
                            stack_name: stack_name.clone(),
                            status: StackStatus::ReviewInProgress,
                            status_reason: None,
                            parameters: vec![],
                            outputs: vec![],
                            tags: input.request.tags.clone(),
                            capabilities: vec![],
                        },
                        template: None,
                        resources: vec![],
                        settle: None,
                    });
                    stack_id
                }
            },
        };
        let id = format!(
            "arn:aws:cloudformation:{}:000000000000:changeSet/{}/{}",
            self.region, input.name, n
        );
        state
            .change_sets
            .insert(id.clone(), (ChangeSetStatus::CreateInProgress, false));
        Ok(ChangeSetRef { id, stack_id })
    }

    async fn describe_change_set(
        &self,
        change_set_id: &str,
    ) -> ProviderResult<ChangeSetDescription> {
        let mut state = self.state();
        let entry = state.change_sets.get_mut(change_set_id).ok_or_else(|| {
            ProviderError::not_found(format!("ChangeSet [{}] does not exist", change_set_id))
        })?;
        let status = entry.0.clone();
        if !entry.1 {
            *entry = (ChangeSetStatus::CreateComplete, true);
        }
        Ok(ChangeSetDescription {
            status,
            reason: None,
        })
    }
}

#[async_trait]
impl ParameterStore for FakeCloud {
    async fn get(&self, name: &str) -> ProviderResult<Option<String>> {
        Ok(self.parameter(name))
    }

    async fn by_path(&self, path: &str) -> ProviderResult<Vec<(String, String)>> {
        let prefix = format!("{}/", path.trim_end_matches('/'));
        Ok(self
            .state()
            .parameters
            .iter()
            .filter(|(name, _)| name.starts_with(&prefix))
            .map(|(name, p)| (name.clone(), p.value.clone()))
            .collect())
    }

    async fn put(
        &self,
        name: &str,
        value: &str,
        kind: ParameterType,
        overwrite: bool,
    ) -> ProviderResult<()> {
        let mut state = self.state();
        state.calls.push(Call::PutParameter {
            name: name.to_string(),
            kind,
        });
        if !overwrite && state.parameters.contains_key(name) {
            return Err(ProviderError::already_exists(format!(
                "parameter {} already exists",
                name
            )));
        }
        state.parameters.insert(
            name.to_string(),
            FakeParameter {
                value: value.to_string(),
                tags: vec![],
            },
        );
        Ok(())
    }

    async fn delete(&self, name: &str) -> ProviderResult<bool> {
        let mut state = self.state();
        state.calls.push(Call::DeleteParameter(name.to_string()));
        Ok(state.parameters.remove(name).is_some())
    }

    async fn list_tags(&self, name: &str) -> ProviderResult<Vec<(String, String)>> {
        self.state()
            .parameters
            .get(name)
            .map(|p| p.tags.clone())
            .ok_or_else(|| ProviderError::not_found(format!("parameter {} not found", name)))
    }
}

#[async_trait]
impl LoadBalancerAdmin for FakeCloud {
    async fn set_deletion_protection(&self, arn: &str, enabled: bool) -> ProviderResult<()> {
        let mut state = self.state();
        state.calls.push(Call::LoadBalancerProtection {
            arn: arn.to_string(),
            enabled,
        });
        state.lb_protection.insert(arn.to_string(), enabled);
        Ok(())
    }
}

#[async_trait]
impl DatabaseAdmin for FakeCloud {
    async fn orderable_instance_classes(
        &self,
        engine: &str,
        _version: &str,
    ) -> ProviderResult<Vec<String>> {
        Ok(self
            .state()
            .instance_classes
            .get(engine)
            .cloned()
            .unwrap_or_default())
    }

    async fn engine_versions(&self, engine: &str) -> ProviderResult<Vec<EngineVersion>> {
        Ok(self
            .state()
            .engine_versions
            .get(engine)
            .cloned()
            .unwrap_or_default())
    }

    async fn set_instance_deletion_protection(
        &self,
        id: &str,
        enabled: bool,
    ) -> ProviderResult<()> {
        let mut state = self.state();
        state.calls.push(Call::InstanceProtection {
            id: id.to_string(),
            enabled,
        });
        state.db_protection.insert(id.to_string(), enabled);
        Ok(())
    }

    async fn set_cluster_deletion_protection(&self, id: &str, enabled: bool) -> ProviderResult<()> {
        let mut state = self.state();
        state.calls.push(Call::ClusterProtection {
            id: id.to_string(),
            enabled,
        });
        state.db_protection.insert(id.to_string(), enabled);
        Ok(())
    }
}

#[async_trait]
impl CacheAdmin for FakeCloud {
    async fn node_types(&self) -> ProviderResult<Vec<String>> {
        Ok(self.state().node_types.clone())
    }
}

#[async_trait]
impl DnsService for FakeCloud {
    async fn hosted_zones_by_name(&self, dns_name: &str) -> ProviderResult<Vec<HostedZone>> {
        let mut zones: Vec<HostedZone> = self
            .state()
            .zones
            .iter()
            .filter(|z| z.name.as_str() >= dns_name)
            .cloned()
            .collect();
        zones.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(zones)
    }

    async fn get_hosted_zone(&self, id: &str) -> ProviderResult<HostedZone> {
        self.state()
            .zones
            .iter()
            .find(|z| z.id == id)
            .cloned()
            .ok_or_else(|| ProviderError::not_found(format!("hosted zone {} not found", id)))
    }
}

#[async_trait]
impl BuildService for FakeCloud {
    async fn source_credential_servers(&self) -> ProviderResult<Vec<String>> {
        let mut state = self.state();
        if let Some((server, remaining)) = state.pending_credentials.take() {
            if remaining == 0 {
                state.source_credentials.push(server);
            } else {
                state.pending_credentials = Some((server, remaining - 1));
            }
        }
        Ok(state.source_credentials.clone())
    }
}

#[derive(Debug, Clone)]
enum Answer {
    Text(String),
    Bool(bool),
    List(Vec<String>),
}

/// Prompter that replays queued answers in order
#[derive(Default)]
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<Answer>>,
    choices: Mutex<Vec<Vec<String>>>,
    messages: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(self, text: &str) -> Self {
        self.push(Answer::Text(text.to_string()))
    }

    pub fn answer_bool(self, value: bool) -> Self {
        self.push(Answer::Bool(value))
    }

    pub fn answer_list(self, items: &[&str]) -> Self {
        self.push(Answer::List(items.iter().map(|s| s.to_string()).collect()))
    }

    fn push(self, answer: Answer) -> Self {
        lock(&self.answers).push_back(answer);
        self
    }

    /// Labels offered by each select prompt, in order
    pub fn seen_choices(&self) -> Vec<Vec<String>> {
        lock(&self.choices).clone()
    }

    /// Messages shown by `input` and `pause`
    pub fn messages(&self) -> Vec<String> {
        lock(&self.messages).clone()
    }

    fn next(&self, question: &str) -> EngineResult<Answer> {
        lock(&self.answers)
            .pop_front()
            .ok_or_else(|| EngineError::user_input(format!("no scripted answer for '{}'", question)))
    }

    fn next_text(&self, question: &str) -> EngineResult<String> {
        match self.next(question)? {
            Answer::Text(s) => Ok(s),
            other => Err(EngineError::user_input(format!(
                "scripted {:?} does not answer '{}'",
                other, question
            ))),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl Prompter for ScriptedPrompter {
    fn text(&self, question: &Question, _default: &str) -> EngineResult<String> {
        self.next_text(&question.verbose)
    }

    fn yes_no(&self, question: &Question, _default: bool) -> EngineResult<bool> {
        match self.next(&question.verbose)? {
            Answer::Bool(b) => Ok(b),
            other => Err(EngineError::user_input(format!(
                "scripted {:?} does not answer '{}'",
                other, question.verbose
            ))),
        }
    }

    fn select(
        &self,
        question: &Question,
        choices: &[Choice],
        _default: Option<&str>,
    ) -> EngineResult<String> {
        lock(&self.choices).push(choices.iter().map(|c| c.label.clone()).collect());
        self.next_text(&question.verbose)
    }

    fn list(&self, question: &Question, _default: &[String]) -> EngineResult<Vec<String>> {
        match self.next(&question.verbose)? {
            Answer::List(items) => Ok(items),
            other => Err(EngineError::user_input(format!(
                "scripted {:?} does not answer '{}'",
                other, question.verbose
            ))),
        }
    }

    fn input(&self, message: &str) -> EngineResult<String> {
        lock(&self.messages).push(message.to_string());
        self.next_text(message)
    }

    fn pause(&self, message: &str) -> EngineResult<()> {
        lock(&self.messages).push(message.to_string());
        Ok(())
    }
}
