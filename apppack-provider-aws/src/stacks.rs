//! CloudFormation - Stack service over the AWS SDK

use apppack_core::provider::{
    ChangeSetDescription, ChangeSetInput, ChangeSetRef, ChangeSetType, StackRequest, StackService,
};
use apppack_core::stack::{ChangeSetStatus, StackResource};
use apppack_core::{
    Capability, Parameter, ProviderError, ProviderResult, Stack, StackStatus, TemplateSource,
};
use async_trait::async_trait;
use aws_sdk_cloudformation::Client;
use aws_sdk_cloudformation::types;
use log::debug;

use crate::error::{member, sdk_error, text};

pub struct CloudFormation {
    client: Client,
}

impl CloudFormation {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn sdk_parameters(params: &[Parameter]) -> Vec<types::Parameter> {
    params
        .iter()
        .map(|p| {
            types::Parameter::builder()
                .parameter_key(&p.key)
                .parameter_value(&p.value)
                .build()
        })
        .collect()
}

fn sdk_capabilities(capabilities: &[Capability]) -> Vec<types::Capability> {
    capabilities
        .iter()
        .map(|c| types::Capability::from(c.as_str()))
        .collect()
}

fn sdk_tags(tags: &[(String, String)]) -> ProviderResult<Vec<types::Tag>> {
    tags.iter()
        .map(|(key, value)| {
            Ok(types::Tag::builder().key(key).value(value).build())
        })
        .collect()
}

fn template_url(request: &StackRequest) -> ProviderResult<&str> {
    match &request.template {
        TemplateSource::Url(url) => Ok(url),
        TemplateSource::Previous => Err(ProviderError::new(format!(
            "{} has no template to reuse",
            request.stack_name
        ))),
    }
}

fn to_stack(stack: &types::Stack) -> Stack {
    Stack {
        stack_id: text(stack.stack_id()),
        stack_name: text(stack.stack_name()),
        status: StackStatus::from(member(stack.stack_status()).map_or("", |s| s.as_str())),
        status_reason: stack.stack_status_reason().map(str::to_string),
        parameters: stack
            .parameters()
            .iter()
            .filter_map(|p| {
                Some(Parameter::new(
                    p.parameter_key()?,
                    p.parameter_value().unwrap_or_default(),
                ))
            })
            .collect(),
        outputs: stack
            .outputs()
            .iter()
            .filter_map(|o| {
                Some((
                    o.output_key()?.to_string(),
                    o.output_value().unwrap_or_default().to_string(),
                ))
            })
            .collect(),
        tags: stack
            .tags()
            .iter()
            .map(|t| (text(t.key()), text(t.value())))
            .collect(),
        capabilities: stack
            .capabilities()
            .iter()
            .filter_map(|c| Capability::parse(c.as_str()))
            .collect(),
    }
}

#[async_trait]
impl StackService for CloudFormation {
    async fn create_stack(&self, request: &StackRequest) -> ProviderResult<String> {
        debug!("CreateStack {}", request.stack_name);
        let output = self
            .client
            .create_stack()
            .stack_name(&request.stack_name)
            .template_url(template_url(request)?)
            .set_parameters(Some(sdk_parameters(&request.parameters)))
            .set_capabilities(Some(sdk_capabilities(&request.capabilities)))
            .set_tags(Some(sdk_tags(&request.tags)?))
            .set_role_arn(request.role_arn.clone())
            .send()
            .await
            .map_err(|e| sdk_error("CreateStack", e))?;
        output
            .stack_id()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::new("CreateStack returned no stack id"))
    }

    async fn update_stack(&self, request: &StackRequest) -> ProviderResult<String> {
        debug!("UpdateStack {}", request.stack_name);
        let mut call = self
            .client
            .update_stack()
            .stack_name(&request.stack_name)
            .set_parameters(Some(sdk_parameters(&request.parameters)))
            .set_capabilities(Some(sdk_capabilities(&request.capabilities)))
            .set_tags(Some(sdk_tags(&request.tags)?))
            .set_role_arn(request.role_arn.clone());
        call = match &request.template {
            TemplateSource::Url(url) => call.template_url(url),
            TemplateSource::Previous => call.use_previous_template(true),
        };
        let output = call.send().await.map_err(|e| sdk_error("UpdateStack", e))?;
        output
            .stack_id()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::new("UpdateStack returned no stack id"))
    }

    async fn delete_stack(&self, stack_id: &str, role_arn: Option<&str>) -> ProviderResult<()> {
        debug!("DeleteStack {}", stack_id);
        self.client
            .delete_stack()
            .stack_name(stack_id)
            .set_role_arn(role_arn.map(str::to_string))
            .send()
            .await
            .map_err(|e| sdk_error("DeleteStack", e))?;
        Ok(())
    }

    async fn describe_stack(&self, name_or_id: &str) -> ProviderResult<Option<Stack>> {
        let result = self
            .client
            .describe_stacks()
            .stack_name(name_or_id)
            .send()
            .await;
        match result {
            Ok(output) => Ok(output.stacks().first().map(to_stack)),
            Err(e) => {
                let err = sdk_error("DescribeStacks", e);
                if err.is_not_found() {
                    Ok(None)
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn describe_stacks(&self) -> ProviderResult<Vec<Stack>> {
        let mut stacks = Vec::new();
        let mut pages = self.client.describe_stacks().into_paginator().send();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| sdk_error("DescribeStacks", e))?;
            stacks.extend(page.stacks().iter().map(to_stack));
        }
        debug!("DescribeStacks returned {} stacks", stacks.len());
        Ok(stacks)
    }

    async fn describe_stack_resources(&self, stack_id: &str) -> ProviderResult<Vec<StackResource>> {
        let output = self
            .client
            .describe_stack_resources()
            .stack_name(stack_id)
            .send()
            .await
            .map_err(|e| sdk_error("DescribeStackResources", e))?;
        Ok(output
            .stack_resources()
            .iter()
            .map(|r| StackResource {
                logical_id: text(r.logical_resource_id()),
                status: member(r.resource_status())
                    .map(|s| s.as_str().to_string())
                    .unwrap_or_default(),
                reason: r.resource_status_reason().map(str::to_string),
            })
            .collect())
    }

    async fn create_change_set(&self, input: &ChangeSetInput) -> ProviderResult<ChangeSetRef> {
        let request = &input.request;
        debug!("CreateChangeSet {} on {}", input.name, request.stack_name);
        let change_set_type = match input.change_set_type {
            ChangeSetType::Create => types::ChangeSetType::Create,
            ChangeSetType::Update => types::ChangeSetType::Update,
        };
        let mut call = self
            .client
            .create_change_set()
            .change_set_name(&input.name)
            .change_set_type(change_set_type)
            .stack_name(&request.stack_name)
            .set_parameters(Some(sdk_parameters(&request.parameters)))
            .set_capabilities(Some(sdk_capabilities(&request.capabilities)))
            .set_tags(Some(sdk_tags(&request.tags)?))
            .set_role_arn(request.role_arn.clone());
        call = match &request.template {
            TemplateSource::Url(url) => call.template_url(url),
            TemplateSource::Previous => call.use_previous_template(true),
        };
        let output = call
            .send()
            .await
            .map_err(|e| sdk_error("CreateChangeSet", e))?;

        match (output.id(), output.stack_id()) {
            (Some(id), Some(stack_id)) => Ok(ChangeSetRef {
                id: id.to_string(),
                stack_id: stack_id.to_string(),
            }),
            _ => Err(ProviderError::new(format!(
                "CreateChangeSet {} returned no identifiers",
                input.name
            ))),
        }
    }

    async fn describe_change_set(
        &self,
        change_set_id: &str,
    ) -> ProviderResult<ChangeSetDescription> {
        let output = self
            .client
            .describe_change_set()
            .change_set_name(change_set_id)
            .send()
            .await
            .map_err(|e| sdk_error("DescribeChangeSet", e))?;
        Ok(ChangeSetDescription {
            status: ChangeSetStatus::from(member(output.status()).map_or("", |s| s.as_str())),
            reason: output.status_reason().map(str::to_string),
        })
    }
}
