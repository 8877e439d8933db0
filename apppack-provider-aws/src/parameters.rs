//! SSM Parameter Store

use apppack_core::provider::{ParameterStore, ParameterType};
use apppack_core::ProviderResult;
use async_trait::async_trait;
use aws_sdk_ssm::Client;
use aws_sdk_ssm::types::{ParameterType as SsmParameterType, ResourceTypeForTagging};
use log::debug;

use crate::error::{sdk_error, text};

pub struct Ssm {
    client: Client,
}

impl Ssm {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ParameterStore for Ssm {
    async fn get(&self, name: &str) -> ProviderResult<Option<String>> {
        let result = self
            .client
            .get_parameter()
            .name(name)
            .with_decryption(true)
            .send()
            .await;
        match result {
            Ok(output) => Ok(output
                .parameter()
                .and_then(|p| p.value())
                .map(str::to_string)),
            Err(e) => {
                let err = sdk_error("GetParameter", e);
                if err.is_not_found() {
                    Ok(None)
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn by_path(&self, path: &str) -> ProviderResult<Vec<(String, String)>> {
        let mut found = Vec::new();
        let mut pages = self
            .client
            .get_parameters_by_path()
            .path(path)
            .recursive(true)
            .with_decryption(true)
            .into_paginator()
            .send();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| sdk_error("GetParametersByPath", e))?;
            for parameter in page.parameters() {
                if let Some(name) = parameter.name() {
                    found.push((name.to_string(), text(parameter.value())));
                }
            }
        }
        debug!("{} parameters under {}", found.len(), path);
        Ok(found)
    }

    async fn put(
        &self,
        name: &str,
        value: &str,
        kind: ParameterType,
        overwrite: bool,
    ) -> ProviderResult<()> {
        debug!("PutParameter {}", name);
        let kind = match kind {
            ParameterType::String => SsmParameterType::String,
            ParameterType::SecureString => SsmParameterType::SecureString,
        };
        self.client
            .put_parameter()
            .name(name)
            .value(value)
            .r#type(kind)
            .overwrite(overwrite)
            .send()
            .await
            .map_err(|e| sdk_error("PutParameter", e))?;
        Ok(())
    }

    async fn delete(&self, name: &str) -> ProviderResult<bool> {
        debug!("DeleteParameter {}", name);
        match self.client.delete_parameter().name(name).send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                let err = sdk_error("DeleteParameter", e);
                if err.is_not_found() {
                    Ok(false)
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn list_tags(&self, name: &str) -> ProviderResult<Vec<(String, String)>> {
        let output = self
            .client
            .list_tags_for_resource()
            .resource_type(ResourceTypeForTagging::Parameter)
            .resource_id(name)
            .send()
            .await
            .map_err(|e| sdk_error("ListTagsForResource", e))?;
        let tags = output
            .tag_list()
            .iter()
            .map(|t| (text(t.key()), text(t.value())))
            .collect();
        Ok(tags)
    }
}
