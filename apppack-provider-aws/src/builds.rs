//! CodeBuild source credentials

use apppack_core::ProviderResult;
use apppack_core::provider::BuildService;
use async_trait::async_trait;
use aws_sdk_codebuild::Client;
use log::debug;

use crate::error::sdk_error;

pub struct CodeBuild {
    client: Client,
}

impl CodeBuild {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BuildService for CodeBuild {
    async fn source_credential_servers(&self) -> ProviderResult<Vec<String>> {
        let output = self
            .client
            .list_source_credentials()
            .send()
            .await
            .map_err(|e| sdk_error("ListSourceCredentials", e))?;
        let servers: Vec<String> = output
            .source_credentials_infos()
            .iter()
            .filter_map(|info| info.server_type())
            .map(|server| server.as_str().to_string())
            .collect();
        debug!("source credentials for {:?}", servers);
        Ok(servers)
    }
}
