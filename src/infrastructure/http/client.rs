use crate::core::communication::{CommandReply, DeviceService};
use crate::domain::{
    config::{DeviceClass, LinkConfig},
    error::LinkTermResult,
};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Request/response client for the host process REST API
#[derive(Clone)]
pub struct HostApiClient {
    client: Client,
    base_url: String,
}

impl HostApiClient {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> LinkTermResult<Self> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn from_config(config: &LinkConfig) -> LinkTermResult<Self> {
        Self::new(config.api_url.clone(), config.request_timeout())
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl DeviceService for HostApiClient {
    async fn scan_endpoints(&self, class: DeviceClass) -> LinkTermResult<Vec<String>> {
        let mut groups: HashMap<String, Vec<String>> = self
            .client
            .get(self.url("devices/scan"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!("Host reported port groups: {:?}", groups.keys().collect::<Vec<_>>());
        Ok(groups.remove(class.scan_key()).unwrap_or_default())
    }

    async fn identify(&self, endpoint_id: &str) -> LinkTermResult<String> {
        let reply = self
            .client
            .get(self.url("devices/identify"))
            .query(&[("port", endpoint_id)])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        Ok(reply)
    }

    async fn send_command_once(&self, command: &str) -> LinkTermResult<CommandReply> {
        debug!("One-shot command: {}", command);
        let reply = self
            .client
            .post(self.url("commands/send"))
            .query(&[("command", command), ("use_lora", "true")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(reply)
    }
}
