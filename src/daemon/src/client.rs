use anyhow::Result;

use scout_common::types::{Agent, AgentPatch, ProcessPatch, ProcessRecord};

use crate::structs::InfoResponse;

/// HTTP client for the daemon surface, used by the CLI.
pub struct DaemonClient {
    base_uri: String,
    pub client: reqwest::Client,
}

impl DaemonClient {
    pub fn new(base_url: String) -> Self {
        Self {
            base_uri: base_url,
            client: reqwest::Client::new(),
        }
    }

    pub fn get_url(&self, path: &str) -> String {
        format!("{}{}", self.base_uri, path)
    }

    pub async fn list_processes(&self) -> Result<Vec<ProcessRecord>> {
        let records = self
            .client
            .get(self.get_url("/processes"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(records)
    }

    pub async fn get_process(&self, id: &str) -> Result<ProcessRecord> {
        let record = self
            .client
            .get(self.get_url(&format!("/processes/{id}")))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(record)
    }

    pub async fn patch_process(&self, id: &str, patch: ProcessPatch) -> Result<ProcessRecord> {
        let record = self
            .client
            .patch(self.get_url(&format!("/processes/{id}")))
            .json(&patch)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(record)
    }

    pub async fn get_agent(&self) -> Result<Agent> {
        let agent = self
            .client
            .get(self.get_url("/agent"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(agent)
    }

    pub async fn patch_agent(&self, patch: AgentPatch) -> Result<Agent> {
        let agent = self
            .client
            .patch(self.get_url("/agent"))
            .json(&patch)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(agent)
    }

    pub async fn send_info_request(&self) -> Result<InfoResponse> {
        let info = self
            .client
            .get(self.get_url("/info"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(info)
    }

    pub async fn send_refresh_request(&self) -> Result<()> {
        self.client
            .post(self.get_url("/refresh"))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    pub async fn send_terminate_request(&self) -> Result<()> {
        self.client
            .post(self.get_url("/terminate"))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
