//! Client for the remote registry that issues durable identities: one for
//! the agent itself, one per discovered process record.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use scout_common::error::AgentError;
use scout_common::types::Agent;

#[async_trait]
pub trait IdentityIssuer: Send + Sync {
    /// Announces the agent and returns it with a backend-issued id.
    async fn register_agent(&self, agent: &Agent) -> Result<Agent, AgentError>;

    /// Requests `count` fresh record ids.
    async fn issue_ids(&self, count: usize) -> Result<Vec<String>, AgentError>;
}

#[derive(Serialize)]
struct IdRequest {
    count: usize,
}

#[derive(Deserialize)]
struct IdResponse {
    ids: Vec<String>,
}

pub struct BackendClient {
    base_url: String,
    client: reqwest::Client,
}

impl BackendClient {
    pub fn new(base_url: String) -> Self {
        BackendClient {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl IdentityIssuer for BackendClient {
    async fn register_agent(&self, agent: &Agent) -> Result<Agent, AgentError> {
        let registered = self
            .client
            .post(self.url("/agents"))
            .json(agent)
            .send()
            .await
            .map_err(|e| AgentError::Connection(e.to_string()))?
            .error_for_status()
            .map_err(|e| AgentError::Connection(e.to_string()))?
            .json::<Agent>()
            .await
            .map_err(|e| AgentError::Connection(e.to_string()))?;

        Ok(registered)
    }

    async fn issue_ids(&self, count: usize) -> Result<Vec<String>, AgentError> {
        let response = self
            .client
            .post(self.url("/record-ids"))
            .json(&IdRequest { count })
            .send()
            .await
            .map_err(|e| AgentError::Connection(e.to_string()))?
            .error_for_status()
            .map_err(|e| AgentError::Connection(e.to_string()))?
            .json::<IdResponse>()
            .await
            .map_err(|e| AgentError::Connection(e.to_string()))?;

        Ok(response.ids)
    }
}
