use serde::{Deserialize, Serialize};

/// Host-level context under which discovered records are reported to the
/// backend. Created once at registration, updated in place afterwards.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    pub ip: String,
    pub port: String,
    pub name: String,
    pub hidden: bool,
}

impl Agent {
    pub fn local(ip: String, port: String, name: String, hidden: bool) -> Self {
        Agent {
            id: "placeholder".into(),
            ip,
            port,
            name,
            hidden,
        }
    }

    /// Identity string used when substituting the host into generated
    /// instrumentation configs.
    pub fn host_label(&self) -> String {
        if self.name.is_empty() {
            format!("{}:{}", self.ip, self.port)
        } else {
            self.name.clone()
        }
    }

    pub fn apply_patch(&mut self, patch: &AgentPatch) {
        if let Some(name) = &patch.name {
            self.name.clone_from(name);
        }
        if let Some(hidden) = patch.hidden {
            self.hidden = hidden;
        }
    }
}

/// Client-writable subset of the agent.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct AgentPatch {
    pub name: Option<String>,
    pub hidden: Option<bool>,
}
