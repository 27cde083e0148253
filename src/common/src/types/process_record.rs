use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const PLACEHOLDER_PREFIX: &str = "local-";

/// Runtime family of a managed process, as resolved by its management type.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum RuntimeFamily {
    Jvm,
}

impl std::fmt::Display for RuntimeFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeFamily::Jvm => write!(f, "jvm"),
        }
    }
}

/// Canonical entity for one logical monitored process across its lifetime.
///
/// The `id` is the durable identity: a local placeholder until the backend
/// issues a real one, stable forever after. The `pid` is whatever the OS
/// currently says and is never trusted as identity across time.
///
/// Structural equality (all fields) is what snapshot deduplication relies on,
/// so discovery must not stamp per-entry values before the dedup step;
/// `last_discovery_time` stays `None` until a record enters the registry.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRecord {
    pub id: String,
    pub pid: u32,

    /// Raw command as reported by the OS for the current pid.
    pub os_execution_command: String,
    /// Command the operator intends to launch; restart-matching key.
    /// Empty means "not set" - the OS command is the effective one.
    pub user_execution_command: String,
    /// Command actually issued by this agent, instrumentation included.
    pub agent_execution_command: String,
    /// Normalized command suggested by a discovery strategy, pending
    /// operator confirmation.
    pub proposed_execution_command: String,

    pub working_directory: String,
    pub name: String,
    pub runtime_family: Option<RuntimeFamily>,
    /// Descriptor of the management type that discovered this record and is
    /// responsible for starting, killing and rewriting it.
    pub management_type: String,

    pub stopped: bool,
    pub monitored: bool,
    pub restart: bool,
    pub error_occurred: bool,
    pub error_message: Option<String>,

    pub last_discovery_time: Option<DateTime<Utc>>,
}

impl ProcessRecord {
    /// A freshly discovered, unclassified record as a management type reports
    /// it from one snapshot. No id yet; ids are handed out after dedup.
    pub fn discovered(pid: u32, os_execution_command: String, management_type: String) -> Self {
        ProcessRecord {
            id: String::new(),
            pid,
            os_execution_command,
            user_execution_command: String::new(),
            agent_execution_command: String::new(),
            proposed_execution_command: String::new(),
            working_directory: String::new(),
            name: String::new(),
            runtime_family: None,
            management_type,
            stopped: false,
            monitored: false,
            restart: false,
            error_occurred: false,
            error_message: None,
            last_discovery_time: None,
        }
    }

    pub fn placeholder_id() -> String {
        format!("{}{}", PLACEHOLDER_PREFIX, Uuid::new_v4())
    }

    pub fn has_placeholder_id(&self) -> bool {
        self.id.starts_with(PLACEHOLDER_PREFIX)
    }

    /// The command injection and restart operations act on: the operator's
    /// command when one is set, the observed OS command otherwise.
    pub fn effective_command(&self) -> &str {
        if self.user_execution_command.is_empty() {
            &self.os_execution_command
        } else {
            &self.user_execution_command
        }
    }

    /// Copies the client-writable fields onto this record. Everything else in
    /// an inbound update is ignored by construction.
    pub fn apply_patch(&mut self, patch: &ProcessPatch) {
        if let Some(name) = &patch.name {
            self.name.clone_from(name);
        }
        if let Some(stopped) = patch.stopped {
            self.stopped = stopped;
        }
        if let Some(restart) = patch.restart {
            self.restart = restart;
        }
        if let Some(monitored) = patch.monitored {
            self.monitored = monitored;
        }
    }

    pub fn clear_error(&mut self) {
        self.error_occurred = false;
        self.error_message = None;
    }

    pub fn flag_error(&mut self, message: impl Into<String>) {
        self.error_occurred = true;
        self.error_message = Some(message.into());
    }
}

/// Client-writable subset of a process record. Unknown inbound fields are
/// dropped during deserialization rather than rejected.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProcessPatch {
    #[serde(default)]
    pub id: String,
    pub name: Option<String>,
    pub stopped: Option<bool>,
    pub restart: Option<bool>,
    pub monitored: Option<bool>,
}
