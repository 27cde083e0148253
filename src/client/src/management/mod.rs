pub mod command_line;
pub mod jvm;
pub mod probe;

use std::sync::Arc;

use scout_common::error::AgentError;
use scout_common::types::ProcessRecord;

/// Per OS/runtime-family strategy: discovery, classification, native process
/// control and launch-command rewriting. One implementation per supported
/// host+runtime combination; records carry the descriptor of the type that
/// discovered them so later operations dispatch back to it.
pub trait ManagementType: Send + Sync {
    fn descriptor(&self) -> &str;

    /// Lists the live processes of this family. Never fails: a native
    /// failure is logged and yields an empty snapshot so a refresh proceeds
    /// with whatever the other types returned.
    fn snapshot(&self) -> Vec<ProcessRecord>;

    fn resolve_working_directory(&self, record: &mut ProcessRecord);

    fn resolve_runtime_family(&self, record: &mut ProcessRecord);

    /// Issues a native start for `record.agent_execution_command`.
    fn start(&self, record: &ProcessRecord) -> Result<(), AgentError>;

    /// Issues a native termination by pid.
    fn kill(&self, record: &ProcessRecord) -> Result<(), AgentError>;

    /// Derives `agent_execution_command` by inserting the instrumentation
    /// hook arguments after the launcher token of the effective command.
    fn inject_instrumentation(&self, record: &mut ProcessRecord) -> Result<(), AgentError>;

    /// Inserts only the identification marker into the effective command.
    fn inject_identity(&self, record: &mut ProcessRecord) -> Result<(), AgentError>;

    /// Strips marker and instrumentation arguments, restoring the operator's
    /// original command.
    fn remove_instrumentation(&self, record: &mut ProcessRecord) -> Result<(), AgentError>;

    /// True iff `b`'s OS command carries `a`'s identification marker.
    /// Markers are not portable across families.
    fn compare_identity(&self, a: &ProcessRecord, b: &ProcessRecord) -> Result<bool, AgentError>;
}

/// The ordered subset of management types applicable to this host, selected
/// once at startup.
pub struct ManagementRegistry {
    types: Vec<Arc<dyn ManagementType>>,
}

impl ManagementRegistry {
    pub fn new(types: Vec<Arc<dyn ManagementType>>) -> Self {
        ManagementRegistry { types }
    }

    pub fn all(&self) -> &[Arc<dyn ManagementType>] {
        &self.types
    }

    pub fn by_descriptor(&self, descriptor: &str) -> Result<&Arc<dyn ManagementType>, AgentError> {
        self.types
            .iter()
            .find(|t| t.descriptor() == descriptor)
            .ok_or_else(|| AgentError::NotFound(format!("management type {descriptor}")))
    }

    pub fn for_record(&self, record: &ProcessRecord) -> Result<&Arc<dyn ManagementType>, AgentError> {
        self.by_descriptor(&record.management_type)
    }
}
