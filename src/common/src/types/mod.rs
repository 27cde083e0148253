pub mod agent;
pub mod process_record;

pub use agent::{Agent, AgentPatch};
pub use process_record::{ProcessPatch, ProcessRecord, RuntimeFamily};
