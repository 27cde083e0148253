//! Filesystem collaborator handing out the per-record instrumentation paths
//! consumed by command injection. The layout is one folder per record id
//! under a configured root, holding the two generated config files.

use std::path::{Path, PathBuf};

use scout_common::error::AgentError;
use scout_common::types::ProcessRecord;

const RUNTIME_CONFIG_FILE: &str = "runtime.properties";
const WEAVING_CONFIG_FILE: &str = "weaving.xml";

const WEAVING_TEMPLATE: &str = "<weaving>\n    <include within=\"*\" />\n</weaving>\n";

pub trait InstrumentationFileManager: Send + Sync {
    fn library_path(&self) -> Result<PathBuf, AgentError>;

    fn runtime_config_path(&self, id: &str) -> Result<PathBuf, AgentError>;

    fn weaving_config_path(&self, id: &str) -> Result<PathBuf, AgentError>;

    /// Materializes the per-record config folder; regenerates the runtime
    /// config so renamed records and agents propagate into it.
    fn prepare_for(&self, record: &ProcessRecord, host_label: &str) -> Result<(), AgentError>;
}

pub struct InstrumentationFileTree {
    root: PathBuf,
    library: PathBuf,
}

impl InstrumentationFileTree {
    pub fn new(root: PathBuf, library: PathBuf) -> Self {
        InstrumentationFileTree { root, library }
    }

    fn record_dir(&self, id: &str) -> Result<PathBuf, AgentError> {
        if id.is_empty() {
            return Err(AgentError::MonitoringSettings(
                "record has no id yet".into(),
            ));
        }
        Ok(self.root.join("records").join(id))
    }

    fn runtime_config_content(record: &ProcessRecord, host_label: &str) -> String {
        let application = if record.name.is_empty() {
            record.pid.to_string()
        } else {
            record.name.clone()
        };
        format!(
            "scout.instrument.applicationName={application}\nscout.instrument.hostname={host_label}\nscout.instrument.writer=tcp\n"
        )
    }
}

impl InstrumentationFileManager for InstrumentationFileTree {
    fn library_path(&self) -> Result<PathBuf, AgentError> {
        if self.library.as_os_str().is_empty() {
            return Err(AgentError::MonitoringSettings(
                "instrumentation library path not configured".into(),
            ));
        }
        Ok(self.library.clone())
    }

    fn runtime_config_path(&self, id: &str) -> Result<PathBuf, AgentError> {
        Ok(self.record_dir(id)?.join(RUNTIME_CONFIG_FILE))
    }

    fn weaving_config_path(&self, id: &str) -> Result<PathBuf, AgentError> {
        Ok(self.record_dir(id)?.join(WEAVING_CONFIG_FILE))
    }

    fn prepare_for(&self, record: &ProcessRecord, host_label: &str) -> Result<(), AgentError> {
        let dir = self.record_dir(&record.id)?;
        std::fs::create_dir_all(&dir)
            .map_err(|e| AgentError::MonitoringSettings(format!("{}: {e}", dir.display())))?;

        let runtime_config = dir.join(RUNTIME_CONFIG_FILE);
        std::fs::write(
            &runtime_config,
            Self::runtime_config_content(record, host_label),
        )
        .map_err(|e| {
            AgentError::MonitoringSettings(format!("{}: {e}", runtime_config.display()))
        })?;

        let weaving_config = dir.join(WEAVING_CONFIG_FILE);
        if !Path::new(&weaving_config).exists() {
            std::fs::write(&weaving_config, WEAVING_TEMPLATE).map_err(|e| {
                AgentError::MonitoringSettings(format!("{}: {e}", weaving_config.display()))
            })?;
        }

        Ok(())
    }
}
