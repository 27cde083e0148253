use std::path::Path;
use std::sync::Arc;

use tracing::{error, info};

use scout_common::error::AgentError;
use scout_common::types::{ProcessRecord, RuntimeFamily};

use crate::management::command_line::{
    identity_marker, inject_after_prefix, instrumentation_arguments, invocation_prefix,
    strip_identity_marker, strip_instrumentation,
};
use crate::management::probe::HostProcessProbe;
use crate::management::ManagementType;
use crate::monitor_files::InstrumentationFileManager;

#[cfg(target_os = "linux")]
const HOST_DESCRIPTOR: &str = "linux-jvm";
#[cfg(target_os = "macos")]
const HOST_DESCRIPTOR: &str = "macos-jvm";
#[cfg(not(any(target_os = "linux", target_os = "macos")))]
const HOST_DESCRIPTOR: &str = "windows-jvm";

/// Management type for JVM processes on the host OS.
pub struct JvmManagementType {
    probe: Arc<dyn HostProcessProbe>,
    files: Arc<dyn InstrumentationFileManager>,
    descriptor: String,
}

impl JvmManagementType {
    pub fn new(
        probe: Arc<dyn HostProcessProbe>,
        files: Arc<dyn InstrumentationFileManager>,
    ) -> Self {
        JvmManagementType {
            probe,
            files,
            descriptor: HOST_DESCRIPTOR.to_string(),
        }
    }

    fn is_jvm_launcher(command: &str) -> bool {
        let Some(prefix) = invocation_prefix(command) else {
            return false;
        };
        let launcher = prefix.trim_matches('"');
        matches!(
            Path::new(launcher).file_stem().and_then(|s| s.to_str()),
            Some("java") | Some("javaw")
        )
    }
}

impl ManagementType for JvmManagementType {
    fn descriptor(&self) -> &str {
        &self.descriptor
    }

    fn snapshot(&self) -> Vec<ProcessRecord> {
        let listing = match self.probe.list_processes() {
            Ok(listing) => listing,
            Err(e) => {
                error!("process listing failed for {}: {e}", self.descriptor);
                return Vec::new();
            }
        };

        listing
            .into_iter()
            .filter(|(_, command)| Self::is_jvm_launcher(command))
            .map(|(pid, command)| {
                let mut record = ProcessRecord::discovered(pid, command, self.descriptor.clone());
                self.resolve_working_directory(&mut record);
                self.resolve_runtime_family(&mut record);
                record
            })
            .collect()
    }

    fn resolve_working_directory(&self, record: &mut ProcessRecord) {
        record.working_directory = self
            .probe
            .working_directory(record.pid)
            .map(|path| path.display().to_string())
            .unwrap_or_default();
    }

    fn resolve_runtime_family(&self, record: &mut ProcessRecord) {
        record.runtime_family = Some(RuntimeFamily::Jvm);
    }

    fn start(&self, record: &ProcessRecord) -> Result<(), AgentError> {
        info!("starting process for record {}", record.id);
        self.probe
            .start(&record.agent_execution_command)
            .map_err(|e| AgentError::start(record, e.to_string()))
    }

    fn kill(&self, record: &ProcessRecord) -> Result<(), AgentError> {
        self.probe
            .kill(record.pid)
            .map_err(|e| AgentError::stop(record, e.to_string()))
    }

    fn inject_instrumentation(&self, record: &mut ProcessRecord) -> Result<(), AgentError> {
        let library = self
            .files
            .library_path()
            .map_err(|e| AgentError::start(record, e.to_string()))?;
        let runtime_config = self
            .files
            .runtime_config_path(&record.id)
            .map_err(|e| AgentError::start(record, e.to_string()))?;
        let weaving_config = self
            .files
            .weaving_config_path(&record.id)
            .map_err(|e| AgentError::start(record, e.to_string()))?;

        let arguments = instrumentation_arguments(
            &library.display().to_string(),
            &runtime_config.display().to_string(),
            &weaving_config.display().to_string(),
            &record.id,
        );

        let cleaned = strip_instrumentation(record.effective_command());
        record.agent_execution_command = inject_after_prefix(&cleaned, &arguments)
            .ok_or_else(|| AgentError::start(record, "malformed launch command"))?;
        Ok(())
    }

    fn inject_identity(&self, record: &mut ProcessRecord) -> Result<(), AgentError> {
        let cleaned = strip_identity_marker(record.effective_command());
        record.agent_execution_command =
            inject_after_prefix(&cleaned, &identity_marker(&record.id))
                .ok_or_else(|| AgentError::start(record, "malformed launch command"))?;
        Ok(())
    }

    fn remove_instrumentation(&self, record: &mut ProcessRecord) -> Result<(), AgentError> {
        record.agent_execution_command = strip_instrumentation(record.effective_command());
        Ok(())
    }

    fn compare_identity(&self, a: &ProcessRecord, b: &ProcessRecord) -> Result<bool, AgentError> {
        if a.management_type != b.management_type {
            return Err(AgentError::Incompatible(format!(
                "{} vs {}",
                a.management_type, b.management_type
            )));
        }
        Ok(b.os_execution_command.contains(&identity_marker(&a.id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor_files::InstrumentationFileTree;
    use std::io;
    use std::path::PathBuf;

    struct EmptyProbe;

    impl HostProcessProbe for EmptyProbe {
        fn list_processes(&self) -> io::Result<Vec<(u32, String)>> {
            Err(io::Error::other("native listing broke"))
        }
        fn start(&self, _command: &str) -> io::Result<()> {
            Ok(())
        }
        fn kill(&self, _pid: u32) -> io::Result<()> {
            Ok(())
        }
        fn working_directory(&self, _pid: u32) -> Option<PathBuf> {
            None
        }
    }

    fn management() -> JvmManagementType {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("instrument");
        JvmManagementType::new(
            Arc::new(EmptyProbe),
            Arc::new(InstrumentationFileTree::new(
                root.clone(),
                root.join("hooks.jar"),
            )),
        )
    }

    fn record(id: &str, command: &str) -> ProcessRecord {
        let mut record =
            ProcessRecord::discovered(100, command.to_string(), HOST_DESCRIPTOR.to_string());
        record.id = id.to_string();
        record
    }

    #[test]
    fn snapshot_swallows_native_failures() {
        assert!(management().snapshot().is_empty());
    }

    #[test]
    fn recognizes_jvm_launchers() {
        assert!(JvmManagementType::is_jvm_launcher("java -jar app.jar"));
        assert!(JvmManagementType::is_jvm_launcher(
            "/usr/lib/jvm/bin/java -cp . Main"
        ));
        assert!(JvmManagementType::is_jvm_launcher(
            r#""C:\Program Files\Java\bin\java.exe" -jar app.jar"#
        ));
        assert!(!JvmManagementType::is_jvm_launcher("python3 service.py"));
        assert!(!JvmManagementType::is_jvm_launcher("javac Main.java"));
    }

    #[test]
    fn identity_injection_prefers_user_command() {
        let mgmt = management();
        let mut r = record("4711", "java -jar app.jar");
        r.user_execution_command = "java -jar /opt/app/app.jar".into();

        mgmt.inject_identity(&mut r).unwrap();

        assert_eq!(
            r.agent_execution_command,
            "java -Dscout.record.id=4711 -jar /opt/app/app.jar"
        );
    }

    #[test]
    fn identity_injection_replaces_stale_marker() {
        let mgmt = management();
        let mut r = record("new-id", "java -Dscout.record.id=old-id -jar app.jar");

        mgmt.inject_identity(&mut r).unwrap();

        assert_eq!(
            r.agent_execution_command,
            "java -Dscout.record.id=new-id -jar app.jar"
        );
    }

    #[test]
    fn identity_injection_fails_on_single_token_command() {
        let mgmt = management();
        let mut r = record("4711", "java");

        assert!(matches!(
            mgmt.inject_identity(&mut r),
            Err(AgentError::Start { .. })
        ));
    }

    #[test]
    fn instrumentation_then_removal_restores_original() {
        let mgmt = management();
        let mut r = record("4711", "java -jar app.jar");

        mgmt.inject_instrumentation(&mut r).unwrap();
        assert!(r.agent_execution_command.contains("-javaagent:"));
        assert!(r
            .agent_execution_command
            .contains("-Dscout.record.id=4711"));

        // the injected command is what the OS would report after a relaunch
        r.user_execution_command = r.agent_execution_command.clone();
        mgmt.remove_instrumentation(&mut r).unwrap();
        assert_eq!(r.agent_execution_command, "java -jar app.jar");
    }

    #[test]
    fn identity_comparison_requires_same_family() {
        let mgmt = management();
        let a = record("4711", "java -jar app.jar");
        let mut b = record("", "java -Dscout.record.id=4711 -jar app.jar");
        b.management_type = "other-runtime".into();

        assert!(matches!(
            mgmt.compare_identity(&a, &b),
            Err(AgentError::Incompatible(_))
        ));

        b.management_type = a.management_type.clone();
        assert!(mgmt.compare_identity(&a, &b).unwrap());
    }
}
