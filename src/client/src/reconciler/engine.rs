use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use scout_common::constants::UNEXPECTED_LOSS_MESSAGE;
use scout_common::error::AgentError;
use scout_common::types::{Agent, AgentPatch, ProcessPatch, ProcessRecord};

use crate::discovery::DiscoveryRegistry;
use crate::management::ManagementRegistry;
use crate::monitor_files::InstrumentationFileManager;
use crate::reconciler::ProcessRegistry;
use crate::registration::IdentityIssuer;

pub struct ReconcilerSettings {
    /// How often a restart workflow looks for the relaunched process before
    /// giving up with `NotFound`.
    pub restart_probe_attempts: u64,
    pub restart_probe_delay: Duration,
}

/// Owns the canonical process registry. Merges fresh snapshots from all
/// management types, detects stopped versus restarted processes, and serves
/// read/patch/restart operations - everything under one coarse lock so each
/// state transition is visible as an atomic step.
pub struct ProcessReconciler {
    registry: Mutex<ProcessRegistry>,
    management: ManagementRegistry,
    discovery: DiscoveryRegistry,
    files: Arc<dyn InstrumentationFileManager>,
    issuer: Arc<dyn IdentityIssuer>,
    local_agent: Agent,
    settings: ReconcilerSettings,
}

impl ProcessReconciler {
    pub fn new(
        management: ManagementRegistry,
        discovery: DiscoveryRegistry,
        files: Arc<dyn InstrumentationFileManager>,
        issuer: Arc<dyn IdentityIssuer>,
        local_agent: Agent,
        settings: ReconcilerSettings,
    ) -> Self {
        ProcessReconciler {
            registry: Mutex::new(ProcessRegistry::new()),
            management,
            discovery,
            files,
            issuer,
            local_agent,
            settings,
        }
    }

    /// One reconciliation cycle. Absorbs every internal failure - the
    /// background scan must never halt.
    pub async fn refresh(&self) {
        {
            let mut registry = self.registry.lock().await;
            if registry.agent.is_none() {
                warn!("no agent context yet, discoveries cannot be attributed - skipping cycle");
                return;
            }

            let snapshot = self.collect_snapshot();
            let deduped = Self::dedup(snapshot);
            debug!(
                "merging {} snapshot entries into {} known records",
                deduped.len(),
                registry.records.len()
            );
            self.merge(&mut registry, deduped);
        }

        self.assign_backend_ids().await;
    }

    fn collect_snapshot(&self) -> Vec<ProcessRecord> {
        self.management
            .all()
            .iter()
            .flat_map(|management| management.snapshot())
            .collect()
    }

    // Multiple management types may report the same OS process; entries that
    // agree on every field collapse to one.
    fn dedup(snapshot: Vec<ProcessRecord>) -> Vec<ProcessRecord> {
        let mut seen = HashSet::new();
        snapshot
            .into_iter()
            .filter(|entry| seen.insert(entry.clone()))
            .collect()
    }

    fn merge(&self, registry: &mut ProcessRegistry, mut remaining: Vec<ProcessRecord>) {
        // Match phase: a record whose pid is still visible is running; its
        // snapshot entry is consumed. Everything else becomes a candidate.
        let mut candidates: Vec<String> = Vec::new();
        for record in registry.records.values_mut() {
            if let Some(idx) = remaining.iter().position(|entry| entry.pid == record.pid) {
                record.stopped = false;
                remaining.remove(idx);
            } else {
                candidates.push(record.id.clone());
            }
        }

        // Restart-detection phase: after an agent-issued relaunch the OS
        // reports the exact command the record was told to start with, so a
        // candidate re-attaches to the entry matching its user command.
        for id in candidates {
            let Some(record) = registry.records.get_mut(&id) else {
                continue;
            };

            let matched = (!record.user_execution_command.is_empty())
                .then(|| {
                    remaining
                        .iter()
                        .position(|entry| entry.os_execution_command == record.user_execution_command)
                })
                .flatten();

            match matched {
                Some(idx) => {
                    let entry = remaining.remove(idx);
                    info!("record {} re-attached to pid {}", record.id, entry.pid);
                    record.pid = entry.pid;
                    record.os_execution_command.clone_from(&entry.os_execution_command);
                    record.user_execution_command = entry.os_execution_command;
                    record.monitored = true;
                    record.stopped = false;
                    record.clear_error();
                }
                None if !record.stopped => {
                    // first cycle that loses the process; later cycles leave
                    // the flags alone
                    record.stopped = true;
                    record.flag_error(UNEXPECTED_LOSS_MESSAGE);
                }
                None => {}
            }
        }

        // New-process phase: whatever is left has never been seen before.
        for mut entry in remaining {
            entry.id = ProcessRecord::placeholder_id();
            self.discovery.classify(&mut entry);
            entry.last_discovery_time = Some(Utc::now());
            registry.insert(entry);
        }
    }

    /// Swaps placeholder ids for backend-issued ones. A connectivity failure
    /// aborts only this step; the records keep their placeholders and the
    /// next refresh retries.
    async fn assign_backend_ids(&self) {
        let placeholders = {
            let registry = self.registry.lock().await;
            if registry.agent.is_none() {
                return;
            }
            registry.placeholder_record_ids()
        };
        if placeholders.is_empty() {
            return;
        }

        let ids = match self.issuer.issue_ids(placeholders.len()).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("could not obtain record ids from the backend: {e}");
                return;
            }
        };

        let mut registry = self.registry.lock().await;
        for (old_id, new_id) in placeholders.into_iter().zip(ids) {
            registry.rekey(&old_id, new_id);
        }
    }

    pub async fn find_by_id(&self, id: &str) -> Result<ProcessRecord, AgentError> {
        let registry = self.registry.lock().await;
        registry
            .records
            .get(id)
            .cloned()
            .ok_or_else(|| AgentError::NotFound(format!("process record {id}")))
    }

    pub async fn list(&self) -> Vec<ProcessRecord> {
        let registry = self.registry.lock().await;
        let mut records: Vec<ProcessRecord> = registry.records.values().cloned().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }

    /// Applies the client-writable fields and runs the requested stop or
    /// restart workflow. Deliberately holds the registry lock across the
    /// native calls: patches serialize against concurrent scans.
    pub async fn apply_patch(&self, patch: ProcessPatch) -> Result<ProcessRecord, AgentError> {
        let mut registry = self.registry.lock().await;
        let host_label = registry
            .agent
            .as_ref()
            .map(Agent::host_label)
            .unwrap_or_default();

        let record = registry
            .records
            .get_mut(&patch.id)
            .ok_or_else(|| AgentError::NotFound(format!("process record {}", patch.id)))?;

        let was_stopped = record.stopped;
        record.apply_patch(&patch);

        let management = self.management.for_record(record)?;

        if patch.monitored == Some(false) {
            // relaunches from now on use the operator's original command
            management.remove_instrumentation(record)?;
        }

        if record.stopped && !was_stopped {
            management.kill(record)?;
            info!("stopped process {} on request", record.id);
        }

        if record.restart {
            record.restart = false;
            let id = record.id.clone();
            return self.restart_locked(&mut registry, &host_label, &id).await;
        }

        Ok(record.clone())
    }

    /// Relaunches a record under agent control: instrumentation files and
    /// command rewritten, old pid killed, new command started, and the
    /// registry reconciled against the relaunched OS process.
    async fn restart_locked(
        &self,
        registry: &mut ProcessRegistry,
        host_label: &str,
        id: &str,
    ) -> Result<ProcessRecord, AgentError> {
        let record = registry
            .records
            .get_mut(id)
            .ok_or_else(|| AgentError::NotFound(format!("process record {id}")))?;
        let management = self.management.for_record(record)?;

        self.files.prepare_for(record, host_label)?;

        if record.monitored {
            management.inject_instrumentation(record)?;
        } else {
            management.inject_identity(record)?;
        }
        // what the OS will report again once the relaunch lands; this is the
        // restart-matching key of later cycles
        record.user_execution_command.clone_from(&record.agent_execution_command);

        if !record.stopped {
            management.kill(record)?;
        }
        management.start(record)?;
        record.stopped = false;

        let mut last_err =
            AgentError::NotFound(format!("restarted process for record {id} not discovered yet"));
        for _ in 0..self.settings.restart_probe_attempts {
            tokio::time::sleep(self.settings.restart_probe_delay).await;
            match self.reconcile_restart_locked(registry, id) {
                Ok(updated) => return Ok(updated),
                Err(e @ AgentError::NotFound(_)) => {
                    debug!("restarted process for {id} not visible yet");
                    last_err = e;
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err)
    }

    /// Re-associates a record with its relaunched OS process by the
    /// identification marker. `NotFound` means the process has not surfaced
    /// in a snapshot yet and the caller should retry.
    pub async fn reconcile_restart(&self, id: &str) -> Result<ProcessRecord, AgentError> {
        let mut registry = self.registry.lock().await;
        self.reconcile_restart_locked(&mut registry, id)
    }

    fn reconcile_restart_locked(
        &self,
        registry: &mut ProcessRegistry,
        id: &str,
    ) -> Result<ProcessRecord, AgentError> {
        let snapshot = self.collect_snapshot();

        let record = registry
            .records
            .get_mut(id)
            .ok_or_else(|| AgentError::NotFound(format!("process record {id}")))?;
        let management = self.management.for_record(record)?;

        let matched = snapshot.into_iter().find(|entry| {
            management.compare_identity(record, entry).unwrap_or(false)
        });

        match matched {
            Some(entry) => {
                record.pid = entry.pid;
                record.agent_execution_command = entry.os_execution_command;
                record.last_discovery_time = Some(Utc::now());
                record.clear_error();
                Ok(record.clone())
            }
            None => Err(AgentError::NotFound(format!(
                "restarted process for record {id} not discovered yet"
            ))),
        }
    }

    /// Announces this agent to the backend and stores the returned context.
    /// Until this succeeds, refresh cycles are no-ops.
    pub async fn register_agent(&self) -> Result<Agent, AgentError> {
        let registered = self.issuer.register_agent(&self.local_agent).await?;
        {
            let mut registry = self.registry.lock().await;
            registry.agent = Some(registered.clone());
        }
        self.assign_backend_ids().await;
        Ok(registered)
    }

    pub async fn agent(&self) -> Option<Agent> {
        self.registry.lock().await.agent.clone()
    }

    pub async fn update_agent(&self, patch: AgentPatch) -> Result<Agent, AgentError> {
        let mut registry = self.registry.lock().await;
        let agent = registry
            .agent
            .as_mut()
            .ok_or_else(|| AgentError::NotFound("agent not registered yet".into()))?;
        agent.apply_patch(&patch);
        Ok(agent.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_manager::DiscoveryRule;
    use crate::management::jvm::JvmManagementType;
    use crate::management::probe::HostProcessProbe;
    use crate::monitor_files::InstrumentationFileTree;
    use async_trait::async_trait;
    use std::io;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
    use std::sync::Mutex as StdMutex;
    use tempfile::TempDir;

    /// Probe with a scripted process table. `start` makes the launched
    /// command visible under a fresh pid, `kill` removes the pid - enough to
    /// play through discovery, loss and restart scenarios.
    struct ScriptedProbe {
        listing: StdMutex<Vec<(u32, String)>>,
        killed: StdMutex<Vec<u32>>,
        next_pid: AtomicU32,
    }

    impl ScriptedProbe {
        fn new(listing: Vec<(u32, String)>) -> Self {
            ScriptedProbe {
                listing: StdMutex::new(listing),
                killed: StdMutex::new(Vec::new()),
                next_pid: AtomicU32::new(7000),
            }
        }

        fn set_listing(&self, listing: Vec<(u32, String)>) {
            *self.listing.lock().unwrap() = listing;
        }

        fn killed_pids(&self) -> Vec<u32> {
            self.killed.lock().unwrap().clone()
        }
    }

    impl HostProcessProbe for ScriptedProbe {
        fn list_processes(&self) -> io::Result<Vec<(u32, String)>> {
            Ok(self.listing.lock().unwrap().clone())
        }

        fn start(&self, command: &str) -> io::Result<()> {
            let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
            self.listing.lock().unwrap().push((pid, command.to_string()));
            Ok(())
        }

        fn kill(&self, pid: u32) -> io::Result<()> {
            self.killed.lock().unwrap().push(pid);
            self.listing.lock().unwrap().retain(|(p, _)| *p != pid);
            Ok(())
        }

        fn working_directory(&self, _pid: u32) -> Option<PathBuf> {
            Some(PathBuf::from("/work"))
        }
    }

    struct StubIssuer {
        counter: AtomicU64,
    }

    impl StubIssuer {
        fn new() -> Self {
            StubIssuer {
                counter: AtomicU64::new(0),
            }
        }
    }

    #[async_trait]
    impl IdentityIssuer for StubIssuer {
        async fn register_agent(&self, agent: &Agent) -> Result<Agent, AgentError> {
            let mut registered = agent.clone();
            registered.id = "agent-1".into();
            Ok(registered)
        }

        async fn issue_ids(&self, count: usize) -> Result<Vec<String>, AgentError> {
            Ok((0..count)
                .map(|_| format!("p-{}", self.counter.fetch_add(1, Ordering::SeqCst)))
                .collect())
        }
    }

    struct OfflineIssuer;

    #[async_trait]
    impl IdentityIssuer for OfflineIssuer {
        async fn register_agent(&self, _agent: &Agent) -> Result<Agent, AgentError> {
            Err(AgentError::Connection("backend offline".into()))
        }

        async fn issue_ids(&self, _count: usize) -> Result<Vec<String>, AgentError> {
            Err(AgentError::Connection("backend offline".into()))
        }
    }

    fn reconciler_with(
        probe: Arc<ScriptedProbe>,
        issuer: Arc<dyn IdentityIssuer>,
    ) -> (ProcessReconciler, TempDir) {
        let dir = TempDir::new().unwrap();
        let files: Arc<dyn InstrumentationFileManager> = Arc::new(InstrumentationFileTree::new(
            dir.path().into(),
            dir.path().join("hooks.jar"),
        ));
        let management = ManagementRegistry::new(vec![Arc::new(JvmManagementType::new(
            probe,
            files.clone(),
        ))]);
        let discovery = DiscoveryRegistry::from_rules(&[DiscoveryRule {
            signature: "sample-app".into(),
            display_name: "Sample App".into(),
        }]);
        let agent = Agent::local("127.0.0.1".into(), "8701".into(), "test-host".into(), false);
        let settings = ReconcilerSettings {
            restart_probe_attempts: 3,
            restart_probe_delay: Duration::from_millis(5),
        };

        (
            ProcessReconciler::new(management, discovery, files, issuer, agent, settings),
            dir,
        )
    }

    async fn registered_reconciler(
        listing: Vec<(u32, String)>,
    ) -> (ProcessReconciler, Arc<ScriptedProbe>, TempDir) {
        let probe = Arc::new(ScriptedProbe::new(listing));
        let (reconciler, dir) = reconciler_with(probe.clone(), Arc::new(StubIssuer::new()));
        reconciler.register_agent().await.unwrap();
        (reconciler, probe, dir)
    }

    #[tokio::test]
    async fn refresh_without_agent_context_changes_nothing() {
        let probe = Arc::new(ScriptedProbe::new(vec![(100, "java -jar app.jar".into())]));
        let (reconciler, _dir) = reconciler_with(probe, Arc::new(StubIssuer::new()));

        reconciler.refresh().await;

        assert!(reconciler.list().await.is_empty());
    }

    #[tokio::test]
    async fn refresh_registers_and_classifies_new_processes() {
        let (reconciler, _probe, _dir) =
            registered_reconciler(vec![(100, "java -jar sample-app.jar".into())]).await;

        reconciler.refresh().await;

        let records = reconciler.list().await;
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.id, "p-0");
        assert_eq!(record.pid, 100);
        assert_eq!(record.name, "Sample App");
        assert_eq!(
            record.proposed_execution_command,
            "java -jar /work/sample-app.jar"
        );
        assert!(record.last_discovery_time.is_some());
        assert!(!record.stopped);
    }

    #[tokio::test]
    async fn refresh_is_idempotent_against_an_unchanged_host() {
        let (reconciler, _probe, _dir) =
            registered_reconciler(vec![(100, "java -jar sample-app.jar".into())]).await;

        reconciler.refresh().await;
        let first = reconciler.list().await;

        reconciler.refresh().await;
        let second = reconciler.list().await;

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn structurally_identical_entries_collapse_to_one_record() {
        let command = "java -jar sample-app.jar".to_string();
        let (reconciler, _probe, _dir) =
            registered_reconciler(vec![(100, command.clone()), (100, command.clone()), (100, command)])
                .await;

        reconciler.refresh().await;

        assert_eq!(reconciler.list().await.len(), 1);
    }

    #[tokio::test]
    async fn restart_is_detected_by_the_relaunch_command() {
        let (reconciler, probe, _dir) =
            registered_reconciler(vec![(100, "java -jar sample-app.jar".into())]).await;
        reconciler.refresh().await;

        // the record was told to relaunch with a marked command
        let marked = "java -Dscout.record.id=p-0 -jar sample-app.jar".to_string();
        {
            let mut registry = reconciler.registry.lock().await;
            let record = registry.records.get_mut("p-0").unwrap();
            record.user_execution_command.clone_from(&marked);
        }

        // pid 100 is gone; the marked command shows up under pid 200
        probe.set_listing(vec![(200, marked.clone())]);
        reconciler.refresh().await;

        let record = reconciler.find_by_id("p-0").await.unwrap();
        assert_eq!(record.pid, 200);
        assert!(!record.stopped);
        assert!(!record.error_occurred);
        assert!(record.monitored);
        assert_eq!(record.os_execution_command, marked);
    }

    #[tokio::test]
    async fn unexplained_loss_is_flagged_once_and_stays_stable() {
        let (reconciler, probe, _dir) =
            registered_reconciler(vec![(100, "java -jar sample-app.jar".into())]).await;
        reconciler.refresh().await;

        probe.set_listing(vec![]);
        reconciler.refresh().await;

        let flagged = reconciler.find_by_id("p-0").await.unwrap();
        assert!(flagged.stopped);
        assert!(flagged.error_occurred);
        assert_eq!(
            flagged.error_message.as_deref(),
            Some(UNEXPECTED_LOSS_MESSAGE)
        );

        reconciler.refresh().await;
        let still_flagged = reconciler.find_by_id("p-0").await.unwrap();
        assert_eq!(flagged, still_flagged);
    }

    #[tokio::test]
    async fn records_keep_placeholder_ids_while_the_backend_is_down() {
        let probe = Arc::new(ScriptedProbe::new(vec![(100, "java -jar app.jar".into())]));
        let (reconciler, _dir) = reconciler_with(probe, Arc::new(OfflineIssuer));

        // context set by hand - registration itself cannot succeed offline
        {
            let mut registry = reconciler.registry.lock().await;
            registry.agent = Some(Agent::local(
                "127.0.0.1".into(),
                "8701".into(),
                "test-host".into(),
                false,
            ));
        }

        reconciler.refresh().await;

        let records = reconciler.list().await;
        assert_eq!(records.len(), 1);
        assert!(records[0].has_placeholder_id());
    }

    #[tokio::test]
    async fn patch_of_unknown_record_is_not_found() {
        let (reconciler, _probe, _dir) = registered_reconciler(vec![]).await;

        let result = reconciler
            .apply_patch(ProcessPatch {
                id: "missing".into(),
                ..Default::default()
            })
            .await;

        assert!(matches!(result, Err(AgentError::NotFound(_))));
    }

    #[tokio::test]
    async fn patch_renames_without_side_effects() {
        let (reconciler, probe, _dir) =
            registered_reconciler(vec![(100, "java -jar sample-app.jar".into())]).await;
        reconciler.refresh().await;

        let updated = reconciler
            .apply_patch(ProcessPatch {
                id: "p-0".into(),
                name: Some("renamed".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(updated.name, "renamed");
        assert!(probe.killed_pids().is_empty());
    }

    #[tokio::test]
    async fn patching_stopped_kills_the_process() {
        let (reconciler, probe, _dir) =
            registered_reconciler(vec![(100, "java -jar sample-app.jar".into())]).await;
        reconciler.refresh().await;

        let updated = reconciler
            .apply_patch(ProcessPatch {
                id: "p-0".into(),
                stopped: Some(true),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(updated.stopped);
        assert_eq!(probe.killed_pids(), vec![100]);
    }

    #[tokio::test]
    async fn restart_relaunches_with_identity_marker() {
        let (reconciler, probe, _dir) =
            registered_reconciler(vec![(100, "java -jar sample-app.jar".into())]).await;
        reconciler.refresh().await;

        let updated = reconciler
            .apply_patch(ProcessPatch {
                id: "p-0".into(),
                restart: Some(true),
                ..Default::default()
            })
            .await
            .unwrap();

        // the old pid went down, the relaunch came up under a scripted pid
        assert_eq!(probe.killed_pids(), vec![100]);
        assert_eq!(updated.pid, 7000);
        assert!(!updated.stopped);
        assert!(!updated.restart);
        assert!(!updated.error_occurred);
        assert!(updated
            .agent_execution_command
            .contains("-Dscout.record.id=p-0"));
        assert_eq!(updated.user_execution_command, updated.agent_execution_command);
        assert!(!updated.agent_execution_command.contains("-javaagent:"));
    }

    #[tokio::test]
    async fn restart_of_a_monitored_record_injects_instrumentation() {
        let (reconciler, _probe, _dir) =
            registered_reconciler(vec![(100, "java -jar sample-app.jar".into())]).await;
        reconciler.refresh().await;

        let updated = reconciler
            .apply_patch(ProcessPatch {
                id: "p-0".into(),
                monitored: Some(true),
                restart: Some(true),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(updated.agent_execution_command.contains("-javaagent:"));
        assert!(updated
            .agent_execution_command
            .contains("-Dscout.instrument.configuration="));
        assert!(updated
            .agent_execution_command
            .contains("-Dscout.record.id=p-0"));
    }

    #[tokio::test]
    async fn reconcile_restart_without_a_surfaced_process_is_not_found() {
        let (reconciler, probe, _dir) =
            registered_reconciler(vec![(100, "java -jar sample-app.jar".into())]).await;
        reconciler.refresh().await;

        probe.set_listing(vec![]);

        let result = reconciler.reconcile_restart("p-0").await;
        assert!(matches!(result, Err(AgentError::NotFound(_))));
    }

    #[tokio::test]
    async fn agent_updates_are_limited_to_name_and_hidden() {
        let (reconciler, _probe, _dir) = registered_reconciler(vec![]).await;

        let updated = reconciler
            .update_agent(AgentPatch {
                name: Some("renamed-host".into()),
                hidden: Some(true),
            })
            .await
            .unwrap();

        assert_eq!(updated.name, "renamed-host");
        assert!(updated.hidden);
        assert_eq!(updated.id, "agent-1");
    }
}
