use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use scout_common::types::Agent;

use crate::config_manager::Config;
use crate::discovery::DiscoveryRegistry;
use crate::management::jvm::JvmManagementType;
use crate::management::probe::{HostProcessProbe, SysinfoProbe};
use crate::management::ManagementRegistry;
use crate::monitor_files::{InstrumentationFileManager, InstrumentationFileTree};
use crate::reconciler::{ProcessReconciler, ReconcilerSettings};
use crate::registration::{BackendClient, IdentityIssuer};

/// The agent's service object: constructed once at startup, owns the
/// reconciliation engine and the collaborators it was wired with.
pub struct ScoutClient {
    pub config: Config,
    reconciler: ProcessReconciler,
}

impl ScoutClient {
    pub fn new(config: Config) -> Result<ScoutClient> {
        let probe: Arc<dyn HostProcessProbe> = Arc::new(SysinfoProbe::new());
        let issuer: Arc<dyn IdentityIssuer> =
            Arc::new(BackendClient::new(config.backend_url.clone()));
        Self::with_parts(config, probe, issuer)
    }

    /// Assembly seam: lets embedders and tests swap the native probe and the
    /// backend client while keeping the production wiring.
    pub fn with_parts(
        config: Config,
        probe: Arc<dyn HostProcessProbe>,
        issuer: Arc<dyn IdentityIssuer>,
    ) -> Result<ScoutClient> {
        info!("initializing scout client against {}", config.backend_url);

        let files: Arc<dyn InstrumentationFileManager> = Arc::new(InstrumentationFileTree::new(
            config.instrument_root.clone().into(),
            config.instrument_library.clone().into(),
        ));

        let management = ManagementRegistry::new(vec![Arc::new(JvmManagementType::new(
            probe,
            files.clone(),
        ))]);

        let discovery = DiscoveryRegistry::from_rules(&config.discovery);

        let port = config
            .server
            .rsplit_once(':')
            .map(|(_, port)| port.to_string())
            .context("server address has no port")?;
        let local_agent = Agent::local(
            config.agent_ip.clone(),
            port,
            config.agent_name.clone(),
            config.hidden,
        );

        let settings = ReconcilerSettings {
            restart_probe_attempts: config.restart_probe_attempts,
            restart_probe_delay: Duration::from_millis(config.restart_probe_delay_ms),
        };

        let reconciler =
            ProcessReconciler::new(management, discovery, files, issuer, local_agent, settings);

        Ok(ScoutClient { config, reconciler })
    }

    pub fn reconciler(&self) -> &ProcessReconciler {
        &self.reconciler
    }
}
