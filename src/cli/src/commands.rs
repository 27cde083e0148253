use clap::{Parser, Subcommand};

use scout_common::constants::{LOG_FILE, STDERR_FILE, STDOUT_FILE, WORKING_DIR};

fn footer_message() -> String {
    format!(
        "Working Directory: {WORKING_DIR}\nDaemon stdout: {STDOUT_FILE}\nDaemon stderr: {STDERR_FILE}\nDaemon log: {LOG_FILE}\n"
    )
}

#[derive(Parser, Clone)]
#[clap(
    name = "scout",
    about = "Discovers host processes and manages their instrumentation",
    version = env!("CARGO_PKG_VERSION"),
    after_help = footer_message()
)]
pub struct Cli {
    #[clap(long, global = true)]
    pub config: Option<String>,
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the daemon
    Init(InitArgs),

    /// Stop the daemon
    Terminate,

    /// Remove temporary files left behind by an unexpectedly terminated daemon
    Cleanup,

    /// Show the daemon status and agent registration
    Info,

    /// List all discovered process records
    List,

    /// Show one process record
    Show { id: String },

    /// Stop a managed process
    Stop { id: String },

    /// Restart a managed process under agent control
    Restart { id: String },

    /// Enable instrumentation for a process (takes effect on its next restart)
    Monitor {
        id: String,
        /// Disable instead of enable
        #[clap(long)]
        off: bool,
    },

    /// Rename a process record
    Rename { id: String, name: String },

    /// Trigger a reconciliation cycle immediately
    Refresh,
}

#[derive(clap::Args, Debug, Clone)]
pub struct InitArgs {
    /// Run in the foreground instead of daemonizing
    #[clap(long)]
    pub no_daemonize: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_monitor_toggle() {
        let cli = Cli::parse_from(["scout", "monitor", "p-1", "--off"]);
        match cli.command {
            Commands::Monitor { id, off } => {
                assert_eq!(id, "p-1");
                assert!(off);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_config_flag_is_accepted_anywhere() {
        let cli = Cli::parse_from(["scout", "info", "--config", "/etc/scout.toml"]);
        assert_eq!(cli.config.as_deref(), Some("/etc/scout.toml"));
    }
}
