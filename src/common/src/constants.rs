pub const WORKING_DIR: &str = "/tmp/scout/";
pub const PID_FILE: &str = "/tmp/scout/scoutd.pid";
pub const STDOUT_FILE: &str = "/tmp/scout/scoutd.out";
pub const STDERR_FILE: &str = "/tmp/scout/scoutd.err";
pub const LOG_FILE: &str = "/tmp/scout/daemon.log";

/// Marker embedded into a launch command so a relaunched OS process can be
/// re-associated with its logical record. Always `<flag><record id>`.
pub const IDENTITY_FLAG: &str = "-Dscout.record.id=";

/// Proposed-command sentinel: the discovered OS command is already the one a
/// previous agent-managed launch produced, keep it instead of deriving a path.
pub const USE_OS_COMMAND: &str = "use-os-command";

pub const UNEXPECTED_LOSS_MESSAGE: &str =
    "Process disappeared from the latest host snapshot without a matching relaunch.";

pub const DEFAULT_SERVER: &str = "127.0.0.1:8701";
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8700/registry";

pub const REFRESH_INTERVAL_MS: u64 = 30_000;
pub const REGISTRATION_RETRY_INTERVAL_MS: u64 = 60_000;
