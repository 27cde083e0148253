use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Mutex;

use sysinfo::{Pid, System};

/// Narrow seam over the native process primitives. Management types consume
/// this; everything above it can be exercised with a scripted implementation.
pub trait HostProcessProbe: Send + Sync {
    /// All visible OS processes as `(pid, raw launch command)`.
    fn list_processes(&self) -> io::Result<Vec<(u32, String)>>;

    /// Launches `command` detached from the agent.
    fn start(&self, command: &str) -> io::Result<()>;

    /// Terminates the process with the given pid.
    fn kill(&self, pid: u32) -> io::Result<()>;

    fn working_directory(&self, pid: u32) -> Option<PathBuf>;
}

pub struct SysinfoProbe {
    system: Mutex<System>,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        SysinfoProbe {
            system: Mutex::new(System::new_all()),
        }
    }

    fn system(&self) -> std::sync::MutexGuard<'_, System> {
        match self.system.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl HostProcessProbe for SysinfoProbe {
    fn list_processes(&self) -> io::Result<Vec<(u32, String)>> {
        let mut system = self.system();
        system.refresh_processes();

        let listing = system
            .processes()
            .iter()
            .filter_map(|(pid, process)| {
                let command = process.cmd().join(" ");
                // kernel threads and zombies report an empty command line
                if command.is_empty() {
                    None
                } else {
                    Some((pid.as_u32(), command))
                }
            })
            .collect();

        Ok(listing)
    }

    fn start(&self, command: &str) -> io::Result<()> {
        Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        Ok(())
    }

    fn kill(&self, pid: u32) -> io::Result<()> {
        let mut system = self.system();
        system.refresh_processes();

        let process = system.process(Pid::from_u32(pid)).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no process with pid {pid}"))
        })?;

        if process.kill() {
            Ok(())
        } else {
            Err(io::Error::other(format!("kill signal to pid {pid} failed")))
        }
    }

    fn working_directory(&self, pid: u32) -> Option<PathBuf> {
        let mut system = self.system();
        system.refresh_processes();
        system
            .process(Pid::from_u32(pid))
            .and_then(|process| process.cwd().map(PathBuf::from))
    }
}
