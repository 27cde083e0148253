use anyhow::{bail, Context, Result};
use colored::Colorize;
use std::fmt::Write;
use tokio::time::sleep;

use scout_client::config_manager::Config;
use scout_common::constants::{PID_FILE, STDERR_FILE, STDOUT_FILE};
use scout_daemon::client::DaemonClient;

pub fn clean_up_after_daemon() -> Result<()> {
    std::fs::remove_file(PID_FILE).context("Failed to remove pid file")?;
    std::fs::remove_file(STDOUT_FILE).context("Failed to remove stdout file")?;
    std::fs::remove_file(STDERR_FILE).context("Failed to remove stderr file")?;
    Ok(())
}

/// Polls the daemon until its HTTP surface answers; the daemonized child
/// needs a moment to bind.
pub async fn wait(api_client: &DaemonClient) -> Result<()> {
    for n in 0..5 {
        match api_client
            .client
            .get(api_client.get_url("/info"))
            .send()
            .await
        {
            Err(e) => {
                if !(e.is_timeout() || e.is_connect()) {
                    bail!(e)
                }
            }
            Ok(resp) => {
                if resp.status().is_success() {
                    return Ok(());
                }
            }
        }

        sleep(std::time::Duration::from_secs(1 << n)).await;
    }

    bail!("Daemon not started yet")
}

pub async fn print_config_info(api_client: &DaemonClient, config: &Config) -> Result<()> {
    let mut output = String::new();

    let info = match api_client.send_info_request().await {
        Ok(info) => info,
        Err(_) => {
            writeln!(
                &mut output,
                "\nDaemon status: {}",
                "Not started yet".yellow()
            )?;
            writeln!(
                &mut output,
                "Run {} to start discovering processes.",
                "scout init".cyan().bold()
            )?;
            println!("{}", output);
            return Ok(());
        }
    };

    writeln!(&mut output, "\nDaemon status:      {}", "Running".green())?;
    writeln!(
        &mut output,
        "Registration:       {}",
        if info.registered {
            "Registered".green()
        } else {
            "Waiting for backend".yellow()
        }
    )?;
    if let Some(agent) = &info.agent {
        writeln!(&mut output, "Agent:              {} ({})", agent.name, agent.id)?;
    }
    writeln!(&mut output, "Discovered records: {}", info.process_count)?;
    writeln!(&mut output, "Monitored records:  {}", info.monitored_count)?;
    writeln!(&mut output, "Daemon version:     {}", info.version)?;
    writeln!(&mut output, "Server:             {}", config.server)?;
    writeln!(&mut output, "Backend:            {}", config.backend_url)?;

    let config_sources = if config.config_sources.is_empty() {
        "No config file used".to_string()
    } else {
        config.config_sources.join(", ")
    };
    writeln!(&mut output, "Config sources:     {}", config_sources)?;

    println!("{}", output);
    Ok(())
}
