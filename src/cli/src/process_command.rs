use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use daemonize::{Daemonize, Outcome};
use std::fs::File;

use scout_client::config_manager::{Config, ConfigLoader};
use scout_common::constants::{PID_FILE, STDERR_FILE, STDOUT_FILE, WORKING_DIR};
use scout_common::types::{ProcessPatch, ProcessRecord};
use scout_daemon::client::DaemonClient;
use scout_daemon::daemon::run;

use crate::commands::{Cli, Commands};
use crate::logging::setup_logging;
use crate::nondaemon_commands::{clean_up_after_daemon, print_config_info, wait};

pub fn start_daemon() -> Outcome<()> {
    let _ = std::fs::create_dir_all(WORKING_DIR);

    Daemonize::new()
        .pid_file(PID_FILE)
        .working_directory(WORKING_DIR)
        .stdout(
            File::create(STDOUT_FILE)
                .context("Failed to create stdout file")
                .unwrap(),
        )
        .stderr(
            File::create(STDERR_FILE)
                .context("Failed to create stderr file")
                .unwrap(),
        )
        .umask(0o002)
        .execute()
}

pub fn process_cli() -> Result<()> {
    // has to be sync due to daemonizing
    let cli = Cli::parse();

    let config = ConfigLoader::load_config(cli.config.as_deref())?;
    let api_client = DaemonClient::new(format!("http://{}", config.server));

    match cli.command {
        Commands::Init(args) => {
            if !args.no_daemonize {
                println!("Starting daemon...");
                match start_daemon() {
                    Outcome::Parent(Ok(_)) => {
                        tokio::runtime::Runtime::new()?.block_on(async {
                            wait(&api_client).await?;
                            print_config_info(&api_client, &config).await
                        })?;
                        println!("Daemon started successfully.");
                        return Ok(());
                    }
                    Outcome::Parent(Err(e)) => {
                        println!("Failed to start daemon. Maybe the daemon is already running? If it's not, run `scout cleanup` to clean up the previous daemon files.");
                        println!("{:}", e);
                        return Ok(());
                    }
                    Outcome::Child(Err(e)) => {
                        anyhow::bail!(e);
                    }
                    Outcome::Child(Ok(_)) => {
                        setup_logging()?;
                    }
                }
                run(config)?;
                return clean_up_after_daemon();
            }

            setup_logging()?;
            run(config)
        }
        Commands::Cleanup => {
            let result = clean_up_after_daemon();
            if result.is_ok() {
                println!("Daemon files cleaned up successfully.");
            }
            result
        }
        command => {
            match tokio::runtime::Runtime::new()?
                .block_on(run_async_command(command, &api_client, &config))
            {
                Ok(_) => {}
                Err(e) => {
                    println!("Failed to send command to the daemon. Maybe the daemon is not running? If it's not, run `scout init` to start it.");
                    println!("{e:?}");
                }
            }
            Ok(())
        }
    }
}

async fn run_async_command(
    command: Commands,
    api_client: &DaemonClient,
    config: &Config,
) -> Result<()> {
    match command {
        Commands::Terminate => {
            api_client.send_terminate_request().await?;
            println!("Daemon terminating.");
        }
        Commands::Info => print_config_info(api_client, config).await?,
        Commands::List => {
            let records = api_client.list_processes().await?;
            if records.is_empty() {
                println!("No processes discovered yet.");
            }
            for record in records {
                print_record_line(&record);
            }
        }
        Commands::Show { id } => {
            let record = api_client.get_process(&id).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Commands::Stop { id } => {
            let record = api_client
                .patch_process(
                    &id,
                    ProcessPatch {
                        stopped: Some(true),
                        ..Default::default()
                    },
                )
                .await?;
            println!("Stopped {}.", record.id);
        }
        Commands::Restart { id } => {
            let record = api_client
                .patch_process(
                    &id,
                    ProcessPatch {
                        restart: Some(true),
                        ..Default::default()
                    },
                )
                .await?;
            println!("Restarted {} as pid {}.", record.id, record.pid);
        }
        Commands::Monitor { id, off } => {
            let record = api_client
                .patch_process(
                    &id,
                    ProcessPatch {
                        monitored: Some(!off),
                        ..Default::default()
                    },
                )
                .await?;
            println!(
                "Monitoring {} for {} (takes effect on its next restart).",
                if record.monitored { "enabled" } else { "disabled" },
                record.id
            );
        }
        Commands::Rename { id, name } => {
            let record = api_client
                .patch_process(
                    &id,
                    ProcessPatch {
                        name: Some(name),
                        ..Default::default()
                    },
                )
                .await?;
            println!("Renamed {} to {}.", record.id, record.name);
        }
        Commands::Refresh => {
            api_client.send_refresh_request().await?;
            println!("Reconciliation cycle triggered.");
        }
        Commands::Init(_) | Commands::Cleanup => unreachable!("handled synchronously"),
    };

    Ok(())
}

fn print_record_line(record: &ProcessRecord) {
    let state = if record.error_occurred {
        "errored".red()
    } else if record.stopped {
        "stopped".yellow()
    } else {
        "running".green()
    };
    let name = if record.name.is_empty() {
        "<unclassified>"
    } else {
        &record.name
    };
    println!(
        "{:<14} {:>7}  {}  {:<20} {}",
        record.id, record.pid, state, name, record.os_execution_command
    );
}
