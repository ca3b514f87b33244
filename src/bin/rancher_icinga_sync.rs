//! Driver loop (§4.9): parses configuration, builds the inventory and
//! monitoring clients, and runs sync ticks until the configured interval
//! says to stop.
//!
//! Grounded on the teacher's `main_cli.rs` shape (a thin `clap::Parser`
//! wrapping an env-driven configuration, `tracing` for all operational
//! output) translated from the teacher's k8s-installer one-shot job into
//! this crate's timer-driven loop.

use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use rancher_icinga_sync::changeevent::ChangeEventEmitter;
use rancher_icinga_sync::config::Config;
use rancher_icinga_sync::inventory::{CachingInventoryClient, RancherHttpClient};
use rancher_icinga_sync::logging;
use rancher_icinga_sync::monitoring::IcingaHttpClient;
use rancher_icinga_sync::reconcile::Reconciler;

#[derive(Parser)]
#[command(author, version, about = "Reconciles a Rancher Cattle inventory into Icinga2 monitoring objects", long_about = None)]
struct Cli {
    /// Print the resolved configuration and exit without syncing.
    #[arg(long)]
    print_config: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            return ExitCode::FAILURE;
        }
    };

    logging::init(config.debug_level);

    if cli.print_config {
        print_config(&config);
        return ExitCode::SUCCESS;
    }

    let inventory_client = match RancherHttpClient::new(&config.rancher_url, &config.rancher_access_key, &config.rancher_secret_key) {
        Ok(client) => client,
        Err(err) => {
            error!(error = %err, "failed to build inventory client");
            return ExitCode::FAILURE;
        }
    };
    let inventory = CachingInventoryClient::new(inventory_client);

    let monitoring = match IcingaHttpClient::new(&config.icinga_url, &config.icinga_user, &config.icinga_password, config.icinga_insecure_tls)
    {
        Ok(client) => client,
        Err(err) => {
            error!(error = %err, "failed to build monitoring client");
            return ExitCode::FAILURE;
        }
    };

    let change_events = ChangeEventEmitter::new(config.register_changes.clone());
    let reconciler = Reconciler::new(&inventory, &monitoring, &change_events, &config);

    loop {
        info!("starting sync tick");
        match reconciler.run_tick() {
            Ok(()) => info!("sync tick completed"),
            Err(err) => error!(error = %err, "sync tick failed, will retry on the next tick"),
        }

        if config.refresh_interval_secs == 0 {
            break;
        }
        thread::sleep(Duration::from_secs(config.refresh_interval_secs));
    }

    ExitCode::SUCCESS
}

fn print_config(config: &Config) {
    println!("rancher_url: {}", config.rancher_url);
    println!("icinga_url: {}", config.icinga_url);
    println!("icinga_insecure_tls: {}", config.icinga_insecure_tls);
    println!("installation: {}", config.installation);
    println!("host_check_command: {}", config.host_check_command);
    println!("stack_check_command: {}", config.stack_check_command);
    println!("service_check_command: {}", config.service_check_command);
    println!("agent_service_check_command: {}", config.agent_service_check_command);
    println!("refresh_interval_secs: {}", config.refresh_interval_secs);
    println!(
        "register_changes: {}",
        config.register_changes.as_ref().map(|u| u.as_str().to_string()).unwrap_or_else(|| "(disabled)".to_string())
    );
}
