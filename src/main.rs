mod api;
mod attendance;
mod cli;
mod collector;
mod config;
mod db;
mod discovery;
mod error;

use crate::attendance::{ReconcileOutcome, Reconciler, Reconciliation};
use crate::cli::onboard::run_setup;
use crate::cli::prompt::{TerminalIdentifiers, prompt_identifier, prompt_mac_address};
use crate::cli::{Cli, Commands, ConfigCommands, ScanTarget};
use crate::collector::manual::record_entry;
use crate::collector::scan::{DeviceResult, ScanMode, ScanSummary, scan_and_reconcile};
use crate::config::Config;
use crate::db::Database;
use crate::discovery::arp::usable_interfaces;
use crate::discovery::{ArpScanner, Discovery, Ipv4Cidr};
use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use dialoguer::theme::ColorfulTheme;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Setup => {
            let _ = run_setup()?;
            Ok(())
        }
        Commands::Config { command } => handle_config_command(command),
        Commands::Manual {
            mac,
            identifier,
            date,
        } => handle_manual(mac, identifier, date),
        Commands::Scan { target, known_only } => handle_scan(target, known_only),
        Commands::Discover { target } => handle_discover(target),
        Commands::Watch { target } => handle_watch(target).await,
        Commands::Serve => handle_serve().await,
        Commands::Devices => handle_devices(),
        Commands::Report { date } => handle_report(date),
        Commands::Status => handle_status(),
        Commands::Doctor => handle_doctor(),
    }
}

fn handle_config_command(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Set { key, value } => {
            let mut config = load_config()?;
            config.set_value(&key, &value)?;
            config.ensure_bootstrap_files()?;
            config.save()?;

            println!("Config saved: {key} = {value}");
            Ok(())
        }
        ConfigCommands::Get { key } => {
            let config = load_config()?;
            let value = config
                .get_value(&key)
                .with_context(|| format!("Unsupported config key: {key}"))?;

            println!("{value}");
            Ok(())
        }
    }
}

fn handle_manual(
    mac: Option<String>,
    identifier: Option<String>,
    date: Option<String>,
) -> Result<()> {
    let config = load_config()?;
    let observed_date = parse_optional_date(date)?;
    let theme = ColorfulTheme::default();

    let mac_address = match mac {
        Some(value) => value,
        None => prompt_mac_address(&theme)?,
    };
    let identifier = match identifier.filter(|value| !value.trim().is_empty()) {
        Some(value) => value,
        None => prompt_identifier(&theme, &mac_address)?,
    };

    match record_entry(
        &config.store_endpoint,
        &Reconciler::from_config(&config),
        &identifier,
        &mac_address,
        observed_date,
    ) {
        Ok(reconciliation) => print_reconciliation(Some(&identifier), &reconciliation),
        Err(error) => println!("Error: {error}"),
    }

    Ok(())
}

fn handle_scan(target: ScanTarget, known_only: bool) -> Result<()> {
    let config = load_config()?;
    let (range, interface) = resolve_target(&config, target)?;
    let scanner = ArpScanner::new(config.scan_timeout());
    let mut identifiers = TerminalIdentifiers::default();
    let mode = if known_only {
        ScanMode::MarkKnown
    } else {
        ScanMode::Register(&mut identifiers)
    };

    println!(
        "Scanning {range} on {interface} ({}s window)...",
        config.scan_timeout_seconds
    );
    let reports = scan_and_reconcile(
        &scanner,
        &range,
        &interface,
        &config.store_endpoint,
        &Reconciler::from_config(&config),
        mode,
        Local::now().date_naive(),
    )
    .context("Device discovery failed")?;

    if reports.is_empty() {
        println!("No devices responded.");
        return Ok(());
    }

    for report in &reports {
        match &report.result {
            DeviceResult::Reconciled(reconciliation) => {
                print_reconciliation(None, reconciliation);
            }
            DeviceResult::Skipped => println!("Skipped {}", report.device.mac),
            DeviceResult::Failed { error } => {
                println!("Error for {}: {error}", report.device.mac);
            }
        }
    }

    let summary = ScanSummary::from_reports(&reports);
    println!(
        "Scan finished: {} discovered, {} created, {} updated, {} not registered, {} skipped, {} failed",
        summary.discovered,
        summary.created,
        summary.updated,
        summary.not_registered,
        summary.skipped,
        summary.failed
    );

    Ok(())
}

fn handle_discover(target: ScanTarget) -> Result<()> {
    let config = load_config()?;
    let (range, interface) = resolve_target(&config, target)?;
    let scanner = ArpScanner::new(config.scan_timeout());

    let devices = scanner
        .discover(&range, &interface)
        .context("Device discovery failed")?;

    if devices.is_empty() {
        println!("No devices responded.");
        return Ok(());
    }

    println!("IP Address\t\tMAC Address");
    println!("-----------------------------------------");
    for device in &devices {
        println!("{}\t\t{}", device.ip, device.mac);
    }

    Ok(())
}

async fn handle_watch(target: ScanTarget) -> Result<()> {
    let config = load_config()?;
    let (range, interface) = resolve_target(&config, target)?;
    let _ = Database::open(&config.store_endpoint)?;

    println!("Watching {range} on {interface}. Press Ctrl+C to stop.");

    tokio::select! {
        watch_result = collector::run_presence_watch(Arc::new(config), range, interface) => {
            watch_result?;
        }
        _ = signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}

async fn handle_serve() -> Result<()> {
    let config = load_config()?;
    let _ = Database::open(&config.store_endpoint)?;

    tokio::select! {
        api_result = api::run_server(Arc::new(config)) => {
            api_result?;
        }
        _ = signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}

fn handle_devices() -> Result<()> {
    let config = load_config()?;
    let database = Database::open(&config.store_endpoint)?;
    let records = database.list_records()?;

    if records.is_empty() {
        println!("No devices registered.");
        return Ok(());
    }

    println!("Enrollment\tMAC Address\t\tLast Seen");
    for record in &records {
        println!(
            "{}\t\t{}\t{}",
            record.enrollment_number, record.mac_address, record.last_seen_date
        );
    }
    println!("{} device(s)", records.len());

    Ok(())
}

fn handle_report(date: Option<String>) -> Result<()> {
    let config = load_config()?;
    let target_date = parse_optional_date(date)?;
    let database = Database::open(&config.store_endpoint)?;
    let present = database.presence_for_date(target_date)?;

    println!("Attendance for {target_date}");
    if present.is_empty() {
        println!("- nobody marked present");
        return Ok(());
    }

    for row in &present {
        println!("- {} ({})", row.enrollment_number, row.mac_address);
    }
    println!("{} present", present.len());

    Ok(())
}

fn handle_status() -> Result<()> {
    let config = load_config()?;
    let database = Database::open(&config.store_endpoint)?;
    let today = Local::now().date_naive();

    println!("WiFi attendance status");
    println!("- store_endpoint: {}", config.store_endpoint.display());
    println!("- scan_target: {} via {}", config.address_range, config.interface);
    println!("- upsert_policy: {}", config.upsert_policy);
    println!("- api_listen: {}:{}", config.api_bind, config.api_port);
    println!("- registered_devices: {}", database.count_records()?);
    println!("- present_today: {}", database.count_present_on(today)?);
    println!(
        "- last_seen_date: {}",
        database
            .latest_seen_date()?
            .map(|date| date.to_string())
            .unwrap_or_else(|| "none".to_string())
    );

    Ok(())
}

fn handle_doctor() -> Result<()> {
    let config_path = Config::config_path()?;
    let mut issues = Vec::new();

    if config_path.exists() {
        println!("[OK] config.json found: {}", config_path.display());
    } else {
        println!("[WARN] config.json not found: {}", config_path.display());
        issues.push("config missing".to_string());
    }

    let config = load_config()?;

    match Database::open(&config.store_endpoint) {
        Ok(_) => println!("[OK] SQLite reachable: {}", config.store_endpoint.display()),
        Err(error) => {
            println!("[WARN] SQLite check failed: {error}");
            issues.push("store unreachable".to_string());
        }
    }

    match config.parse_address_range() {
        Ok(range) => println!("[OK] address_range valid: {range}"),
        Err(error) => {
            println!("[WARN] {error:#}");
            issues.push("invalid address_range".to_string());
        }
    }

    let interfaces = usable_interfaces();
    if interfaces.iter().any(|(name, _)| *name == config.interface) {
        println!("[OK] interface {} is up with an IPv4 address", config.interface);
    } else {
        let available = interfaces
            .iter()
            .map(|(name, ip)| format!("{name} ({ip})"))
            .collect::<Vec<_>>();
        println!(
            "[WARN] interface {} not usable. Available: {}",
            config.interface,
            if available.is_empty() {
                "none".to_string()
            } else {
                available.join(", ")
            }
        );
        issues.push("interface unusable".to_string());
    }

    if issues.is_empty() {
        println!("doctor result: no issues");
    } else {
        println!("doctor result: {} warning(s)", issues.len());
    }

    Ok(())
}

fn print_reconciliation(identifier: Option<&str>, reconciliation: &Reconciliation) {
    let Reconciliation {
        mac_address,
        date,
        outcome,
    } = reconciliation;
    let subject = identifier
        .map(|identifier| format!("{identifier} with MAC address {mac_address}"))
        .unwrap_or_else(|| format!("MAC address {mac_address}"));

    match outcome {
        ReconcileOutcome::Created => println!("Attendance marked for {subject} on {date}"),
        ReconcileOutcome::Updated => println!("Attendance updated for {subject} on {date}"),
        ReconcileOutcome::NotRegistered => println!(
            "MAC address {mac_address} not found in the table. Attendance not recorded."
        ),
    }
}

fn resolve_target(config: &Config, target: ScanTarget) -> Result<(Ipv4Cidr, String)> {
    let range = match target.range {
        Some(range) => range
            .parse::<Ipv4Cidr>()
            .with_context(|| format!("Invalid --range: {range}"))?,
        None => config.parse_address_range()?,
    };
    let interface = target
        .interface
        .unwrap_or_else(|| config.interface.clone());

    Ok((range, interface))
}

fn parse_optional_date(input: Option<String>) -> Result<NaiveDate> {
    input
        .as_deref()
        .map(|date| {
            NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .with_context(|| format!("Invalid date format: {date}. Example: 2026-10-18"))
        })
        .transpose()?
        .map_or_else(|| Ok(Local::now().date_naive()), Ok)
}

fn load_config() -> Result<Config> {
    let config_path = Config::config_path()?;
    if config_path.exists() {
        Config::load()
    } else {
        Ok(Config::default())
    }
}
