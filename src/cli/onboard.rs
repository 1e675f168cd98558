use crate::attendance::UpsertPolicy;
use crate::config::{Config, expand_home};
use crate::db::Database;
use crate::discovery::Ipv4Cidr;
use crate::discovery::arp::usable_interfaces;
use anyhow::{Context, Result};
use dialoguer::{Confirm, Input, Select, theme::ColorfulTheme};

pub fn run_setup() -> Result<Config> {
    println!("──────────────────────────────────────────");
    println!("  WiFi attendance setup");
    println!("──────────────────────────────────────────");

    let theme = ColorfulTheme::default();
    let defaults = Config::load().unwrap_or_default();

    println!("\n[1/4] Network interface");
    let detected = usable_interfaces();
    let (interface, suggested_range) = if detected.is_empty() {
        println!("  ! No interface with an IPv4 address detected");
        let interface: String = Input::with_theme(&theme)
            .with_prompt("  Interface name")
            .default(defaults.interface.clone())
            .interact_text()
            .context("Failed to read interface name")?;
        (interface, defaults.address_range.clone())
    } else {
        let labels = detected
            .iter()
            .map(|(name, ip)| format!("{name} ({ip})"))
            .collect::<Vec<_>>();
        let default_index = detected
            .iter()
            .position(|(name, _)| *name == defaults.interface)
            .unwrap_or(0);

        let selected = Select::with_theme(&theme)
            .with_prompt("  Interface to scan on")
            .default(default_index)
            .items(&labels)
            .interact()
            .context("Failed to select interface")?;

        let (name, ip) = detected[selected].clone();
        (name, format!("{ip}/24"))
    };
    println!("  ✓ {interface}");

    println!("\n[2/4] Address range");
    let address_range: String = Input::with_theme(&theme)
        .with_prompt("  CIDR range to probe")
        .default(suggested_range)
        .validate_with(|input: &String| -> std::result::Result<(), String> {
            input
                .parse::<Ipv4Cidr>()
                .map(|_| ())
                .map_err(|error| error.to_string())
        })
        .interact_text()
        .context("Failed to read address range")?;
    println!("  ✓ {address_range}");

    println!("\n[3/4] Attendance store");
    let store_input: String = Input::with_theme(&theme)
        .with_prompt("  SQLite database file")
        .default(defaults.store_endpoint.display().to_string())
        .interact_text()
        .context("Failed to read store path")?;
    let store_endpoint = expand_home(&store_input);
    println!("  ✓ {}", store_endpoint.display());

    println!("\n[4/4] Known device seen with a different enrollment number");
    let policies = [
        UpsertPolicy::PreserveOriginalIdentifier,
        UpsertPolicy::OverwriteIdentifier,
    ];
    let policy_labels = [
        "Keep the enrollment number it was registered with",
        "Replace it with the newly entered one",
    ];
    let current_policy = policies
        .iter()
        .position(|policy| *policy == defaults.upsert_policy)
        .unwrap_or(0);
    let policy_index = Select::with_theme(&theme)
        .with_prompt("  Policy")
        .default(current_policy)
        .items(&policy_labels)
        .interact()
        .context("Failed to select upsert policy")?;
    let upsert_policy = policies[policy_index];

    let normalize_mac = Confirm::with_theme(&theme)
        .with_prompt("  Treat aa-bb-.. and AA:BB:.. as the same device?")
        .default(defaults.normalize_mac)
        .interact()
        .context("Failed to read MAC normalization choice")?;

    let config = Config {
        address_range,
        interface,
        store_endpoint,
        upsert_policy,
        normalize_mac,
        ..defaults
    };

    config.ensure_bootstrap_files()?;
    config.save()?;
    let _ = Database::open(&config.store_endpoint)?;

    println!("\n──────────────────────────────────────────");
    println!("  Setup complete!");
    println!("  Run `attendance scan` to register devices.");
    println!("──────────────────────────────────────────");

    Ok(config)
}
