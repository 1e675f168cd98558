pub mod manual;
pub mod scan;

use crate::attendance::Reconciler;
use crate::config::Config;
use crate::discovery::{ArpScanner, Discovery, Ipv4Cidr};
use crate::error::DiscoveryError;
use anyhow::Result;
use chrono::{Local, NaiveDate};
use scan::{ScanMode, ScanSummary, scan_and_reconcile};
use std::sync::Arc;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info};

pub async fn run_presence_watch(
    config: Arc<Config>,
    range: Ipv4Cidr,
    interface: String,
) -> Result<()> {
    let mut ticker = interval(config.watch_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        interval_seconds = config.watch_interval().as_secs(),
        range = %range,
        interface = %interface,
        "presence watch started"
    );

    loop {
        ticker.tick().await;

        let tick_config = Arc::clone(&config);
        let tick_interface = interface.clone();
        let scanned = tokio::task::spawn_blocking(move || {
            let scanner = ArpScanner::new(tick_config.scan_timeout());
            watch_tick(
                &scanner,
                &tick_config,
                &range,
                &tick_interface,
                Local::now().date_naive(),
            )
        })
        .await;

        if let Err(join_error) = scanned {
            error!(error = %join_error, "presence scan worker panicked");
        }
    }
}

fn watch_tick<D: Discovery>(
    discovery: &D,
    config: &Config,
    range: &Ipv4Cidr,
    interface: &str,
    observed_date: NaiveDate,
) -> Result<ScanSummary, DiscoveryError> {
    let reports = scan_and_reconcile(
        discovery,
        range,
        interface,
        &config.store_endpoint,
        &Reconciler::from_config(config),
        ScanMode::MarkKnown,
        observed_date,
    )
    .inspect_err(|discovery_error| {
        error!(error = %discovery_error, "presence scan failed");
    })?;

    let summary = ScanSummary::from_reports(&reports);
    info!(
        discovered = summary.discovered,
        updated = summary.updated,
        not_registered = summary.not_registered,
        failed = summary.failed,
        "presence scan completed"
    );

    Ok(summary)
}
