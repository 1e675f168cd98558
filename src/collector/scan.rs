use crate::attendance::{ReconcileOutcome, Reconciler, Reconciliation};
use crate::db::Database;
use crate::discovery::{DiscoveredDevice, Discovery, Ipv4Cidr};
use crate::error::{DiscoveryError, ReconcileError};
use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::path::Path;
use tracing::{error, info};

pub trait IdentifierSource {
    /// `None` skips the device without touching the store.
    fn identifier_for(&mut self, device: &DiscoveredDevice) -> Result<Option<String>>;
}

pub enum ScanMode<'a> {
    Register(&'a mut dyn IdentifierSource),
    MarkKnown,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeviceResult {
    Reconciled(Reconciliation),
    Skipped,
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub device: DiscoveredDevice,
    pub result: DeviceResult,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub discovered: usize,
    pub created: usize,
    pub updated: usize,
    pub not_registered: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ScanSummary {
    pub fn from_reports(reports: &[ScanReport]) -> Self {
        reports.iter().fold(
            Self {
                discovered: reports.len(),
                ..Self::default()
            },
            |mut summary, report| {
                match &report.result {
                    DeviceResult::Reconciled(reconciliation) => match reconciliation.outcome {
                        ReconcileOutcome::Created => summary.created += 1,
                        ReconcileOutcome::Updated => summary.updated += 1,
                        ReconcileOutcome::NotRegistered => summary.not_registered += 1,
                    },
                    DeviceResult::Skipped => summary.skipped += 1,
                    DeviceResult::Failed { .. } => summary.failed += 1,
                }
                summary
            },
        )
    }
}

pub fn scan_and_reconcile<D: Discovery>(
    discovery: &D,
    range: &Ipv4Cidr,
    interface: &str,
    store_endpoint: &Path,
    reconciler: &Reconciler,
    mut mode: ScanMode<'_>,
    observed_date: NaiveDate,
) -> Result<Vec<ScanReport>, DiscoveryError> {
    let devices = discovery.discover(range, interface)?;
    if devices.is_empty() {
        info!(range = %range, interface, "no devices responded");
    }

    let reports = devices
        .into_iter()
        .map(|device| {
            let result = reconcile_device(
                &device,
                store_endpoint,
                reconciler,
                &mut mode,
                observed_date,
            );
            ScanReport { device, result }
        })
        .collect();

    Ok(reports)
}

fn reconcile_device(
    device: &DiscoveredDevice,
    store_endpoint: &Path,
    reconciler: &Reconciler,
    mode: &mut ScanMode<'_>,
    observed_date: NaiveDate,
) -> DeviceResult {
    let identifier = match mode {
        ScanMode::Register(source) => match source.identifier_for(device) {
            Ok(Some(identifier)) => Some(identifier),
            Ok(None) => return DeviceResult::Skipped,
            Err(error) => {
                error!(mac = %device.mac, error = %error, "failed to read identifier");
                return DeviceResult::Failed {
                    error: format!("{error:#}"),
                };
            }
        },
        ScanMode::MarkKnown => None,
    };

    let reconciled = Database::open(store_endpoint)
        .map_err(ReconcileError::from)
        .and_then(|mut store| match identifier.as_deref() {
            Some(identifier) => {
                reconciler.reconcile(&mut store, identifier, &device.mac, observed_date)
            }
            None => reconciler.mark_seen(&mut store, &device.mac, observed_date),
        });

    match reconciled {
        Ok(reconciliation) => DeviceResult::Reconciled(reconciliation),
        Err(reconcile_error) => {
            error!(mac = %device.mac, error = %reconcile_error, "failed to record attendance");
            DeviceResult::Failed {
                error: reconcile_error.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        DeviceResult, IdentifierSource, ScanMode, ScanSummary, scan_and_reconcile,
    };
    use crate::attendance::{AttendanceStore, ReconcileOutcome, Reconciler};
    use crate::db::Database;
    use crate::discovery::{DiscoveredDevice, Discovery, Ipv4Cidr};
    use crate::error::DiscoveryError;
    use anyhow::Result;
    use chrono::NaiveDate;
    use std::net::Ipv4Addr;

    struct FixedDiscovery {
        macs: Vec<&'static str>,
    }

    impl Discovery for FixedDiscovery {
        fn discover(
            &self,
            _range: &Ipv4Cidr,
            _interface: &str,
        ) -> Result<Vec<DiscoveredDevice>, DiscoveryError> {
            Ok(self
                .macs
                .iter()
                .enumerate()
                .map(|(index, mac)| DiscoveredDevice {
                    ip: Ipv4Addr::new(192, 168, 0, 100 + index as u8),
                    mac: mac.to_string(),
                })
                .collect())
        }
    }

    struct BrokenDiscovery;

    impl Discovery for BrokenDiscovery {
        fn discover(
            &self,
            _range: &Ipv4Cidr,
            interface: &str,
        ) -> Result<Vec<DiscoveredDevice>, DiscoveryError> {
            Err(DiscoveryError::InterfaceNotFound(interface.to_string()))
        }
    }

    #[derive(Default)]
    struct ScriptedIdentifiers {
        answers: Vec<Option<&'static str>>,
        asked: Vec<String>,
    }

    impl IdentifierSource for ScriptedIdentifiers {
        fn identifier_for(&mut self, device: &DiscoveredDevice) -> Result<Option<String>> {
            self.asked.push(device.mac.clone());
            let answer = self.answers.get(self.asked.len() - 1).copied().flatten();
            Ok(answer.map(ToOwned::to_owned))
        }
    }

    fn range() -> Ipv4Cidr {
        "192.168.0.1/24".parse().expect("cidr")
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 1).expect("valid date")
    }

    #[test]
    fn one_reconcile_per_discovered_device_in_order() {
        let dir = tempfile::tempdir().expect("temp dir");
        let endpoint = dir.path().join("attendance.db");
        let discovery = FixedDiscovery {
            macs: vec!["AA:11:22:33:44:55", "BB:66:77:88:99:00"],
        };
        let mut identifiers = ScriptedIdentifiers {
            answers: vec![Some("E100"), Some("E200")],
            ..Default::default()
        };

        let reports = scan_and_reconcile(
            &discovery,
            &range(),
            "en0",
            &endpoint,
            &Reconciler::default(),
            ScanMode::Register(&mut identifiers),
            day(),
        )
        .expect("scan");

        assert_eq!(identifiers.asked, vec!["AA:11:22:33:44:55", "BB:66:77:88:99:00"]);
        let macs = reports
            .iter()
            .map(|report| match &report.result {
                DeviceResult::Reconciled(result) => {
                    assert_eq!(result.outcome, ReconcileOutcome::Created);
                    result.mac_address.as_str()
                }
                other => panic!("unexpected result: {other:?}"),
            })
            .collect::<Vec<_>>();
        assert_eq!(macs, vec!["AA:11:22:33:44:55", "BB:66:77:88:99:00"]);

        let store = Database::open(&endpoint).expect("store");
        assert_eq!(store.count_records().expect("count"), 2);
    }

    #[test]
    fn empty_identifier_skips_device() {
        let dir = tempfile::tempdir().expect("temp dir");
        let endpoint = dir.path().join("attendance.db");
        let discovery = FixedDiscovery {
            macs: vec!["AA:11:22:33:44:55"],
        };
        let mut identifiers = ScriptedIdentifiers {
            answers: vec![None],
            ..Default::default()
        };

        let reports = scan_and_reconcile(
            &discovery,
            &range(),
            "en0",
            &endpoint,
            &Reconciler::default(),
            ScanMode::Register(&mut identifiers),
            day(),
        )
        .expect("scan");

        assert!(matches!(reports[0].result, DeviceResult::Skipped));
        let store = Database::open(&endpoint).expect("store");
        assert_eq!(store.count_records().expect("count"), 0);
    }

    #[test]
    fn mark_known_updates_registered_and_skips_strangers() {
        let dir = tempfile::tempdir().expect("temp dir");
        let endpoint = dir.path().join("attendance.db");
        {
            let mut store = Database::open(&endpoint).expect("store");
            store
                .insert_record(
                    "E100",
                    "AA:11:22:33:44:55",
                    NaiveDate::from_ymd_opt(2026, 9, 1).expect("date"),
                )
                .expect("seed");
        }
        let discovery = FixedDiscovery {
            macs: vec!["aa:11:22:33:44:55", "bb:66:77:88:99:00"],
        };

        let reports = scan_and_reconcile(
            &discovery,
            &range(),
            "en0",
            &endpoint,
            &Reconciler::default(),
            ScanMode::MarkKnown,
            day(),
        )
        .expect("scan");

        let summary = ScanSummary::from_reports(&reports);
        assert_eq!(summary.discovered, 2);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.not_registered, 1);

        let store = Database::open(&endpoint).expect("store");
        let records = store.find_by_mac("AA:11:22:33:44:55").expect("lookup");
        assert_eq!(records[0].last_seen_date, day());
        assert_eq!(store.count_records().expect("count"), 1);
    }

    #[test]
    fn store_failure_is_reported_per_device() {
        let dir = tempfile::tempdir().expect("temp dir");
        let blocker = dir.path().join("not-a-directory");
        std::fs::write(&blocker, b"").expect("blocker file");
        let discovery = FixedDiscovery {
            macs: vec!["AA:11:22:33:44:55", "BB:66:77:88:99:00"],
        };

        let reports = scan_and_reconcile(
            &discovery,
            &range(),
            "en0",
            &blocker.join("attendance.db"),
            &Reconciler::default(),
            ScanMode::MarkKnown,
            day(),
        )
        .expect("scan");

        assert_eq!(ScanSummary::from_reports(&reports).failed, 2);
    }

    #[test]
    fn discovery_failure_is_not_an_empty_scan() {
        let dir = tempfile::tempdir().expect("temp dir");

        let result = scan_and_reconcile(
            &BrokenDiscovery,
            &range(),
            "wlan9",
            &dir.path().join("attendance.db"),
            &Reconciler::default(),
            ScanMode::MarkKnown,
            day(),
        );

        assert!(matches!(result, Err(DiscoveryError::InterfaceNotFound(_))));
    }

    #[test]
    fn no_responders_yields_empty_report() {
        let dir = tempfile::tempdir().expect("temp dir");

        let reports = scan_and_reconcile(
            &FixedDiscovery { macs: Vec::new() },
            &range(),
            "en0",
            &dir.path().join("attendance.db"),
            &Reconciler::default(),
            ScanMode::MarkKnown,
            day(),
        )
        .expect("scan");

        assert!(reports.is_empty());
    }
}
