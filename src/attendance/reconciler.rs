use super::{AttendanceStore, ReconcileOutcome, UpsertPolicy, mac};
use crate::config::Config;
use crate::error::ReconcileError;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub mac_address: String,
    pub date: NaiveDate,
    pub outcome: ReconcileOutcome,
}

#[derive(Debug, Clone, Copy)]
pub struct Reconciler {
    policy: UpsertPolicy,
    normalize_mac: bool,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(UpsertPolicy::default(), true)
    }
}

impl Reconciler {
    pub fn new(policy: UpsertPolicy, normalize_mac: bool) -> Self {
        Self {
            policy,
            normalize_mac,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.upsert_policy, config.normalize_mac)
    }

    pub fn reconcile<S: AttendanceStore>(
        &self,
        store: &mut S,
        identifier: &str,
        mac_address: &str,
        observed_date: NaiveDate,
    ) -> Result<Reconciliation, ReconcileError> {
        let mac_address = mac::prepare(mac_address, self.normalize_mac)?;
        let existing = store.find_by_mac(&mac_address)?;

        let outcome = if existing.is_empty() {
            store
                .insert_record(identifier, &mac_address, observed_date)
                .inspect_err(|error| {
                    if error.is_constraint() {
                        warn!(mac = %mac_address, "device registered concurrently; insert rejected");
                    }
                })?;
            info!(mac = %mac_address, identifier, date = %observed_date, "attendance record created");
            ReconcileOutcome::Created
        } else {
            if existing.len() > 1 {
                warn!(mac = %mac_address, rows = existing.len(), "multiple records share one MAC address");
            }

            let replacement = match self.policy {
                UpsertPolicy::OverwriteIdentifier => Some(identifier),
                UpsertPolicy::PreserveOriginalIdentifier => None,
            };
            store.update_record(&mac_address, observed_date, replacement)?;
            info!(mac = %mac_address, identifier, date = %observed_date, policy = %self.policy, "attendance record updated");
            ReconcileOutcome::Updated
        };

        Ok(Reconciliation {
            mac_address,
            date: observed_date,
            outcome,
        })
    }

    pub fn mark_seen<S: AttendanceStore>(
        &self,
        store: &mut S,
        mac_address: &str,
        observed_date: NaiveDate,
    ) -> Result<Reconciliation, ReconcileError> {
        let mac_address = mac::prepare(mac_address, self.normalize_mac)?;
        let existing = store.find_by_mac(&mac_address)?;

        let outcome = if existing.is_empty() {
            info!(mac = %mac_address, "device not registered; attendance not recorded");
            ReconcileOutcome::NotRegistered
        } else {
            store.update_record(&mac_address, observed_date, None)?;
            info!(mac = %mac_address, date = %observed_date, "attendance marked");
            ReconcileOutcome::Updated
        };

        Ok(Reconciliation {
            mac_address,
            date: observed_date,
            outcome,
        })
    }
}
