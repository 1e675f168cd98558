use crate::attendance::{Reconciler, Reconciliation};
use crate::db::Database;
use crate::error::ReconcileError;
use chrono::NaiveDate;
use std::path::Path;

pub fn record_entry(
    store_endpoint: &Path,
    reconciler: &Reconciler,
    identifier: &str,
    mac_address: &str,
    observed_date: NaiveDate,
) -> Result<Reconciliation, ReconcileError> {
    let mut store = Database::open(store_endpoint)?;
    reconciler.reconcile(&mut store, identifier.trim(), mac_address, observed_date)
}

#[cfg(test)]
mod tests {
    use super::record_entry;
    use crate::attendance::{AttendanceStore, ReconcileOutcome, Reconciler, UpsertPolicy};
    use crate::db::Database;
    use chrono::NaiveDate;

    #[test]
    fn second_entry_with_new_identifier_updates_existing_device() {
        let dir = tempfile::tempdir().expect("temp dir");
        let endpoint = dir.path().join("attendance.db");
        let reconciler = Reconciler::new(UpsertPolicy::PreserveOriginalIdentifier, true);
        let date = NaiveDate::from_ymd_opt(2026, 10, 1).expect("date");

        let first = record_entry(&endpoint, &reconciler, "E100", "CC:CC:CC:CC:CC:CC", date)
            .expect("first entry");
        let second = record_entry(&endpoint, &reconciler, " E999 ", "cc:cc:cc:cc:cc:cc", date)
            .expect("second entry");

        assert_eq!(first.outcome, ReconcileOutcome::Created);
        assert_eq!(second.outcome, ReconcileOutcome::Updated);
        let store = Database::open(&endpoint).expect("store");
        let records = store.find_by_mac("CC:CC:CC:CC:CC:CC").expect("lookup");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].enrollment_number, "E100");
    }
}
