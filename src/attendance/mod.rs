pub mod mac;
pub mod reconciler;

use crate::error::StoreError;
use anyhow::{Result, bail};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use reconciler::{Reconciler, Reconciliation};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendanceRecord {
    pub mac_address: String,
    pub enrollment_number: String,
    pub last_seen_date: NaiveDate,
    pub present: bool,
    pub created_at: NaiveDate,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertPolicy {
    #[default]
    PreserveOriginalIdentifier,
    OverwriteIdentifier,
}

impl UpsertPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PreserveOriginalIdentifier => "preserve_original_identifier",
            Self::OverwriteIdentifier => "overwrite_identifier",
        }
    }
}

impl fmt::Display for UpsertPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpsertPolicy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim() {
            "preserve_original_identifier" | "preserve" => Ok(Self::PreserveOriginalIdentifier),
            "overwrite_identifier" | "overwrite" => Ok(Self::OverwriteIdentifier),
            other => bail!(
                "Unsupported upsert policy: {other}. Use preserve_original_identifier or overwrite_identifier"
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOutcome {
    Created,
    Updated,
    /// A scan saw a device nobody has registered yet; nothing was written.
    NotRegistered,
}

pub trait AttendanceStore {
    fn find_by_mac(&self, mac_address: &str) -> Result<Vec<AttendanceRecord>, StoreError>;

    fn insert_record(
        &mut self,
        identifier: &str,
        mac_address: &str,
        date: NaiveDate,
    ) -> Result<(), StoreError>;

    fn update_record(
        &mut self,
        mac_address: &str,
        date: NaiveDate,
        identifier: Option<&str>,
    ) -> Result<usize, StoreError>;
}
