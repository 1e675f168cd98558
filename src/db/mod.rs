pub mod queries;

use crate::attendance::{AttendanceRecord, AttendanceStore};
use crate::error::StoreError;
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Serialize)]
pub struct PresenceRow {
    pub mac_address: String,
    pub enrollment_number: String,
    pub date: NaiveDate,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            endpoint: path.display().to_string(),
            source,
        })?;

        let database = Self { conn };
        database.init_schema().map_err(|source| StoreError::Open {
            endpoint: path.display().to_string(),
            source,
        })?;
        debug!(endpoint = %path.display(), "attendance store opened");

        Ok(database)
    }

    fn init_schema(&self) -> rusqlite::Result<()> {
        queries::schema_statements()
            .iter()
            .try_for_each(|statement| self.conn.execute(statement, []).map(|_| ()))
    }

    pub fn list_records(&self) -> Result<Vec<AttendanceRecord>, StoreError> {
        let mut statement = self
            .conn
            .prepare(
                "SELECT mac_address, enrollment_number, last_seen_date, present, created_at
                 FROM device_attendance
                 ORDER BY enrollment_number ASC, mac_address ASC",
            )
            .map_err(|error| StoreError::from_query("list records", error))?;

        let rows = statement
            .query_map([], record_from_row)
            .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
            .map_err(|error| StoreError::from_query("list records", error))?;

        Ok(rows)
    }

    pub fn presence_for_date(&self, date: NaiveDate) -> Result<Vec<PresenceRow>, StoreError> {
        let mut statement = self
            .conn
            .prepare(
                "SELECT log.mac_address, device.enrollment_number, log.date
                 FROM presence_log AS log
                 JOIN device_attendance AS device ON device.mac_address = log.mac_address
                 WHERE log.date = ?1 AND log.present = 1
                 ORDER BY device.enrollment_number ASC, log.mac_address ASC",
            )
            .map_err(|error| StoreError::from_query("presence for date", error))?;

        let rows = statement
            .query_map(params![date], |row| {
                Ok(PresenceRow {
                    mac_address: row.get(0)?,
                    enrollment_number: row.get(1)?,
                    date: row.get(2)?,
                })
            })
            .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
            .map_err(|error| StoreError::from_query("presence for date", error))?;

        Ok(rows)
    }

    pub fn count_records(&self) -> Result<usize, StoreError> {
        self.conn
            .query_row("SELECT COUNT(*) FROM device_attendance", [], |row| {
                row.get::<_, i64>(0)
            })
            .map(|count| count as usize)
            .map_err(|error| StoreError::from_query("count records", error))
    }

    pub fn count_present_on(&self, date: NaiveDate) -> Result<usize, StoreError> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM presence_log WHERE date = ?1 AND present = 1",
                params![date],
                |row| row.get::<_, i64>(0),
            )
            .map(|count| count as usize)
            .map_err(|error| StoreError::from_query("count present", error))
    }

    pub fn latest_seen_date(&self) -> Result<Option<NaiveDate>, StoreError> {
        self.conn
            .query_row(
                "SELECT MAX(last_seen_date) FROM device_attendance",
                [],
                |row| row.get::<_, Option<NaiveDate>>(0),
            )
            .optional()
            .map(Option::flatten)
            .map_err(|error| StoreError::from_query("latest seen date", error))
    }

    #[cfg(test)]
    pub(crate) fn execute_raw(&self, sql: &str) -> rusqlite::Result<usize> {
        self.conn.execute(sql, [])
    }
}

impl AttendanceStore for Database {
    fn find_by_mac(&self, mac_address: &str) -> Result<Vec<AttendanceRecord>, StoreError> {
        let mut statement = self
            .conn
            .prepare(queries::SELECT_RECORD_BY_MAC)
            .map_err(|error| StoreError::from_query("lookup", error))?;

        let rows = statement
            .query_map(params![mac_address], record_from_row)
            .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
            .map_err(|error| StoreError::from_query("lookup", error))?;

        Ok(rows)
    }

    fn insert_record(
        &mut self,
        identifier: &str,
        mac_address: &str,
        date: NaiveDate,
    ) -> Result<(), StoreError> {
        let transaction = self.conn.transaction().map_err(StoreError::Transaction)?;

        transaction
            .execute(queries::INSERT_RECORD, params![mac_address, identifier, date])
            .map_err(|error| StoreError::from_query("insert", error))?;
        transaction
            .execute(queries::MARK_PRESENT, params![mac_address, date])
            .map_err(|error| StoreError::from_query("mark present", error))?;

        transaction.commit().map_err(StoreError::Transaction)
    }

    fn update_record(
        &mut self,
        mac_address: &str,
        date: NaiveDate,
        identifier: Option<&str>,
    ) -> Result<usize, StoreError> {
        let transaction = self.conn.transaction().map_err(StoreError::Transaction)?;

        let updated = match identifier {
            Some(identifier) => transaction.execute(
                queries::UPDATE_LAST_SEEN_AND_IDENTIFIER,
                params![date, identifier, mac_address],
            ),
            None => transaction.execute(queries::UPDATE_LAST_SEEN, params![date, mac_address]),
        }
        .map_err(|error| StoreError::from_query("update", error))?;

        transaction
            .execute(queries::MARK_PRESENT, params![mac_address, date])
            .map_err(|error| StoreError::from_query("mark present", error))?;

        transaction.commit().map_err(StoreError::Transaction)?;
        Ok(updated)
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<AttendanceRecord> {
    Ok(AttendanceRecord {
        mac_address: row.get(0)?,
        enrollment_number: row.get(1)?,
        last_seen_date: row.get(2)?,
        present: row.get(3)?,
        created_at: row.get(4)?,
    })
}
