pub const CREATE_DEVICE_ATTENDANCE: &str = r#"
CREATE TABLE IF NOT EXISTS device_attendance (
  id                INTEGER PRIMARY KEY AUTOINCREMENT,
  mac_address       TEXT NOT NULL UNIQUE,
  enrollment_number TEXT NOT NULL,
  last_seen_date    TEXT NOT NULL,
  present           INTEGER NOT NULL DEFAULT 1,
  created_at        TEXT NOT NULL
);
"#;

pub const CREATE_PRESENCE_LOG: &str = r#"
CREATE TABLE IF NOT EXISTS presence_log (
  id          INTEGER PRIMARY KEY AUTOINCREMENT,
  mac_address TEXT NOT NULL,
  date        TEXT NOT NULL,
  present     INTEGER NOT NULL DEFAULT 1,
  UNIQUE (mac_address, date)
);
"#;

pub const INDEX_PRESENCE_LOG_DATE: &str =
    "CREATE INDEX IF NOT EXISTS idx_presence_log_date ON presence_log(date);";

pub const SELECT_RECORD_BY_MAC: &str = "SELECT mac_address, enrollment_number, last_seen_date, present, created_at
     FROM device_attendance
     WHERE mac_address = ?1";

pub const INSERT_RECORD: &str = "INSERT INTO device_attendance (mac_address, enrollment_number, last_seen_date, present, created_at)
     VALUES (?1, ?2, ?3, 1, ?3)";

pub const UPDATE_LAST_SEEN: &str =
    "UPDATE device_attendance SET last_seen_date = ?1, present = 1 WHERE mac_address = ?2";

pub const UPDATE_LAST_SEEN_AND_IDENTIFIER: &str = "UPDATE device_attendance SET last_seen_date = ?1, present = 1, enrollment_number = ?2
     WHERE mac_address = ?3";

pub const MARK_PRESENT: &str = "INSERT INTO presence_log (mac_address, date, present) VALUES (?1, ?2, 1)
     ON CONFLICT(mac_address, date) DO UPDATE SET present = 1";

pub fn schema_statements() -> Vec<&'static str> {
    vec![
        CREATE_DEVICE_ATTENDANCE,
        CREATE_PRESENCE_LOG,
        INDEX_PRESENCE_LOG_DATE,
    ]
}
