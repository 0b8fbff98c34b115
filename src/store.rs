//! Local store: one SQLite table holding one JSON document per logical
//! collection, plus the change-notification bus.
//!
//! Every read decodes through the migration shims in [`crate::migrate`];
//! every save is a full-document overwrite followed by exactly one
//! payload-less change notification. Reads hand out fresh deserialized
//! copies; nothing shares mutable state with callers.

use std::path::Path;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use serde_json::Value;
use tracing::debug;

use crate::migrate;
use crate::model::{
    AttendanceRecord, EmailSettings, Ficha, GradeActivity, GradeEntry, Session, Student,
};

pub mod keys {
    pub const STUDENTS: &str = "students";
    pub const FICHAS: &str = "fichas";
    pub const ATTENDANCE: &str = "attendance";
    pub const SESSIONS: &str = "sessions";
    pub const DRAFTS: &str = "drafts";
    pub const EMAIL_SETTINGS: &str = "email_settings";
    pub const PASSWORD_HASH: &str = "instructor_pwd_hash";
    pub const GRADE_ACTIVITIES: &str = "grade_activities";
    pub const GRADES: &str = "grades";
    pub const RAP_NOTES: &str = "rap_notes";
    pub const RAP_COLUMNS: &str = "rap_columns";
    pub const GRADE_OBSERVATIONS: &str = "grade_observations";
}

/// Payload-less change fan-out. Observers re-fetch whatever collections
/// they care about; the event only says "something changed".
#[derive(Default)]
pub struct ChangeBus {
    subscribers: Mutex<Vec<Sender<()>>>,
}

impl ChangeBus {
    pub fn subscribe(&self) -> Receiver<()> {
        let (tx, rx) = std::sync::mpsc::channel();
        self.subscribers.lock().expect("bus lock").push(tx);
        rx
    }

    pub fn notify(&self) {
        let mut subs = self.subscribers.lock().expect("bus lock");
        subs.retain(|tx| tx.send(()).is_ok());
    }
}

pub struct LocalStore {
    conn: Connection,
    bus: Arc<ChangeBus>,
}

impl LocalStore {
    pub fn open(workspace: &Path) -> anyhow::Result<Self> {
        Self::open_with_bus(workspace, Arc::new(ChangeBus::default()))
    }

    /// Open against a shared bus. The attendance watcher uses this to get
    /// its own connection to the same workspace while notifying the same
    /// observers.
    pub fn open_with_bus(workspace: &Path, bus: Arc<ChangeBus>) -> anyhow::Result<Self> {
        std::fs::create_dir_all(workspace)
            .with_context(|| format!("failed to create workspace {}", workspace.display()))?;
        let db_path = workspace.join("aula.sqlite3");
        let conn = Connection::open(&db_path)
            .with_context(|| format!("failed to open {}", db_path.display()))?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS collections(
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;
        Ok(LocalStore { conn, bus })
    }

    pub fn bus(&self) -> Arc<ChangeBus> {
        Arc::clone(&self.bus)
    }

    pub fn notify_changed(&self) {
        self.bus.notify();
    }

    fn read_slot(&self, key: &str) -> anyhow::Result<Option<Value>> {
        let raw: Option<String> = self
            .conn
            .query_row("SELECT value FROM collections WHERE key = ?", [key], |r| {
                r.get(0)
            })
            .optional()?;
        match raw {
            // Corrupt JSON is not defensively swallowed here: it means the
            // slot needs manual recovery, so the parse error propagates.
            Some(text) => Ok(Some(
                serde_json::from_str(&text).with_context(|| format!("slot {} is corrupt", key))?,
            )),
            None => Ok(None),
        }
    }

    /// Write without notifying. Used by read-path heals and the backup
    /// importer, which fires a single notification at the end.
    pub(crate) fn write_slot_silent(&self, key: &str, value: &Value) -> anyhow::Result<()> {
        let text = serde_json::to_string(value)?;
        self.conn.execute(
            "INSERT INTO collections(key, value) VALUES(?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            (key, text),
        )?;
        Ok(())
    }

    fn write_slot(&self, key: &str, value: &Value) -> anyhow::Result<()> {
        self.write_slot_silent(key, value)?;
        debug!(slot = key, "collection saved");
        self.bus.notify();
        Ok(())
    }

    // Opaque slots (drafts, RAP notes/columns, observations).

    pub fn get_raw(&self, key: &str) -> anyhow::Result<Value> {
        Ok(self.read_slot(key)?.unwrap_or(Value::Null))
    }

    pub fn put_raw(&self, key: &str, value: &Value) -> anyhow::Result<()> {
        self.write_slot(key, value)
    }

    // Students.

    pub fn students(&self) -> anyhow::Result<Vec<Student>> {
        match self.read_slot(keys::STUDENTS)? {
            Some(v) => migrate::students_from_value(v),
            None => Ok(Vec::new()),
        }
    }

    pub fn save_students(&self, students: &[Student]) -> anyhow::Result<()> {
        self.write_slot(keys::STUDENTS, &serde_json::to_value(students)?)
    }

    // Fichas.

    pub fn fichas(&self) -> anyhow::Result<Vec<Ficha>> {
        match self.read_slot(keys::FICHAS)? {
            Some(v) => migrate::fichas_from_value(v),
            None => Ok(Vec::new()),
        }
    }

    pub fn save_fichas(&self, fichas: &[Ficha]) -> anyhow::Result<()> {
        self.write_slot(keys::FICHAS, &serde_json::to_value(fichas)?)
    }

    // Sessions. A read can cause one write, to heal records that were
    // persisted without an id.

    pub fn sessions(&self) -> anyhow::Result<Vec<Session>> {
        let Some(v) = self.read_slot(keys::SESSIONS)? else {
            return Ok(Vec::new());
        };
        let (sessions, repaired) = migrate::sessions_from_value(v)?;
        if repaired {
            debug!("healed sessions missing ids");
            self.write_slot_silent(keys::SESSIONS, &serde_json::to_value(&sessions)?)?;
        }
        Ok(sessions)
    }

    pub fn save_sessions(&self, sessions: &[Session]) -> anyhow::Result<()> {
        self.write_slot(keys::SESSIONS, &serde_json::to_value(sessions)?)
    }

    // Attendance.

    pub fn attendance(&self) -> anyhow::Result<Vec<AttendanceRecord>> {
        match self.read_slot(keys::ATTENDANCE)? {
            Some(v) => migrate::attendance_from_value(v),
            None => Ok(Vec::new()),
        }
    }

    pub fn save_attendance(&self, records: &[AttendanceRecord]) -> anyhow::Result<()> {
        self.write_slot(keys::ATTENDANCE, &serde_json::to_value(records)?)
    }

    // Grade activities. Rewritten on read only when a record's phase
    // actually changed, to avoid needless writes.

    pub fn grade_activities(&self) -> anyhow::Result<Vec<GradeActivity>> {
        let Some(v) = self.read_slot(keys::GRADE_ACTIVITIES)? else {
            return Ok(Vec::new());
        };
        let (activities, changed) = migrate::grade_activities_from_value(v)?;
        if changed {
            self.write_slot_silent(keys::GRADE_ACTIVITIES, &serde_json::to_value(&activities)?)?;
        }
        Ok(activities)
    }

    pub fn save_grade_activities(&self, activities: &[GradeActivity]) -> anyhow::Result<()> {
        self.write_slot(keys::GRADE_ACTIVITIES, &serde_json::to_value(activities)?)
    }

    // Grade entries.

    pub fn grades(&self) -> anyhow::Result<Vec<GradeEntry>> {
        match self.read_slot(keys::GRADES)? {
            Some(v) => migrate::grades_from_value(v),
            None => Ok(Vec::new()),
        }
    }

    pub fn save_grades(&self, grades: &[GradeEntry]) -> anyhow::Result<()> {
        self.write_slot(keys::GRADES, &serde_json::to_value(grades)?)
    }

    // Singletons.

    pub fn email_settings(&self) -> anyhow::Result<EmailSettings> {
        match self.read_slot(keys::EMAIL_SETTINGS)? {
            Some(v) => Ok(serde_json::from_value(v).context("email settings are corrupt")?),
            None => Ok(EmailSettings::default()),
        }
    }

    pub fn save_email_settings(&self, settings: &EmailSettings) -> anyhow::Result<()> {
        self.write_slot(keys::EMAIL_SETTINGS, &serde_json::to_value(settings)?)
    }

    pub fn password_hash(&self) -> anyhow::Result<Option<String>> {
        match self.read_slot(keys::PASSWORD_HASH)? {
            Some(Value::String(s)) if !s.is_empty() => Ok(Some(s)),
            _ => Ok(None),
        }
    }

    pub fn save_password_hash(&self, hash: &str) -> anyhow::Result<()> {
        self.write_slot(keys::PASSWORD_HASH, &Value::String(hash.to_string()))
    }
}
