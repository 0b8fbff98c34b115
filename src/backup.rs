//! Backup export/import: the whole local store as one versioned JSON
//! document. Purely a local-store operation; the sync client is never
//! involved.

use anyhow::bail;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::migrate;
use crate::model::EmailSettings;
use crate::store::{keys, LocalStore};

pub const BACKUP_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct AppBackup {
    pub version: u32,
    /// ISO-8601 export time.
    pub timestamp: String,
    pub data: BackupData,
}

/// Collections are `Value` so imports from older format versions decode
/// through the same migration shims as normal reads. Missing optional
/// collections default to null and import as empty.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupData {
    #[serde(default)]
    pub students: Value,
    #[serde(default)]
    pub fichas: Value,
    #[serde(default)]
    pub attendance: Value,
    #[serde(default)]
    pub sessions: Value,
    #[serde(default)]
    pub email_settings: Value,
    #[serde(default)]
    pub grade_activities: Value,
    #[serde(default)]
    pub grades: Value,
    #[serde(default)]
    pub rap_notes: Value,
    #[serde(default)]
    pub rap_columns: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub student_grade_observations: Value,
}

pub fn export_backup(store: &LocalStore) -> anyhow::Result<AppBackup> {
    Ok(AppBackup {
        version: BACKUP_VERSION,
        timestamp: Utc::now().to_rfc3339(),
        data: BackupData {
            students: serde_json::to_value(store.students()?)?,
            fichas: serde_json::to_value(store.fichas()?)?,
            attendance: serde_json::to_value(store.attendance()?)?,
            sessions: serde_json::to_value(store.sessions()?)?,
            email_settings: serde_json::to_value(store.email_settings()?)?,
            grade_activities: serde_json::to_value(store.grade_activities()?)?,
            grades: serde_json::to_value(store.grades()?)?,
            rap_notes: store.get_raw(keys::RAP_NOTES)?,
            rap_columns: store.get_raw(keys::RAP_COLUMNS)?,
            student_grade_observations: store.get_raw(keys::GRADE_OBSERVATIONS)?,
        },
    })
}

/// Overwrites every collection from the backup document. Returns false on
/// any parse/validation/apply failure instead of throwing; this is the one
/// boundary where corruption is reported, not propagated.
pub fn import_backup(store: &LocalStore, json: &str) -> bool {
    match import_inner(store, json) {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "backup import failed");
            false
        }
    }
}

fn import_inner(store: &LocalStore, json: &str) -> anyhow::Result<()> {
    let backup: AppBackup = serde_json::from_str(json)?;
    if !backup.data.students.is_array() {
        bail!("backup has no students array");
    }

    let students = migrate::students_from_value(backup.data.students)?;
    let fichas = match backup.data.fichas {
        Value::Null => Vec::new(),
        v => migrate::fichas_from_value(v)?,
    };
    let attendance = match backup.data.attendance {
        Value::Null => Vec::new(),
        v => migrate::attendance_from_value(v)?,
    };
    let sessions = match backup.data.sessions {
        Value::Null => Vec::new(),
        v => migrate::sessions_from_value(v)?.0,
    };
    let email_settings: EmailSettings = match backup.data.email_settings {
        Value::Null => EmailSettings::default(),
        v => serde_json::from_value(v)?,
    };
    let grade_activities = match backup.data.grade_activities {
        Value::Null => Vec::new(),
        v => migrate::grade_activities_from_value(v)?.0,
    };
    let grades = match backup.data.grades {
        Value::Null => Vec::new(),
        v => migrate::grades_from_value(v)?,
    };

    store.write_slot_silent(keys::STUDENTS, &serde_json::to_value(&students)?)?;
    store.write_slot_silent(keys::FICHAS, &serde_json::to_value(&fichas)?)?;
    store.write_slot_silent(keys::ATTENDANCE, &serde_json::to_value(&attendance)?)?;
    store.write_slot_silent(keys::SESSIONS, &serde_json::to_value(&sessions)?)?;
    store.write_slot_silent(keys::EMAIL_SETTINGS, &serde_json::to_value(&email_settings)?)?;
    store.write_slot_silent(
        keys::GRADE_ACTIVITIES,
        &serde_json::to_value(&grade_activities)?,
    )?;
    store.write_slot_silent(keys::GRADES, &serde_json::to_value(&grades)?)?;
    store.write_slot_silent(keys::RAP_NOTES, &backup.data.rap_notes)?;
    store.write_slot_silent(keys::RAP_COLUMNS, &backup.data.rap_columns)?;
    store.write_slot_silent(
        keys::GRADE_OBSERVATIONS,
        &backup.data.student_grade_observations,
    )?;

    // One notification for the whole restore.
    store.notify_changed();
    Ok(())
}
