use serde::{Deserialize, Serialize};

/// Sentinel value for `Session.group` meaning the session applies to every
/// ficha, not one specific cohort.
pub const ALL_GROUPS: &str = "Todas";

/// Phase assigned to grade activities persisted before phases existed.
pub const DEFAULT_PHASE: &str = "Ejecución";

/// Minimum score that earns the passing letter.
pub const PASS_THRESHOLD: f64 = 70.0;

pub fn letter_for(score: f64) -> &'static str {
    if score >= PASS_THRESHOLD {
        "A"
    } else {
        "D"
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudentStatus {
    #[default]
    InTraining,
    Cancelled,
    VoluntaryWithdrawal,
    DroppedOut,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_number: Option<String>,
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    /// Ficha code, matched by value against `Ficha.code`. Not a foreign key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default)]
    pub status: StudentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ficha {
    pub id: String,
    /// Human-readable key; `Student.group` and `Session.group` join on it.
    pub code: String,
    #[serde(default)]
    pub program: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub programa_completo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub centro: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fecha_inicio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inicio_formacion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fecha_fin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cronograma_url: Option<String>,
}

/// An authorized attendance-taking day for one ficha (or all of them).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    /// Calendar day, `YYYY-MM-DD`.
    pub date: String,
    pub group: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// At most one record per (date, studentId); upserts replace by that pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub date: String,
    #[serde(alias = "student_id")]
    pub student_id: String,
    pub present: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeActivity {
    pub id: String,
    pub name: String,
    pub ficha_code: String,
    pub phase: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub max_score: f64,
    pub created_at: String,
}

/// Keyed by (studentId, activityId); upserts replace by that pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeEntry {
    pub student_id: String,
    pub activity_id: String,
    pub score: f64,
    pub letter: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailSettings {
    #[serde(default)]
    pub recipient: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_prefix: Option<String>,
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
