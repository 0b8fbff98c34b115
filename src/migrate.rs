//! Read-time migration shims.
//!
//! Collections written by older clients survive in three legacy shapes:
//! a combined single `name` field, snake_case keys (rows that came back
//! off the wire and were stored verbatim), and records missing fields
//! that later became mandatory. Every accessor decodes through these
//! shims so callers only ever see the canonical camelCase shape. All
//! shims are idempotent: canonical input passes through unchanged.

use anyhow::Context;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::model::{
    letter_for, new_id, AttendanceRecord, Ficha, GradeActivity, GradeEntry, Session, Student,
    StudentStatus, ALL_GROUPS, DEFAULT_PHASE,
};

fn default_true() -> bool {
    true
}

/// The closed set of shapes a stored student record can have, tried in
/// priority order. `firstName` wins over `first_name` wins over `name`.
#[derive(Deserialize)]
#[serde(untagged)]
enum StudentOnDisk {
    Canonical(Student),
    Snake(SnakeStudent),
    CombinedName(CombinedNameStudent),
}

/// Snake_case rows persisted verbatim by an old sync bug.
#[derive(Deserialize)]
struct SnakeStudent {
    id: String,
    #[serde(default)]
    document_number: Option<String>,
    first_name: String,
    #[serde(default)]
    last_name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default = "default_true")]
    active: bool,
    #[serde(default)]
    group: Option<String>,
    #[serde(default)]
    status: StudentStatus,
    #[serde(default)]
    description: Option<String>,
}

/// Oldest shape: one combined `name` field instead of first/last.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CombinedNameStudent {
    id: String,
    name: String,
    #[serde(default)]
    document_number: Option<String>,
    #[serde(default)]
    email: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default = "default_true")]
    active: bool,
    #[serde(default)]
    group: Option<String>,
    #[serde(default)]
    status: StudentStatus,
    #[serde(default)]
    description: Option<String>,
}

/// Last whitespace-delimited token becomes the surname; everything before
/// it is the given name(s). A single token yields an empty surname.
pub fn split_combined_name(name: &str) -> (String, String) {
    let trimmed = name.trim();
    match trimmed.rsplit_once(char::is_whitespace) {
        Some((first, last)) => (first.trim_end().to_string(), last.to_string()),
        None => (trimmed.to_string(), String::new()),
    }
}

impl From<StudentOnDisk> for Student {
    fn from(disk: StudentOnDisk) -> Self {
        match disk {
            StudentOnDisk::Canonical(s) => s,
            StudentOnDisk::Snake(s) => Student {
                id: s.id,
                document_number: s.document_number,
                first_name: s.first_name,
                last_name: s.last_name,
                email: s.email,
                username: s.username,
                active: s.active,
                group: s.group,
                status: s.status,
                description: s.description,
            },
            StudentOnDisk::CombinedName(s) => {
                let (first_name, last_name) = split_combined_name(&s.name);
                Student {
                    id: s.id,
                    document_number: s.document_number,
                    first_name,
                    last_name,
                    email: s.email,
                    username: s.username,
                    active: s.active,
                    group: s.group,
                    status: s.status,
                    description: s.description,
                }
            }
        }
    }
}

pub fn students_from_value(v: Value) -> anyhow::Result<Vec<Student>> {
    let rows: Vec<StudentOnDisk> =
        serde_json::from_value(v).context("students collection is corrupt")?;
    Ok(rows.into_iter().map(Student::from).collect())
}

/// First non-empty string among `keys`, in order.
fn coalesce(m: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    for k in keys {
        if let Some(s) = m.get(*k).and_then(Value::as_str) {
            if !s.trim().is_empty() {
                return Some(s.to_string());
            }
        }
    }
    None
}

fn required_str(m: &Map<String, Value>, key: &str) -> anyhow::Result<String> {
    m.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .with_context(|| format!("ficha record missing {}", key))
}

/// Ficha schedule fields survive under three historical spellings; each
/// coalesces to camelCase preferring the first non-empty source.
pub fn fichas_from_value(v: Value) -> anyhow::Result<Vec<Ficha>> {
    let rows: Vec<Map<String, Value>> =
        serde_json::from_value(v).context("fichas collection is corrupt")?;
    rows.into_iter()
        .map(|m| {
            Ok(Ficha {
                id: required_str(&m, "id")?,
                code: required_str(&m, "code")?,
                program: coalesce(&m, &["program"]).unwrap_or_default(),
                description: coalesce(&m, &["description"]),
                programa_completo: coalesce(
                    &m,
                    &["programaCompleto", "programa_completo", "nombrePrograma"],
                ),
                centro: coalesce(&m, &["centro"]),
                fecha_inicio: coalesce(&m, &["fechaInicio", "fecha_inicio"]),
                inicio_formacion: coalesce(&m, &["inicioFormacion", "inicio_formacion"]),
                fecha_fin: coalesce(&m, &["fechaFin", "fecha_fin"]),
                cronograma_url: coalesce(&m, &["cronogramaUrl", "cronograma_url"]),
            })
        })
        .collect()
}

fn all_groups() -> String {
    ALL_GROUPS.to_string()
}

#[derive(Deserialize)]
struct SessionOnDisk {
    #[serde(default)]
    id: Option<String>,
    date: String,
    #[serde(default = "all_groups")]
    group: String,
    #[serde(default)]
    description: Option<String>,
}

/// Sessions persisted without an id get a fresh one. The second element
/// reports whether any record was repaired, so the caller can persist the
/// healed collection back.
pub fn sessions_from_value(v: Value) -> anyhow::Result<(Vec<Session>, bool)> {
    let rows: Vec<SessionOnDisk> =
        serde_json::from_value(v).context("sessions collection is corrupt")?;
    let mut repaired = false;
    let sessions = rows
        .into_iter()
        .map(|s| {
            let id = match s.id.filter(|id| !id.trim().is_empty()) {
                Some(id) => id,
                None => {
                    repaired = true;
                    new_id()
                }
            };
            Session {
                id,
                date: s.date,
                group: s.group,
                description: s.description,
            }
        })
        .collect();
    Ok((sessions, repaired))
}

pub fn attendance_from_value(v: Value) -> anyhow::Result<Vec<AttendanceRecord>> {
    serde_json::from_value(v).context("attendance collection is corrupt")
}

fn default_max_score() -> f64 {
    100.0
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GradeActivityOnDisk {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(alias = "ficha_code", default)]
    ficha_code: String,
    #[serde(default)]
    phase: Option<String>,
    #[serde(default)]
    detail: Option<String>,
    #[serde(alias = "max_score", default = "default_max_score")]
    max_score: f64,
    #[serde(alias = "created_at", default)]
    created_at: String,
}

/// A missing phase defaults to [`DEFAULT_PHASE`]. The second element is
/// true only when a record actually changed, so callers can skip the
/// write-back when nothing did.
pub fn grade_activities_from_value(v: Value) -> anyhow::Result<(Vec<GradeActivity>, bool)> {
    let input_len = v.as_array().map(Vec::len).unwrap_or(0);
    let rows: Vec<GradeActivityOnDisk> =
        serde_json::from_value(v).context("grade activities collection is corrupt")?;
    let mut changed = rows.len() != input_len;
    let activities = rows
        .into_iter()
        .map(|a| {
            let phase = match a.phase.filter(|p| !p.trim().is_empty()) {
                Some(p) => p,
                None => {
                    changed = true;
                    DEFAULT_PHASE.to_string()
                }
            };
            GradeActivity {
                id: a.id,
                name: a.name,
                ficha_code: a.ficha_code,
                phase,
                detail: a.detail,
                max_score: a.max_score,
                created_at: a.created_at,
            }
        })
        .collect();
    Ok((activities, changed))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GradeEntryOnDisk {
    #[serde(alias = "student_id")]
    student_id: String,
    #[serde(alias = "activity_id")]
    activity_id: String,
    score: f64,
    #[serde(default)]
    letter: Option<String>,
    #[serde(alias = "updated_at", default)]
    updated_at: String,
}

pub fn grades_from_value(v: Value) -> anyhow::Result<Vec<GradeEntry>> {
    let rows: Vec<GradeEntryOnDisk> =
        serde_json::from_value(v).context("grades collection is corrupt")?;
    Ok(rows
        .into_iter()
        .map(|g| {
            let letter = g
                .letter
                .filter(|l| !l.is_empty())
                .unwrap_or_else(|| letter_for(g.score).to_string());
            GradeEntry {
                student_id: g.student_id,
                activity_id: g.activity_id,
                score: g.score,
                letter,
                updated_at: g.updated_at,
            }
        })
        .collect())
}
