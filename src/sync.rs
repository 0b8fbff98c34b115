//! Remote sync client.
//!
//! Writes go through an in-process job queue: mutators enqueue the changed
//! records and return immediately, a worker thread drains the queue
//! sequentially and POSTs to the per-collection write endpoints. Failures
//! are logged and swallowed — local state is authoritative. The one
//! exception is the ficha delete, which the cascade calls synchronously so
//! a remote failure can abort the whole local deletion.
//!
//! Reads pull whole tables from the queryable remote store and replace the
//! local collection wholesale. Unsynced local edits made between a push and
//! a pull are lost; that race is a known limitation, not handled here.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, Once};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::model::{AttendanceRecord, Ficha, Session, Student, StudentStatus};
use crate::store::{ChangeBus, LocalStore};

const ATTENDANCE_POLL: Duration = Duration::from_secs(20);

/// Either half may be absent; the corresponding path then degrades to a
/// warned no-op rather than an error.
#[derive(Debug, Clone, Default)]
pub struct SyncConfig {
    /// Base URL for the write endpoints (`save-students`, ...).
    pub endpoint_base: Option<String>,
    /// URL + key for the read-only remote store.
    pub store_url: Option<String>,
    pub store_key: Option<String>,
}

impl SyncConfig {
    pub fn from_env() -> Self {
        fn non_empty(name: &str) -> Option<String> {
            std::env::var(name).ok().filter(|v| !v.trim().is_empty())
        }
        SyncConfig {
            endpoint_base: non_empty("AULA_SYNC_URL"),
            store_url: non_empty("AULA_STORE_URL"),
            store_key: non_empty("AULA_STORE_KEY"),
        }
    }
}

// Wire shapes: the remote store speaks snake_case.

#[derive(Serialize, Deserialize)]
struct WireStudent {
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
    active: bool,
    #[serde(default)]
    group: Option<String>,
    #[serde(default)]
    status: StudentStatus,
    #[serde(default)]
    description: Option<String>,
}

impl From<&Student> for WireStudent {
    fn from(s: &Student) -> Self {
        WireStudent {
            id: s.id.clone(),
            document_number: s.document_number.clone(),
            first_name: s.first_name.clone(),
            last_name: s.last_name.clone(),
            email: s.email.clone(),
            username: s.username.clone(),
            active: s.active,
            group: s.group.clone(),
            status: s.status,
            description: s.description.clone(),
        }
    }
}

impl From<WireStudent> for Student {
    fn from(w: WireStudent) -> Self {
        Student {
            id: w.id,
            document_number: w.document_number,
            first_name: w.first_name,
            last_name: w.last_name,
            email: w.email,
            username: w.username,
            active: w.active,
            group: w.group,
            status: w.status,
            description: w.description,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct WireFicha {
    id: String,
    code: String,
    #[serde(default)]
    program: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    programa_completo: Option<String>,
    #[serde(default)]
    centro: Option<String>,
    #[serde(default)]
    fecha_inicio: Option<String>,
    #[serde(default)]
    inicio_formacion: Option<String>,
    #[serde(default)]
    fecha_fin: Option<String>,
    #[serde(default)]
    cronograma_url: Option<String>,
}

impl From<&Ficha> for WireFicha {
    fn from(f: &Ficha) -> Self {
        WireFicha {
            id: f.id.clone(),
            code: f.code.clone(),
            program: f.program.clone(),
            description: f.description.clone(),
            programa_completo: f.programa_completo.clone(),
            centro: f.centro.clone(),
            fecha_inicio: f.fecha_inicio.clone(),
            inicio_formacion: f.inicio_formacion.clone(),
            fecha_fin: f.fecha_fin.clone(),
            cronograma_url: f.cronograma_url.clone(),
        }
    }
}

impl From<WireFicha> for Ficha {
    fn from(w: WireFicha) -> Self {
        Ficha {
            id: w.id,
            code: w.code,
            program: w.program,
            description: w.description,
            programa_completo: w.programa_completo,
            centro: w.centro,
            fecha_inicio: w.fecha_inicio,
            inicio_formacion: w.inicio_formacion,
            fecha_fin: w.fecha_fin,
            cronograma_url: w.cronograma_url,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct WireAttendance {
    date: String,
    student_id: String,
    present: bool,
}

impl From<&AttendanceRecord> for WireAttendance {
    fn from(a: &AttendanceRecord) -> Self {
        WireAttendance {
            date: a.date.clone(),
            student_id: a.student_id.clone(),
            present: a.present,
        }
    }
}

impl From<WireAttendance> for AttendanceRecord {
    fn from(w: WireAttendance) -> Self {
        AttendanceRecord {
            date: w.date,
            student_id: w.student_id,
            present: w.present,
        }
    }
}

pub enum SyncJob {
    PushStudents(Vec<Student>),
    PushFichas(Vec<Ficha>),
    PushSessions(Vec<Session>),
    PushAttendance(Vec<AttendanceRecord>),
    DeleteSession { session_id: String },
    SoftDeleteStudent { student_id: String },
}

impl SyncJob {
    fn label(&self) -> &'static str {
        match self {
            SyncJob::PushStudents(_) => "save-students",
            SyncJob::PushFichas(_) => "save-fichas",
            SyncJob::PushSessions(_) => "save-sessions",
            SyncJob::PushAttendance(_) => "save-attendance",
            SyncJob::DeleteSession { .. } => "delete-session",
            SyncJob::SoftDeleteStudent { .. } => "soft-delete-student",
        }
    }
}

/// Owns the HTTP client and the write-endpoint configuration; shared by
/// the queue worker and the synchronous ficha-delete path.
struct Pusher {
    cfg: SyncConfig,
    http: reqwest::blocking::Client,
    disabled_warn: Once,
}

impl Pusher {
    fn post(&self, path: &str, body: &Value) -> anyhow::Result<()> {
        let Some(base) = self.cfg.endpoint_base.as_deref() else {
            self.disabled_warn
                .call_once(|| warn!("cloud sync disabled: no write endpoint configured"));
            return Ok(());
        };
        let url = format!("{}/{}", base.trim_end_matches('/'), path);
        let resp = self
            .http
            .post(&url)
            .json(body)
            .send()
            .with_context(|| format!("POST {} failed", path))?;
        if resp.status().is_success() {
            debug!(endpoint = path, "cloud push ok");
            return Ok(());
        }
        let status = resp.status();
        let text = resp.text().unwrap_or_default();
        let message = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|v| {
                v.get("error")
                    .or_else(|| v.get("message"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| {
                if text.trim().is_empty() {
                    status.to_string()
                } else {
                    text
                }
            });
        bail!("{}: {}", path, message)
    }

    fn run(&self, job: SyncJob) -> anyhow::Result<()> {
        match job {
            SyncJob::PushStudents(students) => {
                if students.is_empty() {
                    return Ok(());
                }
                let wire: Vec<WireStudent> = students.iter().map(WireStudent::from).collect();
                self.post("save-students", &json!({ "students": wire }))
            }
            SyncJob::PushFichas(fichas) => {
                if fichas.is_empty() {
                    return Ok(());
                }
                let wire: Vec<WireFicha> = fichas.iter().map(WireFicha::from).collect();
                self.post("save-fichas", &json!({ "fichas": wire }))
            }
            SyncJob::PushSessions(sessions) => {
                if sessions.is_empty() {
                    return Ok(());
                }
                self.post("save-sessions", &json!({ "sessions": sessions }))
            }
            SyncJob::PushAttendance(records) => {
                if records.is_empty() {
                    return Ok(());
                }
                let wire: Vec<WireAttendance> = records.iter().map(WireAttendance::from).collect();
                self.post("save-attendance", &json!({ "records": wire }))
            }
            SyncJob::DeleteSession { session_id } => {
                self.post("delete-session", &json!({ "sessionId": session_id }))
            }
            SyncJob::SoftDeleteStudent { student_id } => {
                self.post("soft-delete-student", &json!({ "studentId": student_id }))
            }
        }
    }
}

/// Explicitly constructed once at process start and handed by reference to
/// whoever needs it; there is no lazily-initialized global.
pub struct SyncClient {
    pusher: Arc<Pusher>,
    tx: Sender<SyncJob>,
    watcher_started: Mutex<bool>,
}

impl SyncClient {
    pub fn new(cfg: SyncConfig) -> Self {
        let pusher = Arc::new(Pusher {
            cfg,
            http: reqwest::blocking::Client::new(),
            disabled_warn: Once::new(),
        });
        let (tx, rx) = mpsc::channel::<SyncJob>();
        let worker = Arc::clone(&pusher);
        thread::spawn(move || {
            // Jobs run sequentially; batch sizes are classroom-scale.
            for job in rx {
                let label = job.label();
                if let Err(e) = worker.run(job) {
                    warn!(job = label, error = %e, "cloud push failed");
                }
            }
        });
        SyncClient {
            pusher,
            tx,
            watcher_started: Mutex::new(false),
        }
    }

    /// Hand a mutation off to the queue and return immediately. The local
    /// write is already durable by the time this is called.
    pub fn enqueue(&self, job: SyncJob) {
        if self.tx.send(job).is_err() {
            warn!("sync worker is gone; dropping push");
        }
    }

    /// Synchronous remote delete for the ficha cascade. Unlike every other
    /// push this propagates failure, so the caller can abort the cascade.
    pub fn delete_ficha_now(&self, ficha_id: &str) -> anyhow::Result<()> {
        self.pusher
            .post("delete-ficha", &json!({ "fichaId": ficha_id }))
    }

    // Read path.

    /// GET rows from the remote store. `Ok(None)` means the read client is
    /// not configured.
    fn fetch_rows(&self, table: &str, query: &str) -> anyhow::Result<Option<Vec<Value>>> {
        let (Some(url), Some(key)) = (
            self.pusher.cfg.store_url.as_deref(),
            self.pusher.cfg.store_key.as_deref(),
        ) else {
            return Ok(None);
        };
        let full = format!("{}/rest/v1/{}?{}", url.trim_end_matches('/'), table, query);
        let resp = self
            .pusher
            .http
            .get(&full)
            .header("apikey", key)
            .header("Authorization", format!("Bearer {}", key))
            .send()
            .with_context(|| format!("GET {} failed", table))?;
        if !resp.status().is_success() {
            bail!("{}: {}", table, resp.status());
        }
        let rows: Vec<Value> = resp
            .json()
            .with_context(|| format!("{}: invalid response body", table))?;
        Ok(Some(rows))
    }

    /// Pull every synced collection and replace the local copies wholesale.
    pub fn pull_all(&self, store: &LocalStore) -> anyhow::Result<()> {
        if let Some(rows) = self.fetch_rows("fichas", "select=*")? {
            let fichas: Vec<Ficha> = decode_rows::<WireFicha>(rows, "fichas")?
                .into_iter()
                .map(Ficha::from)
                .collect();
            store.save_fichas(&fichas)?;
        }
        if let Some(rows) = self.fetch_rows("sessions", "select=*")? {
            let sessions: Vec<Session> = decode_rows(rows, "sessions")?;
            store.save_sessions(&sessions)?;
        }
        if let Some(rows) = self.fetch_rows("students", "select=*&active=eq.true")? {
            let students: Vec<Student> = decode_rows::<WireStudent>(rows, "students")?
                .into_iter()
                .map(Student::from)
                .collect();
            store.save_students(&students)?;
        }
        self.pull_attendance(store)?;
        Ok(())
    }

    /// Single-collection pull used by the attendance watcher.
    pub fn pull_attendance(&self, store: &LocalStore) -> anyhow::Result<()> {
        if let Some(rows) = self.fetch_rows("attendance", "select=*")? {
            let records: Vec<AttendanceRecord> = decode_rows::<WireAttendance>(rows, "attendance")?
                .into_iter()
                .map(AttendanceRecord::from)
                .collect();
            store.save_attendance(&records)?;
        }
        Ok(())
    }

    /// Stored instructor hash from the remote settings table, or `None`
    /// when unconfigured or absent.
    pub fn fetch_remote_password_hash(&self) -> anyhow::Result<Option<String>> {
        let rows = self.fetch_rows("app_settings", "select=value&key=eq.instructor_pwd_hash")?;
        Ok(rows.and_then(|rows| {
            rows.first()
                .and_then(|r| r.get("value"))
                .and_then(Value::as_str)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        }))
    }

    /// Start the attendance watcher: a long-lived poller that re-runs the
    /// attendance-only pull against its own store handle. Started at most
    /// once; repeat calls are no-ops. Never torn down.
    pub fn watch_attendance(self: Arc<Self>, workspace: &Path, bus: Arc<ChangeBus>) {
        if self.pusher.cfg.store_url.is_none() || self.pusher.cfg.store_key.is_none() {
            warn!("attendance watcher disabled: no remote store configured");
            return;
        }
        {
            let mut started = self.watcher_started.lock().expect("watcher lock");
            if *started {
                return;
            }
            *started = true;
        }

        let client = self;
        let workspace: PathBuf = workspace.to_path_buf();
        thread::spawn(move || {
            let store = match LocalStore::open_with_bus(&workspace, bus) {
                Ok(s) => s,
                Err(e) => {
                    warn!(error = %e, "attendance watcher could not open store");
                    return;
                }
            };
            loop {
                thread::sleep(ATTENDANCE_POLL);
                if let Err(e) = client.pull_attendance(&store) {
                    warn!(error = %e, "attendance pull failed");
                }
            }
        });
    }
}

fn decode_rows<T: serde::de::DeserializeOwned>(
    rows: Vec<Value>,
    table: &str,
) -> anyhow::Result<Vec<T>> {
    rows.into_iter()
        .map(|r| {
            serde_json::from_value(r).with_context(|| format!("{}: unexpected row shape", table))
        })
        .collect()
}
