//! Mutators and the cross-collection cascade rules.
//!
//! Every mutator reads the full collection, applies the change in memory,
//! saves the full collection (which fires the change notification), and
//! then hands just the changed records to the sync queue. Cascades favor
//! local responsiveness and keep ambiguous records rather than delete
//! them; the ficha delete is the one all-or-nothing exception.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use tracing::warn;

use crate::hashing;
use crate::model::{
    letter_for, new_id, AttendanceRecord, Ficha, GradeActivity, GradeEntry, Session, Student,
    ALL_GROUPS, DEFAULT_PHASE,
};
use crate::store::LocalStore;
use crate::sync::{SyncClient, SyncJob};

pub struct AppService {
    pub store: LocalStore,
    pub sync: Arc<SyncClient>,
}

impl AppService {
    pub fn new(store: LocalStore, sync: Arc<SyncClient>) -> Self {
        AppService { store, sync }
    }

    // Students.

    pub fn add_student(&self, mut student: Student) -> anyhow::Result<Student> {
        if student.id.trim().is_empty() {
            student.id = new_id();
        }
        let mut students = self.store.students()?;
        students.push(student.clone());
        self.store.save_students(&students)?;
        self.sync.enqueue(SyncJob::PushStudents(vec![student.clone()]));
        Ok(student)
    }

    pub fn bulk_add_students(&self, new_students: Vec<Student>) -> anyhow::Result<usize> {
        let mut added = Vec::with_capacity(new_students.len());
        for mut s in new_students {
            if s.id.trim().is_empty() {
                s.id = new_id();
            }
            added.push(s);
        }
        let mut students = self.store.students()?;
        students.extend(added.iter().cloned());
        self.store.save_students(&students)?;
        let count = added.len();
        self.sync.enqueue(SyncJob::PushStudents(added));
        Ok(count)
    }

    pub fn update_student(&self, student: Student) -> anyhow::Result<()> {
        let mut students = self.store.students()?;
        let slot = students
            .iter_mut()
            .find(|s| s.id == student.id)
            .with_context(|| format!("unknown student {}", student.id))?;
        *slot = student.clone();
        self.store.save_students(&students)?;
        self.sync.enqueue(SyncJob::PushStudents(vec![student]));
        Ok(())
    }

    /// Local removal plus a remote soft-delete. Attendance history for the
    /// student is deliberately kept.
    pub fn delete_student(&self, id: &str) -> anyhow::Result<()> {
        let mut students = self.store.students()?;
        let before = students.len();
        students.retain(|s| s.id != id);
        if students.len() == before {
            return Ok(());
        }
        self.store.save_students(&students)?;
        self.sync.enqueue(SyncJob::SoftDeleteStudent {
            student_id: id.to_string(),
        });
        Ok(())
    }

    // Fichas.

    pub fn add_ficha(&self, mut ficha: Ficha) -> anyhow::Result<Ficha> {
        if ficha.id.trim().is_empty() {
            ficha.id = new_id();
        }
        let mut fichas = self.store.fichas()?;
        fichas.push(ficha.clone());
        self.store.save_fichas(&fichas)?;
        self.sync.enqueue(SyncJob::PushFichas(vec![ficha.clone()]));
        Ok(ficha)
    }

    pub fn update_ficha(&self, ficha: Ficha) -> anyhow::Result<()> {
        let mut fichas = self.store.fichas()?;
        let slot = fichas
            .iter_mut()
            .find(|f| f.id == ficha.id)
            .with_context(|| format!("unknown ficha {}", ficha.id))?;
        *slot = ficha.clone();
        self.store.save_fichas(&fichas)?;
        self.sync.enqueue(SyncJob::PushFichas(vec![ficha]));
        Ok(())
    }

    /// All-or-nothing: the remote delete runs first and synchronously. If
    /// it fails the error propagates and the ficha, its students, and
    /// their attendance stay untouched locally.
    pub fn delete_ficha(&self, code: &str) -> anyhow::Result<()> {
        let fichas = self.store.fichas()?;
        let Some(ficha) = fichas.iter().find(|f| f.code == code) else {
            return Ok(());
        };
        self.sync.delete_ficha_now(&ficha.id)?;

        let students = self.store.students()?;
        let (removed, kept): (Vec<Student>, Vec<Student>) = students
            .into_iter()
            .partition(|s| s.group.as_deref() == Some(code));
        if !removed.is_empty() {
            let removed_ids: HashSet<&str> = removed.iter().map(|s| s.id.as_str()).collect();
            let attendance: Vec<AttendanceRecord> = self
                .store
                .attendance()?
                .into_iter()
                .filter(|a| !removed_ids.contains(a.student_id.as_str()))
                .collect();
            self.store.save_attendance(&attendance)?;
        }
        self.store.save_students(&kept)?;

        let remaining: Vec<Ficha> = fichas.into_iter().filter(|f| f.code != code).collect();
        self.store.save_fichas(&remaining)?;
        Ok(())
    }

    // Sessions.

    pub fn add_session(&self, mut session: Session) -> anyhow::Result<Session> {
        if session.id.trim().is_empty() {
            session.id = new_id();
        }
        let mut sessions = self.store.sessions()?;
        sessions.push(session.clone());
        self.store.save_sessions(&sessions)?;
        self.sync.enqueue(SyncJob::PushSessions(vec![session.clone()]));
        Ok(session)
    }

    /// The session disappears (and observers are notified) before any
    /// cascade work, to keep the UI responsive. Attendance on the session's
    /// date is then pruned: unconditionally when the session covered all
    /// fichas, by roster membership for a specific ficha, and records whose
    /// student cannot be resolved are kept (fail open). The remote delete
    /// is queued regardless of how the pruning went.
    pub fn delete_session(&self, id: &str) -> anyhow::Result<()> {
        let sessions = self.store.sessions()?;
        let deleted = sessions.iter().find(|s| s.id == id).cloned();
        let remaining: Vec<Session> = sessions.into_iter().filter(|s| s.id != id).collect();
        self.store.save_sessions(&remaining)?;

        let Some(session) = deleted else {
            return Ok(());
        };

        let attendance = self.store.attendance()?;
        let before = attendance.len();
        let kept: Vec<AttendanceRecord> = if session.group == ALL_GROUPS {
            attendance
                .into_iter()
                .filter(|a| a.date != session.date)
                .collect()
        } else {
            let members: HashSet<String> = self
                .store
                .students()?
                .into_iter()
                .filter(|s| s.group.as_deref() == Some(session.group.as_str()))
                .map(|s| s.id)
                .collect();
            attendance
                .into_iter()
                .filter(|a| a.date != session.date || !members.contains(&a.student_id))
                .collect()
        };
        if kept.len() < before {
            self.store.save_attendance(&kept)?;
        }

        self.sync.enqueue(SyncJob::DeleteSession {
            session_id: session.id,
        });
        Ok(())
    }

    // Attendance.

    /// Replace-by-composite-key: at most one record per (date, studentId).
    pub fn record_attendance(&self, record: AttendanceRecord) -> anyhow::Result<()> {
        self.bulk_record_attendance(vec![record])
    }

    pub fn bulk_record_attendance(&self, records: Vec<AttendanceRecord>) -> anyhow::Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let mut attendance = self.store.attendance()?;
        for record in &records {
            attendance
                .retain(|a| !(a.date == record.date && a.student_id == record.student_id));
            attendance.push(record.clone());
        }
        self.store.save_attendance(&attendance)?;
        self.sync.enqueue(SyncJob::PushAttendance(records));
        Ok(())
    }

    // Grade activities and entries. Grades are managed locally only; no
    // remote push and no remote cascade.

    pub fn add_grade_activity(&self, mut activity: GradeActivity) -> anyhow::Result<GradeActivity> {
        if activity.id.trim().is_empty() {
            activity.id = new_id();
        }
        if activity.phase.trim().is_empty() {
            activity.phase = DEFAULT_PHASE.to_string();
        }
        if activity.created_at.is_empty() {
            activity.created_at = Utc::now().to_rfc3339();
        }
        let mut activities = self.store.grade_activities()?;
        activities.push(activity.clone());
        self.store.save_grade_activities(&activities)?;
        Ok(activity)
    }

    pub fn update_grade_activity(&self, activity: GradeActivity) -> anyhow::Result<()> {
        let mut activities = self.store.grade_activities()?;
        let slot = activities
            .iter_mut()
            .find(|a| a.id == activity.id)
            .with_context(|| format!("unknown grade activity {}", activity.id))?;
        *slot = activity;
        self.store.save_grade_activities(&activities)
    }

    /// Removes the activity and every grade entry that pointed at it;
    /// entries for other activities are untouched.
    pub fn delete_grade_activity(&self, id: &str) -> anyhow::Result<()> {
        let mut activities = self.store.grade_activities()?;
        let before = activities.len();
        activities.retain(|a| a.id != id);
        if activities.len() == before {
            return Ok(());
        }
        self.store.save_grade_activities(&activities)?;

        let mut grades = self.store.grades()?;
        let grades_before = grades.len();
        grades.retain(|g| g.activity_id != id);
        if grades.len() < grades_before {
            self.store.save_grades(&grades)?;
        }
        Ok(())
    }

    pub fn upsert_grade(
        &self,
        student_id: &str,
        activity_id: &str,
        score: f64,
    ) -> anyhow::Result<GradeEntry> {
        let entry = GradeEntry {
            student_id: student_id.to_string(),
            activity_id: activity_id.to_string(),
            score,
            letter: letter_for(score).to_string(),
            updated_at: Utc::now().to_rfc3339(),
        };
        let mut grades = self.store.grades()?;
        grades.retain(|g| !(g.student_id == student_id && g.activity_id == activity_id));
        grades.push(entry.clone());
        self.store.save_grades(&grades)?;
        Ok(entry)
    }

    // Authentication gate.

    pub fn set_password(&self, plain: &str) -> anyhow::Result<()> {
        self.store.save_password_hash(&hashing::hash_password(plain))
    }

    /// Cloud-first lookup with local fallback and write-through. Wrong
    /// passwords return false; so does any internal failure (fail-closed).
    pub fn verify_password(&self, candidate: &str) -> bool {
        match self.verify_password_inner(candidate) {
            Ok(matched) => matched,
            Err(e) => {
                warn!(error = %e, "password verification failed internally");
                false
            }
        }
    }

    fn verify_password_inner(&self, candidate: &str) -> anyhow::Result<bool> {
        let remote = self
            .sync
            .fetch_remote_password_hash()
            .unwrap_or_else(|e| {
                warn!(error = %e, "remote password lookup unavailable; using local hash");
                None
            });
        let stored = match remote {
            Some(hash) => {
                self.store.save_password_hash(&hash)?;
                Some(hash)
            }
            None => self.store.password_hash()?,
        };
        let Some(stored) = stored else {
            return Ok(false);
        };
        Ok(hashing::matches(candidate, &stored))
    }
}
