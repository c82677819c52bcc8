// src/repository/memory.rs

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    error::AppError,
    models::{
        exam::Exam,
        session::{Session, SessionKey},
        submission::{AnswerChange, Submission},
    },
    repository::{EnrollmentCheck, ExamCatalog, SessionStore, SubmissionLedger},
};

/// Process-local storage backing every trait. Used by the tests and when the
/// service runs without `DATABASE_URL`.
#[derive(Default)]
pub struct InMemoryStore {
    exams: RwLock<HashMap<i64, Exam>>,
    /// (student_id, class_id)
    enrollments: RwLock<HashSet<(i64, i64)>>,
    sessions: RwLock<HashMap<SessionKey, Session>>,
    submissions: RwLock<HashMap<(SessionKey, i64), Submission>>,
    next_submission_id: AtomicI64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the catalog. Questions are expected in canonical order (see `Exam::new`).
    pub async fn add_exam(&self, exam: Exam) {
        self.exams.write().await.insert(exam.id, exam);
    }

    pub async fn enroll(&self, student_id: i64, class_id: i64) {
        self.enrollments.write().await.insert((student_id, class_id));
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn submission_count(&self) -> usize {
        self.submissions.read().await.len()
    }
}

#[async_trait]
impl ExamCatalog for InMemoryStore {
    async fn find_exam(&self, exam_id: i64) -> Result<Option<Exam>, AppError> {
        Ok(self.exams.read().await.get(&exam_id).cloned())
    }
}

#[async_trait]
impl EnrollmentCheck for InMemoryStore {
    async fn is_enrolled(&self, student_id: i64, class_id: i64) -> Result<bool, AppError> {
        Ok(self.enrollments.read().await.contains(&(student_id, class_id)))
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn find(&self, key: SessionKey) -> Result<Option<Session>, AppError> {
        Ok(self.sessions.read().await.get(&key).cloned())
    }

    async fn insert(&self, session: &Session) -> Result<Session, AppError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.key) {
            return Err(AppError::Conflict(format!("Session for {} already exists", session.key)));
        }
        sessions.insert(session.key, session.clone());
        Ok(session.clone())
    }

    async fn save(&self, session: &Session) -> Result<Session, AppError> {
        let mut sessions = self.sessions.write().await;
        bump_version(&mut sessions, session)
    }

    async fn save_with_answer(
        &self,
        session: &Session,
        question_id: i64,
        change: &AnswerChange,
    ) -> Result<Session, AppError> {
        // Sessions before submissions, always.
        let mut sessions = self.sessions.write().await;
        let mut submissions = self.submissions.write().await;
        let saved = bump_version(&mut sessions, session)?;

        let key = session.key;
        match change {
            AnswerChange::Set { answer, is_correct } => {
                submissions
                    .entry((key, question_id))
                    .and_modify(|s| {
                        s.answer = answer.clone();
                        s.is_correct = *is_correct;
                    })
                    .or_insert_with(|| Submission {
                        id: self.next_submission_id.fetch_add(1, Ordering::Relaxed) + 1,
                        session: key,
                        question_id,
                        answer: answer.clone(),
                        is_correct: *is_correct,
                    });
            }
            AnswerChange::Clear => {
                submissions.remove(&(key, question_id));
            }
        }
        Ok(saved)
    }

    async fn list_by_exam(&self, exam_id: i64) -> Result<Vec<Session>, AppError> {
        let mut sessions: Vec<Session> = self
            .sessions
            .read()
            .await
            .values()
            .filter(|s| s.key.exam_id == exam_id)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.key.student_id);
        Ok(sessions)
    }
}

#[async_trait]
impl SubmissionLedger for InMemoryStore {
    async fn list(&self, key: SessionKey) -> Result<Vec<Submission>, AppError> {
        let mut list: Vec<Submission> = self
            .submissions
            .read()
            .await
            .values()
            .filter(|s| s.session == key)
            .cloned()
            .collect();
        list.sort_by_key(|s| s.id);
        Ok(list)
    }
}

/// Version check shared by both save paths. Stores and returns the bumped copy.
fn bump_version(
    sessions: &mut HashMap<SessionKey, Session>,
    session: &Session,
) -> Result<Session, AppError> {
    let stored = sessions
        .get_mut(&session.key)
        .ok_or_else(|| AppError::NotFound(format!("Session for {} not found", session.key)))?;

    if stored.version != session.version {
        return Err(AppError::Conflict(format!(
            "Session for {} was modified concurrently",
            session.key
        )));
    }

    let mut updated = session.clone();
    updated.version += 1;
    *stored = updated.clone();
    Ok(updated)
}
