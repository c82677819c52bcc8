// tests/session_flow_tests.rs

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use exam_sessions::{
    error::AppError,
    models::{
        exam::{DisclosureMode, Exam},
        question::{Choice, Question, QuestionType},
        session::{SessionKey, SessionStatus},
        user::Requester,
    },
    repository::InMemoryStore,
    services::{ExamSessionService, clock::ManualClock},
};
use sqlx::types::Json;

const STUDENT: i64 = 7;
const OTHER_STUDENT: i64 = 8;
const TEACHER: i64 = 900;
const CLASS: i64 = 10;
const EXAM: i64 = 1;
const PASSWORD: &str = "secret";

struct Fixture {
    service: Arc<ExamSessionService>,
    store: Arc<InMemoryStore>,
    clock: Arc<ManualClock>,
    t0: DateTime<Utc>,
}

fn question(id: i64, question_type: QuestionType, answer: &str) -> Question {
    let choices = match question_type {
        QuestionType::Essay => vec![],
        _ => ["A", "B", "C", "D"]
            .iter()
            .map(|k| Choice {
                option_key: k.to_string(),
                option_value: format!("Option {}", k),
            })
            .collect(),
    };
    Question {
        id,
        title: format!("Question {}", id),
        question_type,
        choices: Json(choices),
        answer: answer.to_string(),
        image: None,
    }
}

fn exam(id: i64, t0: DateTime<Utc>, mode: DisclosureMode, questions: Vec<Question>) -> Exam {
    Exam::new(
        id,
        CLASS,
        format!("Exam {}", id),
        30,
        t0 - Duration::hours(1),
        t0 + Duration::hours(3),
        PASSWORD,
        mode,
        questions,
    )
}

/// Four questions, listed out of id order on purpose:
/// 101 single "A", 102 multiple "A,B", 103 essay "Paris", 104 single "C".
async fn setup(mode: DisclosureMode) -> Fixture {
    let t0 = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
    let clock = Arc::new(ManualClock::new(t0));
    let store = Arc::new(InMemoryStore::new());

    store
        .add_exam(exam(
            EXAM,
            t0,
            mode,
            vec![
                question(104, QuestionType::SingleChoice, "C"),
                question(102, QuestionType::MultipleChoice, "A,B"),
                question(101, QuestionType::SingleChoice, "A"),
                question(103, QuestionType::Essay, "Paris"),
            ],
        ))
        .await;
    store
        .add_exam(exam(2, t0, mode, vec![question(201, QuestionType::SingleChoice, "A")]))
        .await;
    store.add_exam(exam(3, t0, mode, vec![])).await;
    store.enroll(STUDENT, CLASS).await;
    store.enroll(OTHER_STUDENT, CLASS).await;

    let service = Arc::new(ExamSessionService::with_store(store.clone(), clock.clone()));
    Fixture { service, store, clock, t0 }
}

fn key() -> SessionKey {
    SessionKey::new(STUDENT, EXAM)
}

#[tokio::test]
async fn first_start_creates_one_in_progress_session() {
    let f = setup(DisclosureMode::Full).await;

    let view = f.service.start_exam(EXAM, STUDENT, PASSWORD).await.unwrap();

    assert_eq!(view.session_id, key());
    assert_eq!(view.current_index, 0);
    assert_eq!(view.total_questions, 4);
    assert!(view.is_first);
    assert!(!view.is_last);
    assert!(!view.completed);
    assert_eq!(view.seconds_remaining, 30 * 60);
    // Canonical order is by question id.
    assert_eq!(view.current_question.as_ref().map(|q| q.id), Some(101));
    assert!(view.question_states.iter().all(|s| !s.answered && s.correct.is_none()));
    assert_eq!(f.store.session_count().await, 1);

    let result = f.service.get_result(key()).await.unwrap();
    assert_eq!(result.score, 0.0);
    assert_eq!(result.status, SessionStatus::InProgress);
    assert_eq!(result.consumed_minutes, 30);
    assert_eq!(result.start_at, f.t0);
}

#[tokio::test]
async fn repeated_start_resumes_the_same_session() {
    let f = setup(DisclosureMode::Full).await;

    let first = f.service.start_exam(EXAM, STUDENT, PASSWORD).await.unwrap();
    f.clock.advance(Duration::minutes(5));
    let second = f.service.start_exam(EXAM, STUDENT, PASSWORD).await.unwrap();

    assert_eq!(first.session_id, second.session_id);
    assert_eq!(second.seconds_remaining, 25 * 60);
    assert_eq!(f.store.session_count().await, 1);
}

#[tokio::test]
async fn resume_restores_cursor_and_answer() {
    let f = setup(DisclosureMode::Full).await;
    f.service.start_exam(EXAM, STUDENT, PASSWORD).await.unwrap();

    f.service
        .submit_answer(key(), 102, Some("  B, A "), None)
        .await
        .unwrap();

    let resumed = f.service.start_exam(EXAM, STUDENT, PASSWORD).await.unwrap();
    assert_eq!(resumed.current_index, 1);
    assert_eq!(resumed.current_question.as_ref().map(|q| q.id), Some(102));
    assert_eq!(resumed.student_answer.as_deref(), Some("B, A"));
}

#[tokio::test]
async fn start_rejects_unenrolled_wrong_password_and_closed_window() {
    let f = setup(DisclosureMode::Full).await;

    let err = f.service.start_exam(EXAM, 555, PASSWORD).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = f.service.start_exam(EXAM, STUDENT, "nope").await.unwrap_err();
    assert!(matches!(err, AppError::InvalidCredential(_)));

    let err = f.service.start_exam(404, STUDENT, PASSWORD).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    f.clock.set(f.t0 - Duration::hours(2));
    let err = f.service.start_exam(EXAM, STUDENT, PASSWORD).await.unwrap_err();
    assert!(matches!(err, AppError::WindowClosed(_)));

    f.clock.set(f.t0 + Duration::hours(4));
    let err = f.service.start_exam(EXAM, STUDENT, PASSWORD).await.unwrap_err();
    assert!(matches!(err, AppError::WindowClosed(_)));

    assert_eq!(f.store.session_count().await, 0);
}

#[tokio::test]
async fn start_after_deadline_expires_the_session() {
    let f = setup(DisclosureMode::Full).await;
    f.service.start_exam(EXAM, STUDENT, PASSWORD).await.unwrap();

    f.clock.advance(Duration::minutes(31));
    let err = f.service.start_exam(EXAM, STUDENT, PASSWORD).await.unwrap_err();
    assert!(matches!(err, AppError::Expired(_)));

    let result = f.service.get_result(key()).await.unwrap();
    assert_eq!(result.status, SessionStatus::Completed);
    assert_eq!(result.finish_at, Some(f.t0 + Duration::minutes(30)));

    // Terminal: no restart, ever.
    let err = f.service.start_exam(EXAM, STUDENT, PASSWORD).await.unwrap_err();
    assert!(matches!(err, AppError::AlreadyCompleted(_)));
    assert_eq!(f.store.session_count().await, 1);
}

#[tokio::test]
async fn blank_answer_retracts_previous_one() {
    let f = setup(DisclosureMode::Full).await;
    f.service.start_exam(EXAM, STUDENT, PASSWORD).await.unwrap();

    let view = f.service.submit_answer(key(), 101, Some("A"), None).await.unwrap();
    assert!(view.question_states[0].answered);
    assert_eq!(view.question_states[0].correct, Some(true));

    let view = f.service.submit_answer(key(), 101, Some("   "), None).await.unwrap();
    assert!(!view.question_states[0].answered);
    assert_eq!(view.student_answer, None);
    assert_eq!(f.store.submission_count().await, 0);

    let detail = f
        .service
        .get_detail(key(), Requester::Teacher(TEACHER))
        .await
        .unwrap();
    let q101 = detail
        .question_details
        .iter()
        .find(|d| d.question_id == 101)
        .unwrap();
    assert_eq!(q101.student_answer, None);
    assert_eq!(q101.correct, None);
}

#[tokio::test]
async fn multiple_choice_uses_set_semantics() {
    let f = setup(DisclosureMode::Full).await;
    f.service.start_exam(EXAM, STUDENT, PASSWORD).await.unwrap();

    let view = f.service.submit_answer(key(), 102, Some("B, A"), None).await.unwrap();
    assert_eq!(view.question_states[1].correct, Some(true));

    let view = f.service.submit_answer(key(), 102, Some("A"), None).await.unwrap();
    assert_eq!(view.question_states[1].correct, Some(false));
}

#[tokio::test]
async fn reanswering_replaces_the_effective_submission() {
    let f = setup(DisclosureMode::Full).await;
    f.service.start_exam(EXAM, STUDENT, PASSWORD).await.unwrap();

    f.service.submit_answer(key(), 104, Some("D"), None).await.unwrap();
    f.service.submit_answer(key(), 104, Some("c"), None).await.unwrap();

    assert_eq!(f.store.submission_count().await, 1);
    let result = f.service.get_result(key()).await.unwrap();
    assert_eq!(result.score, 2.5);
}

#[tokio::test]
async fn submit_exam_scores_three_of_four() {
    let f = setup(DisclosureMode::Full).await;
    f.service.start_exam(EXAM, STUDENT, PASSWORD).await.unwrap();

    f.service.submit_answer(key(), 101, Some("A"), None).await.unwrap();
    f.service.submit_answer(key(), 102, Some("A,B"), None).await.unwrap();
    f.service.submit_answer(key(), 103, Some("paris"), None).await.unwrap();
    // 104 left blank.

    f.clock.advance(Duration::seconds(12 * 60 + 5));
    let summary = f.service.submit_exam(key()).await.unwrap();

    assert_eq!(summary.correct_count, 3);
    assert_eq!(summary.wrong_count, 1);
    assert_eq!(summary.total_questions, 4);
    assert_eq!(summary.score, 7.5);
    assert_eq!(summary.elapsed, "00:12:05");
    assert_eq!(summary.elapsed_seconds, 725);

    let result = f.service.get_result(key()).await.unwrap();
    assert_eq!(result.status, SessionStatus::Completed);
    assert_eq!(result.consumed_minutes, 12);
    assert_eq!(result.score, 7.5);
}

#[tokio::test]
async fn second_submit_is_rejected_and_keeps_first_outcome() {
    let f = setup(DisclosureMode::Full).await;
    f.service.start_exam(EXAM, STUDENT, PASSWORD).await.unwrap();
    f.clock.advance(Duration::minutes(3));
    f.service.submit_exam(key()).await.unwrap();

    f.clock.advance(Duration::minutes(10));
    let err = f.service.submit_exam(key()).await.unwrap_err();
    assert!(matches!(err, AppError::AlreadyCompleted(_)));

    let result = f.service.get_result(key()).await.unwrap();
    assert_eq!(result.finish_at, Some(f.t0 + Duration::minutes(3)));
    assert_eq!(result.consumed_minutes, 3);
}

#[tokio::test]
async fn answers_are_frozen_after_completion() {
    let f = setup(DisclosureMode::Full).await;
    f.service.start_exam(EXAM, STUDENT, PASSWORD).await.unwrap();
    f.service.submit_exam(key()).await.unwrap();

    let err = f.service.submit_answer(key(), 101, Some("A"), None).await.unwrap_err();
    assert!(matches!(err, AppError::AlreadyCompleted(_)));
    assert_eq!(f.store.submission_count().await, 0);
}

#[tokio::test]
async fn answer_after_deadline_expires_the_session() {
    let f = setup(DisclosureMode::Full).await;
    f.service.start_exam(EXAM, STUDENT, PASSWORD).await.unwrap();
    f.service.submit_answer(key(), 101, Some("A"), None).await.unwrap();

    f.clock.advance(Duration::minutes(30) + Duration::seconds(1));
    let err = f.service.submit_answer(key(), 102, Some("A,B"), None).await.unwrap_err();
    assert!(matches!(err, AppError::Expired(_)));

    let result = f.service.get_result(key()).await.unwrap();
    assert_eq!(result.status, SessionStatus::Completed);
    assert_eq!(result.score, 2.5);
    assert_eq!(f.store.submission_count().await, 1);
}

#[tokio::test]
async fn foreign_question_is_rejected_without_side_effects() {
    let f = setup(DisclosureMode::Full).await;
    f.service.start_exam(EXAM, STUDENT, PASSWORD).await.unwrap();
    f.service.submit_answer(key(), 103, Some("Paris"), None).await.unwrap();

    let err = f
        .service
        .submit_answer(key(), 201, Some("A"), Some(0))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidQuestion(_)));

    assert_eq!(f.store.submission_count().await, 1);
    let resumed = f.service.start_exam(EXAM, STUDENT, PASSWORD).await.unwrap();
    assert_eq!(resumed.current_index, 2);
    assert_eq!(f.service.get_result(key()).await.unwrap().score, 2.5);
}

#[tokio::test]
async fn missing_session_is_not_found() {
    let f = setup(DisclosureMode::Full).await;

    let err = f.service.submit_answer(key(), 101, Some("A"), None).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    let err = f.service.switch_tab(key()).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    let err = f.service.submit_exam(key()).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    let err = f.service.get_result(key()).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn requested_index_is_clamped() {
    let f = setup(DisclosureMode::Full).await;
    f.service.start_exam(EXAM, STUDENT, PASSWORD).await.unwrap();

    let view = f.service.submit_answer(key(), 101, Some("A"), Some(99)).await.unwrap();
    assert_eq!(view.current_index, 3);
    assert!(view.is_last);
    assert_eq!(view.current_question.as_ref().map(|q| q.id), Some(104));

    let view = f.service.get_question(key(), -4).await.unwrap();
    assert_eq!(view.current_index, 0);
    assert!(view.is_first);
    assert_eq!(view.student_answer.as_deref(), Some("A"));

    let view = f.service.get_question(key(), 2).await.unwrap();
    assert_eq!(view.current_question.as_ref().map(|q| q.id), Some(103));
}

#[tokio::test]
async fn incorrect_only_review_hides_correct_answers() {
    let f = setup(DisclosureMode::IncorrectOnly).await;
    f.service.start_exam(EXAM, STUDENT, PASSWORD).await.unwrap();
    f.service.submit_answer(key(), 101, Some("A"), None).await.unwrap();
    f.service.submit_answer(key(), 102, Some("C"), None).await.unwrap();
    f.service.submit_exam(key()).await.unwrap();

    let detail = f.service.get_detail(key(), Requester::Student(STUDENT)).await.unwrap();
    assert_eq!(detail.question_details.len(), 4);
    for d in &detail.question_details {
        match d.question_id {
            101 => assert_eq!(d.canonical_answer, None),
            102 => assert_eq!(d.canonical_answer.as_deref(), Some("A,B")),
            103 => assert_eq!(d.canonical_answer.as_deref(), Some("Paris")),
            104 => assert_eq!(d.canonical_answer.as_deref(), Some("C")),
            other => panic!("unexpected question {}", other),
        }
    }
}

#[tokio::test]
async fn none_review_returns_only_tab_log() {
    let f = setup(DisclosureMode::None).await;
    f.service.start_exam(EXAM, STUDENT, PASSWORD).await.unwrap();
    f.service.switch_tab(key()).await.unwrap();
    f.service.submit_exam(key()).await.unwrap();

    let detail = f.service.get_detail(key(), Requester::Student(STUDENT)).await.unwrap();
    assert!(detail.question_details.is_empty());
    assert_eq!(detail.switch_tab_log.len(), 1);

    let detail = f.service.get_detail(key(), Requester::Admin(1)).await.unwrap();
    assert_eq!(detail.question_details.len(), 4);
}

#[tokio::test]
async fn student_review_waits_for_completion_or_deadline() {
    let f = setup(DisclosureMode::Full).await;
    f.service.start_exam(EXAM, STUDENT, PASSWORD).await.unwrap();

    f.clock.advance(Duration::minutes(10));
    let err = f
        .service
        .get_detail(key(), Requester::Student(STUDENT))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotReady(_)));

    // Teachers can watch an attempt in progress.
    f.service.get_detail(key(), Requester::Teacher(TEACHER)).await.unwrap();

    f.clock.advance(Duration::minutes(21));
    let detail = f.service.get_detail(key(), Requester::Student(STUDENT)).await.unwrap();
    assert_eq!(detail.question_details.len(), 4);

    let err = f.service.start_exam(EXAM, STUDENT, PASSWORD).await.unwrap_err();
    assert!(matches!(err, AppError::AlreadyCompleted(_)));
}

#[tokio::test]
async fn students_cannot_review_each_other() {
    let f = setup(DisclosureMode::Full).await;
    f.service.start_exam(EXAM, STUDENT, PASSWORD).await.unwrap();
    f.service.submit_exam(key()).await.unwrap();

    let err = f
        .service
        .get_detail(key(), Requester::Student(OTHER_STUDENT))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn tab_switches_are_logged_in_order() {
    let f = setup(DisclosureMode::Full).await;
    f.service.start_exam(EXAM, STUDENT, PASSWORD).await.unwrap();

    f.clock.advance(Duration::minutes(1));
    f.service.switch_tab(key()).await.unwrap();
    f.clock.advance(Duration::minutes(1));
    f.service.switch_tab(key()).await.unwrap();

    let detail = f.service.get_detail(key(), Requester::Teacher(TEACHER)).await.unwrap();
    assert_eq!(
        detail.switch_tab_log,
        vec![f.t0 + Duration::minutes(1), f.t0 + Duration::minutes(2)]
    );
}

#[tokio::test]
async fn list_sessions_is_privileged() {
    let f = setup(DisclosureMode::Full).await;
    f.service.start_exam(EXAM, OTHER_STUDENT, PASSWORD).await.unwrap();
    f.service.start_exam(EXAM, STUDENT, PASSWORD).await.unwrap();
    f.service.switch_tab(key()).await.unwrap();

    let err = f
        .service
        .list_sessions(EXAM, Requester::Student(STUDENT))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let list = f.service.list_sessions(EXAM, Requester::Teacher(TEACHER)).await.unwrap();
    let students: Vec<i64> = list.iter().map(|s| s.student_id).collect();
    assert_eq!(students, vec![STUDENT, OTHER_STUDENT]);
    assert_eq!(list[0].switch_tab_count, 1);

    f.clock.advance(Duration::minutes(40));
    let list = f.service.list_sessions(EXAM, Requester::Teacher(TEACHER)).await.unwrap();
    assert!(list.iter().all(|s| s.status == SessionStatus::Completed));

    let err = f
        .service
        .list_sessions(404, Requester::Admin(1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn empty_exam_has_no_current_question() {
    let f = setup(DisclosureMode::Full).await;

    let view = f.service.start_exam(3, STUDENT, PASSWORD).await.unwrap();
    assert!(view.current_question.is_none());
    assert_eq!(view.total_questions, 0);
    assert!(view.is_first && view.is_last);

    let summary = f
        .service
        .submit_exam(SessionKey::new(STUDENT, 3))
        .await
        .unwrap();
    assert_eq!(summary.score, 0.0);
    assert_eq!(summary.total_questions, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_answers_are_not_lost() {
    let f = setup(DisclosureMode::Full).await;
    f.service.start_exam(EXAM, STUDENT, PASSWORD).await.unwrap();

    let answers = [(101, "A"), (102, "A,B"), (103, "Paris"), (104, "C")];
    let mut handles = Vec::new();
    for _ in 0..4 {
        for (question_id, answer) in answers {
            let service = f.service.clone();
            handles.push(tokio::spawn(async move {
                service
                    .submit_answer(key(), question_id, Some(answer), None)
                    .await
            }));
        }
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(f.store.submission_count().await, 4);
    assert_eq!(f.service.get_result(key()).await.unwrap().score, 10.0);
}
