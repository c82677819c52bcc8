// src/services/review.rs

use std::collections::HashMap;

use crate::models::{
    exam::{DisclosureMode, Exam},
    session::{DetailView, QuestionDetail, Session},
    submission::Submission,
    user::Requester,
};

/// Decides whether the canonical answer of one question may be shown.
pub fn reveals_answer(requester: &Requester, mode: DisclosureMode, correct: Option<bool>) -> bool {
    if requester.is_privileged() {
        return true;
    }
    match mode {
        DisclosureMode::None => false,
        DisclosureMode::IncorrectOnly => correct != Some(true),
        DisclosureMode::Full => true,
    }
}

/// Builds the graded review of a session.
///
/// Status checks happen before this is called; this only applies the
/// disclosure rules. Questions appear in canonical order, answered or not.
pub fn build_detail(
    requester: &Requester,
    exam: &Exam,
    session: &Session,
    latest: &HashMap<i64, Submission>,
) -> DetailView {
    let question_details = if !requester.is_privileged() && exam.disclosure_mode == DisclosureMode::None {
        Vec::new()
    } else {
        exam.questions
            .iter()
            .map(|q| {
                let submission = latest.get(&q.id);
                let correct = submission.map(|s| s.is_correct);
                let canonical_answer = reveals_answer(requester, exam.disclosure_mode, correct)
                    .then(|| q.answer.clone());

                QuestionDetail {
                    question_id: q.id,
                    title: q.title.clone(),
                    question_type: q.question_type,
                    choices: q.choices.0.clone(),
                    canonical_answer,
                    student_answer: submission.map(|s| s.answer.clone()),
                    correct,
                }
            })
            .collect()
    };

    DetailView {
        session_id: session.key,
        switch_tab_log: session.switch_tab_log.clone(),
        question_details,
    }
}
