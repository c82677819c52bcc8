// src/services/scoring.rs

use std::collections::HashMap;

use crate::models::{
    exam::Exam,
    question::{Question, QuestionType},
    submission::Submission,
};

/// Maximum score of an exam.
pub const MAX_SCORE: f64 = 10.0;

/// Checks a submitted answer against the question's canonical answer.
///
/// Multiple choice compares the comma separated option keys as sets. Every
/// other type is a trimmed, case-insensitive string comparison.
pub fn is_correct(question: &Question, answer: &str) -> bool {
    match question.question_type {
        QuestionType::MultipleChoice => option_keys(&question.answer) == option_keys(answer),
        QuestionType::SingleChoice | QuestionType::Essay => {
            question.answer.trim().to_lowercase() == answer.trim().to_lowercase()
        }
    }
}

fn option_keys(raw: &str) -> Vec<&str> {
    let mut keys: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .collect();
    keys.sort_unstable();
    keys.dedup();
    keys
}

/// Resolves the effective submission per question: the one that arrived last wins.
pub fn latest_by_question(mut submissions: Vec<Submission>) -> HashMap<i64, Submission> {
    submissions.sort_by_key(|s| s.id);
    submissions.into_iter().map(|s| (s.question_id, s)).collect()
}

/// Number of the exam's questions whose effective submission is correct.
/// Answers to questions outside the exam are ignored.
pub fn count_correct(exam: &Exam, latest: &HashMap<i64, Submission>) -> usize {
    exam.questions
        .iter()
        .filter(|q| latest.get(&q.id).is_some_and(|s| s.is_correct))
        .count()
}

/// Helper function to calculate score on the 0..=10 scale.
pub fn calculate_score(correct_count: usize, total_questions: usize) -> f64 {
    if total_questions == 0 {
        return 0.0;
    }
    (correct_count as f64 / total_questions as f64) * MAX_SCORE
}

/// Score of a session from its effective submissions.
pub fn score(exam: &Exam, latest: &HashMap<i64, Submission>) -> f64 {
    calculate_score(count_correct(exam, latest), exam.total_questions())
}
