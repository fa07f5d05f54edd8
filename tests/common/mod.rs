//! Shared builders for integration tests

#![allow(dead_code)]

use chrono::Utc;
use vantage_core::types::{
    CreatorInfo, EvaluatorSlot, Form, FormId, FormStatus, Question, QuestionType, SubjectEntry,
    UserId,
};

pub fn question(id: &str, can_subject_answer: bool, positions: &[u32]) -> Question {
    Question {
        id: id.to_string(),
        text: format!("Question {}", id),
        question_type: QuestionType::Text,
        required: true,
        can_subject_answer,
        evaluator_positions: positions.to_vec(),
        options: Vec::new(),
    }
}

pub fn subject(name: &str, evaluators: Vec<EvaluatorSlot>) -> SubjectEntry {
    SubjectEntry {
        subject_id: UserId::new(),
        subject_name: name.to_string(),
        subject_email: format!("{}@example.com", name.to_lowercase()),
        evaluators,
    }
}

pub fn evaluator(name: &str, position: u32) -> EvaluatorSlot {
    EvaluatorSlot {
        evaluator_id: UserId::new(),
        evaluator_name: name.to_string(),
        evaluator_email: format!("{}@example.com", name.to_lowercase()),
        position,
    }
}

pub fn form_with(subjects: Vec<SubjectEntry>, questions: Vec<Question>) -> Form {
    let now = Utc::now();
    Form {
        id: FormId::new(),
        title: "Quarterly Review".to_string(),
        description: String::new(),
        due_date: None,
        allow_late_submissions: false,
        allow_multiple_responses: false,
        notify_on_completion: true,
        form_type: "enhanced".to_string(),
        subject_matrix: subjects,
        questions,
        created_by: UserId::new(),
        creator: Some(CreatorInfo {
            name: "Admin".to_string(),
            email: "admin@example.com".to_string(),
            department: "HR".to_string(),
        }),
        created_at: now,
        updated_at: now,
        status: FormStatus::Active,
    }
}

pub fn answers(pairs: &[(&str, &str)]) -> serde_json::Map<String, serde_json::Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
        .collect()
}
