//! Assignment fan-out
//!
//! Turns a form definition into the full set of assignment records: one
//! self-evaluation assignment per subject plus one assignment per
//! (subject, evaluator slot) pair, each with its own access token and the
//! subset of question ids that participant may answer. Also builds the
//! per-assignment notifications emitted on form creation.

use crate::token::AccessToken;
use crate::types::{
    Assignment, AssignmentId, AssignmentStatus, Form, Notification, NotificationId,
    NotificationKind, ParticipantType, Question,
};
use chrono::{DateTime, Utc};

/// Question ids a subject's self-evaluation covers, in form order
pub fn subject_questions(questions: &[Question]) -> Vec<String> {
    questions
        .iter()
        .filter(|q| q.can_subject_answer)
        .map(|q| q.id.clone())
        .collect()
}

/// Question ids visible to an evaluator at the given position, in form order
pub fn evaluator_questions(questions: &[Question], position: u32) -> Vec<String> {
    questions
        .iter()
        .filter(|q| q.evaluator_positions.contains(&position))
        .map(|q| q.id.clone())
        .collect()
}

/// Generate the complete assignment set for a form
///
/// Produces exactly `S + sum(|evaluators|)` assignments for S subjects. Every
/// assignment gets a fresh random token, `pending` status, and the form's
/// due date.
pub fn generate_assignments(form: &Form, now: DateTime<Utc>) -> Vec<Assignment> {
    let mut assignments = Vec::with_capacity(form.subject_matrix.len() + form.evaluator_slot_count());

    for subject in &form.subject_matrix {
        assignments.push(Assignment {
            id: AssignmentId::new(),
            form_id: form.id,
            participant_type: ParticipantType::Subject,
            participant_id: subject.subject_id,
            participant_name: subject.subject_name.clone(),
            participant_email: subject.subject_email.clone(),
            subject_id: None,
            subject_name: None,
            subject_email: None,
            evaluator_position: None,
            assigned_questions: subject_questions(&form.questions),
            token: AccessToken::generate(),
            status: AssignmentStatus::Pending,
            created_at: now,
            updated_at: now,
            completed_at: None,
            due_date: form.due_date,
        });

        for evaluator in &subject.evaluators {
            assignments.push(Assignment {
                id: AssignmentId::new(),
                form_id: form.id,
                participant_type: ParticipantType::Evaluator,
                participant_id: evaluator.evaluator_id,
                participant_name: evaluator.evaluator_name.clone(),
                participant_email: evaluator.evaluator_email.clone(),
                subject_id: Some(subject.subject_id),
                subject_name: Some(subject.subject_name.clone()),
                subject_email: Some(subject.subject_email.clone()),
                evaluator_position: Some(evaluator.position),
                assigned_questions: evaluator_questions(&form.questions, evaluator.position),
                token: AccessToken::generate(),
                status: AssignmentStatus::Pending,
                created_at: now,
                updated_at: now,
                completed_at: None,
                due_date: form.due_date,
            });
        }
    }

    assignments
}

/// Build one notification per assignment
///
/// Returns an empty set when the form has notifications disabled.
pub fn build_notifications(
    form: &Form,
    assignments: &[Assignment],
    now: DateTime<Utc>,
) -> Vec<Notification> {
    if !form.notify_on_completion {
        return Vec::new();
    }

    assignments
        .iter()
        .map(|assignment| {
            let (kind, title, message) = match assignment.participant_type {
                ParticipantType::Subject => (
                    NotificationKind::EnhancedSelfEvaluation,
                    "New Self-Evaluation Request".to_string(),
                    format!(
                        "You have been requested to complete a self-evaluation: {}",
                        form.title
                    ),
                ),
                ParticipantType::Evaluator => {
                    let subject_name = assignment.subject_name.as_deref().unwrap_or_default();
                    (
                        NotificationKind::EnhancedPeerEvaluation,
                        format!("Evaluation Request for {}", subject_name),
                        format!(
                            "You have been requested to evaluate {} for: {}",
                            subject_name, form.title
                        ),
                    )
                }
            };

            Notification {
                id: NotificationId::new(),
                user_id: assignment.participant_id,
                kind,
                title,
                message,
                assignment_id: assignment.id,
                form_id: form.id,
                token: assignment.token.clone(),
                read: false,
                created_at: now,
                read_at: None,
            }
        })
        .collect()
}
