//! Token-gated evaluation access and response submission
//!
//! The access token on an assignment is the only credential an evaluation
//! participant carries. Resolving a token yields the participant's view of
//! the form (just their assigned questions, in form order) plus context
//! about who else is evaluating the same subject. Submission enforces the
//! form's resubmission policy.

use crate::error::{Result, VantageError};
use crate::storage::Store;
use crate::token::AccessToken;
use crate::types::{
    Assignment, AssignmentStatus, EvaluationResponse, Form, ParticipantType, ResponseId,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

/// One co-evaluator of the same subject, with completion state
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluatorOverview {
    pub name: String,
    pub email: String,
    pub position: u32,
    pub status: AssignmentStatus,
}

/// Context shown to the participant alongside the form
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantInfo {
    pub participant_type: ParticipantType,
    pub participant_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluator_position: Option<u32>,
    /// For a subject: everyone evaluating them. For an evaluator: the
    /// other evaluators of the same subject.
    pub evaluators: Vec<EvaluatorOverview>,
}

/// Everything needed to render an evaluation page for a token
#[derive(Debug, Clone)]
pub struct ResolvedEvaluation {
    /// The form with questions narrowed to the assignment's share
    pub form: Form,
    pub assignment: Assignment,
    pub participant_info: ParticipantInfo,
    pub existing_response: Option<EvaluationResponse>,
}

/// Request metadata recorded with a submission
#[derive(Debug, Clone, Default)]
pub struct SubmissionMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Result of a successful submission
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub response_id: ResponseId,
    /// True when an earlier response for this assignment was overwritten
    pub updated: bool,
}

/// Token-scoped evaluation operations over a storage backend
pub struct EvaluationService {
    store: Arc<dyn Store>,
}

impl EvaluationService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Look up an assignment by token and build the participant's view
    pub async fn resolve(&self, token: &AccessToken) -> Result<ResolvedEvaluation> {
        let assignment = self
            .store
            .find_assignment_by_token(token)
            .await?
            .ok_or_else(|| {
                VantageError::NotFound("Invalid or expired evaluation link".to_string())
            })?;

        let mut form = self.store.get_form(assignment.form_id).await?;

        // Narrow to the assigned share, preserving form order
        form.questions
            .retain(|q| assignment.assigned_questions.contains(&q.id));

        let participant_info = self.build_participant_info(&assignment).await?;
        let existing_response = self
            .store
            .find_response_for_assignment(assignment.id)
            .await?;

        Ok(ResolvedEvaluation {
            form,
            assignment,
            participant_info,
            existing_response,
        })
    }

    /// Record a submission for the assignment behind a token
    ///
    /// An existing response is overwritten only when the form allows
    /// multiple responses; otherwise the call conflicts. A completed
    /// assignment with no surviving response also conflicts rather than
    /// silently reopening.
    pub async fn submit(
        &self,
        token: &AccessToken,
        answers: serde_json::Map<String, serde_json::Value>,
        meta: SubmissionMeta,
    ) -> Result<SubmitOutcome> {
        let assignment = self
            .store
            .find_assignment_by_token(token)
            .await?
            .ok_or_else(|| {
                VantageError::NotFound("Invalid or expired evaluation link".to_string())
            })?;

        let form = self.store.get_form(assignment.form_id).await?;
        let existing = self
            .store
            .find_response_for_assignment(assignment.id)
            .await?;

        let now = Utc::now();
        let (response, updated) = match existing {
            Some(prior) => {
                if !form.allow_multiple_responses {
                    return Err(VantageError::Conflict(
                        "You have already submitted a response for this evaluation".to_string(),
                    ));
                }
                let mut updated_response = prior;
                updated_response.answers = answers;
                updated_response.submitted_at = now;
                updated_response.updated_at = now;
                updated_response.ip_address = meta.ip_address;
                updated_response.user_agent = meta.user_agent;
                (updated_response, true)
            }
            None => {
                if assignment.status == AssignmentStatus::Completed {
                    return Err(VantageError::Conflict(
                        "This evaluation has already been completed".to_string(),
                    ));
                }
                (build_response(&assignment, answers, &meta, now), false)
            }
        };

        self.store.upsert_response(&response).await?;
        self.store.complete_assignment(assignment.id, now).await?;

        Ok(SubmitOutcome {
            response_id: response.id,
            updated,
        })
    }

    async fn build_participant_info(&self, assignment: &Assignment) -> Result<ParticipantInfo> {
        // Co-evaluator statuses come from the sibling assignments rather
        // than the matrix, which knows nothing about completion
        let siblings = self.store.list_assignments_for_form(assignment.form_id).await?;
        let subject_id = match assignment.participant_type {
            ParticipantType::Subject => Some(assignment.participant_id),
            ParticipantType::Evaluator => assignment.subject_id,
        };

        let evaluators: Vec<EvaluatorOverview> = siblings
            .iter()
            .filter(|a| {
                a.participant_type == ParticipantType::Evaluator
                    && a.subject_id == subject_id
                    && a.id != assignment.id
            })
            .map(|a| EvaluatorOverview {
                name: a.participant_name.clone(),
                email: a.participant_email.clone(),
                position: a.evaluator_position.unwrap_or(0),
                status: a.status,
            })
            .collect();

        Ok(ParticipantInfo {
            participant_type: assignment.participant_type,
            participant_name: assignment.participant_name.clone(),
            subject_name: assignment.subject_name.clone(),
            evaluator_position: assignment.evaluator_position,
            evaluators,
        })
    }
}

fn build_response(
    assignment: &Assignment,
    answers: serde_json::Map<String, serde_json::Value>,
    meta: &SubmissionMeta,
    now: chrono::DateTime<Utc>,
) -> EvaluationResponse {
    // A subject evaluates themselves, so subject fields fall back to the
    // participant's own identity
    let subject_id = assignment.subject_id.unwrap_or(assignment.participant_id);
    let subject_name = assignment
        .subject_name
        .clone()
        .unwrap_or_else(|| assignment.participant_name.clone());
    let subject_email = assignment
        .subject_email
        .clone()
        .unwrap_or_else(|| assignment.participant_email.clone());

    EvaluationResponse {
        id: ResponseId::new(),
        form_id: assignment.form_id,
        assignment_id: assignment.id,
        participant_type: assignment.participant_type,
        participant_id: assignment.participant_id,
        participant_name: assignment.participant_name.clone(),
        participant_email: assignment.participant_email.clone(),
        evaluator_position: assignment.evaluator_position,
        subject_id,
        subject_name,
        subject_email,
        answers,
        submitted_at: now,
        updated_at: now,
        ip_address: meta.ip_address.clone(),
        user_agent: meta.user_agent.clone(),
        token: assignment.token.clone(),
    }
}
