//! Reporting over collected responses
//!
//! Read-only aggregation: per-form completion reports, per-user workspace
//! views, and platform-wide dashboard counts. Nothing here mutates state.

use crate::error::Result;
use crate::storage::Store;
use crate::token::AccessToken;
use crate::types::{
    Assignment, AssignmentId, AssignmentStatus, EvaluationResponse, Form, FormId, FormStatus,
    ParticipantType, Question, UserId,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// A response joined with the submitting user's current name
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedResponse {
    #[serde(flatten)]
    pub response: EvaluationResponse,
    pub user_name: String,
}

/// One row per assignment in a form report, joined with its response if any
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSummary {
    pub assignment_id: AssignmentId,
    pub participant_name: String,
    pub participant_type: ParticipantType,
    pub participant_email: String,
    pub subject_name: String,
    pub evaluator_position: Option<u32>,
    pub status: AssignmentStatus,
    pub has_response: bool,
    pub response: Option<EvaluationResponse>,
    pub assignment: Assignment,
}

/// Per-question completion counts across a form's responses
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionStat {
    pub question_id: String,
    pub question_text: String,
    /// Responses that include a non-empty answer for this question
    pub answered: u64,
    /// `answered` over the total assignment count, 0.0 when no assignments
    pub response_rate: f64,
}

/// Full completion report for one form
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormReport {
    pub assignments: Vec<Assignment>,
    pub responses: Vec<EnrichedResponse>,
    pub summary: Vec<ParticipantSummary>,
    pub question_stats: Vec<QuestionStat>,
}

/// One pending or completed evaluation in a user's workspace
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignedForm {
    pub form_id: FormId,
    pub form_title: String,
    pub assignment_id: AssignmentId,
    pub my_role: ParticipantType,
    pub my_token: AccessToken,
    pub my_status: AssignmentStatus,
    pub allow_multiple_responses: bool,
    pub due_date: Option<DateTime<Utc>>,
    pub form_type: String,
    pub subject_name: Option<String>,
    pub evaluator_position: Option<u32>,
}

/// Trimmed view of a form the user created
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedFormSummary {
    pub id: FormId,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: FormStatus,
    pub questions: Vec<Question>,
    pub form_type: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignedSummary {
    pub total: u64,
    pub completed: u64,
    pub pending: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedSummary {
    pub forms_created: u64,
    pub assignments: u64,
    pub total_participants: u64,
    pub completed_participants: u64,
    pub pending_participants: u64,
}

/// Everything a user sees on their landing page
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserWorkspace {
    pub created_forms: Vec<CreatedFormSummary>,
    pub assigned_forms: Vec<AssignedForm>,
    pub assigned_summary: AssignedSummary,
    pub created_summary: CreatedSummary,
}

impl UserWorkspace {
    /// The payload returned for an unknown or malformed user id
    pub fn empty() -> Self {
        Self {
            created_forms: Vec::new(),
            assigned_forms: Vec::new(),
            assigned_summary: AssignedSummary {
                total: 0,
                completed: 0,
                pending: 0,
            },
            created_summary: CreatedSummary {
                forms_created: 0,
                assignments: 0,
                total_participants: 0,
                completed_participants: 0,
                pending_participants: 0,
            },
        }
    }
}

/// Platform-wide counts for the admin dashboard
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_forms: u64,
    pub total_users: u64,
    pub total_evaluations: u64,
    /// Assignments still awaiting a submission
    pub pending_evaluations: u64,
}

/// Read-only analytics over a storage backend
pub struct AnalyticsService {
    store: Arc<dyn Store>,
}

impl AnalyticsService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Assemble the completion report for a form
    pub async fn form_report(&self, form_id: FormId) -> Result<FormReport> {
        let form = self.store.get_form(form_id).await?;
        let assignments = self.store.list_assignments_for_form(form_id).await?;
        let raw_responses = self.store.list_responses_for_form(form_id).await?;

        // Join current user names onto responses; a deleted participant
        // degrades to a placeholder instead of failing the report
        let mut name_cache: HashMap<UserId, String> = HashMap::new();
        let mut responses = Vec::with_capacity(raw_responses.len());
        for response in raw_responses {
            let user_name = match name_cache.get(&response.participant_id) {
                Some(name) => name.clone(),
                None => {
                    let name = match self.store.get_user(response.participant_id).await {
                        Ok(user) => user.name,
                        Err(_) => "Unknown User".to_string(),
                    };
                    name_cache.insert(response.participant_id, name.clone());
                    name
                }
            };
            responses.push(EnrichedResponse {
                response,
                user_name,
            });
        }

        let summary = assignments
            .iter()
            .map(|a| {
                let response = responses
                    .iter()
                    .find(|r| r.response.assignment_id == a.id)
                    .map(|r| r.response.clone());
                ParticipantSummary {
                    assignment_id: a.id,
                    participant_name: a.participant_name.clone(),
                    participant_type: a.participant_type,
                    participant_email: a.participant_email.clone(),
                    subject_name: a
                        .subject_name
                        .clone()
                        .unwrap_or_else(|| a.participant_name.clone()),
                    evaluator_position: a.evaluator_position,
                    status: a.status,
                    has_response: response.is_some(),
                    response,
                    assignment: a.clone(),
                }
            })
            .collect();

        // Rates are measured against everyone asked, not just those who
        // answered
        let total = assignments.len() as u64;
        let question_stats = form
            .questions
            .iter()
            .map(|q| {
                let answered = responses
                    .iter()
                    .filter(|r| is_answered(r.response.answers.get(&q.id)))
                    .count() as u64;
                QuestionStat {
                    question_id: q.id.clone(),
                    question_text: q.text.clone(),
                    answered,
                    response_rate: if total == 0 {
                        0.0
                    } else {
                        answered as f64 / total as f64
                    },
                }
            })
            .collect();

        Ok(FormReport {
            assignments,
            responses,
            summary,
            question_stats,
        })
    }

    /// Build a user's workspace: forms they created plus forms assigned
    /// to them, with completion tallies
    pub async fn user_workspace(&self, user_id: UserId) -> Result<UserWorkspace> {
        let created_forms = self.store.list_forms_by_creator(user_id).await?;
        let assignments = self.store.list_assignments_for_participant(user_id).await?;

        let mut form_cache: HashMap<FormId, Form> = HashMap::new();
        let mut assigned_forms = Vec::with_capacity(assignments.len());
        let mut completed = 0u64;
        for assignment in &assignments {
            let form = match form_cache.get(&assignment.form_id) {
                Some(form) => form.clone(),
                None => {
                    let form = self.store.get_form(assignment.form_id).await?;
                    form_cache.insert(form.id, form.clone());
                    form
                }
            };
            // Completion is judged by whether a response survives, not the
            // assignment flag, so form regeneration resets the view
            let has_response = self
                .store
                .find_response_for_assignment(assignment.id)
                .await?
                .is_some();
            let my_status = if has_response {
                AssignmentStatus::Completed
            } else {
                AssignmentStatus::Pending
            };
            if my_status == AssignmentStatus::Completed {
                completed += 1;
            }
            assigned_forms.push(AssignedForm {
                form_id: form.id,
                form_title: form.title.clone(),
                assignment_id: assignment.id,
                my_role: assignment.participant_type,
                my_token: assignment.token.clone(),
                my_status,
                allow_multiple_responses: form.allow_multiple_responses,
                due_date: assignment.due_date.or(form.due_date),
                form_type: form.form_type.clone(),
                subject_name: assignment.subject_name.clone(),
                evaluator_position: assignment.evaluator_position,
            });
        }

        let total = assigned_forms.len() as u64;
        Ok(UserWorkspace {
            created_summary: CreatedSummary {
                forms_created: created_forms.len() as u64,
                assignments: 0,
                total_participants: 0,
                completed_participants: 0,
                pending_participants: 0,
            },
            created_forms: created_forms
                .into_iter()
                .map(|f| CreatedFormSummary {
                    id: f.id,
                    title: f.title,
                    description: f.description,
                    created_at: f.created_at,
                    updated_at: f.updated_at,
                    status: f.status,
                    questions: f.questions,
                    form_type: f.form_type,
                })
                .collect(),
            assigned_forms,
            assigned_summary: AssignedSummary {
                total,
                completed,
                pending: total.saturating_sub(completed),
            },
        })
    }

    /// Counts for the admin dashboard
    pub async fn dashboard_stats(&self) -> Result<DashboardStats> {
        let counts = self.store.entity_counts().await?;
        Ok(DashboardStats {
            total_forms: counts.forms,
            total_users: counts.users,
            total_evaluations: counts.responses,
            pending_evaluations: counts.pending_assignments,
        })
    }
}

/// An answer counts only when it carries content
fn is_answered(value: Option<&serde_json::Value>) -> bool {
    match value {
        None | Some(serde_json::Value::Null) => false,
        Some(serde_json::Value::String(s)) => !s.trim().is_empty(),
        Some(serde_json::Value::Array(items)) => !items.is_empty(),
        Some(_) => true,
    }
}
