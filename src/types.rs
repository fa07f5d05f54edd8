//! Core data types for the Vantage evaluation platform
//!
//! This module defines the documents that flow through the system: directory
//! users, evaluation forms with their subject/evaluator matrices, the
//! per-participant assignments fanned out from a form, submitted responses,
//! and notifications. Wire names are camelCase for compatibility with the
//! existing clients.

use crate::auth::PasswordHash;
use crate::token::AccessToken;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random id
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Parse an id from a string
            pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type! {
    /// Unique identifier for directory users
    UserId
}
id_type! {
    /// Unique identifier for evaluation forms
    FormId
}
id_type! {
    /// Unique identifier for assignments
    AssignmentId
}
id_type! {
    /// Unique identifier for submitted responses
    ResponseId
}
id_type! {
    /// Unique identifier for notifications
    NotificationId
}

/// Directory user record
///
/// Created at seed time and effectively immutable afterwards. The credential
/// is stored as an opaque salted hash, never as plaintext.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    /// Unique across the directory
    pub email: String,
    pub department: String,
    pub job_title: String,
    #[serde(skip_serializing)]
    pub password_hash: PasswordHash,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Public profile view, safe to return from the API
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            department: self.department.clone(),
            job_title: self.job_title.clone(),
        }
    }
}

/// Directory profile without credential material
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub department: String,
    pub job_title: String,
}

/// Question input widget type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Text,
    Textarea,
    Rating,
    MultipleChoice,
    Checkbox,
    /// Unrecognized type from an older client; treated as free text
    #[serde(other)]
    Other,
}

impl Default for QuestionType {
    fn default() -> Self {
        QuestionType::Text
    }
}

/// A single question on a form, tagged with which participant roles may
/// answer it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    /// Stable question id, referenced by assignments and answers. Filled
    /// in by the server when a client omits it.
    #[serde(default)]
    pub id: String,
    pub text: String,
    #[serde(rename = "type", default)]
    pub question_type: QuestionType,
    /// Advisory only; the server does not reject unanswered required questions
    #[serde(default = "default_true")]
    pub required: bool,
    /// Whether the subject's self-evaluation includes this question
    #[serde(default)]
    pub can_subject_answer: bool,
    /// Evaluator positions that see this question
    #[serde(default)]
    pub evaluator_positions: Vec<u32>,
    /// Choice options for multiple_choice / checkbox questions
    #[serde(default)]
    pub options: Vec<String>,
}

fn default_true() -> bool {
    true
}

/// One evaluator slot under a subject, identified by a named position
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluatorSlot {
    pub evaluator_id: UserId,
    pub evaluator_name: String,
    pub evaluator_email: String,
    pub position: u32,
}

/// One subject row of the matrix with its assigned evaluators
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectEntry {
    pub subject_id: UserId,
    pub subject_name: String,
    pub subject_email: String,
    pub evaluators: Vec<EvaluatorSlot>,
}

/// Form lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormStatus {
    Active,
    Draft,
}

impl FormStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormStatus::Active => "active",
            FormStatus::Draft => "draft",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(FormStatus::Active),
            "draft" => Some(FormStatus::Draft),
            _ => None,
        }
    }
}

/// Creator snapshot embedded in the form document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatorInfo {
    pub name: String,
    pub email: String,
    pub department: String,
}

/// Evaluation form definition
///
/// The subject matrix and question list are ordered; assignment generation
/// and question filtering both preserve that order. Edits replace the whole
/// document and regenerate all assignments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Form {
    pub id: FormId,
    pub title: String,
    pub description: String,
    pub due_date: Option<DateTime<Utc>>,
    pub allow_late_submissions: bool,
    pub allow_multiple_responses: bool,
    pub notify_on_completion: bool,
    pub form_type: String,
    pub subject_matrix: Vec<SubjectEntry>,
    pub questions: Vec<Question>,
    pub created_by: UserId,
    pub creator: Option<CreatorInfo>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: FormStatus,
}

impl Form {
    /// Total number of evaluator slots across all subjects
    pub fn evaluator_slot_count(&self) -> usize {
        self.subject_matrix.iter().map(|s| s.evaluators.len()).sum()
    }

    /// Look up a question by id
    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }
}

/// Participant role on an assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantType {
    Subject,
    Evaluator,
}

impl ParticipantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantType::Subject => "subject",
            ParticipantType::Evaluator => "evaluator",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "subject" => Some(ParticipantType::Subject),
            "evaluator" => Some(ParticipantType::Evaluator),
            _ => None,
        }
    }
}

/// Assignment completion state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Pending,
    Completed,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Pending => "pending",
            AssignmentStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(AssignmentStatus::Pending),
            "completed" => Some(AssignmentStatus::Completed),
            _ => None,
        }
    }
}

/// One participant's tokenized assignment for a form
///
/// Subjects carry only their own identity; evaluator assignments additionally
/// record the subject under evaluation and the evaluator's position. The
/// token is globally unique and is the only credential a participant needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: AssignmentId,
    pub form_id: FormId,
    pub participant_type: ParticipantType,
    pub participant_id: UserId,
    pub participant_name: String,
    pub participant_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluator_position: Option<u32>,
    /// Question ids visible to this participant, in form order
    pub assigned_questions: Vec<String>,
    pub token: AccessToken,
    pub status: AssignmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
}

/// Submitted answers for one assignment
///
/// At most one row exists per assignment; re-submission overwrites the
/// answer map in place, no history is kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResponse {
    pub id: ResponseId,
    pub form_id: FormId,
    pub assignment_id: AssignmentId,
    pub participant_type: ParticipantType,
    pub participant_id: UserId,
    pub participant_name: String,
    pub participant_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluator_position: Option<u32>,
    pub subject_id: UserId,
    pub subject_name: String,
    pub subject_email: String,
    /// Answer map keyed by question id
    #[serde(rename = "responses")]
    pub answers: serde_json::Map<String, serde_json::Value>,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    pub token: AccessToken,
}

/// Notification category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    EnhancedSelfEvaluation,
    EnhancedPeerEvaluation,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::EnhancedSelfEvaluation => "enhanced_self_evaluation",
            NotificationKind::EnhancedPeerEvaluation => "enhanced_peer_evaluation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "enhanced_self_evaluation" => Some(NotificationKind::EnhancedSelfEvaluation),
            "enhanced_peer_evaluation" => Some(NotificationKind::EnhancedPeerEvaluation),
            _ => None,
        }
    }
}

/// In-app notification delivered to a participant when a form is created
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub assignment_id: AssignmentId,
    pub form_id: FormId,
    pub token: AccessToken,
    pub read: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_uniqueness() {
        assert_ne!(FormId::new(), FormId::new());
        assert_ne!(AssignmentId::new(), AssignmentId::new());
    }

    #[test]
    fn test_question_defaults() {
        let q: Question = serde_json::from_str(r#"{"id":"q1","text":"How?"}"#).unwrap();
        assert_eq!(q.question_type, QuestionType::Text);
        assert!(q.required);
        assert!(!q.can_subject_answer);
        assert!(q.evaluator_positions.is_empty());
    }

    #[test]
    fn test_wire_names_are_camel_case() {
        let slot = EvaluatorSlot {
            evaluator_id: UserId::new(),
            evaluator_name: "B".into(),
            evaluator_email: "b@example.com".into(),
            position: 1,
        };
        let json = serde_json::to_value(&slot).unwrap();
        assert!(json.get("evaluatorId").is_some());
        assert!(json.get("evaluatorName").is_some());
    }

    #[test]
    fn test_question_type_fallback() {
        let q: Question =
            serde_json::from_str(r#"{"id":"q1","text":"?","type":"slider"}"#).unwrap();
        assert_eq!(q.question_type, QuestionType::Other);
    }
}
