//! Storage layer for the Vantage evaluation platform
//!
//! Provides the backend trait plus the libSQL implementation used for
//! persistent storage of users, forms, assignments, responses, and
//! notifications.

pub mod libsql;
pub mod test_utils;

use crate::error::Result;
use crate::token::AccessToken;
use crate::types::{
    Assignment, AssignmentId, EvaluationResponse, Form, FormId, Notification, NotificationId,
    User, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Aggregate entity counts for the dashboard
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityCounts {
    pub forms: u64,
    pub users: u64,
    pub responses: u64,
    pub pending_assignments: u64,
}

/// Storage backend trait defining all required operations
///
/// Multi-step writes (`create_form`, `replace_form`, `delete_form_cascade`,
/// `clear_all_data`) are transactional: either every document lands or none
/// does.
#[async_trait]
pub trait Store: Send + Sync {
    // --- users -------------------------------------------------------------

    /// Number of directory users
    async fn count_users(&self) -> Result<u64>;

    /// Bulk-insert directory users (seed time)
    async fn insert_users(&self, users: &[User]) -> Result<()>;

    /// All directory users
    async fn list_users(&self) -> Result<Vec<User>>;

    /// Fetch a user by id, NotFound if absent
    async fn get_user(&self, id: UserId) -> Result<User>;

    /// Look up a user by email
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    // --- forms -------------------------------------------------------------

    /// Insert a form together with its fanned-out assignments and
    /// notifications, atomically
    async fn create_form(
        &self,
        form: &Form,
        assignments: &[Assignment],
        notifications: &[Notification],
    ) -> Result<()>;

    /// Replace a form document and regenerate its assignment set
    ///
    /// Deletes the form's previous assignments, responses, and notifications
    /// and inserts the regenerated ones in the same transaction; tokens held
    /// by participants against the old assignments become invalid.
    async fn replace_form(
        &self,
        form: &Form,
        assignments: &[Assignment],
        notifications: &[Notification],
    ) -> Result<()>;

    /// Insert a bare form document (duplicate path; no assignments)
    async fn insert_form(&self, form: &Form) -> Result<()>;

    /// Fetch a form by id, NotFound if absent
    async fn get_form(&self, id: FormId) -> Result<Form>;

    /// All forms, newest first
    async fn list_forms(&self) -> Result<Vec<Form>>;

    /// Forms created by a user
    async fn list_forms_by_creator(&self, user_id: UserId) -> Result<Vec<Form>>;

    /// Delete a form and everything keyed to it (assignments, responses,
    /// notifications), atomically
    async fn delete_form_cascade(&self, id: FormId) -> Result<()>;

    // --- assignments -------------------------------------------------------

    /// Resolve an access token to its assignment
    async fn find_assignment_by_token(&self, token: &AccessToken) -> Result<Option<Assignment>>;

    /// All assignments for a form
    async fn list_assignments_for_form(&self, form_id: FormId) -> Result<Vec<Assignment>>;

    /// All assignments where the user is the participant
    async fn list_assignments_for_participant(&self, user_id: UserId) -> Result<Vec<Assignment>>;

    /// Flip an assignment to completed
    async fn complete_assignment(&self, id: AssignmentId, at: DateTime<Utc>) -> Result<()>;

    // --- responses ---------------------------------------------------------

    /// Fetch the response for an assignment, if one has been submitted
    async fn find_response_for_assignment(
        &self,
        assignment_id: AssignmentId,
    ) -> Result<Option<EvaluationResponse>>;

    /// Insert-or-overwrite the single response row for an assignment
    ///
    /// Keyed on the UNIQUE `assignment_id` index so concurrent duplicate
    /// submissions converge on one row.
    async fn upsert_response(&self, response: &EvaluationResponse) -> Result<()>;

    /// All responses belonging to a form's assignments
    async fn list_responses_for_form(&self, form_id: FormId) -> Result<Vec<EvaluationResponse>>;

    // --- notifications -----------------------------------------------------

    /// A user's notifications, newest first, capped
    async fn list_notifications_for_user(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<Notification>>;

    /// Mark a notification read
    async fn mark_notification_read(&self, id: NotificationId, at: DateTime<Utc>) -> Result<()>;

    // --- aggregates / admin ------------------------------------------------

    /// Entity counts for the dashboard
    async fn entity_counts(&self) -> Result<EntityCounts>;

    /// Wipe all forms, assignments, responses, and notifications; returns
    /// the number of deleted documents. Users are kept.
    async fn clear_all_data(&self) -> Result<u64>;

    /// Connection-level health check
    async fn health_check(&self) -> Result<()>;
}
