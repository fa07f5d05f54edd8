//! libSQL storage backend
//!
//! Persists all platform collections in a single local database. Nested
//! document fields (subject matrix, question list, answer maps) are stored
//! as JSON text columns; timestamps as RFC 3339 strings. Multi-document
//! writes run inside explicit transactions so a crash partway through can
//! never leave a form without its assignments.

use crate::error::{Result, VantageError};
use crate::storage::{EntityCounts, Store};
use crate::token::AccessToken;
use crate::types::{
    Assignment, AssignmentId, AssignmentStatus, CreatorInfo, EvaluationResponse, Form, FormId,
    FormStatus, Notification, NotificationId, NotificationKind, ParticipantType, Question,
    ResponseId, SubjectEntry, User, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{params, Builder, Connection, Database};
use tracing::{debug, info};

/// Embedded migrations, applied in order and tracked in
/// `_migrations_applied`
const MIGRATIONS: &[(&str, &str)] = &[
    (
        "001_initial_schema.sql",
        include_str!("../../migrations/libsql/001_initial_schema.sql"),
    ),
    (
        "002_add_indexes.sql",
        include_str!("../../migrations/libsql/002_add_indexes.sql"),
    ),
];

/// Database connection mode
#[derive(Debug, Clone)]
pub enum ConnectionMode {
    /// Local file-based database
    Local(String),
    /// In-memory database (for testing)
    InMemory,
}

/// libSQL storage backend
///
/// Holds a single connection handed out as clones, so every operation
/// (including an in-memory database, where each fresh connection would be
/// its own empty database) sees the same state.
pub struct LibsqlStore {
    _db: Database,
    conn: Connection,
}

/// Split a migration file into individual statements
///
/// Works line-wise: comment and blank lines never contribute, so a
/// semicolon inside a comment cannot end a statement. The schema contains
/// no triggers, so a terminating `;` always ends the statement.
fn split_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("--") {
            continue;
        }

        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);

        if trimmed.ends_with(';') {
            statements.push(current.clone());
            current.clear();
        }
    }

    if !current.trim().is_empty() {
        statements.push(current);
    }

    statements
}

impl LibsqlStore {
    /// Validate a database file before opening
    ///
    /// Returns Ok(true) if the file exists and carries a SQLite header,
    /// Ok(false) if it is absent and `must_exist` is off.
    fn validate_database_file(path: &str, must_exist: bool) -> Result<bool> {
        let p = std::path::Path::new(path);

        if !p.exists() {
            if must_exist {
                return Err(VantageError::Database(format!(
                    "Database file not found at '{}'. Run 'vantage init' first or check VANTAGE_DATABASE_URL.",
                    path
                )));
            }
            return Ok(false);
        }

        let bytes = std::fs::read(p)?;
        // A zero-length file is a valid empty database
        if !bytes.is_empty() && (bytes.len() < 16 || &bytes[0..16] != b"SQLite format 3\0") {
            return Err(VantageError::Database(format!(
                "Database file at '{}' is not a valid SQLite database. Delete it and run 'vantage init' to reinitialize.",
                path
            )));
        }

        debug!("Database file validation passed: {}", path);
        Ok(true)
    }

    /// Open a store, optionally creating the database file
    pub async fn connect(mode: ConnectionMode, create_if_missing: bool) -> Result<Self> {
        info!(
            "Connecting to database: {:?} (create_if_missing: {})",
            mode, create_if_missing
        );

        let db = match &mode {
            ConnectionMode::Local(path) => {
                let exists = Self::validate_database_file(path, !create_if_missing)?;
                if create_if_missing && !exists {
                    if let Some(parent) = std::path::Path::new(path).parent() {
                        if !parent.as_os_str().is_empty() {
                            std::fs::create_dir_all(parent)?;
                        }
                    }
                }
                Builder::new_local(path).build().await.map_err(|e| {
                    VantageError::Database(format!("Failed to open local database: {}", e))
                })?
            }
            ConnectionMode::InMemory => {
                Builder::new_local(":memory:").build().await.map_err(|e| {
                    VantageError::Database(format!("Failed to create in-memory database: {}", e))
                })?
            }
        };

        let conn = db
            .connect()
            .map_err(|e| VantageError::Database(format!("Failed to get connection: {}", e)))?;

        let store = Self { _db: db, conn };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Open a local file-based store, creating it if missing
    pub async fn open_local(path: &str) -> Result<Self> {
        Self::connect(ConnectionMode::Local(path.to_string()), true).await
    }

    /// Parse a database URL into a connection mode
    pub fn mode_from_url(database_url: &str) -> ConnectionMode {
        if database_url == ":memory:" {
            ConnectionMode::InMemory
        } else {
            ConnectionMode::Local(database_url.to_string())
        }
    }

    fn get_conn(&self) -> Result<Connection> {
        Ok(self.conn.clone())
    }

    /// Apply any pending embedded migrations
    pub async fn run_migrations(&self) -> Result<()> {
        let conn = self.get_conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations_applied (
                migration_name TEXT PRIMARY KEY,
                applied_at INTEGER NOT NULL
            )",
            params![],
        )
        .await
        .map_err(|e| {
            VantageError::Migration(format!("Failed to create migrations table: {}", e))
        })?;

        for (name, sql) in MIGRATIONS {
            let mut rows = conn
                .query(
                    "SELECT COUNT(*) FROM _migrations_applied WHERE migration_name = ?",
                    params![*name],
                )
                .await?;
            let already_applied = match rows.next().await? {
                Some(row) => row.get::<i64>(0).unwrap_or(0) > 0,
                None => false,
            };
            if already_applied {
                debug!("Skipping already applied migration: {}", name);
                continue;
            }

            for statement in split_statements(sql) {
                conn.execute(&statement, params![]).await.map_err(|e| {
                    VantageError::Migration(format!(
                        "Failed to execute statement in {}: {}\nStatement: {}",
                        name,
                        e,
                        &statement[..statement.len().min(300)]
                    ))
                })?;
            }

            conn.execute(
                "INSERT INTO _migrations_applied (migration_name, applied_at) VALUES (?, ?)",
                params![*name, Utc::now().timestamp()],
            )
            .await
            .map_err(|e| VantageError::Migration(format!("Failed to record migration: {}", e)))?;

            info!("Applied migration: {}", name);
        }

        Ok(())
    }

    // --- row decoding ------------------------------------------------------

    fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
        Ok(DateTime::parse_from_rfc3339(s)
            .map_err(|e| VantageError::Other(format!("Invalid timestamp: {}", e)))?
            .with_timezone(&Utc))
    }

    fn parse_opt_ts(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
        s.as_deref().map(Self::parse_ts).transpose()
    }

    fn row_to_user(row: &libsql::Row) -> Result<User> {
        let id_str: String = row.get(0)?;
        let created_at: String = row.get(6)?;
        Ok(User {
            id: UserId::from_string(&id_str)?,
            name: row.get(1)?,
            email: row.get(2)?,
            department: row.get(3)?,
            job_title: row.get(4)?,
            password_hash: crate::auth::PasswordHash::from_stored(row.get::<String>(5)?),
            created_at: Self::parse_ts(&created_at)?,
        })
    }

    fn row_to_form(row: &libsql::Row) -> Result<Form> {
        let id_str: String = row.get(0)?;
        let due_date: Option<String> = row.get(3)?;
        let subject_matrix_json: String = row.get(8)?;
        let subject_matrix: Vec<SubjectEntry> = serde_json::from_str(&subject_matrix_json)?;
        let questions_json: String = row.get(9)?;
        let questions: Vec<Question> = serde_json::from_str(&questions_json)?;
        let created_by: String = row.get(10)?;
        let creator_json: Option<String> = row.get(11)?;
        let creator: Option<CreatorInfo> = creator_json
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;
        let created_at: String = row.get(12)?;
        let updated_at: String = row.get(13)?;
        let status_str: String = row.get(14)?;
        let status = FormStatus::parse(&status_str)
            .ok_or_else(|| VantageError::Other(format!("Unknown form status: {}", status_str)))?;

        Ok(Form {
            id: FormId::from_string(&id_str)?,
            title: row.get(1)?,
            description: row.get(2)?,
            due_date: Self::parse_opt_ts(due_date)?,
            allow_late_submissions: row.get::<i64>(4)? != 0,
            allow_multiple_responses: row.get::<i64>(5)? != 0,
            notify_on_completion: row.get::<i64>(6)? != 0,
            form_type: row.get(7)?,
            subject_matrix,
            questions,
            created_by: UserId::from_string(&created_by)?,
            creator,
            created_at: Self::parse_ts(&created_at)?,
            updated_at: Self::parse_ts(&updated_at)?,
            status,
        })
    }

    fn row_to_assignment(row: &libsql::Row) -> Result<Assignment> {
        let id_str: String = row.get(0)?;
        let form_id: String = row.get(1)?;
        let participant_type_str: String = row.get(2)?;
        let participant_type = ParticipantType::parse(&participant_type_str).ok_or_else(|| {
            VantageError::Other(format!("Unknown participant type: {}", participant_type_str))
        })?;
        let participant_id: String = row.get(3)?;
        let subject_id: Option<String> = row.get(6)?;
        let evaluator_position: Option<i64> = row.get(9)?;
        let assigned_questions_json: String = row.get(10)?;
        let assigned_questions: Vec<String> = serde_json::from_str(&assigned_questions_json)?;
        let token: String = row.get(11)?;
        let status_str: String = row.get(12)?;
        let status = AssignmentStatus::parse(&status_str).ok_or_else(|| {
            VantageError::Other(format!("Unknown assignment status: {}", status_str))
        })?;
        let created_at: String = row.get(13)?;
        let updated_at: String = row.get(14)?;
        let completed_at: Option<String> = row.get(15)?;
        let due_date: Option<String> = row.get(16)?;

        Ok(Assignment {
            id: AssignmentId::from_string(&id_str)?,
            form_id: FormId::from_string(&form_id)?,
            participant_type,
            participant_id: UserId::from_string(&participant_id)?,
            participant_name: row.get(4)?,
            participant_email: row.get(5)?,
            subject_id: subject_id
                .as_deref()
                .map(UserId::from_string)
                .transpose()?,
            subject_name: row.get(7)?,
            subject_email: row.get(8)?,
            evaluator_position: evaluator_position.map(|p| p as u32),
            assigned_questions,
            token: AccessToken::new(token),
            status,
            created_at: Self::parse_ts(&created_at)?,
            updated_at: Self::parse_ts(&updated_at)?,
            completed_at: Self::parse_opt_ts(completed_at)?,
            due_date: Self::parse_opt_ts(due_date)?,
        })
    }

    fn row_to_response(row: &libsql::Row) -> Result<EvaluationResponse> {
        let id_str: String = row.get(0)?;
        let form_id: String = row.get(1)?;
        let assignment_id: String = row.get(2)?;
        let participant_type_str: String = row.get(3)?;
        let participant_type = ParticipantType::parse(&participant_type_str).ok_or_else(|| {
            VantageError::Other(format!("Unknown participant type: {}", participant_type_str))
        })?;
        let participant_id: String = row.get(4)?;
        let evaluator_position: Option<i64> = row.get(7)?;
        let subject_id: String = row.get(8)?;
        let answers_json: String = row.get(11)?;
        let answers: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&answers_json)?;
        let submitted_at: String = row.get(12)?;
        let updated_at: String = row.get(13)?;
        let token: String = row.get(16)?;

        Ok(EvaluationResponse {
            id: ResponseId::from_string(&id_str)?,
            form_id: FormId::from_string(&form_id)?,
            assignment_id: AssignmentId::from_string(&assignment_id)?,
            participant_type,
            participant_id: UserId::from_string(&participant_id)?,
            participant_name: row.get(5)?,
            participant_email: row.get(6)?,
            evaluator_position: evaluator_position.map(|p| p as u32),
            subject_id: UserId::from_string(&subject_id)?,
            subject_name: row.get(9)?,
            subject_email: row.get(10)?,
            answers,
            submitted_at: Self::parse_ts(&submitted_at)?,
            updated_at: Self::parse_ts(&updated_at)?,
            ip_address: row.get(14)?,
            user_agent: row.get(15)?,
            token: AccessToken::new(token),
        })
    }

    fn row_to_notification(row: &libsql::Row) -> Result<Notification> {
        let id_str: String = row.get(0)?;
        let user_id: String = row.get(1)?;
        let kind_str: String = row.get(2)?;
        let kind = NotificationKind::parse(&kind_str).ok_or_else(|| {
            VantageError::Other(format!("Unknown notification kind: {}", kind_str))
        })?;
        let assignment_id: String = row.get(5)?;
        let form_id: String = row.get(6)?;
        let token: String = row.get(7)?;
        let created_at: String = row.get(9)?;
        let read_at: Option<String> = row.get(10)?;

        Ok(Notification {
            id: NotificationId::from_string(&id_str)?,
            user_id: UserId::from_string(&user_id)?,
            kind,
            title: row.get(3)?,
            message: row.get(4)?,
            assignment_id: AssignmentId::from_string(&assignment_id)?,
            form_id: FormId::from_string(&form_id)?,
            token: AccessToken::new(token),
            read: row.get::<i64>(8)? != 0,
            created_at: Self::parse_ts(&created_at)?,
            read_at: Self::parse_opt_ts(read_at)?,
        })
    }

    // --- insert statements (shared by the transactional writes) ------------

    async fn insert_form_stmt(conn: &Connection, form: &Form) -> Result<()> {
        conn.execute(
            "INSERT INTO forms (id, title, description, due_date, allow_late_submissions,
                allow_multiple_responses, notify_on_completion, form_type, subject_matrix,
                questions, created_by, creator, created_at, updated_at, status)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                form.id.to_string(),
                form.title.clone(),
                form.description.clone(),
                form.due_date.map(|d| d.to_rfc3339()),
                form.allow_late_submissions as i64,
                form.allow_multiple_responses as i64,
                form.notify_on_completion as i64,
                form.form_type.clone(),
                serde_json::to_string(&form.subject_matrix)?,
                serde_json::to_string(&form.questions)?,
                form.created_by.to_string(),
                form.creator
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?,
                form.created_at.to_rfc3339(),
                form.updated_at.to_rfc3339(),
                form.status.as_str(),
            ],
        )
        .await?;
        Ok(())
    }

    async fn update_form_stmt(conn: &Connection, form: &Form) -> Result<u64> {
        let affected = conn
            .execute(
                "UPDATE forms SET title = ?, description = ?, due_date = ?,
                    allow_late_submissions = ?, allow_multiple_responses = ?,
                    notify_on_completion = ?, subject_matrix = ?, questions = ?,
                    updated_at = ?, status = ?
                 WHERE id = ?",
                params![
                    form.title.clone(),
                    form.description.clone(),
                    form.due_date.map(|d| d.to_rfc3339()),
                    form.allow_late_submissions as i64,
                    form.allow_multiple_responses as i64,
                    form.notify_on_completion as i64,
                    serde_json::to_string(&form.subject_matrix)?,
                    serde_json::to_string(&form.questions)?,
                    form.updated_at.to_rfc3339(),
                    form.status.as_str(),
                    form.id.to_string(),
                ],
            )
            .await?;
        Ok(affected)
    }

    async fn insert_assignment_stmt(conn: &Connection, assignment: &Assignment) -> Result<()> {
        conn.execute(
            "INSERT INTO assignments (id, form_id, participant_type, participant_id,
                participant_name, participant_email, subject_id, subject_name, subject_email,
                evaluator_position, assigned_questions, token, status, created_at, updated_at,
                completed_at, due_date)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                assignment.id.to_string(),
                assignment.form_id.to_string(),
                assignment.participant_type.as_str(),
                assignment.participant_id.to_string(),
                assignment.participant_name.clone(),
                assignment.participant_email.clone(),
                assignment.subject_id.map(|id| id.to_string()),
                assignment.subject_name.clone(),
                assignment.subject_email.clone(),
                assignment.evaluator_position.map(|p| p as i64),
                serde_json::to_string(&assignment.assigned_questions)?,
                assignment.token.as_str(),
                assignment.status.as_str(),
                assignment.created_at.to_rfc3339(),
                assignment.updated_at.to_rfc3339(),
                assignment.completed_at.map(|d| d.to_rfc3339()),
                assignment.due_date.map(|d| d.to_rfc3339()),
            ],
        )
        .await?;
        Ok(())
    }

    async fn insert_notification_stmt(
        conn: &Connection,
        notification: &Notification,
    ) -> Result<()> {
        conn.execute(
            "INSERT INTO notifications (id, user_id, kind, title, message, assignment_id,
                form_id, token, read, created_at, read_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                notification.id.to_string(),
                notification.user_id.to_string(),
                notification.kind.as_str(),
                notification.title.clone(),
                notification.message.clone(),
                notification.assignment_id.to_string(),
                notification.form_id.to_string(),
                notification.token.as_str(),
                notification.read as i64,
                notification.created_at.to_rfc3339(),
                notification.read_at.map(|d| d.to_rfc3339()),
            ],
        )
        .await?;
        Ok(())
    }

    async fn insert_fanout(
        conn: &Connection,
        assignments: &[Assignment],
        notifications: &[Notification],
    ) -> Result<()> {
        for assignment in assignments {
            Self::insert_assignment_stmt(conn, assignment).await?;
        }
        for notification in notifications {
            Self::insert_notification_stmt(conn, notification).await?;
        }
        Ok(())
    }

    /// Delete everything keyed to a form except the form document itself
    async fn delete_form_children(conn: &Connection, form_id: FormId) -> Result<u64> {
        let id = form_id.to_string();
        let mut deleted = 0u64;
        deleted += conn
            .execute("DELETE FROM assignments WHERE form_id = ?", params![id.clone()])
            .await?;
        deleted += conn
            .execute("DELETE FROM responses WHERE form_id = ?", params![id.clone()])
            .await?;
        deleted += conn
            .execute("DELETE FROM notifications WHERE form_id = ?", params![id])
            .await?;
        Ok(deleted)
    }

    /// Run a write sequence inside a transaction, rolling back on error
    async fn in_transaction<'a, F, Fut>(&self, conn: &'a Connection, body: F) -> Result<()>
    where
        F: FnOnce(&'a Connection) -> Fut,
        Fut: std::future::Future<Output = Result<()>> + 'a,
    {
        conn.execute("BEGIN IMMEDIATE", params![]).await?;
        match body(conn).await {
            Ok(()) => {
                conn.execute("COMMIT", params![]).await?;
                Ok(())
            }
            Err(e) => {
                let _ = conn.execute("ROLLBACK", params![]).await;
                Err(e)
            }
        }
    }

    async fn count(&self, sql: &str) -> Result<u64> {
        let conn = self.get_conn()?;
        let mut rows = conn.query(sql, params![]).await?;
        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)? as u64),
            None => Ok(0),
        }
    }
}

const FORM_COLUMNS: &str = "id, title, description, due_date, allow_late_submissions, \
    allow_multiple_responses, notify_on_completion, form_type, subject_matrix, questions, \
    created_by, creator, created_at, updated_at, status";

const ASSIGNMENT_COLUMNS: &str = "id, form_id, participant_type, participant_id, \
    participant_name, participant_email, subject_id, subject_name, subject_email, \
    evaluator_position, assigned_questions, token, status, created_at, updated_at, \
    completed_at, due_date";

const RESPONSE_COLUMNS: &str = "id, form_id, assignment_id, participant_type, participant_id, \
    participant_name, participant_email, evaluator_position, subject_id, subject_name, \
    subject_email, answers, submitted_at, updated_at, ip_address, user_agent, token";

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, kind, title, message, assignment_id, form_id, token, read, created_at, read_at";

#[async_trait]
impl Store for LibsqlStore {
    async fn count_users(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM users").await
    }

    async fn insert_users(&self, users: &[User]) -> Result<()> {
        let conn = self.get_conn()?;
        self.in_transaction(&conn, |conn| async move {
            for user in users {
                conn.execute(
                    "INSERT INTO users (id, name, email, department, job_title, password_hash, created_at)
                     VALUES (?, ?, ?, ?, ?, ?, ?)",
                    params![
                        user.id.to_string(),
                        user.name.clone(),
                        user.email.clone(),
                        user.department.clone(),
                        user.job_title.clone(),
                        user.password_hash.as_str(),
                        user.created_at.to_rfc3339(),
                    ],
                )
                .await?;
            }
            Ok(())
        })
        .await
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.get_conn()?;
        let mut rows = conn
            .query(
                "SELECT id, name, email, department, job_title, password_hash, created_at
                 FROM users ORDER BY name",
                params![],
            )
            .await?;
        let mut users = Vec::new();
        while let Some(row) = rows.next().await? {
            users.push(Self::row_to_user(&row)?);
        }
        Ok(users)
    }

    async fn get_user(&self, id: UserId) -> Result<User> {
        let conn = self.get_conn()?;
        let mut rows = conn
            .query(
                "SELECT id, name, email, department, job_title, password_hash, created_at
                 FROM users WHERE id = ?",
                params![id.to_string()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Self::row_to_user(&row),
            None => Err(VantageError::NotFound(format!("user {}", id))),
        }
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.get_conn()?;
        let mut rows = conn
            .query(
                "SELECT id, name, email, department, job_title, password_hash, created_at
                 FROM users WHERE email = ?",
                params![email],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::row_to_user(&row)?)),
            None => Ok(None),
        }
    }

    async fn create_form(
        &self,
        form: &Form,
        assignments: &[Assignment],
        notifications: &[Notification],
    ) -> Result<()> {
        let conn = self.get_conn()?;
        self.in_transaction(&conn, |conn| async move {
            Self::insert_form_stmt(conn, form).await?;
            Self::insert_fanout(conn, assignments, notifications).await
        })
        .await?;
        debug!(
            "Created form {} with {} assignments, {} notifications",
            form.id,
            assignments.len(),
            notifications.len()
        );
        Ok(())
    }

    async fn replace_form(
        &self,
        form: &Form,
        assignments: &[Assignment],
        notifications: &[Notification],
    ) -> Result<()> {
        let conn = self.get_conn()?;
        self.in_transaction(&conn, |conn| async move {
            let affected = Self::update_form_stmt(conn, form).await?;
            if affected == 0 {
                return Err(VantageError::NotFound(format!("form {}", form.id)));
            }
            // Old tokens die here; prior responses go with them so no
            // orphaned rows accumulate
            Self::delete_form_children(conn, form.id).await?;
            Self::insert_fanout(conn, assignments, notifications).await
        })
        .await?;
        debug!(
            "Replaced form {} with {} regenerated assignments",
            form.id,
            assignments.len()
        );
        Ok(())
    }

    async fn insert_form(&self, form: &Form) -> Result<()> {
        let conn = self.get_conn()?;
        Self::insert_form_stmt(&conn, form).await
    }

    async fn get_form(&self, id: FormId) -> Result<Form> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM forms WHERE id = ?", FORM_COLUMNS);
        let mut rows = conn.query(&sql, params![id.to_string()]).await?;
        match rows.next().await? {
            Some(row) => Self::row_to_form(&row),
            None => Err(VantageError::NotFound(format!("form {}", id))),
        }
    }

    async fn list_forms(&self) -> Result<Vec<Form>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM forms ORDER BY created_at DESC", FORM_COLUMNS);
        let mut rows = conn.query(&sql, params![]).await?;
        let mut forms = Vec::new();
        while let Some(row) = rows.next().await? {
            forms.push(Self::row_to_form(&row)?);
        }
        Ok(forms)
    }

    async fn list_forms_by_creator(&self, user_id: UserId) -> Result<Vec<Form>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM forms WHERE created_by = ? ORDER BY created_at DESC",
            FORM_COLUMNS
        );
        let mut rows = conn.query(&sql, params![user_id.to_string()]).await?;
        let mut forms = Vec::new();
        while let Some(row) = rows.next().await? {
            forms.push(Self::row_to_form(&row)?);
        }
        Ok(forms)
    }

    async fn delete_form_cascade(&self, id: FormId) -> Result<()> {
        let conn = self.get_conn()?;
        self.in_transaction(&conn, |conn| async move {
            conn.execute("DELETE FROM forms WHERE id = ?", params![id.to_string()])
                .await?;
            Self::delete_form_children(conn, id).await?;
            Ok(())
        })
        .await
    }

    async fn find_assignment_by_token(&self, token: &AccessToken) -> Result<Option<Assignment>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM assignments WHERE token = ?", ASSIGNMENT_COLUMNS);
        let mut rows = conn.query(&sql, params![token.as_str()]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::row_to_assignment(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_assignments_for_form(&self, form_id: FormId) -> Result<Vec<Assignment>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM assignments WHERE form_id = ? ORDER BY created_at, id",
            ASSIGNMENT_COLUMNS
        );
        let mut rows = conn.query(&sql, params![form_id.to_string()]).await?;
        let mut assignments = Vec::new();
        while let Some(row) = rows.next().await? {
            assignments.push(Self::row_to_assignment(&row)?);
        }
        Ok(assignments)
    }

    async fn list_assignments_for_participant(&self, user_id: UserId) -> Result<Vec<Assignment>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM assignments WHERE participant_id = ? ORDER BY created_at DESC",
            ASSIGNMENT_COLUMNS
        );
        let mut rows = conn.query(&sql, params![user_id.to_string()]).await?;
        let mut assignments = Vec::new();
        while let Some(row) = rows.next().await? {
            assignments.push(Self::row_to_assignment(&row)?);
        }
        Ok(assignments)
    }

    async fn complete_assignment(&self, id: AssignmentId, at: DateTime<Utc>) -> Result<()> {
        let conn = self.get_conn()?;
        let affected = conn
            .execute(
                "UPDATE assignments SET status = 'completed', completed_at = ?, updated_at = ?
                 WHERE id = ?",
                params![at.to_rfc3339(), at.to_rfc3339(), id.to_string()],
            )
            .await?;
        if affected == 0 {
            return Err(VantageError::NotFound(format!("assignment {}", id)));
        }
        Ok(())
    }

    async fn find_response_for_assignment(
        &self,
        assignment_id: AssignmentId,
    ) -> Result<Option<EvaluationResponse>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM responses WHERE assignment_id = ?",
            RESPONSE_COLUMNS
        );
        let mut rows = conn.query(&sql, params![assignment_id.to_string()]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::row_to_response(&row)?)),
            None => Ok(None),
        }
    }

    async fn upsert_response(&self, response: &EvaluationResponse) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO responses (id, form_id, assignment_id, participant_type,
                participant_id, participant_name, participant_email, evaluator_position,
                subject_id, subject_name, subject_email, answers, submitted_at, updated_at,
                ip_address, user_agent, token)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(assignment_id) DO UPDATE SET
                answers = excluded.answers,
                submitted_at = excluded.submitted_at,
                updated_at = excluded.updated_at,
                ip_address = excluded.ip_address,
                user_agent = excluded.user_agent",
            params![
                response.id.to_string(),
                response.form_id.to_string(),
                response.assignment_id.to_string(),
                response.participant_type.as_str(),
                response.participant_id.to_string(),
                response.participant_name.clone(),
                response.participant_email.clone(),
                response.evaluator_position.map(|p| p as i64),
                response.subject_id.to_string(),
                response.subject_name.clone(),
                response.subject_email.clone(),
                serde_json::to_string(&response.answers)?,
                response.submitted_at.to_rfc3339(),
                response.updated_at.to_rfc3339(),
                response.ip_address.clone(),
                response.user_agent.clone(),
                response.token.as_str(),
            ],
        )
        .await?;
        Ok(())
    }

    async fn list_responses_for_form(&self, form_id: FormId) -> Result<Vec<EvaluationResponse>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM responses WHERE form_id = ? ORDER BY submitted_at",
            RESPONSE_COLUMNS
        );
        let mut rows = conn.query(&sql, params![form_id.to_string()]).await?;
        let mut responses = Vec::new();
        while let Some(row) = rows.next().await? {
            responses.push(Self::row_to_response(&row)?);
        }
        Ok(responses)
    }

    async fn list_notifications_for_user(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<Notification>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM notifications WHERE user_id = ? ORDER BY created_at DESC LIMIT ?",
            NOTIFICATION_COLUMNS
        );
        let mut rows = conn
            .query(&sql, params![user_id.to_string(), limit as i64])
            .await?;
        let mut notifications = Vec::new();
        while let Some(row) = rows.next().await? {
            notifications.push(Self::row_to_notification(&row)?);
        }
        Ok(notifications)
    }

    async fn mark_notification_read(&self, id: NotificationId, at: DateTime<Utc>) -> Result<()> {
        let conn = self.get_conn()?;
        let affected = conn
            .execute(
                "UPDATE notifications SET read = 1, read_at = ? WHERE id = ?",
                params![at.to_rfc3339(), id.to_string()],
            )
            .await?;
        if affected == 0 {
            return Err(VantageError::NotFound(format!("notification {}", id)));
        }
        Ok(())
    }

    async fn entity_counts(&self) -> Result<EntityCounts> {
        Ok(EntityCounts {
            forms: self.count("SELECT COUNT(*) FROM forms").await?,
            users: self.count("SELECT COUNT(*) FROM users").await?,
            responses: self.count("SELECT COUNT(*) FROM responses").await?,
            pending_assignments: self
                .count("SELECT COUNT(*) FROM assignments WHERE status = 'pending'")
                .await?,
        })
    }

    async fn clear_all_data(&self) -> Result<u64> {
        let conn = self.get_conn()?;
        let mut total = 0u64;
        conn.execute("BEGIN IMMEDIATE", params![]).await?;
        for table in ["forms", "assignments", "responses", "notifications"] {
            match conn.execute(&format!("DELETE FROM {}", table), params![]).await {
                Ok(deleted) => total += deleted,
                Err(e) => {
                    let _ = conn.execute("ROLLBACK", params![]).await;
                    return Err(e.into());
                }
            }
        }
        conn.execute("COMMIT", params![]).await?;
        info!("Cleared {} documents from evaluation collections", total);
        Ok(total)
    }

    async fn health_check(&self) -> Result<()> {
        let conn = self.get_conn()?;
        conn.query("SELECT 1", params![]).await.map_err(|e| {
            let msg = e.to_string();
            if msg.contains("readonly") || msg.contains("permission") {
                VantageError::Database(
                    "Database is read-only or permission denied. Check file permissions."
                        .to_string(),
                )
            } else if msg.contains("corrupt") || msg.contains("malformed") {
                VantageError::Database(
                    "Database appears to be corrupted. Consider restoring from backup.".to_string(),
                )
            } else {
                VantageError::Database(format!("Health check failed: {}", msg))
            }
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_statements() {
        let sql = "-- comment\nCREATE TABLE a (id TEXT);\n\nCREATE INDEX idx ON a(id);\n-- trailing\n";
        let statements = split_statements(sql);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].contains("CREATE TABLE a"));
        assert!(statements[1].contains("CREATE INDEX idx"));
    }

    #[test]
    fn test_split_statements_ignores_semicolons_in_comments() {
        let sql = "-- Stored as JSON text; timestamps are RFC 3339 strings.\n\
                   CREATE TABLE b (\n    id TEXT PRIMARY KEY, -- unique; never reused\n    data TEXT\n);\n";
        let statements = split_statements(sql);
        assert_eq!(statements.len(), 1);
        assert!(statements[0].starts_with("CREATE TABLE b"));
        assert!(statements[0].trim_end().ends_with(");"));
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let store = LibsqlStore::connect(ConnectionMode::InMemory, true)
            .await
            .unwrap();
        store.run_migrations().await.unwrap();
        assert_eq!(store.count_users().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_in_memory_store_shares_state_across_operations() {
        let store = LibsqlStore::connect(ConnectionMode::InMemory, true)
            .await
            .unwrap();

        let user = User {
            id: UserId::new(),
            name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            department: "Engineering".to_string(),
            job_title: "Analyst".to_string(),
            password_hash: crate::auth::PasswordHash::hash("correct horse"),
            created_at: Utc::now(),
        };
        store.insert_users(std::slice::from_ref(&user)).await.unwrap();

        let users = store.list_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].email, "ada@example.com");
        assert_eq!(
            store
                .find_user_by_email("ada@example.com")
                .await
                .unwrap()
                .map(|u| u.id),
            Some(user.id)
        );
    }

    #[tokio::test]
    async fn test_open_local_creates_and_reopens() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("vantage.db");
        let path_str = path.to_str().unwrap();

        {
            let store = LibsqlStore::open_local(path_str).await.unwrap();
            store.health_check().await.unwrap();
        }
        assert!(path.exists());

        // Reopening an existing database skips already-applied migrations
        let store = LibsqlStore::open_local(path_str).await.unwrap();
        assert_eq!(store.count_users().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rejects_non_database_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("garbage.db");
        std::fs::write(&path, b"this is not a database").unwrap();

        let result = LibsqlStore::open_local(path.to_str().unwrap()).await;
        assert!(matches!(result, Err(VantageError::Database(_))));
    }

    #[tokio::test]
    async fn test_missing_file_errors_without_create() {
        let result = LibsqlStore::connect(
            ConnectionMode::Local("/nonexistent/path/vantage.db".to_string()),
            false,
        )
        .await;
        assert!(matches!(result, Err(VantageError::Database(_))));
    }
}
