//! Persistence for the engine: application loading, the status log and the checkpoint.
//!
//! Status and checkpoint are always written together, compare-and-set against the status the
//! run started from. If someone else (a manual board edit, the e-mail classifier) moved the
//! application in the meantime, the run's write is dropped instead of clobbering theirs.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::automation::checkpoint::{Checkpoint, MissingField};
use crate::errors::AppError;
use crate::models::application::{
    ApplicationContext, ApplicationRow, ApplicationStatus, StatusEventRow,
};
use crate::models::profile::{JobPostingRow, ResumeRow, UserProfileRow};

/// A status change requested by a run.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Move to `USER_INPUT_NEEDED`, storing (or replacing) the checkpoint.
    Pause { checkpoint: Checkpoint, message: String },
    /// Move to any other outcome. Always clears the checkpoint.
    Conclude {
        status: ApplicationStatus,
        message: String,
    },
}

impl Transition {
    pub fn conclude(status: ApplicationStatus, message: impl Into<String>) -> Self {
        Transition::Conclude {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> ApplicationStatus {
        match self {
            Transition::Pause { .. } => ApplicationStatus::UserInputNeeded,
            Transition::Conclude { status, .. } => *status,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Transition::Pause { message, .. } | Transition::Conclude { message, .. } => message,
        }
    }

    /// The `automation_state` column value this transition leaves behind.
    pub fn automation_state(&self) -> Option<serde_json::Value> {
        match self {
            Transition::Pause { checkpoint, .. } => Some(checkpoint.to_state()),
            Transition::Conclude { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    Recorded,
    /// The row no longer had the expected status; nothing was written.
    Superseded { current: Option<String> },
}

/// What a caller needs to render the application's automation state and input prompt.
#[derive(Debug, Clone, Serialize)]
pub struct AutomationView {
    pub application_id: Uuid,
    pub status: ApplicationStatus,
    pub screenshot_path: Option<String>,
    pub missing_fields: Vec<MissingField>,
    pub filled_fields: BTreeMap<String, String>,
}

impl AutomationView {
    pub fn from_row(row: &ApplicationRow) -> Result<Self, AppError> {
        let checkpoint = row
            .automation_state
            .as_ref()
            .map(Checkpoint::from_state)
            .transpose()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Unreadable automation state: {e}")))?;
        let (missing_fields, filled_fields) = checkpoint
            .map(|cp| (cp.missing_fields, cp.filled_fields))
            .unwrap_or_default();

        Ok(AutomationView {
            application_id: row.id,
            status: row.parsed_status()?,
            screenshot_path: row.screenshot_path.clone(),
            missing_fields,
            filled_fields,
        })
    }
}

#[async_trait]
pub trait ApplicationStore: Send + Sync {
    async fn load_application(&self, id: Uuid) -> Result<Option<ApplicationRow>, AppError>;

    async fn load_context(&self, id: Uuid) -> Result<Option<ApplicationContext>, AppError>;

    async fn save_cover_letter(&self, id: Uuid, text: &str) -> Result<(), AppError>;

    async fn save_screenshot(&self, id: Uuid, path: &str) -> Result<(), AppError>;

    /// Applies `transition` if the application is still in `expected`, appending exactly one
    /// status event in the same database transaction.
    async fn transition(
        &self,
        id: Uuid,
        expected: ApplicationStatus,
        transition: Transition,
    ) -> Result<TransitionOutcome, AppError>;

    /// The status log, oldest first.
    async fn status_events(&self, id: Uuid) -> Result<Vec<StatusEventRow>, AppError>;
}

pub struct PgApplicationStore {
    pool: PgPool,
}

impl PgApplicationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApplicationStore for PgApplicationStore {
    async fn load_application(&self, id: Uuid) -> Result<Option<ApplicationRow>, AppError> {
        Ok(
            sqlx::query_as::<_, ApplicationRow>("SELECT * FROM applications WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn load_context(&self, id: Uuid) -> Result<Option<ApplicationContext>, AppError> {
        let Some(application) = self.load_application(id).await? else {
            return Ok(None);
        };

        let job_posting = sqlx::query_as::<_, JobPostingRow>(
            "SELECT id, title, company_name, description, url FROM job_postings WHERE id = $1",
        )
        .bind(application.job_posting_id)
        .fetch_one(&self.pool)
        .await?;

        let account_email: Option<String> =
            sqlx::query_scalar("SELECT email FROM users WHERE id = $1")
                .bind(application.user_id)
                .fetch_optional(&self.pool)
                .await?;

        let profile = sqlx::query_as::<_, UserProfileRow>(
            r#"
            SELECT user_id, name, phone_number, address, location, desired_roles, field_of_work
            FROM user_profiles
            WHERE user_id = $1
            "#,
        )
        .bind(application.user_id)
        .fetch_optional(&self.pool)
        .await?;

        let resume = sqlx::query_as::<_, ResumeRow>(
            "SELECT user_id, file_path, raw_text FROM resumes WHERE user_id = $1",
        )
        .bind(application.user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(Some(ApplicationContext {
            application,
            job_posting,
            account_email,
            profile,
            resume,
        }))
    }

    async fn save_cover_letter(&self, id: Uuid, text: &str) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE applications SET cover_letter_text = $1, updated_at = now() WHERE id = $2",
        )
        .bind(text)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_screenshot(&self, id: Uuid, path: &str) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE applications SET screenshot_path = $1, updated_at = now() WHERE id = $2",
        )
        .bind(path)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn transition(
        &self,
        id: Uuid,
        expected: ApplicationStatus,
        transition: Transition,
    ) -> Result<TransitionOutcome, AppError> {
        let status = transition.status();
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE applications
            SET status = $1, automation_state = $2, updated_at = now()
            WHERE id = $3 AND status = $4
            "#,
        )
        .bind(status.as_str())
        .bind(transition.automation_state())
        .bind(id)
        .bind(expected.as_str())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            let current: Option<String> =
                sqlx::query_scalar("SELECT status FROM applications WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await?;
            tx.rollback().await?;
            return Ok(TransitionOutcome::Superseded { current });
        }

        // Append-only: events are never updated or deleted
        sqlx::query(
            r#"
            INSERT INTO application_status_events (id, application_id, status, message)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(id)
        .bind(status.as_str())
        .bind(transition.message())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(TransitionOutcome::Recorded)
    }

    async fn status_events(&self, id: Uuid) -> Result<Vec<StatusEventRow>, AppError> {
        Ok(sqlx::query_as::<_, StatusEventRow>(
            r#"
            SELECT id, application_id, status, message, created_at
            FROM application_status_events
            WHERE application_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?)
    }
}
