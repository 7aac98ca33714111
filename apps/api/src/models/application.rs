use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::profile::{JobPostingRow, ResumeRow, UserProfileRow};

/// Lifecycle status of an application.
///
/// The automation engine only ever moves an application out of `PendingAutomation` or
/// `UserInputNeeded`. The e-mail classification states are written by other services and are
/// kept here so rows carrying them still parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    PendingAutomation,
    Applied,
    EmailConfirmationReceived,
    InterviewInvited,
    Rejected,
    FollowUpReceived,
    OtherUpdate,
    Failed,
    ManualInterventionRequired,
    UserInputNeeded,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 10] = [
        ApplicationStatus::PendingAutomation,
        ApplicationStatus::Applied,
        ApplicationStatus::EmailConfirmationReceived,
        ApplicationStatus::InterviewInvited,
        ApplicationStatus::Rejected,
        ApplicationStatus::FollowUpReceived,
        ApplicationStatus::OtherUpdate,
        ApplicationStatus::Failed,
        ApplicationStatus::ManualInterventionRequired,
        ApplicationStatus::UserInputNeeded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::PendingAutomation => "PENDING_AUTOMATION",
            ApplicationStatus::Applied => "APPLIED",
            ApplicationStatus::EmailConfirmationReceived => "EMAIL_CONFIRMATION_RECEIVED",
            ApplicationStatus::InterviewInvited => "INTERVIEW_INVITED",
            ApplicationStatus::Rejected => "REJECTED",
            ApplicationStatus::FollowUpReceived => "FOLLOW_UP_RECEIVED",
            ApplicationStatus::OtherUpdate => "OTHER_UPDATE",
            ApplicationStatus::Failed => "FAILED",
            ApplicationStatus::ManualInterventionRequired => "MANUAL_INTERVENTION_REQUIRED",
            ApplicationStatus::UserInputNeeded => "USER_INPUT_NEEDED",
        }
    }

    /// Statuses an automation run may conclude with.
    pub fn is_automation_outcome(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Applied
                | ApplicationStatus::UserInputNeeded
                | ApplicationStatus::ManualInterventionRequired
                | ApplicationStatus::Failed
        )
    }

    /// Transitions the engine is allowed to record.
    ///
    /// `Failed` is reachable from anywhere because the failure boundary and the
    /// missing-checkpoint path must always be able to conclude a run.
    pub fn can_transition_to(&self, next: ApplicationStatus) -> bool {
        if next == ApplicationStatus::Failed {
            return true;
        }
        matches!(
            self,
            ApplicationStatus::PendingAutomation | ApplicationStatus::UserInputNeeded
        ) && next.is_automation_outcome()
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ApplicationStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Unknown application status '{s}'")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApplicationRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub job_posting_id: Uuid,
    pub status: String,
    pub screenshot_path: Option<String>,
    pub cover_letter_text: Option<String>,
    pub automation_state: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ApplicationRow {
    pub fn parsed_status(&self) -> Result<ApplicationStatus, AppError> {
        self.status.parse()
    }
}

/// One row of the append-only status log.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StatusEventRow {
    pub id: Uuid,
    pub application_id: Uuid,
    pub status: String,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Everything a run needs about one application, loaded in one go.
#[derive(Debug, Clone)]
pub struct ApplicationContext {
    pub application: ApplicationRow,
    pub job_posting: JobPostingRow,
    pub account_email: Option<String>,
    pub profile: Option<UserProfileRow>,
    pub resume: Option<ResumeRow>,
}
