//! Orchestrator: owns the run/resume state machine.
//!
//! ```text
//! PENDING_AUTOMATION ──run──▶ APPLIED | USER_INPUT_NEEDED | MANUAL_INTERVENTION_REQUIRED | FAILED
//! USER_INPUT_NEEDED ──resume──▶ (same set)
//! ```
//!
//! Every run opens its own browser session, closes it on every exit path, and ends with exactly
//! one recorded transition. Nothing is thrown back to the caller: failures, panics included,
//! become `FAILED`.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::automation::checkpoint::{pause_message, Checkpoint, MissingField};
use crate::automation::detector::{
    detect_captcha, detect_fields, detect_submit_control, discover_unknown_fields, DetectedFields,
};
use crate::automation::filler::{
    fill_detected_fields, fill_named_fields, is_detected, locate_resume_file, FieldValues,
    ProfileValues,
};
use crate::automation::page::{BrowserLauncher, FormPage};
use crate::automation::screenshot::{capture, CaptureStage, ScreenshotRecord};
use crate::automation::store::{ApplicationStore, Transition, TransitionOutcome};
use crate::automation::{truncate_chars, AutomationError, AutomationSettings};
use crate::cover_letter::{CoverLetterWriter, ProfileSummary};
use crate::errors::AppError;
use crate::models::application::ApplicationStatus;

/// Failure messages carry at most this many characters of the underlying error.
const ERROR_MESSAGE_CHARS: usize = 200;

pub struct Orchestrator {
    store: Arc<dyn ApplicationStore>,
    launcher: Arc<dyn BrowserLauncher>,
    cover_letters: Arc<dyn CoverLetterWriter>,
    settings: AutomationSettings,
}

/// What a browser session is asked to do.
enum Procedure {
    Fresh {
        url: String,
        profile: ProfileValues,
        resume_file: Option<PathBuf>,
        cover_letter: String,
    },
    Resume {
        checkpoint: Checkpoint,
        merged: BTreeMap<String, String>,
        profile: ProfileValues,
        resume_file: Option<PathBuf>,
    },
}

impl Procedure {
    fn url(&self) -> &str {
        match self {
            Procedure::Fresh { url, .. } => url,
            Procedure::Resume { checkpoint, .. } => &checkpoint.page_url,
        }
    }

    fn captcha(&self) -> (CaptureStage, String) {
        match self {
            Procedure::Fresh { url, .. } => (
                CaptureStage::Captcha,
                format!("CAPTCHA detected. Please apply manually at: {url}"),
            ),
            Procedure::Resume { checkpoint, .. } => (
                CaptureStage::CaptchaResume,
                format!(
                    "CAPTCHA detected on resume. Apply manually at: {}",
                    checkpoint.page_url
                ),
            ),
        }
    }

    fn failure(&self, e: &AutomationError) -> Transition {
        let message = match (self, e.is_timeout()) {
            (Procedure::Fresh { url, .. }, true) => format!("Navigation timeout for {url}"),
            (Procedure::Resume { checkpoint, .. }, true) => format!(
                "Navigation timeout during resume for {}",
                checkpoint.page_url
            ),
            (Procedure::Fresh { .. }, false) => format!(
                "Automation error: {}",
                truncate_chars(&e.to_string(), ERROR_MESSAGE_CHARS)
            ),
            (Procedure::Resume { .. }, false) => format!(
                "Resume automation error: {}",
                truncate_chars(&e.to_string(), ERROR_MESSAGE_CHARS)
            ),
        };
        Transition::conclude(ApplicationStatus::Failed, message)
    }
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn ApplicationStore>,
        launcher: Arc<dyn BrowserLauncher>,
        cover_letters: Arc<dyn CoverLetterWriter>,
        settings: AutomationSettings,
    ) -> Self {
        Self {
            store,
            launcher,
            cover_letters,
            settings,
        }
    }

    /// Schedules [`Orchestrator::run`] on a background task.
    pub fn start(self: &Arc<Self>, application_id: Uuid) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.run(application_id).await })
    }

    /// Schedules [`Orchestrator::resume`] on a background task.
    pub fn start_resume(
        self: &Arc<Self>,
        application_id: Uuid,
        user_fields: BTreeMap<String, String>,
    ) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.resume(application_id, user_fields).await })
    }

    /// First automation attempt for a `PENDING_AUTOMATION` application.
    pub async fn run(&self, application_id: Uuid) {
        info!("Starting automation for application {application_id}");
        if let Err(e) = self.try_run(application_id).await {
            error!("Automation for application {application_id} aborted: {e}");
        }
    }

    /// Continues a paused application with the values the user supplied.
    pub async fn resume(&self, application_id: Uuid, user_fields: BTreeMap<String, String>) {
        info!("Resuming automation for application {application_id}");
        if let Err(e) = self.try_resume(application_id, user_fields).await {
            error!("Resume for application {application_id} aborted: {e}");
        }
    }

    async fn try_run(&self, id: Uuid) -> Result<(), AppError> {
        let Some(ctx) = self.store.load_context(id).await? else {
            error!("Application {id} not found");
            return Ok(());
        };
        let status = ctx.application.parsed_status()?;
        if status != ApplicationStatus::PendingAutomation {
            warn!("Application {id} is {status}, not pending automation; skipping");
            return Ok(());
        }

        let resume_text = ctx
            .resume
            .as_ref()
            .and_then(|r| r.raw_text.as_deref())
            .unwrap_or("No resume uploaded");
        let job_description = ctx
            .job_posting
            .description
            .as_deref()
            .unwrap_or("No description available");
        let summary = ProfileSummary::from_profile(ctx.profile.as_ref());
        let cover_letter = self
            .cover_letters
            .write(resume_text, job_description, summary.as_ref())
            .await;
        match self.store.save_cover_letter(id, &cover_letter).await {
            Ok(()) => info!(
                "Cover letter ready for application {id} ({} chars)",
                cover_letter.len()
            ),
            Err(e) => warn!("Could not store cover letter for application {id}: {e}"),
        }

        let Some(url) = ctx
            .job_posting
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
        else {
            return self
                .record(
                    id,
                    status,
                    Transition::conclude(
                        ApplicationStatus::ManualInterventionRequired,
                        "No job URL available. Please apply manually.",
                    ),
                )
                .await;
        };

        let procedure = Procedure::Fresh {
            url: url.to_string(),
            profile: ProfileValues::from_context(&ctx, &cover_letter),
            resume_file: locate_resume_file(ctx.resume.as_ref()).await,
            cover_letter,
        };
        let transition = self.in_session(id, &procedure).await;
        self.record(id, status, transition).await
    }

    async fn try_resume(
        &self,
        id: Uuid,
        user_fields: BTreeMap<String, String>,
    ) -> Result<(), AppError> {
        let Some(ctx) = self.store.load_context(id).await? else {
            error!("Application {id} not found");
            return Ok(());
        };
        let status = ctx.application.parsed_status()?;

        let checkpoint = match ctx.application.automation_state.as_ref() {
            None => {
                error!("No saved automation state for application {id}");
                return self
                    .record(
                        id,
                        status,
                        Transition::conclude(
                            ApplicationStatus::Failed,
                            "No saved automation state found.",
                        ),
                    )
                    .await;
            }
            Some(state) => match Checkpoint::from_state(state) {
                Ok(checkpoint) => checkpoint,
                Err(e) => {
                    error!("Unreadable automation state for application {id}: {e}");
                    let message = format!(
                        "Saved automation state is unreadable: {}",
                        truncate_chars(&e.to_string(), ERROR_MESSAGE_CHARS)
                    );
                    let transition = Transition::conclude(ApplicationStatus::Failed, message);
                    return self.record(id, status, transition).await;
                }
            },
        };
        if status != ApplicationStatus::UserInputNeeded {
            warn!("Application {id} is {status}, not awaiting input; skipping resume");
            return Ok(());
        }

        let merged = checkpoint.merged_fields(&user_fields);
        let cover_letter = if checkpoint.cover_letter_text.trim().is_empty() {
            ctx.application.cover_letter_text.clone().unwrap_or_default()
        } else {
            checkpoint.cover_letter_text.clone()
        };

        let procedure = Procedure::Resume {
            profile: ProfileValues::from_context(&ctx, &cover_letter),
            resume_file: locate_resume_file(ctx.resume.as_ref()).await,
            checkpoint,
            merged,
        };
        let transition = self.in_session(id, &procedure).await;
        self.record(id, status, transition).await
    }

    /// Runs `procedure` in a fresh browser session. Always returns the transition to record,
    /// and always closes the session.
    async fn in_session(&self, id: Uuid, procedure: &Procedure) -> Transition {
        let mut page = match self.launcher.launch().await {
            Ok(page) => page,
            Err(e) => {
                error!("Browser launch failed for application {id}: {e}");
                self.snap(id, None, CaptureStage::Error).await;
                return procedure.failure(&e);
            }
        };

        let outcome = AssertUnwindSafe(self.drive(id, page.as_mut(), procedure))
            .catch_unwind()
            .await;

        let transition = match outcome {
            Ok(Ok(transition)) => transition,
            Ok(Err(e)) => {
                error!("Automation failed for application {id}: {e}");
                let stage = if e.is_timeout() {
                    CaptureStage::Timeout
                } else {
                    CaptureStage::Error
                };
                self.snap(id, Some(page.as_mut()), stage).await;
                procedure.failure(&e)
            }
            Err(panic) => {
                let e = AutomationError::Panicked(panic_message(panic.as_ref()));
                error!("Automation panicked for application {id}: {e}");
                self.snap(id, Some(page.as_mut()), CaptureStage::Error).await;
                procedure.failure(&e)
            }
        };

        if let Err(e) = page.close().await {
            warn!("Failed to close browser for application {id}: {e}");
        }
        transition
    }

    async fn drive(
        &self,
        id: Uuid,
        page: &mut dyn FormPage,
        procedure: &Procedure,
    ) -> Result<Transition, AutomationError> {
        let url = procedure.url();
        self.navigate(page, url).await?;

        let snapshot = page.snapshot().await?;
        if detect_captcha(&snapshot).is_some() {
            let (stage, message) = procedure.captcha();
            self.snap(id, Some(&mut *page), stage).await;
            return Ok(Transition::conclude(
                ApplicationStatus::ManualInterventionRequired,
                message,
            ));
        }

        let detected = detect_fields(&snapshot);

        match procedure {
            Procedure::Fresh {
                url,
                profile,
                resume_file,
                cover_letter,
            } => {
                if detected.is_empty() {
                    self.snap(id, Some(&mut *page), CaptureStage::NoForm).await;
                    return Ok(Transition::conclude(
                        ApplicationStatus::ManualInterventionRequired,
                        format!("No application form detected. Apply manually at: {url}"),
                    ));
                }

                let no_overrides = BTreeMap::new();
                let values = FieldValues {
                    profile,
                    overrides: &no_overrides,
                    resume_file: resume_file.as_deref(),
                };
                let report = fill_detected_fields(&mut *page, &detected, &values).await;
                info!(
                    "Filled {:?}, missing {:?}",
                    report.filled.keys().collect::<Vec<_>>(),
                    report.missing.iter().map(|m| &m.key).collect::<Vec<_>>()
                );

                let mut missing = report.missing;
                missing.extend(discover_unknown_fields(&snapshot, &detected));

                if !missing.is_empty() {
                    self.snap(id, Some(&mut *page), CaptureStage::NeedsInput).await;
                    return Ok(Transition::Pause {
                        message: pause_message(report.filled.len(), &missing),
                        checkpoint: Checkpoint {
                            page_url: url.clone(),
                            filled_fields: report.filled,
                            missing_fields: missing,
                            cover_letter_text: cover_letter.clone(),
                        },
                    });
                }

                self.snap(id, Some(&mut *page), CaptureStage::Filled).await;
                self.complete(id, page, url, report.filled.len()).await
            }

            Procedure::Resume {
                checkpoint,
                merged,
                profile,
                resume_file,
            } => {
                let values = FieldValues {
                    profile,
                    overrides: merged,
                    resume_file: resume_file.as_deref(),
                };
                let mut report = fill_detected_fields(&mut *page, &detected, &values).await;
                report.absorb(
                    fill_named_fields(
                        &mut *page,
                        &snapshot,
                        &detected,
                        merged,
                        &checkpoint.missing_fields,
                    )
                    .await,
                );

                let missing = still_missing(
                    report.missing,
                    checkpoint.outstanding(merged),
                    &detected,
                );
                if !missing.is_empty() {
                    self.snap(id, Some(&mut *page), CaptureStage::NeedsInput).await;
                    let mut filled_fields = merged.clone();
                    filled_fields.extend(report.filled.clone());
                    return Ok(Transition::Pause {
                        message: pause_message(report.filled.len(), &missing),
                        checkpoint: Checkpoint {
                            page_url: checkpoint.page_url.clone(),
                            filled_fields,
                            missing_fields: missing,
                            cover_letter_text: checkpoint.cover_letter_text.clone(),
                        },
                    });
                }

                self.snap(id, Some(&mut *page), CaptureStage::ResumedFilled).await;
                self.complete(id, page, &checkpoint.page_url, report.filled.len())
                    .await
            }
        }
    }

    /// Navigates under the configured timeout, then lets the page settle.
    async fn navigate(&self, page: &mut dyn FormPage, url: &str) -> Result<(), AutomationError> {
        match tokio::time::timeout(self.settings.navigation_timeout, page.navigate(url)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(AutomationError::NavigationTimeout {
                    url: url.to_string(),
                })
            }
        }
        page.settle(self.settings.page_settle).await;
        Ok(())
    }

    /// The submit (or dry-run) decision once every field has a value.
    async fn complete(
        &self,
        id: Uuid,
        page: &mut dyn FormPage,
        url: &str,
        filled: usize,
    ) -> Result<Transition, AutomationError> {
        let snapshot = page.snapshot().await?;
        let Some(submit) = detect_submit_control(&snapshot) else {
            return Ok(Transition::conclude(
                ApplicationStatus::ManualInterventionRequired,
                format!("Form filled but no submit button found. Apply manually at: {url}"),
            ));
        };

        if self.settings.dry_run {
            info!("Dry run: not submitting application {id}");
            return Ok(Transition::conclude(
                ApplicationStatus::Applied,
                format!("Form filled successfully (dry run). {filled} fields completed."),
            ));
        }

        page.click(submit).await?;
        page.settle(self.settings.submit_settle).await;
        self.snap(id, Some(page), CaptureStage::Submitted).await;
        Ok(Transition::conclude(
            ApplicationStatus::Applied,
            format!("Application submitted successfully. {filled} fields filled."),
        ))
    }

    /// Best-effort screenshot; a captured file becomes the application's latest screenshot.
    async fn snap(
        &self,
        id: Uuid,
        page: Option<&mut (dyn FormPage + '_)>,
        stage: CaptureStage,
    ) -> ScreenshotRecord {
        let record = capture(page, &self.settings.screenshot_dir, id, stage).await;
        if let Some(path) = record.path() {
            if let Err(e) = self
                .store
                .save_screenshot(id, &path.to_string_lossy())
                .await
            {
                warn!("Could not store screenshot path for application {id}: {e}");
            }
        }
        record
    }

    async fn record(
        &self,
        id: Uuid,
        expected: ApplicationStatus,
        transition: Transition,
    ) -> Result<(), AppError> {
        let status = transition.status();
        if !expected.can_transition_to(status) {
            error!("Refusing transition {expected} -> {status} for application {id}");
            return Ok(());
        }

        let message = transition.message().to_string();
        match self.store.transition(id, expected, transition).await? {
            TransitionOutcome::Recorded => {
                info!("Application {id} status -> {status}: {message}");
            }
            TransitionOutcome::Superseded { current } => {
                warn!(
                    "Application {id} moved to {} during automation; dropped {status} ({message})",
                    current.as_deref().unwrap_or("<deleted>")
                );
            }
        }
        Ok(())
    }
}

/// Fields still lacking a value after a resume fill: what the filler could not place, plus
/// checkpoint fields the user left unanswered. Detected semantic fields are already covered by
/// the filler's own report.
fn still_missing(
    filler: Vec<MissingField>,
    outstanding: Vec<MissingField>,
    detected: &DetectedFields,
) -> Vec<MissingField> {
    let mut missing = filler;
    for field in outstanding {
        if is_detected(detected, &field.key) || missing.iter().any(|m| m.key == field.key) {
            continue;
        }
        missing.push(field);
    }
    missing
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
