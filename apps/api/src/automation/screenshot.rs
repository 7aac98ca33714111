use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::automation::page::FormPage;

/// The moment in a run a screenshot documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStage {
    Captcha,
    CaptchaResume,
    NoForm,
    NeedsInput,
    Filled,
    ResumedFilled,
    Submitted,
    Timeout,
    Error,
}

impl CaptureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureStage::Captcha => "captcha",
            CaptureStage::CaptchaResume => "captcha_resume",
            CaptureStage::NoForm => "no_form",
            CaptureStage::NeedsInput => "needs_input",
            CaptureStage::Filled => "filled",
            CaptureStage::ResumedFilled => "resumed_filled",
            CaptureStage::Submitted => "submitted",
            CaptureStage::Timeout => "timeout",
            CaptureStage::Error => "error",
        }
    }
}

/// Result of a best-effort capture. `Unavailable` is logged distinctly from `Captured` and never
/// overwrites the application's last good screenshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenshotRecord {
    Captured(PathBuf),
    Unavailable { stage: CaptureStage, reason: String },
}

impl ScreenshotRecord {
    pub fn path(&self) -> Option<&Path> {
        match self {
            ScreenshotRecord::Captured(path) => Some(path),
            ScreenshotRecord::Unavailable { .. } => None,
        }
    }
}

pub fn screenshot_file_name(
    application_id: Uuid,
    stage: CaptureStage,
    at: DateTime<Utc>,
) -> String {
    format!(
        "app_{}_{}_{}.png",
        application_id,
        stage.as_str(),
        at.format("%Y%m%d_%H%M%S")
    )
}

/// Captures the current page into `dir`. Never fails: problems come back as `Unavailable`.
pub async fn capture(
    page: Option<&mut (dyn FormPage + '_)>,
    dir: &Path,
    application_id: Uuid,
    stage: CaptureStage,
) -> ScreenshotRecord {
    let Some(page) = page else {
        return unavailable(application_id, stage, "no browser page".to_string());
    };

    if let Err(e) = tokio::fs::create_dir_all(dir).await {
        return unavailable(
            application_id,
            stage,
            format!("cannot create {}: {e}", dir.display()),
        );
    }

    let path = dir.join(screenshot_file_name(application_id, stage, Utc::now()));
    match page.screenshot(&path).await {
        Ok(()) => {
            info!(
                "Screenshot captured for application {application_id} ({}): {}",
                stage.as_str(),
                path.display()
            );
            ScreenshotRecord::Captured(path)
        }
        Err(e) => unavailable(application_id, stage, e.to_string()),
    }
}

fn unavailable(application_id: Uuid, stage: CaptureStage, reason: String) -> ScreenshotRecord {
    warn!(
        "Screenshot unavailable for application {application_id} ({}): {reason}",
        stage.as_str()
    );
    ScreenshotRecord::Unavailable { stage, reason }
}
