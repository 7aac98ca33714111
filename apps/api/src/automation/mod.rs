pub mod browser;
pub mod checkpoint;
pub mod detector;
pub mod filler;
pub mod handlers;
pub mod orchestrator;
pub mod page;
pub mod screenshot;
pub mod selectors;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::automation::page::ElementHandle;

/// Tunables for one engine instance, built from [`crate::config::Config`].
#[derive(Debug, Clone)]
pub struct AutomationSettings {
    /// Fill everything but never click the submit control.
    pub dry_run: bool,
    pub navigation_timeout: Duration,
    pub page_settle: Duration,
    pub submit_settle: Duration,
    pub screenshot_dir: PathBuf,
}

impl Default for AutomationSettings {
    fn default() -> Self {
        Self {
            dry_run: false,
            navigation_timeout: Duration::from_secs(30),
            page_settle: Duration::from_millis(2000),
            submit_settle: Duration::from_millis(3000),
            screenshot_dir: PathBuf::from("uploads/screenshots"),
        }
    }
}

/// Failures inside a browser session. These never escape a run: the orchestrator turns every
/// one of them into a terminal status.
#[derive(Debug, Error)]
pub enum AutomationError {
    #[error("Navigation timeout for {url}")]
    NavigationTimeout { url: String },

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Element {0:?} is no longer on the page")]
    ElementGone(ElementHandle),

    #[error("Automation task panicked: {0}")]
    Panicked(String),
}

impl AutomationError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, AutomationError::NavigationTimeout { .. })
    }
}

/// Cuts `text` to at most `max` characters, on a char boundary.
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
