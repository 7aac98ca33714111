use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::automation::AutomationSettings;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// When unset the template cover-letter writer is used.
    pub anthropic_api_key: Option<String>,
    pub port: u16,
    pub rust_log: String,
    pub screenshot_dir: PathBuf,
    /// Fill forms but never click the submit control.
    pub dry_run: bool,
    pub navigation_timeout: Duration,
    pub page_settle: Duration,
    pub submit_settle: Duration,
    pub browser_headless: bool,
    /// Chromium binary; when unset chromiumoxide searches the usual install locations.
    pub chrome_executable: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            anthropic_api_key: std::env::var("ANTHROPIC_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            screenshot_dir: std::env::var("SCREENSHOT_DIR")
                .unwrap_or_else(|_| "uploads/screenshots".to_string())
                .into(),
            dry_run: env_bool("AUTOMATION_DRY_RUN", true)?,
            navigation_timeout: Duration::from_secs(env_u64("NAVIGATION_TIMEOUT_SECS", 30)?),
            page_settle: Duration::from_millis(env_u64("PAGE_SETTLE_MS", 2000)?),
            submit_settle: Duration::from_millis(env_u64("SUBMIT_SETTLE_MS", 3000)?),
            browser_headless: env_bool("BROWSER_HEADLESS", true)?,
            chrome_executable: std::env::var("CHROME_BIN")
                .ok()
                .filter(|bin| !bin.trim().is_empty())
                .map(PathBuf::from),
        })
    }

    pub fn automation_settings(&self) -> AutomationSettings {
        AutomationSettings {
            dry_run: self.dry_run,
            navigation_timeout: self.navigation_timeout,
            page_settle: self.page_settle,
            submit_settle: self.submit_settle,
            screenshot_dir: self.screenshot_dir.clone(),
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_u64(key: &str, default: u64) -> Result<u64> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .with_context(|| format!("{key} must be a non-negative integer")),
        Err(_) => Ok(default),
    }
}

fn env_bool(key: &str, default: bool) -> Result<bool> {
    match std::env::var(key) {
        Ok(raw) => parse_bool(&raw).with_context(|| format!("{key} must be a boolean")),
        Err(_) => Ok(default),
    }
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("unrecognised boolean '{other}'"),
    }
}
