//! Cover-letter generation consumed by the automation engine.
//!
//! Writing a letter never fails from the caller's point of view: the LLM writer falls back to
//! the deterministic template on any error, so a run is never aborted for want of a letter.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::llm_client::LlmClient;
use crate::models::profile::UserProfileRow;

pub mod prompts;

/// Excerpt length used by the template letter.
const EXCERPT_CHARS: usize = 50;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileSummary {
    pub name: Option<String>,
    pub desired_roles: Vec<String>,
    pub field_of_work: Option<String>,
}

impl ProfileSummary {
    pub fn from_profile(profile: Option<&UserProfileRow>) -> Option<Self> {
        let profile = profile?;
        Some(ProfileSummary {
            name: non_blank(profile.name.as_deref()),
            desired_roles: profile
                .desired_roles
                .iter()
                .flatten()
                .filter(|r| !r.trim().is_empty())
                .cloned()
                .collect(),
            field_of_work: non_blank(profile.field_of_work.as_deref()),
        })
    }
}

#[async_trait]
pub trait CoverLetterWriter: Send + Sync {
    async fn write(
        &self,
        resume_text: &str,
        job_description: &str,
        profile: Option<&ProfileSummary>,
    ) -> String;
}

/// Deterministic letter built from short excerpts of the résumé and job description.
pub struct TemplateCoverLetter;

impl TemplateCoverLetter {
    pub fn render(
        resume_text: &str,
        job_description: &str,
        profile: Option<&ProfileSummary>,
    ) -> String {
        let position = profile
            .and_then(|p| p.desired_roles.first())
            .map(|role| format!("the {role} position"))
            .unwrap_or_else(|| "the position".to_string());
        let signature = profile
            .and_then(|p| p.name.as_deref())
            .unwrap_or("Candidate");

        format!(
            "Dear Hiring Manager,\n\n\
             I am writing to express my interest in {position}.\n\
             Based on my experience: {}...\n\
             And your requirements: {}...\n\n\
             I believe I am a great fit.\n\n\
             Sincerely,\n\
             {signature}\n",
            excerpt(resume_text),
            excerpt(job_description),
        )
    }
}

#[async_trait]
impl CoverLetterWriter for TemplateCoverLetter {
    async fn write(
        &self,
        resume_text: &str,
        job_description: &str,
        profile: Option<&ProfileSummary>,
    ) -> String {
        Self::render(resume_text, job_description, profile)
    }
}

pub struct LlmCoverLetter {
    llm: LlmClient,
}

impl LlmCoverLetter {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl CoverLetterWriter for LlmCoverLetter {
    async fn write(
        &self,
        resume_text: &str,
        job_description: &str,
        profile: Option<&ProfileSummary>,
    ) -> String {
        let prompt = prompts::cover_letter_prompt(resume_text, job_description, profile);
        match self.llm.complete(&prompt, &prompts::cover_letter_system()).await {
            Ok(letter) => {
                info!("Cover letter generated by LLM ({} chars)", letter.len());
                letter
            }
            Err(e) => {
                warn!("Cover letter generation failed, using template: {e}");
                TemplateCoverLetter::render(resume_text, job_description, profile)
            }
        }
    }
}

fn excerpt(text: &str) -> String {
    text.trim().chars().take(EXCERPT_CHARS).collect()
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
