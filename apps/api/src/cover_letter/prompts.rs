// Cover-letter prompt constants.
// Reuses cross-cutting fragments from llm_client::prompts.

use crate::cover_letter::ProfileSummary;
use crate::llm_client::prompts::{GROUNDING_INSTRUCTION, PLAIN_TEXT_ONLY};

/// Résumé and job description are cut to this many characters before prompting.
pub const MAX_SOURCE_CHARS: usize = 6000;

pub fn cover_letter_system() -> String {
    format!(
        "You are an experienced career coach writing concise, specific cover letters. \
        {PLAIN_TEXT_ONLY} {GROUNDING_INSTRUCTION}"
    )
}

/// Cover-letter prompt. `resume_text` and `job_description` are truncated to
/// [`MAX_SOURCE_CHARS`].
pub fn cover_letter_prompt(
    resume_text: &str,
    job_description: &str,
    profile: Option<&ProfileSummary>,
) -> String {
    let candidate = match profile {
        Some(p) => {
            let mut lines = Vec::new();
            if let Some(name) = &p.name {
                lines.push(format!("Name: {name}"));
            }
            if !p.desired_roles.is_empty() {
                lines.push(format!("Desired roles: {}", p.desired_roles.join(", ")));
            }
            if let Some(field) = &p.field_of_work {
                lines.push(format!("Field of work: {field}"));
            }
            lines.join("\n")
        }
        None => String::new(),
    };

    format!(
        r#"Write a cover letter of three short paragraphs for the job below.

Address it to "Hiring Manager". Sign it with the candidate's name if one is given.

CANDIDATE
{candidate}

RESUME
{resume}

JOB DESCRIPTION
{job}
"#,
        resume = clip(resume_text),
        job = clip(job_description),
    )
}

fn clip(text: &str) -> String {
    text.chars().take(MAX_SOURCE_CHARS).collect()
}
