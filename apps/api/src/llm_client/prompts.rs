// Shared prompt fragments. Each service that needs LLM calls defines its own prompts.rs
// alongside it and pulls cross-cutting fragments from here.

/// Output must be the finished text only.
pub const PLAIN_TEXT_ONLY: &str = "Respond with the requested text only. \
    Do NOT use markdown. \
    Do NOT add a preamble, notes or explanations.";

/// Keeps generated claims tied to the material supplied in the prompt.
pub const GROUNDING_INSTRUCTION: &str = "\
    CRITICAL: Every claim must be supported by the resume text provided. \
    Do NOT invent employers, titles, dates, metrics or skills. \
    If the resume does not support a claim, omit it.";
