//! Selector tables for field, CAPTCHA and submit-control detection.
//!
//! Every pattern pairs the CSS selector it stands for (used in logs) with the predicate that
//! is actually evaluated against an [`ElementSnapshot`]. Attribute comparisons are
//! case-insensitive, matching the `i` flag the selectors are written with.

use serde::{Deserialize, Serialize};

use crate::automation::page::ElementSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attr {
    Type,
    Name,
    Id,
    Placeholder,
    AriaLabel,
    Title,
    Accept,
    Src,
}

impl Attr {
    fn read(self, el: &ElementSnapshot) -> Option<&str> {
        match self {
            Attr::Type => el.input_type.as_deref(),
            Attr::Name => el.name.as_deref(),
            Attr::Id => el.id.as_deref(),
            Attr::Placeholder => el.placeholder.as_deref(),
            Attr::AriaLabel => el.aria_label.as_deref(),
            Attr::Title => el.title.as_deref(),
            Attr::Accept => el.accept.as_deref(),
            Attr::Src => el.src.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Tag(&'static str),
    Equals(Attr, &'static str),
    Contains(Attr, &'static str),
    HasClass(&'static str),
    HasText(&'static str),
}

impl Condition {
    fn holds(&self, el: &ElementSnapshot) -> bool {
        match *self {
            Condition::Tag(tag) => el.tag.eq_ignore_ascii_case(tag),
            Condition::Equals(attr, expected) => attr
                .read(el)
                .is_some_and(|v| v.eq_ignore_ascii_case(expected)),
            Condition::Contains(attr, needle) => attr
                .read(el)
                .is_some_and(|v| contains_ignore_case(v, needle)),
            Condition::HasClass(class) => el.classes.iter().any(|c| c == class),
            Condition::HasText(needle) => contains_ignore_case(&el.text, needle),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectorPattern {
    pub css: &'static str,
    pub conditions: &'static [Condition],
}

impl SelectorPattern {
    pub fn matches(&self, el: &ElementSnapshot) -> bool {
        self.conditions.iter().all(|c| c.holds(el))
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Value classes the engine knows how to source, independent of page markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKey {
    FirstName,
    LastName,
    FullName,
    Email,
    Phone,
    Linkedin,
    ResumeUpload,
    CoverLetter,
    Address,
    City,
}

impl FieldKey {
    /// Detection order.
    pub const ALL: [FieldKey; 10] = [
        FieldKey::FirstName,
        FieldKey::LastName,
        FieldKey::FullName,
        FieldKey::Email,
        FieldKey::Phone,
        FieldKey::Linkedin,
        FieldKey::ResumeUpload,
        FieldKey::CoverLetter,
        FieldKey::Address,
        FieldKey::City,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKey::FirstName => "first_name",
            FieldKey::LastName => "last_name",
            FieldKey::FullName => "full_name",
            FieldKey::Email => "email",
            FieldKey::Phone => "phone",
            FieldKey::Linkedin => "linkedin",
            FieldKey::ResumeUpload => "resume_upload",
            FieldKey::CoverLetter => "cover_letter",
            FieldKey::Address => "address",
            FieldKey::City => "city",
        }
    }

    pub fn parse(key: &str) -> Option<FieldKey> {
        FieldKey::ALL.into_iter().find(|k| k.as_str() == key)
    }

    /// Human-readable label shown when the user is asked for this value.
    pub fn label(&self) -> &'static str {
        match self {
            FieldKey::FirstName => "First Name",
            FieldKey::LastName => "Last Name",
            FieldKey::FullName => "Full Name",
            FieldKey::Email => "Email Address",
            FieldKey::Phone => "Phone Number",
            FieldKey::Linkedin => "LinkedIn URL",
            FieldKey::ResumeUpload => "Resume File",
            FieldKey::CoverLetter => "Cover Letter",
            FieldKey::Address => "Address",
            FieldKey::City => "City",
        }
    }

    pub fn input_type(&self) -> &'static str {
        match self {
            FieldKey::Email => "email",
            FieldKey::Phone => "tel",
            FieldKey::Linkedin => "url",
            FieldKey::ResumeUpload => "file",
            FieldKey::CoverLetter => "textarea",
            _ => "text",
        }
    }

    pub fn patterns(&self) -> &'static [SelectorPattern] {
        match self {
            FieldKey::FirstName => FIRST_NAME,
            FieldKey::LastName => LAST_NAME,
            FieldKey::FullName => FULL_NAME,
            FieldKey::Email => EMAIL,
            FieldKey::Phone => PHONE,
            FieldKey::Linkedin => LINKEDIN,
            FieldKey::ResumeUpload => RESUME_UPLOAD,
            FieldKey::CoverLetter => COVER_LETTER,
            FieldKey::Address => ADDRESS,
            FieldKey::City => CITY,
        }
    }
}

use Attr::*;
use Condition::*;

const INPUT: Condition = Tag("input");
const TEXTAREA: Condition = Tag("textarea");
const FILE: Condition = Equals(Type, "file");

#[rustfmt::skip]
static FIRST_NAME: &[SelectorPattern] = &[
    SelectorPattern { css: r#"input[name*="first" i][name*="name" i]"#, conditions: &[INPUT, Contains(Name, "first"), Contains(Name, "name")] },
    SelectorPattern { css: r#"input[id*="first" i][id*="name" i]"#, conditions: &[INPUT, Contains(Id, "first"), Contains(Id, "name")] },
    SelectorPattern { css: r#"input[placeholder*="first name" i]"#, conditions: &[INPUT, Contains(Placeholder, "first name")] },
    SelectorPattern { css: r#"input[aria-label*="first name" i]"#, conditions: &[INPUT, Contains(AriaLabel, "first name")] },
    SelectorPattern { css: r#"input[name="firstName" i]"#, conditions: &[INPUT, Equals(Name, "firstName")] },
    SelectorPattern { css: r#"input[name="first_name" i]"#, conditions: &[INPUT, Equals(Name, "first_name")] },
];

#[rustfmt::skip]
static LAST_NAME: &[SelectorPattern] = &[
    SelectorPattern { css: r#"input[name*="last" i][name*="name" i]"#, conditions: &[INPUT, Contains(Name, "last"), Contains(Name, "name")] },
    SelectorPattern { css: r#"input[id*="last" i][id*="name" i]"#, conditions: &[INPUT, Contains(Id, "last"), Contains(Id, "name")] },
    SelectorPattern { css: r#"input[placeholder*="last name" i]"#, conditions: &[INPUT, Contains(Placeholder, "last name")] },
    SelectorPattern { css: r#"input[aria-label*="last name" i]"#, conditions: &[INPUT, Contains(AriaLabel, "last name")] },
    SelectorPattern { css: r#"input[name="lastName" i]"#, conditions: &[INPUT, Equals(Name, "lastName")] },
    SelectorPattern { css: r#"input[name="last_name" i]"#, conditions: &[INPUT, Equals(Name, "last_name")] },
];

#[rustfmt::skip]
static FULL_NAME: &[SelectorPattern] = &[
    SelectorPattern { css: r#"input[name="name" i]"#, conditions: &[INPUT, Equals(Name, "name")] },
    SelectorPattern { css: r#"input[name="full_name" i]"#, conditions: &[INPUT, Equals(Name, "full_name")] },
    SelectorPattern { css: r#"input[name="fullName" i]"#, conditions: &[INPUT, Equals(Name, "fullName")] },
    SelectorPattern { css: r#"input[id="name" i]"#, conditions: &[INPUT, Equals(Id, "name")] },
    SelectorPattern { css: r#"input[placeholder*="full name" i]"#, conditions: &[INPUT, Contains(Placeholder, "full name")] },
    SelectorPattern { css: r#"input[aria-label*="full name" i]"#, conditions: &[INPUT, Contains(AriaLabel, "full name")] },
    SelectorPattern { css: r#"input[placeholder="Name" i]"#, conditions: &[INPUT, Equals(Placeholder, "Name")] },
];

#[rustfmt::skip]
static EMAIL: &[SelectorPattern] = &[
    SelectorPattern { css: r#"input[type="email"]"#, conditions: &[INPUT, Equals(Type, "email")] },
    SelectorPattern { css: r#"input[name*="email" i]"#, conditions: &[INPUT, Contains(Name, "email")] },
    SelectorPattern { css: r#"input[id*="email" i]"#, conditions: &[INPUT, Contains(Id, "email")] },
    SelectorPattern { css: r#"input[placeholder*="email" i]"#, conditions: &[INPUT, Contains(Placeholder, "email")] },
    SelectorPattern { css: r#"input[aria-label*="email" i]"#, conditions: &[INPUT, Contains(AriaLabel, "email")] },
];

#[rustfmt::skip]
static PHONE: &[SelectorPattern] = &[
    SelectorPattern { css: r#"input[type="tel"]"#, conditions: &[INPUT, Equals(Type, "tel")] },
    SelectorPattern { css: r#"input[name*="phone" i]"#, conditions: &[INPUT, Contains(Name, "phone")] },
    SelectorPattern { css: r#"input[name*="mobile" i]"#, conditions: &[INPUT, Contains(Name, "mobile")] },
    SelectorPattern { css: r#"input[id*="phone" i]"#, conditions: &[INPUT, Contains(Id, "phone")] },
    SelectorPattern { css: r#"input[placeholder*="phone" i]"#, conditions: &[INPUT, Contains(Placeholder, "phone")] },
    SelectorPattern { css: r#"input[aria-label*="phone" i]"#, conditions: &[INPUT, Contains(AriaLabel, "phone")] },
];

#[rustfmt::skip]
static LINKEDIN: &[SelectorPattern] = &[
    SelectorPattern { css: r#"input[name*="linkedin" i]"#, conditions: &[INPUT, Contains(Name, "linkedin")] },
    SelectorPattern { css: r#"input[id*="linkedin" i]"#, conditions: &[INPUT, Contains(Id, "linkedin")] },
    SelectorPattern { css: r#"input[placeholder*="linkedin" i]"#, conditions: &[INPUT, Contains(Placeholder, "linkedin")] },
    SelectorPattern { css: r#"input[aria-label*="linkedin" i]"#, conditions: &[INPUT, Contains(AriaLabel, "linkedin")] },
];

#[rustfmt::skip]
static RESUME_UPLOAD: &[SelectorPattern] = &[
    SelectorPattern { css: r#"input[type="file"][name*="resume" i]"#, conditions: &[INPUT, FILE, Contains(Name, "resume")] },
    SelectorPattern { css: r#"input[type="file"][name*="cv" i]"#, conditions: &[INPUT, FILE, Contains(Name, "cv")] },
    SelectorPattern { css: r#"input[type="file"][id*="resume" i]"#, conditions: &[INPUT, FILE, Contains(Id, "resume")] },
    SelectorPattern { css: r#"input[type="file"][id*="cv" i]"#, conditions: &[INPUT, FILE, Contains(Id, "cv")] },
    SelectorPattern { css: r#"input[type="file"][accept*="pdf" i]"#, conditions: &[INPUT, FILE, Contains(Accept, "pdf")] },
    SelectorPattern { css: r#"input[type="file"][accept*=".doc" i]"#, conditions: &[INPUT, FILE, Contains(Accept, ".doc")] },
    // any file input at all
    SelectorPattern { css: r#"input[type="file"]"#, conditions: &[INPUT, FILE] },
];

#[rustfmt::skip]
static COVER_LETTER: &[SelectorPattern] = &[
    SelectorPattern { css: r#"textarea[name*="cover" i]"#, conditions: &[TEXTAREA, Contains(Name, "cover")] },
    SelectorPattern { css: r#"textarea[name*="letter" i]"#, conditions: &[TEXTAREA, Contains(Name, "letter")] },
    SelectorPattern { css: r#"textarea[id*="cover" i]"#, conditions: &[TEXTAREA, Contains(Id, "cover")] },
    SelectorPattern { css: r#"textarea[placeholder*="cover letter" i]"#, conditions: &[TEXTAREA, Contains(Placeholder, "cover letter")] },
    SelectorPattern { css: r#"textarea[aria-label*="cover letter" i]"#, conditions: &[TEXTAREA, Contains(AriaLabel, "cover letter")] },
    SelectorPattern { css: r#"textarea[name*="message" i]"#, conditions: &[TEXTAREA, Contains(Name, "message")] },
    SelectorPattern { css: r#"textarea[placeholder*="why" i]"#, conditions: &[TEXTAREA, Contains(Placeholder, "why")] },
];

#[rustfmt::skip]
static ADDRESS: &[SelectorPattern] = &[
    SelectorPattern { css: r#"input[name*="address" i]"#, conditions: &[INPUT, Contains(Name, "address")] },
    SelectorPattern { css: r#"input[id*="address" i]"#, conditions: &[INPUT, Contains(Id, "address")] },
    SelectorPattern { css: r#"input[placeholder*="address" i]"#, conditions: &[INPUT, Contains(Placeholder, "address")] },
    SelectorPattern { css: r#"input[aria-label*="address" i]"#, conditions: &[INPUT, Contains(AriaLabel, "address")] },
];

#[rustfmt::skip]
static CITY: &[SelectorPattern] = &[
    SelectorPattern { css: r#"input[name*="city" i]"#, conditions: &[INPUT, Contains(Name, "city")] },
    SelectorPattern { css: r#"input[id*="city" i]"#, conditions: &[INPUT, Contains(Id, "city")] },
    SelectorPattern { css: r#"input[placeholder*="city" i]"#, conditions: &[INPUT, Contains(Placeholder, "city")] },
];

/// Submit controls, most specific first.
#[rustfmt::skip]
pub static SUBMIT_CONTROLS: &[SelectorPattern] = &[
    SelectorPattern { css: r#"button[type="submit"]"#, conditions: &[Tag("button"), Equals(Type, "submit")] },
    SelectorPattern { css: r#"input[type="submit"]"#, conditions: &[INPUT, Equals(Type, "submit")] },
    SelectorPattern { css: r#"button:has-text("Apply")"#, conditions: &[Tag("button"), HasText("apply")] },
    SelectorPattern { css: r#"button:has-text("Submit")"#, conditions: &[Tag("button"), HasText("submit")] },
    SelectorPattern { css: r#"button:has-text("Submit Application")"#, conditions: &[Tag("button"), HasText("submit application")] },
    SelectorPattern { css: r#"a:has-text("Apply")"#, conditions: &[Tag("a"), HasText("apply")] },
    SelectorPattern { css: r#"button:has-text("Send")"#, conditions: &[Tag("button"), HasText("send")] },
    SelectorPattern { css: r#"button:has-text("Send Application")"#, conditions: &[Tag("button"), HasText("send application")] },
];

/// Known CAPTCHA widget and iframe signatures.
#[rustfmt::skip]
pub static CAPTCHA_SIGNATURES: &[SelectorPattern] = &[
    SelectorPattern { css: r#"iframe[src*="recaptcha"]"#, conditions: &[Tag("iframe"), Contains(Src, "recaptcha")] },
    SelectorPattern { css: r#"iframe[src*="hcaptcha"]"#, conditions: &[Tag("iframe"), Contains(Src, "hcaptcha")] },
    SelectorPattern { css: r#"iframe[title*="reCAPTCHA"]"#, conditions: &[Tag("iframe"), Contains(Title, "reCAPTCHA")] },
    SelectorPattern { css: ".g-recaptcha", conditions: &[HasClass("g-recaptcha")] },
    SelectorPattern { css: ".h-captcha", conditions: &[HasClass("h-captcha")] },
    SelectorPattern { css: "#captcha", conditions: &[Equals(Id, "captcha")] },
];

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> ElementSnapshot {
        ElementSnapshot {
            tag: "input".to_string(),
            visible: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_every_key_has_patterns_and_round_trips() {
        for key in FieldKey::ALL {
            assert!(!key.patterns().is_empty(), "{key:?} has no patterns");
            assert_eq!(FieldKey::parse(key.as_str()), Some(key));
        }
        assert_eq!(FieldKey::parse("visa_status"), None);
    }

    #[test]
    fn test_contains_is_case_insensitive() {
        let el = ElementSnapshot {
            name: Some("applicant[FirstName]".to_string()),
            ..input()
        };
        assert!(FIRST_NAME[0].matches(&el));
        assert!(!LAST_NAME[0].matches(&el));
    }

    #[test]
    fn test_tag_condition_blocks_wrong_element_kind() {
        let el = ElementSnapshot {
            tag: "textarea".to_string(),
            name: Some("email".to_string()),
            ..Default::default()
        };
        assert!(!EMAIL[1].matches(&el));
    }

    #[test]
    fn test_has_text_matches_button_label() {
        let el = ElementSnapshot {
            tag: "button".to_string(),
            text: "Submit your application".to_string(),
            ..Default::default()
        };
        let submit = SUBMIT_CONTROLS
            .iter()
            .find(|p| p.css == r#"button:has-text("Submit")"#)
            .unwrap();
        assert!(submit.matches(&el));
    }

    #[test]
    fn test_class_signature_requires_exact_class_token() {
        let widget = ElementSnapshot {
            tag: "div".to_string(),
            classes: vec!["g-recaptcha".to_string()],
            ..Default::default()
        };
        let lookalike = ElementSnapshot {
            tag: "div".to_string(),
            classes: vec!["g-recaptcha-badge-wrapper".to_string()],
            ..Default::default()
        };
        assert!(CAPTCHA_SIGNATURES.iter().any(|p| p.matches(&widget)));
        assert!(!CAPTCHA_SIGNATURES.iter().any(|p| p.matches(&lookalike)));
    }
}
