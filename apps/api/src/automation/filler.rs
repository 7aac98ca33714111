//! Field Filler: resolves a value for each detected field and writes it into the page.
//!
//! Value precedence per semantic key: explicit override (the merged checkpoint and user
//! values on resume) > profile attribute > none. A field with no value, or whose fill fails,
//! is reported missing rather than aborting the run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::automation::checkpoint::MissingField;
use crate::automation::detector::{find_by_name_or_id, DetectedFields};
use crate::automation::page::{ElementHandle, FormPage, PageSnapshot};
use crate::automation::selectors::FieldKey;
use crate::automation::AutomationError;
use crate::models::application::ApplicationContext;
use crate::models::profile::ResumeRow;

/// Values the engine can source on its own for one application.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileValues {
    pub full_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub cover_letter: Option<String>,
}

impl ProfileValues {
    pub fn from_context(ctx: &ApplicationContext, cover_letter: &str) -> Self {
        let profile = ctx.profile.as_ref();
        let full_name = present(profile.and_then(|p| p.name.as_deref()));
        let (first_name, last_name) = match full_name.as_deref() {
            Some(name) => match name.split_once(' ') {
                Some((first, last)) => (present(Some(first)), present(Some(last))),
                None => (Some(name.to_string()), None),
            },
            None => (None, None),
        };

        ProfileValues {
            full_name,
            first_name,
            last_name,
            email: present(ctx.account_email.as_deref()),
            phone: present(profile.and_then(|p| p.phone_number.as_deref())),
            address: present(profile.and_then(|p| p.address.as_deref())),
            city: present(profile.and_then(|p| p.location.as_deref())),
            cover_letter: present(Some(cover_letter)),
        }
    }

    fn get(&self, key: FieldKey) -> Option<&str> {
        let value = match key {
            FieldKey::FullName => &self.full_name,
            FieldKey::FirstName => &self.first_name,
            FieldKey::LastName => &self.last_name,
            FieldKey::Email => &self.email,
            FieldKey::Phone => &self.phone,
            FieldKey::Address => &self.address,
            FieldKey::City => &self.city,
            FieldKey::CoverLetter => &self.cover_letter,
            // Never sourced from the profile
            FieldKey::Linkedin | FieldKey::ResumeUpload => return None,
        };
        value.as_deref()
    }
}

/// Everything the filler may draw from for one pass over the page.
pub struct FieldValues<'a> {
    pub profile: &'a ProfileValues,
    pub overrides: &'a BTreeMap<String, String>,
    pub resume_file: Option<&'a Path>,
}

impl FieldValues<'_> {
    pub fn resolve(&self, key: FieldKey) -> Option<String> {
        self.overrides
            .get(key.as_str())
            .filter(|v| !v.trim().is_empty())
            .map(|v| v.to_string())
            .or_else(|| self.profile.get(key).map(str::to_string))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FillReport {
    /// key → value actually written (for the résumé, the attached path).
    pub filled: BTreeMap<String, String>,
    pub missing: Vec<MissingField>,
}

impl FillReport {
    pub fn absorb(&mut self, other: FillReport) {
        self.filled.extend(other.filled);
        for field in other.missing {
            if !self.missing.iter().any(|m| m.key == field.key) {
                self.missing.push(field);
            }
        }
    }
}

/// Absolute path of the user's résumé, if a record exists and the file is on disk.
pub async fn locate_resume_file(resume: Option<&ResumeRow>) -> Option<PathBuf> {
    let resume = resume?;
    if resume.file_path.trim().is_empty() {
        return None;
    }
    match tokio::fs::canonicalize(&resume.file_path).await {
        Ok(path) if path.is_file() => Some(path),
        Ok(path) => {
            warn!("Resume path is not a file: {}", path.display());
            None
        }
        Err(e) => {
            warn!("Resume file not found: {} ({e})", resume.file_path);
            None
        }
    }
}

pub async fn fill_detected_fields(
    page: &mut dyn FormPage,
    detected: &DetectedFields,
    values: &FieldValues<'_>,
) -> FillReport {
    let mut report = FillReport::default();

    for (&key, field) in detected {
        if key == FieldKey::ResumeUpload {
            match values.resume_file {
                Some(path) => match page.attach_file(field.handle, path).await {
                    Ok(()) => {
                        info!("Uploaded resume: {}", path.display());
                        report
                            .filled
                            .insert(key.as_str().to_string(), path.display().to_string());
                    }
                    Err(e) => {
                        warn!("Resume upload failed: {e}");
                        report.missing.push(missing(key));
                    }
                },
                None => report.missing.push(missing(key)),
            }
            continue;
        }

        let Some(value) = values.resolve(key) else {
            report.missing.push(missing(key));
            continue;
        };
        match fill_element(page, field.handle, &value).await {
            Ok(()) => {
                report.filled.insert(key.as_str().to_string(), value);
            }
            Err(e) => {
                warn!("Failed to fill {}: {e}", key.as_str());
                report.missing.push(missing(key));
            }
        }
    }

    report
}

/// Fills values by exact `name`/`id` for every key the detector pass did not cover, including
/// keys spelled like a semantic field whose element no pattern matched. Keys that no longer
/// exist on the page are skipped.
pub async fn fill_named_fields(
    page: &mut dyn FormPage,
    snapshot: &PageSnapshot,
    detected: &DetectedFields,
    fields: &BTreeMap<String, String>,
    descriptors: &[MissingField],
) -> FillReport {
    let mut report = FillReport::default();

    for (key, value) in fields {
        if is_detected(detected, key) || value.trim().is_empty() {
            continue;
        }
        let Some(handle) = find_by_name_or_id(snapshot, key) else {
            debug!("Custom field '{key}' not on page, skipping");
            continue;
        };
        match fill_element(page, handle, value).await {
            Ok(()) => {
                report.filled.insert(key.clone(), value.clone());
            }
            Err(e) => {
                warn!("Failed to fill custom field '{key}': {e}");
                let field = descriptors
                    .iter()
                    .find(|d| &d.key == key)
                    .cloned()
                    .unwrap_or_else(|| MissingField {
                        key: key.clone(),
                        label: key.clone(),
                        field_type: "text".to_string(),
                    });
                report.missing.push(field);
            }
        }
    }

    report
}

/// Whether `key` names a semantic field the detector found on the current page.
pub fn is_detected(detected: &DetectedFields, key: &str) -> bool {
    FieldKey::parse(key).is_some_and(|k| detected.contains_key(&k))
}

async fn fill_element(
    page: &mut dyn FormPage,
    handle: ElementHandle,
    value: &str,
) -> Result<(), AutomationError> {
    page.focus(handle).await?;
    page.set_value(handle, value).await
}

fn missing(key: FieldKey) -> MissingField {
    MissingField {
        key: key.as_str().to_string(),
        label: key.label().to_string(),
        field_type: key.input_type().to_string(),
    }
}

fn present(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::detector::detect_fields;
    use crate::automation::testing::{context, input, page, textarea, FakeBrowser, PageAction};
    use crate::models::profile::UserProfileRow;

    fn no_overrides() -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    #[test]
    fn test_name_splits_on_first_space() {
        let mut ctx = context(None);
        ctx.profile.as_mut().unwrap().name = Some("Augusta Ada King".to_string());
        let values = ProfileValues::from_context(&ctx, "letter");
        assert_eq!(values.first_name.as_deref(), Some("Augusta"));
        assert_eq!(values.last_name.as_deref(), Some("Ada King"));
        assert_eq!(values.full_name.as_deref(), Some("Augusta Ada King"));
    }

    #[test]
    fn test_single_word_name_has_no_last_name() {
        let mut ctx = context(None);
        ctx.profile.as_mut().unwrap().name = Some("Ada".to_string());
        let values = ProfileValues::from_context(&ctx, "");
        assert_eq!(values.first_name.as_deref(), Some("Ada"));
        assert!(values.last_name.is_none());
        assert!(values.cover_letter.is_none());
    }

    #[test]
    fn test_empty_strings_count_as_absent() {
        let mut ctx = context(None);
        ctx.profile = Some(UserProfileRow {
            name: Some("   ".to_string()),
            phone_number: Some(String::new()),
            ..Default::default()
        });
        let values = ProfileValues::from_context(&ctx, "letter");
        assert!(values.full_name.is_none());
        assert!(values.first_name.is_none());
        assert!(values.phone.is_none());
        assert_eq!(values.email.as_deref(), Some("ada@example.com"));
    }

    #[test]
    fn test_override_beats_profile_and_linkedin_is_override_only() {
        let profile = ProfileValues::from_context(&context(None), "letter");
        let overrides = BTreeMap::from([
            ("email".to_string(), "a@x.com".to_string()),
            ("phone".to_string(), " ".to_string()),
        ]);
        let values = FieldValues {
            profile: &profile,
            overrides: &overrides,
            resume_file: None,
        };
        assert_eq!(values.resolve(FieldKey::Email).as_deref(), Some("a@x.com"));
        assert_eq!(values.resolve(FieldKey::Phone).as_deref(), Some("+44 20 7946 0018"));
        assert_eq!(values.resolve(FieldKey::Linkedin), None);
    }

    #[tokio::test]
    async fn test_fill_focuses_before_setting_value() {
        let snapshot = page(vec![input(1).named("email")]);
        let detected = detect_fields(&snapshot);
        let profile = ProfileValues::from_context(&context(None), "letter");
        let overrides = no_overrides();
        let values = FieldValues {
            profile: &profile,
            overrides: &overrides,
            resume_file: None,
        };

        let browser = FakeBrowser::new();
        let mut page = browser.open_page();
        let report = fill_detected_fields(page.as_mut(), &detected, &values).await;

        assert_eq!(report.filled["email"], "ada@example.com");
        assert!(report.missing.is_empty());
        assert_eq!(
            browser.actions(),
            vec![
                PageAction::Focus(ElementHandle(1)),
                PageAction::SetValue(ElementHandle(1), "ada@example.com".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_profile_values_and_linkedin_are_reported() {
        let mut ctx = context(None);
        ctx.profile.as_mut().unwrap().name = None;
        let snapshot = page(vec![
            input(1).named("first_name"),
            input(2).named("last_name"),
            input(3).typed("email"),
            input(4).named("linkedin_url"),
        ]);
        let detected = detect_fields(&snapshot);
        let profile = ProfileValues::from_context(&ctx, "letter");
        let overrides = no_overrides();
        let values = FieldValues {
            profile: &profile,
            overrides: &overrides,
            resume_file: None,
        };

        let browser = FakeBrowser::new();
        let mut page = browser.open_page();
        let report = fill_detected_fields(page.as_mut(), &detected, &values).await;

        let missing: Vec<_> = report.missing.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(missing, vec!["first_name", "last_name", "linkedin"]);
        assert_eq!(report.filled.len(), 1);
        assert_eq!(report.missing[2].field_type, "url");
        assert_eq!(report.missing[2].label, "LinkedIn URL");
    }

    #[tokio::test]
    async fn test_fill_failure_degrades_field_to_missing() {
        let snapshot = page(vec![input(1).named("email"), input(2).typed("tel")]);
        let detected = detect_fields(&snapshot);
        let profile = ProfileValues::from_context(&context(None), "letter");
        let overrides = no_overrides();
        let values = FieldValues {
            profile: &profile,
            overrides: &overrides,
            resume_file: None,
        };

        let browser = FakeBrowser::new().failing_handle(2);
        let mut page = browser.open_page();
        let report = fill_detected_fields(page.as_mut(), &detected, &values).await;

        assert!(report.filled.contains_key("email"));
        assert_eq!(report.missing.len(), 1);
        assert_eq!(report.missing[0].key, "phone");
        assert_eq!(report.missing[0].field_type, "tel");
    }

    #[tokio::test]
    async fn test_resume_attached_only_when_file_exists() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("resume.pdf");
        std::fs::write(&file, b"%PDF-1.4").unwrap();

        let mut ctx = context(None);
        ctx.resume = Some(ResumeRow {
            user_id: ctx.application.user_id,
            file_path: file.display().to_string(),
            raw_text: None,
        });
        let located = locate_resume_file(ctx.resume.as_ref()).await.unwrap();
        assert!(located.is_absolute());

        let snapshot = page(vec![input(1).typed("file").named("resume")]);
        let detected = detect_fields(&snapshot);
        let profile = ProfileValues::from_context(&ctx, "");
        let overrides = no_overrides();

        let browser = FakeBrowser::new();
        let mut page = browser.open_page();
        let report = fill_detected_fields(
            page.as_mut(),
            &detected,
            &FieldValues {
                profile: &profile,
                overrides: &overrides,
                resume_file: Some(&located),
            },
        )
        .await;
        assert_eq!(report.filled["resume_upload"], located.display().to_string());
        assert_eq!(
            browser.actions(),
            vec![PageAction::AttachFile(ElementHandle(1), located.clone())]
        );

        // Same page, no file on disk
        std::fs::remove_file(&file).unwrap();
        assert!(locate_resume_file(ctx.resume.as_ref()).await.is_none());
        let report = fill_detected_fields(
            page.as_mut(),
            &detected,
            &FieldValues {
                profile: &profile,
                overrides: &overrides,
                resume_file: None,
            },
        )
        .await;
        assert_eq!(report.missing[0].key, "resume_upload");
        assert_eq!(report.missing[0].field_type, "file");
    }

    #[tokio::test]
    async fn test_named_fields_fill_by_exact_name_or_id() {
        let snapshot = page(vec![
            input(1).named("visa_status"),
            textarea(2).with_id("why_us"),
            input(3).named("email"),
        ]);
        let fields = BTreeMap::from([
            ("visa_status".to_string(), "Citizen".to_string()),
            ("why_us".to_string(), "Engines".to_string()),
            ("email".to_string(), "a@x.com".to_string()),
            ("gone_question".to_string(), "x".to_string()),
        ]);

        let detected = detect_fields(&snapshot);

        let browser = FakeBrowser::new();
        let mut page = browser.open_page();
        let report = fill_named_fields(page.as_mut(), &snapshot, &detected, &fields, &[]).await;

        assert_eq!(report.filled.len(), 2);
        assert_eq!(browser.value_of(1).as_deref(), Some("Citizen"));
        assert_eq!(browser.value_of(2).as_deref(), Some("Engines"));
        // detected semantic keys are left to the detector pass
        assert_eq!(browser.value_of(3), None);
        assert!(report.missing.is_empty());
    }

    #[tokio::test]
    async fn test_undetected_semantic_key_is_filled_by_name() {
        // No address pattern accepts a textarea, so only the name lookup can reach it.
        let snapshot = page(vec![input(1).typed("email"), textarea(2).named("address")]);
        let detected = detect_fields(&snapshot);
        assert!(!detected.contains_key(&FieldKey::Address));

        let fields = BTreeMap::from([
            ("address".to_string(), "1 Main St".to_string()),
            ("email".to_string(), "a@x.com".to_string()),
        ]);
        let browser = FakeBrowser::new();
        let mut page = browser.open_page();
        let report = fill_named_fields(page.as_mut(), &snapshot, &detected, &fields, &[]).await;

        assert_eq!(report.filled.keys().collect::<Vec<_>>(), vec!["address"]);
        assert_eq!(browser.value_of(2).as_deref(), Some("1 Main St"));
        assert_eq!(browser.value_of(1), None);
    }

    #[tokio::test]
    async fn test_named_field_failure_keeps_original_descriptor() {
        let snapshot = page(vec![input(7).named("visa_status")]);
        let fields = BTreeMap::from([("visa_status".to_string(), "Citizen".to_string())]);
        let descriptors = vec![MissingField {
            key: "visa_status".to_string(),
            label: "Visa Status".to_string(),
            field_type: "text".to_string(),
        }];

        let browser = FakeBrowser::new().failing_handle(7);
        let mut page = browser.open_page();
        let report = fill_named_fields(
            page.as_mut(),
            &snapshot,
            &DetectedFields::new(),
            &fields,
            &descriptors,
        )
        .await;
        assert_eq!(report.missing, descriptors);
    }
}
