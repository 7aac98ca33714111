//! Field Detector: finds semantic fields, custom employer questions, CAPTCHA widgets and the
//! submit control in a [`PageSnapshot`].

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, info, warn};

use crate::automation::checkpoint::MissingField;
use crate::automation::page::{ElementHandle, ElementSnapshot, PageSnapshot};
use crate::automation::selectors::{FieldKey, SelectorPattern, CAPTCHA_SIGNATURES, SUBMIT_CONTROLS};

/// Placeholder-derived keys are cut to this many characters.
const PLACEHOLDER_SLUG_LEN: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectedField {
    pub key: FieldKey,
    pub handle: ElementHandle,
    pub field_type: &'static str,
}

pub type DetectedFields = BTreeMap<FieldKey, DetectedField>;

/// Maps each semantic key to the first visible element matched by its earliest pattern.
///
/// An element claimed by an earlier key is not offered to later keys, so a single input
/// (say `name="email_address"`) is never filled twice with different values.
pub fn detect_fields(snapshot: &PageSnapshot) -> DetectedFields {
    let mut detected = DetectedFields::new();
    let mut claimed: HashSet<ElementHandle> = HashSet::new();

    for key in FieldKey::ALL {
        let hit = key.patterns().iter().find_map(|pattern| {
            snapshot
                .visible()
                .find(|el| !claimed.contains(&el.handle) && pattern.matches(el))
                .map(|el| (pattern, el.handle))
        });

        if let Some((pattern, handle)) = hit {
            debug!("Detected form field {} via '{}'", key.as_str(), pattern.css);
            claimed.insert(handle);
            detected.insert(
                key,
                DetectedField {
                    key,
                    handle,
                    field_type: key.input_type(),
                },
            );
        }
    }

    info!(
        "Detected fields: {:?}",
        detected.keys().map(|k| k.as_str()).collect::<Vec<_>>()
    );
    detected
}

/// Visible text inputs and textareas no semantic pattern claimed, described so the user can be
/// asked for them.
pub fn discover_unknown_fields(
    snapshot: &PageSnapshot,
    detected: &DetectedFields,
) -> Vec<MissingField> {
    let claimed: HashSet<ElementHandle> = detected.values().map(|f| f.handle).collect();
    let mut seen: HashSet<String> = detected.keys().map(|k| k.as_str().to_string()).collect();
    let mut unknown = Vec::new();

    for el in snapshot.visible() {
        if claimed.contains(&el.handle) || !el.is_text_entry() {
            continue;
        }
        let Some(key) = stable_key(el) else {
            debug!("Skipping unnamed field {:?}", el.handle);
            continue;
        };
        if !seen.insert(key.clone()) {
            continue;
        }
        unknown.push(MissingField {
            label: label_for(el, &key),
            field_type: unknown_field_type(el),
            key,
        });
    }

    if !unknown.is_empty() {
        info!(
            "Unknown fields: {:?}",
            unknown.iter().map(|f| f.key.as_str()).collect::<Vec<_>>()
        );
    }
    unknown
}

/// The first CAPTCHA signature present on the page, visible or not.
pub fn detect_captcha(snapshot: &PageSnapshot) -> Option<&'static SelectorPattern> {
    let hit = CAPTCHA_SIGNATURES
        .iter()
        .find(|pattern| snapshot.elements.iter().any(|el| pattern.matches(el)));
    if let Some(pattern) = hit {
        warn!("CAPTCHA detected via '{}'", pattern.css);
    }
    hit
}

pub fn detect_submit_control(snapshot: &PageSnapshot) -> Option<ElementHandle> {
    for pattern in SUBMIT_CONTROLS {
        if let Some(el) = snapshot.visible().find(|el| pattern.matches(el)) {
            info!("Found submit control via '{}'", pattern.css);
            return Some(el.handle);
        }
    }
    warn!("No apply/submit control found");
    None
}

/// Exact `name`, then exact `id`, lookup for a key the user answered. Used on resume, when the
/// markup may have changed since the key was recorded.
pub fn find_by_name_or_id(snapshot: &PageSnapshot, key: &str) -> Option<ElementHandle> {
    snapshot
        .visible()
        .find(|el| el.name.as_deref() == Some(key))
        .or_else(|| snapshot.visible().find(|el| el.id.as_deref() == Some(key)))
        .map(|el| el.handle)
}

fn stable_key(el: &ElementSnapshot) -> Option<String> {
    non_blank(el.name.as_deref())
        .or_else(|| non_blank(el.id.as_deref()))
        .map(str::to_string)
        .or_else(|| non_blank(el.placeholder.as_deref()).and_then(placeholder_slug))
}

fn placeholder_slug(placeholder: &str) -> Option<String> {
    let mut slug = String::new();
    for c in placeholder.to_lowercase().chars() {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    let slug: String = slug.chars().take(PLACEHOLDER_SLUG_LEN).collect();
    let slug = slug.trim_end_matches('_');
    (!slug.is_empty()).then(|| slug.to_string())
}

fn label_for(el: &ElementSnapshot, key: &str) -> String {
    non_blank(el.aria_label.as_deref())
        .or_else(|| non_blank(el.placeholder.as_deref()))
        .or_else(|| non_blank(el.label.as_deref()))
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| title_case(non_blank(el.name.as_deref()).unwrap_or(key)))
}

fn title_case(raw: &str) -> String {
    raw.split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut c = w.chars();
            match c.next() {
                None => String::new(),
                Some(f) => f.to_uppercase().to_string() + c.as_str(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn unknown_field_type(el: &ElementSnapshot) -> String {
    if el.tag == "textarea" {
        return "textarea".to_string();
    }
    match el.kind().as_str() {
        kind @ ("email" | "tel" | "url" | "number" | "date") => kind.to_string(),
        _ => "text".to_string(),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
