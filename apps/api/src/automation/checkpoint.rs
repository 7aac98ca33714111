//! The `automation_state` payload persisted while a run waits for user input.
//!
//! A checkpoint records page identity and computed values only; no browser state survives a
//! pause. It is written by the pause transition, read once when the resume starts, and
//! replaced or cleared by the resumed run's own transition.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A field the engine could not fill on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingField {
    pub key: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub page_url: String,
    #[serde(default)]
    pub filled_fields: BTreeMap<String, String>,
    #[serde(default)]
    pub missing_fields: Vec<MissingField>,
    #[serde(default)]
    pub cover_letter_text: String,
}

impl Checkpoint {
    pub fn from_state(state: &serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(state.clone())
    }

    pub fn to_state(&self) -> serde_json::Value {
        // Only strings, maps and vectors: serialization cannot fail.
        serde_json::to_value(self).unwrap_or_default()
    }

    /// Saved values overlaid with the user's. Blank user values are ignored; on a key
    /// collision the user's value wins.
    pub fn merged_fields(
        &self,
        user_fields: &BTreeMap<String, String>,
    ) -> BTreeMap<String, String> {
        let mut merged = self.filled_fields.clone();
        for (key, value) in user_fields {
            if value.trim().is_empty() {
                continue;
            }
            merged.insert(key.clone(), value.clone());
        }
        merged
    }

    /// Fields that were missing at pause time and still have no value after merging.
    pub fn outstanding(&self, merged: &BTreeMap<String, String>) -> Vec<MissingField> {
        self.missing_fields
            .iter()
            .filter(|field| merged.get(&field.key).map_or(true, |v| v.trim().is_empty()))
            .cloned()
            .collect()
    }
}

/// Status message for a pause: how much was filled, and the first few labels still needed.
pub fn pause_message(filled_count: usize, missing: &[MissingField]) -> String {
    const SHOWN: usize = 5;
    let labels = missing
        .iter()
        .take(SHOWN)
        .map(|m| m.label.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let extra = if missing.len() > SHOWN {
        format!(" (+{} more)", missing.len() - SHOWN)
    } else {
        String::new()
    };
    format!("Filled {filled_count} fields. Need your input for: {labels}{extra}")
}
