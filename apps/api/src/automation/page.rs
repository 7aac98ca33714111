//! Page abstraction the detector and filler work against.
//!
//! A [`PageSnapshot`] is a plain-data view of the form-relevant elements on the current page.
//! All detection happens in Rust over the snapshot, so the heuristics can be exercised with a
//! fake page and no browser. Elements are addressed through [`ElementHandle`]s, which stay
//! valid until the next navigation or snapshot.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::automation::AutomationError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementHandle(pub u32);

/// Attributes of a single element as seen in the live DOM.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ElementSnapshot {
    pub handle: ElementHandle,
    /// Lowercase tag name.
    pub tag: String,
    #[serde(rename = "type")]
    pub input_type: Option<String>,
    pub name: Option<String>,
    pub id: Option<String>,
    pub placeholder: Option<String>,
    pub aria_label: Option<String>,
    pub title: Option<String>,
    pub accept: Option<String>,
    pub src: Option<String>,
    pub classes: Vec<String>,
    /// Visible text, or the `value` of `<input type="submit">`.
    pub text: String,
    /// Text of the `<label for=...>` pointing at this element.
    pub label: Option<String>,
    pub visible: bool,
}

impl ElementSnapshot {
    /// The effective input kind: `type` lowercased, defaulting to `text` for inputs.
    pub fn kind(&self) -> String {
        match &self.input_type {
            Some(t) if !t.trim().is_empty() => t.trim().to_ascii_lowercase(),
            _ if self.tag == "input" => "text".to_string(),
            _ => String::new(),
        }
    }

    pub fn is_text_entry(&self) -> bool {
        match self.tag.as_str() {
            "textarea" => true,
            "input" => !matches!(
                self.kind().as_str(),
                "hidden" | "submit" | "button" | "checkbox" | "radio" | "file"
            ),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub url: String,
    pub elements: Vec<ElementSnapshot>,
}

impl PageSnapshot {
    pub fn visible(&self) -> impl Iterator<Item = &ElementSnapshot> {
        self.elements.iter().filter(|e| e.visible)
    }
}

/// One live browser page, exclusively owned by a single run.
#[async_trait]
pub trait FormPage: Send {
    async fn navigate(&mut self, url: &str) -> Result<(), AutomationError>;

    /// Gives client-side rendering time to finish after navigation or a click.
    async fn settle(&mut self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }

    async fn snapshot(&mut self) -> Result<PageSnapshot, AutomationError>;

    async fn focus(&mut self, handle: ElementHandle) -> Result<(), AutomationError>;

    /// Replaces the element's value and fires `input`/`change` events.
    async fn set_value(&mut self, handle: ElementHandle, value: &str)
        -> Result<(), AutomationError>;

    async fn attach_file(&mut self, handle: ElementHandle, path: &Path)
        -> Result<(), AutomationError>;

    async fn click(&mut self, handle: ElementHandle) -> Result<(), AutomationError>;

    /// Writes a full-page PNG to `path`.
    async fn screenshot(&mut self, path: &Path) -> Result<(), AutomationError>;

    /// Tears the session down. Called exactly once, on every exit path.
    async fn close(self: Box<Self>) -> Result<(), AutomationError>;
}

/// Opens a fresh, single-page browser session for one run.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn FormPage>, AutomationError>;
}
