//! Test doubles for the engine: element builders, a scripted browser and an in-memory store.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::automation::page::{
    BrowserLauncher, ElementHandle, ElementSnapshot, FormPage, PageSnapshot,
};
use crate::automation::store::{ApplicationStore, Transition, TransitionOutcome};
use crate::automation::AutomationError;
use crate::errors::AppError;
use crate::models::application::{
    ApplicationContext, ApplicationRow, ApplicationStatus, StatusEventRow,
};
use crate::models::profile::{JobPostingRow, UserProfileRow};

pub const JOB_URL: &str = "https://jobs.example.com/apply/42";

// ────────────────────────────────────────────────────────────────
// Elements
// ────────────────────────────────────────────────────────────────

fn element(handle: u32, tag: &str) -> ElementSnapshot {
    ElementSnapshot {
        handle: ElementHandle(handle),
        tag: tag.to_string(),
        visible: true,
        ..Default::default()
    }
}

pub fn input(handle: u32) -> ElementSnapshot {
    element(handle, "input")
}

pub fn textarea(handle: u32) -> ElementSnapshot {
    element(handle, "textarea")
}

pub fn div(handle: u32) -> ElementSnapshot {
    element(handle, "div")
}

pub fn button(handle: u32, text: &str) -> ElementSnapshot {
    ElementSnapshot {
        text: text.to_string(),
        ..element(handle, "button")
    }
}

pub fn link(handle: u32, text: &str) -> ElementSnapshot {
    ElementSnapshot {
        text: text.to_string(),
        ..element(handle, "a")
    }
}

pub fn iframe(handle: u32, src: &str) -> ElementSnapshot {
    ElementSnapshot {
        src: Some(src.to_string()),
        ..element(handle, "iframe")
    }
}

pub fn page(elements: Vec<ElementSnapshot>) -> PageSnapshot {
    PageSnapshot {
        url: JOB_URL.to_string(),
        elements,
    }
}

impl ElementSnapshot {
    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn typed(mut self, input_type: &str) -> Self {
        self.input_type = Some(input_type.to_string());
        self
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn with_placeholder(mut self, placeholder: &str) -> Self {
        self.placeholder = Some(placeholder.to_string());
        self
    }

    pub fn with_aria_label(mut self, label: &str) -> Self {
        self.aria_label = Some(label.to_string());
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }
}

// ────────────────────────────────────────────────────────────────
// Browser
// ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum PageAction {
    Navigate(String),
    Focus(ElementHandle),
    SetValue(ElementHandle, String),
    AttachFile(ElementHandle, PathBuf),
    Click(ElementHandle),
    Screenshot(PathBuf),
}

#[derive(Default)]
struct BrowserState {
    pages: HashMap<String, Vec<ElementSnapshot>>,
    hang_navigation: bool,
    fail_launch: bool,
    failing_handles: HashSet<ElementHandle>,
    failing_screenshots: bool,
    panic_on_snapshot: bool,
    actions: Vec<PageAction>,
    values: HashMap<ElementHandle, String>,
    launches: usize,
    closes: usize,
}

/// Scripted browser. Every page it opens shares one recorded action log.
#[derive(Clone, Default)]
pub struct FakeBrowser {
    state: Arc<Mutex<BrowserState>>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: &str, elements: Vec<ElementSnapshot>) -> Self {
        self.state
            .lock()
            .unwrap()
            .pages
            .insert(url.to_string(), elements);
        self
    }

    pub fn hang_navigation(self) -> Self {
        self.state.lock().unwrap().hang_navigation = true;
        self
    }

    pub fn fail_launch(self) -> Self {
        self.state.lock().unwrap().fail_launch = true;
        self
    }

    pub fn failing_handle(self, handle: u32) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_handles
            .insert(ElementHandle(handle));
        self
    }

    pub fn failing_screenshots(self) -> Self {
        self.state.lock().unwrap().failing_screenshots = true;
        self
    }

    pub fn panic_on_snapshot(self) -> Self {
        self.state.lock().unwrap().panic_on_snapshot = true;
        self
    }

    /// A page outside of any launch, for exercising single components.
    pub fn open_page(&self) -> Box<dyn FormPage> {
        Box::new(FakePage {
            state: Arc::clone(&self.state),
            url: String::new(),
        })
    }

    pub fn actions(&self) -> Vec<PageAction> {
        self.state.lock().unwrap().actions.clone()
    }

    pub fn screenshots(&self) -> Vec<PathBuf> {
        self.actions()
            .into_iter()
            .filter_map(|a| match a {
                PageAction::Screenshot(path) => Some(path),
                _ => None,
            })
            .collect()
    }

    pub fn clicks(&self) -> Vec<ElementHandle> {
        self.actions()
            .into_iter()
            .filter_map(|a| match a {
                PageAction::Click(handle) => Some(handle),
                _ => None,
            })
            .collect()
    }

    pub fn value_of(&self, handle: u32) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .values
            .get(&ElementHandle(handle))
            .cloned()
    }

    pub fn launches(&self) -> usize {
        self.state.lock().unwrap().launches
    }

    pub fn closes(&self) -> usize {
        self.state.lock().unwrap().closes
    }
}

#[async_trait]
impl BrowserLauncher for FakeBrowser {
    async fn launch(&self) -> Result<Box<dyn FormPage>, AutomationError> {
        {
            let mut state = self.state.lock().unwrap();
            if state.fail_launch {
                return Err(AutomationError::Browser(
                    "Failed to launch Chromium".to_string(),
                ));
            }
            state.launches += 1;
        }
        Ok(self.open_page())
    }
}

struct FakePage {
    state: Arc<Mutex<BrowserState>>,
    url: String,
}

impl FakePage {
    fn record(&self, action: PageAction) {
        self.state.lock().unwrap().actions.push(action);
    }

    fn check(&self, handle: ElementHandle) -> Result<(), AutomationError> {
        if self.state.lock().unwrap().failing_handles.contains(&handle) {
            return Err(AutomationError::ElementGone(handle));
        }
        Ok(())
    }
}

#[async_trait]
impl FormPage for FakePage {
    async fn navigate(&mut self, url: &str) -> Result<(), AutomationError> {
        self.record(PageAction::Navigate(url.to_string()));
        let hang = self.state.lock().unwrap().hang_navigation;
        if hang {
            std::future::pending::<()>().await;
        }
        self.url = url.to_string();
        Ok(())
    }

    async fn snapshot(&mut self) -> Result<PageSnapshot, AutomationError> {
        let (panic, elements) = {
            let state = self.state.lock().unwrap();
            (
                state.panic_on_snapshot,
                state.pages.get(&self.url).cloned().unwrap_or_default(),
            )
        };
        if panic {
            panic!("renderer crashed");
        }
        Ok(PageSnapshot {
            url: self.url.clone(),
            elements,
        })
    }

    async fn focus(&mut self, handle: ElementHandle) -> Result<(), AutomationError> {
        self.check(handle)?;
        self.record(PageAction::Focus(handle));
        Ok(())
    }

    async fn set_value(
        &mut self,
        handle: ElementHandle,
        value: &str,
    ) -> Result<(), AutomationError> {
        self.check(handle)?;
        self.record(PageAction::SetValue(handle, value.to_string()));
        self.state
            .lock()
            .unwrap()
            .values
            .insert(handle, value.to_string());
        Ok(())
    }

    async fn attach_file(
        &mut self,
        handle: ElementHandle,
        path: &Path,
    ) -> Result<(), AutomationError> {
        self.check(handle)?;
        self.record(PageAction::AttachFile(handle, path.to_path_buf()));
        Ok(())
    }

    async fn click(&mut self, handle: ElementHandle) -> Result<(), AutomationError> {
        self.check(handle)?;
        self.record(PageAction::Click(handle));
        Ok(())
    }

    async fn screenshot(&mut self, path: &Path) -> Result<(), AutomationError> {
        if self.state.lock().unwrap().failing_screenshots {
            return Err(AutomationError::Browser("screenshot failed".to_string()));
        }
        self.record(PageAction::Screenshot(path.to_path_buf()));
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), AutomationError> {
        self.state.lock().unwrap().closes += 1;
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────
// Store
// ────────────────────────────────────────────────────────────────

#[derive(Default)]
struct StoreState {
    contexts: HashMap<Uuid, ApplicationContext>,
    events: Vec<StatusEventRow>,
    failing_cover_letters: bool,
}

/// In-memory [`ApplicationStore`] with the same compare-and-set semantics as Postgres.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn with(ctx: ApplicationContext) -> Self {
        let store = Self::default();
        store.insert(ctx);
        store
    }

    pub fn insert(&self, ctx: ApplicationContext) {
        self.state
            .lock()
            .unwrap()
            .contexts
            .insert(ctx.application.id, ctx);
    }

    pub fn application(&self, id: Uuid) -> ApplicationRow {
        self.state.lock().unwrap().contexts[&id].application.clone()
    }

    pub fn events(&self, id: Uuid) -> Vec<StatusEventRow> {
        self.state
            .lock()
            .unwrap()
            .events
            .iter()
            .filter(|e| e.application_id == id)
            .cloned()
            .collect()
    }

    pub fn fail_cover_letter_saves(&self) {
        self.state.lock().unwrap().failing_cover_letters = true;
    }

    /// Simulates a write from outside the engine, which logs no event of its own here.
    pub fn set_status_externally(&self, id: Uuid, status: ApplicationStatus) {
        let mut state = self.state.lock().unwrap();
        if let Some(ctx) = state.contexts.get_mut(&id) {
            ctx.application.status = status.as_str().to_string();
        }
    }
}

#[async_trait]
impl ApplicationStore for MemoryStore {
    async fn load_application(&self, id: Uuid) -> Result<Option<ApplicationRow>, AppError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .contexts
            .get(&id)
            .map(|ctx| ctx.application.clone()))
    }

    async fn load_context(&self, id: Uuid) -> Result<Option<ApplicationContext>, AppError> {
        Ok(self.state.lock().unwrap().contexts.get(&id).cloned())
    }

    async fn save_cover_letter(&self, id: Uuid, text: &str) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        if state.failing_cover_letters {
            return Err(AppError::Internal(anyhow::anyhow!("connection reset")));
        }
        if let Some(ctx) = state.contexts.get_mut(&id) {
            ctx.application.cover_letter_text = Some(text.to_string());
        }
        Ok(())
    }

    async fn save_screenshot(&self, id: Uuid, path: &str) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        if let Some(ctx) = state.contexts.get_mut(&id) {
            ctx.application.screenshot_path = Some(path.to_string());
        }
        Ok(())
    }

    async fn transition(
        &self,
        id: Uuid,
        expected: ApplicationStatus,
        transition: Transition,
    ) -> Result<TransitionOutcome, AppError> {
        let mut state = self.state.lock().unwrap();
        let Some(ctx) = state.contexts.get_mut(&id) else {
            return Ok(TransitionOutcome::Superseded { current: None });
        };
        if ctx.application.status != expected.as_str() {
            return Ok(TransitionOutcome::Superseded {
                current: Some(ctx.application.status.clone()),
            });
        }

        let status = transition.status();
        ctx.application.status = status.as_str().to_string();
        ctx.application.automation_state = transition.automation_state();
        ctx.application.updated_at = Some(Utc::now());

        state.events.push(StatusEventRow {
            id: Uuid::new_v4(),
            application_id: id,
            status: status.as_str().to_string(),
            message: Some(transition.message().to_string()),
            created_at: Utc::now(),
        });
        Ok(TransitionOutcome::Recorded)
    }

    async fn status_events(&self, id: Uuid) -> Result<Vec<StatusEventRow>, AppError> {
        Ok(self.events(id))
    }
}

// ────────────────────────────────────────────────────────────────
// Fixtures
// ────────────────────────────────────────────────────────────────

/// A pending application for "Ada Lovelace" with no résumé on file.
pub fn context(url: Option<&str>) -> ApplicationContext {
    context_with_status(url, ApplicationStatus::PendingAutomation)
}

pub fn context_with_status(url: Option<&str>, status: ApplicationStatus) -> ApplicationContext {
    let user_id = Uuid::new_v4();
    let job_posting_id = Uuid::new_v4();
    ApplicationContext {
        application: ApplicationRow {
            id: Uuid::new_v4(),
            user_id,
            job_posting_id,
            status: status.as_str().to_string(),
            screenshot_path: None,
            cover_letter_text: None,
            automation_state: None,
            created_at: Utc::now(),
            updated_at: None,
        },
        job_posting: JobPostingRow {
            id: job_posting_id,
            title: "Analytical Engine Programmer".to_string(),
            company_name: "Babbage & Co".to_string(),
            description: Some("Write programs for the Analytical Engine.".to_string()),
            url: url.map(str::to_string),
        },
        account_email: Some("ada@example.com".to_string()),
        profile: Some(UserProfileRow {
            user_id,
            name: Some("Ada Lovelace".to_string()),
            phone_number: Some("+44 20 7946 0018".to_string()),
            address: Some("12 St James's Square".to_string()),
            location: Some("London".to_string()),
            desired_roles: Some(vec!["Programmer".to_string()]),
            field_of_work: Some("Mathematics".to_string()),
        }),
        resume: None,
    }
}
