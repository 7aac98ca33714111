//! Headless Chromium over CDP.
//!
//! Elements are addressed by a `data-autoapply-handle` attribute stamped onto every candidate
//! element when the snapshot script runs; handles are renumbered on each snapshot.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Element, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::automation::page::{
    BrowserLauncher, ElementHandle, ElementSnapshot, FormPage, PageSnapshot,
};
use crate::automation::AutomationError;

const HANDLE_ATTR: &str = "data-autoapply-handle";

/// Headroom between the navigation timeout and chromiumoxide's per-request deadline.
const REQUEST_TIMEOUT_MARGIN: Duration = Duration::from_secs(10);

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const SNAPSHOT_SCRIPT: &str = r#"
(() => {
  const ATTR = 'data-autoapply-handle';
  const SELECTOR = 'input, textarea, button, a, iframe, .g-recaptcha, .h-captcha, #captcha';
  document.querySelectorAll('[' + ATTR + ']').forEach(el => el.removeAttribute(ATTR));

  const isVisible = el => {
    const style = window.getComputedStyle(el);
    const rect = el.getBoundingClientRect();
    return style.display !== 'none' && style.visibility !== 'hidden' && rect.width > 0 && rect.height > 0;
  };
  const labelFor = el => {
    if (!el.id) return null;
    const label = document.querySelector('label[for="' + CSS.escape(el.id) + '"]');
    return label ? label.innerText.trim() : null;
  };
  const textOf = el => {
    if (el.tagName === 'INPUT') {
      return /^(submit|button)$/i.test(el.type) ? (el.value || '') : '';
    }
    return (el.innerText || '').trim().slice(0, 200);
  };

  let next = 0;
  const out = [];
  document.querySelectorAll(SELECTOR).forEach(el => {
    const handle = ++next;
    el.setAttribute(ATTR, String(handle));
    out.push({
      handle,
      tag: el.tagName.toLowerCase(),
      type: el.getAttribute('type'),
      name: el.getAttribute('name'),
      id: el.getAttribute('id'),
      placeholder: el.getAttribute('placeholder'),
      ariaLabel: el.getAttribute('aria-label'),
      title: el.getAttribute('title'),
      accept: el.getAttribute('accept'),
      src: el.getAttribute('src'),
      classes: Array.from(el.classList),
      text: textOf(el),
      label: labelFor(el),
      visible: isVisible(el),
    });
  });
  return JSON.stringify(out);
})()
"#;

pub struct ChromiumLauncher {
    headless: bool,
    executable: Option<PathBuf>,
    request_timeout: Duration,
}

impl ChromiumLauncher {
    /// `navigation_timeout` is the engine's own navigation deadline; CDP requests are allowed
    /// to outlive it so a slow page always surfaces as a navigation timeout.
    pub fn new(headless: bool, executable: Option<PathBuf>, navigation_timeout: Duration) -> Self {
        Self {
            headless,
            executable,
            request_timeout: request_timeout_for(navigation_timeout),
        }
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn FormPage>, AutomationError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(1280, 900)
            .viewport(None::<Viewport>)
            .request_timeout(self.request_timeout)
            .arg(format!("--user-agent={USER_AGENT}"));
        if !self.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &self.executable {
            builder = builder.chrome_executable(executable);
        }
        let config = builder.build().map_err(AutomationError::Browser)?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(cdp)?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler error (ignoring): {e}");
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                return Err(cdp(e));
            }
        };
        info!("Chromium session launched (headless: {})", self.headless);

        Ok(Box::new(ChromiumPage {
            browser,
            handler_task,
            page,
        }))
    }
}

pub struct ChromiumPage {
    browser: Browser,
    handler_task: JoinHandle<()>,
    page: Page,
}

impl ChromiumPage {
    async fn element(&self, handle: ElementHandle) -> Result<Element, AutomationError> {
        self.page
            .find_element(handle_selector(handle))
            .await
            .map_err(|_| AutomationError::ElementGone(handle))
    }

    /// Runs `body` with `el` bound to the element behind `handle`.
    async fn on_element(&self, handle: ElementHandle, body: &str) -> Result<(), AutomationError> {
        let script = format!(
            "(() => {{ const el = document.querySelector({selector}); if (!el) return false; {body}; return true; }})()",
            selector = js_string(&handle_selector(handle)),
        );
        let found: bool = self
            .page
            .evaluate(script)
            .await
            .map_err(cdp)?
            .into_value()
            .map_err(cdp)?;
        if found {
            Ok(())
        } else {
            Err(AutomationError::ElementGone(handle))
        }
    }
}

#[async_trait]
impl FormPage for ChromiumPage {
    async fn navigate(&mut self, url: &str) -> Result<(), AutomationError> {
        info!("Navigating to {url}");
        self.page
            .goto(url)
            .await
            .map_err(|e| navigation_error(url, e))?;
        Ok(())
    }

    async fn snapshot(&mut self) -> Result<PageSnapshot, AutomationError> {
        let raw: String = self
            .page
            .evaluate(SNAPSHOT_SCRIPT)
            .await
            .map_err(cdp)?
            .into_value()
            .map_err(cdp)?;
        let elements: Vec<ElementSnapshot> = serde_json::from_str(&raw).map_err(cdp)?;
        let url = self.page.url().await.map_err(cdp)?.unwrap_or_default();
        debug!("Snapshot of {url}: {} elements", elements.len());
        Ok(PageSnapshot { url, elements })
    }

    async fn focus(&mut self, handle: ElementHandle) -> Result<(), AutomationError> {
        self.on_element(handle, "el.scrollIntoView({ block: 'center' }); el.focus()")
            .await
    }

    async fn set_value(
        &mut self,
        handle: ElementHandle,
        value: &str,
    ) -> Result<(), AutomationError> {
        // Native setter so framework-controlled inputs (React, Vue) observe the change.
        let body = format!(
            "const proto = el.tagName === 'TEXTAREA' ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype; \
             Object.getOwnPropertyDescriptor(proto, 'value').set.call(el, {value}); \
             el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
             el.dispatchEvent(new Event('change', {{ bubbles: true }}))",
            value = js_string(value),
        );
        self.on_element(handle, &body).await
    }

    async fn attach_file(
        &mut self,
        handle: ElementHandle,
        path: &Path,
    ) -> Result<(), AutomationError> {
        let element = self.element(handle).await?;
        let mut params = SetFileInputFilesParams::new(vec![path.display().to_string()]);
        params.backend_node_id = Some(element.backend_node_id);
        self.page.execute(params).await.map_err(cdp)?;
        Ok(())
    }

    async fn click(&mut self, handle: ElementHandle) -> Result<(), AutomationError> {
        let element = self.element(handle).await?;
        element.click().await.map_err(cdp)?;
        Ok(())
    }

    async fn screenshot(&mut self, path: &Path) -> Result<(), AutomationError> {
        self.page
            .save_screenshot(ScreenshotParams::builder().full_page(true).build(), path)
            .await
            .map_err(cdp)?;
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), AutomationError> {
        let ChromiumPage {
            mut browser,
            handler_task,
            page: _,
        } = *self;

        if let Err(e) = browser.close().await {
            warn!("Error closing browser: {e}");
            handler_task.abort();
            return Err(cdp(e));
        }
        handler_task
            .await
            .map_err(|e| AutomationError::Browser(format!("Error awaiting handler: {e}")))?;
        debug!("Chromium session closed");
        Ok(())
    }
}

fn request_timeout_for(navigation_timeout: Duration) -> Duration {
    navigation_timeout + REQUEST_TIMEOUT_MARGIN
}

fn navigation_error(url: &str, e: CdpError) -> AutomationError {
    match e {
        CdpError::Timeout => AutomationError::NavigationTimeout {
            url: url.to_string(),
        },
        other => cdp(other),
    }
}

fn handle_selector(handle: ElementHandle) -> String {
    format!("[{HANDLE_ATTR}=\"{}\"]", handle.0)
}

/// A JavaScript string literal for `value`.
fn js_string(value: &str) -> String {
    serde_json::Value::from(value).to_string()
}

fn cdp(e: impl Display) -> AutomationError {
    AutomationError::Browser(e.to_string())
}
