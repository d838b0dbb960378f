//! Chrome DevTools Protocol renderer backend
//!
//! Launches a headless Chrome per surface (via the `headless_chrome` crate),
//! loads the layout as a `data:` URL and screenshots the target element.

use crate::compositor::{RenderSurface, Renderer};
use crate::{Error, Result, Viewport};
use base64::Engine as Base64Engine;
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::{Emulation, Page};
use headless_chrome::{Browser, LaunchOptions};
use log::{debug, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

const VISIBILITY_POLL: Duration = Duration::from_millis(100);

/// Launch settings for the headless browser
#[derive(Debug, Clone)]
pub struct CdpConfig {
    /// Chrome/Chromium executable; auto-detected when `None`
    pub chrome_path: Option<PathBuf>,
    /// Run with the Chrome sandbox (off inside most containers)
    pub sandbox: bool,
    /// Upper bound for navigation and element waits
    pub wait_timeout_ms: u64,
}

impl Default for CdpConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            sandbox: false,
            wait_timeout_ms: 30000,
        }
    }
}

/// Renderer that drives headless Chrome
#[derive(Debug, Clone, Default)]
pub struct CdpRenderer {
    config: CdpConfig,
}

impl CdpRenderer {
    pub fn new(config: CdpConfig) -> Self {
        Self { config }
    }
}

impl Renderer for CdpRenderer {
    fn open(&self, viewport: Viewport) -> Result<Box<dyn RenderSurface>> {
        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(self.config.sandbox)
            .window_size(Some((viewport.width, viewport.height)))
            .path(self.config.chrome_path.clone())
            .build()
            .map_err(|e| Error::InitializationError(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::InitializationError(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| Error::InitializationError(format!("Failed to create tab: {}", e)))?;

        let timeout = Duration::from_millis(self.config.wait_timeout_ms);
        tab.set_default_timeout(timeout);
        tab.call_method(device_metrics(viewport)?)?;

        Ok(Box::new(CdpSurface { browser, tab, timeout }))
    }
}

/// Pin the layout viewport to the canvas at scale 1, whatever the window
/// chrome of the headless mode takes from `--window-size`.
fn device_metrics(viewport: Viewport) -> Result<Emulation::SetDeviceMetricsOverride> {
    serde_json::from_value(serde_json::json!({
        "width": viewport.width,
        "height": viewport.height,
        "deviceScaleFactor": 1,
        "mobile": false,
    }))
    .map_err(|e| Error::InitializationError(format!("Invalid device metrics: {}", e)))
}

/// One browser plus the tab holding the layout document
pub struct CdpSurface {
    browser: Browser,
    tab: Arc<Tab>,
    timeout: Duration,
}

impl CdpSurface {
    fn is_visible(&self, selector: &str) -> Result<Option<bool>> {
        let selector_json = serde_json::to_string(selector)
            .map_err(|e| Error::RenderError(format!("Invalid selector: {}", e)))?;
        let script = format!(
            r#"(function() {{
                const el = document.querySelector({});
                if (!el) return null;
                const style = window.getComputedStyle(el);
                const rect = el.getBoundingClientRect();
                return style.display !== 'none' && style.visibility !== 'hidden' && rect.width > 0 && rect.height > 0;
            }})()"#,
            selector_json
        );

        let eval = self
            .tab
            .evaluate(&script, false)
            .map_err(|e| Error::RenderError(format!("Visibility check failed: {}", e)))?;

        Ok(eval.value.and_then(|v| v.as_bool()))
    }
}

impl RenderSurface for CdpSurface {
    fn load_document(&mut self, html: &str) -> Result<()> {
        let url = format!(
            "data:text/html;charset=utf-8;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(html)
        );

        self.tab
            .navigate_to(&url)
            .map_err(|e| Error::LoadError(format!("Navigation failed: {}", e)))?;

        self.tab
            .wait_until_navigated()
            .map_err(|e| Error::LoadError(format!("Wait for navigation failed: {}", e)))?;

        Ok(())
    }

    fn wait_for_fonts(&mut self) -> Result<()> {
        let eval = self
            .tab
            .evaluate("document.fonts.ready.then(() => document.fonts.status)", true)
            .map_err(|e| Error::RenderError(format!("Font readiness failed: {}", e)))?;

        let status = eval.value.map(|v| v.to_string()).unwrap_or_default();
        debug!("Font status: {}", status);
        Ok(())
    }

    fn wait_for_visible(&mut self, selector: &str) -> Result<()> {
        let deadline = Instant::now() + self.timeout;
        loop {
            match self.is_visible(selector)? {
                Some(true) => return Ok(()),
                None if Instant::now() >= deadline => {
                    return Err(Error::RenderTargetMissing(selector.to_string()))
                }
                Some(false) if Instant::now() >= deadline => {
                    return Err(Error::RenderError(format!("'{}' never became visible", selector)))
                }
                _ => std::thread::sleep(VISIBILITY_POLL),
            }
        }
    }

    fn capture_element(&mut self, selector: &str) -> Result<Vec<u8>> {
        let element = self
            .tab
            .find_element(selector)
            .map_err(|_| Error::RenderTargetMissing(selector.to_string()))?;

        element
            .capture_screenshot(Page::CaptureScreenshotFormatOption::Png)
            .map_err(|e| Error::RenderError(format!("Screenshot failed: {}", e)))
    }

    fn close(self: Box<Self>) -> Result<()> {
        let CdpSurface { browser, tab, .. } = *self;
        if let Err(e) = tab.close(true) {
            warn!("Failed to close tab: {}", e);
        }
        // Dropping the browser terminates the child process
        drop(tab);
        drop(browser);
        Ok(())
    }
}
