//! Rasterizes layout documents through a pluggable rendering backend.
//!
//! A `Renderer` opens a `RenderSurface` sized to the canvas. The compositor
//! drives every surface through the same ordered steps:
//! load, fonts ready, target visible, settling delay, element capture. The
//! surface is closed afterwards whether or not the capture succeeded.

use crate::{Error, Result, Viewport, WallpaperConfig};
use log::{debug, warn};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// PNG file signature
pub const PNG_SIGNATURE: &[u8; 8] = b"\x89PNG\r\n\x1a\n";

/// A live rendering surface (e.g. a browser tab) holding one document.
pub trait RenderSurface {
    /// Load a complete HTML document, including its remote assets
    fn load_document(&mut self, html: &str) -> Result<()>;

    /// Block until the document reports its fonts as loaded
    fn wait_for_fonts(&mut self) -> Result<()>;

    /// Block until the element matching `selector` is visible.
    /// Returns `Error::RenderTargetMissing` when it never appears.
    fn wait_for_visible(&mut self, selector: &str) -> Result<()>;

    /// Capture only the element matching `selector` as an opaque PNG
    fn capture_element(&mut self, selector: &str) -> Result<Vec<u8>>;

    /// Release every resource held by the surface
    fn close(self: Box<Self>) -> Result<()>;
}

/// Factory for rendering surfaces.
///
/// Implementations are synchronous; the compositor calls them from a
/// blocking thread.
pub trait Renderer: Send + Sync {
    /// Open a surface whose viewport is exactly `viewport`
    fn open(&self, viewport: Viewport) -> Result<Box<dyn RenderSurface>>;
}

/// Settings for one capture
#[derive(Debug, Clone)]
pub struct CaptureOptions {
    pub viewport: Viewport,
    /// CSS selector of the element to capture
    pub target_selector: String,
    /// Wait applied after the readiness signals
    pub settle_delay: Duration,
}

impl CaptureOptions {
    pub fn from_config(config: &WallpaperConfig) -> Self {
        Self {
            viewport: config.viewport,
            target_selector: format!("#{}", config.target_id),
            settle_delay: Duration::from_millis(config.settle_delay_ms),
        }
    }
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self::from_config(&WallpaperConfig::default())
    }
}

/// Async front end over a `Renderer`
#[derive(Clone)]
pub struct Compositor {
    renderer: Arc<dyn Renderer>,
    options: CaptureOptions,
}

impl Compositor {
    pub fn new(renderer: Arc<dyn Renderer>, options: CaptureOptions) -> Self {
        Self { renderer, options }
    }

    pub fn options(&self) -> &CaptureOptions {
        &self.options
    }

    /// Rasterize `document` into PNG bytes.
    pub async fn capture(&self, document: String) -> Result<Vec<u8>> {
        let renderer = self.renderer.clone();
        let options = self.options.clone();
        tokio::task::spawn_blocking(move || capture_blocking(renderer.as_ref(), &options, &document))
            .await
            .map_err(|e| Error::RenderError(format!("Capture task failed: {}", e)))?
    }
}

/// Run one capture on the current thread.
pub fn capture_blocking(renderer: &dyn Renderer, options: &CaptureOptions, document: &str) -> Result<Vec<u8>> {
    let mut surface = renderer.open(options.viewport)?;
    let result = drive(surface.as_mut(), options, document);

    match (result, surface.close()) {
        (Ok(png), Ok(())) => Ok(png),
        (Ok(png), Err(e)) => {
            warn!("Capture succeeded but releasing the surface failed: {}", e);
            Ok(png)
        }
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(close_err)) => {
            warn!("Releasing the surface after a failed capture also failed: {}", close_err);
            Err(e)
        }
    }
}

fn drive(surface: &mut dyn RenderSurface, options: &CaptureOptions, document: &str) -> Result<Vec<u8>> {
    debug!("Loading document ({} bytes)", document.len());
    surface.load_document(document)?;

    debug!("Waiting for fonts");
    surface.wait_for_fonts()?;

    debug!("Waiting for '{}' to become visible", options.target_selector);
    surface.wait_for_visible(&options.target_selector)?;

    if !options.settle_delay.is_zero() {
        debug!("Settling for {:?}", options.settle_delay);
        std::thread::sleep(options.settle_delay);
    }

    let png = surface.capture_element(&options.target_selector)?;
    if png.is_empty() {
        return Err(Error::RenderError("Renderer returned an empty image".into()));
    }
    Ok(png)
}

/// A renderer that draws nothing.
///
/// Every capture yields a PNG signature followed by the capture counter, so
/// successive captures are distinguishable. Used in tests and as a safe
/// stand-in when no browser backend is compiled in.
#[derive(Debug, Default)]
pub struct NoopRenderer {
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl NoopRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Surfaces opened so far
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Surfaces released so far
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Renderer for NoopRenderer {
    fn open(&self, _viewport: Viewport) -> Result<Box<dyn RenderSurface>> {
        let index = self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(NoopSurface {
            index,
            loaded: None,
            closed: self.closed.clone(),
        }))
    }
}

struct NoopSurface {
    index: usize,
    loaded: Option<String>,
    closed: Arc<AtomicUsize>,
}

impl RenderSurface for NoopSurface {
    fn load_document(&mut self, html: &str) -> Result<()> {
        self.loaded = Some(html.to_string());
        Ok(())
    }

    fn wait_for_fonts(&mut self) -> Result<()> {
        Ok(())
    }

    fn wait_for_visible(&mut self, selector: &str) -> Result<()> {
        let id = selector.trim_start_matches('#');
        match &self.loaded {
            Some(html) if html.contains(&format!("id=\"{}\"", id)) => Ok(()),
            _ => Err(Error::RenderTargetMissing(selector.to_string())),
        }
    }

    fn capture_element(&mut self, _selector: &str) -> Result<Vec<u8>> {
        let mut png = PNG_SIGNATURE.to_vec();
        png.extend_from_slice(&(self.index as u64).to_be_bytes());
        Ok(png)
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
