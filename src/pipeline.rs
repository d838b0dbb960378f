//! Generation cycle orchestration.
//!
//! A cycle walks `Sampling -> Resolving -> Rendering -> Capturing -> Storing`
//! and returns to `Idle`. The first failure ends the cycle; nothing is retried
//! and the stored artifact is only touched by a successful `Storing` step.

use crate::compositor::{CaptureOptions, Compositor, Renderer};
use crate::dictionary::DictionaryClient;
use crate::layout::{self, LayoutOptions};
use crate::store::{StoredArtifact, WallpaperStore};
use crate::words::WordSource;
use crate::{Error, Result, WallpaperConfig};
use log::{debug, error, info};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// What started a generation cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// No artifact existed when the process started
    StartupMiss,
    /// The daily schedule fired
    Timer,
    /// A request found no artifact
    RequestMiss,
    /// Explicit one-shot generation
    Manual,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Trigger::StartupMiss => "startup-miss",
            Trigger::Timer => "timer",
            Trigger::RequestMiss => "request-miss",
            Trigger::Manual => "manual",
        };
        f.write_str(name)
    }
}

/// Stage a cycle is currently in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStage {
    Idle,
    Sampling,
    Resolving,
    Rendering,
    Capturing,
    Storing,
}

/// Policy applied when a generation is requested while another is running
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GenerationGuard {
    /// Every request starts its own cycle; the last store wins
    #[default]
    Unguarded,
    /// Requests arriving during an in-flight cycle are folded into it
    SingleFlight,
}

impl FromStr for GenerationGuard {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unguarded" | "none" => Ok(GenerationGuard::Unguarded),
            "single-flight" | "singleflight" => Ok(GenerationGuard::SingleFlight),
            other => Err(format!("unknown guard '{}' (expected unguarded or single-flight)", other)),
        }
    }
}

/// Summary of a successful cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub id: u64,
    pub trigger: Trigger,
    /// Words that made it into the wallpaper, in layout order
    pub words: Vec<String>,
    pub artifact: StoredArtifact,
}

/// Owns every pipeline component and runs cycles against them
pub struct Generator {
    words: WordSource,
    dictionary: DictionaryClient,
    layout: LayoutOptions,
    compositor: Compositor,
    store: WallpaperStore,
    word_count: usize,
    guard: GenerationGuard,
    in_flight: AtomicBool,
    next_id: AtomicU64,
}

impl Generator {
    /// Wire the pipeline from configuration using the curated word pool.
    pub fn new(config: &WallpaperConfig, renderer: Arc<dyn Renderer>) -> Result<Self> {
        Self::with_words(config, WordSource::curated(), renderer)
    }

    pub fn with_words(config: &WallpaperConfig, words: WordSource, renderer: Arc<dyn Renderer>) -> Result<Self> {
        if config.word_count == 0 {
            return Err(Error::ConfigError("word count must be at least 1".into()));
        }

        Ok(Self {
            words,
            dictionary: DictionaryClient::new(config)?,
            layout: LayoutOptions {
                viewport: config.viewport,
                theme: config.theme,
                target_id: config.target_id.clone(),
            },
            compositor: Compositor::new(renderer, CaptureOptions::from_config(config)),
            store: WallpaperStore::new(config.image_path()),
            word_count: config.word_count,
            guard: config.guard,
            in_flight: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn store(&self) -> &WallpaperStore {
        &self.store
    }

    pub fn dictionary(&self) -> &DictionaryClient {
        &self.dictionary
    }

    pub fn layout_options(&self) -> &LayoutOptions {
        &self.layout
    }

    pub fn word_source(&self) -> &WordSource {
        &self.words
    }

    /// Start a cycle in the background.
    ///
    /// Returns `None` when the guard folded this request into a cycle that
    /// is already running. Failures are logged by the cycle itself.
    pub fn request_generation(self: &Arc<Self>, trigger: Trigger) -> Option<JoinHandle<Result<CycleReport>>> {
        let permit = match self.guard {
            GenerationGuard::Unguarded => None,
            GenerationGuard::SingleFlight => {
                if self.in_flight.swap(true, Ordering::SeqCst) {
                    info!("Generation ({}) coalesced into the cycle in flight", trigger);
                    return None;
                }
                Some(InFlight(self.clone()))
            }
        };

        let generator = self.clone();
        Some(tokio::spawn(async move {
            let result = generator.run_cycle(trigger).await;
            drop(permit);
            result
        }))
    }

    /// Run one full cycle on the current task.
    pub async fn run_cycle(&self, trigger: Trigger) -> Result<CycleReport> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        info!("--- Cycle {} triggered ({}) ---", id, trigger);

        let mut stage = CycleStage::Idle;
        let result = self.drive(id, trigger, &mut stage).await;

        match &result {
            Ok(report) => info!(
                "Cycle {} stored {} word(s) at {} ({} bytes, sha256 {})",
                id,
                report.words.len(),
                report.artifact.path.display(),
                report.artifact.len,
                report.artifact.sha256
            ),
            Err(e) => error!("Cycle {} ({}) failed during {:?}: {}", id, trigger, stage, e),
        }
        debug!("Cycle {} -> {:?}", id, CycleStage::Idle);
        result
    }

    async fn drive(&self, id: u64, trigger: Trigger, stage: &mut CycleStage) -> Result<CycleReport> {
        enter(id, stage, CycleStage::Sampling);
        let selected = self.words.sample(self.word_count)?;
        info!("Selected words: {}", selected.join(", "));

        enter(id, stage, CycleStage::Resolving);
        let entries = self.dictionary.resolve_all(&selected).await;
        if entries.is_empty() {
            return Err(Error::EmptyBatch);
        }
        info!("Fetched {} of {} word(s)", entries.len(), selected.len());

        enter(id, stage, CycleStage::Rendering);
        let document = layout::render_document(&entries, &self.layout);

        enter(id, stage, CycleStage::Capturing);
        let png = self.compositor.capture(document).await?;

        enter(id, stage, CycleStage::Storing);
        let artifact = self.store.write(png).await?;

        Ok(CycleReport {
            id,
            trigger,
            words: entries.into_iter().map(|e| e.word).collect(),
            artifact,
        })
    }
}

fn enter(id: u64, stage: &mut CycleStage, next: CycleStage) {
    debug!("Cycle {} {:?} -> {:?}", id, stage, next);
    *stage = next;
}

/// Clears the single-flight flag when the cycle ends
struct InFlight(Arc<Generator>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.in_flight.store(false, Ordering::SeqCst);
    }
}
