//! VocabSync
//!
//! Generates a daily "vocabulary wallpaper": a portrait PNG listing a few
//! vocabulary words with their definitions and examples, and serves the latest
//! image from an always-fresh HTTP endpoint.
//!
//! # Pipeline
//!
//! - **Words**: a random, non-repeating sample from a curated pool
//! - **Dictionary**: concurrent per-word lookups; failures are dropped
//! - **Layout**: a deterministic, escaped HTML document of a fixed canvas
//! - **Compositor**: rasterizes the layout through a `Renderer` (headless
//!   Chrome over CDP by default)
//! - **Store**: the single latest artifact, overwritten atomically
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vocabsync::{Generator, Trigger, WallpaperConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = WallpaperConfig::default();
//! let renderer = Arc::new(vocabsync::compositor::NoopRenderer::new());
//! let generator = Generator::new(&config, renderer)?;
//! let report = generator.run_cycle(Trigger::Manual).await?;
//! println!("Stored {} bytes at {}", report.artifact.len, report.artifact.path.display());
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

pub mod error;
pub use error::{Error, Result};

pub mod compositor;
pub mod dictionary;
pub mod layout;
pub mod pipeline;
pub mod scheduler;
pub mod server;
pub mod store;
pub mod words;

// Headless Chrome renderer backend
#[cfg(feature = "cdp")]
pub mod cdp;

pub use compositor::{Compositor, RenderSurface, Renderer};
pub use dictionary::DictionaryClient;
pub use layout::Theme;
pub use pipeline::{CycleReport, CycleStage, GenerationGuard, Generator, Trigger};
pub use scheduler::DailySchedule;
pub use server::WallpaperServer;
pub use store::{StoredArtifact, WallpaperStore};
pub use words::WordSource;

/// Default dictionary provider (free dictionary API)
pub const DEFAULT_DICTIONARY_URL: &str = "https://api.dictionaryapi.dev/api/v2/entries/en/";

/// Id of the layout root element captured by the compositor
pub const DEFAULT_TARGET_ID: &str = "wallpaper-target";

/// Configuration for the wallpaper service
///
/// The defaults reproduce the canonical deployment: three words on a
/// 1290x2796 canvas, regenerated every midnight in Asia/Dubai and served on
/// port 3001.
///
/// # Examples
///
/// ```
/// let cfg = vocabsync::WallpaperConfig::default();
/// assert_eq!(cfg.word_count, 3);
/// assert!(cfg.image_path().ends_with("daily.png"));
/// ```
#[derive(Debug, Clone)]
pub struct WallpaperConfig {
    /// Canvas and rendering-surface size
    pub viewport: Viewport,
    /// Words sampled per cycle
    pub word_count: usize,
    /// Directory holding the artifact (also served under `/public`)
    pub public_dir: PathBuf,
    /// File name of the artifact inside `public_dir`
    pub image_name: String,
    /// Base URL of the dictionary provider; the word is appended as a path segment
    pub dictionary_url: String,
    /// Per-lookup request timeout in milliseconds
    pub lookup_timeout_ms: u64,
    /// User agent sent to the dictionary provider
    pub user_agent: String,
    /// Wait after readiness signals and before capture, in milliseconds
    pub settle_delay_ms: u64,
    /// Id of the layout element to capture
    pub target_id: String,
    /// Colour palette for the layout
    pub theme: Theme,
    /// Cron expression for the daily regeneration
    pub schedule: String,
    /// IANA timezone the schedule is evaluated in
    pub timezone: String,
    /// Address the serving endpoint binds to
    pub listen: SocketAddr,
    /// Concurrency policy for overlapping generation requests
    pub guard: GenerationGuard,
}

impl Default for WallpaperConfig {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            word_count: 3,
            public_dir: PathBuf::from("public"),
            image_name: "daily.png".to_string(),
            dictionary_url: DEFAULT_DICTIONARY_URL.to_string(),
            lookup_timeout_ms: 10000,
            user_agent: format!("vocabsync/{}", env!("CARGO_PKG_VERSION")),
            settle_delay_ms: 2000,
            target_id: DEFAULT_TARGET_ID.to_string(),
            theme: Theme::default(),
            schedule: "0 0 * * *".to_string(),
            timezone: "Asia/Dubai".to_string(),
            listen: SocketAddr::from(([0, 0, 0, 0], 3001)),
            guard: GenerationGuard::default(),
        }
    }
}

impl WallpaperConfig {
    /// Full path of the artifact
    pub fn image_path(&self) -> PathBuf {
        self.public_dir.join(&self.image_name)
    }
}

/// Canvas dimensions in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1290,
            height: 2796,
        }
    }
}

/// A resolved vocabulary word ready for layout
///
/// Produced by the dictionary client for each successful lookup and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordEntry {
    /// Headword with its first character upper-cased
    pub word: String,
    /// IPA transcription, empty when the provider has none
    pub phonetic: String,
    pub part_of_speech: String,
    pub definition: String,
    /// Usage example; synthesized when the provider has none
    pub example: String,
}
