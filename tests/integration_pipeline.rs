//! End-to-end generation cycles against a fake dictionary provider

mod common;

use common::{start_dictionary_server, start_slow_dictionary_server, test_config};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use vocabsync::compositor::{NoopRenderer, RenderSurface, Renderer, PNG_SIGNATURE};
use vocabsync::{
    DictionaryClient, Error, GenerationGuard, Generator, Trigger, Viewport, WordSource,
};

/// Keeps every document it is asked to render; capture `0` is slow.
#[derive(Default)]
struct RecordingRenderer {
    opened: AtomicUsize,
    documents: Arc<Mutex<Vec<String>>>,
    slow_first: Option<Duration>,
}

struct RecordingSurface {
    index: usize,
    documents: Arc<Mutex<Vec<String>>>,
    delay: Option<Duration>,
}

impl Renderer for RecordingRenderer {
    fn open(&self, _viewport: Viewport) -> vocabsync::Result<Box<dyn RenderSurface>> {
        let index = self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RecordingSurface {
            index,
            documents: self.documents.clone(),
            delay: if index == 0 { self.slow_first } else { None },
        }))
    }
}

impl RenderSurface for RecordingSurface {
    fn load_document(&mut self, html: &str) -> vocabsync::Result<()> {
        self.documents.lock().unwrap().push(html.to_string());
        Ok(())
    }
    fn wait_for_fonts(&mut self) -> vocabsync::Result<()> {
        Ok(())
    }
    fn wait_for_visible(&mut self, _selector: &str) -> vocabsync::Result<()> {
        Ok(())
    }
    fn capture_element(&mut self, _selector: &str) -> vocabsync::Result<Vec<u8>> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        Ok(png_for(self.index))
    }
    fn close(self: Box<Self>) -> vocabsync::Result<()> {
        Ok(())
    }
}

fn png_for(index: usize) -> Vec<u8> {
    let mut png = PNG_SIGNATURE.to_vec();
    png.extend_from_slice(format!("capture-{}", index).as_bytes());
    png
}

#[tokio::test]
async fn one_failed_lookup_still_stores_artifact() {
    let base = start_dictionary_server();
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&base, dir.path(), 3);
    let renderer = Arc::new(NoopRenderer::new());
    let words = WordSource::new(["Ephemeral", "Petrichor", "Missing"]);
    let generator = Generator::with_words(&config, words, renderer.clone()).unwrap();

    let report = generator.run_cycle(Trigger::Manual).await.expect("cycle");

    let resolved: HashSet<_> = report.words.iter().map(String::as_str).collect();
    assert_eq!(resolved, HashSet::from(["Ephemeral", "Petrichor"]));
    assert!(generator.store().exists());
    assert_eq!(report.artifact.path, config.image_path());
    assert_eq!(renderer.opened(), 1);
    assert_eq!(renderer.closed(), 1);
}

#[tokio::test]
async fn all_failed_lookups_leave_previous_artifact_untouched() {
    let base = start_dictionary_server();
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&base, dir.path(), 2);
    std::fs::write(config.image_path(), b"previous wallpaper").unwrap();

    let renderer = Arc::new(NoopRenderer::new());
    let words = WordSource::new(["Missing", "Garbled"]);
    let generator = Generator::with_words(&config, words, renderer.clone()).unwrap();

    let err = generator.run_cycle(Trigger::Timer).await.unwrap_err();
    assert!(matches!(err, Error::EmptyBatch));
    assert_eq!(renderer.opened(), 0);
    assert_eq!(std::fs::read(config.image_path()).unwrap(), b"previous wallpaper");
}

#[tokio::test]
async fn render_failure_leaves_previous_artifact_untouched() {
    let base = start_dictionary_server();
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&base, dir.path(), 1);
    std::fs::write(config.image_path(), b"previous wallpaper").unwrap();

    struct Missing;
    impl Renderer for Missing {
        fn open(&self, _viewport: Viewport) -> vocabsync::Result<Box<dyn RenderSurface>> {
            Err(Error::InitializationError("no browser".into()))
        }
    }
    let generator =
        Generator::with_words(&config, WordSource::new(["Ephemeral"]), Arc::new(Missing)).unwrap();
    let err = generator.run_cycle(Trigger::Manual).await.unwrap_err();
    assert!(matches!(err, Error::InitializationError(_)));
    assert_eq!(std::fs::read(config.image_path()).unwrap(), b"previous wallpaper");
}

#[tokio::test]
async fn lookups_normalize_words_and_synthesize_examples() {
    let base = start_dictionary_server();
    let dir = tempfile::tempdir().unwrap();
    let client = DictionaryClient::new(&test_config(&base, dir.path(), 3)).unwrap();

    let ephemeral = client.resolve("ephemeral").await.expect("resolved");
    assert_eq!(ephemeral.word, "Ephemeral");
    assert_eq!(ephemeral.example, "fashions are ephemeral");

    let petrichor = client.resolve("petrichor").await.expect("resolved");
    assert_eq!(petrichor.example, "The noun used in a common context.");
    assert_eq!(petrichor.phonetic, "");

    assert!(client.resolve("garbled").await.is_none());
    assert!(client.resolve("missing").await.is_none());

    let words: Vec<String> = ["missing", "petrichor", "garbled", "ephemeral"]
        .iter()
        .map(|w| w.to_string())
        .collect();
    let entries = client.resolve_all(&words).await;
    let order: Vec<_> = entries.iter().map(|e| e.word.as_str()).collect();
    assert_eq!(order, vec!["Petrichor", "Ephemeral"]);
}

#[tokio::test]
async fn lookups_overlap_and_survive_a_failing_sibling() {
    let delay = Duration::from_millis(400);
    let base = start_slow_dictionary_server(delay);
    let dir = tempfile::tempdir().unwrap();
    let client = DictionaryClient::new(&test_config(&base, dir.path(), 3)).unwrap();

    let words: Vec<String> = ["ephemeral", "missing", "petrichor", "nefarious"]
        .iter()
        .map(|w| w.to_string())
        .collect();
    let started = Instant::now();
    let entries = client.resolve_all(&words).await;
    let elapsed = started.elapsed();

    // `missing` fails at once; the slow lookups next to it still complete
    let order: Vec<_> = entries.iter().map(|e| e.word.as_str()).collect();
    assert_eq!(order, vec!["Ephemeral", "Petrichor", "Nefarious"]);
    assert!(elapsed >= delay);
    assert!(
        elapsed < delay * 2,
        "three {:?} lookups took {:?}; they ran one after another",
        delay,
        elapsed
    );
}

#[cfg(unix)]
#[tokio::test]
async fn store_failure_leaves_previous_artifact_untouched() {
    use std::os::unix::fs::PermissionsExt;

    let base = start_dictionary_server();
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&base, dir.path(), 1);
    std::fs::write(config.image_path(), b"previous wallpaper").unwrap();

    let set_mode = |mode| {
        std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(mode)).unwrap()
    };
    set_mode(0o555);
    if tempfile::tempfile_in(dir.path()).is_ok() {
        set_mode(0o755);
        eprintln!("Skipping store failure test: directory permissions are not enforced (running as root?)");
        return;
    }

    let renderer = Arc::new(NoopRenderer::new());
    let generator =
        Generator::with_words(&config, WordSource::new(["Ephemeral"]), renderer.clone()).unwrap();
    let result = generator.run_cycle(Trigger::Manual).await;
    set_mode(0o755);

    assert!(matches!(result, Err(Error::StoreWrite { .. })), "got {:?}", result);
    assert_eq!(renderer.closed(), 1);
    assert_eq!(std::fs::read(config.image_path()).unwrap(), b"previous wallpaper");
    let names: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(names, vec![std::ffi::OsString::from("daily.png")]);
}

#[tokio::test]
async fn untrusted_text_reaches_renderer_escaped() {
    let base = start_dictionary_server();
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&base, dir.path(), 1);
    let renderer = Arc::new(RecordingRenderer::default());
    let generator =
        Generator::with_words(&config, WordSource::new(["Nefarious"]), renderer.clone()).unwrap();

    generator.run_cycle(Trigger::Manual).await.expect("cycle");

    let documents = renderer.documents.lock().unwrap();
    let html = &documents[0];
    assert!(!html.contains("<script>"));
    assert!(html.contains("&lt;script&gt;alert(&#039;x&#039;)&lt;/script&gt; &amp; criminal."));
    assert!(html.contains("the &quot;nefarious&quot; activities"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn overlapping_cycles_last_store_wins() {
    let base = start_dictionary_server();
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&base, dir.path(), 2);
    let renderer = Arc::new(RecordingRenderer {
        slow_first: Some(Duration::from_millis(500)),
        ..Default::default()
    });
    let words = WordSource::new(["Ephemeral", "Petrichor"]);
    let generator = Arc::new(Generator::with_words(&config, words, renderer.clone()).unwrap());

    let first = generator.request_generation(Trigger::Timer).expect("unguarded");
    let second = generator.request_generation(Trigger::RequestMiss).expect("unguarded");
    let (a, b) = tokio::join!(first, second);
    let a = a.unwrap().expect("first cycle");
    let b = b.unwrap().expect("second cycle");

    // Capture 0 sleeps, so its cycle performs the final write
    let slow = png_for(0);
    let stored = std::fs::read(config.image_path()).unwrap();
    assert_eq!(stored, slow);
    assert_ne!(a.artifact.sha256, b.artifact.sha256);
    assert_eq!(renderer.opened.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn single_flight_coalesces_overlapping_requests() {
    let base = start_dictionary_server();
    let dir = tempfile::tempdir().unwrap();
    let config = vocabsync::WallpaperConfig {
        guard: GenerationGuard::SingleFlight,
        ..test_config(&base, dir.path(), 1)
    };
    let renderer = Arc::new(RecordingRenderer {
        slow_first: Some(Duration::from_millis(300)),
        ..Default::default()
    });
    let generator = Arc::new(
        Generator::with_words(&config, WordSource::new(["Ephemeral"]), renderer.clone()).unwrap(),
    );

    let first = generator.request_generation(Trigger::StartupMiss).expect("first runs");
    assert!(generator.request_generation(Trigger::RequestMiss).is_none());
    first.await.unwrap().expect("cycle");

    let again = generator.request_generation(Trigger::Timer).expect("flag cleared");
    again.await.unwrap().expect("cycle");
    assert_eq!(renderer.opened.load(Ordering::SeqCst), 2);
}
