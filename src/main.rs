use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use log::info;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use vocabsync::compositor::Renderer;
use vocabsync::pipeline::{Generator, GenerationGuard, Trigger};
use vocabsync::{layout, scheduler, DailySchedule, Theme, Viewport, WallpaperConfig, WallpaperServer};

/// Daily vocabulary wallpaper generator and server
#[derive(Parser, Debug)]
#[command(name = "vocabsync", version, about)]
struct Cli {
    #[command(flatten)]
    opts: Opts,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve /daily.png and regenerate it on schedule (default)
    Serve,
    /// Run one generation cycle and exit
    Generate,
    /// Write the layout HTML for a fresh sample without rasterizing it
    Preview {
        /// Output file for the HTML document
        #[arg(long, default_value = "preview.html")]
        out: PathBuf,
    },
}

#[derive(Args, Debug)]
struct Opts {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3001, global = true)]
    port: u16,

    /// Interface to bind
    #[arg(long, env = "VOCABSYNC_HOST", default_value = "0.0.0.0", global = true)]
    host: std::net::IpAddr,

    /// Directory holding daily.png (served under /public)
    #[arg(long, env = "VOCABSYNC_PUBLIC_DIR", default_value = "public", global = true)]
    public_dir: PathBuf,

    /// Words per wallpaper
    #[arg(long, env = "VOCABSYNC_WORDS", default_value_t = 3, global = true)]
    words: usize,

    /// Cron expression for the daily regeneration (5-field crontab, or 6/7 fields with seconds)
    #[arg(long, env = "VOCABSYNC_SCHEDULE", default_value = "0 0 * * *", global = true)]
    schedule: String,

    /// IANA timezone for the schedule
    #[arg(long, env = "VOCABSYNC_TIMEZONE", default_value = "Asia/Dubai", global = true)]
    timezone: String,

    /// Colour theme: light, dark or midnight
    #[arg(long, env = "VOCABSYNC_THEME", default_value = "light", global = true)]
    theme: Theme,

    /// Canvas width in pixels
    #[arg(long, env = "VOCABSYNC_WIDTH", default_value_t = 1290, global = true)]
    width: u32,

    /// Canvas height in pixels
    #[arg(long, env = "VOCABSYNC_HEIGHT", default_value_t = 2796, global = true)]
    height: u32,

    /// Wait after fonts and layout are ready, before capture (ms)
    #[arg(long, env = "VOCABSYNC_SETTLE_MS", default_value_t = 2000, global = true)]
    settle_ms: u64,

    /// Dictionary provider base URL
    #[arg(long, env = "VOCABSYNC_DICTIONARY_URL", default_value = vocabsync::DEFAULT_DICTIONARY_URL, global = true)]
    dictionary_url: String,

    /// Per-word lookup timeout (ms)
    #[arg(long, env = "VOCABSYNC_LOOKUP_TIMEOUT_MS", default_value_t = 10000, global = true)]
    lookup_timeout_ms: u64,

    /// Overlapping generation policy: unguarded or single-flight
    #[arg(long, env = "VOCABSYNC_GUARD", default_value = "unguarded", global = true)]
    guard: GenerationGuard,

    /// Chrome/Chromium executable (auto-detected when omitted)
    #[arg(long, env = "CHROME", global = true)]
    chrome: Option<PathBuf>,

    /// Run Chrome with its sandbox enabled
    #[arg(long, env = "VOCABSYNC_CHROME_SANDBOX", global = true)]
    chrome_sandbox: bool,
}

impl Opts {
    fn config(&self) -> WallpaperConfig {
        WallpaperConfig {
            viewport: Viewport { width: self.width, height: self.height },
            word_count: self.words,
            public_dir: self.public_dir.clone(),
            dictionary_url: self.dictionary_url.clone(),
            lookup_timeout_ms: self.lookup_timeout_ms,
            settle_delay_ms: self.settle_ms,
            theme: self.theme,
            schedule: self.schedule.clone(),
            timezone: self.timezone.clone(),
            listen: SocketAddr::new(self.host, self.port),
            guard: self.guard,
            ..Default::default()
        }
    }
}

#[cfg(feature = "cdp")]
fn renderer(opts: &Opts) -> anyhow::Result<Arc<dyn Renderer>> {
    use vocabsync::cdp::{CdpConfig, CdpRenderer};
    Ok(Arc::new(CdpRenderer::new(CdpConfig {
        chrome_path: opts.chrome.clone(),
        sandbox: opts.chrome_sandbox,
        ..Default::default()
    })))
}

#[cfg(not(feature = "cdp"))]
fn renderer(_opts: &Opts) -> anyhow::Result<Arc<dyn Renderer>> {
    bail!("vocabsync was built without a renderer backend; rebuild with `--features cdp`")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vocabsync=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.opts.config();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&cli.opts, config).await,
        Command::Generate => {
            let generator = build_generator(&cli.opts, &config)?;
            let report = generator.run_cycle(Trigger::Manual).await?;
            println!("{}", report.artifact.path.display());
            Ok(())
        }
        Command::Preview { out } => {
            let generator = build_generator(&cli.opts, &config)?;
            let words = generator.word_source().sample(config.word_count)?;
            let entries = generator.dictionary().resolve_all(&words).await;
            if entries.is_empty() {
                bail!("none of {} could be resolved", words.join(", "));
            }
            let html = layout::render_document(&entries, generator.layout_options());
            tokio::fs::write(&out, html)
                .await
                .with_context(|| format!("writing {}", out.display()))?;
            println!("{}", out.display());
            Ok(())
        }
    }
}

fn build_generator(opts: &Opts, config: &WallpaperConfig) -> anyhow::Result<Arc<Generator>> {
    let generator = Generator::new(config, renderer(opts)?)?;
    generator
        .store()
        .ensure_dir()
        .with_context(|| format!("creating {}", config.public_dir.display()))?;
    Ok(Arc::new(generator))
}

async fn serve(opts: &Opts, config: WallpaperConfig) -> anyhow::Result<()> {
    let schedule = DailySchedule::parse(&config.schedule, &config.timezone)?;
    let generator = build_generator(opts, &config)?;

    let server = WallpaperServer::bind(config.listen, generator.clone())?;
    let addr = server.local_addr();
    info!("VocabSync Server running at http://{}", addr);
    info!("Daily image endpoint: http://{}/daily.png", addr);
    info!("Schedule: '{}' in {}", schedule.expression(), schedule.timezone());
    info!("Current time: {}", chrono::Utc::now().to_rfc3339());

    scheduler::generate_if_missing(&generator);
    let timer = scheduler::spawn_daily(generator, schedule);

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal, stopping server");
            shutdown.shutdown();
        }
    });

    server.run().await?;
    timer.abort();
    Ok(())
}
