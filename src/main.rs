mod app;
mod input;
mod source;
mod ui;

use anyhow::{Context, Result};
use app::App;
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use highlight_filters::constants::{
    DEFAULT_EXPORT_FILE, DEFAULT_SETTINGS_FILE, POLL_INTERVAL_MS, RECOMPUTE_DEBOUNCE_MS,
    WEBVIEW_REFRESH_MS,
};
use highlight_filters::controller::{Controller, EngineSettings};
use highlight_filters::document::Document;
use highlight_filters::state::{self, JsonFileStore};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use ui::TuiRenderer;

#[derive(Parser)]
#[command(name = "hlfilter")]
#[command(about = "Highlight a text file with groups of pattern filters")]
struct Cli {
    #[arg(help = "File to view; changes on disk are picked up live")]
    file: PathBuf,

    #[arg(long, help = "Settings file holding filter groups and ranges", default_value = DEFAULT_SETTINGS_FILE)]
    settings: PathBuf,

    #[arg(long = "debounce-ms", help = "Delay before recomputing highlights after a change", default_value_t = RECOMPUTE_DEBOUNCE_MS)]
    debounce_ms: u64,

    #[arg(long = "log-file", help = "Write logs here (filtered by RUST_LOG)")]
    log_file: Option<PathBuf>,
}

fn init_logging(path: &Path) -> Result<WorkerGuard> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let name = path.file_name().context("log file path has no file name")?;
    let appender = tracing_appender::rolling::never(dir, name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing log subscriber: {}", e))?;
    Ok(guard)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let _log_guard = cli.log_file.as_deref().map(init_logging).transpose()?;

    let mut store = JsonFileStore::new(&cli.settings);
    let config = state::load_or_seed(&mut store)?;
    info!(target: "app", settings = %cli.settings.display(), groups = config.groups.len(), "settings ready");

    let text = source::read_document(&cli.file)?;
    let settings = EngineSettings {
        recompute_window: Duration::from_millis(cli.debounce_ms),
        refresh_window: Duration::from_millis(WEBVIEW_REFRESH_MS),
    };
    let mut controller = Controller::new(config, TuiRenderer::default(), store, settings);
    let now = Instant::now();
    controller.open_document(Document::new(cli.file.display().to_string(), text.clone()), now);
    controller.recompute_now(now);

    let source = source::watch_document(cli.file.clone(), text);
    let app = App::new(controller, source, PathBuf::from(DEFAULT_EXPORT_FILE));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        error!(target: "app", error = %e, "terminated with error");
        eprintln!("Error: {}", e);
    }

    Ok(())
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, mut app: App) -> Result<()> {
    loop {
        let now = Instant::now();
        app.poll_source(now);
        app.tick(now);

        let visible_height = ui::document_height(terminal.size()?.height);
        terminal.draw(|f| ui::draw(f, &mut app))?;

        let poll = app
            .controller
            .next_deadline()
            .map(|d| d.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::MAX)
            .min(Duration::from_millis(POLL_INTERVAL_MS));

        if event::poll(poll)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if app.handle_key(key, visible_height, Instant::now()) {
                    return Ok(());
                }
            }
        }
    }
}
