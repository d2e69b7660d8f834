mod app;
mod buffer;
mod config;
mod error;
mod input;
mod poller;
mod render;
mod search;
mod session;
mod sources;
mod theme;
mod ui;
mod viewport;

use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;
use tracing_subscriber::EnvFilter;

use app::AppState;
use config::Config;
use session::{LogSession, SessionEvent};
use sources::SourceSpec;

const USAGE: &str = "\
Usage: hound [--log-file <path>] <source>...

Sources:
  <path>                          Poll a local file
  --docker <container>            Poll `docker logs`
  --k8s [namespace/]pod[:container]
                                  Poll `kubectl logs`
  --ssh <host>:<path>             Poll a remote file over SSH
  --http <url>[#selector]         Poll an HTTP endpoint (optional ?source= selector)";

/// Pull `--log-file <path>` out of the argument list
fn split_log_file(args: &[String]) -> Result<(Option<PathBuf>, Vec<String>)> {
    let mut log_file = None;
    let mut rest = Vec::with_capacity(args.len());
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--log-file" {
            let Some(path) = iter.next() else {
                bail!("--log-file requires a path");
            };
            log_file = Some(PathBuf::from(path));
        } else {
            rest.push(arg.clone());
        }
    }
    Ok((log_file, rest))
}

/// Log to a file; stdout belongs to the TUI. `RUST_LOG` overrides the default `warn`.
fn init_logging(log_file: Option<PathBuf>) -> Result<PathBuf> {
    let path = match log_file {
        Some(path) => path,
        None => dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hound")
            .join("hound.log"),
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening log file {}", path.display()))?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .compact()
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))?;
    Ok(path)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (log_file, source_args) = split_log_file(&args)?;
    if source_args.is_empty() || source_args.iter().any(|a| a == "-h" || a == "--help") {
        eprintln!("{}", USAGE);
        std::process::exit(1);
    }
    let sources = SourceSpec::parse_args(&source_args)?;
    let Some(first) = sources.first().cloned() else {
        bail!("no log source given");
    };

    if let Err(e) = init_logging(log_file) {
        eprintln!("hound: logging disabled: {:#}", e);
    }

    let config = Config::load();
    info!(sources = sources.len(), max_lines = config.max_lines, "starting");

    let (mut session, mut events) = LogSession::new(config.clone(), first);
    session
        .start()
        .with_context(|| format!("starting {}", session.source().name()))?;
    let mut state = AppState::new(&config, session, sources);

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Restore the terminal on panic
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), DisableMouseCapture, LeaveAlternateScreen);
        original_hook(panic);
    }));

    let result = run_event_loop(&mut terminal, &mut state, &mut events).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), DisableMouseCapture, LeaveAlternateScreen)?;

    result
}

async fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    state: &mut AppState<'_>,
    events: &mut UnboundedReceiver<SessionEvent>,
) -> Result<()> {
    loop {
        // Commit a settled query before drawing
        state.tick(Instant::now());

        terminal.draw(|frame| ui::draw(frame, state))?;
        // Any pending jump has now been drawn
        state.after_draw();

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(16)) => {
                if event::poll(Duration::ZERO)? {
                    match event::read()? {
                        Event::Key(key) if key.kind == KeyEventKind::Press => {
                            input::handle_key(state, key);
                        }
                        Event::Mouse(mouse) => input::handle_mouse(state, mouse),
                        _ => {}
                    }
                }
            }

            Some(event) = events.recv() => {
                state.on_session_event(event);
            }
        }

        if state.should_quit {
            break;
        }
    }

    Ok(())
}
