//! konawall: random image-board wallpapers on every monitor, rotated from
//! the terminal.
//!
//! ## Architecture overview
//!
//! ```text
//! ┌────────────┐  RotateMsg  ┌──────────┐  draw()  ┌──────────┐
//! │ rotator.rs │ ──────────► │  app.rs  │ ───────► │  ui.rs   │
//! │  (thread)  │  (channel)  │ (state)  │          │ (render) │
//! └────────────┘             └──────────┘          └──────────┘
//!       │ rotate()                ▲ │ take_requests()
//!       ▼                         │ ▼
//! ┌─────────────┐           ┌──────────┐
//! │ dispatch.rs │           │ input.rs │
//! └─────────────┘           └──────────┘
//!    │        │
//!    ▼        ▼
//! source/  environment/
//! ```
//!
//! * **`source/`**: the `SourceStrategy` trait and the image boards
//!   (Konachan, e621) plus their shared HTTP client.
//! * **`environment/`**: the `EnvironmentStrategy` trait, one module per
//!   desktop family, and environment detection.
//! * **`monitor`** / **`compositor`**: display geometry and the spanning
//!   image for desktops that take a single picture.
//! * **`dispatch`**: one rotation cycle from detection to apply.
//! * **`rotator`**: background thread that runs cycles on a timer or on
//!   request.
//! * **`app`** / **`ui`** / **`input`**: terminal front end state,
//!   rendering and keys.
//! * **`main`**: wires everything together: parse args, build the
//!   registries, and run the chosen command.

mod app;
mod command;
mod compositor;
mod config;
mod dispatch;
mod environment;
mod error;
mod input;
mod logging;
mod monitor;
mod registry;
mod rotator;
mod source;
mod ui;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing::{info, warn};

use app::{App, Request};
use command::{open_targets, CommandRunner, SystemRunner};
use config::{Cli, Command, Settings};
use dispatch::{CycleOutcome, Dispatcher};
use environment::{detect, EnvironmentRegistry, Toolbox};
use rotator::{Rotator, RotatorOptions};
use source::booru::BoardClient;
use source::SourceRegistry;

// ---------------------------------------------------------------------------
// RAII terminal guard
// ---------------------------------------------------------------------------

/// Manages terminal raw-mode and alternate-screen lifetime via [`Drop`].
///
/// Constructing this struct enters raw mode + alternate screen. When the
/// value is dropped (normally or during stack unwinding) it restores the
/// terminal.
struct TerminalGuard {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
}

impl TerminalGuard {
    fn new() -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;
        Ok(Self { terminal })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

/// Install a panic hook that restores the terminal before printing the
/// panic message.
fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(info);
    }));
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

/// Build both registries and the dispatcher around them.
fn build_dispatcher(settings: &Settings, runner: Arc<dyn CommandRunner>) -> Result<Dispatcher> {
    std::fs::create_dir_all(&settings.output_dir)
        .with_context(|| format!("creating {}", settings.output_dir.display()))?;

    let client = BoardClient::with_download_dir(settings.output_dir.clone())?;
    info!(dir = %client.download_dir().display(), "downloads go here");

    let mut sources = SourceRegistry::new("source");
    source::register_all(&mut sources, Arc::new(client));

    let mut environments = EnvironmentRegistry::new("environment");
    let tools = Toolbox {
        runner: Arc::clone(&runner),
        canvas_dir: settings.output_dir.clone(),
    };
    environment::register_all(&mut environments, &tools);

    let displays = settings.displays.clone();
    let probe: dispatch::ProbeFactory =
        Box::new(move |env: &str| monitor::probe_for(env, displays.clone(), Arc::clone(&runner)));

    Ok(Dispatcher::new(sources, environments, probe, settings.cycle.clone()))
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn print_detected() -> Result<()> {
    println!("{}", detect::detect()?);
    Ok(())
}

fn print_registries(dispatcher: &Dispatcher) {
    println!("sources ({}):", dispatcher.sources().len());
    for key in dispatcher.sources().keys() {
        println!("  {key}");
    }
    let environments = dispatcher.environments();
    println!("environments ({}):", environments.len());
    for key in environments.keys() {
        let addressing = environments.get(key).map(|s| s.addressing().label()).unwrap_or("?");
        println!("  {key:<10} {addressing}");
    }
}

fn rotate_once(dispatcher: &Dispatcher) -> Result<()> {
    let report = match dispatcher.rotate()? {
        CycleOutcome::Completed(report) => report,
        CycleOutcome::Skipped => {
            println!("a rotation is already running");
            return Ok(());
        }
    };
    println!(
        "{} on {} monitor(s) in {:.1}s",
        report.environment,
        report.monitors.len(),
        report.elapsed.as_secs_f32()
    );
    if report.fetched.is_empty() {
        println!("nothing fetched, wallpaper unchanged");
    }
    for (post, file) in report.fetched.posts.iter().zip(&report.fetched.files) {
        println!(
            "  #{} {} {} {}\n    {}",
            post.id,
            post.resolution(),
            post.rating_label(),
            post.show_url,
            file.display()
        );
    }
    Ok(())
}

fn run_tui(
    dispatcher: Arc<Dispatcher>,
    settings: &Settings,
    runner: &dyn CommandRunner,
    log_file: Option<PathBuf>,
) -> Result<()> {
    let rotator = Rotator::spawn(
        Arc::clone(&dispatcher),
        RotatorOptions {
            interval: settings.interval,
            paused: settings.paused,
            rotate_on_start: true,
        },
    );

    // -- terminal setup (Drop restores on exit or panic) ---------------------
    let mut guard = TerminalGuard::new()?;
    let mut app = App::new(&settings.cycle.source, settings.interval, settings.paused);
    app.log_file = log_file;

    // -- main event loop -----------------------------------------------------
    // Runs at ~10 fps (100 ms tick). Each iteration:
    //   1. Drain any messages from the rotator.
    //   2. Render the UI.
    //   3. Poll for keyboard input (non-blocking, up to tick_rate).
    //   4. Carry out whatever the keys asked for.
    let tick_rate = Duration::from_millis(100);

    loop {
        while let Ok(msg) = rotator.messages.try_recv() {
            app.handle_msg(msg);
        }

        guard.terminal.draw(|f| ui::draw(&mut app, f))?;

        if event::poll(tick_rate)? {
            if let Event::Key(key) = event::read()? {
                input::handle_key_event(&mut app, key);
            }
        }

        for request in app.take_requests() {
            match request {
                Request::Rotate => rotator.rotate_now(),
                Request::Reapply => rotator.reapply(),
                Request::SetPaused(paused) => rotator.set_paused(paused),
                Request::Redetect => dispatcher.set_environment(None),
                Request::Open(targets) => open_targets(runner, &targets),
            }
        }

        if app.quit {
            break;
        }
    }

    drop(guard);
    rotator.shutdown();
    Ok(())
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();

    let interactive = matches!(cli.command, None | Some(Command::Run(_)));
    let target = if interactive {
        logging::Target::File
    } else {
        logging::Target::Stderr
    };
    let log_file = logging::init(target, cli.log_level())?;

    if matches!(cli.command, Some(Command::Detect)) {
        return print_detected();
    }

    let settings = cli.cycle_args().settings()?;
    let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner);
    let dispatcher = build_dispatcher(&settings, Arc::clone(&runner))?;

    match cli.command {
        Some(Command::List) => {
            print_registries(&dispatcher);
            Ok(())
        }
        Some(Command::Once(_)) => rotate_once(&dispatcher),
        _ => {
            install_panic_hook();
            let result = run_tui(Arc::new(dispatcher), &settings, runner.as_ref(), log_file);
            if let Err(err) = &result {
                warn!("terminal front end stopped: {err:#}");
            }
            result
        }
    }
}
