//! tflow - Terminal Yoga Flow Builder
//!
//! Build yoga flows from a pose catalog, organize them into sections and
//! practice them with a timer, all from the terminal.

use std::io;
use std::time::{Duration, Instant};

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use tracing::{error, info, warn};

use tflow::application::{App, AppMode};
use tflow::infrastructure::{init_logging, load_catalog, Config, FlowRepository};
use tflow::presentation::{render_ui, InputHandler};

/// Entry point for the tflow terminal application.
///
/// Loads configuration, installs file logging, opens the flow store and
/// runs the event loop until the user quits.
///
/// # Errors
///
/// Returns an error if terminal setup fails or if there are issues
/// with the terminal interface during runtime.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (config, config_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };
    if let Err(e) = init_logging(&config) {
        eprintln!("tflow: logging disabled: {}", e);
    }
    if let Some(e) = config_error {
        warn!(error = %e, "config unreadable, using defaults");
    }
    info!(data_dir = %config.data_dir.display(), "starting tflow");

    let catalog = load_catalog(&config.catalog);
    let repository = FlowRepository::open(config.storage_dir());
    let tick_rate = Duration::from_millis(config.tick_rate_ms);
    let mut app = App::new(config, catalog, repository);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app, tick_rate);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        error!(error = %err, "terminal failure");
        println!("{err:?}");
    }
    info!("tflow stopped");

    Ok(())
}

/// Main application event loop.
///
/// Redraws after every key press and every tick. Ticks drive the practice
/// timer and the debounced auto-save. 'q' quits from the library and the
/// builder, saving unsaved edits first.
fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    tick_rate: Duration,
) -> io::Result<()> {
    let mut last_tick = Instant::now();
    loop {
        terminal.draw(|f| render_ui(f, app))?;

        let timeout = tick_rate.saturating_sub(last_tick.elapsed());
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q')
                            if matches!(app.mode, AppMode::Library | AppMode::Builder)
                                && !app.is_grabbing() =>
                        {
                            if app.session.is_some() {
                                app.close_session();
                            }
                            return Ok(());
                        }
                        _ => InputHandler::handle_key_event(app, key.code, key.modifiers),
                    }
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            app.on_tick(Instant::now());
            last_tick = Instant::now();
        }
    }
}
