mod app;
mod mpv;
mod picker;
mod ui;

use app::{App, Screen, UiMode};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use kiosk_core::{CoreSettings, Library, MediaKind};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::time::Duration;
use tracing::{info, Level};

#[tokio::main]
async fn main() -> io::Result<()> {
    // Log to a file; the terminal belongs to the UI.
    let file_appender = tracing_appender::rolling::never("/tmp", "kiosk.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(Level::DEBUG)
        .init();

    info!("Starting kiosk");

    let library = match Library::open() {
        Ok(library) => library,
        Err(e) => {
            eprintln!("Failed to open media library: {e}");
            std::process::exit(1);
        }
    };
    let settings = kiosk_core::settings::read_settings::<CoreSettings>();

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(library, settings);
    let result = run_app(&mut terminal, &mut app).await;

    // Leaving the player tears down any running mpv before the terminal is
    // restored.
    app.leave_player();

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = result {
        eprintln!("Error: {}", err);
    }

    Ok(())
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()>
where
    std::io::Error: From<<B as ratatui::backend::Backend>::Error>,
{
    let mut last_tick = std::time::Instant::now();
    // Ticks drive the image countdown and the mpv socket; 100ms keeps the
    // progress bar smooth.
    let tick_rate = Duration::from_millis(100);

    info!("Entering main loop");

    loop {
        terminal.draw(|f| ui::ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);

        if event::poll(timeout)? {
            // Drain all pending events before the next draw
            while event::poll(Duration::ZERO)? {
                let ev = event::read()?;
                handle_event(app, &ev);
                if app.should_quit {
                    return Ok(());
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            app.on_tick();
            last_tick = std::time::Instant::now();
        }
    }
}

fn handle_event(app: &mut App, event: &Event) {
    let Event::Key(key) = event else {
        return;
    };
    if key.kind != KeyEventKind::Press {
        return;
    }

    match app.screen {
        Screen::Player => handle_player_key(app, key.code),
        Screen::Manager => match app.ui_mode {
            UiMode::Normal => handle_manager_key(app, key.code),
            UiMode::KindSelect => handle_kind_select_key(app, key.code),
            UiMode::TitleInput | UiMode::LocatorInput | UiMode::ThumbnailInput => {
                handle_form_key(app, key.code)
            }
            UiMode::ConfirmDelete => handle_confirm_delete_key(app, key.code),
            UiMode::Help => app.ui_mode = UiMode::Normal,
        },
    }
}

fn handle_manager_key(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('?') => app.ui_mode = UiMode::Help,
        KeyCode::Up | KeyCode::Char('k') => app.select_up(),
        KeyCode::Down | KeyCode::Char('j') => app.select_down(),
        KeyCode::Char('a') => app.open_add_form(),
        KeyCode::Char('e') => app.open_edit_form(),
        KeyCode::Char('d') => app.request_delete(),
        KeyCode::Char('f') => app.cycle_filter(),
        KeyCode::Char('K') => app.move_selected_up(),
        KeyCode::Char('J') => app.move_selected_down(),
        KeyCode::Char('r') => app.refresh_entries(),
        KeyCode::Enter | KeyCode::Char('p') => app.enter_player(),
        KeyCode::Esc => app.status_message = None,
        _ => {}
    }
}

fn handle_player_key(app: &mut App, code: KeyCode) {
    // Any tap shows the overlay and resets its hide timer.
    app.poke_overlay();
    match code {
        KeyCode::Esc | KeyCode::Char('q') => app.leave_player(),
        KeyCode::Char(' ') => app.toggle_playback(),
        KeyCode::Char('n') | KeyCode::Right => app.skip_next(),
        KeyCode::Char('p') | KeyCode::Left => app.skip_prev(),
        _ => {}
    }
}

fn handle_kind_select_key(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Char('v') => app.form_set_kind(MediaKind::Video),
        KeyCode::Char('i') => app.form_set_kind(MediaKind::Image),
        KeyCode::Esc => app.cancel_form(),
        _ => {}
    }
}

fn handle_form_key(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Esc => app.cancel_form(),
        KeyCode::Enter => app.form_confirm(),
        KeyCode::Backspace => app.form_backspace(),
        KeyCode::Char(c) => app.form_input(c),
        _ => {}
    }
}

fn handle_confirm_delete_key(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Char('y') | KeyCode::Char('Y') => app.confirm_delete(),
        _ => app.cancel_delete(),
    }
}
