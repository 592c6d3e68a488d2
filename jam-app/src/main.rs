//! jam - terminal multi-track loop player
//!
//! Opens a jam manifest, mounts one player per loop and plays loops one at
//! a time on the default output device.

mod jam;

use std::fs::OpenOptions;
use std::io::{self, stdout};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Clear, Paragraph},
    Terminal,
};
use tracing_subscriber::EnvFilter;

use jam_audio::{
    open_default_device, AudioDeviceSession, FrameScheduler, LoopPlayer, OutputConfig,
    PlaybackCoordinator, PlayerContext, PlayerError, PlayerState,
};
use jam_input::{Command, InputHandler, Mode};
use jam_library::{Config, SourceFetcher, TrackId};
use jam_tui::{App, HelpWidget, LoopListWidget, LoopPanelWidget, StatusBarWidget, Theme};

use crate::jam::Jam;

/// Frame rate for UI updates and cursor animation
const FPS: u64 = 30;

/// Width of the loop list column
const LOOP_LIST_WIDTH: u16 = 28;

fn main() -> anyhow::Result<()> {
    let log_path = init_logging()?;
    tracing::info!(log = %log_path.display(), "Starting jam");

    let mut config = Config::load();
    let manifest_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| config.last_manifest.clone());

    let ctx = build_context(&config);
    let scheduler = Arc::clone(&ctx.scheduler);
    let mut jam = Jam::empty(ctx);

    let mut app = App::new();
    if let Some(path) = manifest_path {
        open_manifest(&mut app, &mut jam, &mut config, &path);
    } else {
        app.state
            .set_message("No jam loaded. Use :open <manifest.json>, ? for help");
    }

    // Initialize terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let result = run_app(&mut terminal, &mut app, &mut jam, &mut config, &scheduler);

    // Cleanup
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    let ctx = jam.context().clone();
    ctx.coordinator.stop_all();
    jam.unmount_all();
    if let Some(device) = ctx.session.current() {
        device.close();
    }
    tracing::info!("Exiting jam");

    result
}

/// Route `tracing` output to a log file; the terminal belongs to the UI
fn init_logging() -> anyhow::Result<PathBuf> {
    let dir = dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("jam");
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("jam.log");
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();

    Ok(path)
}

fn build_context(config: &Config) -> PlayerContext {
    let output = OutputConfig {
        device_name: config.output_device.clone(),
        buffer_size: config.buffer_size,
    };

    PlayerContext {
        session: Arc::new(AudioDeviceSession::new(move || open_default_device(&output))),
        coordinator: Arc::new(PlaybackCoordinator::new()),
        scheduler: Arc::new(FrameScheduler::new()),
        fetcher: Arc::new(SourceFetcher::new(Duration::from_secs(
            config.fetch_timeout_secs,
        ))),
        peak_points: config.peak_points,
    }
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    jam: &mut Jam,
    config: &mut Config,
    scheduler: &FrameScheduler,
) -> anyhow::Result<()> {
    let mut input_handler = InputHandler::new();
    let frame_duration = Duration::from_millis(1000 / FPS);
    let mut last_frame = Instant::now();

    loop {
        if app.should_quit {
            break;
        }

        // Cursor animation and load completion run as frame callbacks
        scheduler.run_frame();

        app.state.title = jam.title().map(str::to_string);
        app.state.set_loops(jam.snapshots());
        app.state.frame_count = app.state.frame_count.wrapping_add(1);

        terminal.draw(|frame| render_ui(frame, app))?;

        let timeout = frame_duration.saturating_sub(last_frame.elapsed());
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }

                if input_handler.mode() == Mode::Help {
                    match key.code {
                        KeyCode::Up | KeyCode::Char('k') => app.state.help_scroll_up(),
                        KeyCode::Down | KeyCode::Char('j') => app.state.help_scroll_down(),
                        _ => {}
                    }
                }

                if let Some(cmd) = input_handler.handle_key(key) {
                    handle_command(app, jam, config, cmd);
                }

                app.state.set_mode(input_handler.mode());
                app.state.command_buffer = input_handler.command_buffer().to_string();
            }
        }

        // Maintain frame rate
        let elapsed = last_frame.elapsed();
        if elapsed < frame_duration {
            thread::sleep(frame_duration - elapsed);
        }
        last_frame = Instant::now();
    }

    Ok(())
}

fn loop_name(player: &LoopPlayer) -> String {
    player
        .snapshot()
        .name
        .unwrap_or_else(|| player.loop_id().to_string())
}

fn open_manifest(app: &mut App, jam: &mut Jam, config: &mut Config, path: &Path) {
    match jam.open(path) {
        Ok(()) => {
            app.state.selected_loop = 0;
            app.state.selected_track = 0;
            app.state.set_success(format!(
                "Opened {} ({} loops)",
                path.display(),
                jam.len()
            ));
            config.last_manifest = Some(path.to_path_buf());
            if let Err(e) = config.save() {
                tracing::warn!(error = %e, "Failed to save config");
            }
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to open manifest");
            app.state
                .set_error(format!("Cannot open {}: {}", path.display(), e));
        }
    }
}

fn handle_command(app: &mut App, jam: &mut Jam, config: &mut Config, cmd: Command) {
    let selected = app.state.selected_loop;

    match cmd {
        Command::SelectNextLoop => app.state.select_next_loop(),
        Command::SelectPrevLoop => app.state.select_prev_loop(),
        Command::SelectNextTrack => app.state.select_next_track(),
        Command::SelectPrevTrack => app.state.select_prev_track(),

        Command::TogglePlay => {
            let Some(player) = jam.player(selected) else {
                return;
            };
            let name = loop_name(player);
            match player.toggle_play() {
                Ok(()) => match player.state() {
                    PlayerState::Idle => app.state.set_message(format!("Stopped {}", name)),
                    PlayerState::Loading => app.state.set_message(format!("Loading {}…", name)),
                    PlayerState::Playing => app.state.set_success(format!("Playing {}", name)),
                },
                Err(e) => {
                    tracing::warn!(loop_id = %player.loop_id(), error = %e, "Play failed");
                    app.state.set_error(format!("{}: {}", name, e));
                }
            }
        }
        Command::StopAll => {
            jam.context().coordinator.stop_all();
            app.state.set_message("Stopped");
        }

        Command::ToggleTrackMute => {
            with_selected_track(app, jam, |player, track| player.toggle_track_mute(track))
        }
        Command::ToggleTrackSolo => {
            with_selected_track(app, jam, |player, track| player.toggle_track_solo(track))
        }
        Command::AdjustVolume(delta) => with_selected_track(app, jam, |player, track| {
            player.adjust_track_volume(track, delta)
        }),
        Command::ToggleMasterMute => {
            if let Some(player) = jam.player(selected) {
                if let Err(e) = player.toggle_master_mute() {
                    app.state.set_warning(e.to_string());
                }
            }
        }

        Command::Reload => reload(app, jam),
        Command::OpenManifest(path) => open_manifest(app, jam, config, &path),

        Command::SetTheme(name) => app.state.set_theme(&name),
        Command::ToggleHelp => app.state.toggle_help(),
        Command::ExecuteCommand(input) => {
            if !input.trim().is_empty() {
                app.state.set_error(format!("Unknown command: {}", input.trim()));
            }
        }
        Command::EnterCommandMode | Command::EnterNormalMode => {}

        Command::Quit => app.quit(),
    }
}

/// Apply a mix change to the selected track of the selected loop
fn with_selected_track<F>(app: &mut App, jam: &Jam, change: F)
where
    F: FnOnce(&LoopPlayer, &TrackId) -> Result<(), PlayerError>,
{
    let Some(track) = app.state.selected_track_id().cloned() else {
        return;
    };
    let Some(player) = jam.player(app.state.selected_loop) else {
        return;
    };
    if let Err(e) = change(player, &track) {
        app.state.set_warning(e.to_string());
    }
}

/// Re-read the manifest, then refetch the selected loop's audio
fn reload(app: &mut App, jam: &mut Jam) {
    match jam.refresh() {
        Ok(true) => {
            app.state.set_success("Jam changed, loops remounted");
            return;
        }
        Ok(false) => {}
        Err(e) => {
            tracing::warn!(error = %e, "Failed to re-read manifest");
            app.state.set_error(format!("Cannot reload manifest: {}", e));
            return;
        }
    }

    let Some(player) = jam.player(app.state.selected_loop) else {
        return;
    };
    let was_active = player.state() != PlayerState::Idle;
    player.stop();
    player.reload();

    let name = loop_name(player);
    if was_active {
        if let Err(e) = player.play() {
            app.state.set_error(format!("{}: {}", name, e));
            return;
        }
    }
    app.state.set_success(format!("Reloaded {}", name));
}

fn render_ui(frame: &mut ratatui::Frame, app: &App) {
    let area = frame.area();
    let state = &app.state;
    let theme = &state.theme;

    frame.render_widget(Block::default().style(theme.normal()), area);

    let [title_area, main_area, status_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(4),
        Constraint::Length(1),
    ])
    .areas(area);

    render_title(frame, title_area, theme, state.title.as_deref());

    let [list_area, panel_area] =
        Layout::horizontal([Constraint::Length(LOOP_LIST_WIDTH), Constraint::Min(20)])
            .areas(main_area);

    let list = LoopListWidget::new(&state.loops, state.selected_loop, theme)
        .title(state.title.as_deref());
    frame.render_widget(list, list_area);

    if let Some(snapshot) = state.selected() {
        let panel = LoopPanelWidget::new(snapshot, theme)
            .selected_track(Some(state.selected_track))
            .focused(true);
        frame.render_widget(panel, panel_area);
    } else {
        let hint = Paragraph::new(Line::from(Span::styled(
            "Open a jam with :open <manifest.json>",
            theme.dim(),
        )))
        .block(Block::bordered().border_style(theme.border()));
        frame.render_widget(hint, panel_area);
    }

    let status = StatusBarWidget::new(state.mode, &state.command_buffer, theme)
        .message(state.message.as_deref(), state.message_type);
    frame.render_widget(status, status_area);

    if state.show_help {
        let help_area = centered_rect(56, 22, area);
        frame.render_widget(Clear, help_area);
        frame.render_widget(HelpWidget::new(theme).scroll(state.help_scroll), help_area);
    }
}

fn render_title(frame: &mut ratatui::Frame, area: Rect, theme: &Theme, title: Option<&str>) {
    let title_text = match title {
        Some(title) => format!(" jam - {} ", title),
        None => " jam ".to_string(),
    };
    let text_width = title_text.chars().count();
    let padding = (area.width as usize).saturating_sub(text_width) / 2;
    let rest = (area.width as usize).saturating_sub(padding + text_width);
    let padded = format!(
        "{:═<pad$}{}{:═<rest$}",
        "",
        title_text,
        "",
        pad = padding,
        rest = rest
    );

    frame.render_widget(Paragraph::new(Line::from(Span::styled(padded, theme.title()))), area);
}

/// Create a centered rectangle
fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(area.width), height.min(area.height))
}
