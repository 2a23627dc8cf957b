use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use crossterm::cursor;
use crossterm::event::{self, Event};
use crossterm::terminal::{self, Clear, ClearType, SetTitle};
use ctrlp_core::config::{DEFAULT_SCROLL_STEP_PX, DEFAULT_SEQUENCE_TIMEOUT};
use ctrlp_core::view::{DEFAULT_DPI, DEFAULT_PAGE_GAP_PX};
use ctrlp_core::{ConfigError, Controller, ControllerEvent, ViewerConfig};
use ctrlp_render::{ensure_pdf_path, PdfRenderFactory};
use ctrlp_tty::{
    write_status_line, DrawParams, EventMapper, FrameComposer, InputMode, KittyRenderer, UiEvent,
};
use directories::ProjectDirs;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{prelude::*, EnvFilter};

const IDLE_POLL: Duration = Duration::from_millis(100);
/// Cell size assumed when the terminal does not report pixel dimensions.
const FALLBACK_CELL: (u32, u32) = (8, 16);

#[derive(Debug, Parser)]
#[command(
    name = "ctrlp",
    version,
    about = "Keyboard-driven PDF viewer for kitty-compatible terminals"
)]
struct Args {
    /// Starting render resolution in dots per inch
    #[arg(long, default_value_t = DEFAULT_DPI)]
    dpi: f64,

    /// Vertical gap between pages in pixels
    #[arg(long = "page-gap", default_value_t = DEFAULT_PAGE_GAP_PX)]
    page_gap: u32,

    /// Hide the separator lines drawn between pages
    #[arg(long = "no-boundaries")]
    no_boundaries: bool,

    /// Pixels moved by one j/k press
    #[arg(long = "scroll-step", default_value_t = DEFAULT_SCROLL_STEP_PX)]
    scroll_step: u32,

    /// Milliseconds before a pending count or `g` is dropped
    #[arg(long = "sequence-timeout-ms", default_value_t = DEFAULT_SEQUENCE_TIMEOUT.as_millis() as u64)]
    sequence_timeout_ms: u64,

    /// PDF file to open
    file: Option<PathBuf>,
}

impl Args {
    fn config(&self) -> Result<ViewerConfig, ConfigError> {
        ViewerConfig {
            dpi: self.dpi,
            page_gap_px: self.page_gap,
            show_boundaries: !self.no_boundaries,
            scroll_step_px: self.scroll_step,
            sequence_timeout: Duration::from_millis(self.sequence_timeout_ms),
        }
        .validate()
    }
}

struct RawModeGuard;

impl RawModeGuard {
    fn new() -> anyhow::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        let mut stdout = io::stdout();
        let _ = crossterm::execute!(stdout, cursor::Show);
    }
}

/// Terminal split into the page area and the status row beneath it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScreenLayout {
    columns: u32,
    rows: u32,
    cell_width: u32,
    cell_height: u32,
}

impl ScreenLayout {
    fn new(columns: u32, rows: u32, pixel_width: u32, pixel_height: u32) -> Self {
        let columns = columns.max(1);
        let rows = rows.max(1);
        let (cell_width, cell_height) = if pixel_width == 0 || pixel_height == 0 {
            FALLBACK_CELL
        } else {
            ((pixel_width / columns).max(1), (pixel_height / rows).max(1))
        };
        Self {
            columns,
            rows,
            cell_width,
            cell_height,
        }
    }

    fn measure() -> Result<Self> {
        match terminal::window_size() {
            Ok(size) => Ok(Self::new(
                u32::from(size.columns),
                u32::from(size.rows),
                u32::from(size.width),
                u32::from(size.height),
            )),
            Err(err) => {
                debug!(%err, "terminal did not report pixel size");
                let (columns, rows) = terminal::size()?;
                Ok(Self::new(u32::from(columns), u32::from(rows), 0, 0))
            }
        }
    }

    fn page_rows(&self) -> u32 {
        self.rows.saturating_sub(1)
    }

    fn status_row(&self) -> u16 {
        u16::try_from(self.rows - 1).unwrap_or(u16::MAX)
    }

    /// Pixel size of the page area.
    fn viewport(&self) -> (u32, u32) {
        (
            self.columns * self.cell_width,
            self.page_rows() * self.cell_height,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopAction {
    Continue,
    ContinueRedraw,
    Quit,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.config().context("invalid options")?;
    let file = args
        .file
        .as_deref()
        .map(ensure_pdf_path)
        .transpose()
        .context("cannot open document")?;

    let project_dirs = ProjectDirs::from("net", "ctrlp", "ctrlp")
        .ok_or_else(|| anyhow!("unable to resolve platform data directories"))?;
    let _log_guard = init_logging(&project_dirs)?;

    let mut controller = Controller::new(config);
    if let Some(path) = file.clone() {
        let provider = PdfRenderFactory::new()?;
        controller
            .open_with(&provider, path.clone())
            .await
            .with_context(|| format!("failed to open {}", path.display()))?;
    }
    info!(document = ?file, "viewer starting");

    let _raw = RawModeGuard::new()?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, cursor::Hide)?;
    if let Some(name) = file.as_ref().and_then(|path| path.file_name()) {
        crossterm::execute!(
            stdout,
            SetTitle(format!("CtrlP - {}", name.to_string_lossy()))
        )?;
    }
    let mut renderer = KittyRenderer::new(stdout);
    renderer.clear_all()?;

    let mut screen = ScreenLayout::measure()?;
    let (width, height) = screen.viewport();
    controller.resize_viewport(width, height);

    let mut mapper = EventMapper::from_config(controller.config());
    let mut composer = FrameComposer::new();
    let events = controller.events();
    let mut pages_dirty = true;
    let mut status_dirty = true;

    loop {
        let now = Instant::now();
        if mapper.poll_timeout(now) {
            status_dirty = true;
        }
        if controller.status_mut().expire(now) {
            status_dirty = true;
        }

        if pages_dirty {
            draw_pages(&mut renderer, &mut composer, &controller, screen)?;
            pages_dirty = false;
            status_dirty = true;
        }
        if status_dirty {
            let text = status_text(&controller, &mapper, now);
            draw_status(&mut renderer, &text, screen)?;
            status_dirty = false;
        }

        if !event::poll(poll_timeout(&controller, &mapper, now))? {
            continue;
        }
        match event::read()? {
            Event::Resize(columns, rows) => {
                debug!(columns, rows, "terminal resized");
                screen = ScreenLayout::measure()?;
                let (width, height) = screen.viewport();
                controller.resize_viewport(width, height);
                composer.invalidate();
                renderer.clear_all()?;
                pages_dirty = true;
            }
            ev => {
                let ui_event = mapper.map_event(ev);
                handle_event(ui_event, &mut controller);
                status_dirty = true;
            }
        }

        let drained: Vec<_> = events.lock().drain(..).collect();
        match drain_events(drained) {
            LoopAction::Quit => break,
            LoopAction::ContinueRedraw => pages_dirty = true,
            LoopAction::Continue => {}
        }
    }

    renderer.delete_images()?;
    renderer.clear_all()?;
    info!("viewer closed");
    Ok(())
}

fn handle_event(ui_event: UiEvent, controller: &mut Controller) {
    match ui_event {
        UiEvent::Intent(intent) => controller.apply(intent),
        UiEvent::CommandSubmit { line } => controller.execute_command_line(&line),
        UiEvent::BeginCommand
        | UiEvent::CommandCancel
        | UiEvent::Reset
        | UiEvent::PassThrough
        | UiEvent::None => {}
    }
}

fn drain_events(events: Vec<ControllerEvent>) -> LoopAction {
    let mut action = LoopAction::Continue;
    for event in events {
        match event {
            ControllerEvent::QuitRequested => return LoopAction::Quit,
            ControllerEvent::DocumentLoaded { .. }
            | ControllerEvent::LayoutRebuilt { .. }
            | ControllerEvent::RepaintNeeded { .. }
            | ControllerEvent::ViewportMoved { .. } => action = LoopAction::ContinueRedraw,
        }
    }
    action
}

fn poll_timeout(controller: &Controller, mapper: &EventMapper, now: Instant) -> Duration {
    let flash = controller
        .status()
        .flash_deadline()
        .map(|deadline| deadline.saturating_duration_since(now));
    [mapper.time_until_timeout(now), flash]
        .into_iter()
        .flatten()
        .fold(IDLE_POLL, Duration::min)
}

fn status_text(controller: &Controller, mapper: &EventMapper, now: Instant) -> String {
    let pending = mapper.pending_input();
    if mapper.mode() == InputMode::Command {
        return pending.unwrap_or_default();
    }
    let base = controller.status().text_at(now).to_string();
    combine_status(Some(base), pending.as_deref()).unwrap_or_default()
}

fn combine_status(base: Option<String>, pending_input: Option<&str>) -> Option<String> {
    match (base, pending_input.filter(|s| !s.is_empty())) {
        (Some(mut base), Some(pending)) => {
            base.push_str(" | ");
            base.push_str(pending);
            Some(base)
        }
        (Some(base), None) => Some(base),
        (None, Some(pending)) => Some(pending.to_string()),
        (None, None) => None,
    }
}

fn draw_pages(
    renderer: &mut KittyRenderer<io::Stdout>,
    composer: &mut FrameComposer,
    controller: &Controller,
    screen: ScreenLayout,
) -> Result<()> {
    if controller.document().is_none() {
        return Ok(());
    }
    let frame = composer.compose(controller.viewport(), &controller.view());
    if !frame.changed || frame.image.width == 0 || frame.image.height == 0 {
        return Ok(());
    }
    renderer.begin_sync_update()?;
    crossterm::queue!(renderer.writer(), cursor::MoveTo(0, 0))?;
    let drawn = renderer.draw(
        frame.image,
        DrawParams::clamped(screen.columns, screen.page_rows()),
    );
    renderer.end_sync_update()?;
    if let Err(err) = drawn {
        warn!(%err, "failed to draw frame");
    }
    Ok(())
}

fn draw_status(
    renderer: &mut KittyRenderer<io::Stdout>,
    text: &str,
    screen: ScreenLayout,
) -> Result<()> {
    let writer = renderer.writer();
    crossterm::queue!(
        writer,
        cursor::MoveTo(0, screen.status_row()),
        Clear(ClearType::CurrentLine)
    )?;
    write_status_line(writer, text, screen.columns as usize)?;
    Ok(())
}

fn init_logging(project_dirs: &ProjectDirs) -> Result<WorkerGuard> {
    let log_dir = project_dirs.data_local_dir().join("logs");
    fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::never(log_dir, "ctrlp.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Stdout belongs to the page images, so logs only go to the file.
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .try_init()
        .map_err(|err| anyhow!(err))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctrlp_core::Intent;

    #[test]
    fn pending_input_is_appended_to_status() {
        assert_eq!(
            combine_status(Some(" [1/3]".into()), Some(":12")),
            Some(" [1/3] | :12".to_string())
        );
        assert_eq!(
            combine_status(Some(" [1/3]".into()), Some("")),
            Some(" [1/3]".to_string())
        );
        assert_eq!(combine_status(None, Some("g")), Some("g".to_string()));
        assert_eq!(combine_status(None, None), None);
    }

    #[test]
    fn screen_reserves_last_row_for_status() {
        let screen = ScreenLayout::new(100, 40, 1000, 800);
        assert_eq!(screen.page_rows(), 39);
        assert_eq!(screen.status_row(), 39);
        assert_eq!(screen.viewport(), (1000, 780));
    }

    #[test]
    fn screen_without_pixel_size_uses_fallback_cells() {
        let screen = ScreenLayout::new(80, 25, 0, 0);
        assert_eq!(screen.viewport(), (80 * 8, 24 * 16));

        let tiny = ScreenLayout::new(0, 0, 0, 0);
        assert_eq!(tiny.page_rows(), 0);
        assert_eq!(tiny.viewport(), (8, 0));
    }

    #[test]
    fn quit_wins_over_redraw() {
        let events = vec![
            ControllerEvent::ViewportMoved { page: 2 },
            ControllerEvent::QuitRequested,
        ];
        assert_eq!(drain_events(events), LoopAction::Quit);
        assert_eq!(
            drain_events(vec![ControllerEvent::RepaintNeeded { version: 3 }]),
            LoopAction::ContinueRedraw
        );
        assert_eq!(drain_events(Vec::new()), LoopAction::Continue);
    }

    #[test]
    fn options_build_validated_config() {
        let args = Args::parse_from(["ctrlp", "--dpi", "96", "--no-boundaries"]);
        let config = args.config().unwrap();
        assert_eq!(config.dpi, 96.0);
        assert!(!config.show_boundaries);
        assert_eq!(config.sequence_timeout, DEFAULT_SEQUENCE_TIMEOUT);

        let args = Args::parse_from(["ctrlp", "--scroll-step", "0"]);
        assert_eq!(args.config(), Err(ConfigError::ZeroScrollStep));
    }

    #[test]
    fn commands_reach_the_controller() {
        let mut controller = Controller::new(ViewerConfig::default());
        handle_event(
            UiEvent::CommandSubmit {
                line: ":bogus".into(),
            },
            &mut controller,
        );
        assert_eq!(controller.status().flashed(), Some("Unknown command: bogus"));

        handle_event(UiEvent::Intent(Intent::Quit), &mut controller);
        let events: Vec<_> = controller.events().lock().drain(..).collect();
        assert_eq!(drain_events(events), LoopAction::Quit);
    }

    #[test]
    fn idle_poll_shrinks_to_pending_deadlines() {
        let mut controller = Controller::new(ViewerConfig::default());
        let mapper = EventMapper::new();
        let now = Instant::now();
        assert_eq!(poll_timeout(&controller, &mapper, now), IDLE_POLL);

        controller
            .status_mut()
            .flash_at("Margins: Narrow", Duration::from_millis(30), now);
        assert_eq!(
            poll_timeout(&controller, &mapper, now),
            Duration::from_millis(30)
        );
    }
}
