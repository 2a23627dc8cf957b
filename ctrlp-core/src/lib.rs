pub mod command;
pub mod config;
pub mod geometry;
pub mod status;
pub mod view;
pub mod viewport;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, instrument, warn};

pub use command::{interpret, CommandError};
pub use config::{ConfigError, ViewerConfig};
pub use geometry::{PageGeometry, PageSize, Paper, PaperClass};
pub use status::{format_page_status, StatusLine, FLASH_DURATION, NO_DOCUMENT};
pub use view::{DuplexMode, MarginPreset, Margins, ScaleMode, ViewSnapshot, ViewState, ViewStore};
pub use viewport::{PageLayout, PageLayoutEntry, Separator, ViewportTracker};

/// Horizontal/vertical space kept free around a page when fitting it.
pub const FIT_INSET_PX: u32 = 40;

#[derive(Debug, Clone)]
pub struct DocumentInfo {
    pub path: PathBuf,
    pub page_count: usize,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    pub page_index: usize,
    pub dpi: f64,
    pub grayscale: bool,
}

/// RGBA8 pixels, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("File does not exist: {}", .0.display())]
    Missing(PathBuf),
    #[error("Failed to load PDF {}: {message}", path.display())]
    Backend { path: PathBuf, message: String },
}

pub trait DocumentBackend: Send + Sync {
    fn info(&self) -> &DocumentInfo;
    /// Natural size in points.
    fn page_size(&self, page_index: usize) -> Option<PageSize>;
    fn render_page(&self, request: RenderRequest) -> Result<RenderImage>;

    fn title(&self) -> Option<&str> {
        self.info().title.as_deref()
    }
}

#[async_trait::async_trait]
pub trait DocumentProvider: Send + Sync {
    async fn open(&self, path: &Path) -> Result<Arc<dyn DocumentBackend>, LoadError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    ScrollBy { pixels: i64 },
    NextPage { count: usize },
    PrevPage { count: usize },
    JumpToPage { page: usize },
    JumpToLastPage,
    ZoomIn { count: usize },
    ZoomOut { count: usize },
    FitToWidth,
    FitToHeight,
    CycleMarginPreset,
    CycleDuplexMode,
    ToggleColorMode,
    CycleScaleMode,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    DocumentLoaded { path: PathBuf },
    /// Every page was rendered again.
    LayoutRebuilt { generation: u64 },
    /// Settings changed that only affect drawing on top of existing pages.
    RepaintNeeded { version: u64 },
    ViewportMoved { page: usize },
    QuitRequested,
}

/// Applies intents to the view settings and the viewport, re-rendering pages
/// when pixel data has to change.
pub struct Controller {
    config: ViewerConfig,
    document: Option<Arc<dyn DocumentBackend>>,
    view: ViewStore,
    viewport: ViewportTracker,
    status: StatusLine,
    generation: u64,
    events: Arc<Mutex<Vec<ControllerEvent>>>,
}

impl Controller {
    pub fn new(config: ViewerConfig) -> Self {
        let view = ViewStore::new(config.initial_view_state());
        Self {
            config,
            document: None,
            view,
            viewport: ViewportTracker::default(),
            status: StatusLine::new(),
            generation: 0,
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn events(&self) -> Arc<Mutex<Vec<ControllerEvent>>> {
        Arc::clone(&self.events)
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn document(&self) -> Option<&dyn DocumentBackend> {
        self.document.as_deref()
    }

    pub fn geometry(&self) -> PageGeometry<'_> {
        PageGeometry::new(self.document())
    }

    pub fn page_count(&self) -> usize {
        self.geometry().page_count()
    }

    pub fn current_page(&self) -> usize {
        self.viewport.current_page()
    }

    pub fn view(&self) -> ViewSnapshot {
        self.view.snapshot()
    }

    pub fn viewport(&self) -> &ViewportTracker {
        &self.viewport
    }

    pub fn status(&self) -> &StatusLine {
        &self.status
    }

    pub fn status_mut(&mut self) -> &mut StatusLine {
        &mut self.status
    }

    #[instrument(skip(self, provider))]
    pub async fn open_with<P: DocumentProvider + ?Sized>(
        &mut self,
        provider: &P,
        path: PathBuf,
    ) -> Result<(), LoadError> {
        match provider.open(&path).await {
            Ok(backend) => {
                self.attach(backend);
                Ok(())
            }
            Err(err) => {
                warn!(%err, "document failed to load");
                self.status.set_message(format!("Error: {err}"));
                Err(err)
            }
        }
    }

    pub fn attach(&mut self, backend: Arc<dyn DocumentBackend>) {
        let path = backend.info().path.clone();
        debug!(path = %path.display(), pages = backend.info().page_count, "document attached");
        self.document = Some(backend);
        self.viewport.reset();
        self.relayout();
        self.push_event(ControllerEvent::DocumentLoaded { path });
    }

    pub fn resize_viewport(&mut self, width: u32, height: u32) {
        if self.viewport.viewport_size() == (width, height) {
            return;
        }
        self.viewport.resize(width, height);
        if self.document.is_some() {
            self.refresh_status();
        }
    }

    pub fn apply(&mut self, intent: Intent) {
        debug!(?intent, "applying intent");
        match intent {
            Intent::ScrollBy { pixels } => self.scroll_by(pixels),
            Intent::NextPage { count } => {
                if let Some(page) = self.current_page().checked_add(count) {
                    self.jump_to_page(page);
                }
            }
            Intent::PrevPage { count } => {
                if let Some(page) = self.current_page().checked_sub(count) {
                    self.jump_to_page(page);
                }
            }
            Intent::JumpToPage { page } => self.jump_to_page(page),
            Intent::JumpToLastPage => {
                if let Some(page) = self.page_count().checked_sub(1) {
                    self.jump_to_page(page);
                }
            }
            Intent::ZoomIn { count } => {
                let count = count.max(1);
                self.change_dpi(|state| state.zoom_in(count));
            }
            Intent::ZoomOut { count } => {
                let count = count.max(1);
                self.change_dpi(|state| state.zoom_out(count));
            }
            Intent::FitToWidth => self.fit(|size| size.width, |(width, _)| width),
            Intent::FitToHeight => self.fit(|size| size.height, |(_, height)| height),
            Intent::CycleMarginPreset => {
                let preset = self.view.publish(ViewState::cycle_margins);
                self.request_repaint();
                self.status
                    .flash(format!("Margins: {preset}"), FLASH_DURATION);
            }
            Intent::CycleDuplexMode => {
                let duplex = self.view.publish(|state| {
                    state.duplex = state.duplex.next();
                    state.duplex
                });
                self.request_repaint();
                self.refresh_status();
                self.status
                    .flash(format!("Duplex: {}", duplex.label()), FLASH_DURATION);
            }
            Intent::ToggleColorMode => {
                let color = self.view.state().color;
                self.view.publish(|state| {
                    state.color = !color;
                    true
                });
                self.relayout();
                let message = if color {
                    "Color: Off (Grayscale)"
                } else {
                    "Color: On"
                };
                self.status.flash(message, FLASH_DURATION);
            }
            Intent::CycleScaleMode => {
                let scale = self.view.publish(|state| {
                    state.scale = state.scale.next();
                    state.scale
                });
                self.request_repaint();
                self.status.flash(format!("Scale: {scale}"), FLASH_DURATION);
            }
            Intent::Quit => self.push_event(ControllerEvent::QuitRequested),
        }
    }

    /// Runs a line typed in command mode. Malformed lines are reported on the
    /// status line and change nothing else.
    pub fn execute_command_line(&mut self, line: &str) {
        match command::interpret(line) {
            Ok(Some(intent)) => self.apply(intent),
            Ok(None) => {}
            Err(err) => {
                debug!(%err, "rejected command line");
                self.status.flash(err.to_string(), FLASH_DURATION);
            }
        }
    }

    pub fn refresh_status(&mut self) {
        let message = match self.document() {
            None => NO_DOCUMENT.to_string(),
            Some(_) => {
                let geometry = self.geometry();
                let page = self.current_page();
                format_page_status(
                    page,
                    geometry.page_count(),
                    geometry.page_size_mm(page),
                    self.view.state().duplex,
                )
            }
        };
        self.status.set_message(message);
    }

    fn scroll_by(&mut self, pixels: i64) {
        if self.document.is_none() {
            return;
        }
        let page = self.viewport.scroll_by(pixels);
        self.refresh_status();
        self.push_event(ControllerEvent::ViewportMoved { page });
    }

    fn jump_to_page(&mut self, page: usize) {
        let page_count = self.page_count();
        if !self.viewport.jump_to(page, page_count) {
            debug!(page, page_count, "ignoring jump outside the laid out pages");
            return;
        }
        self.refresh_status();
        self.push_event(ControllerEvent::ViewportMoved { page });
    }

    fn fit(&mut self, extent: impl Fn(PageSize) -> f64, available: impl Fn((u32, u32)) -> u32) {
        if self.document.is_none() {
            return;
        }
        let size = self.geometry().page_size(self.current_page());
        let room = available(self.viewport.viewport_size()).saturating_sub(FIT_INSET_PX);
        match geometry::dpi_for_extent(f64::from(room), extent(size)) {
            Some(dpi) => self.change_dpi(|state| state.set_dpi(dpi)),
            None => debug!(?size, room, "nothing to fit"),
        }
    }

    fn change_dpi(&mut self, mutate: impl FnOnce(&mut ViewState) -> bool) {
        if self.view.publish(mutate) {
            self.relayout();
        }
    }

    fn request_repaint(&mut self) {
        let version = self.view.snapshot().version();
        self.push_event(ControllerEvent::RepaintNeeded { version });
    }

    /// Renders every page at the current settings and swaps the layout in as
    /// one step.
    #[instrument(skip(self))]
    fn relayout(&mut self) {
        let Some(document) = self.document.clone() else {
            return;
        };
        let view = self.view.snapshot();
        self.generation += 1;

        let mut builder = PageLayout::builder(self.generation, view.page_gap_px, view.show_boundaries);
        for page_index in 0..document.info().page_count {
            let request = RenderRequest {
                page_index,
                dpi: view.dpi,
                grayscale: !view.color,
            };
            match document.render_page(request) {
                Ok(image) => builder.push(page_index, image),
                Err(err) => warn!(?err, page_index, "failed to render page, leaving it out"),
            }
        }

        self.viewport.set_layout(builder.finish());
        debug!(
            generation = self.generation,
            dpi = view.dpi,
            pages = self.viewport.layout().entries().len(),
            "layout rebuilt"
        );
        self.refresh_status();
        self.push_event(ControllerEvent::LayoutRebuilt {
            generation: self.generation,
        });
    }

    fn push_event(&self, event: ControllerEvent) {
        self.events.lock().push(event);
    }
}
