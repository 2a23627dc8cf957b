use crate::RenderImage;

/// Space above the first page and below the last one.
pub const CONTENT_PADDING_PX: u32 = 20;
pub const SEPARATOR_PX: u32 = 1;

#[derive(Debug, Clone)]
pub struct PageLayoutEntry {
    pub page_index: usize,
    pub image: RenderImage,
    pub top: u32,
}

impl PageLayoutEntry {
    pub fn width(&self) -> u32 {
        self.image.width
    }

    pub fn height(&self) -> u32 {
        self.image.height
    }

    pub fn bottom(&self) -> u32 {
        self.top + self.image.height
    }

    pub fn center(&self) -> u32 {
        self.top + self.image.height / 2
    }
}

/// A boundary line drawn between two pages, as wide as the page above it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Separator {
    pub y: u32,
    pub width: u32,
}

/// Vertical strip of rendered pages. Rebuilt from scratch on every re-layout;
/// `generation` tells consumers which build they are looking at.
#[derive(Debug, Clone, Default)]
pub struct PageLayout {
    generation: u64,
    entries: Vec<PageLayoutEntry>,
    separators: Vec<Separator>,
    content_width: u32,
    content_height: u32,
}

impl PageLayout {
    pub fn builder(generation: u64, gap_px: u32, show_boundaries: bool) -> LayoutBuilder {
        LayoutBuilder {
            layout: PageLayout {
                generation,
                ..PageLayout::default()
            },
            gap_px,
            show_boundaries,
            cursor: CONTENT_PADDING_PX,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn entries(&self) -> &[PageLayoutEntry] {
        &self.entries
    }

    pub fn separators(&self) -> &[Separator] {
        &self.separators
    }

    pub fn content_width(&self) -> u32 {
        self.content_width
    }

    pub fn content_height(&self) -> u32 {
        self.content_height
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry_for_page(&self, page_index: usize) -> Option<&PageLayoutEntry> {
        self.entries
            .iter()
            .find(|entry| entry.page_index == page_index)
    }
}

pub struct LayoutBuilder {
    layout: PageLayout,
    gap_px: u32,
    show_boundaries: bool,
    cursor: u32,
}

impl LayoutBuilder {
    pub fn push(&mut self, page_index: usize, image: RenderImage) {
        if let Some(previous) = self.layout.entries.last() {
            let width = previous.width();
            self.cursor += self.gap_px;
            if self.show_boundaries {
                self.layout.separators.push(Separator {
                    y: self.cursor,
                    width,
                });
                self.cursor += SEPARATOR_PX;
            }
            self.cursor += self.gap_px;
        }

        let entry = PageLayoutEntry {
            page_index,
            top: self.cursor,
            image,
        };
        self.cursor = entry.bottom();
        self.layout.content_width = self.layout.content_width.max(entry.width());
        self.layout.entries.push(entry);
    }

    pub fn finish(mut self) -> PageLayout {
        if !self.layout.entries.is_empty() {
            self.layout.content_height = self.cursor + CONTENT_PADDING_PX;
        }
        self.layout
    }
}

/// Index into `entries` of the page whose vertical center lies closest to
/// `viewport_center`. The first entry wins a tie.
pub fn closest_entry(entries: &[PageLayoutEntry], viewport_center: u32) -> Option<usize> {
    let mut best: Option<(usize, u32)> = None;
    for (idx, entry) in entries.iter().enumerate() {
        let distance = entry.center().abs_diff(viewport_center);
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((idx, distance)),
        }
    }
    best.map(|(idx, _)| idx)
}

/// Scroll model of the content strip plus the "current page" derived from it.
#[derive(Debug, Clone, Default)]
pub struct ViewportTracker {
    layout: PageLayout,
    scroll_y: u32,
    viewport_width: u32,
    viewport_height: u32,
    current_page: usize,
}

impl ViewportTracker {
    pub fn new(viewport_width: u32, viewport_height: u32) -> Self {
        Self {
            viewport_width,
            viewport_height,
            ..Self::default()
        }
    }

    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    pub fn scroll_offset(&self) -> u32 {
        self.scroll_y
    }

    pub fn viewport_size(&self) -> (u32, u32) {
        (self.viewport_width, self.viewport_height)
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn max_scroll(&self) -> u32 {
        self.layout
            .content_height()
            .saturating_sub(self.viewport_height)
    }

    pub fn viewport_center(&self) -> u32 {
        self.scroll_y + self.viewport_height / 2
    }

    /// Page currently nearest the middle of the viewport; page 0 when nothing is laid out.
    pub fn visible_page(&self) -> usize {
        closest_entry(self.layout.entries(), self.viewport_center())
            .map(|idx| self.layout.entries()[idx].page_index)
            .unwrap_or(0)
    }

    /// Forgets the previous document: empty layout, top of the strip, page 0.
    pub fn reset(&mut self) {
        self.layout = PageLayout::default();
        self.scroll_y = 0;
        self.current_page = 0;
    }

    pub fn set_layout(&mut self, layout: PageLayout) {
        self.layout = layout;
        self.clamp_scroll();
        self.current_page = self.visible_page();
    }

    pub fn resize(&mut self, viewport_width: u32, viewport_height: u32) {
        self.viewport_width = viewport_width;
        self.viewport_height = viewport_height;
        self.clamp_scroll();
        if !self.layout.is_empty() {
            self.current_page = self.visible_page();
        }
    }

    /// Moves the strip by `delta` pixels and re-derives the current page.
    pub fn scroll_by(&mut self, delta: i64) -> usize {
        let target = i64::from(self.scroll_y).saturating_add(delta);
        self.scroll_y = target.clamp(0, i64::from(self.max_scroll())) as u32;
        self.current_page = self.visible_page();
        self.current_page
    }

    /// Brings the top of `page_index` into view. Returns false, leaving
    /// everything untouched, for pages that are out of range or not laid out.
    pub fn jump_to(&mut self, page_index: usize, page_count: usize) -> bool {
        if page_index >= page_count {
            return false;
        }
        let Some(entry) = self.layout.entry_for_page(page_index) else {
            return false;
        };

        let (top, bottom) = (entry.top, entry.bottom());
        let visible_bottom = self.scroll_y + self.viewport_height;
        if top < self.scroll_y {
            self.scroll_y = top;
        } else if bottom > visible_bottom {
            self.scroll_y = top.min(bottom - self.viewport_height);
        }
        self.clamp_scroll();
        self.current_page = page_index;
        true
    }

    fn clamp_scroll(&mut self) {
        self.scroll_y = self.scroll_y.min(self.max_scroll());
    }
}
