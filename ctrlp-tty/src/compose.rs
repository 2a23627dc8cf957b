use ctrlp_core::geometry::mm_to_px;
use ctrlp_core::{
    Margins, PageLayoutEntry, RenderImage, ViewSnapshot, ViewState, ViewportTracker,
};

pub const BACKGROUND: [u8; 3] = [0, 0, 0];
pub const SEPARATOR_COLOR: [u8; 3] = [68, 68, 68];

const MARGIN_COLOR: [u8; 3] = [255, 0, 0];
const MARGIN_ALPHA: f32 = 100.0 / 255.0;
const MARGIN_PEN_PX: i64 = 2;
const DASH_ON_PX: i64 = 8;
const DASH_OFF_PX: i64 = 4;
const CORNER_MARKER_PX: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FrameKey {
    generation: u64,
    view_version: u64,
    scroll: u32,
    width: u32,
    height: u32,
}

pub struct ComposedFrame<'a> {
    pub image: &'a RenderImage,
    /// False when the previous frame was reused unchanged.
    pub changed: bool,
}

/// Builds the visible part of the page strip, reusing the last frame while
/// neither the layout, the view settings nor the scroll position moved.
#[derive(Debug, Default)]
pub struct FrameComposer {
    cached: Option<(FrameKey, RenderImage)>,
}

impl FrameComposer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    pub fn compose(
        &mut self,
        viewport: &ViewportTracker,
        view: &ViewSnapshot,
    ) -> ComposedFrame<'_> {
        let (width, height) = viewport.viewport_size();
        let key = FrameKey {
            generation: viewport.layout().generation(),
            view_version: view.version(),
            scroll: viewport.scroll_offset(),
            width,
            height,
        };
        let changed = !matches!(&self.cached, Some((cached, _)) if *cached == key);
        if changed {
            self.cached = None;
        }
        let (_, image) = self
            .cached
            .get_or_insert_with(|| (key, compose_frame(viewport, view.state())));
        ComposedFrame { image, changed }
    }
}

pub fn compose_frame(viewport: &ViewportTracker, view: &ViewState) -> RenderImage {
    let (width, height) = viewport.viewport_size();
    let mut frame = RenderImage {
        width,
        height,
        pixels: [BACKGROUND[0], BACKGROUND[1], BACKGROUND[2], 255]
            .repeat(width as usize * height as usize),
    };

    let scroll = i64::from(viewport.scroll_offset());
    let visible_bottom = scroll + i64::from(height);
    let layout = viewport.layout();

    for entry in layout.entries() {
        let top = i64::from(entry.top);
        if i64::from(entry.bottom()) <= scroll || top >= visible_bottom {
            continue;
        }
        let mut canvas = PageCanvas {
            frame: &mut frame,
            origin_x: centered_origin(width, entry.width()),
            origin_y: top - scroll,
        };
        canvas.blit(&entry.image);
        canvas.draw_margins(entry, &view.margins, view.dpi);
    }

    for separator in layout.separators() {
        let y = i64::from(separator.y) - scroll;
        let mut canvas = PageCanvas {
            frame: &mut frame,
            origin_x: centered_origin(width, separator.width),
            origin_y: y,
        };
        canvas.fill_row(0, i64::from(separator.width), 0, SEPARATOR_COLOR, 1.0);
    }

    frame
}

/// Left edge that centers `item` pixels in `available`; negative when it overflows.
fn centered_origin(available: u32, item: u32) -> i64 {
    (i64::from(available) - i64::from(item)) / 2
}

/// Draws in page-local coordinates onto the frame, clipping at its edges.
struct PageCanvas<'a> {
    frame: &'a mut RenderImage,
    origin_x: i64,
    origin_y: i64,
}

impl PageCanvas<'_> {
    fn blit(&mut self, image: &RenderImage) {
        let expected = image.width as usize * image.height as usize * 4;
        if image.pixels.len() < expected {
            return;
        }
        let frame_width = i64::from(self.frame.width);
        let frame_height = i64::from(self.frame.height);
        let src_x0 = (-self.origin_x).clamp(0, i64::from(image.width));
        let src_x1 = (frame_width - self.origin_x).clamp(src_x0, i64::from(image.width));
        if src_x0 == src_x1 {
            return;
        }
        let span = (src_x1 - src_x0) as usize * 4;

        for row in 0..i64::from(image.height) {
            let dst_y = self.origin_y + row;
            if dst_y < 0 || dst_y >= frame_height {
                continue;
            }
            let src = (row as usize * image.width as usize + src_x0 as usize) * 4;
            let dst = (dst_y as usize * self.frame.width as usize
                + (self.origin_x + src_x0) as usize)
                * 4;
            self.frame.pixels[dst..dst + span].copy_from_slice(&image.pixels[src..src + span]);
        }
    }

    fn draw_margins(&mut self, entry: &PageLayoutEntry, margins: &Margins, dpi: f64) {
        let px = |mm: f64| mm_to_px(mm, dpi).round() as i64;
        let (left, right, top, bottom) = (
            px(margins.left),
            px(margins.right),
            px(margins.top),
            px(margins.bottom),
        );
        let (width, height) = (i64::from(entry.width()), i64::from(entry.height()));
        let (x0, y0, x1, y1) = (left, top, width - right, height - bottom);

        if x1 > x0 && y1 > y0 {
            self.dashed_rect(x0, y0, x1, y1);
        }

        let marker = CORNER_MARKER_PX;
        let color = MARGIN_COLOR;
        let alpha = MARGIN_ALPHA;
        self.fill_row(0, marker, y0, color, alpha);
        self.fill_column(x0, 0, marker, color, alpha);
        self.fill_row(width - marker, width, y0, color, alpha);
        self.fill_column(x1, 0, marker, color, alpha);
        self.fill_row(0, marker, y1, color, alpha);
        self.fill_column(x0, height - marker, height, color, alpha);
        self.fill_row(width - marker, width, y1, color, alpha);
        self.fill_column(x1, height - marker, height, color, alpha);
    }

    fn dashed_rect(&mut self, x0: i64, y0: i64, x1: i64, y1: i64) {
        let half = MARGIN_PEN_PX / 2;
        for x in x0..x1 {
            if dash_on(x - x0) {
                for offset in 0..MARGIN_PEN_PX {
                    self.blend(x, y0 - half + offset, MARGIN_COLOR, MARGIN_ALPHA);
                    self.blend(x, y1 - half + offset, MARGIN_COLOR, MARGIN_ALPHA);
                }
            }
        }
        for y in y0..y1 {
            if dash_on(y - y0) {
                for offset in 0..MARGIN_PEN_PX {
                    self.blend(x0 - half + offset, y, MARGIN_COLOR, MARGIN_ALPHA);
                    self.blend(x1 - half + offset, y, MARGIN_COLOR, MARGIN_ALPHA);
                }
            }
        }
    }

    fn fill_row(&mut self, x0: i64, x1: i64, y: i64, color: [u8; 3], alpha: f32) {
        for x in x0..x1 {
            self.blend(x, y, color, alpha);
        }
    }

    fn fill_column(&mut self, x: i64, y0: i64, y1: i64, color: [u8; 3], alpha: f32) {
        for y in y0..y1 {
            self.blend(x, y, color, alpha);
        }
    }

    fn blend(&mut self, x: i64, y: i64, color: [u8; 3], alpha: f32) {
        let (x, y) = (self.origin_x + x, self.origin_y + y);
        if x < 0 || y < 0 || x >= i64::from(self.frame.width) || y >= i64::from(self.frame.height)
        {
            return;
        }
        let idx = (y as usize * self.frame.width as usize + x as usize) * 4;
        blend_pixel(&mut self.frame.pixels[idx..idx + 4], color, alpha);
    }
}

fn dash_on(offset: i64) -> bool {
    offset.rem_euclid(DASH_ON_PX + DASH_OFF_PX) < DASH_ON_PX
}

fn blend_pixel(pixel: &mut [u8], color: [u8; 3], alpha: f32) {
    let alpha = alpha.clamp(0.0, 1.0);
    let inv = 1.0 - alpha;
    for (channel, target) in pixel.iter_mut().zip(color) {
        *channel = (f32::from(*channel) * inv + f32::from(target) * alpha)
            .round()
            .clamp(0.0, 255.0) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctrlp_core::{PageLayout, ViewStore};

    fn white(width: u32, height: u32) -> RenderImage {
        RenderImage {
            width,
            height,
            pixels: vec![255; (width * height * 4) as usize],
        }
    }

    fn pixel(frame: &RenderImage, x: u32, y: u32) -> [u8; 4] {
        let idx = ((y * frame.width + x) * 4) as usize;
        [
            frame.pixels[idx],
            frame.pixels[idx + 1],
            frame.pixels[idx + 2],
            frame.pixels[idx + 3],
        ]
    }

    fn tracker(pages: usize, viewport: (u32, u32)) -> ViewportTracker {
        let mut builder = PageLayout::builder(1, 20, true);
        for page in 0..pages {
            builder.push(page, white(40, 40));
        }
        let mut tracker = ViewportTracker::new(viewport.0, viewport.1);
        tracker.set_layout(builder.finish());
        tracker
    }

    // At 25.4 DPI one millimetre is one pixel, so 10 mm margins sit 10 px in.
    fn view() -> ViewSnapshot {
        ViewStore::new(ViewState {
            dpi: 25.4,
            ..ViewState::default()
        })
        .snapshot()
    }

    #[test]
    fn empty_layout_is_background() {
        let frame = compose_frame(&ViewportTracker::new(8, 4), &ViewState::default());
        assert_eq!(frame.pixels.len(), 8 * 4 * 4);
        assert!(frame
            .pixels
            .chunks_exact(4)
            .all(|px| px == [0, 0, 0, 255]));
    }

    #[test]
    fn page_is_centered_below_padding() {
        let frame = compose_frame(&tracker(1, (60, 100)), view().state());
        assert_eq!(pixel(&frame, 0, 0), [0, 0, 0, 255]);
        assert_eq!(pixel(&frame, 9, 40), [0, 0, 0, 255]);
        assert_eq!(pixel(&frame, 30, 40), [255, 255, 255, 255]);
        assert_eq!(pixel(&frame, 30, 19), [0, 0, 0, 255]);
    }

    #[test]
    fn margin_outline_is_translucent_red() {
        let frame = compose_frame(&tracker(1, (60, 100)), view().state());
        // Page origin is (10, 20); the top margin line runs along page y = 10.
        let [r, g, b, a] = pixel(&frame, 24, 30);
        assert_eq!((r, a), (255, 255));
        assert!(g < 255 && g > 100);
        assert_eq!(g, b);
        // Dash gap: 8 px on, 4 px off starting at the left margin.
        assert_eq!(pixel(&frame, 20 + 9, 30), [255, 255, 255, 255]);
    }

    #[test]
    fn separator_drawn_between_pages() {
        let frame = compose_frame(&tracker(2, (60, 200)), view().state());
        assert_eq!(pixel(&frame, 30, 80), [68, 68, 68, 255]);
        assert_eq!(pixel(&frame, 5, 80), [0, 0, 0, 255]);
        assert_eq!(pixel(&frame, 30, 120), [255, 255, 255, 255]);
    }

    #[test]
    fn wide_page_is_cropped_evenly() {
        let mut builder = PageLayout::builder(1, 20, false);
        builder.push(0, white(100, 40));
        let mut tracker = ViewportTracker::new(50, 100);
        tracker.set_layout(builder.finish());
        let frame = compose_frame(&tracker, &ViewState {
            margins: Margins::uniform(0.0),
            ..ViewState::default()
        });
        assert_eq!(pixel(&frame, 25, 40), [255, 255, 255, 255]);
        assert_eq!(pixel(&frame, 0, 40), [255, 255, 255, 255]);
        assert_eq!(pixel(&frame, 49, 40), [255, 255, 255, 255]);
    }

    #[test]
    fn composer_reuses_frame_until_inputs_change() {
        let mut tracker = tracker(1, (60, 100));
        let view = view();
        let mut composer = FrameComposer::new();

        assert!(composer.compose(&tracker, &view).changed);
        assert!(!composer.compose(&tracker, &view).changed);

        tracker.resize(60, 90);
        assert!(composer.compose(&tracker, &view).changed);

        let mut store = ViewStore::new(view.state().clone());
        store.publish(|state| {
            state.duplex = state.duplex.next();
            true
        });
        assert!(composer.compose(&tracker, &store.snapshot()).changed);

        composer.invalidate();
        assert!(composer.compose(&tracker, &store.snapshot()).changed);
    }
}
