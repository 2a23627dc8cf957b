use std::fmt;

use crate::DocumentBackend;

pub const POINTS_PER_INCH: f64 = 72.0;
pub const MM_PER_INCH: f64 = 25.4;
pub const PAPER_TOLERANCE_MM: f64 = 2.0;

pub fn points_to_mm(points: f64) -> f64 {
    points * MM_PER_INCH / POINTS_PER_INCH
}

pub fn points_to_px(points: f64, dpi: f64) -> f64 {
    points * dpi / POINTS_PER_INCH
}

pub fn mm_to_px(mm: f64, dpi: f64) -> f64 {
    mm / MM_PER_INCH * dpi
}

/// Density at which `extent_points` spans exactly `available_px`.
pub fn dpi_for_extent(available_px: f64, extent_points: f64) -> Option<f64> {
    if !(available_px > 0.0 && extent_points > 0.0) {
        return None;
    }
    let dpi = available_px * POINTS_PER_INCH / extent_points;
    dpi.is_finite().then_some(dpi)
}

/// A width/height pair; the unit depends on where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    pub const ZERO: PageSize = PageSize {
        width: 0.0,
        height: 0.0,
    };

    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn points_to_mm(self) -> Self {
        Self::new(points_to_mm(self.width), points_to_mm(self.height))
    }

    pub fn points_to_px(self, dpi: f64) -> (u32, u32) {
        let convert = |points: f64| points_to_px(points, dpi).round().max(0.0) as u32;
        (convert(self.width), convert(self.height))
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Paper {
    A4,
    Letter,
    Legal,
    A3,
}

impl Paper {
    pub const ALL: [Paper; 4] = [Paper::A4, Paper::Letter, Paper::Legal, Paper::A3];

    /// Portrait dimensions in millimetres.
    pub fn dimensions_mm(self) -> (f64, f64) {
        match self {
            Paper::A4 => (210.0, 297.0),
            Paper::Letter => (216.0, 279.0),
            Paper::Legal => (216.0, 356.0),
            Paper::A3 => (297.0, 420.0),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Paper::A4 => "A4",
            Paper::Letter => "Letter",
            Paper::Legal => "Legal",
            Paper::A3 => "A3",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaperClass {
    Standard { paper: Paper, landscape: bool },
    Custom,
}

impl PaperClass {
    pub fn detect(size_mm: PageSize) -> Self {
        let near = |a: f64, b: f64| (a - b).abs() < PAPER_TOLERANCE_MM;
        let matches = |w: f64, h: f64| near(size_mm.width, w) && near(size_mm.height, h);

        for paper in Paper::ALL {
            let (w, h) = paper.dimensions_mm();
            if matches(w, h) {
                return PaperClass::Standard {
                    paper,
                    landscape: false,
                };
            }
        }
        for paper in Paper::ALL {
            let (w, h) = paper.dimensions_mm();
            if matches(h, w) {
                return PaperClass::Standard {
                    paper,
                    landscape: true,
                };
            }
        }
        PaperClass::Custom
    }
}

impl fmt::Display for PaperClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaperClass::Standard {
                paper,
                landscape: false,
            } => f.write_str(paper.name()),
            PaperClass::Standard {
                paper,
                landscape: true,
            } => write!(f, "{} (Landscape)", paper.name()),
            PaperClass::Custom => f.write_str("Custom"),
        }
    }
}

/// Answers size questions about the pages of the loaded document, if any.
#[derive(Clone, Copy)]
pub struct PageGeometry<'a> {
    document: Option<&'a dyn DocumentBackend>,
}

impl<'a> PageGeometry<'a> {
    pub fn new(document: Option<&'a dyn DocumentBackend>) -> Self {
        Self { document }
    }

    pub fn page_count(&self) -> usize {
        self.document.map_or(0, |doc| doc.info().page_count)
    }

    /// Natural size in points; zero when there is no such page.
    pub fn page_size(&self, page_index: usize) -> PageSize {
        match self.document {
            Some(doc) if page_index < doc.info().page_count => {
                doc.page_size(page_index).unwrap_or(PageSize::ZERO)
            }
            _ => PageSize::ZERO,
        }
    }

    pub fn page_size_mm(&self, page_index: usize) -> PageSize {
        self.page_size(page_index).points_to_mm()
    }

    pub fn page_pixels(&self, page_index: usize, dpi: f64) -> (u32, u32) {
        self.page_size(page_index).points_to_px(dpi)
    }

    pub fn paper_class(&self, page_index: usize) -> PaperClass {
        PaperClass::detect(self.page_size_mm(page_index))
    }
}
