use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

pub const DEFAULT_DPI: f64 = 150.0;
pub const MIN_ZOOM_DPI: f64 = 50.0;
pub const ZOOM_IN_FACTOR: f64 = 1.2;
pub const ZOOM_OUT_FACTOR: f64 = 0.8;
pub const DEFAULT_PAGE_GAP_PX: u32 = 20;

/// Print margins in millimetres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

impl Margins {
    pub const fn new(top: f64, bottom: f64, left: f64, right: f64) -> Self {
        Self {
            top,
            bottom,
            left,
            right,
        }
    }

    pub const fn uniform(mm: f64) -> Self {
        Self::new(mm, mm, mm, mm)
    }
}

impl Default for Margins {
    fn default() -> Self {
        MarginPreset::Normal.margins().unwrap_or(Self::uniform(10.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarginPreset {
    None,
    Minimal,
    Normal,
    Comfortable,
    Wide,
    Custom,
}

impl MarginPreset {
    pub const CYCLE: [MarginPreset; 5] = [
        MarginPreset::None,
        MarginPreset::Minimal,
        MarginPreset::Normal,
        MarginPreset::Comfortable,
        MarginPreset::Wide,
    ];

    pub fn margins(self) -> Option<Margins> {
        match self {
            MarginPreset::None => Some(Margins::uniform(0.0)),
            MarginPreset::Minimal => Some(Margins::uniform(5.0)),
            MarginPreset::Normal => Some(Margins::uniform(10.0)),
            MarginPreset::Comfortable => Some(Margins::uniform(15.0)),
            MarginPreset::Wide => Some(Margins::new(20.0, 20.0, 25.0, 25.0)),
            MarginPreset::Custom => None,
        }
    }

    /// Presets are told apart by their top and left values only.
    pub fn identify(margins: &Margins) -> Self {
        Self::CYCLE
            .into_iter()
            .find(|preset| {
                preset.margins().is_some_and(|candidate| {
                    candidate.top == margins.top && candidate.left == margins.left
                })
            })
            .unwrap_or(MarginPreset::Custom)
    }

    pub fn next(self) -> Self {
        match self {
            MarginPreset::None => MarginPreset::Minimal,
            MarginPreset::Minimal => MarginPreset::Normal,
            MarginPreset::Normal => MarginPreset::Comfortable,
            MarginPreset::Comfortable => MarginPreset::Wide,
            MarginPreset::Wide | MarginPreset::Custom => MarginPreset::None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MarginPreset::None => "None",
            MarginPreset::Minimal => "Minimal",
            MarginPreset::Normal => "Normal",
            MarginPreset::Comfortable => "Comfortable",
            MarginPreset::Wide => "Wide",
            MarginPreset::Custom => "Custom",
        }
    }
}

impl fmt::Display for MarginPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplexMode {
    #[default]
    Simplex,
    LongEdge,
    ShortEdge,
}

impl DuplexMode {
    pub fn next(self) -> Self {
        match self {
            DuplexMode::Simplex => DuplexMode::LongEdge,
            DuplexMode::LongEdge => DuplexMode::ShortEdge,
            DuplexMode::ShortEdge => DuplexMode::Simplex,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DuplexMode::Simplex => "One-sided",
            DuplexMode::LongEdge => "Long Edge",
            DuplexMode::ShortEdge => "Short Edge",
        }
    }

    /// Direction the sheet turns when `page_index` is printed.
    pub fn flip_hint(self, page_index: usize) -> Option<&'static str> {
        let even = page_index % 2 == 0;
        match self {
            DuplexMode::Simplex => None,
            DuplexMode::LongEdge if even => Some("↓ Flip ↓"),
            DuplexMode::LongEdge => Some("↑ Flip ↑"),
            DuplexMode::ShortEdge if even => Some("→ Flip →"),
            DuplexMode::ShortEdge => Some("← Flip ←"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScaleMode {
    #[default]
    FitToPage,
    ActualSize,
    /// Recognised but never reached by cycling; there is no percent entry.
    CustomPercent(u16),
}

impl ScaleMode {
    pub fn next(self) -> Self {
        match self {
            ScaleMode::FitToPage => ScaleMode::ActualSize,
            ScaleMode::ActualSize | ScaleMode::CustomPercent(_) => ScaleMode::FitToPage,
        }
    }
}

impl fmt::Display for ScaleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScaleMode::FitToPage => f.write_str("Fit to Page"),
            ScaleMode::ActualSize => f.write_str("Actual Size"),
            ScaleMode::CustomPercent(percent) => write!(f, "{percent}%"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub dpi: f64,
    pub page_gap_px: u32,
    pub show_boundaries: bool,
    pub margins: Margins,
    pub duplex: DuplexMode,
    pub scale: ScaleMode,
    pub color: bool,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            page_gap_px: DEFAULT_PAGE_GAP_PX,
            show_boundaries: true,
            margins: Margins::default(),
            duplex: DuplexMode::Simplex,
            scale: ScaleMode::FitToPage,
            color: true,
        }
    }
}

impl ViewState {
    /// Rejects non-finite and non-positive densities. Returns whether the value changed.
    pub fn set_dpi(&mut self, dpi: f64) -> bool {
        if !dpi.is_finite() || dpi <= 0.0 || dpi == self.dpi {
            return false;
        }
        self.dpi = dpi;
        true
    }

    pub fn zoom_in(&mut self, steps: usize) -> bool {
        let factor = ZOOM_IN_FACTOR.powf(steps as f64);
        self.set_dpi(self.dpi * factor)
    }

    pub fn zoom_out(&mut self, steps: usize) -> bool {
        let factor = ZOOM_OUT_FACTOR.powf(steps as f64);
        self.set_dpi((self.dpi * factor).max(MIN_ZOOM_DPI))
    }

    pub fn margin_preset(&self) -> MarginPreset {
        MarginPreset::identify(&self.margins)
    }

    pub fn cycle_margins(&mut self) -> MarginPreset {
        let next = self.margin_preset().next();
        if let Some(margins) = next.margins() {
            self.margins = margins;
        }
        next
    }
}

/// Immutable view of the settings at one point in time. Page consumers keep
/// the version they last drew with and compare it against the current one.
#[derive(Debug, Clone)]
pub struct ViewSnapshot {
    version: u64,
    state: Arc<ViewState>,
}

impl ViewSnapshot {
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn is_newer_than(&self, seen_version: Option<u64>) -> bool {
        seen_version.map_or(true, |seen| self.version > seen)
    }
}

impl Deref for ViewSnapshot {
    type Target = ViewState;

    fn deref(&self) -> &Self::Target {
        &self.state
    }
}

#[derive(Debug)]
pub struct ViewStore {
    current: ViewSnapshot,
}

impl ViewStore {
    pub fn new(initial: ViewState) -> Self {
        Self {
            current: ViewSnapshot {
                version: 0,
                state: Arc::new(initial),
            },
        }
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        self.current.clone()
    }

    pub fn state(&self) -> &ViewState {
        &self.current.state
    }

    /// Applies `mutate` to a copy of the current state and publishes it as a
    /// new snapshot when it reports a change.
    pub fn publish<R>(&mut self, mutate: impl FnOnce(&mut ViewState) -> R) -> R
    where
        R: Changed,
    {
        let mut next = ViewState::clone(&self.current.state);
        let result = mutate(&mut next);
        if result.changed() {
            self.current = ViewSnapshot {
                version: self.current.version + 1,
                state: Arc::new(next),
            };
        }
        result
    }
}

impl Default for ViewStore {
    fn default() -> Self {
        Self::new(ViewState::default())
    }
}

/// Whether a mutation result should produce a new snapshot.
pub trait Changed {
    fn changed(&self) -> bool;
}

impl Changed for bool {
    fn changed(&self) -> bool {
        *self
    }
}

impl Changed for MarginPreset {
    fn changed(&self) -> bool {
        true
    }
}

impl Changed for DuplexMode {
    fn changed(&self) -> bool {
        true
    }
}

impl Changed for ScaleMode {
    fn changed(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn margin_cycle_returns_to_normal_after_five_steps() {
        let mut state = ViewState::default();
        assert_eq!(state.margin_preset(), MarginPreset::Normal);

        let visited: Vec<_> = (0..5).map(|_| state.cycle_margins()).collect();
        assert_eq!(
            visited,
            vec![
                MarginPreset::Comfortable,
                MarginPreset::Wide,
                MarginPreset::None,
                MarginPreset::Minimal,
                MarginPreset::Normal,
            ]
        );
    }

    #[test]
    fn custom_margins_restart_the_cycle_at_none() {
        let mut state = ViewState {
            margins: Margins::new(12.0, 12.0, 7.0, 7.0),
            ..ViewState::default()
        };
        assert_eq!(state.margin_preset(), MarginPreset::Custom);
        assert_eq!(state.cycle_margins(), MarginPreset::None);
        assert_eq!(state.margins, Margins::uniform(0.0));
    }

    #[test]
    fn wide_preset_is_identified_by_top_and_left() {
        let margins = Margins::new(20.0, 1.0, 25.0, 3.0);
        assert_eq!(MarginPreset::identify(&margins), MarginPreset::Wide);
    }

    #[test]
    fn duplex_and_scale_cycles() {
        assert_eq!(DuplexMode::Simplex.next(), DuplexMode::LongEdge);
        assert_eq!(DuplexMode::LongEdge.next(), DuplexMode::ShortEdge);
        assert_eq!(DuplexMode::ShortEdge.next(), DuplexMode::Simplex);

        assert_eq!(ScaleMode::FitToPage.next(), ScaleMode::ActualSize);
        assert_eq!(ScaleMode::ActualSize.next(), ScaleMode::FitToPage);
        assert_eq!(ScaleMode::CustomPercent(140).next(), ScaleMode::FitToPage);
        assert_eq!(ScaleMode::CustomPercent(140).to_string(), "140%");
    }

    #[test]
    fn flip_hint_alternates_with_page_parity() {
        assert_eq!(DuplexMode::Simplex.flip_hint(0), None);
        assert_eq!(DuplexMode::LongEdge.flip_hint(0), Some("↓ Flip ↓"));
        assert_eq!(DuplexMode::LongEdge.flip_hint(1), Some("↑ Flip ↑"));
        assert_eq!(DuplexMode::ShortEdge.flip_hint(2), Some("→ Flip →"));
        assert_eq!(DuplexMode::ShortEdge.flip_hint(3), Some("← Flip ←"));
    }

    #[test]
    fn zoom_out_never_drops_below_floor() {
        let mut state = ViewState::default();
        for _ in 0..100 {
            state.zoom_out(1);
            assert!(state.dpi >= MIN_ZOOM_DPI);
        }
        assert_eq!(state.dpi, MIN_ZOOM_DPI);
        assert!(!state.zoom_out(3));
    }

    #[test]
    fn zoom_in_multiplies_by_growth_factor() {
        let mut state = ViewState::default();
        assert!(state.zoom_in(2));
        assert!((state.dpi - DEFAULT_DPI * 1.44).abs() < 1e-9);
    }

    #[test]
    fn set_dpi_rejects_degenerate_values() {
        let mut state = ViewState::default();
        assert!(!state.set_dpi(0.0));
        assert!(!state.set_dpi(-3.0));
        assert!(!state.set_dpi(f64::INFINITY));
        assert!(!state.set_dpi(f64::NAN));
        assert_eq!(state.dpi, DEFAULT_DPI);
    }

    #[test]
    fn store_only_bumps_version_on_change() {
        let mut store = ViewStore::default();
        let before = store.snapshot();

        assert!(!store.publish(|state| state.set_dpi(DEFAULT_DPI)));
        assert_eq!(store.snapshot().version(), before.version());

        store.publish(|state| {
            state.color = !state.color;
            true
        });
        let after = store.snapshot();
        assert!(after.is_newer_than(Some(before.version())));
        assert!(before.color);
        assert!(!after.color);
    }
}
