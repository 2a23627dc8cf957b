use std::time::{Duration, Instant};

use crate::geometry::{PageSize, PaperClass};
use crate::view::DuplexMode;

pub const NO_DOCUMENT: &str = "No document loaded";
pub const FLASH_DURATION: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone)]
struct Flash {
    text: String,
    expires_at: Instant,
}

/// Text shown on the bottom line: a standing message that short-lived
/// notices temporarily cover. Setting the standing message drops any notice.
#[derive(Debug, Clone)]
pub struct StatusLine {
    message: String,
    flash: Option<Flash>,
}

impl Default for StatusLine {
    fn default() -> Self {
        Self {
            message: NO_DOCUMENT.to_string(),
            flash: None,
        }
    }
}

impl StatusLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = message.into();
        self.flash = None;
    }

    pub fn flash(&mut self, text: impl Into<String>, duration: Duration) {
        self.flash_at(text, duration, Instant::now());
    }

    pub fn flash_at(&mut self, text: impl Into<String>, duration: Duration, now: Instant) {
        self.flash = Some(Flash {
            text: text.into(),
            expires_at: now + duration,
        });
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The pending notice regardless of expiry.
    pub fn flashed(&self) -> Option<&str> {
        self.flash.as_ref().map(|flash| flash.text.as_str())
    }

    pub fn text_at(&self, now: Instant) -> &str {
        match &self.flash {
            Some(flash) if now < flash.expires_at => &flash.text,
            _ => &self.message,
        }
    }

    pub fn flash_deadline(&self) -> Option<Instant> {
        self.flash.as_ref().map(|flash| flash.expires_at)
    }

    /// Drops an expired notice. Returns true when the visible text changed.
    pub fn expire(&mut self, now: Instant) -> bool {
        match &self.flash {
            Some(flash) if now >= flash.expires_at => {
                self.flash = None;
                true
            }
            _ => false,
        }
    }
}

pub fn format_page_status(
    page_index: usize,
    page_count: usize,
    size_mm: PageSize,
    duplex: DuplexMode,
) -> String {
    let paper = PaperClass::detect(size_mm);
    let mut status = format!(
        " [{}/{}] | {:.1} x {:.1} mm ({})",
        page_index + 1,
        page_count,
        size_mm.width,
        size_mm.height,
        paper
    );
    if let Some(hint) = duplex.flip_hint(page_index) {
        status.push_str(" | ");
        status.push_str(hint);
    }
    status
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_status_matches_expected_layout() {
        let status = format_page_status(2, 12, PageSize::new(210.0, 297.0), DuplexMode::Simplex);
        assert_eq!(status, " [3/12] | 210.0 x 297.0 mm (A4)");
    }

    #[test]
    fn page_status_carries_duplex_hint() {
        let status = format_page_status(
            1,
            4,
            PageSize::new(215.9, 279.4),
            DuplexMode::LongEdge,
        );
        assert_eq!(status, " [2/4] | 215.9 x 279.4 mm (Letter) | ↑ Flip ↑");
    }

    #[test]
    fn flash_covers_message_until_expiry() {
        let now = Instant::now();
        let mut status = StatusLine::new();
        assert_eq!(status.text_at(now), NO_DOCUMENT);

        status.flash_at("Duplex: Long Edge", FLASH_DURATION, now);
        assert_eq!(status.text_at(now), "Duplex: Long Edge");
        assert!(!status.expire(now + Duration::from_millis(1999)));

        let later = now + FLASH_DURATION;
        assert_eq!(status.text_at(later), NO_DOCUMENT);
        assert!(status.expire(later));
        assert_eq!(status.flashed(), None);
    }

    #[test]
    fn new_message_replaces_flash() {
        let mut status = StatusLine::new();
        status.flash("Color: On", FLASH_DURATION);
        status.set_message(" [1/1]");
        assert_eq!(status.flashed(), None);
        assert_eq!(status.message(), " [1/1]");
    }
}
