mod compose;
mod input;
mod kitty;
mod timer;

use std::io::{self, Write};

pub use compose::{compose_frame, ComposedFrame, FrameComposer, BACKGROUND, SEPARATOR_COLOR};
pub use input::{EventMapper, InputMode, UiEvent, TOP_LEADER};
pub use kitty::{encode_png, DrawError, DrawParams, KittyRenderer};
pub use timer::{DeadlineTimer, SequenceTimer};

/// Cuts `text` to `width` columns, marking the cut with `...`, and pads the
/// rest with spaces so it overwrites whatever the line held before.
pub fn fit_status(text: &str, width: usize) -> String {
    let length = text.chars().count();
    let mut line = if length > width {
        if width <= 3 {
            text.chars().take(width).collect()
        } else {
            let mut cut: String = text.chars().take(width - 3).collect();
            cut.push_str("...");
            cut
        }
    } else {
        text.to_string()
    };
    let used = line.chars().count();
    line.extend(std::iter::repeat(' ').take(width - used));
    line
}

pub fn write_status_line<W: Write>(writer: &mut W, label: &str, width: usize) -> io::Result<()> {
    write!(writer, "{}", fit_status(label, width))?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_status_is_truncated() {
        insta::assert_snapshot!(
            fit_status("Unknown command: definitely-not-a-page", 24),
            @"Unknown command: defi..."
        );
        insta::assert_snapshot!(fit_status("Margins: Comfortable", 2), @"Ma");
    }

    #[test]
    fn page_status_with_hint_fits_exactly() {
        insta::assert_snapshot!(
            fit_status("[3/12] | 210.0 x 297.0 mm (A4) | ↓ Flip ↓", 41),
            @"[3/12] | 210.0 x 297.0 mm (A4) | ↓ Flip ↓"
        );
    }

    #[test]
    fn short_status_is_padded() {
        assert_eq!(fit_status("g", 4), "g   ");
        assert_eq!(fit_status("", 0), "");
    }

    #[test]
    fn status_line_is_written_and_flushed() {
        let mut out = Vec::new();
        write_status_line(&mut out, "No document loaded", 20).unwrap();
        assert_eq!(out, b"No document loaded  ");
    }
}
