use std::io::{self, Write};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use crossterm::{
    cursor,
    terminal::{Clear, ClearType},
};
use ctrlp_core::RenderImage;
use png::{BitDepth, ColorType, Encoder};
use thiserror::Error;

const CHUNK_SIZE: usize = 4096;

#[derive(Debug, Error)]
pub enum DrawError {
    #[error("cannot draw an empty {width}x{height} frame")]
    EmptyFrame { width: u32, height: u32 },
    #[error("failed to encode frame as png")]
    Encode(#[from] png::EncodingError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Terminal cells covered by a placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawParams {
    pub columns: u32,
    pub rows: u32,
}

impl DrawParams {
    pub fn clamped(columns: u32, rows: u32) -> Self {
        Self {
            columns: columns.max(1),
            rows: rows.max(1),
        }
    }
}

/// Sends frames through the kitty graphics protocol. Every frame reuses the
/// same image id so the terminal replaces the previous one in place.
pub struct KittyRenderer<W: Write> {
    writer: W,
    image_id: u32,
    placement_id: u32,
}

impl<W: Write> KittyRenderer<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            image_id: 1,
            placement_id: 1,
        }
    }

    pub fn writer(&mut self) -> &mut W {
        &mut self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    pub fn draw(&mut self, image: &RenderImage, params: DrawParams) -> Result<(), DrawError> {
        if image.width == 0 || image.height == 0 {
            return Err(DrawError::EmptyFrame {
                width: image.width,
                height: image.height,
            });
        }
        let encoded = BASE64.encode(encode_png(image)?);
        let mut chunks = encoded.as_bytes().chunks(CHUNK_SIZE).peekable();
        let mut first = true;

        while let Some(chunk) = chunks.next() {
            let more = u8::from(chunks.peek().is_some());
            if first {
                write!(
                    self.writer,
                    "\u{1b}_Ga=T,f=100,C=1,q=2,i={},p={},c={},r={},z=-1,m={}",
                    self.image_id, self.placement_id, params.columns, params.rows, more
                )?;
                first = false;
            } else {
                write!(self.writer, "\u{1b}_Gm={},q=2", more)?;
            }
            self.writer.write_all(b";")?;
            self.writer.write_all(chunk)?;
            write!(self.writer, "\u{1b}\\")?;
        }

        self.writer.flush()?;
        Ok(())
    }

    /// Removes every image this renderer placed.
    pub fn delete_images(&mut self) -> io::Result<()> {
        write!(self.writer, "\u{1b}_Ga=d,d=I,i={},q=2\u{1b}\\", self.image_id)?;
        self.writer.flush()
    }

    pub fn begin_sync_update(&mut self) -> io::Result<()> {
        write!(self.writer, "\u{1b}[?2026h")
    }

    /// The terminal shows everything buffered since `begin_sync_update` at once.
    pub fn end_sync_update(&mut self) -> io::Result<()> {
        write!(self.writer, "\u{1b}[?2026l")?;
        self.writer.flush()
    }

    pub fn clear_all(&mut self) -> io::Result<()> {
        crossterm::execute!(
            &mut self.writer,
            Clear(ClearType::All),
            cursor::MoveTo(0, 0)
        )
    }
}

pub fn encode_png(image: &RenderImage) -> Result<Vec<u8>, png::EncodingError> {
    let mut buffer = Vec::new();
    let mut encoder = Encoder::new(&mut buffer, image.width, image.height);
    encoder.set_color(ColorType::Rgba);
    encoder.set_depth(BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&image.pixels)?;
    writer.finish()?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32) -> RenderImage {
        RenderImage {
            width,
            height,
            pixels: vec![200; (width * height * 4) as usize],
        }
    }

    #[test]
    fn draw_emits_single_chunk_for_small_frame() {
        let mut renderer = KittyRenderer::new(Vec::new());
        renderer
            .draw(&solid(1, 1), DrawParams::clamped(10, 5))
            .unwrap();
        let output = String::from_utf8(renderer.into_inner()).unwrap();

        assert!(output.starts_with("\u{1b}_Ga=T,f=100,C=1,q=2,i=1,p=1,c=10,r=5,z=-1,m=0;"));
        assert!(output.ends_with("\u{1b}\\"));
        assert_eq!(output.matches("\u{1b}_G").count(), 1);
    }

    #[test]
    fn large_frame_is_split_into_chunks() {
        // Noise keeps the png from compressing below one chunk.
        let mut image = solid(128, 128);
        let mut state = 0x2545_f491_u32;
        for byte in image.pixels.iter_mut() {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            *byte = state as u8;
        }

        let mut renderer = KittyRenderer::new(Vec::new());
        renderer.draw(&image, DrawParams::clamped(0, 0)).unwrap();
        let output = String::from_utf8(renderer.into_inner()).unwrap();

        let headers: Vec<_> = output.match_indices("\u{1b}_G").collect();
        assert!(headers.len() > 1);
        assert!(output.contains(",c=1,r=1,"));
        assert!(output.contains("\u{1b}_Gm=1,q=2;"));
        assert!(output.contains("\u{1b}_Gm=0,q=2;"));
    }

    #[test]
    fn empty_frame_is_rejected() {
        let mut renderer = KittyRenderer::new(Vec::new());
        let err = renderer
            .draw(&solid(0, 3), DrawParams::clamped(1, 1))
            .unwrap_err();
        assert!(matches!(err, DrawError::EmptyFrame { width: 0, height: 3 }));
        assert!(renderer.into_inner().is_empty());
    }

    #[test]
    fn png_header_is_written() {
        let bytes = encode_png(&solid(2, 2)).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }
}
