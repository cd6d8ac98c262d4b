//! Screenshots: PNG data URLs named after the loaded ROM.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::CaptureError;
use crate::rom::base_name;

/// GBA LCD width in pixels.
pub const SCREEN_WIDTH: u32 = 240;
/// GBA LCD height in pixels.
pub const SCREEN_HEIGHT: u32 = 160;

const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Something the core draws into that can be exported.
pub trait RenderSurface {
    /// Encode the current contents as a `data:image/png;base64,` URL.
    ///
    /// # Errors
    ///
    /// Encoding or surface access failure.
    fn to_png_data_url(&self) -> Result<String, CaptureError>;

    /// Ask the host to show the surface fullscreen. Hosts without the
    /// capability ignore this.
    fn request_fullscreen(&self) {}
}

/// An exported screenshot, ready to offer as a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screenshot {
    pub file_name: String,
    pub data_url: String,
}

/// Download name for a screenshot of `rom_name`.
///
/// The ROM's final extension is swapped for `.png`; with no usable name the
/// file is `screenshot.png`.
#[must_use]
pub fn screenshot_file_name(rom_name: Option<&str>) -> String {
    let stem = rom_name.map(base_name).unwrap_or_default();
    if stem.is_empty() {
        "screenshot.png".to_string()
    } else {
        format!("{stem}.png")
    }
}

/// In-memory ARGB32 frame, for hosts that hand over raw pixels.
#[derive(Debug, Clone)]
pub struct FrameSurface {
    width: u32,
    height: u32,
    pixels: Vec<u32>,
}

impl FrameSurface {
    /// A black frame at GBA resolution.
    #[must_use]
    pub fn blank() -> Self {
        Self {
            width: SCREEN_WIDTH,
            height: SCREEN_HEIGHT,
            pixels: vec![0xFF00_0000; (SCREEN_WIDTH * SCREEN_HEIGHT) as usize],
        }
    }

    /// Wrap an ARGB32 buffer.
    ///
    /// # Errors
    ///
    /// [`CaptureError::FrameSize`] when `pixels` does not hold
    /// `width * height` entries, [`CaptureError::TooLarge`] when that
    /// count does not fit in memory.
    pub fn from_argb(width: u32, height: u32, pixels: Vec<u32>) -> Result<Self, CaptureError> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .ok_or(CaptureError::TooLarge { width, height })?;
        if pixels.len() != expected {
            return Err(CaptureError::FrameSize {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    #[must_use]
    pub fn pixels_mut(&mut self) -> &mut [u32] {
        &mut self.pixels
    }

    /// Encode as PNG bytes.
    ///
    /// # Errors
    ///
    /// PNG encoder failure.
    pub fn encode_png(&self) -> Result<Vec<u8>, CaptureError> {
        let mut png_buf = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut png_buf, self.width, self.height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header()?;

            // ARGB32 → RGBA bytes
            let mut rgba = Vec::with_capacity(self.pixels.len() * 4);
            for &pixel in &self.pixels {
                rgba.push(((pixel >> 16) & 0xFF) as u8);
                rgba.push(((pixel >> 8) & 0xFF) as u8);
                rgba.push((pixel & 0xFF) as u8);
                rgba.push(0xFF);
            }
            writer.write_image_data(&rgba)?;
        }
        Ok(png_buf)
    }
}

impl RenderSurface for FrameSurface {
    fn to_png_data_url(&self) -> Result<String, CaptureError> {
        let png = self.encode_png()?;
        Ok(format!("{PNG_DATA_URL_PREFIX}{}", STANDARD.encode(png)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_from_rom() {
        assert_eq!(screenshot_file_name(Some("zelda.gba")), "zelda.png");
        assert_eq!(screenshot_file_name(Some("a.b.gba")), "a.b.png");
        assert_eq!(screenshot_file_name(Some(".gba")), "screenshot.png");
        assert_eq!(screenshot_file_name(None), "screenshot.png");
    }

    #[test]
    fn data_url_holds_a_png() {
        let mut frame = FrameSurface::blank();
        frame.pixels_mut()[0] = 0xFFFF_0000;
        let url = frame.to_png_data_url().unwrap();
        let b64 = url.strip_prefix(PNG_DATA_URL_PREFIX).expect("png data url");
        let bytes = STANDARD.decode(b64).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn wrong_buffer_size_is_rejected() {
        assert!(matches!(
            FrameSurface::from_argb(2, 2, vec![0; 3]),
            Err(CaptureError::FrameSize {
                expected: 4,
                actual: 3
            })
        ));
    }

    #[test]
    fn oversized_dimensions_are_rejected() {
        // Large enough to overflow a 32-bit pixel count.
        let result = FrameSurface::from_argb(u32::MAX, 2, Vec::new());
        assert!(matches!(
            result,
            Err(CaptureError::TooLarge { .. } | CaptureError::FrameSize { .. })
        ));
        assert!(matches!(
            FrameSurface::from_argb(u32::MAX, u32::MAX, Vec::new()),
            Err(CaptureError::TooLarge { .. } | CaptureError::FrameSize { .. })
        ));
    }
}
