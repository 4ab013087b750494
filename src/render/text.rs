use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fontdue::{Font, FontSettings};

use super::scene::Label;
use crate::view::guides::LabelSide;

/// Fonts tried in order when none is configured
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSansMono.ttf",
    "/usr/share/fonts/TTF/DejaVuSansMono.ttf",
    "/usr/share/fonts/dejavu/DejaVuSansMono.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationMono-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationMono-Regular.ttf",
    "/usr/share/fonts/noto/NotoSansMono-Regular.ttf",
    "/System/Library/Fonts/Menlo.ttc",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\consola.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

pub struct TextOverlay {
    font: Font,
    font_size: f32,
}

impl TextOverlay {
    pub fn from_bytes(data: &[u8], font_size: f32) -> Result<Self> {
        let font = Font::from_bytes(data, FontSettings::default())
            .map_err(|e| anyhow::anyhow!("Failed to parse font: {}", e))?;
        Ok(Self { font, font_size })
    }

    pub fn from_file(path: &Path, font_size: f32) -> Result<Self> {
        let data = std::fs::read(path)
            .with_context(|| format!("Failed to read font {}", path.display()))?;
        Self::from_bytes(&data, font_size)
    }

    /// The configured font, or the first usable system font. `None` means
    /// labels are not drawn.
    pub fn load(configured: Option<&Path>, font_size: f32) -> Option<Self> {
        if let Some(path) = configured {
            match Self::from_file(path, font_size) {
                Ok(overlay) => return Some(overlay),
                Err(e) => log::warn!("{:#}, falling back to system fonts", e),
            }
        }

        for candidate in FONT_CANDIDATES.iter().map(PathBuf::from) {
            if !candidate.exists() {
                continue;
            }
            match Self::from_file(&candidate, font_size) {
                Ok(overlay) => {
                    log::info!("Using font {}", candidate.display());
                    return Some(overlay);
                }
                Err(e) => log::debug!("{:#}", e),
            }
        }

        log::warn!("No usable font found, frequency labels disabled (use --font)");
        None
    }

    /// Draw every label into a straight-alpha RGBA buffer.
    pub fn draw_labels(&self, pixels: &mut [u8], width: u32, height: u32, labels: &[Label]) {
        for label in labels {
            let text_width = self.measure_width(&label.text) as f32;
            let [x, y] = label_origin(label, text_width, self.font_size);
            self.composite(pixels, width, height, &label.text, x, y, label.color);
        }
    }

    /// Composite text onto an RGBA pixel buffer with its top-left corner
    /// at `(x, y)`.
    #[allow(clippy::too_many_arguments)]
    pub fn composite(
        &self,
        pixels: &mut [u8],
        width: u32,
        height: u32,
        text: &str,
        x: i32,
        y: i32,
        color: [u8; 4],
    ) {
        let mut cursor_x = x;
        for ch in text.chars() {
            let (metrics, bitmap) = self.font.rasterize(ch, self.font_size);
            let glyph_y = y + self.font_size as i32 - metrics.height as i32 - metrics.ymin;

            for gy in 0..metrics.height {
                for gx in 0..metrics.width {
                    let coverage = bitmap[gy * metrics.width + gx];
                    if coverage == 0 {
                        continue;
                    }

                    let px = cursor_x + gx as i32;
                    let py = glyph_y + gy as i32;
                    if px < 0 || py < 0 || px >= width as i32 || py >= height as i32 {
                        continue;
                    }

                    let idx = ((py as u32 * width + px as u32) * 4) as usize;
                    if idx + 3 >= pixels.len() {
                        continue;
                    }
                    blend_over(&mut pixels[idx..idx + 4], color, coverage);
                }
            }

            cursor_x += metrics.advance_width.round() as i32;
        }
    }

    /// Measure the width of rendered text in pixels.
    pub fn measure_width(&self, text: &str) -> u32 {
        let width: f32 = text
            .chars()
            .map(|ch| self.font.metrics(ch, self.font_size).advance_width)
            .sum();
        width.ceil() as u32
    }
}

/// Top-left pixel of a label's text box. Left-side labels end at the anchor.
fn label_origin(label: &Label, text_width: f32, font_size: f32) -> [i32; 2] {
    let x = match label.side {
        LabelSide::Right => label.pixel[0],
        LabelSide::Left => label.pixel[0] - text_width,
    };
    let y = label.pixel[1] - font_size / 2.0;
    [x.round() as i32, y.max(0.0).round() as i32]
}

/// Porter-Duff "over" onto a straight-alpha pixel
fn blend_over(dst: &mut [u8], color: [u8; 4], coverage: u8) {
    let src_a = coverage as f32 / 255.0 * (color[3] as f32 / 255.0);
    let dst_a = dst[3] as f32 / 255.0;
    let out_a = src_a + dst_a * (1.0 - src_a);
    if out_a <= 0.0 {
        return;
    }
    for c in 0..3 {
        let blended =
            (color[c] as f32 * src_a + dst[c] as f32 * dst_a * (1.0 - src_a)) / out_a;
        dst[c] = blended.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round() as u8;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(side: LabelSide) -> Label {
        Label {
            text: "440.0 Hz".into(),
            pixel: [100.0, 50.0],
            side,
            color: [255; 4],
        }
    }

    #[test]
    fn test_label_origin_sides() {
        assert_eq!(label_origin(&label(LabelSide::Right), 60.0, 14.0), [100, 43]);
        assert_eq!(label_origin(&label(LabelSide::Left), 60.0, 14.0), [40, 43]);
    }

    #[test]
    fn test_label_origin_clamps_top() {
        let mut l = label(LabelSide::Right);
        l.pixel[1] = 2.0;
        assert_eq!(label_origin(&l, 10.0, 14.0)[1], 0);
    }

    #[test]
    fn test_blend_over_transparent() {
        let mut px = [0u8; 4];
        blend_over(&mut px, [200, 100, 50, 255], 255);
        assert_eq!(px, [200, 100, 50, 255]);

        let mut px = [0u8; 4];
        blend_over(&mut px, [200, 100, 50, 255], 0);
        assert_eq!(px, [0, 0, 0, 0]);
    }

    #[test]
    fn test_blend_over_half_coverage() {
        let mut px = [0, 0, 0, 255];
        blend_over(&mut px, [255, 255, 255, 255], 128);
        assert_eq!(px[3], 255);
        assert!((127..=129).contains(&px[0]));
    }

    #[test]
    fn test_missing_font_file_is_an_error() {
        assert!(TextOverlay::from_file(Path::new("/nonexistent/font.ttf"), 14.0).is_err());
        assert!(TextOverlay::from_bytes(b"not a font", 14.0).is_err());
    }
}
