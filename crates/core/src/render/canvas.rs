use std::path::Path;

use image::{Rgb, RgbImage};

use super::{Glow, Rect, Surface, SurfaceSize};
use crate::{theme::Rgba, Result};

const GLOW_STRENGTH: f32 = 0.35;

/// Text drawn onto the canvas. Glyphs are not rasterised; the last caption is
/// kept so callers can present it next to the pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Caption {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub font_px: f32,
    pub color: Rgba,
}

/// Software RGB raster implementing [`Surface`] with source-over blending.
#[derive(Debug, Clone)]
pub struct PixelCanvas {
    width: u32,
    height: u32,
    pixels: Vec<[f32; 3]>,
    glow: Option<Glow>,
    caption: Option<Caption>,
}

impl PixelCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![[0.0; 3]; width as usize * height as usize],
            glow: None,
            caption: None,
        }
    }

    pub fn caption(&self) -> Option<&Caption> {
        self.caption.as_ref()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let pixel = self.pixels[(y * self.width + x) as usize];
        Some(pixel.map(|channel| channel.round().clamp(0.0, 255.0) as u8))
    }

    /// Copies the raster into an 8-bit RGB image.
    pub fn to_image(&self) -> RgbImage {
        RgbImage::from_fn(self.width, self.height, |x, y| {
            let pixel = self.pixels[(y * self.width + x) as usize];
            Rgb(pixel.map(|channel| channel.round().clamp(0.0, 255.0) as u8))
        })
    }

    /// Saves the raster; the image format follows the file extension.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.to_image().save(path)?;
        Ok(())
    }

    /// Clipped pixel span covered by `rect`, as `(x0, x1, y0, y1)`.
    fn span(&self, rect: Rect) -> Option<(u32, u32, u32, u32)> {
        let clip = |a: f32, b: f32, limit: u32| {
            let lo = a.min(b).round().max(0.0);
            let hi = a.max(b).round().min(limit as f32);
            (lo < hi).then_some((lo as u32, hi as u32))
        };
        let (x0, x1) = clip(rect.x, rect.x + rect.width, self.width)?;
        let (y0, y1) = clip(rect.y, rect.y + rect.height, self.height)?;
        Some((x0, x1, y0, y1))
    }

    fn blend_row(&mut self, y: u32, x0: u32, x1: u32, color: Rgba) {
        let alpha = color.a.clamp(0.0, 1.0);
        if alpha <= 0.0 {
            return;
        }
        let source = [f32::from(color.r), f32::from(color.g), f32::from(color.b)];
        let row = (y * self.width) as usize;
        for pixel in &mut self.pixels[row + x0 as usize..row + x1 as usize] {
            for (channel, value) in pixel.iter_mut().zip(source) {
                *channel = value * alpha + *channel * (1.0 - alpha);
            }
        }
    }

    fn blend_rect(&mut self, rect: Rect, color: Rgba) {
        if let Some((x0, x1, y0, y1)) = self.span(rect) {
            for y in y0..y1 {
                self.blend_row(y, x0, x1, color);
            }
        }
    }
}

impl Surface for PixelCanvas {
    fn size(&self) -> SurfaceSize {
        SurfaceSize::new(self.width as f32, self.height as f32)
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgba) {
        if let Some(glow) = self.glow {
            let halo = Rect::new(
                rect.x - glow.blur,
                rect.y - glow.blur,
                rect.width + 2.0 * glow.blur,
                rect.height + 2.0 * glow.blur,
            );
            let strength = glow.color.a * GLOW_STRENGTH;
            self.blend_rect(halo, glow.color.with_alpha(strength));
        }
        self.blend_rect(rect, color);
    }

    fn fill_vertical_gradient(&mut self, rect: Rect, top: Rgba, bottom: Rgba) {
        let Some((x0, x1, y0, y1)) = self.span(rect) else {
            return;
        };
        let height = rect.height.abs().max(f32::EPSILON);
        let top_edge = rect.y.min(rect.y + rect.height);
        for y in y0..y1 {
            let t = ((y as f32 + 0.5 - top_edge) / height).clamp(0.0, 1.0);
            self.blend_row(y, x0, x1, lerp(top, bottom, t));
        }
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32, font_px: f32, color: Rgba) {
        self.caption = Some(Caption {
            text: text.to_string(),
            x,
            y,
            font_px,
            color,
        });
    }

    fn set_glow(&mut self, glow: Option<Glow>) {
        self.glow = glow;
    }
}

fn lerp(from: Rgba, to: Rgba, t: f32) -> Rgba {
    let channel = |a: u8, b: u8| (f32::from(a) + (f32::from(b) - f32::from(a)) * t).round() as u8;
    Rgba::new(
        channel(from.r, to.r),
        channel(from.g, to.g),
        channel(from.b, to.b),
        from.a + (to.a - from.a) * t,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opaque_fill_replaces_pixels_inside_rect_only() {
        let mut canvas = PixelCanvas::new(4, 4);
        canvas.fill_rect(Rect::new(1.0, 1.0, 2.0, 2.0), Rgba::opaque(255, 0, 0));
        assert_eq!(canvas.pixel(1, 1), Some([255, 0, 0]));
        assert_eq!(canvas.pixel(2, 2), Some([255, 0, 0]));
        assert_eq!(canvas.pixel(0, 0), Some([0, 0, 0]));
        assert_eq!(canvas.pixel(3, 3), Some([0, 0, 0]));
        assert_eq!(canvas.pixel(4, 0), None);
    }

    #[test]
    fn translucent_fill_blends_with_previous_frame() {
        let mut canvas = PixelCanvas::new(1, 1);
        canvas.fill_rect(Rect::new(0.0, 0.0, 1.0, 1.0), Rgba::opaque(200, 200, 200));
        canvas.fill_rect(Rect::new(0.0, 0.0, 1.0, 1.0), Rgba::new(0, 0, 0, 0.5));
        assert_eq!(canvas.pixel(0, 0), Some([100, 100, 100]));
    }

    #[test]
    fn out_of_bounds_and_negative_sizes_are_clipped() {
        let mut canvas = PixelCanvas::new(4, 4);
        canvas.fill_rect(Rect::new(3.0, 4.0, -2.0, -10.0), Rgba::opaque(0, 255, 0));
        assert_eq!(canvas.pixel(1, 0), Some([0, 255, 0]));
        assert_eq!(canvas.pixel(3, 0), Some([0, 0, 0]));
        canvas.fill_rect(Rect::new(10.0, 10.0, 5.0, 5.0), Rgba::opaque(0, 0, 255));
    }

    #[test]
    fn glow_spreads_beyond_the_rect() {
        let mut canvas = PixelCanvas::new(9, 9);
        canvas.set_glow(Some(Glow {
            color: Rgba::opaque(255, 255, 255),
            blur: 2.0,
        }));
        canvas.fill_rect(Rect::new(4.0, 4.0, 1.0, 1.0), Rgba::opaque(255, 0, 0));
        canvas.set_glow(None);

        assert_eq!(canvas.pixel(4, 4), Some([255, 0, 0]));
        let [r, g, b] = canvas.pixel(2, 2).unwrap();
        assert!(r > 0 && r == g && g == b);
        assert_eq!(canvas.pixel(0, 0), Some([0, 0, 0]));
    }

    #[test]
    fn gradient_interpolates_top_to_bottom() {
        let mut canvas = PixelCanvas::new(1, 10);
        canvas.fill_vertical_gradient(
            Rect::new(0.0, 0.0, 1.0, 10.0),
            Rgba::opaque(0, 0, 0),
            Rgba::opaque(200, 100, 0),
        );
        let top = canvas.pixel(0, 0).unwrap();
        let bottom = canvas.pixel(0, 9).unwrap();
        assert!(top[0] < 20);
        assert!(bottom[0] > 180);
        assert!(bottom[1] > 90);
    }

    #[test]
    fn exports_pixels_and_keeps_caption() {
        let mut canvas = PixelCanvas::new(2, 1);
        canvas.fill_rect(Rect::new(1.0, 0.0, 1.0, 1.0), Rgba::opaque(10, 20, 30));
        canvas.fill_text("hi", 1.0, 0.5, 12.0, Rgba::opaque(255, 255, 255));
        assert_eq!(canvas.caption().map(|c| c.text.as_str()), Some("hi"));

        let image = canvas.to_image();
        assert_eq!(image.dimensions(), (2, 1));
        assert_eq!(image.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(image.get_pixel(1, 0), &Rgb([10, 20, 30]));
    }

    #[test]
    fn saves_png_that_reads_back() {
        let mut canvas = PixelCanvas::new(3, 2);
        canvas.fill_rect(Rect::new(0.0, 0.0, 3.0, 2.0), Rgba::opaque(200, 100, 50));
        let path = std::env::temp_dir().join(format!(
            "spectrum-visualiser-canvas-{}.png",
            std::process::id()
        ));

        canvas.save(&path).unwrap();
        let decoded = image::open(&path).unwrap().to_rgb8();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(decoded.dimensions(), (3, 2));
        assert_eq!(decoded.get_pixel(2, 1), &Rgb([200, 100, 50]));
    }
}
