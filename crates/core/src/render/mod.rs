//! Frame rendering: spectrum snapshot + configuration in, draw calls out.

mod canvas;

pub use canvas::{Caption, PixelCanvas};

use crate::{theme::Rgba, SpectrumSnapshot, VisualiserConfig};

/// Bins louder than this (after sensitivity scaling) get a glow pass.
pub const GLOW_THRESHOLD: f32 = 150.0;
pub const MAX_GLOW_BLUR: f32 = 20.0;
/// Share of the surface height a full-scale bin reaches.
pub const BAR_HEIGHT_RATIO: f32 = 0.8;

pub const PLACEHOLDER_TEXT: &str = "Upload an audio file to begin";

const BACKGROUND_TOP: Rgba = Rgba::new(12, 12, 12, 1.0);
const BACKGROUND_BOTTOM: Rgba = Rgba::new(45, 27, 105, 1.0);
const TRAIL_ALPHA: f32 = 0.1;
const PLACEHOLDER_ALPHA: f32 = 0.8;
const PLACEHOLDER_TEXT_COLOR: Rgba = Rgba::new(255, 255, 255, 0.5);
const MAX_PLACEHOLDER_FONT_PX: f32 = 24.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSize {
    pub width: f32,
    pub height: f32,
}

impl SurfaceSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_size(size: SurfaceSize) -> Self {
        Self::new(0.0, 0.0, size.width, size.height)
    }
}

/// Shadow state applied to subsequent fills until cleared.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glow {
    pub color: Rgba,
    pub blur: f32,
}

/// Drawing primitives the renderer relies on.
pub trait Surface {
    fn size(&self) -> SurfaceSize;
    fn fill_rect(&mut self, rect: Rect, color: Rgba);
    fn fill_vertical_gradient(&mut self, rect: Rect, top: Rgba, bottom: Rgba);
    /// Draws `text` centred on `(x, y)`.
    fn fill_text(&mut self, text: &str, x: f32, y: f32, font_px: f32, color: Rgba);
    fn set_glow(&mut self, glow: Option<Glow>);
}

/// Placement of a single spectrum bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    pub rect: Rect,
    /// Sensitivity-scaled magnitude, not clamped to 255.
    pub magnitude: f32,
}

impl Bar {
    pub fn glow(&self) -> Option<f32> {
        (self.magnitude > GLOW_THRESHOLD).then(|| (self.magnitude / 10.0).min(MAX_GLOW_BLUR))
    }
}

/// Computes the bar for `bin`, anchored at the bottom of the surface.
pub fn layout_bar(
    raw: u8,
    bin: usize,
    bin_count: usize,
    sensitivity: f32,
    size: SurfaceSize,
) -> Bar {
    let bar_width = size.width / bin_count.max(1) as f32;
    let magnitude = f32::from(raw) * sensitivity;
    let height = magnitude / 255.0 * size.height * BAR_HEIGHT_RATIO;
    Bar {
        rect: Rect::new(
            bin as f32 * bar_width,
            size.height - height,
            bar_width - 1.0,
            height,
        ),
        magnitude,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub bars: usize,
    pub glowing: usize,
}

/// Stateless renderer for spectrum frames and the idle placeholder.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameRenderer;

impl FrameRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Paints one frame. The background is translucent so earlier frames
    /// fade out over the next few refreshes instead of vanishing.
    pub fn render<S: Surface + ?Sized>(
        &self,
        snapshot: &SpectrumSnapshot,
        config: &VisualiserConfig,
        surface: &mut S,
        now_millis: f64,
    ) -> FrameStats {
        let size = surface.size();
        surface.fill_vertical_gradient(
            Rect::from_size(size),
            BACKGROUND_TOP.with_alpha(TRAIL_ALPHA),
            BACKGROUND_BOTTOM.with_alpha(TRAIL_ALPHA),
        );

        let bin_count = snapshot.bin_count();
        let mut stats = FrameStats::default();
        for (bin, raw) in snapshot.bins().iter().enumerate() {
            let bar = layout_bar(*raw, bin, bin_count, config.sensitivity, size);
            let color = config
                .color_mode
                .color(bar.magnitude, bin, bin_count, now_millis)
                .to_rgba();

            surface.fill_rect(bar.rect, color);
            stats.bars += 1;

            if let Some(blur) = bar.glow() {
                surface.set_glow(Some(Glow { color, blur }));
                surface.fill_rect(bar.rect, color);
                surface.set_glow(None);
                stats.glowing += 1;
            }
        }

        stats
    }

    /// Paints the idle screen shown before a file is loaded and after
    /// playback finishes.
    pub fn draw_placeholder<S: Surface + ?Sized>(&self, surface: &mut S) {
        let size = surface.size();
        surface.set_glow(None);
        surface.fill_vertical_gradient(
            Rect::from_size(size),
            BACKGROUND_TOP.with_alpha(PLACEHOLDER_ALPHA),
            BACKGROUND_BOTTOM.with_alpha(PLACEHOLDER_ALPHA),
        );
        surface.fill_text(
            PLACEHOLDER_TEXT,
            size.width / 2.0,
            size.height / 2.0,
            MAX_PLACEHOLDER_FONT_PX.min(size.width / 25.0),
            PLACEHOLDER_TEXT_COLOR,
        );
    }
}
