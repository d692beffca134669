//! Color themes used to paint spectrum bars.
//!
//! Every theme is a pure function of the (sensitivity-scaled) magnitude, the
//! bin position and the bin count. `rainbow` additionally drifts with the
//! wall clock, which callers pass in explicitly so that evaluation stays
//! deterministic.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::VisualiserError;

const NEON_PALETTE: [[u8; 3]; 5] = [
    [0xff, 0x00, 0x80],
    [0x00, 0xff, 0x80],
    [0x80, 0x00, 0xff],
    [0xff, 0x80, 0x00],
    [0x00, 0x80, 0xff],
];

/// Straight (non premultiplied) color with a fractional alpha channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 1.0)
    }

    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }
}

/// Closed set of bar color themes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Spectrum,
    Rainbow,
    Fire,
    Ocean,
    Neon,
    Monochrome,
}

impl ColorMode {
    pub const ALL: [ColorMode; 6] = [
        ColorMode::Spectrum,
        ColorMode::Rainbow,
        ColorMode::Fire,
        ColorMode::Ocean,
        ColorMode::Neon,
        ColorMode::Monochrome,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ColorMode::Spectrum => "spectrum",
            ColorMode::Rainbow => "rainbow",
            ColorMode::Fire => "fire",
            ColorMode::Ocean => "ocean",
            ColorMode::Neon => "neon",
            ColorMode::Monochrome => "monochrome",
        }
    }

    /// Evaluates the theme for a single bar. `now_millis` is only consulted
    /// by [`ColorMode::Rainbow`].
    pub fn color(
        self,
        magnitude: f32,
        bin: usize,
        bin_count: usize,
        now_millis: f64,
    ) -> ThemeColor {
        let magnitude = f64::from(magnitude);
        match self {
            ColorMode::Spectrum => spectrum(magnitude, bin, bin_count),
            ColorMode::Rainbow => rainbow(magnitude, bin, bin_count, now_millis),
            ColorMode::Fire => fire(magnitude),
            ColorMode::Ocean => ocean(magnitude),
            ColorMode::Neon => neon(magnitude, bin, bin_count),
            ColorMode::Monochrome => monochrome(magnitude),
        }
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ColorMode {
    type Err = VisualiserError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ColorMode::ALL
            .into_iter()
            .find(|mode| mode.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| VisualiserError::invalid_config(format!("unknown color mode `{s}`")))
    }
}

/// Color produced by a theme, kept in the form the theme computed it in.
///
/// Channel values are not clamped: loud bins combined with a high
/// sensitivity can push `rgb` channels above 255 or lightness above 100%.
/// [`ThemeColor::to_rgba`] clamps when converting for a surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThemeColor {
    /// Hue in degrees, saturation and lightness in percent.
    Hsl {
        hue: f64,
        saturation: f64,
        lightness: f64,
    },
    Rgb { r: f64, g: f64, b: f64 },
    /// Fixed palette entry with an alpha byte appended.
    HexAlpha { base: [u8; 3], alpha: u8 },
}

impl ThemeColor {
    /// CSS color string, as a browser canvas would receive it.
    pub fn to_css(&self) -> String {
        match *self {
            ThemeColor::Hsl {
                hue,
                saturation,
                lightness,
            } => format!("hsl({hue}, {saturation}%, {lightness}%)"),
            ThemeColor::Rgb { r, g, b } => format!("rgb({r}, {g}, {b})"),
            ThemeColor::HexAlpha { base, alpha } => format!(
                "#{:02x}{:02x}{:02x}{:02x}",
                base[0], base[1], base[2], alpha
            ),
        }
    }

    pub fn to_rgba(&self) -> Rgba {
        match *self {
            ThemeColor::Hsl {
                hue,
                saturation,
                lightness,
            } => hsl_to_rgba(hue, saturation / 100.0, lightness / 100.0),
            ThemeColor::Rgb { r, g, b } => {
                Rgba::opaque(clamp_channel(r), clamp_channel(g), clamp_channel(b))
            }
            ThemeColor::HexAlpha { base, alpha } => {
                Rgba::new(base[0], base[1], base[2], f32::from(alpha) / 255.0)
            }
        }
    }
}

fn position(bin: usize, bin_count: usize) -> f64 {
    if bin_count == 0 {
        return 0.0;
    }
    bin as f64 / bin_count as f64
}

fn spectrum(magnitude: f64, bin: usize, bin_count: usize) -> ThemeColor {
    ThemeColor::Hsl {
        hue: position(bin, bin_count) * 360.0,
        saturation: 100.0,
        lightness: 50.0 + magnitude / 255.0 * 25.0,
    }
}

fn rainbow(magnitude: f64, bin: usize, bin_count: usize, now_millis: f64) -> ThemeColor {
    let drift = (now_millis * 0.1).rem_euclid(360.0);
    ThemeColor::Hsl {
        hue: (position(bin, bin_count) * 360.0 + drift).rem_euclid(360.0),
        saturation: 80.0,
        lightness: 40.0 + magnitude / 255.0 * 30.0,
    }
}

fn fire(magnitude: f64) -> ThemeColor {
    ThemeColor::Rgb {
        r: 255.0,
        g: (magnitude * 0.7).min(255.0),
        b: 0.0,
    }
}

fn ocean(magnitude: f64) -> ThemeColor {
    ThemeColor::Rgb {
        r: 0.0,
        g: 100.0 + magnitude * 0.5,
        b: 150.0 + magnitude * 0.4,
    }
}

fn neon(magnitude: f64, bin: usize, bin_count: usize) -> ThemeColor {
    let slot = (position(bin, bin_count) * NEON_PALETTE.len() as f64).floor() as usize;
    let base = NEON_PALETTE[slot.min(NEON_PALETTE.len() - 1)];
    let alpha = (magnitude / 255.0 * 255.0).floor().clamp(0.0, 255.0) as u8;
    ThemeColor::HexAlpha { base, alpha }
}

fn monochrome(magnitude: f64) -> ThemeColor {
    ThemeColor::Rgb {
        r: magnitude,
        g: magnitude,
        b: magnitude,
    }
}

fn clamp_channel(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.clamp(0.0, 255.0) as u8
}

fn hsl_to_rgba(hue: f64, saturation: f64, lightness: f64) -> Rgba {
    let s = saturation.clamp(0.0, 1.0);
    let l = lightness.clamp(0.0, 1.0);
    let h = hue.rem_euclid(360.0) / 30.0;
    let a = s * l.min(1.0 - l);
    let channel = |n: f64| {
        let k = (n + h).rem_euclid(12.0);
        let value = l - a * (k - 3.0).min(9.0 - k).clamp(-1.0, 1.0);
        clamp_channel((value * 255.0).round())
    };
    Rgba::opaque(channel(0.0), channel(8.0), channel(4.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lightness(color: ThemeColor) -> f64 {
        match color {
            ThemeColor::Hsl { lightness, .. } => lightness,
            other => panic!("expected hsl color, got {other:?}"),
        }
    }

    #[test]
    fn spectrum_lightness_spans_fifty_to_seventy_five_percent() {
        for bin in [0, 17, 127] {
            assert_eq!(lightness(ColorMode::Spectrum.color(0.0, bin, 128, 0.0)), 50.0);
            assert_eq!(lightness(ColorMode::Spectrum.color(255.0, bin, 128, 0.0)), 75.0);
        }
        let color = ColorMode::Spectrum.color(0.0, 64, 128, 0.0);
        assert_eq!(color.to_css(), "hsl(180, 100%, 50%)");
    }

    #[test]
    fn fire_caps_green_channel() {
        assert_eq!(ColorMode::Fire.color(0.0, 0, 8, 0.0).to_rgba(), Rgba::opaque(255, 0, 0));
        assert_eq!(
            ColorMode::Fire.color(255.0, 0, 8, 0.0).to_rgba(),
            Rgba::opaque(255, 178, 0)
        );
        assert_eq!(
            ColorMode::Fire.color(1000.0, 0, 8, 0.0).to_css(),
            "rgb(255, 255, 0)"
        );
    }

    #[test]
    fn ocean_is_unclamped_until_converted() {
        let color = ColorMode::Ocean.color(400.0, 3, 8, 0.0);
        assert_eq!(color.to_css(), "rgb(0, 300, 310)");
        assert_eq!(color.to_rgba(), Rgba::opaque(0, 255, 255));
    }

    #[test]
    fn neon_picks_palette_slot_and_alpha_byte() {
        assert_eq!(ColorMode::Neon.color(255.0, 0, 10, 0.0).to_css(), "#ff0080ff");
        assert_eq!(ColorMode::Neon.color(16.0, 9, 10, 0.0).to_css(), "#0080ff10");
        assert_eq!(ColorMode::Neon.color(0.0, 4, 10, 0.0).to_css(), "#8000ff00");
        let rgba = ColorMode::Neon.color(510.0, 2, 10, 0.0).to_rgba();
        assert_eq!(rgba, Rgba::new(0x00, 0xff, 0x80, 1.0));
    }

    #[test]
    fn monochrome_uses_magnitude_for_every_channel() {
        assert_eq!(
            ColorMode::Monochrome.color(77.0, 1, 2, 0.0).to_rgba(),
            Rgba::opaque(77, 77, 77)
        );
    }

    #[test]
    fn rainbow_drifts_with_time_but_is_repeatable() {
        let a = ColorMode::Rainbow.color(100.0, 8, 16, 1_000.0);
        let b = ColorMode::Rainbow.color(100.0, 8, 16, 1_000.0);
        assert_eq!(a, b);
        match a {
            ThemeColor::Hsl { hue, saturation, .. } => {
                assert!((hue - 280.0).abs() < 1e-9);
                assert_eq!(saturation, 80.0);
            }
            other => panic!("unexpected {other:?}"),
        }
        let later = ColorMode::Rainbow.color(100.0, 8, 16, 2_000.0);
        assert_ne!(a, later);
    }

    #[test]
    fn themes_are_pure() {
        for mode in ColorMode::ALL {
            for magnitude in [0.0, 12.5, 150.0, 255.0] {
                assert_eq!(
                    mode.color(magnitude, 5, 32, 42.0),
                    mode.color(magnitude, 5, 32, 42.0)
                );
            }
        }
    }

    #[test]
    fn hsl_conversion_matches_primaries() {
        assert_eq!(hsl_to_rgba(0.0, 1.0, 0.5), Rgba::opaque(255, 0, 0));
        assert_eq!(hsl_to_rgba(120.0, 1.0, 0.5), Rgba::opaque(0, 255, 0));
        assert_eq!(hsl_to_rgba(240.0, 1.0, 0.5), Rgba::opaque(0, 0, 255));
        assert_eq!(hsl_to_rgba(42.0, 1.0, 1.2), Rgba::opaque(255, 255, 255));
    }

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("Neon".parse::<ColorMode>().unwrap(), ColorMode::Neon);
        assert!("plaid".parse::<ColorMode>().is_err());
    }
}
