//! Core library for the Spectrum Visualiser application.
//!
//! The pipeline runs once per display refresh: the active playback session
//! feeds its analysis node, the node yields a byte spectrum, and the frame
//! renderer turns that spectrum into themed bars on a drawing surface. The
//! [`Visualiser`] controller owns the session, the configuration and the
//! chain of frame requests, and reacts to typed control events.

pub mod analysis;
pub mod audio;
pub mod config;
pub mod controller;
pub mod error;
pub mod render;
pub mod theme;
pub mod timeline;

pub use analysis::{AnalysisParams, SpectrumAnalyser, SpectrumSnapshot};
pub use audio::{
    AudioDecoder, AudioSession, ClockedGraph, ClockedSession, DecodedBuffer, PlaybackGraph,
    PlaybackStatus, SessionState, WavDecoder,
};
pub use config::VisualiserConfig;
pub use controller::{AudioInfo, ControlEvent, FrameOutcome, LoopState, Visualiser};
pub use error::{Result, VisualiserError};
pub use render::{FrameRenderer, FrameStats, Glow, PixelCanvas, Rect, Surface, SurfaceSize};
pub use theme::{ColorMode, Rgba, ThemeColor};
pub use timeline::{
    FixedRateRefresh, FrameRequest, FrameScheduler, FrameTick, PlaybackClock, RefreshSignal,
};
