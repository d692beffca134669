//! Render loop controller: owns the playback session, the configuration and
//! the frame request chain, and reacts to control events.

use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::{
    AnalysisParams, AudioDecoder, AudioSession, ColorMode, FrameRenderer, FrameRequest,
    FrameScheduler, FrameStats, FrameTick, PlaybackClock, PlaybackGraph, PlaybackStatus, Result,
    SpectrumSnapshot, Surface, VisualiserConfig, VisualiserError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Suspended,
    Ended,
}

/// Typed events emitted by the user interface.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlEvent {
    LoadFile { name: String, bytes: Vec<u8> },
    TogglePlayback,
    SetFftSize(u32),
    SetSmoothing(f32),
    SetColorMode(ColorMode),
    SetSensitivity(f32),
    ResetDefaults,
    ToggleFullscreen,
    /// The surface changed size.
    Resized,
}

/// Title and detail line shown next to the visualisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioInfo {
    pub title: String,
    pub detail: String,
}

impl AudioInfo {
    fn new(title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            detail: detail.into(),
        }
    }
}

/// What a refresh callback ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// No frame of this controller was due, or sampling failed.
    Skipped,
    Rendered(FrameStats),
    /// Playback finished on this frame; the placeholder was drawn.
    Ended,
}

/// Drives sampling and rendering once per display refresh.
pub struct Visualiser<D: AudioDecoder, G: PlaybackGraph> {
    config: VisualiserConfig,
    decoder: D,
    graph: G,
    session: Option<G::Session>,
    renderer: FrameRenderer,
    scheduler: FrameScheduler,
    pending: Option<FrameRequest>,
    clock: PlaybackClock,
    state: LoopState,
    info: Option<AudioInfo>,
    fullscreen: bool,
}

impl<D: AudioDecoder, G: PlaybackGraph> Visualiser<D, G> {
    pub fn new(config: VisualiserConfig, decoder: D, graph: G) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            decoder,
            graph,
            session: None,
            renderer: FrameRenderer::new(),
            scheduler: FrameScheduler::new(),
            pending: None,
            clock: PlaybackClock::default(),
            state: LoopState::Idle,
            info: None,
            fullscreen: false,
        })
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn config(&self) -> &VisualiserConfig {
        &self.config
    }

    pub fn audio_info(&self) -> Option<&AudioInfo> {
        self.info.as_ref()
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&G::Session> {
        self.session.as_ref()
    }

    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    /// Playback time covered by rendered frames of the current session.
    pub fn position(&self) -> Duration {
        self.clock.position()
    }

    /// Paints the idle screen; used before the first file is loaded.
    pub fn draw_idle<S: Surface + ?Sized>(&self, surface: &mut S) {
        self.renderer.draw_placeholder(surface);
    }

    pub fn handle_event<S: Surface + ?Sized>(
        &mut self,
        event: ControlEvent,
        surface: &mut S,
    ) -> Result<()> {
        match event {
            ControlEvent::LoadFile { name, bytes } => self.load_file(&name, &bytes, surface),
            ControlEvent::TogglePlayback => self.toggle_playback(),
            ControlEvent::SetFftSize(fft_size) => {
                let result = self.config.set_fft_size(fft_size);
                self.apply_config_change(result)
            }
            ControlEvent::SetSmoothing(smoothing) => {
                let result = self.config.set_smoothing(smoothing);
                self.apply_config_change(result)
            }
            ControlEvent::SetColorMode(mode) => {
                self.config.color_mode = mode;
                Ok(())
            }
            ControlEvent::SetSensitivity(sensitivity) => {
                let result = self.config.set_sensitivity(sensitivity);
                self.apply_config_change(result)
            }
            ControlEvent::ResetDefaults => self.reset_defaults(),
            ControlEvent::ToggleFullscreen => {
                self.fullscreen = !self.fullscreen;
                debug!(fullscreen = self.fullscreen, "toggled fullscreen");
                Ok(())
            }
            ControlEvent::Resized => {
                if self.state != LoopState::Running {
                    self.renderer.draw_placeholder(surface);
                }
                Ok(())
            }
        }
    }

    /// Tears down any previous session and starts playing `bytes`.
    ///
    /// Decode failures leave the controller idle with the placeholder drawn
    /// and are returned so the caller can report them.
    pub fn load_file<S: Surface + ?Sized>(
        &mut self,
        name: &str,
        bytes: &[u8],
        surface: &mut S,
    ) -> Result<()> {
        self.stop_loop();
        self.release_session();
        self.clock.reset();
        self.state = LoopState::Idle;
        self.info = Some(AudioInfo::new(name, "Loading..."));

        match self.open_session(bytes) {
            Ok(session) => {
                let duration = session.duration();
                self.session = Some(session);
                self.info = Some(AudioInfo::new(
                    name,
                    format!("Duration: {}", format_duration(duration)),
                ));
                self.state = LoopState::Running;
                self.schedule_frame();
                info!(file = name, ?duration, "playback started");
                Ok(())
            }
            Err(err) => {
                error!(file = name, error = %err, "failed to load audio file");
                self.info = Some(AudioInfo::new(
                    "Error loading file",
                    "Please try a different one.",
                ));
                self.renderer.draw_placeholder(surface);
                Err(err)
            }
        }
    }

    /// Pauses or resumes playback. Without a session this does nothing.
    pub fn toggle_playback(&mut self) -> Result<()> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };

        match self.state {
            LoopState::Running => {
                session.suspend()?;
                self.stop_loop();
                self.clock.pause();
                self.state = LoopState::Suspended;
                debug!("playback suspended");
            }
            LoopState::Suspended => {
                session.resume()?;
                self.state = LoopState::Running;
                self.schedule_frame();
                debug!("playback resumed");
            }
            LoopState::Idle | LoopState::Ended => {}
        }
        Ok(())
    }

    pub fn reset_defaults(&mut self) -> Result<()> {
        self.config = VisualiserConfig::default();
        self.apply_analysis_params()
    }

    /// Reads one snapshot from the active session.
    pub fn sample(&mut self) -> Result<SpectrumSnapshot> {
        self.session
            .as_mut()
            .ok_or(VisualiserError::SessionInactive)?
            .sample()
    }

    /// Runs every frame callback due on this display refresh.
    pub fn on_refresh<S: Surface + ?Sized>(
        &mut self,
        tick: FrameTick,
        surface: &mut S,
    ) -> FrameOutcome {
        let due = self.scheduler.take_due();
        let ours = self.pending.take().filter(|request| due.contains(request));
        if ours.is_none() {
            return FrameOutcome::Skipped;
        }

        // Keep the chain alive before doing any work for this frame.
        self.schedule_frame();

        let elapsed = self.clock.advance(tick.timestamp);
        let status = match self.session.as_mut() {
            Some(session) => session.advance(elapsed),
            None => {
                self.stop_loop();
                return FrameOutcome::Skipped;
            }
        };

        if status == PlaybackStatus::Ended {
            self.finish_playback(surface);
            return FrameOutcome::Ended;
        }

        match self.sample() {
            Ok(snapshot) => FrameOutcome::Rendered(self.renderer.render(
                &snapshot,
                &self.config,
                surface,
                tick.wall_clock_ms,
            )),
            Err(err) => {
                warn!(error = %err, "skipping frame, spectrum unavailable");
                FrameOutcome::Skipped
            }
        }
    }

    fn open_session(&mut self, bytes: &[u8]) -> Result<G::Session> {
        let buffer = self.decoder.decode(bytes)?;
        let mut session = self
            .graph
            .create_session(buffer, AnalysisParams::from_config(&self.config))?;
        session.start()?;
        Ok(session)
    }

    fn finish_playback<S: Surface + ?Sized>(&mut self, surface: &mut S) {
        self.stop_loop();
        self.release_session();
        self.state = LoopState::Ended;
        self.info = Some(AudioInfo::new(
            "Playback finished",
            "Upload another file to continue.",
        ));
        self.renderer.draw_placeholder(surface);
        info!("playback finished");
    }

    fn apply_config_change(&mut self, result: Result<()>) -> Result<()> {
        if let Err(err) = result {
            warn!(error = %err, "rejected configuration change");
            return Err(err);
        }
        self.apply_analysis_params()
    }

    fn apply_analysis_params(&mut self) -> Result<()> {
        let params = AnalysisParams::from_config(&self.config);
        match self.session.as_mut() {
            Some(session) if session.analysis_params() != params => {
                session.set_analysis_params(params)
            }
            _ => Ok(()),
        }
    }

    fn schedule_frame(&mut self) {
        self.stop_loop();
        self.pending = Some(self.scheduler.request_frame());
    }

    fn stop_loop(&mut self) {
        if let Some(request) = self.pending.take() {
            self.scheduler.cancel(request);
        }
    }

    fn release_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(err) = session.close() {
                error!(error = %err, "failed to release previous playback session");
            }
        }
    }
}

impl<D: AudioDecoder, G: PlaybackGraph> std::fmt::Debug for Visualiser<D, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Visualiser")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("has_session", &self.session.is_some())
            .field("pending", &self.pending)
            .field("info", &self.info)
            .finish()
    }
}

/// Formats a duration as `m:ss`.
pub fn format_duration(duration: Duration) -> String {
    let seconds = duration.as_secs();
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
