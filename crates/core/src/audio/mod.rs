//! Audio collaborators: decoding raw bytes and playing a decoded buffer
//! through an analysis node.

use std::{io::Cursor, time::Duration};

use tracing::debug;

use crate::{AnalysisParams, Result, SpectrumAnalyser, SpectrumSnapshot, VisualiserError};

/// Decoded audio, down-mixed to mono.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBuffer {
    sample_rate: u32,
    channels: u16,
    samples: Vec<f32>,
}

impl DecodedBuffer {
    pub fn new(sample_rate: u32, channels: u16, samples: Vec<f32>) -> Result<Self> {
        if sample_rate == 0 {
            return Err(VisualiserError::Decode("sample rate must be non-zero".into()));
        }
        Ok(Self {
            sample_rate,
            channels,
            samples,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Channel count of the source before down-mixing.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / f64::from(self.sample_rate))
    }
}

/// Turns raw file bytes into a playable buffer.
pub trait AudioDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedBuffer>;
}

/// RIFF/WAVE decoder supporting integer and float PCM.
#[derive(Debug, Default, Clone, Copy)]
pub struct WavDecoder;

impl AudioDecoder for WavDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedBuffer> {
        let reader = hound::WavReader::new(Cursor::new(bytes))?;
        let spec = reader.spec();
        if spec.channels == 0 {
            return Err(VisualiserError::Decode("stream declares no channels".into()));
        }

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<std::result::Result<_, _>>()?,
            hound::SampleFormat::Int => {
                let scale = int_sample_scale(spec.bits_per_sample)?;
                reader
                    .into_samples::<i32>()
                    .map(|sample| sample.map(|value| value as f32 * scale))
                    .collect::<std::result::Result<_, _>>()?
            }
        };

        if interleaved.is_empty() {
            return Err(VisualiserError::Decode("stream contains no audio frames".into()));
        }

        let channels = usize::from(spec.channels);
        let mono = interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();

        DecodedBuffer::new(spec.sample_rate, spec.channels, mono)
    }
}

/// Factor mapping signed integer samples of `bits` width onto [-1, 1).
fn int_sample_scale(bits: u16) -> Result<f32> {
    match bits {
        1..=32 => Ok(1.0 / (1_i64 << (bits - 1)) as f32),
        _ => Err(VisualiserError::Decode(format!(
            "unsupported integer sample width of {bits} bits"
        ))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Running,
    Suspended,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    Playing,
    /// The source has been exhausted.
    Ended,
}

/// One buffer wired to the output through an analysis node.
pub trait AudioSession {
    fn start(&mut self) -> Result<()>;
    fn state(&self) -> SessionState;
    fn suspend(&mut self) -> Result<()>;
    fn resume(&mut self) -> Result<()>;
    /// Applies analysis parameters to the live node.
    fn set_analysis_params(&mut self, params: AnalysisParams) -> Result<()>;
    fn analysis_params(&self) -> AnalysisParams;
    /// Moves playback forward by `elapsed`, feeding the analysis node.
    fn advance(&mut self, elapsed: Duration) -> PlaybackStatus;
    /// Reads the current spectrum from the analysis node.
    fn sample(&mut self) -> Result<SpectrumSnapshot>;
    fn duration(&self) -> Duration;
    /// Releases the audio graph. Closing twice is an error.
    fn close(&mut self) -> Result<()>;
}

/// Factory for playback sessions.
pub trait PlaybackGraph {
    type Session: AudioSession;

    fn create_session(
        &mut self,
        buffer: DecodedBuffer,
        params: AnalysisParams,
    ) -> Result<Self::Session>;
}

/// Playback graph that advances sessions by the elapsed time reported by the
/// render loop instead of an output device.
#[derive(Debug, Default)]
pub struct ClockedGraph {
    next_id: u64,
}

impl ClockedGraph {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PlaybackGraph for ClockedGraph {
    type Session = ClockedSession;

    fn create_session(
        &mut self,
        buffer: DecodedBuffer,
        params: AnalysisParams,
    ) -> Result<ClockedSession> {
        self.next_id += 1;
        let analyser = SpectrumAnalyser::new(params)?;
        debug!(
            session = self.next_id,
            sample_rate = buffer.sample_rate(),
            "created playback session"
        );
        Ok(ClockedSession {
            id: self.next_id,
            buffer,
            analyser,
            cursor: 0,
            carry: 0.0,
            started: false,
            state: SessionState::Suspended,
        })
    }
}

#[derive(Debug)]
pub struct ClockedSession {
    id: u64,
    buffer: DecodedBuffer,
    analyser: SpectrumAnalyser,
    cursor: usize,
    carry: f64,
    started: bool,
    state: SessionState,
}

impl ClockedSession {
    /// Current playback position.
    pub fn position(&self) -> Duration {
        Duration::from_secs_f64(self.cursor as f64 / f64::from(self.buffer.sample_rate()))
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state == SessionState::Closed {
            return Err(VisualiserError::SessionInactive);
        }
        Ok(())
    }

    fn is_exhausted(&self) -> bool {
        self.cursor >= self.buffer.samples().len()
    }
}

impl AudioSession for ClockedSession {
    fn start(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.started {
            return Err(VisualiserError::msg("playback session already started"));
        }
        self.started = true;
        self.state = SessionState::Running;
        Ok(())
    }

    fn state(&self) -> SessionState {
        self.state
    }

    fn suspend(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.state = SessionState::Suspended;
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.started {
            self.state = SessionState::Running;
        }
        Ok(())
    }

    fn set_analysis_params(&mut self, params: AnalysisParams) -> Result<()> {
        self.ensure_open()?;
        self.analyser.set_params(params)
    }

    fn analysis_params(&self) -> AnalysisParams {
        self.analyser.params()
    }

    fn advance(&mut self, elapsed: Duration) -> PlaybackStatus {
        match self.state {
            SessionState::Closed => return PlaybackStatus::Ended,
            SessionState::Suspended => return PlaybackStatus::Playing,
            SessionState::Running => {}
        }

        let exact = elapsed.as_secs_f64() * f64::from(self.buffer.sample_rate()) + self.carry;
        let frames = exact.floor();
        self.carry = exact - frames;

        let total = self.buffer.samples().len();
        let end = self.cursor.saturating_add(frames as usize).min(total);
        self.analyser.push_samples(&self.buffer.samples()[self.cursor..end]);
        self.cursor = end;

        if self.is_exhausted() {
            PlaybackStatus::Ended
        } else {
            PlaybackStatus::Playing
        }
    }

    fn sample(&mut self) -> Result<SpectrumSnapshot> {
        self.ensure_open()?;
        self.analyser.byte_frequency_data()
    }

    fn duration(&self) -> Duration {
        self.buffer.duration()
    }

    fn close(&mut self) -> Result<()> {
        if self.state == SessionState::Closed {
            return Err(VisualiserError::Teardown(format!(
                "session {} is already closed",
                self.id
            )));
        }
        self.state = SessionState::Closed;
        self.analyser.reset();
        self.buffer.samples = Vec::new();
        debug!(session = self.id, "closed playback session");
        Ok(())
    }
}
