/// Result alias that carries the custom [`VisualiserError`] type.
pub type Result<T> = std::result::Result<T, VisualiserError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum VisualiserError {
    /// The supplied bytes are not decodable audio.
    #[error("unable to decode audio: {0}")]
    Decode(String),
    /// A configuration value outside the supported range reached the core.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// Releasing the resources of a playback session failed.
    #[error("failed to tear down playback session: {0}")]
    Teardown(String),
    /// An operation that needs a live playback session was called without one.
    #[error("no active playback session")]
    SessionInactive,
    /// FFT planning or execution failed.
    #[error("fft error: {0}")]
    Fft(String),
    /// Free-form error used by the application layer.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Wrapper around configuration (de)serialisation errors.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    /// Encoding or writing an exported frame failed.
    #[error("{0}")]
    Image(#[from] image::ImageError),
}

impl VisualiserError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn invalid_config<T: Into<String>>(msg: T) -> Self {
        Self::InvalidConfiguration(msg.into())
    }
}

impl From<realfft::FftError> for VisualiserError {
    fn from(value: realfft::FftError) -> Self {
        Self::Fft(value.to_string())
    }
}

impl From<hound::Error> for VisualiserError {
    fn from(value: hound::Error) -> Self {
        Self::Decode(value.to_string())
    }
}
