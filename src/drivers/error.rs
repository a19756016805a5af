use thiserror::Error;
/// Faults raised while turning raw bytes into a frame. The receiver treats
/// every variant as a stream fault, never as a fatal error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("frame length mismatch: expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },
    #[error("fired channel {index} out of range for {channels} source channels")]
    ChannelOutOfRange { index: usize, channels: usize },
}
#[derive(Debug, Error)]
pub enum RasterError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("channel {0} not in network")]
    UnknownChannel(u32),
    #[error("no channels selected for display")]
    NoChannels,
    #[error("engine already started")]
    AlreadyStarted,
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),
    #[error("failed to render plot: {0}")]
    Plot(String),
}
impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for RasterError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        RasterError::Plot(format!("{value:?}"))
    }
}
impl From<image::ImageError> for RasterError {
    fn from(value: image::ImageError) -> Self {
        RasterError::Plot(value.to_string())
    }
}
