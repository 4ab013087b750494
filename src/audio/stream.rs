use thiserror::Error;

/// Result of a single non-blocking read attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// `n` mono frames were copied into the caller's buffer.
    Frames(usize),
    /// Nothing available right now; poll again on a later tick.
    WouldBlock,
    /// Samples were lost since the last read. The stream must be reset.
    Overrun,
}

/// Errors that can occur while opening or reading a capture device
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("No audio input devices found")]
    NoDevices,

    #[error("Audio input device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to configure capture device: {0}")]
    ConfigError(String),

    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to build capture stream: {0}")]
    StreamBuildError(String),

    #[error("Failed to control capture stream: {0}")]
    StreamPlayError(String),

    #[error("Capture stream error: {0}")]
    StreamError(String),
}

pub type CaptureResult<T> = Result<T, CaptureError>;

/// Mono 16-bit capture source with non-blocking read semantics.
pub trait CaptureStream {
    /// Copy up to `buf.len()` frames into `buf` without blocking.
    fn read(&mut self, buf: &mut [i16]) -> CaptureResult<ReadOutcome>;

    /// Drop every in-flight sample and clear any overrun condition.
    fn reset(&mut self) -> CaptureResult<()>;

    /// Stop capturing and release the device.
    fn close(&mut self) -> CaptureResult<()>;

    /// Negotiated sample rate in Hz.
    fn sample_rate(&self) -> u32;

    /// Whether `read` may block the caller.
    fn is_blocking(&self) -> bool {
        false
    }
}

impl<S: CaptureStream + ?Sized> CaptureStream for Box<S> {
    fn read(&mut self, buf: &mut [i16]) -> CaptureResult<ReadOutcome> {
        (**self).read(buf)
    }

    fn reset(&mut self) -> CaptureResult<()> {
        (**self).reset()
    }

    fn close(&mut self) -> CaptureResult<()> {
        (**self).close()
    }

    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn is_blocking(&self) -> bool {
        (**self).is_blocking()
    }
}
