//! Audio capture boundary: device discovery and raw byte streams.
//!
//! The engine only sees [`CaptureBackend`] and [`ByteSource`]; the concrete
//! PulseAudio recorder lives in [`parec`].

pub mod discovery;
pub mod parec;

use std::fmt;
use std::io;

/// Outcome of one non-blocking read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// Source is live; zero or more bytes were appended.
    Open,
    /// Source has finished and nothing more will arrive.
    Ended,
}

/// Non-blocking supplier of s16le mono capture bytes.
pub trait ByteSource {
    /// Append whatever is available right now to `buf` without waiting.
    fn read_available(&mut self, buf: &mut Vec<u8>) -> ReadStatus;
}

/// Opens and closes capture streams for a device identifier.
pub trait CaptureBackend {
    type Stream: ByteSource;

    fn attach(&mut self, device: &str) -> Result<Self::Stream, CaptureError>;
    fn detach(&mut self, stream: Self::Stream);
}

#[derive(Debug)]
pub enum CaptureError {
    /// No monitor source could be found for the current output.
    NoMonitorSource,
    /// A required helper program is not installed.
    ToolMissing(&'static str),
    /// A helper program ran but reported failure.
    CommandFailed { tool: &'static str, status: String },
    /// The recorder could not be started.
    Spawn(io::Error),
    Io(io::Error),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::NoMonitorSource => write!(f, "no monitor source found"),
            CaptureError::ToolMissing(tool) => {
                write!(f, "'{tool}' not found; install the PulseAudio utilities")
            }
            CaptureError::CommandFailed { tool, status } => {
                write!(f, "'{tool}' failed: {status}")
            }
            CaptureError::Spawn(err) => write!(f, "failed to start recorder: {err}"),
            CaptureError::Io(err) => write!(f, "capture i/o error: {err}"),
        }
    }
}

impl std::error::Error for CaptureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CaptureError::Spawn(err) | CaptureError::Io(err) => Some(err),
            _ => None,
        }
    }
}

pub(crate) fn spawn_error(tool: &'static str, err: io::Error) -> CaptureError {
    if err.kind() == io::ErrorKind::NotFound {
        CaptureError::ToolMissing(tool)
    } else {
        CaptureError::Spawn(err)
    }
}
