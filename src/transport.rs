use crate::rdm_packet::RdmPacketError;
use crate::widget_frame::FrameError;

#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WidgetError<E> {
    /// No matching reply arrived before the deadline.
    /// IMPORTANT: If you implement a transport make sure a blocking read that runs out of time
    /// reports zero bytes instead of a transport specific error.
    TimeoutError,
    /// The transport accepted fewer bytes than the frame is long.
    IncompleteWrite,
    /// A frame could not be built or parsed.
    FrameError(FrameError),
    /// An rdm package could not be built or parsed.
    PacketError(RdmPacketError),
    /// A transport specific error.
    TransportError(E),
}

impl<E: core::fmt::Display> core::fmt::Display for WidgetError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            WidgetError::TimeoutError => write!(f, "timeout error occurred"),
            WidgetError::IncompleteWrite => write!(f, "transport did not accept the whole frame"),
            WidgetError::FrameError(error) => write!(f, "framing error: {}", error),
            WidgetError::PacketError(error) => write!(f, "rdm package error: {}", error),
            WidgetError::TransportError(error) => error.fmt(f),
        }
    }
}

#[cfg(feature = "std")]
impl<E: core::fmt::Display + core::fmt::Debug> std::error::Error for WidgetError<E> {}

impl<E> From<FrameError> for WidgetError<E> {
    fn from(value: FrameError) -> Self {
        Self::FrameError(value)
    }
}

impl<E> From<RdmPacketError> for WidgetError<E> {
    fn from(value: RdmPacketError) -> Self {
        Self::PacketError(value)
    }
}

/// Byte stream to the widget, usually a serial port at 57600 baud.
///
/// All methods must return without waiting for data, the session does its own polling.
pub trait WidgetTransport {
    type TransportError;

    /// Writes the bytes and returns how many the transport accepted.
    fn write(&mut self, data: &[u8]) -> Result<usize, Self::TransportError>;

    /// Number of bytes that can be read right now.
    fn bytes_available(&mut self) -> Result<usize, Self::TransportError>;

    /// Reads up to `buffer.len()` bytes. Returns the number of bytes actually read.
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, Self::TransportError>;
}

/// Monotonic time source used for reply deadlines.
pub trait Clock {
    fn now_micros(&mut self) -> u64;

    /// Sleeps for roughly the given time. Used between polls of a blocking wait.
    fn delay_micros(&mut self, micros: u32);
}

/// [Clock] backed by [std::time::Instant].
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy)]
pub struct StdClock {
    epoch: std::time::Instant,
}

#[cfg(feature = "std")]
impl StdClock {
    pub fn new() -> Self {
        Self {
            epoch: std::time::Instant::now(),
        }
    }
}

#[cfg(feature = "std")]
impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl Clock for StdClock {
    fn now_micros(&mut self) -> u64 {
        self.epoch.elapsed().as_micros() as u64
    }

    fn delay_micros(&mut self, micros: u32) {
        std::thread::sleep(std::time::Duration::from_micros(micros as u64));
    }
}
