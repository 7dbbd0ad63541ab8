use crate::consts::{
    WIDGET_END_OF_MESSAGE, WIDGET_FRAME_OVERHEAD, WIDGET_MAX_FRAME_SIZE, WIDGET_MAX_PAYLOAD_SIZE,
    WIDGET_RECEIVE_BUFFER_SIZE, WIDGET_START_OF_MESSAGE,
};
use crate::layouts::widget_frame_header_layout;
use crate::transport::{WidgetError, WidgetTransport};
use crate::types::wire_enum;

/// start marker + label + 2 length bytes
const WIDGET_HEADER_SIZE: usize = 4;

pub type WidgetPayload = heapless::Vec<u8, WIDGET_MAX_PAYLOAD_SIZE>;
pub type BinaryWidgetFrame = heapless::Vec<u8, WIDGET_MAX_FRAME_SIZE>;

wire_enum! {
    /// Message labels of the widget api.
    pub enum WidgetLabel: u8 {
        /// Request or reply of the widget timing parameters.
        GetWidgetParams = 3,
        SetWidgetParams = 4,
        /// A dmx, rdm or discovery packet the widget received.
        PacketReceived = 5,
        SendDmx = 6,
        SendRdm = 7,
        /// Switches between full frame and change of state reception.
        SetDmxChange = 8,
        DmxChanged = 9,
        GetSerial = 10,
        SendRdmDiscovery = 11,
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Bytes before the start marker were skipped.
    BadStartMarker,
    /// The byte after the payload is not the end marker.
    BadEndMarker,
    /// The payload exceeds what the widget handles; contains the announced size.
    PayloadTooLong(usize),
    /// The payload is too short for its label, or the frame was cut off by the next one.
    Truncated { expected: usize, actual: usize },
}

impl core::fmt::Display for FrameError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            FrameError::BadStartMarker => write!(f, "skipped bytes before start marker"),
            FrameError::BadEndMarker => write!(f, "end marker is missing"),
            FrameError::PayloadTooLong(size) => write!(f, "payload of {} bytes is too long", size),
            FrameError::Truncated { expected, actual } => write!(
                f,
                "payload of {} bytes is shorter than {} bytes",
                actual, expected
            ),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for FrameError {}

/// One message from the widget.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct WidgetFrame {
    label: u8,
    payload: WidgetPayload,
}

impl WidgetFrame {
    pub fn new(label: u8, payload: &[u8]) -> Result<Self, FrameError> {
        Ok(Self {
            label,
            payload: WidgetPayload::from_slice(payload)
                .map_err(|_| FrameError::PayloadTooLong(payload.len()))?,
        })
    }

    /// The label, or [None] for labels this crate does not know.
    pub fn label(&self) -> Option<WidgetLabel> {
        WidgetLabel::try_from(self.label).ok()
    }

    pub fn raw_label(&self) -> u8 {
        self.label
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Returns the payload if it holds at least `length` bytes.
    pub fn require_len(&self, length: usize) -> Result<&[u8], FrameError> {
        if self.payload.len() < length {
            return Err(FrameError::Truncated {
                expected: length,
                actual: self.payload.len(),
            });
        }

        Ok(&self.payload)
    }
}

/// Wraps the payload into a widget frame ready to be written to the transport.
pub fn frame(label: WidgetLabel, payload: &[u8]) -> Result<BinaryWidgetFrame, FrameError> {
    if payload.len() > WIDGET_MAX_PAYLOAD_SIZE {
        return Err(FrameError::PayloadTooLong(payload.len()));
    }

    let frame_size = payload.len() + WIDGET_FRAME_OVERHEAD;
    let mut frame_buffer = BinaryWidgetFrame::new();
    frame_buffer
        .resize_default(frame_size)
        .map_err(|_| FrameError::PayloadTooLong(payload.len()))?;

    let mut frame_view = widget_frame_header_layout::View::new(&mut frame_buffer[..]);
    frame_view
        .start_of_message_mut()
        .write(WIDGET_START_OF_MESSAGE);
    frame_view.label_mut().write(label.into());
    frame_view
        .payload_length_mut()
        .write(payload.len() as u16);
    frame_view.payload_and_end_mut()[..payload.len()].copy_from_slice(payload);
    frame_buffer[frame_size - 1] = WIDGET_END_OF_MESSAGE;

    Ok(frame_buffer)
}

/// Reassembles widget frames from an unframed byte stream.
///
/// Bytes are kept until a complete frame is buffered, so frames may arrive split over
/// several reads or several at once. On garbage the reader skips ahead to the next start marker.
pub struct FrameReader {
    buffer: heapless::Vec<u8, WIDGET_RECEIVE_BUFFER_SIZE>,
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameReader {
    pub fn new() -> Self {
        Self {
            buffer: heapless::Vec::new(),
        }
    }

    /// Number of bytes waiting to be framed.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Appends raw bytes. Returns how many bytes fit into the receive buffer.
    pub fn extend(&mut self, data: &[u8]) -> usize {
        let accepted = data.len().min(self.free_space());
        if self.buffer.extend_from_slice(&data[..accepted]).is_err() {
            return 0;
        }

        accepted
    }

    fn free_space(&self) -> usize {
        self.buffer.capacity() - self.buffer.len()
    }

    /// Reads everything the transport has available, as far as it fits.
    /// Returns the number of bytes read.
    pub fn fill<T: WidgetTransport>(&mut self, transport: &mut T) -> Result<usize, T::TransportError> {
        let to_read = transport.bytes_available()?.min(self.free_space());
        if to_read == 0 {
            return Ok(0);
        }

        let start = self.buffer.len();
        if self.buffer.resize_default(start + to_read).is_err() {
            return Ok(0);
        }

        let bytes_read = match transport.read(&mut self.buffer[start..]) {
            Ok(bytes_read) => bytes_read.min(to_read),
            Err(error) => {
                self.buffer.truncate(start);
                return Err(error);
            },
        };
        self.buffer.truncate(start + bytes_read);

        log::trace!("read {} bytes from widget", bytes_read);

        Ok(bytes_read)
    }

    /// Drops the first `count` bytes of the buffer.
    fn consume(&mut self, count: usize) {
        let count = count.min(self.buffer.len());
        let length = self.buffer.len();
        self.buffer.copy_within(count..length, 0);
        self.buffer.truncate(length - count);
    }

    /// Takes the next complete frame out of the buffer.
    ///
    /// Returns `Ok(None)` if no complete frame is buffered yet. Every error consumes the
    /// offending bytes, so calling again continues after them.
    pub fn next_frame(&mut self) -> Result<Option<WidgetFrame>, FrameError> {
        let start = match self
            .buffer
            .iter()
            .position(|&byte| byte == WIDGET_START_OF_MESSAGE)
        {
            Some(start) => start,
            None if self.buffer.is_empty() => return Ok(None),
            None => {
                log::debug!("dropping {} bytes without start marker", self.buffer.len());
                self.buffer.clear();
                return Err(FrameError::BadStartMarker);
            },
        };

        if start > 0 {
            log::debug!("skipping {} bytes before start marker", start);
            self.consume(start);
            return Err(FrameError::BadStartMarker);
        }

        if self.buffer.len() < WIDGET_HEADER_SIZE {
            return Ok(None);
        }

        let header_view = widget_frame_header_layout::View::new(&self.buffer[..]);
        let label = header_view.label().read();
        let payload_length = header_view.payload_length().read() as usize;

        if payload_length > WIDGET_MAX_PAYLOAD_SIZE {
            self.consume(1);
            return Err(FrameError::PayloadTooLong(payload_length));
        }

        let frame_size = payload_length + WIDGET_FRAME_OVERHEAD;
        if self.buffer.len() < frame_size {
            return self.skip_truncated(frame_size);
        }

        if self.buffer[frame_size - 1] != WIDGET_END_OF_MESSAGE {
            self.consume(1);
            return Err(FrameError::BadEndMarker);
        }

        let widget_frame = WidgetFrame::new(
            label,
            &self.buffer[WIDGET_HEADER_SIZE..WIDGET_HEADER_SIZE + payload_length],
        )?;
        self.consume(frame_size);

        log::trace!(
            "received frame with label {} and {} bytes payload",
            label,
            payload_length
        );

        Ok(Some(widget_frame))
    }

    /// A frame still waiting for its tail is dropped once a complete frame follows it,
    /// the tail got lost on the line.
    fn skip_truncated(&mut self, frame_size: usize) -> Result<Option<WidgetFrame>, FrameError> {
        let next_start = match (1..self.buffer.len()).find(|&index| self.complete_frame_at(index)) {
            Some(next_start) => next_start,
            None => return Ok(None),
        };

        log::debug!(
            "dropping frame cut off after {} of {} bytes",
            next_start,
            frame_size
        );
        self.consume(next_start);

        Err(FrameError::Truncated {
            expected: frame_size,
            actual: next_start,
        })
    }

    /// True if a frame with a known label and its end marker starts at `index`.
    fn complete_frame_at(&self, index: usize) -> bool {
        let candidate = &self.buffer[index..];
        if candidate.len() < WIDGET_FRAME_OVERHEAD
            || candidate[0] != WIDGET_START_OF_MESSAGE
            || WidgetLabel::try_from(candidate[1]).is_err()
        {
            return false;
        }

        let payload_length = widget_frame_header_layout::View::new(candidate)
            .payload_length()
            .read() as usize;
        let frame_size = payload_length + WIDGET_FRAME_OVERHEAD;

        payload_length <= WIDGET_MAX_PAYLOAD_SIZE
            && frame_size <= candidate.len()
            && candidate[frame_size - 1] == WIDGET_END_OF_MESSAGE
    }

    /// Returns the next frame without blocking.
    ///
    /// A frame that is already buffered is handed out first, otherwise the available bytes
    /// are read from the transport. `Ok(None)` means there is no complete frame yet.
    pub fn poll_frame<T: WidgetTransport>(
        &mut self,
        transport: &mut T,
    ) -> Result<Option<WidgetFrame>, WidgetError<T::TransportError>> {
        if let Some(widget_frame) = self.next_frame()? {
            return Ok(Some(widget_frame));
        }

        if self.fill(transport).map_err(WidgetError::TransportError)? == 0 {
            return Ok(None);
        }

        Ok(self.next_frame()?)
    }
}
