use core::fmt::Write;

use modular_bitfield::bitfield;
use modular_bitfield::prelude::B6;

use crate::change_of_state::ChangeOfStateBuffer;
use crate::command_class::CommandClass;
use crate::consts::{
    DEFAULT_DISCOVERY_TIMEOUT_MICROS, DEFAULT_POLL_INTERVAL_MICROS, DEFAULT_REPLY_TIMEOUT_MICROS,
    DEFAULT_UNMUTE_SETTLE_MICROS, DMX_MAX_CHANNELS, DMX_MIN_CHANNELS, DMX_NULL_START,
    ENTTEC_MANUFACTURER_UID, PREAMBLE_BYTE, SC_RDM, SEPARATOR_BYTE,
};
use crate::rdm_packet::{decode_discovery_uid, RdmPacket};
use crate::transport::{Clock, WidgetError, WidgetTransport};
use crate::unique_identifier::UniqueIdentifier;
use crate::widget_frame::{frame, FrameError, FrameReader, WidgetFrame, WidgetLabel};
use crate::widget_parameters::WidgetParameters;

/// Up to 512 channel levels without start code.
pub type DmxFrame = heapless::Vec<u8, DMX_MAX_CHANNELS>;

#[derive(Debug, Clone)]
pub struct WidgetSessionConfig {
    /// How long blocking requests wait for their reply.
    pub reply_timeout_us: u64,
    /// Sleep between two polls of the transport while waiting.
    pub poll_interval_us: u32,
    /// Discovery stops collecting replies once none arrived for this long.
    pub discovery_timeout_us: u64,
    /// Replies arriving this long after the un-mute broadcast are discarded.
    pub unmute_settle_us: u64,
    /// Source uid of outgoing rdm packages. Derived from the widget serial number if unset.
    pub source_uid: Option<UniqueIdentifier>,
}

impl Default for WidgetSessionConfig {
    fn default() -> Self {
        Self {
            reply_timeout_us: DEFAULT_REPLY_TIMEOUT_MICROS,
            poll_interval_us: DEFAULT_POLL_INTERVAL_MICROS,
            discovery_timeout_us: DEFAULT_DISCOVERY_TIMEOUT_MICROS,
            unmute_settle_us: DEFAULT_UNMUTE_SETTLE_MICROS,
            source_uid: None,
        }
    }
}

/// Outcome of a single DISC_UNIQUE_BRANCH request.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiscoveryOption {
    /// No device answered.
    NoDevice,
    /// Several devices answered or a reply was garbled.
    Collision,
    /// Exactly one device answered.
    Found(UniqueIdentifier),
}

/// Status byte the widget puts in front of every received packet.
///
/// `queue_overflow` is set when the widget receive queue overflowed and packets were lost,
/// `overrun` when the widget uart overran and this packet is incomplete.
#[bitfield]
#[derive(Debug, Copy, Clone)]
pub struct ReceiveStatus {
    pub queue_overflow: bool,
    pub overrun: bool,
    #[skip]
    reserved: B6,
}

/// Receives what [WidgetSession::poll] decodes. All methods default to doing nothing.
pub trait WidgetEventHandler {
    /// A dmx frame, either received as a whole or the change of state shadow.
    fn handle_dmx(&mut self, _levels: &[u8]) {}

    /// An rdm package with a valid checksum.
    fn handle_rdm(&mut self, _packet: &RdmPacket) {}

    /// A uid decoded from a discovery response.
    fn handle_discovered_uid(&mut self, _uid: UniqueIdentifier) {}
}

/// Ignores all events.
impl WidgetEventHandler for () {}

/// Owned form of the events for queuing.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum WidgetEvent {
    Dmx(DmxFrame),
    Rdm(RdmPacket),
    DiscoveredUid(UniqueIdentifier),
}

fn push_event<const N: usize>(queue: &mut heapless::Deque<WidgetEvent, N>, event: WidgetEvent) {
    if queue.push_back(event).is_err() {
        log::warn!("event queue is full, dropping event");
    }
}

/// Collects events until the host drains them.
impl<const N: usize> WidgetEventHandler for heapless::Deque<WidgetEvent, N> {
    fn handle_dmx(&mut self, levels: &[u8]) {
        let levels = &levels[..levels.len().min(DMX_MAX_CHANNELS)];
        if let Ok(dmx_frame) = DmxFrame::from_slice(levels) {
            push_event(self, WidgetEvent::Dmx(dmx_frame));
        }
    }

    fn handle_rdm(&mut self, packet: &RdmPacket) {
        push_event(self, WidgetEvent::Rdm(packet.clone()));
    }

    fn handle_discovered_uid(&mut self, uid: UniqueIdentifier) {
        push_event(self, WidgetEvent::DiscoveredUid(uid));
    }
}

/// Data of a PACKET_RECEIVED frame starting with its start code,
/// or [None] for other frames and packets with a non zero receive status.
fn received_packet(widget_frame: &WidgetFrame) -> Option<&[u8]> {
    if widget_frame.label() != Some(WidgetLabel::PacketReceived) {
        return None;
    }

    let payload = widget_frame.payload();
    if payload.len() < 2 {
        return None;
    }

    if payload[0] != 0 {
        let status = ReceiveStatus::from_bytes([payload[0]]);
        log::debug!(
            "dropping packet with receive status {:#04X} (queue overflow: {}, overrun: {})",
            payload[0],
            status.queue_overflow(),
            status.overrun()
        );
        return None;
    }

    Some(&payload[1..])
}

/// A discovery response inside a PACKET_RECEIVED frame.
pub(crate) fn discovery_reply(widget_frame: &WidgetFrame) -> Option<&[u8]> {
    received_packet(widget_frame)
        .filter(|data| matches!(data[0], PREAMBLE_BYTE | SEPARATOR_BYTE))
}

/// A connection to one widget.
///
/// Owns the transport and all state learned from the widget. Blocking requests poll the
/// transport until their reply arrives, frames that do not match are discarded meanwhile.
pub struct WidgetSession<T: WidgetTransport, C: Clock> {
    transport: T,
    clock: C,
    config: WidgetSessionConfig,
    reader: FrameReader,
    widget_parameters: Option<WidgetParameters>,
    serial_number: Option<u32>,
    transaction_number: u8,
    change_of_state: Option<ChangeOfStateBuffer>,
}

impl<T: WidgetTransport, C: Clock> WidgetSession<T, C> {
    pub fn new(transport: T, clock: C, config: WidgetSessionConfig) -> Self {
        Self {
            transport,
            clock,
            config,
            reader: FrameReader::new(),
            widget_parameters: None,
            serial_number: None,
            transaction_number: 0,
            change_of_state: None,
        }
    }

    /// Get a reference to the underlying transport.
    pub fn get_transport(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn get_clock(&mut self) -> &mut C {
        &mut self.clock
    }

    pub fn config(&self) -> &WidgetSessionConfig {
        &self.config
    }

    /// Widget parameters from the last GET_WIDGET_PARAMS reply.
    pub fn widget_parameters(&self) -> Option<WidgetParameters> {
        self.widget_parameters
    }

    /// Serial number from the last GET_SERIAL reply.
    pub fn serial_number(&self) -> Option<u32> {
        self.serial_number
    }

    /// The transaction number the next rdm request gets.
    pub fn next_transaction_number(&self) -> u8 {
        self.transaction_number
    }

    /// Levels of the change of state shadow, once a DMX_CHANGED message arrived.
    pub fn change_of_state_levels(&self) -> Option<&[u8; DMX_MAX_CHANNELS]> {
        self.change_of_state.as_ref().map(ChangeOfStateBuffer::levels)
    }

    fn write_frame(
        &mut self,
        label: WidgetLabel,
        payload: &[u8],
    ) -> Result<(), WidgetError<T::TransportError>> {
        let frame_buffer = frame(label, payload)?;
        let written = self
            .transport
            .write(&frame_buffer)
            .map_err(WidgetError::TransportError)?;

        if written != frame_buffer.len() {
            return Err(WidgetError::IncompleteWrite);
        }

        log::trace!("sent {:?} with {} bytes payload", label, payload.len());

        Ok(())
    }

    /// Sends a dmx universe. Universes shorter than 24 channels are padded with zeros,
    /// channels beyond 512 are cut off.
    pub fn send_dmx(&mut self, levels: &[u8]) -> Result<(), WidgetError<T::TransportError>> {
        let channel_count = levels.len().clamp(DMX_MIN_CHANNELS, DMX_MAX_CHANNELS);
        let copied = levels.len().min(channel_count);

        let mut payload = [0u8; DMX_MAX_CHANNELS + 1];
        payload[0] = DMX_NULL_START;
        payload[1..=copied].copy_from_slice(&levels[..copied]);

        self.write_frame(WidgetLabel::SendDmx, &payload[..=channel_count])
    }

    /// Sends already encoded rdm bytes as they are.
    pub fn send_rdm_raw(&mut self, package: &[u8]) -> Result<(), WidgetError<T::TransportError>> {
        self.write_frame(WidgetLabel::SendRdm, package)
    }

    /// Stamps source uid and transaction number into the package and updates its checksum.
    fn stamp(&mut self, packet: &mut RdmPacket) -> Result<u8, WidgetError<T::TransportError>> {
        packet.set_source_uid(self.uid()?);

        let transaction_number = self.transaction_number;
        self.transaction_number = self.transaction_number.wrapping_add(1);
        packet.set_transaction_number(transaction_number);
        packet.update_checksum();

        Ok(transaction_number)
    }

    /// Sends an rdm package without waiting for a response.
    /// Returns the transaction number assigned to it.
    pub fn send_rdm(&mut self, packet: &mut RdmPacket) -> Result<u8, WidgetError<T::TransportError>> {
        let transaction_number = self.stamp(packet)?;
        self.send_rdm_raw(packet.as_bytes())?;

        Ok(transaction_number)
    }

    /// Switches between receiving every dmx frame and receiving only changes.
    pub fn set_receive_dmx_on_change(
        &mut self,
        changes_only: bool,
    ) -> Result<(), WidgetError<T::TransportError>> {
        self.write_frame(WidgetLabel::SetDmxChange, &[changes_only as u8])
    }

    /// Sends DISC_UNIQUE_BRANCH for `lower..=upper`. The widget hands the responses back
    /// as received packets. Returns the transaction number assigned to the request.
    pub fn send_rdm_discovery(
        &mut self,
        lower: UniqueIdentifier,
        upper: UniqueIdentifier,
    ) -> Result<u8, WidgetError<T::TransportError>> {
        let mut packet = RdmPacket::discovery_unique_branch(lower, upper);
        let transaction_number = self.stamp(&mut packet)?;
        self.write_frame(WidgetLabel::SendRdmDiscovery, packet.as_bytes())?;

        Ok(transaction_number)
    }

    pub fn request_widget_parameters(&mut self) -> Result<(), WidgetError<T::TransportError>> {
        // The two bytes are the size of the user configuration to return.
        self.write_frame(WidgetLabel::GetWidgetParams, &[0, 0])
    }

    pub fn set_widget_parameters(
        &mut self,
        parameters: &WidgetParameters,
    ) -> Result<(), WidgetError<T::TransportError>> {
        self.write_frame(
            WidgetLabel::SetWidgetParams,
            &parameters.serialize_set_request(),
        )
    }

    pub fn request_serial_number(&mut self) -> Result<(), WidgetError<T::TransportError>> {
        self.write_frame(WidgetLabel::GetSerial, &[])
    }

    /// Polls the transport until `matcher` accepts a frame or the timeout passes.
    /// Frames the matcher rejects are discarded.
    fn wait_for<R>(
        &mut self,
        timeout_us: u64,
        mut matcher: impl FnMut(&WidgetFrame) -> Option<R>,
    ) -> Result<R, WidgetError<T::TransportError>> {
        let deadline = self.clock.now_micros().saturating_add(timeout_us);

        loop {
            let idle = match self.reader.poll_frame(&mut self.transport) {
                Ok(Some(widget_frame)) => {
                    if let Some(result) = matcher(&widget_frame) {
                        return Ok(result);
                    }

                    log::debug!(
                        "discarding frame with label {} while waiting for reply",
                        widget_frame.raw_label()
                    );
                    false
                },
                Ok(None) => true,
                Err(WidgetError::FrameError(error)) => {
                    log::debug!("skipping malformed frame: {}", error);
                    false
                },
                Err(error) => return Err(error),
            };

            if self.clock.now_micros() >= deadline {
                log::warn!("reply timed out");
                return Err(WidgetError::TimeoutError);
            }

            if idle {
                self.clock.delay_micros(self.config.poll_interval_us);
            }
        }
    }

    /// Discards everything the widget sends for the given time.
    pub fn discard_incoming(&mut self, duration_us: u64) -> Result<usize, WidgetError<T::TransportError>> {
        let mut discarded = 0;

        match self.wait_for(duration_us, |_| {
            discarded += 1;
            None::<()>
        }) {
            Ok(()) | Err(WidgetError::TimeoutError) => Ok(discarded),
            Err(error) => Err(error),
        }
    }

    /// Sends an rdm request and waits for the matching response.
    ///
    /// A response matches if it has a valid checksum, the transaction number and parameter id
    /// of the request and the response command class. Broadcasts are never answered
    /// and run into the timeout.
    pub fn get_rdm(
        &mut self,
        request: &mut RdmPacket,
    ) -> Result<RdmPacket, WidgetError<T::TransportError>> {
        let response_class = request.command_class()?.response_class();
        let parameter_id = request.parameter_id();
        let transaction_number = self.send_rdm(request)?;

        self.wait_for(self.config.reply_timeout_us, |widget_frame| {
            let data = received_packet(widget_frame)?;
            if data[0] != SC_RDM {
                return None;
            }

            let response = RdmPacket::decode(data).ok()?;
            let matches = response.validate()
                && response.transaction_number() == transaction_number
                && response.parameter_id() == parameter_id
                && response.command_class() == Ok(response_class);

            matches.then_some(response)
        })
    }

    /// GET request without parameter data.
    pub fn get_rdm_parameter(
        &mut self,
        uid: UniqueIdentifier,
        parameter_id: u16,
    ) -> Result<RdmPacket, WidgetError<T::TransportError>> {
        let mut request = RdmPacket::new(uid, CommandClass::GetCommand, parameter_id);

        self.get_rdm(&mut request)
    }

    /// SET request with the given parameter data.
    pub fn set_rdm_parameter(
        &mut self,
        uid: UniqueIdentifier,
        parameter_id: u16,
        parameter_data: &[u8],
    ) -> Result<RdmPacket, WidgetError<T::TransportError>> {
        let mut request = RdmPacket::new(uid, CommandClass::SetCommand, parameter_id);
        request.set_parameter_data(parameter_data)?;

        self.get_rdm(&mut request)
    }

    /// Requests the widget parameters and waits for them.
    pub fn query_widget_parameters(
        &mut self,
    ) -> Result<WidgetParameters, WidgetError<T::TransportError>> {
        self.request_widget_parameters()?;

        let parameters = self.wait_for(self.config.reply_timeout_us, |widget_frame| {
            if widget_frame.label() != Some(WidgetLabel::GetWidgetParams) {
                return None;
            }

            WidgetParameters::deserialize(widget_frame.payload()).ok()
        })?;

        log_widget_parameters(&parameters);
        self.widget_parameters = Some(parameters);

        Ok(parameters)
    }

    /// Requests the serial number and waits for it.
    pub fn query_serial_number(&mut self) -> Result<u32, WidgetError<T::TransportError>> {
        self.request_serial_number()?;

        let serial_number = self.wait_for(self.config.reply_timeout_us, |widget_frame| {
            if widget_frame.label() != Some(WidgetLabel::GetSerial) {
                return None;
            }

            parse_serial_number(widget_frame.payload()).ok()
        })?;

        log::info!("widget serial number: {:X}", serial_number);
        self.serial_number = Some(serial_number);

        Ok(serial_number)
    }

    fn cached_serial_number(&mut self) -> Result<u32, WidgetError<T::TransportError>> {
        match self.serial_number {
            Some(serial_number) => Ok(serial_number),
            None => self.query_serial_number(),
        }
    }

    /// The serial number in upper case hex, as printed on the widget.
    pub fn serial_hex_string(
        &mut self,
    ) -> Result<heapless::String<8>, WidgetError<T::TransportError>> {
        let serial_number = self.cached_serial_number()?;

        let mut serial_string = heapless::String::new();
        // A u32 has at most 8 hex digits.
        let _ = write!(serial_string, "{:X}", serial_number);

        Ok(serial_string)
    }

    /// Uid the session sends rdm requests with.
    ///
    /// Unless configured the uid is the Enttec manufacturer id followed by the serial number,
    /// which is queried from the widget the first time.
    pub fn uid(&mut self) -> Result<UniqueIdentifier, WidgetError<T::TransportError>> {
        if let Some(source_uid) = self.config.source_uid {
            return Ok(source_uid);
        }

        let serial_number = self.cached_serial_number()?;

        Ok(UniqueIdentifier::new(
            ENTTEC_MANUFACTURER_UID,
            serial_number,
        ))
    }

    /// Handles every frame that is available without blocking.
    ///
    /// Received data is handed to the handler, replies to requests sent with the
    /// non-blocking methods update the cached widget state. Broken frames are logged and
    /// skipped. Returns the number of frames taken from the transport.
    pub fn poll<H: WidgetEventHandler + ?Sized>(
        &mut self,
        handler: &mut H,
    ) -> Result<usize, WidgetError<T::TransportError>> {
        let mut handled = 0;

        loop {
            let widget_frame = match self.reader.poll_frame(&mut self.transport) {
                Ok(Some(widget_frame)) => widget_frame,
                Ok(None) => break,
                Err(WidgetError::FrameError(error)) => {
                    log::warn!("skipping malformed frame: {}", error);
                    continue;
                },
                Err(error) => return Err(error),
            };

            if let Err(error) = self.handle_frame(&widget_frame, handler) {
                log::warn!(
                    "dropping frame with label {}: {}",
                    widget_frame.raw_label(),
                    error
                );
            }
            handled += 1;
        }

        Ok(handled)
    }

    fn handle_frame<H: WidgetEventHandler + ?Sized>(
        &mut self,
        widget_frame: &WidgetFrame,
        handler: &mut H,
    ) -> Result<(), FrameError> {
        match widget_frame.label() {
            Some(WidgetLabel::GetWidgetParams) => {
                let parameters = WidgetParameters::deserialize(widget_frame.payload())?;
                log_widget_parameters(&parameters);
                self.widget_parameters = Some(parameters);
            },
            Some(WidgetLabel::PacketReceived) => {
                widget_frame.require_len(2)?;
                if let Some(data) = received_packet(widget_frame) {
                    handle_received_packet(data, handler);
                }
            },
            Some(WidgetLabel::DmxChanged) => {
                let shadow = self
                    .change_of_state
                    .get_or_insert_with(ChangeOfStateBuffer::new);
                shadow.apply(widget_frame.payload())?;
                handler.handle_dmx(shadow.levels());
            },
            Some(WidgetLabel::GetSerial) => {
                self.serial_number = Some(parse_serial_number(widget_frame.payload())?);
            },
            _ => {
                log::debug!("ignoring frame with label {}", widget_frame.raw_label());
            },
        }

        Ok(())
    }

    /// Sends DISC_UNIQUE_BRANCH and collects responses until none arrived for the
    /// discovery timeout.
    pub fn rdm_discover(
        &mut self,
        lower: UniqueIdentifier,
        upper: UniqueIdentifier,
    ) -> Result<DiscoveryOption, WidgetError<T::TransportError>> {
        self.send_rdm_discovery(lower, upper)?;

        let mut found_uid = None;
        let mut collision = false;
        let mut deadline = self
            .clock
            .now_micros()
            .saturating_add(self.config.discovery_timeout_us);

        loop {
            let idle = match self.reader.poll_frame(&mut self.transport) {
                Ok(Some(widget_frame)) => {
                    match discovery_reply(&widget_frame) {
                        Some(reply) => {
                            match decode_discovery_uid(reply) {
                                Ok(Some(uid)) if !(lower..=upper).contains(&uid) => {
                                    log::debug!(
                                        "dropping discovery reply from {} outside {}..={}",
                                        uid,
                                        lower,
                                        upper
                                    );
                                },
                                Ok(Some(uid)) if found_uid.is_none() => found_uid = Some(uid),
                                Ok(Some(uid)) => collision |= found_uid != Some(uid),
                                Ok(None) | Err(_) => collision = true,
                            }

                            deadline = self
                                .clock
                                .now_micros()
                                .saturating_add(self.config.discovery_timeout_us);
                        },
                        None => log::debug!(
                            "discarding frame with label {} during discovery",
                            widget_frame.raw_label()
                        ),
                    }
                    false
                },
                Ok(None) => true,
                Err(WidgetError::FrameError(error)) => {
                    log::debug!("skipping malformed frame during discovery: {}", error);
                    false
                },
                Err(error) => return Err(error),
            };

            if self.clock.now_micros() >= deadline {
                break;
            }

            if idle {
                self.clock.delay_micros(self.config.poll_interval_us);
            }
        }

        Ok(match (found_uid, collision) {
            (_, true) => DiscoveryOption::Collision,
            (Some(uid), false) => DiscoveryOption::Found(uid),
            (None, false) => DiscoveryOption::NoDevice,
        })
    }
}

fn handle_received_packet<H: WidgetEventHandler + ?Sized>(data: &[u8], handler: &mut H) {
    match data[0] {
        DMX_NULL_START => {
            let levels = &data[1..];
            handler.handle_dmx(&levels[..levels.len().min(DMX_MAX_CHANNELS)]);
        },
        SC_RDM => match RdmPacket::decode(data) {
            Ok(packet) if packet.validate() => handler.handle_rdm(&packet),
            Ok(_) => log::debug!("dropping rdm package with invalid checksum"),
            Err(error) => log::debug!("dropping undecodable rdm package: {}", error),
        },
        PREAMBLE_BYTE | SEPARATOR_BYTE => match decode_discovery_uid(data) {
            Ok(Some(uid)) => {
                log::info!("discovered {}", uid);
                handler.handle_discovered_uid(uid);
            },
            Ok(None) => log::debug!("dropping discovery response with invalid checksum"),
            Err(error) => log::debug!("dropping undecodable discovery response: {}", error),
        },
        start_code => log::debug!("ignoring packet with start code {:#04X}", start_code),
    }
}

/// The serial number is sent little endian.
fn parse_serial_number(payload: &[u8]) -> Result<u32, FrameError> {
    match payload {
        [b0, b1, b2, b3, ..] => Ok(u32::from_le_bytes([*b0, *b1, *b2, *b3])),
        _ => Err(FrameError::Truncated {
            expected: 4,
            actual: payload.len(),
        }),
    }
}

fn log_widget_parameters(parameters: &WidgetParameters) {
    let (major, minor) = parameters.firmware_version_parts();
    log::info!(
        "widget firmware {}.{}, break {} us, mark after break {} us, {} Hz",
        major,
        minor,
        parameters.break_time_micros(),
        parameters.mark_after_break_time_micros(),
        parameters.refresh_rate
    );
}
