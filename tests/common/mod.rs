#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::convert::Infallible;

use dmx_rdm_usbpro::command_class::CommandClass;
use dmx_rdm_usbpro::pids;
use dmx_rdm_usbpro::rdm_packet::{encode_discovery_response, RdmPacket};
use dmx_rdm_usbpro::transport::{Clock, WidgetTransport};
use dmx_rdm_usbpro::types::{NackReason, ResponseType};
use dmx_rdm_usbpro::unique_identifier::UniqueIdentifier;
use dmx_rdm_usbpro::widget_frame::{frame, FrameReader, WidgetFrame, WidgetLabel};
use dmx_rdm_usbpro::widget_session::{WidgetSession, WidgetSessionConfig};

pub const SERIAL_NUMBER: u32 = 0x1234_5678;

/// Several responders answering at once, as the widget hands it over: the pairs AND to 0xFF
/// which matches neither checksum.
pub const GARBLED_DISCOVERY_RESPONSE: [u8; 19] = [
    0xFE, 0xFE, 0xAA, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF, 0xFF, 0xFF, 0xFF,
];

/// Time only moves when the session sleeps.
#[derive(Debug, Default)]
pub struct SimulatedClock {
    pub now: u64,
}

impl Clock for SimulatedClock {
    fn now_micros(&mut self) -> u64 {
        self.now
    }

    fn delay_micros(&mut self, micros: u32) {
        self.now += micros as u64;
    }
}

pub struct Responder {
    pub uid: UniqueIdentifier,
    pub muted: bool,
    pub acknowledges_mute: bool,
    /// Data returned for GET requests, SET requests overwrite it.
    pub parameters: BTreeMap<u16, Vec<u8>>,
}

impl Responder {
    pub fn new(uid: UniqueIdentifier) -> Self {
        Self {
            uid,
            muted: false,
            acknowledges_mute: true,
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_parameter(mut self, parameter_id: u16, parameter_data: &[u8]) -> Self {
        self.parameters.insert(parameter_id, parameter_data.to_vec());
        self
    }
}

/// A widget with rdm responders on its line. Replies are queued as soon as a request is written.
pub struct SimulatedWidget {
    /// Unanswered GET_SERIAL requests if [None].
    pub serial_number: Option<u32>,
    pub widget_parameters: [u8; 5],
    pub responders: Vec<Responder>,
    /// Send one undecodable reply instead of one reply per responder.
    pub garble_collisions: bool,
    /// Added to the transaction number of every rdm reply.
    pub transaction_number_offset: u8,
    /// Largest number of bytes handed out by a single read.
    pub max_read_chunk: usize,
    /// Accept one byte less than written.
    pub short_writes: bool,
    /// Every frame the host sent.
    pub sent: Vec<WidgetFrame>,
    pub discovery_requests: usize,
    rx: VecDeque<u8>,
    host_frames: FrameReader,
}

impl SimulatedWidget {
    pub fn new() -> Self {
        Self {
            serial_number: Some(SERIAL_NUMBER),
            widget_parameters: [0x04, 0x02, 9, 1, 40],
            responders: vec![],
            garble_collisions: false,
            transaction_number_offset: 0,
            max_read_chunk: usize::MAX,
            short_writes: false,
            sent: vec![],
            discovery_requests: 0,
            rx: VecDeque::new(),
            host_frames: FrameReader::new(),
        }
    }

    pub fn with_responders(uids: &[u64]) -> Self {
        let mut widget = Self::new();
        widget.responders = uids
            .iter()
            .map(|uid| Responder::new(UniqueIdentifier::try_from(*uid).unwrap()))
            .collect();

        widget
    }

    pub fn responder(&self, uid: UniqueIdentifier) -> &Responder {
        self.responders
            .iter()
            .find(|responder| responder.uid == uid)
            .unwrap()
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes);
    }

    pub fn push_frame(&mut self, label: WidgetLabel, payload: &[u8]) {
        let frame_bytes = frame(label, payload).unwrap();
        self.push_bytes(&frame_bytes);
    }

    /// Queues a PACKET_RECEIVED frame with status 0.
    pub fn push_packet(&mut self, data: &[u8]) {
        let mut payload = vec![0x00];
        payload.extend_from_slice(data);
        self.push_frame(WidgetLabel::PacketReceived, &payload);
    }

    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    pub fn sent_with_label(&self, label: WidgetLabel) -> Vec<&WidgetFrame> {
        self.sent
            .iter()
            .filter(|sent_frame| sent_frame.label() == Some(label))
            .collect()
    }

    fn handle_host_frame(&mut self, host_frame: WidgetFrame) {
        let payload = host_frame.payload();

        match host_frame.label() {
            Some(WidgetLabel::GetSerial) => {
                if let Some(serial_number) = self.serial_number {
                    self.push_frame(WidgetLabel::GetSerial, &serial_number.to_le_bytes());
                }
            },
            Some(WidgetLabel::GetWidgetParams) => {
                let widget_parameters = self.widget_parameters;
                self.push_frame(WidgetLabel::GetWidgetParams, &widget_parameters);
            },
            Some(WidgetLabel::SetWidgetParams) => {
                self.widget_parameters[2..].copy_from_slice(&payload[2..5]);
            },
            Some(WidgetLabel::SendRdm) => self.handle_rdm(payload),
            Some(WidgetLabel::SendRdmDiscovery) => self.handle_discovery(payload),
            _ => {},
        }

        self.sent.push(host_frame);
    }

    fn handle_rdm(&mut self, payload: &[u8]) {
        let request = match RdmPacket::decode(payload) {
            Ok(request) if request.validate() => request,
            _ => return,
        };
        let command_class = match request.command_class() {
            Ok(command_class) => command_class,
            Err(_) => return,
        };

        let destination = request.destination_uid();
        let broadcast = destination == UniqueIdentifier::BROADCAST;
        let transaction_number = request
            .transaction_number()
            .wrapping_add(self.transaction_number_offset);

        let mut replies = vec![];
        for responder in self
            .responders
            .iter_mut()
            .filter(|responder| broadcast || responder.uid == destination)
        {
            let reply = match (command_class, request.parameter_id()) {
                (CommandClass::DiscoveryCommand, pids::DISC_UN_MUTE) => {
                    responder.muted = false;
                    Some((ResponseType::Ack, vec![0x00, 0x00]))
                },
                (CommandClass::DiscoveryCommand, pids::DISC_MUTE) if responder.acknowledges_mute => {
                    responder.muted = true;
                    Some((ResponseType::Ack, vec![0x00, 0x00]))
                },
                (CommandClass::GetCommand, parameter_id) => {
                    Some(match responder.parameters.get(&parameter_id) {
                        Some(parameter_data) => (ResponseType::Ack, parameter_data.clone()),
                        None => (
                            ResponseType::NackReason,
                            NackReason::UnknownPid.to_bytes().to_vec(),
                        ),
                    })
                },
                (CommandClass::SetCommand, parameter_id) => {
                    responder
                        .parameters
                        .insert(parameter_id, request.parameter_data().to_vec());
                    Some((ResponseType::Ack, vec![]))
                },
                _ => None,
            };

            if broadcast {
                continue;
            }

            if let Some((response_type, parameter_data)) = reply {
                let mut response = RdmPacket::encode(
                    request.source_uid(),
                    responder.uid,
                    transaction_number,
                    command_class.response_class(),
                    request.parameter_id(),
                    &parameter_data,
                )
                .unwrap();
                response.set_response_type(response_type);
                response.update_checksum();
                replies.push(response);
            }
        }

        for response in replies {
            self.push_packet(response.as_bytes());
        }
    }

    fn handle_discovery(&mut self, payload: &[u8]) {
        let request = RdmPacket::decode(payload).unwrap();
        assert!(request.validate());
        assert_eq!(request.parameter_id(), pids::DISC_UNIQUE_BRANCH);

        let lower = request.parameter_data_as_uid(0).unwrap();
        let upper = request.parameter_data_as_uid(6).unwrap();
        self.discovery_requests += 1;

        let answering: Vec<UniqueIdentifier> = self
            .responders
            .iter()
            .filter(|responder| !responder.muted && lower <= responder.uid && responder.uid <= upper)
            .map(|responder| responder.uid)
            .collect();

        if self.garble_collisions && answering.len() > 1 {
            self.push_packet(&GARBLED_DISCOVERY_RESPONSE);
            return;
        }

        for uid in answering {
            self.push_packet(&encode_discovery_response(uid));
        }
    }
}

impl WidgetTransport for SimulatedWidget {
    type TransportError = Infallible;

    fn write(&mut self, data: &[u8]) -> Result<usize, Self::TransportError> {
        if self.short_writes {
            return Ok(data.len().saturating_sub(1));
        }

        self.host_frames.extend(data);
        while let Ok(Some(host_frame)) = self.host_frames.next_frame() {
            self.handle_host_frame(host_frame);
        }

        Ok(data.len())
    }

    fn bytes_available(&mut self) -> Result<usize, Self::TransportError> {
        Ok(self.rx.len())
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, Self::TransportError> {
        let count = buffer.len().min(self.max_read_chunk).min(self.rx.len());
        for (slot, byte) in buffer.iter_mut().zip(self.rx.drain(..count)) {
            *slot = byte;
        }

        Ok(count)
    }
}

pub fn session(widget: SimulatedWidget) -> WidgetSession<SimulatedWidget, SimulatedClock> {
    session_with_config(widget, WidgetSessionConfig::default())
}

pub fn session_with_config(
    widget: SimulatedWidget,
    config: WidgetSessionConfig,
) -> WidgetSession<SimulatedWidget, SimulatedClock> {
    WidgetSession::new(widget, SimulatedClock::default(), config)
}
