mod common;

use common::{session, session_with_config, Responder, SimulatedWidget, SERIAL_NUMBER};
use dmx_rdm_usbpro::command_class::CommandClass;
use dmx_rdm_usbpro::pids;
use dmx_rdm_usbpro::rdm_packet::{encode_discovery_response, RdmPacket};
use dmx_rdm_usbpro::rdm_parameters::RdmResponseError;
use dmx_rdm_usbpro::rdm_types::{DeviceInfo, DmxStartAddress, OverflowMessageResp};
use dmx_rdm_usbpro::transport::WidgetError;
use dmx_rdm_usbpro::types::{NackReason, ResponseType};
use dmx_rdm_usbpro::unique_identifier::UniqueIdentifier;
use dmx_rdm_usbpro::widget_frame::WidgetLabel;
use dmx_rdm_usbpro::widget_parameters::WidgetParameters;
use dmx_rdm_usbpro::widget_session::{DmxFrame, WidgetEvent, WidgetSessionConfig};

const CONTROLLER_UID: UniqueIdentifier = UniqueIdentifier::new(0x454E, 0x0000_0042);
const RESPONDER_UID: UniqueIdentifier = UniqueIdentifier::new(0x7FF0, 0x0000_0001);

fn controller_config() -> WidgetSessionConfig {
    WidgetSessionConfig {
        source_uid: Some(CONTROLLER_UID),
        ..WidgetSessionConfig::default()
    }
}

fn widget_with_responder(responder: Responder) -> SimulatedWidget {
    let mut widget = SimulatedWidget::new();
    widget.responders.push(responder);
    widget
}

#[test]
fn test_send_dmx_pads_short_universes() {
    let mut session = session(SimulatedWidget::new());
    session.send_dmx(&[0xFF; 10]).unwrap();

    let widget = session.get_transport();
    let sent = widget.sent_with_label(WidgetLabel::SendDmx);
    assert_eq!(sent.len(), 1);

    let payload = sent[0].payload();
    assert_eq!(payload.len(), 25);
    assert_eq!(payload[0], 0x00);
    assert_eq!(&payload[1..11], &[0xFF; 10]);
    assert!(payload[11..].iter().all(|&level| level == 0));
}

#[test]
fn test_send_dmx_truncates_long_universes() {
    let mut session = session(SimulatedWidget::new());
    session.send_dmx(&[0x10; 600]).unwrap();

    let widget = session.get_transport();
    let sent = widget.sent_with_label(WidgetLabel::SendDmx);
    let payload = sent[0].payload();
    assert_eq!(payload.len(), 513);
    assert_eq!(payload[0], 0x00);
    assert!(payload[1..].iter().all(|&level| level == 0x10));
}

#[test]
fn test_incomplete_write() {
    let mut widget = SimulatedWidget::new();
    widget.short_writes = true;
    let mut session = session(widget);

    assert!(matches!(
        session.send_dmx(&[1, 2, 3]),
        Err(WidgetError::IncompleteWrite)
    ));
}

#[test]
fn test_uid_is_derived_from_serial_number() {
    let mut session = session(SimulatedWidget::new());

    assert_eq!(
        session.uid().unwrap(),
        UniqueIdentifier::new(0x454E, SERIAL_NUMBER)
    );
    assert_eq!(session.serial_hex_string().unwrap().as_str(), "12345678");
    assert_eq!(session.serial_number(), Some(SERIAL_NUMBER));

    // The serial number is only queried once.
    session.uid().unwrap();
    assert_eq!(
        session
            .get_transport()
            .sent_with_label(WidgetLabel::GetSerial)
            .len(),
        1
    );
}

#[test]
fn test_configured_uid_skips_serial_query() {
    let mut session = session_with_config(SimulatedWidget::new(), controller_config());

    assert_eq!(session.uid().unwrap(), CONTROLLER_UID);
    assert!(session
        .get_transport()
        .sent_with_label(WidgetLabel::GetSerial)
        .is_empty());
}

#[test]
fn test_unanswered_serial_query_times_out() {
    let mut widget = SimulatedWidget::new();
    widget.serial_number = None;
    let mut session = session(widget);

    let mut request = RdmPacket::new(RESPONDER_UID, CommandClass::GetCommand, pids::DEVICE_INFO);
    assert!(matches!(
        session.send_rdm(&mut request),
        Err(WidgetError::TimeoutError)
    ));
    assert!(session.get_clock().now >= 1_000_000);
    assert!(session
        .get_transport()
        .sent_with_label(WidgetLabel::SendRdm)
        .is_empty());
}

#[test]
fn test_send_rdm_stamps_packages() {
    let mut session = session_with_config(SimulatedWidget::new(), controller_config());

    for expected_transaction_number in 0..3u8 {
        let mut request =
            RdmPacket::new(RESPONDER_UID, CommandClass::GetCommand, pids::IDENTIFY_DEVICE);
        assert_eq!(
            session.send_rdm(&mut request).unwrap(),
            expected_transaction_number
        );
    }

    let widget = session.get_transport();
    let sent = widget.sent_with_label(WidgetLabel::SendRdm);
    assert_eq!(sent.len(), 3);

    for (index, sent_frame) in sent.iter().enumerate() {
        let packet = RdmPacket::decode(sent_frame.payload()).unwrap();
        assert!(packet.validate());
        assert_eq!(packet.source_uid(), CONTROLLER_UID);
        assert_eq!(packet.destination_uid(), RESPONDER_UID);
        assert_eq!(packet.transaction_number(), index as u8);
    }
}

#[test]
fn test_transaction_number_wraps() {
    let mut session = session_with_config(SimulatedWidget::new(), controller_config());

    for _ in 0..256 {
        let mut request =
            RdmPacket::new(RESPONDER_UID, CommandClass::GetCommand, pids::IDENTIFY_DEVICE);
        session.send_rdm(&mut request).unwrap();
    }

    assert_eq!(session.next_transaction_number(), 0);
}

#[test]
fn test_get_rdm_skips_unrelated_frames() {
    let mut widget = widget_with_responder(
        Responder::new(RESPONDER_UID).with_parameter(pids::SOFTWARE_VERSION_LABEL, b"fw 1.0"),
    );
    widget.push_packet(&[0x00, 1, 2, 3]);
    widget.push_frame(WidgetLabel::GetSerial, &[1, 0, 0, 0]);
    let mut session = session_with_config(widget, controller_config());

    let response = session
        .get_rdm_parameter(RESPONDER_UID, pids::SOFTWARE_VERSION_LABEL)
        .unwrap();

    assert_eq!(response.source_uid(), RESPONDER_UID);
    assert_eq!(response.destination_uid(), CONTROLLER_UID);
    assert_eq!(
        response.command_class(),
        Ok(CommandClass::GetCommandResponse)
    );
    assert_eq!(response.response_type(), Ok(ResponseType::Ack));
    assert_eq!(response.parameter_data_as_str(0), Ok("fw 1.0"));
    assert_eq!(session.get_transport().pending(), 0);
}

#[test]
fn test_get_rdm_ignores_wrong_transaction_number() {
    let mut widget = widget_with_responder(
        Responder::new(RESPONDER_UID).with_parameter(pids::IDENTIFY_DEVICE, &[0]),
    );
    widget.transaction_number_offset = 1;
    let mut session = session_with_config(widget, controller_config());

    assert!(matches!(
        session.get_rdm_parameter(RESPONDER_UID, pids::IDENTIFY_DEVICE),
        Err(WidgetError::TimeoutError)
    ));
    assert!(session.get_clock().now >= 1_000_000);
}

#[test]
fn test_get_rdm_with_split_reads() {
    let mut widget = widget_with_responder(
        Responder::new(RESPONDER_UID).with_parameter(pids::SOFTWARE_VERSION_LABEL, b"split"),
    );
    widget.max_read_chunk = 3;
    let mut session = session_with_config(widget, controller_config());

    assert_eq!(
        session
            .rdm_get_software_version_label(RESPONDER_UID)
            .unwrap()
            .as_str(),
        "split"
    );
    assert_eq!(
        session.query_widget_parameters().unwrap().refresh_rate,
        40
    );
}

#[test]
fn test_typed_parameters() {
    let device_info = DeviceInfo {
        protocol_version: 0x0100,
        device_model_id: 0x0815,
        product_category: 0x0101,
        software_version: 3,
        dmx_footprint: 6,
        dmx_personality: 0x0101,
        dmx_start_address: DmxStartAddress::Address(1),
        sub_device_count: 0,
        sensor_count: 0,
    };
    let widget = widget_with_responder(
        Responder::new(RESPONDER_UID)
            .with_parameter(pids::DEVICE_INFO, &device_info.serialize())
            .with_parameter(pids::SUPPORTED_PARAMETERS, &[0x00, 0xF0, 0x10, 0x00]),
    );
    let mut session = session_with_config(widget, controller_config());

    assert_eq!(session.rdm_get_device_info(RESPONDER_UID).unwrap(), device_info);
    assert_eq!(
        session.rdm_get_supported_parameters(RESPONDER_UID).unwrap(),
        OverflowMessageResp::Complete(
            heapless::Vec::from_slice(&[pids::DMX_START_ADDRESS, pids::IDENTIFY_DEVICE]).unwrap()
        )
    );

    session.rdm_set_identify(RESPONDER_UID, true).unwrap();
    assert!(session.rdm_get_identify(RESPONDER_UID).unwrap());

    session.rdm_set_dmx_start_address(RESPONDER_UID, 17).unwrap();
    assert_eq!(
        session.rdm_get_dmx_start_address(RESPONDER_UID).unwrap(),
        DmxStartAddress::Address(17)
    );
}

#[test]
fn test_invalid_start_address_is_not_sent() {
    let mut session = session_with_config(
        widget_with_responder(Responder::new(RESPONDER_UID)),
        controller_config(),
    );

    assert!(matches!(
        session.rdm_set_dmx_start_address(RESPONDER_UID, 513),
        Err(RdmResponseError::InvalidStartAddress(513))
    ));
    assert!(session
        .get_transport()
        .sent_with_label(WidgetLabel::SendRdm)
        .is_empty());
}

#[test]
fn test_nack_response() {
    let mut session = session_with_config(
        widget_with_responder(Responder::new(RESPONDER_UID)),
        controller_config(),
    );

    assert!(matches!(
        session.rdm_get_device_info(RESPONDER_UID),
        Err(RdmResponseError::NotAcknowledged(NackReason::UnknownPid))
    ));
}

#[test]
fn test_mute_and_un_mute() {
    let mut session = session_with_config(
        widget_with_responder(Responder::new(RESPONDER_UID)),
        controller_config(),
    );

    let mute_response = session.rdm_disc_mute(RESPONDER_UID).unwrap();
    assert!(!mute_response.managed_proxy);
    assert_eq!(mute_response.binding_uid, None);
    assert!(session.get_transport().responder(RESPONDER_UID).muted);

    assert_eq!(
        session
            .rdm_disc_un_mute(UniqueIdentifier::BROADCAST)
            .unwrap(),
        None
    );
    assert!(!session.get_transport().responder(RESPONDER_UID).muted);
}

#[test]
fn test_widget_parameters() {
    let mut session = session(SimulatedWidget::new());

    let parameters = session.query_widget_parameters().unwrap();
    assert_eq!(parameters.firmware_version, 0x0204);
    assert_eq!(parameters.firmware_version_parts(), (2, 4));
    assert_eq!(session.widget_parameters(), Some(parameters));

    session
        .set_widget_parameters(&WidgetParameters {
            break_time: 20,
            ..WidgetParameters::default()
        })
        .unwrap();
    assert_eq!(
        session.get_transport().sent_with_label(WidgetLabel::SetWidgetParams)[0].payload(),
        &[0, 0, 20, 1, 40]
    );

    assert_eq!(session.query_widget_parameters().unwrap().break_time, 20);
}

#[test]
fn test_discard_incoming() {
    let mut widget = SimulatedWidget::new();
    widget.push_packet(&[0x00, 1]);
    widget.push_packet(&[0x00, 2]);
    let mut session = session(widget);

    assert_eq!(session.discard_incoming(10_000).unwrap(), 2);
    assert!(session.get_clock().now >= 10_000);
    assert_eq!(session.poll(&mut ()).unwrap(), 0);
}

#[test]
fn test_poll_dispatches_events() {
    let mut rdm_packet = RdmPacket::encode(
        CONTROLLER_UID,
        RESPONDER_UID,
        5,
        CommandClass::GetCommandResponse,
        pids::IDENTIFY_DEVICE,
        &[1],
    )
    .unwrap();
    rdm_packet.set_response_type(ResponseType::Ack);
    rdm_packet.update_checksum();

    let mut corrupted = rdm_packet.as_bytes().to_vec();
    let last = corrupted.len() - 1;
    corrupted[last] ^= 0xFF;

    let mut widget = SimulatedWidget::new();
    widget.push_packet(&[0x00, 1, 2, 3]);
    widget.push_packet(rdm_packet.as_bytes());
    widget.push_packet(&corrupted);
    widget.push_packet(&encode_discovery_response(RESPONDER_UID));
    widget.push_bytes(&[0x13, 0x37]);
    widget.push_frame(WidgetLabel::PacketReceived, &[0x01, 0x00, 9]);
    widget.push_packet(&[]);
    widget.push_bytes(&[0x7E, 0x20, 0x00, 0x00, 0xE7]);
    widget.push_frame(WidgetLabel::DmxChanged, &[10, 0x01, 0, 0, 0, 0, 0x7F]);
    widget.push_frame(WidgetLabel::GetWidgetParams, &[0x04, 0x02, 9, 1, 40]);
    widget.push_frame(WidgetLabel::GetSerial, &[0x78, 0x56, 0x34, 0x12]);
    let mut session = session(widget);

    let mut events: heapless::Deque<WidgetEvent, 8> = heapless::Deque::new();
    assert_eq!(session.poll(&mut events).unwrap(), 10);

    assert_eq!(
        events.pop_front(),
        Some(WidgetEvent::Dmx(DmxFrame::from_slice(&[1, 2, 3]).unwrap()))
    );
    assert_eq!(events.pop_front(), Some(WidgetEvent::Rdm(rdm_packet)));
    assert_eq!(
        events.pop_front(),
        Some(WidgetEvent::DiscoveredUid(RESPONDER_UID))
    );
    match events.pop_front() {
        Some(WidgetEvent::Dmx(levels)) => {
            assert_eq!(levels.len(), 512);
            assert_eq!(levels[80], 0x7F);
            assert_eq!(levels[81], 0);
        },
        event => panic!("expected change of state levels, got {:?}", event),
    }
    assert!(events.is_empty());

    assert_eq!(session.change_of_state_levels().unwrap()[80], 0x7F);
    assert_eq!(session.widget_parameters().unwrap().refresh_rate, 40);
    assert_eq!(session.serial_number(), Some(SERIAL_NUMBER));
    assert_eq!(session.poll(&mut events).unwrap(), 0);
}

#[test]
fn test_set_receive_dmx_on_change() {
    let mut session = session(SimulatedWidget::new());
    session.set_receive_dmx_on_change(true).unwrap();

    assert_eq!(
        session.get_transport().sent_with_label(WidgetLabel::SetDmxChange)[0].payload(),
        &[1]
    );
}

#[test]
fn test_reply_behind_cut_off_frame_is_handled() {
    let mut widget = SimulatedWidget::new();
    // PACKET_RECEIVED announcing 513 bytes, only 5 of them made it.
    widget.push_bytes(&[0x7E, 5, 0x01, 0x02, 0x00, 0x00, 1, 2, 3]);
    widget.push_frame(WidgetLabel::GetSerial, &SERIAL_NUMBER.to_le_bytes());
    let mut session = session(widget);

    assert_eq!(session.poll(&mut ()).unwrap(), 1);
    assert_eq!(session.serial_number(), Some(SERIAL_NUMBER));
}

#[test]
fn test_get_rdm_after_cut_off_frame() {
    let mut widget = widget_with_responder(
        Responder::new(RESPONDER_UID).with_parameter(pids::IDENTIFY_DEVICE, &[1]),
    );
    widget.push_bytes(&[0x7E, 5, 0x01, 0x02, 0x00, 0x00, 1, 2, 3]);
    let mut session = session_with_config(widget, controller_config());

    assert!(session.rdm_get_identify(RESPONDER_UID).unwrap());
}
